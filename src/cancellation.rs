// ABOUTME: Cooperative cancellation token shared by long-running operations
// ABOUTME: Atomic flag checked before dispatching new work; in-flight work settles
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Stratus Console

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation signal.
///
/// Cloning shares the underlying flag. Holders are expected to check
/// [`is_cancelled`](Self::is_cancelled) before starting new work; work
/// already dispatched is allowed to settle.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a fresh, un-signalled token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to all holders
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been signalled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
