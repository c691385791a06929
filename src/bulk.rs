// ABOUTME: Bounded-concurrency bulk executor with windows, progress, and cancellation
// ABOUTME: Selection validation, confirmation tokens, and per-item lifecycle operations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Stratus Console

use futures_util::future::join_all;
use rand::Rng;
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cancellation::CancellationToken;
use crate::config::DEFAULT_BULK_WINDOW_SIZE;
use crate::errors::{EngineError, EngineResult};
use crate::models::{BulkItemResult, BulkOperationProgress, Integration, IntegrationStatus};
use crate::refresh::TokenRefreshScheduler;
use crate::store::IntegrationStore;

/// Confirmation token length in characters
const CONFIRMATION_TOKEN_LENGTH: usize = 16;

const TOKEN_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Accumulated outcome of validating a bulk selection.
///
/// Collects every applicable violation rather than stopping at the first, so
/// the caller can show them all at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionReport {
    /// Violations that block the bulk run
    pub errors: Vec<String>,
    /// Advisories that do not block the run
    pub warnings: Vec<String>,
}

impl SelectionReport {
    /// The selection may proceed when no blocking violation was found
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a bulk selection against the known integration universe,
/// accumulating all violations: empty selection, selection over the cap, ids
/// not in the universe, and warnings for integrations that are not active.
#[must_use]
pub fn validate_selection(
    ids: &[Uuid],
    universe: &[Integration],
    max_selection: usize,
) -> SelectionReport {
    let mut report = SelectionReport::default();

    if ids.is_empty() {
        report.errors.push("selection is empty".to_owned());
    }
    if ids.len() > max_selection {
        report.errors.push(format!(
            "selection of {} exceeds the maximum of {max_selection}",
            ids.len()
        ));
    }

    let known: HashSet<Uuid> = universe.iter().map(|i| i.id).collect();
    for id in ids {
        if !known.contains(id) {
            report.errors.push(format!("unknown integration: {id}"));
        }
    }

    for integration in universe {
        if ids.contains(&integration.id) && integration.status != IntegrationStatus::Active {
            report.warnings.push(format!(
                "integration {} is not active ({:?})",
                integration.id, integration.status
            ));
        }
    }

    report
}

/// Opaque random token the UI must echo back before a destructive bulk
/// delete is accepted. A speed bump against accidental clicks, not an
/// authorization control.
#[must_use]
pub fn generate_confirmation_token() -> String {
    let mut rng = rand::thread_rng();
    (0..CONFIRMATION_TOKEN_LENGTH)
        .map(|_| TOKEN_CHARS[rng.gen_range(0..TOKEN_CHARS.len())] as char)
        .collect()
}

/// Generic bounded-concurrency executor.
///
/// Splits ids into fixed-size windows; windows run strictly in input order,
/// items within a window run concurrently. A failing item never aborts the
/// batch. The cancel signal is checked before each window is dispatched;
/// items already dispatched settle and are recorded.
pub struct BulkBatchProcessor {
    window_size: usize,
    progress_tx: Option<mpsc::UnboundedSender<BulkOperationProgress>>,
}

impl Default for BulkBatchProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_BULK_WINDOW_SIZE)
    }
}

impl BulkBatchProcessor {
    /// Create a processor dispatching `window_size` items concurrently
    #[must_use]
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(1),
            progress_tx: None,
        }
    }

    /// Emit a progress snapshot after each item settles
    #[must_use]
    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<BulkOperationProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Run `op` once per id and aggregate the outcomes.
    ///
    /// At run end `completed == results.len()` and
    /// `failed + succeeded == completed` always hold; `completed` equals
    /// `total` unless cancellation stopped later windows from dispatching.
    pub async fn run<F, Fut>(
        &self,
        ids: &[Uuid],
        op: F,
        cancel: &CancellationToken,
    ) -> BulkOperationProgress
    where
        F: Fn(Uuid) -> Fut,
        Fut: Future<Output = EngineResult<()>>,
    {
        let progress = Mutex::new(BulkOperationProgress::new(ids.len()));

        for window in ids.chunks(self.window_size) {
            if cancel.is_cancelled() {
                let settled = progress.lock().map(|p| p.completed).unwrap_or_default();
                info!("bulk run cancelled; {settled} of {} items settled", ids.len());
                break;
            }

            debug!("dispatching bulk window of {} items", window.len());
            join_all(window.iter().map(|&id| {
                let op_future = op(id);
                let progress = &progress;
                async move {
                    self.mark_dispatched(progress, id);
                    let outcome = op_future.await;
                    self.settle(progress, id, outcome);
                }
            }))
            .await;
        }

        let mut finished = progress
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        finished.current = None;
        finished
    }

    fn mark_dispatched(&self, progress: &Mutex<BulkOperationProgress>, id: Uuid) {
        if let Ok(mut p) = progress.lock() {
            p.current = Some(id);
            self.emit(&p);
        }
    }

    fn settle(&self, progress: &Mutex<BulkOperationProgress>, id: Uuid, outcome: EngineResult<()>) {
        if let Ok(mut p) = progress.lock() {
            p.completed += 1;
            match outcome {
                Ok(()) => p.results.push(BulkItemResult {
                    integration_id: id,
                    success: true,
                    error: None,
                }),
                Err(e) => {
                    warn!("bulk item failed for integration {id}: {e}");
                    p.failed += 1;
                    p.results.push(BulkItemResult {
                        integration_id: id,
                        success: false,
                        error: Some(e.to_string()),
                    });
                }
            }
            self.emit(&p);
        }
    }

    fn emit(&self, progress: &BulkOperationProgress) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx.send(progress.clone());
        }
    }
}

/// Per-item lifecycle operations used as bulk `op` closures: refresh, status
/// update, and delete, all routed through the same store and scheduler the
/// rest of the engine uses.
pub struct BulkOperations {
    store: Arc<dyn IntegrationStore>,
    scheduler: Arc<TokenRefreshScheduler>,
}

impl BulkOperations {
    /// Create the operation set over the given store and scheduler
    #[must_use]
    pub fn new(store: Arc<dyn IntegrationStore>, scheduler: Arc<TokenRefreshScheduler>) -> Self {
        Self { store, scheduler }
    }

    /// Refresh one integration's token, honoring the single-flight guard
    pub async fn refresh(&self, id: Uuid) -> EngineResult<()> {
        self.scheduler.force_refresh(id).await.map(|_| ())
    }

    /// Set one integration's lifecycle status via compare-and-replace
    pub async fn set_status(&self, id: Uuid, status: IntegrationStatus) -> EngineResult<()> {
        let current = self
            .store
            .get(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        let mut updated = current.clone();
        updated.status = status;
        self.store
            .compare_and_replace(current.updated_at, updated)
            .await?;
        Ok(())
    }

    /// Delete one integration record
    pub async fn delete(&self, id: Uuid) -> EngineResult<()> {
        self.store.delete(id).await
    }
}
