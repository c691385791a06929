// ABOUTME: Integration lifecycle engine for multi-tenant cloud-storage connections
// ABOUTME: OAuth + PKCE flows, token health and refresh, health monitoring, bulk operations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Stratus Console

//! Integration lifecycle engine.
//!
//! Drives the full life of a tenant's cloud-storage integration:
//!
//! - [`oauth`] runs the OAuth 2.0 + PKCE authorization flow as a strict
//!   per-attempt state machine with a TTL-checked state envelope.
//! - [`token_health`] derives token status from an integration snapshot;
//!   [`refresh`] triggers refreshes with a per-id single-flight guarantee.
//! - [`monitor`] polls integration health, scores it, and diffs issues.
//! - [`bulk`] executes per-integration operations across many ids with
//!   bounded concurrency, partial-failure aggregation, and cancellation.
//!
//! Persistence and transport stay behind the [`store`] and [`external`]
//! traits; the engine itself performs no I/O of its own.

pub mod bulk;
pub mod cancellation;
pub mod config;
pub mod errors;
pub mod external;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod oauth;
pub mod providers;
pub mod refresh;
pub mod store;
pub mod token_health;

pub use bulk::{BulkBatchProcessor, BulkOperations, SelectionReport};
pub use cancellation::CancellationToken;
pub use config::EngineConfig;
pub use errors::{EngineError, EngineResult, OAuthErrorCode, OAuthFlowError};
pub use models::{
    BulkItemResult, BulkOperationProgress, HealthSnapshot, Integration, IntegrationStatus,
    TokenHealth, TokenHealthStatus,
};
pub use monitor::{HealthEvent, HealthMonitor, HealthReport, HealthTrend};
pub use oauth::{CallbackParams, FlowStep, OAuthFlowOrchestrator, OAuthFlowState};
pub use refresh::{RefreshOutcome, TokenRefreshScheduler};
pub use store::{InMemoryIntegrationStore, IntegrationStore};
