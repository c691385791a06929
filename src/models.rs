// ABOUTME: Core data model for tenant-owned provider integrations
// ABOUTME: Integration records, token health, bulk progress, and health snapshot types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Stratus Console

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Lifecycle status of a provider integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationStatus {
    /// Created as a placeholder; the OAuth flow has not completed yet
    Pending,
    /// Holds a usable access token
    Active,
    /// Access token passed its expiry
    Expired,
    /// Last lifecycle operation against this integration failed
    Error,
    /// Provider revoked access; re-authorization required
    Revoked,
}

/// A tenant-owned connection to an external cloud-storage provider.
///
/// Mutated only through the flow orchestrator (on OAuth completion), the
/// refresh scheduler (on refresh), and the bulk processor (on bulk
/// status/delete) - always via compare-and-replace on the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    /// Unique integration id
    pub id: Uuid,
    /// Owning tenant
    pub tenant_id: Uuid,
    /// Provider this integration connects to
    pub provider_id: String,
    /// Current lifecycle status
    pub status: IntegrationStatus,
    /// Opaque provider access token; absent until the OAuth flow completes
    pub access_token: Option<String>,
    /// Access token expiry, when the provider reports one
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Scopes granted by the provider
    pub scopes: Vec<String>,
    /// Free-form metadata attached at creation
    pub metadata: HashMap<String, serde_json::Value>,
    /// Record creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time; the compare-and-replace key
    pub updated_at: DateTime<Utc>,
}

impl Integration {
    /// Create a pending placeholder record for a new authorization attempt
    #[must_use]
    pub fn new(
        tenant_id: Uuid,
        provider_id: impl Into<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            provider_id: provider_id.into(),
            status: IntegrationStatus::Pending,
            access_token: None,
            token_expires_at: None,
            scopes: Vec::new(),
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the record holds a non-empty access token
    #[must_use]
    pub fn has_access_token(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Derived token status; recomputed from an [`Integration`] on demand,
/// never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenHealthStatus {
    Active,
    ExpiringSoon,
    Expired,
    Error,
    Revoked,
    Refreshing,
    Unknown,
}

/// Snapshot of an integration's token health
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHealth {
    /// Derived status
    pub status: TokenHealthStatus,
    /// Token expiry, when known
    pub expires_at: Option<DateTime<Utc>>,
    /// Token expires within the warning threshold
    pub is_expiring_soon: bool,
    /// Token is expired or expiring soon
    pub needs_refresh: bool,
    /// Last time the record was mutated (refresh or flow completion)
    pub last_refreshed: Option<DateTime<Utc>>,
}

/// Outcome of one item inside a bulk run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItemResult {
    /// Integration the operation ran against
    pub integration_id: Uuid,
    /// Whether the per-item operation succeeded
    pub success: bool,
    /// Collaborator error message when it failed
    pub error: Option<String>,
}

/// Live progress of one bulk invocation; mutated only by the bulk processor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOperationProgress {
    /// Number of ids submitted
    pub total: usize,
    /// Items settled so far (success or failure)
    pub completed: usize,
    /// Items that settled with a failure
    pub failed: usize,
    /// Most recently dispatched integration, while the run is live
    pub current: Option<Uuid>,
    /// Per-item outcomes in settlement order
    pub results: Vec<BulkItemResult>,
}

impl BulkOperationProgress {
    /// Empty progress for a run over `total` ids
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            failed: 0,
            current: None,
            results: Vec::with_capacity(total),
        }
    }

    /// Items that settled successfully
    #[must_use]
    pub const fn succeeded(&self) -> usize {
        self.completed - self.failed
    }
}

/// Overall status reported by the provider health endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    Healthy,
    Warning,
    Error,
    Critical,
}

/// Operational metrics from the provider health endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    /// Uptime percentage over the reporting window (0-100)
    pub uptime: f64,
    /// Most recent round-trip latency in milliseconds
    pub response_time_ms: u64,
    /// Error rate percentage over the reporting window (0-100)
    pub error_rate: f64,
}

/// Severity of a reported health issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Info,
    Warning,
    Critical,
}

/// A single issue reported for an integration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthIssue {
    /// Stable issue identifier, used for new-issue diffing
    pub id: String,
    /// Issue severity
    pub severity: IssueSeverity,
    /// Human-readable description
    pub message: String,
}

/// Health snapshot for one integration, either fetched from the health
/// endpoint or estimated client-side when the endpoint is unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Token health portion of the snapshot
    pub token_health: TokenHealth,
    /// Operational metrics
    pub metrics: HealthMetrics,
    /// Currently open issues
    pub issues: Vec<HealthIssue>,
    /// Overall endpoint-reported status
    pub status: EndpointStatus,
    /// True when the endpoint was unreachable and this snapshot was
    /// computed from the last known integration record instead
    #[serde(default)]
    pub estimated: bool,
}
