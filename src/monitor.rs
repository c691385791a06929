// ABOUTME: Periodic health monitor with scoring, issue diffing, and trend tracking
// ABOUTME: Polls the health endpoint, degrades to a local estimate, and emits events
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Stratus Console

use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cancellation::CancellationToken;
use crate::errors::{EngineError, EngineResult};
use crate::external::HealthEndpoint;
use crate::models::{
    EndpointStatus, HealthIssue, HealthMetrics, HealthSnapshot, TokenHealthStatus,
};
use crate::refresh::TokenRefreshScheduler;
use crate::store::IntegrationStore;
use crate::token_health;

/// Score movement relative to the previous check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthTrend {
    /// Score rose by more than 5 points
    Improving,
    /// Score fell by more than 5 points
    Declining,
    /// Within 5 points of the previous score (or no previous score)
    Stable,
}

/// Notification emitted by the monitor
#[derive(Debug, Clone, PartialEq)]
pub enum HealthEvent {
    /// An issue id appeared that was not present in any earlier snapshot.
    /// Emitted exactly once per issue id per monitored integration.
    NewIssue {
        /// Integration the issue belongs to
        integration_id: Uuid,
        /// The newly observed issue
        issue: HealthIssue,
    },
    /// A check completed and produced a score
    ScoreUpdated {
        /// Integration that was checked
        integration_id: Uuid,
        /// Computed health score (0-100)
        score: u8,
        /// Movement relative to the previous check
        trend: HealthTrend,
    },
}

/// Result of one health check
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Integration that was checked
    pub integration_id: Uuid,
    /// The snapshot the score was computed from
    pub snapshot: HealthSnapshot,
    /// Computed health score (0-100)
    pub score: u8,
    /// Movement relative to the previous check
    pub trend: HealthTrend,
    /// Issues first observed in this check
    pub new_issues: Vec<HealthIssue>,
}

/// Compute the 0-100 health score for a snapshot.
///
/// Starts from uptime, then multiplies in the token-health, latency,
/// error-rate, and endpoint-status factors, clamping and rounding at the end.
#[must_use]
pub fn health_score(snapshot: &HealthSnapshot) -> u8 {
    let mut score = snapshot.metrics.uptime;

    score *= match snapshot.token_health.status {
        TokenHealthStatus::Active => 1.0,
        TokenHealthStatus::ExpiringSoon => 0.8,
        TokenHealthStatus::Expired => 0.3,
        TokenHealthStatus::Error => 0.1,
        _ => 0.5,
    };

    score *= if snapshot.metrics.response_time_ms > 5000 {
        0.7
    } else if snapshot.metrics.response_time_ms > 2000 {
        0.9
    } else {
        1.0
    };

    score *= 1.0 - snapshot.metrics.error_rate / 100.0;

    score *= match snapshot.status {
        EndpointStatus::Healthy => 1.0,
        EndpointStatus::Warning => 0.8,
        EndpointStatus::Error => 0.3,
        EndpointStatus::Critical => 0.1,
    };

    score.clamp(0.0, 100.0).round() as u8
}

/// What the monitor remembers about an integration between checks
#[derive(Debug, Default)]
struct CheckMemory {
    seen_issue_ids: HashSet<String>,
    last_score: Option<u8>,
}

struct MonitorTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Check logic and state shared between callers and spawned polling tasks
struct MonitorCore {
    store: Arc<dyn IntegrationStore>,
    endpoint: Arc<dyn HealthEndpoint>,
    scheduler: Arc<TokenRefreshScheduler>,
    memory: DashMap<Uuid, CheckMemory>,
    events: Mutex<Option<mpsc::UnboundedSender<HealthEvent>>>,
}

impl MonitorCore {
    async fn check_now(&self, integration_id: Uuid) -> EngineResult<HealthReport> {
        let snapshot = match self.endpoint.fetch_health(integration_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("health endpoint failed for integration {integration_id}, estimating: {e}");
                self.estimate_snapshot(integration_id).await?
            }
        };

        let score = health_score(&snapshot);

        let (trend, new_issues) = {
            let mut memory = self.memory.entry(integration_id).or_default();

            let trend = match memory.last_score {
                Some(previous) if i16::from(score) - i16::from(previous) > 5 => {
                    HealthTrend::Improving
                }
                Some(previous) if i16::from(previous) - i16::from(score) > 5 => {
                    HealthTrend::Declining
                }
                _ => HealthTrend::Stable,
            };
            memory.last_score = Some(score);

            let new_issues: Vec<HealthIssue> = snapshot
                .issues
                .iter()
                .filter(|issue| memory.seen_issue_ids.insert(issue.id.clone()))
                .cloned()
                .collect();

            (trend, new_issues)
        };

        for issue in &new_issues {
            self.emit(HealthEvent::NewIssue {
                integration_id,
                issue: issue.clone(),
            });
        }
        self.emit(HealthEvent::ScoreUpdated {
            integration_id,
            score,
            trend,
        });

        if snapshot.token_health.needs_refresh {
            if let Err(e) = self.scheduler.auto_refresh(integration_id).await {
                warn!("opportunistic refresh failed for integration {integration_id}: {e}");
            }
        }

        Ok(HealthReport {
            integration_id,
            snapshot,
            score,
            trend,
            new_issues,
        })
    }

    /// Client-side snapshot from the stored record, for when the health
    /// endpoint is unreachable
    async fn estimate_snapshot(&self, integration_id: Uuid) -> EngineResult<HealthSnapshot> {
        let integration = self
            .store
            .get(integration_id)
            .await?
            .ok_or(EngineError::NotFound(integration_id))?;

        let token_health = token_health::evaluate(&integration);
        let status = match token_health.status {
            TokenHealthStatus::Active => EndpointStatus::Healthy,
            TokenHealthStatus::Expired
            | TokenHealthStatus::Error
            | TokenHealthStatus::Revoked => EndpointStatus::Error,
            _ => EndpointStatus::Warning,
        };

        Ok(HealthSnapshot {
            token_health,
            metrics: HealthMetrics {
                uptime: 100.0,
                response_time_ms: 0,
                error_rate: 0.0,
            },
            issues: Vec::new(),
            status,
            estimated: true,
        })
    }

    fn emit(&self, event: HealthEvent) {
        if let Ok(slot) = self.events.lock() {
            if let Some(tx) = slot.as_ref() {
                // Receiver may have been dropped; that is fine
                let _ = tx.send(event);
            }
        }
    }
}

/// Periodic poller over integration health.
///
/// One recurring task per monitored integration; `start_monitoring` and
/// `stop_monitoring` are both idempotent. Each polling cycle also triggers an
/// opportunistic token refresh when the snapshot says one is needed.
pub struct HealthMonitor {
    core: Arc<MonitorCore>,
    tasks: DashMap<Uuid, MonitorTask>,
}

impl HealthMonitor {
    /// Create a monitor over the given store, endpoint, and refresh scheduler
    #[must_use]
    pub fn new(
        store: Arc<dyn IntegrationStore>,
        endpoint: Arc<dyn HealthEndpoint>,
        scheduler: Arc<TokenRefreshScheduler>,
    ) -> Self {
        Self {
            core: Arc::new(MonitorCore {
                store,
                endpoint,
                scheduler,
                memory: DashMap::new(),
                events: Mutex::new(None),
            }),
            tasks: DashMap::new(),
        }
    }

    /// Subscribe to monitor events, replacing any previous subscriber
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<HealthEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut slot) = self.core.events.lock() {
            *slot = Some(tx);
        }
        rx
    }

    /// Start a recurring health check for an integration. A no-op when a
    /// task for that id is already running.
    pub fn start_monitoring(&self, integration_id: Uuid, interval_ms: u64) {
        if self.tasks.contains_key(&integration_id) {
            debug!("monitor already running for integration {integration_id}");
            return;
        }

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let core = Arc::clone(&self.core);
        let handle = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_millis(interval_ms.max(1)));
            loop {
                ticker.tick().await;
                if task_cancel.is_cancelled() {
                    break;
                }
                if let Err(e) = core.check_now(integration_id).await {
                    warn!("health check failed for integration {integration_id}: {e}");
                }
            }
            debug!("monitor task for integration {integration_id} stopped");
        });

        self.tasks
            .insert(integration_id, MonitorTask { cancel, handle });
        info!("started health monitoring for integration {integration_id} every {interval_ms}ms");
    }

    /// Stop the recurring health check for an integration. A no-op when no
    /// task is running for that id.
    pub fn stop_monitoring(&self, integration_id: Uuid) {
        if let Some((_, task)) = self.tasks.remove(&integration_id) {
            task.cancel.cancel();
            task.handle.abort();
            info!("stopped health monitoring for integration {integration_id}");
        }
    }

    /// Whether a recurring check is active for this id
    #[must_use]
    pub fn is_monitoring(&self, integration_id: Uuid) -> bool {
        self.tasks.contains_key(&integration_id)
    }

    /// Run one health check immediately: fetch the snapshot (or estimate one
    /// locally when the endpoint fails), score it, diff issues against what
    /// was seen before, and kick off a refresh when the token needs one.
    pub async fn check_now(&self, integration_id: Uuid) -> EngineResult<HealthReport> {
        self.core.check_now(integration_id).await
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        for task in self.tasks.iter() {
            task.cancel.cancel();
            task.handle.abort();
        }
    }
}
