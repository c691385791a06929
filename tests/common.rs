// ABOUTME: Shared test utilities and mock collaborators for integration tests
// ABOUTME: Provides logging setup, record builders, and scripted exchange/refresh/health mocks
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Stratus Console
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]
//! Shared test utilities for `stratus_integrations`
//!
//! Common builders and mock collaborators to reduce duplication across
//! integration tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use uuid::Uuid;

use stratus_integrations::errors::{EngineError, EngineResult, OAuthFlowError};
use stratus_integrations::external::{
    HealthEndpoint, TokenExchange, TokenExchangeRequest, TokenGrant, TokenRefresh,
};
use stratus_integrations::models::{
    EndpointStatus, HealthIssue, HealthMetrics, HealthSnapshot, Integration, IntegrationStatus,
    IssueSeverity, TokenHealth, TokenHealthStatus,
};
use stratus_integrations::providers::{ProviderConfig, StaticProviderDirectory};
use stratus_integrations::store::{InMemoryIntegrationStore, IntegrationStore};

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// An integration record in the given status, optionally expiring in
/// `expires_in_secs` (negative means already expired)
pub fn test_integration(status: IntegrationStatus, expires_in_secs: Option<i64>) -> Integration {
    let mut integration = Integration::new(Uuid::new_v4(), "cloud-drive", HashMap::new());
    integration.status = status;
    if status != IntegrationStatus::Pending {
        integration.access_token = Some("access-token".into());
    }
    integration.token_expires_at = expires_in_secs.map(|secs| Utc::now() + Duration::seconds(secs));
    integration
}

/// An active integration with a token valid for one hour
pub fn active_integration() -> Integration {
    test_integration(IntegrationStatus::Active, Some(3600))
}

/// A store seeded with the given records
pub async fn seeded_store(records: Vec<Integration>) -> Arc<InMemoryIntegrationStore> {
    init_test_logging();
    let store = Arc::new(InMemoryIntegrationStore::new());
    for record in records {
        store.create(record).await.unwrap();
    }
    store
}

/// Provider configuration pointing at example endpoints
pub fn sample_provider() -> ProviderConfig {
    ProviderConfig {
        auth_url: "https://auth.example.com/oauth/authorize".into(),
        token_url: "https://auth.example.com/oauth/token".into(),
        client_id: "stratus-client".into(),
        redirect_uri: "https://console.example.com/oauth/callback".into(),
        scopes: vec!["files.read".into(), "files.write".into()],
        extra_params: vec![],
    }
}

/// A directory with `cloud-drive` registered
pub fn sample_directory() -> Arc<StaticProviderDirectory> {
    let mut directory = StaticProviderDirectory::new();
    directory.register("cloud-drive", sample_provider());
    Arc::new(directory)
}

/// Scripted token exchange collaborator that counts calls and records the
/// last request it saw
#[derive(Default)]
pub struct MockTokenExchange {
    pub calls: AtomicUsize,
    pub fail_with: Option<OAuthFlowError>,
    pub last_request: Mutex<Option<TokenExchangeRequest>>,
}

impl MockTokenExchange {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing(error: OAuthFlowError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenExchange for MockTokenExchange {
    async fn exchange_code(
        &self,
        _integration_id: Uuid,
        request: TokenExchangeRequest,
    ) -> Result<TokenGrant, OAuthFlowError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        Ok(TokenGrant {
            access_token: "granted-token".into(),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            scopes: vec!["files.read".into(), "files.write".into()],
        })
    }
}

/// Scripted refresh collaborator with a configurable delay, used to hold a
/// refresh in flight while a second request races it
#[derive(Default)]
pub struct MockTokenRefresh {
    pub calls: AtomicUsize,
    pub delay_ms: u64,
    pub fail: bool,
}

impl MockTokenRefresh {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRefresh for MockTokenRefresh {
    async fn refresh(&self, integration_id: Uuid) -> EngineResult<TokenGrant> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail {
            return Err(EngineError::external(format!(
                "refresh endpoint unavailable for {integration_id}"
            )));
        }
        Ok(TokenGrant {
            access_token: "refreshed-token".into(),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            scopes: vec![],
        })
    }
}

/// Scripted health endpoint returning a queue of snapshots, repeating the
/// last one once the queue is down to a single entry; fails when empty
#[derive(Default)]
pub struct MockHealthEndpoint {
    pub snapshots: Mutex<Vec<HealthSnapshot>>,
}

impl MockHealthEndpoint {
    pub fn with_snapshots(snapshots: Vec<HealthSnapshot>) -> Self {
        Self {
            snapshots: Mutex::new(snapshots),
        }
    }

    pub fn failing() -> Self {
        Self {
            snapshots: Mutex::new(vec![]),
        }
    }
}

#[async_trait]
impl HealthEndpoint for MockHealthEndpoint {
    async fn fetch_health(&self, integration_id: Uuid) -> EngineResult<HealthSnapshot> {
        let mut queue = self.snapshots.lock().unwrap();
        if queue.is_empty() {
            return Err(EngineError::external(format!(
                "health endpoint unavailable for {integration_id}"
            )));
        }
        if queue.len() == 1 {
            return Ok(queue[0].clone());
        }
        Ok(queue.remove(0))
    }
}

/// Healthy token-health block for snapshot building
pub fn healthy_token_health() -> TokenHealth {
    TokenHealth {
        status: TokenHealthStatus::Active,
        expires_at: Some(Utc::now() + Duration::hours(1)),
        is_expiring_soon: false,
        needs_refresh: false,
        last_refreshed: Some(Utc::now()),
    }
}

/// A snapshot with the given dial settings and no issues
pub fn snapshot(
    uptime: f64,
    token_status: TokenHealthStatus,
    response_time_ms: u64,
    error_rate: f64,
    status: EndpointStatus,
) -> HealthSnapshot {
    let mut token_health = healthy_token_health();
    token_health.status = token_status;
    HealthSnapshot {
        token_health,
        metrics: HealthMetrics {
            uptime,
            response_time_ms,
            error_rate,
        },
        issues: vec![],
        status,
        estimated: false,
    }
}

/// An issue with the given id at warning severity
pub fn issue(id: &str) -> HealthIssue {
    HealthIssue {
        id: id.into(),
        severity: IssueSeverity::Warning,
        message: format!("issue {id}"),
    }
}
