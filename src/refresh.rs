// ABOUTME: Token refresh scheduler with per-integration single-flight guard
// ABOUTME: Collapses concurrent refreshes for one id into a single collaborator call
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Stratus Console

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult};
use crate::external::TokenRefresh;
use crate::models::{Integration, IntegrationStatus, TokenHealth, TokenHealthStatus};
use crate::store::IntegrationStore;
use crate::token_health;

/// What a refresh request resolved to
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The collaborator was called and the record updated
    Refreshed(Integration),
    /// Another refresh for the same id was already in flight; nothing ran
    AlreadyInFlight,
    /// The token did not need a refresh; nothing ran
    NotNeeded,
}

/// Removes the in-flight marker when the refresh settles, on every exit path
struct InFlightGuard {
    in_flight: Arc<DashMap<Uuid, ()>>,
    id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.id);
    }
}

/// Decides and triggers token refreshes.
///
/// Enforces a single-flight guarantee per integration id: while one refresh
/// for an id is running, further requests for that id return
/// [`RefreshOutcome::AlreadyInFlight`] without touching the collaborator.
/// Failed refreshes leave the record unchanged for manual retry; no retry or
/// backoff is scheduled.
pub struct TokenRefreshScheduler {
    store: Arc<dyn IntegrationStore>,
    refresher: Arc<dyn TokenRefresh>,
    in_flight: Arc<DashMap<Uuid, ()>>,
}

impl TokenRefreshScheduler {
    /// Create a scheduler over the given store and refresh collaborator
    #[must_use]
    pub fn new(store: Arc<dyn IntegrationStore>, refresher: Arc<dyn TokenRefresh>) -> Self {
        Self {
            store,
            refresher,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Whether the integration's token should be refreshed now
    #[must_use]
    pub fn needs_refresh(&self, integration: &Integration) -> bool {
        token_health::needs_refresh(integration)
    }

    /// Whether a refresh for this id is currently in flight
    #[must_use]
    pub fn is_refreshing(&self, id: Uuid) -> bool {
        self.in_flight.contains_key(&id)
    }

    /// Token health for an integration, overlaying `refreshing` while a
    /// refresh for its id is in flight. The evaluator itself stays pure.
    #[must_use]
    pub fn token_health(&self, integration: &Integration) -> TokenHealth {
        let mut health = token_health::evaluate(integration);
        if self.is_refreshing(integration.id) {
            health.status = TokenHealthStatus::Refreshing;
        }
        health
    }

    /// Refresh the integration's token if its health calls for it.
    ///
    /// Used opportunistically by the health monitor's polling cycle; manual
    /// refresh actions call [`force_refresh`](Self::force_refresh) instead.
    pub async fn auto_refresh(&self, id: Uuid) -> EngineResult<RefreshOutcome> {
        let integration = self
            .store
            .get(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;

        if !self.needs_refresh(&integration) {
            debug!("integration {id} does not need a refresh");
            return Ok(RefreshOutcome::NotNeeded);
        }

        self.run_single_flight(id).await
    }

    /// Refresh unconditionally, still honoring the single-flight guard
    pub async fn force_refresh(&self, id: Uuid) -> EngineResult<RefreshOutcome> {
        if self.store.get(id).await?.is_none() {
            return Err(EngineError::NotFound(id));
        }
        self.run_single_flight(id).await
    }

    async fn run_single_flight(&self, id: Uuid) -> EngineResult<RefreshOutcome> {
        // Entry guard must not be held across an await; claim the slot and
        // release the shard lock before calling out
        match self.in_flight.entry(id) {
            Entry::Occupied(_) => {
                debug!("refresh already in flight for integration {id}");
                return Ok(RefreshOutcome::AlreadyInFlight);
            }
            Entry::Vacant(slot) => {
                slot.insert(());
            }
        }
        let _guard = InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            id,
        };

        let grant = match self.refresher.refresh(id).await {
            Ok(grant) => grant,
            Err(e) => {
                // Record stays as-is for manual retry
                warn!("token refresh failed for integration {id}: {e}");
                return Err(e);
            }
        };

        let current = self
            .store
            .get(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;

        let mut updated = current.clone();
        updated.status = IntegrationStatus::Active;
        updated.access_token = Some(grant.access_token);
        updated.token_expires_at = grant.expires_at;
        if !grant.scopes.is_empty() {
            updated.scopes = grant.scopes;
        }

        let saved = self
            .store
            .compare_and_replace(current.updated_at, updated)
            .await?;

        info!("refreshed token for integration {id}");
        Ok(RefreshOutcome::Refreshed(saved))
    }
}
