// ABOUTME: Integration store trait and in-memory compare-and-replace implementation
// ABOUTME: All shared record mutations go through CAS keyed on updated_at, never blind overwrite
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Stratus Console

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult};
use crate::models::Integration;

/// Persistence seam for integration records, scoped per tenant.
///
/// The engine mutates records only through [`compare_and_replace`]
/// (Self::compare_and_replace) so that racing writers (OAuth completion,
/// refresh, bulk status updates) cannot lose each other's updates.
#[async_trait]
pub trait IntegrationStore: Send + Sync {
    /// Insert a new record; fails if the id already exists
    async fn create(&self, integration: Integration) -> EngineResult<Integration>;

    /// Fetch a record by id
    async fn get(&self, id: Uuid) -> EngineResult<Option<Integration>>;

    /// List all records owned by a tenant
    async fn list_for_tenant(&self, tenant_id: Uuid) -> EngineResult<Vec<Integration>>;

    /// Replace the record only if its `updated_at` still equals
    /// `expected_updated_at`; stamps a fresh `updated_at` on success.
    /// Fails with [`EngineError::Conflict`] when the record changed underneath.
    async fn compare_and_replace(
        &self,
        expected_updated_at: DateTime<Utc>,
        updated: Integration,
    ) -> EngineResult<Integration>;

    /// Delete a record by id
    async fn delete(&self, id: Uuid) -> EngineResult<()>;
}

/// In-process store backed by a sharded concurrent map.
///
/// The entry API gives atomic read-modify-write per record without a global
/// lock, which is what makes the CAS contract cheap to honor here.
#[derive(Debug, Default)]
pub struct InMemoryIntegrationStore {
    records: DashMap<Uuid, Integration>,
}

impl InMemoryIntegrationStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl IntegrationStore for InMemoryIntegrationStore {
    async fn create(&self, integration: Integration) -> EngineResult<Integration> {
        match self.records.entry(integration.id) {
            Entry::Occupied(_) => Err(EngineError::store(format!(
                "integration {} already exists",
                integration.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(integration.clone());
                Ok(integration)
            }
        }
    }

    async fn get(&self, id: Uuid) -> EngineResult<Option<Integration>> {
        Ok(self.records.get(&id).map(|r| r.clone()))
    }

    async fn list_for_tenant(&self, tenant_id: Uuid) -> EngineResult<Vec<Integration>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.tenant_id == tenant_id)
            .map(|r| r.clone())
            .collect())
    }

    async fn compare_and_replace(
        &self,
        expected_updated_at: DateTime<Utc>,
        updated: Integration,
    ) -> EngineResult<Integration> {
        match self.records.entry(updated.id) {
            Entry::Occupied(mut slot) => {
                if slot.get().updated_at != expected_updated_at {
                    return Err(EngineError::Conflict(updated.id));
                }
                let mut next = updated;
                next.updated_at = Utc::now();
                slot.insert(next.clone());
                Ok(next)
            }
            Entry::Vacant(_) => Err(EngineError::NotFound(updated.id)),
        }
    }

    async fn delete(&self, id: Uuid) -> EngineResult<()> {
        self.records
            .remove(&id)
            .map(|_| ())
            .ok_or(EngineError::NotFound(id))
    }
}
