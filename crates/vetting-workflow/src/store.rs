//! Process Store
//!
//! Injected persistence seam for verification processes. The engine owns all
//! status/version/history mutation and talks to storage only through
//! [`ProcessStore`]; writes are optimistic — every update carries the version
//! the writer read, and a stale write is rejected, never merged.
//!
//! [`InMemoryProcessStore`] is the default backend and the test substitute.
//! A Postgres backend with the same contract lives behind the `database`
//! feature (see `postgres.rs`).

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use vetting_types::VerificationProcess;

use crate::query::{Page, PageRequest, ProcessFilter};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("process {0} not found")]
    ProcessNotFound(Uuid),

    #[error("process {0} already exists")]
    DuplicateProcess(Uuid),

    #[error("process {process_id} version check failed (expected {expected}, found {actual})")]
    VersionConflict {
        process_id: Uuid,
        expected: u64,
        actual: u64,
    },

    #[error("message {0} not found")]
    MessageNotFound(Uuid),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Read/write/version-check contract for process persistence.
#[async_trait]
pub trait ProcessStore: Send + Sync {
    async fn insert(&self, process: &VerificationProcess) -> Result<(), StoreError>;

    async fn load(&self, id: Uuid) -> Result<VerificationProcess, StoreError>;

    /// Persist a mutated process. `expected_version` is the version the
    /// writer read before mutating; the write is rejected with
    /// [`StoreError::VersionConflict`] if the stored version differs.
    async fn update(
        &self,
        process: &VerificationProcess,
        expected_version: u64,
    ) -> Result<(), StoreError>;

    /// Single filtered query with server-side pagination, newest first.
    async fn query(
        &self,
        filter: &ProcessFilter,
        page: &PageRequest,
    ) -> Result<Page<VerificationProcess>, StoreError>;
}

/// In-memory process store over a `tokio::sync::RwLock` map.
#[derive(Debug, Default)]
pub struct InMemoryProcessStore {
    inner: RwLock<HashMap<Uuid, VerificationProcess>>,
}

impl InMemoryProcessStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessStore for InMemoryProcessStore {
    async fn insert(&self, process: &VerificationProcess) -> Result<(), StoreError> {
        let mut map = self.inner.write().await;
        if map.contains_key(&process.id) {
            return Err(StoreError::DuplicateProcess(process.id));
        }
        map.insert(process.id, process.clone());
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<VerificationProcess, StoreError> {
        self.inner
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::ProcessNotFound(id))
    }

    async fn update(
        &self,
        process: &VerificationProcess,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut map = self.inner.write().await;
        let stored = map
            .get_mut(&process.id)
            .ok_or(StoreError::ProcessNotFound(process.id))?;
        if stored.version != expected_version {
            return Err(StoreError::VersionConflict {
                process_id: process.id,
                expected: expected_version,
                actual: stored.version,
            });
        }
        *stored = process.clone();
        Ok(())
    }

    async fn query(
        &self,
        filter: &ProcessFilter,
        page: &PageRequest,
    ) -> Result<Page<VerificationProcess>, StoreError> {
        let now = Utc::now();
        let map = self.inner.read().await;
        let mut matched: Vec<&VerificationProcess> =
            map.values().filter(|p| filter.matches(p, now)).collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matched.len();
        let items = matched
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect();

        Ok(Page {
            items,
            total,
            offset: page.offset,
            limit: page.limit,
        })
    }
}
