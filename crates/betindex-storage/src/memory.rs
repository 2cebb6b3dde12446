//! In-memory agreement store.
//!
//! All data is lost when the process exits. Used in tests and for running
//! the watcher without a database file.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use betindex_core::store::{AgreementStore, StoreError};
use betindex_core::types::{Agreement, NewAgreement};

#[derive(Default)]
struct Inner {
    next_id: i64,
    rows: Vec<Agreement>,
}

/// Mutex-guarded in-memory backend.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgreementStore for MemoryStore {
    async fn insert(&self, bet: NewAgreement) -> Result<Agreement, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.rows.iter().any(|r| r.address == bet.address) {
            return Err(StoreError::Duplicate {
                address: bet.address,
            });
        }
        inner.next_id += 1;
        let now = Utc::now().timestamp();
        let agreement = Agreement {
            id: inner.next_id,
            address: bet.address,
            initiator: bet.initiator,
            judge: bet.judge,
            message: bet.message,
            end_time: bet.end_time,
            judged: false,
            verdict: None,
            state: bet.state,
            created_at: now,
            updated_at: now,
        };
        inner.rows.push(agreement.clone());
        Ok(agreement)
    }

    async fn eligible(&self, now: i64) -> Result<Vec<Agreement>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .rows
            .iter()
            .filter(|r| r.is_eligible(now))
            .cloned()
            .collect())
    }

    async fn mark_judged(&self, id: i64, verdict: bool) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let row = inner
            .rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound { id })?;
        if row.judged {
            return Ok(false);
        }
        row.judged = true;
        row.verdict = Some(verdict);
        row.updated_at = Utc::now().timestamp();
        Ok(true)
    }

    async fn get_by_address(&self, address: &str) -> Result<Option<Agreement>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.rows.iter().find(|r| r.address == address).cloned())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.inner.lock().unwrap().rows.len() as u64)
    }
}
