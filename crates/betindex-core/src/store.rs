//! The durable store contract shared by both pipeline loops.
//!
//! The ingestor only inserts; the scheduler only scans and flips the
//! `judged` flag. Each operation is individually atomic — there is no
//! cross-operation transaction, and none is needed while dispatch within a
//! scan cycle stays sequential.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Agreement, NewAgreement};

/// Errors surfaced by an [`AgreementStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An agreement with this address is already indexed.
    #[error("agreement already indexed for address {address}")]
    Duplicate { address: String },

    /// No agreement with the given identity.
    #[error("no agreement with id {id}")]
    NotFound { id: i64 },

    #[error("storage error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns `true` if this is the idempotency conflict on re-delivered
    /// creation events, which callers treat as success-shaped.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

/// Keyed durable storage for bet agreements.
#[async_trait]
pub trait AgreementStore: Send + Sync {
    /// Insert a new agreement, assigning its identity.
    ///
    /// Must be atomic and keyed unique on `address`: a second insert for the
    /// same address fails with [`StoreError::Duplicate`] and leaves exactly
    /// one row.
    async fn insert(&self, bet: NewAgreement) -> Result<Agreement, StoreError>;

    /// All agreements with `end_time < now` that have not been judged.
    ///
    /// Ordering is unspecified.
    async fn eligible(&self, now: i64) -> Result<Vec<Agreement>, StoreError>;

    /// Conditionally record an adjudication outcome.
    ///
    /// Atomically sets `judged = true` and stores the verdict iff the row is
    /// still unjudged. Returns `true` if the row transitioned, `false` if it
    /// had already been judged.
    async fn mark_judged(&self, id: i64, verdict: bool) -> Result<bool, StoreError>;

    /// Look up an agreement by its contract address.
    async fn get_by_address(&self, address: &str) -> Result<Option<Agreement>, StoreError>;

    /// Total number of indexed agreements.
    async fn count(&self) -> Result<u64, StoreError>;
}
