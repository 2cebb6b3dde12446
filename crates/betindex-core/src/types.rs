//! Shared types for the indexing and adjudication pipeline.

use serde::{Deserialize, Serialize};

// ─── BetState ────────────────────────────────────────────────────────────────

/// Lifecycle state of a bet contract, mirrored from chain.
///
/// Stored as an integer column; not consulted by the eligibility scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetState {
    /// Not yet initialised on chain.
    None,
    /// Accepting participants; the default for a freshly indexed bet.
    Open,
    /// Resolved by the judge.
    Closed,
    /// Cancelled by the initiator.
    Cancelled,
}

impl BetState {
    /// Integer representation used by the storage layer.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Open => 1,
            Self::Closed => 2,
            Self::Cancelled => 3,
        }
    }

    /// Inverse of [`BetState::as_u8`]; unknown values map to `None`.
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Open,
            2 => Self::Closed,
            3 => Self::Cancelled,
            _ => Self::None,
        }
    }
}

impl std::fmt::Display for BetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ─── CreationEvent ───────────────────────────────────────────────────────────

/// A decoded factory creation event: one new bet contract.
///
/// Both fields come from indexed log topics; the event carries no data
/// payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationEvent {
    /// Address of the freshly deployed bet contract.
    pub bet_address: String,
    /// Address that asked the factory to deploy it.
    pub initiator: String,
}

// ─── Agreement ───────────────────────────────────────────────────────────────

/// A bet agreement as assembled by the ingestor, before it has an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAgreement {
    pub address: String,
    pub initiator: String,
    pub judge: String,
    pub message: String,
    /// Unix timestamp after which the bet can be adjudicated.
    pub end_time: i64,
    pub state: BetState,
}

/// A persisted bet agreement.
///
/// `address` is unique; `judged` flips false → true exactly once, together
/// with the verdict. Everything else is immutable after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    /// Surrogate identity assigned by the store on insert.
    pub id: i64,
    pub address: String,
    pub initiator: String,
    pub judge: String,
    pub message: String,
    /// Unix timestamp after which the bet can be adjudicated.
    pub end_time: i64,
    /// Set by the scheduler after a successful adjudication call.
    pub judged: bool,
    /// The adjudication outcome, persisted with the `judged` flip.
    pub verdict: Option<bool>,
    pub state: BetState,
    /// Bookkeeping, owned by the storage layer (unix seconds).
    pub created_at: i64,
    pub updated_at: i64,
}

impl Agreement {
    /// Returns `true` if this agreement is due for adjudication at `now`.
    ///
    /// Strict `<`: a bet ending exactly at `now` is not yet due.
    pub fn is_eligible(&self, now: i64) -> bool {
        self.end_time < now && !self.judged
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
