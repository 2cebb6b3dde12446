//! betindex-core — foundation for the bet indexing and adjudication pipeline.
//!
//! # Architecture
//!
//! ```text
//! WsCreationListener ──▶ Ingestor ──▶ AgreementStore (insert)
//!                           │
//!                           └── BetReader (per-contract state reads)
//!
//! Scheduler ──▶ AgreementStore (scan) ──▶ Adjudicator ──▶ AgreementStore (mark judged)
//! ```
//!
//! Two long-lived loops share one store handle and never talk to each other
//! directly; a single insert and a single conditional update are the only
//! atomicity the design relies on.

pub mod config;
pub mod store;
pub mod types;

pub use config::{ChainEndpoints, ReconnectConfig, WatchConfig};
pub use store::{AgreementStore, StoreError};
pub use types::{Agreement, BetState, CreationEvent, NewAgreement};
