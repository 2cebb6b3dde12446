//! betindex-engine — the two long-lived loops of the watcher.
//!
//! - [`ingest`] — consumes factory creation events, resolves each new bet
//!   contract, and persists one row per bet
//! - [`scheduler`] — scans for deadline-crossed, unjudged bets and drives
//!   them through the external adjudication call
//! - [`judge`] — HTTP client for the judging / notification service

pub mod ingest;
pub mod judge;
pub mod scheduler;

pub use ingest::Ingestor;
pub use judge::{Adjudicator, JudgeClient, JudgeError, Notifier};
pub use scheduler::{CycleReport, Scheduler};
