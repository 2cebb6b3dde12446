//! Deadline scan and adjudication dispatch.
//!
//! Every tick: scan the store for bets whose deadline has passed and which
//! have not been judged, then dispatch each sequentially to the external
//! adjudicator. A bet that fails to dispatch or persist stays eligible and
//! is retried on the next cycle — the scan itself is the only retry
//! mechanism, and it is unbounded.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use betindex_core::store::AgreementStore;

use crate::judge::Adjudicator;

/// Outcome of one scan-and-dispatch cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Bets selected by the scan.
    pub scanned: usize,
    /// Bets judged and persisted this cycle.
    pub judged: usize,
    /// Bets left for the next cycle after a dispatch or persist failure.
    pub failed: usize,
}

/// Timer-driven scan-and-dispatch loop.
pub struct Scheduler {
    store: Arc<dyn AgreementStore>,
    adjudicator: Arc<dyn Adjudicator>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn AgreementStore>,
        adjudicator: Arc<dyn Adjudicator>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            adjudicator,
            interval,
        }
    }

    /// Run cycles at the configured interval until process termination.
    ///
    /// A cycle runs to completion before the next tick is awaited, so
    /// dispatch never overlaps between cycles.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            let report = self.run_cycle(Utc::now().timestamp()).await;
            if report.scanned > 0 {
                info!(
                    scanned = report.scanned,
                    judged = report.judged,
                    failed = report.failed,
                    "adjudication cycle complete"
                );
            }
        }
    }

    /// One scan-and-dispatch cycle against the clock value `now`.
    ///
    /// One bet's failure never prevents the rest of the cycle from being
    /// processed.
    pub async fn run_cycle(&self, now: i64) -> CycleReport {
        let due = match self.store.eligible(now).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "eligibility scan failed");
                return CycleReport::default();
            }
        };

        let mut report = CycleReport {
            scanned: due.len(),
            ..Default::default()
        };

        for bet in &due {
            debug!(address = %bet.address, "dispatching bet for adjudication");
            match self.adjudicator.judge(bet).await {
                Ok(verdict) => match self.store.mark_judged(bet.id, verdict).await {
                    Ok(true) => {
                        info!(address = %bet.address, verdict, "bet judged");
                        report.judged += 1;
                    }
                    Ok(false) => {
                        debug!(address = %bet.address, "bet already judged, skipping");
                    }
                    Err(e) => {
                        warn!(
                            address = %bet.address,
                            error = %e,
                            "failed to persist verdict, will retry next cycle"
                        );
                        report.failed += 1;
                    }
                },
                Err(e) => {
                    warn!(
                        address = %bet.address,
                        error = %e,
                        "adjudication call failed, will retry next cycle"
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
