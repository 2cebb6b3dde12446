//! Creation-event ingestion: one durable row per new bet contract.
//!
//! The driving loop cycles through Connecting → Listening → Backoff: it
//! opens a subscription session, consumes it until the stream ends, and
//! reconnects. A connect failure or a session that delivered nothing grows
//! the backoff delay exponentially up to the configured cap; a productive
//! session resets it.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, info, warn};

use betindex_chain::error::ChainError;
use betindex_chain::listener::CreationListener;
use betindex_chain::reader::BetResolver;
use betindex_core::config::ReconnectConfig;
use betindex_core::store::{AgreementStore, StoreError};
use betindex_core::types::{BetState, CreationEvent, NewAgreement};

use crate::judge::Notifier;

/// Consumes the factory event stream and persists new agreements.
pub struct Ingestor {
    listener: Arc<dyn CreationListener>,
    resolver: Arc<dyn BetResolver>,
    store: Arc<dyn AgreementStore>,
    notifier: Option<Arc<dyn Notifier>>,
    reconnect: ReconnectConfig,
}

impl Ingestor {
    pub fn new(
        listener: Arc<dyn CreationListener>,
        resolver: Arc<dyn BetResolver>,
        store: Arc<dyn AgreementStore>,
        notifier: Option<Arc<dyn Notifier>>,
        reconnect: ReconnectConfig,
    ) -> Self {
        Self {
            listener,
            resolver,
            store,
            notifier,
            reconnect,
        }
    }

    /// Run subscription sessions until process termination.
    pub async fn run(&self) {
        let mut backoff = self.reconnect.initial_backoff();
        loop {
            match self.run_session().await {
                Ok(delivered) if delivered > 0 => {
                    backoff = self.reconnect.initial_backoff();
                    info!(
                        delivered,
                        "subscription ended, resubscribing; events in the gap are not replayed"
                    );
                }
                Ok(_) => {
                    // Connected but the session died without delivering —
                    // treat like a connect failure to avoid hot-looping
                    debug!(delay_ms = backoff.as_millis() as u64, "empty session, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.reconnect.max_backoff());
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        delay_ms = backoff.as_millis() as u64,
                        "subscription connect failed, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.reconnect.max_backoff());
                }
            }
        }
    }

    /// Consume one subscription session to completion.
    ///
    /// Returns the number of events delivered by the session. Stream errors
    /// end the session (the caller resubscribes); per-event failures are
    /// logged and the event is dropped.
    pub async fn run_session(&self) -> Result<u64, ChainError> {
        let mut stream = self.listener.subscribe().await?;
        info!("listening for creation events");

        let mut delivered = 0u64;
        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    delivered += 1;
                    self.ingest_event(event).await;
                }
                Err(e) => {
                    warn!(error = %e, "subscription stream error, session over");
                    break;
                }
            }
        }
        Ok(delivered)
    }

    /// Resolve, persist, and announce a single creation event.
    ///
    /// Every failure path drops the event: there is no retry and no dead
    /// letter, so a transient outage loses that record.
    async fn ingest_event(&self, event: CreationEvent) {
        let details = match self.resolver.resolve(&event.bet_address).await {
            Ok(d) => d,
            Err(e) => {
                warn!(
                    address = %event.bet_address,
                    error = %e,
                    "failed to resolve new bet, dropping event"
                );
                return;
            }
        };

        let bet = NewAgreement {
            address: event.bet_address,
            initiator: event.initiator,
            judge: details.judge,
            message: details.message,
            end_time: details.end_time,
            state: BetState::Open,
        };

        let agreement = match self.store.insert(bet).await {
            Ok(a) => a,
            Err(StoreError::Duplicate { address }) => {
                debug!(address = %address, "already indexed, skipping");
                return;
            }
            Err(e) => {
                warn!(error = %e, "insert failed, dropping event");
                return;
            }
        };
        info!(id = agreement.id, address = %agreement.address, "bet indexed");

        // The insert is the durable side effect; the announcement is not
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify_created(&agreement).await {
                warn!(
                    address = %agreement.address,
                    error = %e,
                    "creation notification failed"
                );
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use betindex_chain::listener::CreationStream;
    use betindex_chain::reader::BetDetails;
    use betindex_core::types::Agreement;
    use betindex_storage::MemoryStore;

    use crate::judge::JudgeError;

    use super::*;

    /// Replays pre-scripted sessions, then fails every connect.
    struct ScriptedListener {
        sessions: Mutex<VecDeque<Vec<Result<CreationEvent, ChainError>>>>,
    }

    impl ScriptedListener {
        fn new(sessions: Vec<Vec<Result<CreationEvent, ChainError>>>) -> Self {
            Self {
                sessions: Mutex::new(sessions.into()),
            }
        }
    }

    #[async_trait]
    impl CreationListener for ScriptedListener {
        async fn subscribe(&self) -> Result<CreationStream, ChainError> {
            match self.sessions.lock().unwrap().pop_front() {
                Some(items) => Ok(Box::pin(futures::stream::iter(items))),
                None => Err(ChainError::Ws("connection refused".into())),
            }
        }
    }

    /// Resolves every address to the same details, except scripted failures.
    struct FixedResolver {
        fail_for: Option<String>,
    }

    #[async_trait]
    impl BetResolver for FixedResolver {
        async fn resolve(&self, address: &str) -> Result<BetDetails, ChainError> {
            if self.fail_for.as_deref() == Some(address) {
                return Err(ChainError::Rpc {
                    code: -32000,
                    message: "execution reverted".into(),
                });
            }
            Ok(BetDetails {
                judge: "0xjudge".into(),
                end_time: 1000,
                message: "it will rain".into(),
            })
        }
    }

    struct FailingNotifier {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify_created(&self, _bet: &Agreement) -> Result<(), JudgeError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Err(JudgeError::Status {
                code: 500,
                body: "boom".into(),
            })
        }
    }

    fn event(n: u8) -> CreationEvent {
        CreationEvent {
            bet_address: format!("0x{}", format!("{n:02x}").repeat(20)),
            initiator: format!("0x{}", "bb".repeat(20)),
        }
    }

    fn ingestor(
        listener: ScriptedListener,
        resolver: FixedResolver,
        store: Arc<MemoryStore>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Ingestor {
        Ingestor::new(
            Arc::new(listener),
            Arc::new(resolver),
            store,
            notifier,
            ReconnectConfig::default(),
        )
    }

    #[tokio::test]
    async fn session_persists_each_event() {
        let store = Arc::new(MemoryStore::new());
        let ing = ingestor(
            ScriptedListener::new(vec![vec![Ok(event(1)), Ok(event(2))]]),
            FixedResolver { fail_for: None },
            store.clone(),
            None,
        );

        let delivered = ing.run_session().await.unwrap();
        assert_eq!(delivered, 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn resubscribe_resumes_after_stream_error() {
        let store = Arc::new(MemoryStore::new());
        let ing = ingestor(
            ScriptedListener::new(vec![
                vec![Ok(event(1)), Err(ChainError::SubscriptionClosed)],
                vec![Ok(event(2))],
            ]),
            FixedResolver { fail_for: None },
            store.clone(),
            None,
        );

        // First session dies mid-stream; the next one picks up new events
        ing.run_session().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        ing.run_session().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn driver_loop_reconnects_until_aborted() {
        let store = Arc::new(MemoryStore::new());
        let ing = Arc::new(Ingestor::new(
            Arc::new(ScriptedListener::new(vec![
                vec![Ok(event(1)), Err(ChainError::SubscriptionClosed)],
                vec![Ok(event(2))],
            ])),
            Arc::new(FixedResolver { fail_for: None }),
            store.clone(),
            None,
            ReconnectConfig {
                initial_backoff_ms: 1,
                max_backoff_ms: 5,
            },
        ));

        let handle = tokio::spawn({
            let ing = ing.clone();
            async move { ing.run().await }
        });

        // Both scripted sessions drain long before this elapses; afterwards
        // the loop just backs off against the exhausted listener
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        handle.abort();

        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn redelivered_event_does_not_duplicate() {
        let store = Arc::new(MemoryStore::new());
        let ing = ingestor(
            ScriptedListener::new(vec![vec![Ok(event(1)), Ok(event(1))]]),
            FixedResolver { fail_for: None },
            store.clone(),
            None,
        );

        ing.run_session().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn resolve_failure_drops_only_that_event() {
        let store = Arc::new(MemoryStore::new());
        let ing = ingestor(
            ScriptedListener::new(vec![vec![Ok(event(1)), Ok(event(2))]]),
            FixedResolver {
                fail_for: Some(event(1).bet_address),
            },
            store.clone(),
            None,
        );

        ing.run_session().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store
            .get_by_address(&event(2).bet_address)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn notification_failure_never_rolls_back_the_insert() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(FailingNotifier {
            calls: AtomicU32::new(0),
        });
        let ing = ingestor(
            ScriptedListener::new(vec![vec![Ok(event(1))]]),
            FixedResolver { fail_for: None },
            store.clone(),
            Some(notifier.clone()),
        );

        ing.run_session().await.unwrap();

        assert_eq!(notifier.calls.load(Ordering::Relaxed), 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
