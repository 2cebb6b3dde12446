//! End-to-end pipeline scenario over in-process fakes:
//! creation event → resolve → durable row → deadline passes → adjudication
//! call → verdict persisted → never dispatched again.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use betindex_chain::error::ChainError;
use betindex_chain::listener::{CreationListener, CreationStream};
use betindex_chain::reader::{BetDetails, BetResolver};
use betindex_core::config::ReconnectConfig;
use betindex_core::store::AgreementStore;
use betindex_core::types::{Agreement, CreationEvent};
use betindex_engine::judge::{Adjudicator, JudgeError, Notifier};
use betindex_engine::{Ingestor, Scheduler};
use betindex_storage::MemoryStore;

struct ScriptedListener {
    sessions: Mutex<VecDeque<Vec<Result<CreationEvent, ChainError>>>>,
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

struct FixedResolver {
    details: BetDetails,
}

#[async_trait]
impl BetResolver for FixedResolver {
    async fn resolve(&self, _address: &str) -> Result<BetDetails, ChainError> {
        Ok(self.details.clone())
    }
}

/// Records the judge_bet request bodies it would have sent.
struct RecordingJudge {
    verdict: bool,
    requests: Mutex<Vec<(String, String, Vec<String>)>>,
    notified: AtomicU32,
}

#[async_trait]
impl Adjudicator for RecordingJudge {
    async fn judge(&self, bet: &Agreement) -> Result<bool, JudgeError> {
        self.requests.lock().unwrap().push((
            bet.address.clone(),
            bet.message.clone(),
            vec![],
        ));
        Ok(self.verdict)
    }
}

#[async_trait]
impl Notifier for RecordingJudge {
    async fn notify_created(&self, _bet: &Agreement) -> Result<(), JudgeError> {
        self.notified.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[tokio::test]
async fn creation_to_verdict() {
    let bet_address = format!("0x{}", "aa".repeat(20));
    let initiator = format!("0x{}", "bb".repeat(20));
    let judge_address = format!("0x{}", "cc".repeat(20));

    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let service = Arc::new(RecordingJudge {
        verdict: true,
        requests: Mutex::new(vec![]),
        notified: AtomicU32::new(0),
    });

    // The factory emits one creation event
    let listener = ScriptedListener {
        sessions: Mutex::new(VecDeque::from([vec![Ok(CreationEvent {
            bet_address: bet_address.clone(),
            initiator: initiator.clone(),
        })]])),
    };
    let resolver = FixedResolver {
        details: BetDetails {
            judge: judge_address.clone(),
            end_time: 1000,
            message: "it will rain".into(),
        },
    };

    let ingestor = Ingestor::new(
        Arc::new(listener),
        Arc::new(resolver),
        store.clone(),
        Some(service.clone()),
        ReconnectConfig::default(),
    );
    ingestor.run_session().await.unwrap();

    // One durable row, unjudged, announced downstream
    let row = store.get_by_address(&bet_address).await.unwrap().unwrap();
    assert_eq!(row.initiator, initiator);
    assert_eq!(row.judge, judge_address);
    assert_eq!(row.end_time, 1000);
    assert!(!row.judged);
    assert_eq!(service.notified.load(Ordering::Relaxed), 1);

    let scheduler = Scheduler::new(store.clone(), service.clone(), Duration::from_secs(10));

    // Before the deadline nothing is dispatched
    let report = scheduler.run_cycle(1000).await;
    assert_eq!(report.scanned, 0);

    // Clock passes the deadline: one dispatch with the recorded body shape
    let report = scheduler.run_cycle(1001).await;
    assert_eq!(report.scanned, 1);
    assert_eq!(report.judged, 1);
    {
        let requests = service.requests.lock().unwrap();
        assert_eq!(
            *requests,
            vec![(bet_address.clone(), "it will rain".to_string(), vec![])]
        );
    }

    // Verdict persisted, flag flipped
    let row = store.get_by_address(&bet_address).await.unwrap().unwrap();
    assert!(row.judged);
    assert_eq!(row.verdict, Some(true));

    // The next scan no longer selects it
    let report = scheduler.run_cycle(2000).await;
    assert_eq!(report.scanned, 0);
    assert_eq!(service.requests.lock().unwrap().len(), 1);
}
