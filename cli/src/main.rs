//! betindex — watch a bet factory, index new bets, trigger adjudication.
//!
//! Configuration comes from `BETINDEX_*` environment variables; see
//! [`WatchConfig::from_env`]. Set `BETINDEX_DB_PATH` for a persistent
//! SQLite store, otherwise agreements live in memory for the process
//! lifetime.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use betindex_chain::listener::WsCreationListener;
use betindex_chain::reader::BetReader;
use betindex_chain::rpc::HttpRpc;
use betindex_core::config::WatchConfig;
use betindex_core::store::AgreementStore;
use betindex_engine::judge::{Adjudicator, JudgeClient, Notifier};
use betindex_engine::{Ingestor, Scheduler};
use betindex_storage::sqlite::SqliteStore;
use betindex_storage::MemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = WatchConfig::from_env().context("loading configuration")?;
    info!(
        factory = %config.factory_address,
        judge_service = %config.judge_base_url,
        "starting betindex"
    );

    let store: Arc<dyn AgreementStore> = match std::env::var("BETINDEX_DB_PATH") {
        Ok(path) => Arc::new(
            SqliteStore::open(&path)
                .await
                .with_context(|| format!("opening sqlite store at {path}"))?,
        ),
        Err(_) => {
            warn!("BETINDEX_DB_PATH not set, agreements will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    let listener = Arc::new(
        WsCreationListener::new(&config.chain.ws_url, &config.factory_address)
            .with_connect_timeout(config.http_timeout()),
    );
    let resolver = Arc::new(BetReader::new(HttpRpc::new(
        &config.chain.rpc_url,
        config.http_timeout(),
    )));
    let service = Arc::new(JudgeClient::new(
        &config.judge_base_url,
        config.http_timeout(),
    ));

    let ingestor = Ingestor::new(
        listener,
        resolver,
        store.clone(),
        Some(service.clone() as Arc<dyn Notifier>),
        config.reconnect.clone(),
    );
    let scheduler = Scheduler::new(
        store,
        service as Arc<dyn Adjudicator>,
        config.scan_interval(),
    );

    tokio::spawn(async move { ingestor.run().await });
    scheduler.run().await;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}
