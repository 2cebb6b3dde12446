//! Live WebSocket subscription to factory creation events.
//!
//! The listener subscribes with `eth_subscribe("logs", …)` filtered to the
//! factory address and the creation event's topic0, and yields decoded
//! [`CreationEvent`]s. The stream ends when the connection does — including
//! a clean server close — and the owning loop resubscribes. No cursor is
//! kept, so events published during a reconnect gap are not replayed.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use betindex_core::types::CreationEvent;

use crate::abi;
use crate::error::ChainError;

/// A stream of creation events from one subscription session.
pub type CreationStream = Pin<Box<dyn Stream<Item = Result<CreationEvent, ChainError>> + Send>>;

/// Abstracts over the live event source.
#[async_trait]
pub trait CreationListener: Send + Sync {
    /// Open one subscription session.
    ///
    /// An `Err` item or stream end signals session termination; both are
    /// retryable by calling `subscribe` again.
    async fn subscribe(&self) -> Result<CreationStream, ChainError>;
}

/// WebSocket implementation of [`CreationListener`].
pub struct WsCreationListener {
    ws_url: String,
    factory_address: String,
    connect_timeout: Duration,
}

impl WsCreationListener {
    pub fn new(ws_url: impl Into<String>, factory_address: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            factory_address: factory_address.into().to_ascii_lowercase(),
            connect_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl CreationListener for WsCreationListener {
    async fn subscribe(&self) -> Result<CreationStream, ChainError> {
        let (ws_stream, _) =
            tokio::time::timeout(self.connect_timeout, connect_async(&self.ws_url))
                .await
                .map_err(|_| ChainError::Ws("connect timed out".into()))?
                .map_err(|e| ChainError::Ws(e.to_string()))?;

        let (mut write, read) = ws_stream.split();

        let sub_msg = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_subscribe",
            "params": ["logs", {
                "address": [self.factory_address],
                "topics": [abi::creation_topic()],
            }]
        });
        write
            .send(Message::Text(sub_msg.to_string()))
            .await
            .map_err(|e| ChainError::Ws(e.to_string()))?;

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(run_read_loop(write, read, tx));
        Ok(Box::pin(rx))
    }
}

async fn run_read_loop<W, R>(
    mut write: W,
    mut read: R,
    mut tx: mpsc::Sender<Result<CreationEvent, ChainError>>,
) where
    W: Sink<Message> + Unpin + Send,
    R: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin + Send,
{
    while let Some(msg) = read.next().await {
        match msg {
            Err(e) => {
                warn!(error = %e, "WebSocket receive error");
                let _ = tx.send(Err(ChainError::Ws(e.to_string()))).await;
                return;
            }
            Ok(Message::Text(text)) => {
                if let Some(event) = parse_creation_event(&text) {
                    if tx.send(Ok(event)).await.is_err() {
                        // Receiver dropped
                        return;
                    }
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => {
                debug!("WebSocket closed by server");
                let _ = tx.send(Err(ChainError::SubscriptionClosed)).await;
                return;
            }
            Ok(_) => {} // binary / pong — ignore
        }
    }
    // Clean EOF without a close frame
    let _ = tx.send(Err(ChainError::SubscriptionClosed)).await;
}

// ─── Message parsing ─────────────────────────────────────────────────────────

/// Parse an `eth_subscription` notification into a [`CreationEvent`].
///
/// Returns `None` for subscription confirmations, removed (reorged) logs,
/// and undecodable entries — the last with a logged warning. A bad entry
/// never terminates the session.
fn parse_creation_event(text: &str) -> Option<CreationEvent> {
    let v: Value = serde_json::from_str(text).ok()?;

    if v.get("method").and_then(|m| m.as_str()) != Some("eth_subscription") {
        return None; // subscription ID confirmation or unrelated frame
    }
    let result = v.get("params").and_then(|p| p.get("result"))?;

    if result
        .get("removed")
        .and_then(|r| r.as_bool())
        .unwrap_or(false)
    {
        debug!("skipping removed log");
        return None;
    }

    match decode_log(result) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, "skipping undecodable log entry");
            None
        }
    }
}

/// Both event fields are indexed, so they live in topics, not in the data
/// payload: topics[0] is the signature, topics[1] the bet address, topics[2]
/// the initiator.
fn decode_log(result: &Value) -> Result<CreationEvent, ChainError> {
    let topics: Vec<&str> = result
        .get("topics")
        .and_then(|t| t.as_array())
        .ok_or_else(|| ChainError::Decode("log entry has no topics".into()))?
        .iter()
        .filter_map(|t| t.as_str())
        .collect();

    if topics.len() < 3 {
        return Err(ChainError::Decode(format!(
            "expected 3 topics, got {}",
            topics.len()
        )));
    }

    Ok(CreationEvent {
        bet_address: abi::address_from_topic(topics[1])?,
        initiator: abi::address_from_topic(topics[2])?,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(topics: &[String], removed: bool) -> String {
        serde_json::json!({
            "jsonrpc": "2.0",
            "method": "eth_subscription",
            "params": {
                "subscription": "0xsub",
                "result": {
                    "address": "0x67a3b0e1efd7e967b28b6b76f172eb4b3294c425",
                    "topics": topics,
                    "data": "0x",
                    "blockNumber": "0x1234",
                    "logIndex": "0x0",
                    "transactionHash": "0xdeadbeef",
                    "removed": removed,
                }
            }
        })
        .to_string()
    }

    fn topic_for(byte: &str) -> String {
        format!("0x{}{}", "00".repeat(12), byte.repeat(20))
    }

    #[test]
    fn parse_creation_notification() {
        let msg = notification(
            &[
                abi::creation_topic(),
                topic_for("aa"),
                topic_for("bb"),
            ],
            false,
        );
        let event = parse_creation_event(&msg).unwrap();
        assert_eq!(event.bet_address, format!("0x{}", "aa".repeat(20)));
        assert_eq!(event.initiator, format!("0x{}", "bb".repeat(20)));
    }

    #[test]
    fn skip_subscription_confirmation() {
        let msg = r#"{"jsonrpc":"2.0","id":1,"result":"0xsubid"}"#;
        assert!(parse_creation_event(msg).is_none());
    }

    #[test]
    fn skip_removed_log() {
        let msg = notification(
            &[abi::creation_topic(), topic_for("aa"), topic_for("bb")],
            true,
        );
        assert!(parse_creation_event(&msg).is_none());
    }

    #[test]
    fn skip_log_with_missing_topics() {
        // Only the signature topic — indexed fields are absent
        let msg = notification(&[abi::creation_topic()], false);
        assert!(parse_creation_event(&msg).is_none());
    }

    #[test]
    fn skip_unparseable_frame() {
        assert!(parse_creation_event("not json").is_none());
    }
}
