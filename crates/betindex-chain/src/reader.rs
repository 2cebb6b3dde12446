//! Read-only resolution of a bet contract's state.

use async_trait::async_trait;
use serde_json::json;

use crate::abi::{self, BetField, FieldValue};
use crate::error::ChainError;
use crate::rpc::RpcTransport;

/// The on-chain fields of a single bet contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BetDetails {
    pub judge: String,
    pub end_time: i64,
    pub message: String,
}

/// Resolves a bet contract address to its current fields.
#[async_trait]
pub trait BetResolver: Send + Sync {
    async fn resolve(&self, address: &str) -> Result<BetDetails, ChainError>;
}

/// Stateless contract reader over an [`RpcTransport`].
///
/// Each field is an independent `eth_call` round trip; the first failure
/// aborts the whole resolution, so a partially populated record is never
/// produced. No caching, no retries — every resolution re-reads the chain.
pub struct BetReader<T> {
    transport: T,
}

impl<T: RpcTransport> BetReader<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    async fn read_field(&self, address: &str, field: BetField) -> Result<FieldValue, ChainError> {
        let params = vec![
            json!({ "to": address, "data": field.calldata() }),
            json!("latest"),
        ];
        let result = self.transport.call("eth_call", params).await?;
        let hex_str = result.as_str().ok_or_else(|| {
            ChainError::Decode(format!(
                "{} returned non-string result: {result}",
                field.signature()
            ))
        })?;
        field.decode(&abi::hex_to_bytes(hex_str)?)
    }
}

#[async_trait]
impl<T: RpcTransport> BetResolver for BetReader<T> {
    async fn resolve(&self, address: &str) -> Result<BetDetails, ChainError> {
        let judge = match self.read_field(address, BetField::Judge).await? {
            FieldValue::Address(a) => a,
            other => {
                return Err(ChainError::Decode(format!(
                    "judge() decoded to unexpected value: {other:?}"
                )))
            }
        };
        let end_time = match self.read_field(address, BetField::EndTime).await? {
            FieldValue::Uint(t) => t as i64,
            other => {
                return Err(ChainError::Decode(format!(
                    "endTime() decoded to unexpected value: {other:?}"
                )))
            }
        };
        let message = match self.read_field(address, BetField::Message).await? {
            FieldValue::Str(m) => m,
            other => {
                return Err(ChainError::Decode(format!(
                    "message() decoded to unexpected value: {other:?}"
                )))
            }
        };

        Ok(BetDetails {
            judge,
            end_time,
            message,
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
