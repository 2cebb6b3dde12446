//! betindex-chain — everything that touches the chain node.
//!
//! - [`rpc`] — JSON-RPC 2.0 wire types and the HTTP call transport
//! - [`abi`] — fixed typed codec for the bet contract surface
//! - [`reader`] — per-contract state resolution over `eth_call`
//! - [`listener`] — live WebSocket subscription to factory creation events

pub mod abi;
pub mod error;
pub mod listener;
pub mod reader;
pub mod rpc;

pub use error::ChainError;
pub use listener::{CreationListener, CreationStream, WsCreationListener};
pub use reader::{BetDetails, BetReader, BetResolver};
pub use rpc::{HttpRpc, RpcTransport};
