//! Fixed typed codec for the bet contract surface.
//!
//! The contract interface is known at build time, so decoding runs through a
//! small typed table: each readable field owns its selector and the exact
//! semantic type its return data decodes to. The result is a tagged
//! [`FieldValue`] or an explicit [`ChainError::Decode`] — no dynamic ABI
//! machinery, no runtime type assertions.

use tiny_keccak::{Hasher, Keccak};

use crate::error::ChainError;

/// keccak256 of arbitrary input.
pub fn keccak256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(input);
    hasher.finalize(&mut output);
    output
}

/// 4-byte function selector for a canonical signature like `"endTime()"`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Canonical signature of the factory creation event.
pub const CREATION_EVENT_SIGNATURE: &str = "BetCreated(address,address)";

/// topic0 value that identifies a creation event (`0x…` hex).
pub fn creation_topic() -> String {
    format!("0x{}", hex::encode(keccak256(CREATION_EVENT_SIGNATURE.as_bytes())))
}

// ─── Typed decode table ──────────────────────────────────────────────────────

/// Readable fields of a bet contract, one per zero-argument view call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetField {
    /// `judge()` → address
    Judge,
    /// `endTime()` → uint256
    EndTime,
    /// `message()` → string
    Message,
}

/// A decoded return value, tagged with its semantic type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Address(String),
    Uint(u64),
    Str(String),
}

impl BetField {
    /// Canonical Solidity signature of the view call.
    pub fn signature(self) -> &'static str {
        match self {
            Self::Judge => "judge()",
            Self::EndTime => "endTime()",
            Self::Message => "message()",
        }
    }

    /// `eth_call` data field: the 4-byte selector, hex-encoded.
    pub fn calldata(self) -> String {
        format!("0x{}", hex::encode(selector(self.signature())))
    }

    /// Decode raw return data into this field's semantic type.
    pub fn decode(self, raw: &[u8]) -> Result<FieldValue, ChainError> {
        match self {
            Self::Judge => decode_address(raw).map(FieldValue::Address),
            Self::EndTime => decode_uint(raw).map(FieldValue::Uint),
            Self::Message => decode_string(raw).map(FieldValue::Str),
        }
    }
}

/// Decode a 32-byte word holding a left-padded 20-byte address.
fn decode_address(raw: &[u8]) -> Result<String, ChainError> {
    let word = single_word(raw)?;
    if word[..12].iter().any(|b| *b != 0) {
        return Err(ChainError::Decode(
            "address word has non-zero padding".into(),
        ));
    }
    Ok(format!("0x{}", hex::encode(&word[12..])))
}

/// Decode a 32-byte big-endian unsigned word. Values beyond `u64` are
/// rejected rather than truncated.
fn decode_uint(raw: &[u8]) -> Result<u64, ChainError> {
    let word = single_word(raw)?;
    if word[..24].iter().any(|b| *b != 0) {
        return Err(ChainError::Decode("uint value overflows u64".into()));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(buf))
}

/// Decode an ABI-encoded dynamic string: offset word, length word, then the
/// UTF-8 bytes padded to a 32-byte boundary.
fn decode_string(raw: &[u8]) -> Result<String, ChainError> {
    if raw.len() < 64 {
        return Err(ChainError::Decode(format!(
            "string return too short: {} bytes",
            raw.len()
        )));
    }
    let offset = word_as_usize(&raw[..32])?;
    let len_start = offset
        .checked_add(32)
        .ok_or_else(|| ChainError::Decode("string offset overflow".into()))?;
    if raw.len() < len_start {
        return Err(ChainError::Decode("string offset out of bounds".into()));
    }
    let len = word_as_usize(&raw[offset..len_start])?;
    let data_end = len_start
        .checked_add(len)
        .ok_or_else(|| ChainError::Decode("string length overflow".into()))?;
    if raw.len() < data_end {
        return Err(ChainError::Decode("string data out of bounds".into()));
    }
    String::from_utf8(raw[len_start..data_end].to_vec())
        .map_err(|e| ChainError::Decode(format!("string is not UTF-8: {e}")))
}

fn single_word(raw: &[u8]) -> Result<&[u8], ChainError> {
    if raw.len() < 32 {
        return Err(ChainError::Decode(format!(
            "return data too short: {} bytes",
            raw.len()
        )));
    }
    Ok(&raw[..32])
}

fn word_as_usize(word: &[u8]) -> Result<usize, ChainError> {
    if word.len() < 32 || word[..24].iter().any(|b| *b != 0) {
        return Err(ChainError::Decode("length word overflows usize".into()));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[24..32]);
    Ok(u64::from_be_bytes(buf) as usize)
}

// ─── Log topics ──────────────────────────────────────────────────────────────

/// Extract a 20-byte address from a 32-byte indexed log topic.
pub fn address_from_topic(topic: &str) -> Result<String, ChainError> {
    let hex_str = topic.strip_prefix("0x").unwrap_or(topic);
    if hex_str.len() != 64 || !hex_str.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ChainError::Decode(format!(
            "topic is not a 32-byte hex word: {topic}"
        )));
    }
    Ok(format!("0x{}", hex_str[24..].to_ascii_lowercase()))
}

/// Decode `0x…` hex into bytes.
pub fn hex_to_bytes(s: &str) -> Result<Vec<u8>, ChainError> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(stripped).map_err(|e| ChainError::Decode(format!("invalid hex: {e}")))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
