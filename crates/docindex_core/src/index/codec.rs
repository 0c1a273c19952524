//! Posting key codec.
//!
//! Posting keys are single byte strings whose lexicographic order gives
//! prefix and range scans over one field:
//!
//! ```text
//! unsharded: code(scope) 0x00                                  esc(value) 0x00 selfid
//! sharded:   code(scope) 0x01 code(shard) esc(shard_value) 0x00 esc(value) 0x00 selfid
//! ```
//!
//! - `code(c)` is one length byte followed by the minimal big-endian bytes of
//!   `c`, which keeps codes short and prefix-free.
//! - `esc` maps `0x00` to `01 01` and `0x01` to `01 02`; a bare `0x00`
//!   terminates the string. Escaping preserves byte order, and a value sorts
//!   before every longer value it prefixes.
//! - UTF-8 never contains `0xFF`, so [`FORWARD_MATCH`] sorts above any
//!   escaped value, shard value or selfid byte.
//!
//! ## Invariants
//!
//! - Within one scope (and shard) prefix, keys sort by value, then selfid
//! - An empty value with no shard key is never encoded

use crate::error::{CoreError, CoreResult};
use crate::types::Code;
use serde::Serialize;

/// Marker following the scope code of an unsharded posting.
const UNSHARDED: u8 = 0x00;
/// Marker following the scope code of a sharded posting.
const SHARDED: u8 = 0x01;
/// Escape byte inside escaped strings.
const ESCAPE: u8 = 0x01;
/// Terminator of escaped strings.
const TERMINATOR: u8 = 0x00;

/// Appended to a value prefix, closes a range strictly below every key
/// carrying a longer value (the value terminator itself).
pub const EXCLUSIVE_UPPER: u8 = TERMINATOR;

/// Appended to a prefix, produces a key above every key sharing the prefix.
pub const FORWARD_MATCH: u8 = 0xFF;

/// Shard component of a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardRef<'a> {
    /// Code of the shard-key name.
    pub code: Code,
    /// Shard-key value.
    pub value: &'a str,
}

/// All components of a decoded posting key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedPosting {
    /// Scope code.
    pub scope: Code,
    /// Shard code and value, if the posting is sharded.
    pub shard: Option<(Code, String)>,
    /// Indexed value.
    pub value: String,
    /// Owning document id.
    pub selfid: String,
}

fn push_code(out: &mut Vec<u8>, code: Code) {
    let bytes = code.as_u64().to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    out.push((bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

fn read_code(key: &[u8], pos: usize) -> CoreResult<(Code, usize)> {
    let len = *key
        .get(pos)
        .ok_or_else(|| CoreError::invalid_format("posting key truncated before code"))?
        as usize;
    if len > 8 {
        return Err(CoreError::invalid_format(format!(
            "code length {len} exceeds 8 bytes"
        )));
    }
    let body = key
        .get(pos + 1..pos + 1 + len)
        .ok_or_else(|| CoreError::invalid_format("posting key truncated inside code"))?;
    let value = body.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    Ok((Code::new(value), pos + 1 + len))
}

fn push_escaped(out: &mut Vec<u8>, s: &[u8]) {
    for &b in s {
        match b {
            0x00 => out.extend_from_slice(&[ESCAPE, 0x01]),
            0x01 => out.extend_from_slice(&[ESCAPE, 0x02]),
            _ => out.push(b),
        }
    }
}

fn read_escaped(key: &[u8], mut pos: usize) -> CoreResult<(String, usize)> {
    let mut raw = Vec::new();
    loop {
        let b = *key
            .get(pos)
            .ok_or_else(|| CoreError::invalid_format("unterminated string in posting key"))?;
        pos += 1;
        match b {
            TERMINATOR => break,
            ESCAPE => {
                let next = key
                    .get(pos)
                    .ok_or_else(|| CoreError::invalid_format("dangling escape in posting key"))?;
                pos += 1;
                match next {
                    0x01 => raw.push(0x00),
                    0x02 => raw.push(0x01),
                    other => {
                        return Err(CoreError::invalid_format(format!(
                            "invalid escape sequence 01 {other:02x}"
                        )))
                    }
                }
            }
            _ => raw.push(b),
        }
    }
    let s = String::from_utf8(raw)
        .map_err(|_| CoreError::invalid_format("posting key string is not UTF-8"))?;
    Ok((s, pos))
}

/// Prefix shared by every posting of a scope (and shard, if given).
#[must_use]
pub fn scope_prefix(scope: Code, shard: Option<ShardRef<'_>>) -> Vec<u8> {
    let mut out = Vec::with_capacity(16);
    push_code(&mut out, scope);
    match shard {
        None => out.push(UNSHARDED),
        Some(shard) => {
            out.push(SHARDED);
            push_code(&mut out, shard.code);
            push_escaped(&mut out, shard.value.as_bytes());
            out.push(TERMINATOR);
        }
    }
    out
}

/// Prefix of every posting whose value starts with `value`.
#[must_use]
pub fn value_prefix(scope: Code, shard: Option<ShardRef<'_>>, value: &str) -> Vec<u8> {
    let mut out = scope_prefix(scope, shard);
    push_escaped(&mut out, value.as_bytes());
    out
}

/// Prefix of every posting whose value equals `value`.
#[must_use]
pub fn value_prefix_terminated(scope: Code, shard: Option<ShardRef<'_>>, value: &str) -> Vec<u8> {
    let mut out = value_prefix(scope, shard, value);
    out.push(EXCLUSIVE_UPPER);
    out
}

/// Encodes a posting key.
///
/// # Errors
///
/// Returns a validation error for an empty value without a shard key, and
/// for a blank selfid.
pub fn encode_posting(
    scope: Code,
    selfid: &str,
    value: &str,
    shard: Option<ShardRef<'_>>,
) -> CoreResult<Vec<u8>> {
    if value.is_empty() && shard.is_none() {
        return Err(CoreError::validation(
            "an empty value without a shard key cannot be indexed",
        ));
    }
    if selfid.is_empty() {
        return Err(CoreError::validation("posting selfid is blank"));
    }
    let mut out = value_prefix_terminated(scope, shard, value);
    out.extend_from_slice(selfid.as_bytes());
    Ok(out)
}

/// Extracts the scope code of a posting key.
///
/// Only the leading code is read; this is what partial updates compare to
/// decide whether two postings belong to the same field.
pub fn decode_scope(key: &[u8]) -> CoreResult<Code> {
    read_code(key, 0).map(|(code, _)| code)
}

/// Decodes every component of a posting key.
pub fn decode_posting(key: &[u8]) -> CoreResult<DecodedPosting> {
    let (scope, pos) = read_code(key, 0)?;
    let marker = *key
        .get(pos)
        .ok_or_else(|| CoreError::invalid_format("posting key truncated after scope"))?;
    let (shard, pos) = match marker {
        UNSHARDED => (None, pos + 1),
        SHARDED => {
            let (code, pos) = read_code(key, pos + 1)?;
            let (value, pos) = read_escaped(key, pos)?;
            (Some((code, value)), pos)
        }
        other => {
            return Err(CoreError::invalid_format(format!(
                "unknown shard marker {other:02x}"
            )))
        }
    };
    let (value, pos) = read_escaped(key, pos)?;
    let selfid = std::str::from_utf8(&key[pos..])
        .map_err(|_| CoreError::invalid_format("posting selfid is not UTF-8"))?
        .to_string();
    Ok(DecodedPosting {
        scope,
        shard,
        value,
        selfid,
    })
}

/// Encodes a registry code as a table value.
#[must_use]
pub fn encode_code_value(code: Code) -> [u8; 8] {
    code.as_u64().to_be_bytes()
}

/// Decodes a registry code table value.
pub fn decode_code_value(bytes: &[u8]) -> CoreResult<Code> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| {
        CoreError::invalid_format(format!("registry code has {} bytes, expected 8", bytes.len()))
    })?;
    Ok(Code::new(u64::from_be_bytes(raw)))
}

/// Encodes an ancestor record: a big-endian u32 count followed by
/// u32-length-prefixed posting keys.
#[must_use]
pub fn encode_ancestor(keys: &[Vec<u8>]) -> Vec<u8> {
    let total: usize = keys.iter().map(|k| 4 + k.len()).sum();
    let mut out = Vec::with_capacity(4 + total);
    out.extend_from_slice(&(keys.len() as u32).to_be_bytes());
    for key in keys {
        out.extend_from_slice(&(key.len() as u32).to_be_bytes());
        out.extend_from_slice(key);
    }
    out
}

fn read_u32(data: &[u8], pos: usize) -> CoreResult<u32> {
    let raw: [u8; 4] = data
        .get(pos..pos + 4)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| CoreError::invalid_format("ancestor record truncated"))?;
    Ok(u32::from_be_bytes(raw))
}

/// Decodes an ancestor record.
pub fn decode_ancestor(data: &[u8]) -> CoreResult<Vec<Vec<u8>>> {
    let count = read_u32(data, 0)? as usize;
    let mut pos = 4;
    let mut keys = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let len = read_u32(data, pos)? as usize;
        pos += 4;
        let key = data
            .get(pos..pos + len)
            .ok_or_else(|| CoreError::invalid_format("ancestor record truncated"))?;
        keys.push(key.to_vec());
        pos += len;
    }
    if pos != data.len() {
        return Err(CoreError::invalid_format(format!(
            "ancestor record has {} trailing bytes",
            data.len() - pos
        )));
    }
    Ok(keys)
}
