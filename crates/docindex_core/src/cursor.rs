//! Opaque continuation cursors.
//!
//! A cursor is the last key of a page rendered as lowercase hex. Callers
//! treat it as an opaque token and hand it back unchanged.

use crate::error::{CoreError, CoreResult};
use serde::Serializer;
use std::fmt::Write as _;

/// Encodes a key as a cursor token.
#[must_use]
pub fn encode(key: &[u8]) -> String {
    let mut out = String::with_capacity(key.len() * 2);
    for b in key {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Decodes a cursor token back into a key.
///
/// # Errors
///
/// Returns a validation error for an empty token, an odd length or a
/// non-hex digit.
pub fn decode(token: &str) -> CoreResult<Vec<u8>> {
    if token.is_empty() {
        return Err(CoreError::validation("cursor is empty"));
    }
    if token.len() % 2 != 0 {
        return Err(CoreError::validation("cursor has odd length"));
    }
    token
        .as_bytes()
        .chunks(2)
        .map(|pair| Ok((nibble(pair[0])? << 4) | nibble(pair[1])?))
        .collect()
}

/// Decodes an optional token.
pub fn decode_opt(token: Option<&str>) -> CoreResult<Option<Vec<u8>>> {
    token.map(decode).transpose()
}

fn nibble(c: u8) -> CoreResult<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        _ => Err(CoreError::validation(format!(
            "cursor contains invalid character {:?}",
            char::from(c)
        ))),
    }
}

pub(crate) fn serialize_hex<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_is_lowercase_hex() {
        assert_eq!(encode(&[0x00, 0xab, 0xff]), "00abff");
        assert_eq!(decode("00abff").unwrap(), vec![0x00, 0xab, 0xff]);
    }

    #[test]
    fn malformed_tokens_rejected() {
        for token in ["", "abc", "zz", "AB"] {
            assert!(decode(token).unwrap_err().is_validation(), "{token:?}");
        }
    }

    #[test]
    fn optional_tokens() {
        assert_eq!(decode_opt(None).unwrap(), None);
        assert_eq!(decode_opt(Some("01")).unwrap(), Some(vec![1]));
    }
}
