//! Change-detection hashing.

use crate::blob::encode_blob;
use crate::error::CodecResult;
use crate::value::{ColumnMap, Value};
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Number of digest bytes kept in a content hash.
const HASH_BYTES: usize = 8;

/// Computes the content hash of a column map.
///
/// The hash is the first eight bytes of SHA-256 over the blob encoding of
/// `columns`, rendered as lowercase hex. It detects changes; it does not
/// authenticate anything.
///
/// # Errors
///
/// Fails only if the map cannot be encoded.
pub fn content_hash(columns: &ColumnMap) -> CodecResult<Value> {
    let encoded = encode_blob(columns)?;
    Ok(Value::Text(hash_text(&encoded)))
}

/// Hashes already-encoded text the same way [`content_hash`] does.
#[must_use]
pub fn hash_text(encoded: &str) -> String {
    let digest = Sha256::digest(encoded.as_bytes());
    digest[..HASH_BYTES]
        .iter()
        .fold(String::with_capacity(HASH_BYTES * 2), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns;

    #[test]
    fn hash_is_stable_and_short() {
        let map = columns! { "id" => 1, "title" => "a" };
        let first = content_hash(&map).unwrap();
        let second = content_hash(&map.clone()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_text().map(str::len), Some(HASH_BYTES * 2));
    }

    #[test]
    fn hash_changes_with_content() {
        let a = content_hash(&columns! { "title" => "a" }).unwrap();
        let b = content_hash(&columns! { "title" => "b" }).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn hash_matches_encoded_text() {
        let map = columns! { "x" => 1 };
        let expected = hash_text(&encode_blob(&map).unwrap());
        assert_eq!(content_hash(&map).unwrap(), Value::Text(expected));
    }
}
