// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document integrity: SHA-256 over canonical document bytes.

use certitrust_core::types::Digest;
use sha2::{Digest as _, Sha256};

/// Compute the SHA-256 digest of canonical document bytes.
///
/// Pure: no salt, no process state. The same bytes always produce the same
/// digest.
pub fn hash_document(canonical: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(canonical);
    Digest(hasher.finalize().into())
}

/// Compute the SHA-256 hash of `data` and return it as a lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    hash_document(data).to_hex()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SHA-256 of the empty byte slice (well-known constant).
    const EMPTY_SHA256: &str =
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn hash_empty_input() {
        assert_eq!(hash_bytes(b""), EMPTY_SHA256);
    }

    #[test]
    fn hash_known_value() {
        // SHA-256("hello"), checked against coreutils sha256sum.
        let expected = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
        assert_eq!(hash_bytes(b"hello"), expected);
    }

    #[test]
    fn repeated_calls_are_identical() {
        let data = b"%PDF-1.5 certificate body";
        assert_eq!(hash_document(data), hash_document(data));
    }

    #[test]
    fn one_byte_changes_digest() {
        let mut data = b"%PDF-1.5 certificate body".to_vec();
        let before = hash_document(&data);
        data[10] ^= 0x01;
        assert_ne!(hash_document(&data), before);
    }
}
