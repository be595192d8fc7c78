// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Proof payload: the versioned binary layout rendered into the QR stamp.
//
// Layout (all integers big-endian):
//
//   [version:1][doc_id_len:2][doc_id][digest:32][sig_len:2][signature]
//   [issuer_id_len:1][issuer_id][issued_at:8]
//
// `issued_at` is a signed count of seconds since the Unix epoch (UTC).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CertiTrustError, Result};
use crate::types::{DIGEST_LEN, Digest, DocumentId, Signature};

/// The only payload version this build understands.
pub const PROOF_VERSION: u8 = 0x01;

/// Upper bound on an encoded payload. A QR code at error-correction level M
/// holds 2331 bytes at version 40, but codes that large do not survive a
/// printed 1-inch stamp; 1 KiB keeps the symbol scannable.
pub const MAX_PROOF_BYTES: usize = 1024;

/// Smallest possible payload: every fixed-width field with empty strings.
const MIN_PAYLOAD_LEN: usize = 1 + 2 + DIGEST_LEN + 2 + 1 + 8;

/// Signed bundle binding a document identity to its digest, issuer, and time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub document_id: DocumentId,
    pub digest: Digest,
    pub signature: Signature,
    pub issuer_id: String,
    /// Seconds since the Unix epoch.
    pub issued_at: i64,
}

impl Proof {
    /// Issuance time as a `DateTime`, if representable.
    pub fn issued_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.issued_at, 0)
    }

    /// Serialise into the QR payload layout.
    ///
    /// Fails with `ProofTooLarge` when a field overflows its length prefix or
    /// the whole payload exceeds [`MAX_PROOF_BYTES`].
    pub fn encode(&self) -> Result<Vec<u8>> {
        let doc_id = self.document_id.as_str().as_bytes();
        let signature = self.signature.as_bytes();
        let issuer = self.issuer_id.as_bytes();

        let doc_id_len = u16::try_from(doc_id.len()).map_err(|_| {
            CertiTrustError::ProofTooLarge(format!("document id is {} bytes", doc_id.len()))
        })?;
        let sig_len = u16::try_from(signature.len()).map_err(|_| {
            CertiTrustError::ProofTooLarge(format!("signature is {} bytes", signature.len()))
        })?;
        let issuer_len = u8::try_from(issuer.len()).map_err(|_| {
            CertiTrustError::ProofTooLarge(format!("issuer id is {} bytes", issuer.len()))
        })?;

        let total = MIN_PAYLOAD_LEN + doc_id.len() + signature.len() + issuer.len();
        if total > MAX_PROOF_BYTES {
            return Err(CertiTrustError::ProofTooLarge(format!(
                "payload is {total} bytes, limit is {MAX_PROOF_BYTES}"
            )));
        }

        let mut out = Vec::with_capacity(total);
        out.push(PROOF_VERSION);
        out.extend_from_slice(&doc_id_len.to_be_bytes());
        out.extend_from_slice(doc_id);
        out.extend_from_slice(self.digest.as_bytes());
        out.extend_from_slice(&sig_len.to_be_bytes());
        out.extend_from_slice(signature);
        out.push(issuer_len);
        out.extend_from_slice(issuer);
        out.extend_from_slice(&self.issued_at.to_be_bytes());

        debug_assert_eq!(out.len(), total);
        Ok(out)
    }

    /// Parse a QR payload. Unknown versions are rejected, never guessed at.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < MIN_PAYLOAD_LEN {
            return Err(CertiTrustError::CorruptProof(format!(
                "payload is {} bytes, minimum is {MIN_PAYLOAD_LEN}",
                payload.len()
            )));
        }

        let mut reader = ByteReader::new(payload);

        let version = reader.u8()?;
        if version != PROOF_VERSION {
            return Err(CertiTrustError::CorruptProof(format!(
                "unsupported payload version 0x{version:02x}"
            )));
        }

        let doc_id_len = reader.u16()? as usize;
        let doc_id = reader.utf8(doc_id_len, "document id")?;

        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(reader.take(DIGEST_LEN, "digest")?);

        let sig_len = reader.u16()? as usize;
        let signature = reader.take(sig_len, "signature")?.to_vec();

        let issuer_len = reader.u8()? as usize;
        let issuer_id = reader.utf8(issuer_len, "issuer id")?;

        let issued_at = i64::from_be_bytes(
            reader
                .take(8, "issued_at")?
                .try_into()
                .map_err(|_| CertiTrustError::CorruptProof("issued_at width".into()))?,
        );

        if reader.remaining() != 0 {
            return Err(CertiTrustError::CorruptProof(format!(
                "{} trailing bytes after issued_at",
                reader.remaining()
            )));
        }

        Ok(Self {
            document_id: DocumentId(doc_id),
            digest: Digest(digest),
            signature: Signature(signature),
            issuer_id,
            issued_at,
        })
    }
}

/// Bounds-checked cursor over a payload slice.
struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, len: usize, field: &str) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(CertiTrustError::CorruptProof(format!(
                "{field} declares {len} bytes but only {} remain",
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1, "length prefix")?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let bytes = self.take(2, "length prefix")?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn utf8(&mut self, len: usize, field: &str) -> Result<String> {
        let bytes = self.take(len, field)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| CertiTrustError::CorruptProof(format!("{field} is not valid UTF-8")))
    }
}
