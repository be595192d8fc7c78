// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for issuance and verification.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CertiTrustError, Result};

/// Length of a document digest in bytes (SHA-256).
pub const DIGEST_LEN: usize = 32;

/// Logical identifier of an issued document.
///
/// Generated once at issuance and carried inside the proof, so it stays
/// stable across any number of later verifications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed-width fingerprint of a document's canonical bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(pub [u8; DIGEST_LEN]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Lowercase hex rendering, used in logs and audit details.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| CertiTrustError::Config(format!("digest is not hex: {e}")))?;
        let array: [u8; DIGEST_LEN] = bytes.try_into().map_err(|v: Vec<u8>| {
            CertiTrustError::Config(format!("digest must be {DIGEST_LEN} bytes, got {}", v.len()))
        })?;
        Ok(Self(array))
    }
}

impl std::fmt::Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Detached signature bytes as produced by the issuer's key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({} bytes)", self.0.len())
    }
}

/// Why a verification ended in `Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NoQrFound,
    CorruptProof,
    UnknownIssuer,
    InvalidSignature,
    /// The submitted bytes are not the document the proof was issued for.
    ContentModified,
    /// The submission could not be canonicalized at all.
    MalformedDocument,
    ForensicFlag,
}

/// Why a verification ended in `Suspect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspectReason {
    /// Score landed between the low and high thresholds.
    ForensicSuspect,
    /// Analyzer failed or returned a score outside `[0, 1]`.
    AnalysisUnavailable,
    /// Analyzer did not answer within the configured timeout.
    AnalysisTimeout,
}

/// Final outcome of a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum Verdict {
    Verified,
    Suspect(SuspectReason),
    Rejected(RejectReason),
}

impl Verdict {
    pub fn is_verified(&self) -> bool {
        matches!(self, Verdict::Verified)
    }

    /// Short label used as the audit event type.
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Verified => "verified",
            Verdict::Suspect(_) => "suspect",
            Verdict::Rejected(_) => "rejected",
        }
    }

    /// Reason text for audit details (`""` for `Verified`).
    pub fn reason(&self) -> String {
        match self {
            Verdict::Verified => String::new(),
            Verdict::Suspect(r) => format!("{r:?}"),
            Verdict::Rejected(r) => format!("{r:?}"),
        }
    }
}

/// Everything a caller learns from one verification call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub document_id: Option<DocumentId>,
    pub issuer_id: Option<String>,
    pub signature_valid: bool,
    pub digest_match: bool,
    /// `None` when the forensic step did not run or produced no usable score.
    pub forensic_score: Option<f64>,
    pub verdict: Verdict,
}

impl VerificationResult {
    /// A terminal result reached before the proof could be decoded.
    pub fn rejected(reason: RejectReason) -> Self {
        Self {
            document_id: None,
            issuer_id: None,
            signature_valid: false,
            digest_match: false,
            forensic_score: None,
            verdict: Verdict::Rejected(reason),
        }
    }
}

/// Kind of event written to the audit chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    Issued,
    Verified,
    Suspect,
    Rejected,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::Issued => "issued",
            AuditEventKind::Verified => "verified",
            AuditEventKind::Suspect => "suspect",
            AuditEventKind::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "issued" => Some(AuditEventKind::Issued),
            "verified" => Some(AuditEventKind::Verified),
            "suspect" => Some(AuditEventKind::Suspect),
            "rejected" => Some(AuditEventKind::Rejected),
            _ => None,
        }
    }
}

impl From<&Verdict> for AuditEventKind {
    fn from(verdict: &Verdict) -> Self {
        match verdict {
            Verdict::Verified => AuditEventKind::Verified,
            Verdict::Suspect(_) => AuditEventKind::Suspect,
            Verdict::Rejected(_) => AuditEventKind::Rejected,
        }
    }
}

/// An event handed to the audit recorder, before it is chained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub kind: AuditEventKind,
    pub document_id: Option<DocumentId>,
    pub detail: String,
}

impl AuditEvent {
    pub fn issued(document_id: &DocumentId, digest: &Digest) -> Self {
        Self {
            kind: AuditEventKind::Issued,
            document_id: Some(document_id.clone()),
            detail: format!("digest={}", digest.to_hex()),
        }
    }

    pub fn from_result(result: &VerificationResult) -> Self {
        Self {
            kind: AuditEventKind::from(&result.verdict),
            document_id: result.document_id.clone(),
            detail: result.verdict.reason(),
        }
    }
}
