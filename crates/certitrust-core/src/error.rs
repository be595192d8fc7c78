// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for CertiTrust.

use thiserror::Error;

/// Top-level error type for all CertiTrust operations.
///
/// Messages never carry key material. Variants that wrap a lower-level
/// failure hold that failure's text only.
#[derive(Debug, Error)]
pub enum CertiTrustError {
    // -- Issuance path --
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("proof too large: {0}")]
    ProofTooLarge(String),

    #[error("stamp region unavailable: {0}")]
    RegionUnavailable(String),

    // -- Verification path --
    #[error("corrupt proof payload: {0}")]
    CorruptProof(String),

    #[error("no decodable QR code found")]
    NoQrFound,

    #[error("unknown issuer: {0}")]
    UnknownIssuer(String),

    #[error("signature does not verify")]
    InvalidSignature,

    #[error("document content modified since issuance")]
    ContentModified,

    #[error("forensic analysis flagged the document (score {0:.3})")]
    ForensicFlag(f64),

    #[error("forensic analysis unavailable: {0}")]
    AnalysisUnavailable(String),

    // -- Audit --
    #[error("audit write failed: {0}")]
    AuditWriteFailed(String),

    // -- Keys and configuration --
    #[error("key material rejected: {0}")]
    KeyMaterial(String),

    #[error("required secret not provided: {0}")]
    MissingSecret(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Runtime --
    #[error("background task failed: {0}")]
    TaskFailed(String),

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CertiTrustError>;
