// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! certitrust-security: Cryptographic foundation for document proofs.
//!
//! Provides the document hasher, the issuer's Ed25519 signer and the
//! verifier-side issuer registry, startup-time secret loading (plain or
//! age-sealed), and the hash-chained audit trail.

pub mod audit;
pub mod integrity;
pub mod secrets;
pub mod signing;

pub use audit::{
    AuditEntry, AuditRecorder, AuditSink, ChainReport, ChainTail, GENESIS_HASH, MemoryAuditSink,
    SqliteAuditSink, verify_chain,
};
pub use integrity::{hash_bytes, hash_document};
pub use secrets::load_issuer_key;
pub use signing::{IssuerKeyPair, IssuerRegistry, PublicKey, verify_signature};
