// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Issuance pipeline:
//
//   raw document -> canonicalize -> hash -> sign -> encode proof -> stamp
//
// followed by one `issued` audit entry. Any failure before the stamp is
// returned to the caller and nothing is produced.

use std::sync::Arc;

use certitrust_core::error::{CertiTrustError, Result};
use certitrust_core::types::{AuditEvent, DocumentId};
use certitrust_core::Proof;
use certitrust_document::{canonicalize, stamp};
use certitrust_security::{AuditRecorder, IssuerKeyPair, hash_document};
use chrono::Utc;
use tracing::{error, info, instrument};

/// Output of a successful issuance.
#[derive(Debug, Clone)]
pub struct IssuedDocument {
    pub proof: Proof,
    /// Stamped document bytes, ready to hand to the holder.
    pub stamped: Vec<u8>,
}

/// Signs and stamps documents on behalf of one issuer.
///
/// Cheap to clone; the key pair and audit recorder are shared.
#[derive(Clone)]
pub struct IssuanceService {
    issuer_id: Arc<str>,
    key: Arc<IssuerKeyPair>,
    audit: Arc<AuditRecorder>,
}

impl IssuanceService {
    pub fn new(
        issuer_id: impl Into<String>,
        key: Arc<IssuerKeyPair>,
        audit: Arc<AuditRecorder>,
    ) -> Result<Self> {
        let issuer_id = issuer_id.into();
        if issuer_id.is_empty() || issuer_id.len() > usize::from(u8::MAX) {
            return Err(CertiTrustError::Config(format!(
                "issuer id must be 1..=255 bytes, got {}",
                issuer_id.len()
            )));
        }
        Ok(Self {
            issuer_id: issuer_id.into(),
            key,
            audit,
        })
    }

    pub fn issuer_id(&self) -> &str {
        &self.issuer_id
    }

    /// Issue on the blocking pool. PDF parsing and QR rendering are CPU
    /// bound, so they stay off the async workers.
    pub async fn issue(&self, document: Vec<u8>) -> Result<IssuedDocument> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.issue_blocking(&document))
            .await
            .map_err(task_failed)?
    }

    /// Synchronous issuance.
    #[instrument(skip_all, fields(issuer = %self.issuer_id, document_len = document.len()))]
    pub fn issue_blocking(&self, document: &[u8]) -> Result<IssuedDocument> {
        let canonical = canonicalize(document)?;
        let digest = hash_document(canonical);
        let signature = self.key.sign(&digest);

        let proof = Proof {
            document_id: DocumentId::new(),
            digest,
            signature,
            issuer_id: self.issuer_id.to_string(),
            issued_at: Utc::now().timestamp(),
        };
        let payload = proof.encode()?;
        let stamped = stamp(canonical, &payload)?;

        info!(
            document_id = %proof.document_id,
            digest = %proof.digest,
            payload_len = payload.len(),
            stamped_len = stamped.len(),
            "document issued"
        );

        if let Err(e) = self.audit.record(&AuditEvent::issued(&proof.document_id, &proof.digest)) {
            error!(document_id = %proof.document_id, %e, "issuance audit entry not written");
        }

        Ok(IssuedDocument { proof, stamped })
    }
}

/// A panicked or cancelled blocking task says nothing about the document.
fn task_failed(err: tokio::task::JoinError) -> CertiTrustError {
    error!(%err, "issuance task did not complete");
    CertiTrustError::TaskFailed(format!("issuance: {err}"))
}
