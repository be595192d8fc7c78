// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Verification engine, a linear state machine over one submission:
//
//   Start -> QrExtracted -> ProofDecoded -> SignatureChecked
//         -> DigestCompared -> ForensicScored -> Verdict
//
// Every failing transition ends in a terminal verdict with a reason; the
// engine never returns an error to its caller. The cryptographic stages run
// on the blocking pool, the forensic stage is bounded by a timeout, and each
// call appends exactly one audit entry.

use std::sync::Arc;
use std::time::Duration;

use certitrust_core::Proof;
use certitrust_core::config::VerificationConfig;
use certitrust_core::error::CertiTrustError;
use certitrust_core::types::{
    AuditEvent, DocumentId, RejectReason, SuspectReason, Verdict, VerificationResult,
};
use certitrust_document::{canonical_slice, extract_payload, locate_stamp_region, stamp};
use certitrust_security::{AuditRecorder, IssuerRegistry, hash_document};
use tracing::{debug, error, info, instrument, warn};

use crate::forensic::ForensicAnalyzer;

/// What a verifier uploads.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    /// The document as received: a stamped PDF, or a photo of the page.
    pub document: Vec<u8>,
    /// Optional scan or photo of the printed first page. Used as a second
    /// QR source and as the forensic input.
    pub page_image: Option<Vec<u8>>,
}

impl Submission {
    pub fn document(document: Vec<u8>) -> Self {
        Self {
            document,
            page_image: None,
        }
    }

    pub fn with_page_image(mut self, image: Vec<u8>) -> Self {
        self.page_image = Some(image);
        self
    }

    /// Bytes handed to the forensic analyzer.
    fn forensic_image(&self) -> &[u8] {
        self.page_image.as_deref().unwrap_or(&self.document)
    }
}

/// States of one verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    QrExtracted,
    ProofDecoded,
    SignatureChecked,
    DigestCompared,
    ForensicScored,
    Verdict,
}

/// Forensic threshold policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerificationPolicy {
    pub low_threshold: f64,
    pub high_threshold: f64,
    pub forensic_timeout: Duration,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self::from(&VerificationConfig::default())
    }
}

impl From<&VerificationConfig> for VerificationPolicy {
    fn from(config: &VerificationConfig) -> Self {
        Self {
            low_threshold: config.low_threshold,
            high_threshold: config.high_threshold,
            forensic_timeout: Duration::from_millis(config.forensic_timeout_ms),
        }
    }
}

impl VerificationPolicy {
    /// Map a usable score to a verdict.
    pub fn classify(&self, score: f64) -> Verdict {
        if score < self.low_threshold {
            Verdict::Verified
        } else if score < self.high_threshold {
            Verdict::Suspect(SuspectReason::ForensicSuspect)
        } else {
            Verdict::Rejected(RejectReason::ForensicFlag)
        }
    }
}

/// Facts established so far; becomes the result once a verdict is known.
#[derive(Debug, Default)]
struct Progress {
    document_id: Option<DocumentId>,
    issuer_id: Option<String>,
    signature_valid: bool,
    digest_match: bool,
}

impl Progress {
    fn reach(&self, stage: Stage) {
        debug!(?stage, "verification stage reached");
    }

    fn finish(self, forensic_score: Option<f64>, verdict: Verdict) -> VerificationResult {
        self.reach(Stage::Verdict);
        VerificationResult {
            document_id: self.document_id,
            issuer_id: self.issuer_id,
            signature_valid: self.signature_valid,
            digest_match: self.digest_match,
            forensic_score,
            verdict,
        }
    }
}

/// Verifies submissions against a registry of trusted issuers.
///
/// Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct VerificationEngine {
    registry: Arc<IssuerRegistry>,
    analyzer: Arc<dyn ForensicAnalyzer>,
    audit: Arc<AuditRecorder>,
    policy: VerificationPolicy,
}

impl VerificationEngine {
    pub fn new(
        registry: Arc<IssuerRegistry>,
        analyzer: Arc<dyn ForensicAnalyzer>,
        audit: Arc<AuditRecorder>,
        policy: VerificationPolicy,
    ) -> Self {
        Self {
            registry,
            analyzer,
            audit,
            policy,
        }
    }

    pub fn policy(&self) -> &VerificationPolicy {
        &self.policy
    }

    /// Verify a submission and record the outcome in the audit chain.
    ///
    /// An audit failure is logged and does not change the result.
    #[instrument(skip_all, fields(
        document_len = submission.document.len(),
        has_page_image = submission.page_image.is_some(),
    ))]
    pub async fn verify(&self, submission: Submission) -> VerificationResult {
        let result = self.run(submission).await;
        self.record(&result).await;

        info!(
            verdict = result.verdict.label(),
            reason = %result.verdict.reason(),
            document_id = result.document_id.as_ref().map(DocumentId::as_str).unwrap_or(""),
            "verification complete"
        );
        result
    }

    /// Run the state machine without touching the audit chain.
    pub async fn run(&self, submission: Submission) -> VerificationResult {
        let submission = Arc::new(submission);

        let registry = Arc::clone(&self.registry);
        let checked = Arc::clone(&submission);
        let integrity =
            tokio::task::spawn_blocking(move || check_integrity(&registry, &checked)).await;

        let progress = match integrity {
            Ok((progress, Ok(()))) => progress,
            Ok((progress, Err(reason))) => {
                return progress.finish(None, Verdict::Rejected(reason));
            }
            Err(e) => {
                error!(%e, "integrity check task failed");
                return Progress::default()
                    .finish(None, Verdict::Rejected(RejectReason::MalformedDocument));
            }
        };

        let (score, verdict) = self.forensic(submission.forensic_image()).await;
        progress.reach(Stage::ForensicScored);
        progress.finish(score, verdict)
    }

    /// `DigestCompared -> ForensicScored`, then the threshold policy.
    async fn forensic(&self, image: &[u8]) -> (Option<f64>, Verdict) {
        let call = self.analyzer.score(image);
        match tokio::time::timeout(self.policy.forensic_timeout, call).await {
            Err(_) => {
                warn!(
                    analyzer = self.analyzer.name(),
                    timeout_ms = self.policy.forensic_timeout.as_millis() as u64,
                    "forensic analysis timed out"
                );
                (None, Verdict::Suspect(SuspectReason::AnalysisTimeout))
            }
            Ok(Err(e)) => {
                warn!(analyzer = self.analyzer.name(), %e, "forensic analysis unavailable");
                (None, Verdict::Suspect(SuspectReason::AnalysisUnavailable))
            }
            Ok(Ok(score)) if !(0.0..=1.0).contains(&score) => {
                warn!(analyzer = self.analyzer.name(), score, "forensic score out of range");
                (None, Verdict::Suspect(SuspectReason::AnalysisUnavailable))
            }
            Ok(Ok(score)) => {
                debug!(score, "forensic score");
                (Some(score), self.policy.classify(score))
            }
        }
    }

    async fn record(&self, result: &VerificationResult) {
        let audit = Arc::clone(&self.audit);
        let event = AuditEvent::from_result(result);
        match tokio::task::spawn_blocking(move || audit.record(&event)).await {
            Ok(Ok(entry)) => debug!(sequence = entry.sequence, "verification audited"),
            Ok(Err(e)) => error!(%e, "verification audit entry not written"),
            Err(e) => error!(%e, "verification audit task failed"),
        }
    }
}

/// Stages `Start` through `DigestCompared`, plus the stamp region check.
fn check_integrity(
    registry: &IssuerRegistry,
    submission: &Submission,
) -> (Progress, Result<(), RejectReason>) {
    let mut progress = Progress::default();
    let outcome = advance(&mut progress, registry, submission);
    (progress, outcome)
}

fn advance(
    progress: &mut Progress,
    registry: &IssuerRegistry,
    submission: &Submission,
) -> Result<(), RejectReason> {
    progress.reach(Stage::Start);
    let document = submission.document.as_slice();

    let payload = extract_payload(document, submission.page_image.as_deref())
        .map_err(|_| RejectReason::NoQrFound)?;
    progress.reach(Stage::QrExtracted);

    let proof = Proof::decode(&payload).map_err(|e| {
        debug!(%e, "proof payload rejected");
        RejectReason::CorruptProof
    })?;
    progress.document_id = Some(proof.document_id.clone());
    progress.issuer_id = Some(proof.issuer_id.clone());
    progress.reach(Stage::ProofDecoded);

    match registry.verify(&proof.issuer_id, &proof.digest, &proof.signature) {
        None => return Err(RejectReason::UnknownIssuer),
        Some(false) => return Err(RejectReason::InvalidSignature),
        Some(true) => progress.signature_valid = true,
    }
    progress.reach(Stage::SignatureChecked);

    let canonical = canonical_slice(document);
    if hash_document(canonical) != proof.digest {
        return Err(RejectReason::ContentModified);
    }
    check_stamp_region(document, canonical, &payload)?;
    progress.digest_match = true;
    progress.reach(Stage::DigestCompared);

    Ok(())
}

/// The stamp region is not covered by the digest, so it must be exactly
/// what stamping the signed content with this payload produces.
fn check_stamp_region(document: &[u8], canonical: &[u8], payload: &[u8]) -> Result<(), RejectReason> {
    if locate_stamp_region(document).is_none() {
        return Ok(());
    }
    match stamp(canonical, payload) {
        Ok(expected) if expected == document => Ok(()),
        Ok(_) => {
            warn!("stamp region differs from its reconstruction");
            Err(RejectReason::ContentModified)
        }
        Err(CertiTrustError::MalformedDocument(reason)) => {
            warn!(%reason, "signed content no longer canonicalizes");
            Err(RejectReason::MalformedDocument)
        }
        Err(e) => {
            warn!(%e, "stamp region cannot be reconstructed");
            Err(RejectReason::ContentModified)
        }
    }
}
