// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! certitrust-engine: Issuance and verification services.
//!
//! Ties the document and security crates together: the issuance pipeline
//! that signs and stamps a document, the verification state machine that
//! turns a submission into a verdict, and the forensic analyzer seam.

pub mod forensic;
pub mod issuance;
pub mod verification;

pub use forensic::{CommandAnalyzer, ForensicAnalyzer, UnavailableAnalyzer, analyzer_from_config};
pub use issuance::{IssuanceService, IssuedDocument};
pub use verification::{Stage, Submission, VerificationEngine, VerificationPolicy};
