// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// CertiTrust: Core types, proof wire format, and error definitions shared
// across all crates.

pub mod config;
pub mod error;
pub mod proof;
pub mod types;

pub use config::AppConfig;
pub use error::CertiTrustError;
pub use proof::{MAX_PROOF_BYTES, PROOF_VERSION, Proof};
pub use types::*;
