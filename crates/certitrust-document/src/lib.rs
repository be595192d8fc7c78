// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// certitrust-document: Document handling for CertiTrust.
//
// Provides PDF canonicalization (locating and stripping the stamp region), the
// stamper that appends a QR proof as a PDF incremental update, and QR
// rendering and extraction from both stamped PDFs and photographed scans.

pub mod pdf;
pub mod qr;

// Re-export the primary entry points so callers can use
// `certitrust_document::stamp` etc.
pub use pdf::canonical::{STAMP_MARKER, StampRegion, canonical_slice, canonicalize, locate_stamp_region};
pub use pdf::stamp::{STAMP_XOBJECT_NAME, stamp};
pub use qr::extract::{extract_from_image, extract_from_pdf, extract_payload};
pub use qr::render::QrMatrix;

#[cfg(any(test, feature = "fixtures"))]
pub use pdf::fixtures;
