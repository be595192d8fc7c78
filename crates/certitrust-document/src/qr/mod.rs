// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QR module: rendering proof payloads and reading them back from stamped
// PDFs or photographed pages.

pub mod extract;
pub mod render;
pub mod scan;

pub use extract::{extract_from_image, extract_from_pdf, extract_payload};
pub use render::QrMatrix;
