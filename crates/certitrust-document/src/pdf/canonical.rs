// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Canonical document bytes: the document with its stamp region cut off.
//
// A stamped PDF is the original file followed by a marker line and a PDF
// incremental update carrying the QR image. Because the update is purely
// appended, the canonical form of a stamped document is a byte prefix of it,
// and the digest signed at issuance covers exactly that prefix.

use certitrust_core::error::{CertiTrustError, Result};
use lopdf::Document;
use tracing::{debug, instrument};

/// Line that opens a stamp region. It only counts when it directly follows
/// the `%%EOF` of the document it stamps.
pub const STAMP_MARKER: &[u8] = b"\n%CERTITRUST-STAMP 1\n";

const PDF_HEADER: &[u8] = b"%PDF-";
const EOF_MARKER: &[u8] = b"%%EOF";

/// Byte range of a stamp region: from `offset` to the end of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StampRegion {
    pub offset: usize,
    pub len: usize,
}

/// Find the stamp region of `raw`, if any.
///
/// When several markers qualify the last one wins, so a region can never
/// hide inside a later one.
pub fn locate_stamp_region(raw: &[u8]) -> Option<StampRegion> {
    let mut search_end = raw.len();
    while let Some(pos) = rfind(&raw[..search_end], STAMP_MARKER) {
        if follows_eof(&raw[..pos]) {
            return Some(StampRegion {
                offset: pos,
                len: raw.len() - pos,
            });
        }
        // The marker starts and ends with '\n', so matches may overlap.
        search_end = pos + STAMP_MARKER.len() - 1;
    }
    None
}

/// Canonical bytes without any structural validation.
///
/// The verifier hashes this directly so that damage anywhere outside the
/// stamp region surfaces as a digest mismatch rather than a parse failure.
pub fn canonical_slice(raw: &[u8]) -> &[u8] {
    match locate_stamp_region(raw) {
        Some(region) => &raw[..region.offset],
        None => raw,
    }
}

/// Canonical bytes of a structurally valid PDF.
///
/// Fails with `MalformedDocument` when the canonical bytes do not start with
/// a PDF header or cannot be parsed.
#[instrument(skip_all, fields(raw_len = raw.len()))]
pub fn canonicalize(raw: &[u8]) -> Result<&[u8]> {
    load_canonical(raw).map(|(canonical, _)| canonical)
}

/// [`canonicalize`], also handing back the parsed document.
pub(crate) fn load_canonical(raw: &[u8]) -> Result<(&[u8], Document)> {
    let canonical = canonical_slice(raw);
    if !canonical.starts_with(PDF_HEADER) {
        return Err(CertiTrustError::MalformedDocument(
            "missing %PDF- header".into(),
        ));
    }

    let document = Document::load_mem(canonical)
        .map_err(|err| CertiTrustError::MalformedDocument(format!("failed to parse PDF: {err}")))?;

    debug!(
        canonical_len = canonical.len(),
        stripped = raw.len() - canonical.len(),
        "document canonicalized"
    );
    Ok((canonical, document))
}

pub(crate) fn follows_eof(prefix: &[u8]) -> bool {
    let end = prefix
        .iter()
        .rposition(|b| !is_pdf_whitespace(*b))
        .map_or(0, |i| i + 1);
    prefix[..end].ends_with(EOF_MARKER)
}

/// PDF white-space characters (ISO 32000-1, 7.2.2), NUL included.
fn is_pdf_whitespace(byte: u8) -> bool {
    matches!(byte, b'\0' | b'\t' | b'\n' | b'\x0c' | b'\r' | b' ')
}

pub(crate) fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures;

    #[test]
    fn unstamped_pdf_is_its_own_canonical_form() {
        let pdf = fixtures::sample_certificate("Diploma of Testing");
        assert_eq!(locate_stamp_region(&pdf), None);
        assert_eq!(canonicalize(&pdf).unwrap(), pdf.as_slice());
    }

    #[test]
    fn region_after_eof_is_stripped() {
        let pdf = fixtures::sample_certificate("Diploma");
        let mut stamped = pdf.clone();
        stamped.extend_from_slice(STAMP_MARKER);
        stamped.extend_from_slice(b"1 0 obj\nnull\nendobj\n%%EOF\n");

        let region = locate_stamp_region(&stamped).unwrap();
        assert_eq!(region.offset, pdf.len());
        assert_eq!(region.len, stamped.len() - pdf.len());
        assert_eq!(canonical_slice(&stamped), pdf.as_slice());
    }

    #[test]
    fn nul_padding_before_marker_still_counts_as_eof() {
        let mut bytes = b"%PDF-1.5\n%%EOF\n\0\0".to_vec();
        let canonical_len = bytes.len();
        bytes.extend_from_slice(STAMP_MARKER);
        bytes.extend_from_slice(b"tail");
        assert_eq!(locate_stamp_region(&bytes).unwrap().offset, canonical_len);
    }

    #[test]
    fn marker_not_after_eof_is_ignored() {
        let mut bytes = b"%PDF-1.5\n%CERTITRUST-STAMP 1\n".to_vec();
        bytes.extend_from_slice(b"1 0 obj\nnull\nendobj\n");
        assert_eq!(locate_stamp_region(&bytes), None);
    }

    #[test]
    fn last_qualifying_marker_wins() {
        let mut bytes = b"%PDF-1.5\n%%EOF".to_vec();
        bytes.extend_from_slice(STAMP_MARKER);
        bytes.extend_from_slice(b"%%EOF");
        let second = bytes.len();
        bytes.extend_from_slice(STAMP_MARKER);
        bytes.extend_from_slice(b"tail");
        assert_eq!(locate_stamp_region(&bytes).unwrap().offset, second);
    }

    #[test]
    fn canonicalize_is_deterministic() {
        let pdf = fixtures::sample_certificate("Transcript");
        assert_eq!(canonicalize(&pdf).unwrap(), canonicalize(&pdf).unwrap());
    }

    #[test]
    fn non_pdf_is_malformed() {
        assert!(matches!(
            canonicalize(b"GIF89a not a pdf"),
            Err(CertiTrustError::MalformedDocument(_))
        ));
        assert!(matches!(canonicalize(b""), Err(CertiTrustError::MalformedDocument(_))));
    }

    #[test]
    fn canonical_slice_never_validates() {
        let junk = b"\x00\x01 not a document";
        assert_eq!(canonical_slice(junk), junk);
    }
}
