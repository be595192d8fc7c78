// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stamper: append a QR proof to a PDF as an incremental update.
//
// Layout of a stamped file:
//
//   <canonical document, untouched, ending in %%EOF>
//   \n%CERTITRUST-STAMP 1\n
//   N+1 0 obj  QR image XObject (DeviceGray, 8 bpc, one sample per module)
//   N+2 0 obj  content stream "q"
//   N+3 0 obj  content stream drawing the QR
//   P G obj    replacement first page: Resources gain /CertiTrustQR,
//              Contents become [N+2, <original contents>, N+3]
//   xref / trailer (/Prev = original startxref) / startxref / %%EOF
//
// Wrapping the original contents in q ... Q keeps their graphics state from
// leaking into the overlay. The update is a pure function of the canonical
// bytes and the payload.

use certitrust_core::error::{CertiTrustError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, instrument};

use crate::pdf::canonical::{STAMP_MARKER, follows_eof, load_canonical, rfind};
use crate::pdf::serialize::{format_real, write_indirect, write_object};
use crate::pdf::{inherited, number, resolve};
use crate::qr::render::QrMatrix;

/// Resource name of the QR image on the stamped page.
pub const STAMP_XOBJECT_NAME: &str = "CertiTrustQR";

/// Edge length of the printed QR square, in points (one inch).
pub const STAMP_SIZE_PT: f64 = 72.0;

/// Distance from the page's bottom and right edges, in points.
pub const STAMP_MARGIN_PT: f64 = 18.0;

/// Where the QR square lands in default user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub size: f64,
}

impl Placement {
    /// Bottom-right corner of `media_box` (`[x0 y0 x1 y1]`, any corner order).
    pub fn bottom_right(media_box: [f64; 4]) -> Result<Self> {
        let [a, b, c, d] = media_box;
        let (left, right) = (a.min(c), a.max(c));
        let (bottom, top) = (b.min(d), b.max(d));

        let needed = STAMP_SIZE_PT + 2.0 * STAMP_MARGIN_PT;
        if right - left < needed || top - bottom < needed {
            return Err(CertiTrustError::RegionUnavailable(format!(
                "page is {}x{} pt, the stamp needs at least {needed}x{needed} pt",
                format_real(right - left),
                format_real(top - bottom),
            )));
        }

        Ok(Self {
            x: right - STAMP_MARGIN_PT - STAMP_SIZE_PT,
            y: bottom + STAMP_MARGIN_PT,
            size: STAMP_SIZE_PT,
        })
    }
}

/// Embed `payload` as a QR stamp, replacing any existing stamp region.
///
/// # Errors
///
/// - `MalformedDocument` if the input does not canonicalize.
/// - `RegionUnavailable` if there is no first page or it is too small.
/// - `ProofTooLarge` if the payload does not fit in a QR symbol.
#[instrument(skip_all, fields(document_len = document.len(), payload_len = payload.len()))]
pub fn stamp(document: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
    let (canonical, parsed) = load_canonical(document)?;
    if !follows_eof(canonical) {
        return Err(CertiTrustError::RegionUnavailable(
            "document has data after its final %%EOF".into(),
        ));
    }

    let page_id = parsed
        .get_pages()
        .values()
        .next()
        .copied()
        .ok_or_else(|| CertiTrustError::RegionUnavailable("document has no pages".into()))?;
    let page = parsed.get_dictionary(page_id).map_err(|err| {
        CertiTrustError::MalformedDocument(format!("first page {page_id:?} unreadable: {err}"))
    })?;

    let placement = Placement::bottom_right(media_box(&parsed, page)?)?;
    let qr = QrMatrix::encode(payload)?;
    let prev_xref = last_startxref(canonical).ok_or_else(|| {
        CertiTrustError::MalformedDocument("no startxref in document".into())
    })?;

    let base = highest_object_number(&parsed);
    let image_id: ObjectId = (base + 1, 0);
    let prefix_id: ObjectId = (base + 2, 0);
    let overlay_id: ObjectId = (base + 3, 0);

    let objects = [
        (image_id, image_xobject(&qr)),
        (prefix_id, content_stream(b"q\n".to_vec())),
        (overlay_id, content_stream(overlay_operators(&placement))),
        (
            page_id,
            Object::Dictionary(replacement_page(&parsed, page, image_id, prefix_id, overlay_id)),
        ),
    ];

    let mut out = Vec::with_capacity(canonical.len() + qr.side_with_quiet_zone().pow(2) + 1024);
    out.extend_from_slice(canonical);
    out.extend_from_slice(STAMP_MARKER);

    let mut offsets = Vec::with_capacity(objects.len());
    for (id, object) in &objects {
        offsets.push((*id, out.len()));
        write_indirect(&mut out, *id, object);
    }

    let xref_offset = out.len();
    write_xref(&mut out, &mut offsets);
    write_trailer(&mut out, &parsed, base + 4, prev_xref)?;
    out.extend_from_slice(format!("startxref\n{xref_offset}\n%%EOF\n").as_bytes());

    debug!(
        page = ?page_id,
        qr_modules = qr.width(),
        x = placement.x,
        y = placement.y,
        "stamp region written"
    );
    info!(stamped_len = out.len(), region_len = out.len() - canonical.len(), "document stamped");
    Ok(out)
}

fn media_box(document: &Document, page: &Dictionary) -> Result<[f64; 4]> {
    let unavailable = || CertiTrustError::RegionUnavailable("first page has no usable /MediaBox".into());

    let values = inherited(document, page, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .ok_or_else(unavailable)?;
    if values.len() != 4 {
        return Err(unavailable());
    }

    let mut rect = [0.0; 4];
    for (slot, value) in rect.iter_mut().zip(values) {
        *slot = resolve(document, value).and_then(number).ok_or_else(unavailable)?;
    }
    Ok(rect)
}

/// Highest object number in use, also honouring the trailer's `/Size`.
fn highest_object_number(document: &Document) -> u32 {
    let from_size = document
        .trailer
        .get(b"Size")
        .and_then(Object::as_i64)
        .ok()
        .and_then(|size| u32::try_from(size - 1).ok())
        .unwrap_or(0);
    document.max_id.max(from_size)
}

fn image_xobject(qr: &QrMatrix) -> Object {
    let side = qr.side_with_quiet_zone() as i64;
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(side));
    dict.set("Height", Object::Integer(side));
    dict.set("ColorSpace", Object::Name(b"DeviceGray".to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    // Keep module edges sharp when viewers scale the image up.
    dict.set("Interpolate", Object::Boolean(false));
    Object::Stream(Stream::new(dict, qr.to_gray_pixels()))
}

fn content_stream(operators: Vec<u8>) -> Object {
    Object::Stream(Stream::new(Dictionary::new(), operators))
}

fn overlay_operators(placement: &Placement) -> Vec<u8> {
    let size = format_real(placement.size);
    format!(
        "Q\nq\n{size} 0 0 {size} {} {} cm\n/{STAMP_XOBJECT_NAME} Do\nQ\n",
        format_real(placement.x),
        format_real(placement.y),
    )
    .into_bytes()
}

/// Copy of the page with its resources made direct and the stamp wired in.
fn replacement_page(
    document: &Document,
    page: &Dictionary,
    image_id: ObjectId,
    prefix_id: ObjectId,
    overlay_id: ObjectId,
) -> Dictionary {
    let mut resources = inherited(document, page, b"Resources")
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new);
    let mut xobjects = resources
        .get(b"XObject")
        .ok()
        .and_then(|obj| resolve(document, obj))
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new);
    xobjects.set(STAMP_XOBJECT_NAME, Object::Reference(image_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    let mut contents = vec![Object::Reference(prefix_id)];
    contents.extend(existing_contents(document, page));
    contents.push(Object::Reference(overlay_id));

    let mut replacement = page.clone();
    replacement.set("Resources", Object::Dictionary(resources));
    replacement.set("Contents", Object::Array(contents));
    replacement
}

fn existing_contents(document: &Document, page: &Dictionary) -> Vec<Object> {
    match page.get(b"Contents") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(reference @ Object::Reference(_)) => match resolve(document, reference) {
            // An indirect array of streams is flattened into the new array.
            Some(Object::Array(items)) => items.clone(),
            _ => vec![reference.clone()],
        },
        _ => Vec::new(),
    }
}

/// Classic cross-reference table with one subsection per run of
/// consecutive object numbers.
fn write_xref(out: &mut Vec<u8>, offsets: &mut [(ObjectId, usize)]) {
    offsets.sort_by_key(|((num, _), _)| *num);
    out.extend_from_slice(b"xref\n");

    let mut start = 0;
    while start < offsets.len() {
        let mut end = start + 1;
        while end < offsets.len() && offsets[end].0.0 == offsets[end - 1].0.0 + 1 {
            end += 1;
        }
        out.extend_from_slice(format!("{} {}\n", offsets[start].0.0, end - start).as_bytes());
        for ((_, generation), offset) in &offsets[start..end] {
            // Each entry is exactly 20 bytes.
            out.extend_from_slice(format!("{offset:010} {generation:05} n \n").as_bytes());
        }
        start = end;
    }
}

fn write_trailer(out: &mut Vec<u8>, document: &Document, size: u32, prev_xref: u64) -> Result<()> {
    let mut trailer = Dictionary::new();
    trailer.set("Size", Object::Integer(i64::from(size)));

    let root = document
        .trailer
        .get(b"Root")
        .map_err(|_| CertiTrustError::MalformedDocument("trailer has no /Root".into()))?;
    trailer.set("Root", root.clone());
    for key in ["Info", "ID"] {
        if let Ok(value) = document.trailer.get(key.as_bytes()) {
            trailer.set(key, value.clone());
        }
    }
    trailer.set("Prev", Object::Integer(prev_xref as i64));

    out.extend_from_slice(b"trailer\n");
    write_object(out, &Object::Dictionary(trailer));
    out.push(b'\n');
    Ok(())
}

/// Offset recorded after the final `startxref` keyword.
fn last_startxref(bytes: &[u8]) -> Option<u64> {
    let keyword = rfind(bytes, b"startxref")?;
    let digits: String = bytes[keyword + b"startxref".len()..]
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit())
        .map(|&b| char::from(b))
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::canonical::{canonical_slice, locate_stamp_region};
    use crate::pdf::fixtures;
    use crate::qr::extract::extract_from_pdf;

    const PAYLOAD: &[u8] = b"\x01proof-bytes-for-tests";

    #[test]
    fn stamped_document_keeps_original_prefix() {
        let pdf = fixtures::sample_certificate("Certificate of Completion");
        let stamped = stamp(&pdf, PAYLOAD).unwrap();

        assert!(stamped.starts_with(&pdf));
        let region = locate_stamp_region(&stamped).unwrap();
        assert_eq!(region.offset, pdf.len());
        assert_eq!(canonical_slice(&stamped), pdf.as_slice());
        assert!(stamped.ends_with(b"%%EOF\n"));
    }

    #[test]
    fn stamped_document_still_parses_with_one_page() {
        let pdf = fixtures::sample_certificate("Certificate");
        let stamped = stamp(&pdf, PAYLOAD).unwrap();

        let doc = Document::load_mem(&stamped).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert_eq!(extract_from_pdf(&stamped).unwrap(), PAYLOAD);
    }

    #[test]
    fn stamping_is_deterministic() {
        let pdf = fixtures::sample_certificate("Certificate");
        assert_eq!(stamp(&pdf, PAYLOAD).unwrap(), stamp(&pdf, PAYLOAD).unwrap());
    }

    #[test]
    fn restamping_replaces_the_region() {
        let pdf = fixtures::sample_certificate("Certificate");
        let once = stamp(&pdf, PAYLOAD).unwrap();
        assert_eq!(stamp(&once, PAYLOAD).unwrap(), once);

        let other = stamp(&once, b"another payload").unwrap();
        assert_eq!(canonical_slice(&other), pdf.as_slice());
        assert_eq!(extract_from_pdf(&other).unwrap(), b"another payload");
    }

    #[test]
    fn multi_page_document_stamps_first_page() {
        let pdf = fixtures::multi_page_certificate(&["Page one", "Page two"]);
        let stamped = stamp(&pdf, PAYLOAD).unwrap();
        let doc = Document::load_mem(&stamped).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
        assert_eq!(extract_from_pdf(&stamped).unwrap(), PAYLOAD);
    }

    #[test]
    fn no_pages_is_region_unavailable() {
        let err = stamp(&fixtures::empty_document(), PAYLOAD).unwrap_err();
        assert!(matches!(err, CertiTrustError::RegionUnavailable(_)));
    }

    #[test]
    fn trailing_nul_padding_is_accepted() {
        let mut pdf = fixtures::sample_certificate("Certificate");
        pdf.extend_from_slice(b"\0\0");
        let stamped = stamp(&pdf, PAYLOAD).unwrap();

        assert_eq!(canonical_slice(&stamped), pdf.as_slice());
        assert_eq!(extract_from_pdf(&stamped).unwrap(), PAYLOAD);
    }

    #[test]
    fn data_after_eof_is_region_unavailable() {
        let mut pdf = fixtures::sample_certificate("Certificate");
        pdf.extend_from_slice(b"garbage");
        let err = stamp(&pdf, PAYLOAD).unwrap_err();
        assert!(matches!(err, CertiTrustError::RegionUnavailable(_)));
    }

    #[test]
    fn tiny_page_is_region_unavailable() {
        let err = stamp(&fixtures::sized_certificate("tiny", 100.0, 300.0), PAYLOAD).unwrap_err();
        assert!(matches!(err, CertiTrustError::RegionUnavailable(_)));
    }

    #[test]
    fn oversized_payload_is_too_large() {
        let pdf = fixtures::sample_certificate("Certificate");
        let err = stamp(&pdf, &vec![0xEE; 5000]).unwrap_err();
        assert!(matches!(err, CertiTrustError::ProofTooLarge(_)));
    }

    #[test]
    fn non_pdf_is_malformed() {
        assert!(matches!(
            stamp(b"plain text", PAYLOAD),
            Err(CertiTrustError::MalformedDocument(_))
        ));
    }

    #[test]
    fn placement_sits_in_bottom_right_corner() {
        let p = Placement::bottom_right([0.0, 0.0, 612.0, 792.0]).unwrap();
        assert_eq!((p.x, p.y, p.size), (522.0, 18.0, 72.0));

        // Inverted corners and a non-zero origin.
        let p = Placement::bottom_right([700.0, 800.0, 100.0, 50.0]).unwrap();
        assert_eq!((p.x, p.y), (610.0, 68.0));

        assert!(Placement::bottom_right([0.0, 0.0, 107.0, 500.0]).is_err());
        assert!(Placement::bottom_right([0.0, 0.0, 108.0, 108.0]).is_ok());
    }

    #[test]
    fn overlay_draws_the_named_image() {
        let ops = overlay_operators(&Placement {
            x: 522.0,
            y: 18.0,
            size: 72.0,
        });
        assert_eq!(
            String::from_utf8(ops).unwrap(),
            "Q\nq\n72 0 0 72 522 18 cm\n/CertiTrustQR Do\nQ\n"
        );
    }

    #[test]
    fn xref_groups_consecutive_objects() {
        let mut out = Vec::new();
        let mut offsets = vec![((9, 0), 300), ((3, 0), 50), ((8, 0), 200), ((10, 0), 400)];
        write_xref(&mut out, &mut offsets);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "xref\n3 1\n0000000050 00000 n \n8 3\n0000000200 00000 n \n\
             0000000300 00000 n \n0000000400 00000 n \n"
        );
    }

    #[test]
    fn finds_last_startxref() {
        assert_eq!(last_startxref(b"startxref\n10\n%%EOF\nstartxref\r\n  4321\n%%EOF"), Some(4321));
        assert_eq!(last_startxref(b"%PDF-1.5 nothing"), None);
    }
}
