// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic documents for tests and benchmarks.
//
// Page streams are left uncompressed so tests can find and alter the visible
// text directly in the file bytes.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use lopdf::{Dictionary, Document, Object, Stream, StringFormat};

use crate::qr::render::QrMatrix;

/// US Letter, in points.
pub const LETTER: (f64, f64) = (612.0, 792.0);

/// One-page certificate showing `text`.
pub fn sample_certificate(text: &str) -> Vec<u8> {
    build(&[text], LETTER.0, LETTER.1)
}

/// One-page certificate on a page of the given size.
pub fn sized_certificate(text: &str, width: f64, height: f64) -> Vec<u8> {
    build(&[text], width, height)
}

/// One page per entry of `texts`.
pub fn multi_page_certificate(texts: &[&str]) -> Vec<u8> {
    build(texts, LETTER.0, LETTER.1)
}

/// A structurally valid PDF whose page tree is empty.
pub fn empty_document() -> Vec<u8> {
    build(&[], LETTER.0, LETTER.1)
}

/// Copy of `document` with the first occurrence of `needle` altered by one
/// byte (the case of its first letter flips), leaving the structure intact.
pub fn flip_byte_in(document: &[u8], needle: &[u8]) -> Vec<u8> {
    let mut out = document.to_vec();
    let pos = out
        .windows(needle.len())
        .position(|w| w == needle)
        .expect("needle must occur in the fixture");
    out[pos] ^= 0x20;
    out
}

/// PNG of a QR symbol carrying `payload`, as a phone camera might capture
/// the printed stamp.
pub fn qr_scan_png(payload: &[u8]) -> Vec<u8> {
    let qr = QrMatrix::encode(payload).expect("payload fits in a QR symbol");
    png(qr.to_image(6))
}

/// PNG of an empty white page.
pub fn blank_scan_png() -> Vec<u8> {
    png(GrayImage::from_pixel(320, 400, Luma([250])))
}

fn png(img: GrayImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(img)
        .write_to(&mut out, ImageFormat::Png)
        .expect("PNG encoding into memory");
    out.into_inner()
}

fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

fn build(texts: &[&str], width: f64, height: f64) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut font = Dictionary::new();
    font.set("Type", name("Font"));
    font.set("Subtype", name("Type1"));
    font.set("BaseFont", name("Helvetica"));
    let font_id = doc.add_object(Object::Dictionary(font));

    let mut kids = Vec::with_capacity(texts.len());
    for text in texts {
        let mut line = Vec::new();
        line.extend_from_slice(format!("BT\n/F1 24 Tf\n72 {} Td\n", (height - 100.0).max(10.0)).as_bytes());
        crate::pdf::serialize::write_object(
            &mut line,
            &Object::String(text.as_bytes().to_vec(), StringFormat::Literal),
        );
        line.extend_from_slice(b" Tj\nET\n");
        let content_id = doc.add_object(Object::Stream(Stream::new(Dictionary::new(), line)));

        let mut page = Dictionary::new();
        page.set("Type", name("Page"));
        page.set("Parent", Object::Reference(pages_id));
        page.set("Contents", Object::Reference(content_id));
        kids.push(Object::Reference(doc.add_object(Object::Dictionary(page))));
    }

    // MediaBox and Resources live on the page tree node so pages inherit
    // them.
    let mut fonts = Dictionary::new();
    fonts.set("F1", Object::Reference(font_id));
    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));

    let mut pages = Dictionary::new();
    pages.set("Type", name("Pages"));
    pages.set("Count", Object::Integer(kids.len() as i64));
    pages.set("Kids", Object::Array(kids));
    pages.set(
        "MediaBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(width as _),
            Object::Real(height as _),
        ]),
    );
    pages.set("Resources", Object::Dictionary(resources));
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", name("Catalog"));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(Object::Dictionary(catalog));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("writing a PDF into memory");
    out
}
