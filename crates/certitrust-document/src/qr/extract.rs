// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// QR extraction: recover the proof payload from a submission.
//
// Stamped PDFs carry the symbol as an uncompressed 8-bit grey image XObject
// with one sample per module, which is read back directly: first from the
// raw bytes of the stamp region, so that damage to the signed prefix still
// leaves the proof readable, then through the parsed document. Raster
// submissions (a photographed certificate or a page scan sent alongside the
// PDF) go through progressively heavier cleanup before detection.

use std::io::Cursor;

use certitrust_core::error::{CertiTrustError, Result};
use image::imageops::{self, FilterType};
use image::{GrayImage, ImageReader, Limits, Luma};
use lopdf::{Document, Object};
use tracing::{debug, info, instrument, warn};

use crate::pdf::canonical::{STAMP_MARKER, rfind};
use crate::pdf::resolve;
use crate::pdf::stamp::STAMP_XOBJECT_NAME;
use crate::qr::scan;

/// Pixels per module when handing a stamped XObject to the detector.
const XOBJECT_UPSCALE: u32 = 8;

/// Detection on very small rasters fails; scale them up to at least this.
const MIN_RASTER_SIDE: u32 = 400;

/// Rasters are rescaled so that their long side stays within this.
const MAX_WORKING_SIDE: u32 = 2048;

/// Images wider or taller than this are refused before decoding.
const MAX_DECODE_SIDE: u32 = 8192;

/// Largest stamp image the region reader accepts: a version 40 symbol plus
/// its quiet zone is 185 samples wide.
const MAX_STAMP_SIDE: u32 = 200;

/// Recover the payload from whatever was submitted.
///
/// Tries, in order: the raw stamp region, the stamp XObject of a PDF
/// document, the document itself as a raster image, and the optional page
/// scan. Fails with `NoQrFound` when none yields a decodable symbol.
#[instrument(skip_all, fields(document_len = document.len(), has_page_image = page_image.is_some()))]
pub fn extract_payload(document: &[u8], page_image: Option<&[u8]>) -> Result<Vec<u8>> {
    if let Ok(payload) = extract_from_region(document) {
        return Ok(payload);
    }

    let from_document = if document.starts_with(b"%PDF-") {
        extract_from_pdf(document)
    } else {
        extract_from_image(document)
    };

    match from_document {
        Ok(payload) => return Ok(payload),
        Err(err) => debug!(%err, "no QR in submitted document"),
    }

    if let Some(scan) = page_image {
        return extract_from_image(scan);
    }
    Err(CertiTrustError::NoQrFound)
}

/// Read the QR symbol from the image object that opens the last stamp
/// region, without parsing the rest of the file.
#[instrument(skip_all, fields(raw_len = raw.len()))]
pub fn extract_from_region(raw: &[u8]) -> Result<Vec<u8>> {
    let start = rfind(raw, STAMP_MARKER).ok_or(CertiTrustError::NoQrFound)? + STAMP_MARKER.len();
    let image = region_image(&raw[start..]).ok_or(CertiTrustError::NoQrFound)?;
    let payload = decode_gray(&upscale(&image, XOBJECT_UPSCALE)).ok_or(CertiTrustError::NoQrFound)?;

    info!(payload_len = payload.len(), "QR payload read from stamp region");
    Ok(payload)
}

/// Read the QR symbol from the `/CertiTrustQR` image on the first page.
#[instrument(skip_all, fields(raw_len = raw.len()))]
pub fn extract_from_pdf(raw: &[u8]) -> Result<Vec<u8>> {
    let document = Document::load_mem(raw).map_err(|err| {
        debug!(%err, "submission does not parse as PDF");
        CertiTrustError::NoQrFound
    })?;

    let image = stamp_image(&document).ok_or(CertiTrustError::NoQrFound)?;
    let payload = decode_gray(&upscale(&image, XOBJECT_UPSCALE)).ok_or(CertiTrustError::NoQrFound)?;

    info!(payload_len = payload.len(), "QR payload read from stamp image");
    Ok(payload)
}

/// Decode a QR symbol from an encoded raster image (PNG, JPEG, ...).
#[instrument(skip_all, fields(raw_len = raw.len()))]
pub fn extract_from_image(raw: &[u8]) -> Result<Vec<u8>> {
    let gray = rescale(decode_raster(raw)?);

    if let Some(payload) = decode_gray(&gray) {
        info!(payload_len = payload.len(), "QR payload read from raster");
        return Ok(payload);
    }

    let cleaned = scan::binarize_adaptive(
        &scan::denoise(&gray),
        scan::DEFAULT_BLOCK_RADIUS,
        scan::DEFAULT_OFFSET,
    );
    if let Some(payload) = decode_gray(&cleaned) {
        info!(payload_len = payload.len(), "QR payload read after adaptive binarization");
        return Ok(payload);
    }

    if let Some(payload) = decode_gray(&scan::binarize_otsu(&gray)) {
        info!(payload_len = payload.len(), "QR payload read after Otsu binarization");
        return Ok(payload);
    }

    Err(CertiTrustError::NoQrFound)
}

/// Run detection on a grey image, returning the first grid that decodes.
pub fn decode_gray(gray: &GrayImage) -> Option<Vec<u8>> {
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        gray.width() as usize,
        gray.height() as usize,
        |x, y| gray.get_pixel(x as u32, y as u32).0[0],
    );

    let grids = prepared.detect_grids();
    debug!(grids = grids.len(), "QR grids detected");

    for grid in grids {
        let mut payload = Vec::new();
        match grid.decode_to(&mut payload) {
            Ok(_) => return Some(payload),
            Err(err) => debug!(?err, "QR grid failed to decode"),
        }
    }
    None
}

/// Decode under size limits so that a hostile header cannot force a huge
/// allocation.
fn decode_raster(raw: &[u8]) -> Result<GrayImage> {
    let not_an_image = |err: &dyn std::fmt::Display| {
        debug!(%err, "submission is not a decodable image");
        CertiTrustError::NoQrFound
    };

    let mut reader = ImageReader::new(Cursor::new(raw))
        .with_guessed_format()
        .map_err(|err| not_an_image(&err))?;
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DECODE_SIDE);
    limits.max_image_height = Some(MAX_DECODE_SIDE);
    reader.limits(limits);

    let decoded = reader.decode().map_err(|err| not_an_image(&err))?;
    Ok(decoded.to_luma8())
}

/// Bring a raster into the size range the detector works well with.
fn rescale(gray: GrayImage) -> GrayImage {
    let (width, height) = gray.dimensions();
    match working_size(width, height) {
        Some((w, h)) if w.max(h) < width.max(height) => {
            imageops::resize(&gray, w, h, FilterType::Triangle)
        }
        Some((w, _)) => upscale(&gray, w / width),
        None => gray,
    }
}

/// Target dimensions for a `width x height` raster, or `None` to leave it
/// alone. Upscaling is by an integer factor, and the long side never grows
/// past `MAX_WORKING_SIDE`.
fn working_size(width: u32, height: u32) -> Option<(u32, u32)> {
    let (short, long) = (width.min(height), width.max(height));
    if short == 0 {
        return None;
    }

    if long > MAX_WORKING_SIDE {
        let shrink = |side: u32| {
            ((u64::from(side) * u64::from(MAX_WORKING_SIDE)) / u64::from(long)).max(1) as u32
        };
        return Some((shrink(width), shrink(height)));
    }

    if short < MIN_RASTER_SIDE {
        let factor = MIN_RASTER_SIDE.div_ceil(short).min(MAX_WORKING_SIDE / long);
        if factor > 1 {
            return Some((width * factor, height * factor));
        }
    }
    None
}

/// The stamp image at the head of a stamp region: `<< ... /Width w
/// /Height h ... /Length n >>` followed by `n` raw samples.
fn region_image(region: &[u8]) -> Option<GrayImage> {
    const STREAM_START: &[u8] = b"\nstream\n";

    let body = region.windows(STREAM_START.len()).position(|w| w == STREAM_START)?;
    let header = &region[..body];
    let width = header_integer(header, b"/Width ")?;
    let height = header_integer(header, b"/Height ")?;
    let length = header_integer(header, b"/Length ")?;

    if width == 0 || width != height || width > MAX_STAMP_SIDE || length != width * height {
        debug!(width, height, length, "stamp region header is not a stamp image");
        return None;
    }

    let start = body + STREAM_START.len();
    let samples = region.get(start..start + length as usize)?;
    GrayImage::from_raw(width, height, samples.to_vec())
}

fn header_integer(header: &[u8], key: &[u8]) -> Option<u32> {
    let at = header.windows(key.len()).position(|w| w == key)? + key.len();
    let digits = header[at..].iter().take_while(|b| b.is_ascii_digit()).count();
    std::str::from_utf8(&header[at..at + digits]).ok()?.parse().ok()
}

/// The stamp image XObject of the first page as a grey image, one pixel per
/// sample.
fn stamp_image(document: &Document) -> Option<GrayImage> {
    let page_id = document.get_pages().values().next().copied()?;
    let page = document.get_dictionary(page_id).ok()?;
    let resources = resolve(document, page.get(b"Resources").ok()?)?.as_dict().ok()?;
    let xobjects = resolve(document, resources.get(b"XObject").ok()?)?.as_dict().ok()?;
    let stream = resolve(document, xobjects.get(STAMP_XOBJECT_NAME.as_bytes()).ok()?)?
        .as_stream()
        .ok()?;

    let dict = &stream.dict;
    let width = dict.get(b"Width").and_then(Object::as_i64).ok()?;
    let height = dict.get(b"Height").and_then(Object::as_i64).ok()?;
    let bits = dict.get(b"BitsPerComponent").and_then(Object::as_i64).unwrap_or(8);
    if bits != 8 || width <= 0 || height <= 0 {
        warn!(width, height, bits, "stamp image has an unsupported layout");
        return None;
    }

    let samples = if dict.has(b"Filter") {
        stream.decompressed_content().ok()?
    } else {
        stream.content.clone()
    };

    let (width, height) = (u32::try_from(width).ok()?, u32::try_from(height).ok()?);
    if samples.len() < width as usize * height as usize {
        warn!(samples = samples.len(), width, height, "stamp image is truncated");
        return None;
    }

    Some(GrayImage::from_fn(width, height, |x, y| {
        Luma([samples[(y * width + x) as usize]])
    }))
}

fn upscale(gray: &GrayImage, factor: u32) -> GrayImage {
    let factor = factor.max(1);
    GrayImage::from_fn(gray.width() * factor, gray.height() * factor, |x, y| {
        *gray.get_pixel(x / factor, y / factor)
    })
}
