// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the certitrust-document crate: canonicalization,
// stamping, and QR extraction on a synthetic one-page certificate.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use certitrust_document::{canonicalize, extract_from_image, extract_from_pdf, fixtures, stamp};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// A payload about the size of a real proof (UUID, digest, signature,
/// issuer id, timestamp).
fn proof_sized_payload() -> Vec<u8> {
    (0..150u8).collect()
}

fn bench_canonicalize(c: &mut Criterion) {
    let stamped = stamp(&fixtures::sample_certificate("Benchmark"), &proof_sized_payload())
        .expect("stamp failed");

    c.bench_function("canonicalize (stamped, 1 page)", |b| {
        b.iter(|| black_box(canonicalize(black_box(&stamped)).expect("canonicalize failed")));
    });
}

fn bench_stamp(c: &mut Criterion) {
    let pdf = fixtures::sample_certificate("Benchmark");
    let payload = proof_sized_payload();

    c.bench_function("stamp (1 page, 150 B payload)", |b| {
        b.iter(|| black_box(stamp(black_box(&pdf), black_box(&payload)).expect("stamp failed")));
    });
}

/// Extraction from the stamp XObject versus from a camera-style raster,
/// which goes through detection on a much larger image.
fn bench_extract(c: &mut Criterion) {
    let payload = proof_sized_payload();
    let stamped = stamp(&fixtures::sample_certificate("Benchmark"), &payload).expect("stamp failed");
    let scan = fixtures::qr_scan_png(&payload);

    let mut group = c.benchmark_group("qr_extract");
    group.bench_function("from stamped PDF", |b| {
        b.iter(|| black_box(extract_from_pdf(black_box(&stamped)).expect("extract failed")));
    });
    group.bench_function("from PNG scan", |b| {
        b.iter(|| black_box(extract_from_image(black_box(&scan)).expect("extract failed")));
    });
    group.finish();
}

criterion_group!(benches, bench_canonicalize, bench_stamp, bench_extract);
criterion_main!(benches);
