// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for document processing in the thermal-document crate.
// Benchmarks the Floyd-Steinberg dither and ESC/POS column-mode encoder on a
// synthetic receipt-width bitmap.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{GrayImage, Luma};

use thermal_document::escpos;
use thermal_document::image::processor::ImageProcessor;

/// Benchmark dither + encode on a 576x800 synthetic gradient, the
/// resolution/length of a dense receipt page.
fn bench_dither_and_encode(c: &mut Criterion) {
    let (width, height) = (576u32, 800u32);
    let gradient = GrayImage::from_fn(width, height, |x, _y| Luma([(x * 255 / width) as u8]));

    c.bench_function("floyd_steinberg_dither (576x800)", |b| {
        b.iter(|| {
            let processor = ImageProcessor::from_gray(black_box(gradient.clone()));
            black_box(processor.dither_floyd_steinberg());
        });
    });

    let dithered = ImageProcessor::from_gray(gradient).dither_floyd_steinberg();
    c.bench_function("escpos_encode_image (576x800)", |b| {
        b.iter(|| black_box(escpos::encode_image(black_box(&dithered))));
    });
}

criterion_group!(benches, bench_dither_and_encode);
criterion_main!(benches);
