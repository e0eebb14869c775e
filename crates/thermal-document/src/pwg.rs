// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Best-effort PWG-Raster decode. Full PWG-Raster support (multi-page
// headers, color spaces, back-sides) is out of scope; this skips the
// fixed-size page header and reinterprets the remainder as a 1-bit
// bitmap at the printer's native width, which is enough to get ink on
// paper for the raster filters CUPS actually emits toward this printer.

use image::{GrayImage, Luma};

/// Fixed PWG-Raster page-header size (CUPS Raster page header, v2).
const HEADER_SIZE: usize = 1796;

/// Decode a PWG-Raster document into a 1-bit-equivalent grayscale image,
/// best-effort. Any failure (too-short input, zero-height result) yields a
/// small placeholder image instead of propagating an error, matching the
/// "best-effort stub" scope for this format.
pub fn decode_best_effort(bytes: &[u8], max_pixels: u32) -> GrayImage {
    try_decode(bytes, max_pixels).unwrap_or_else(|| placeholder_image(max_pixels))
}

fn try_decode(bytes: &[u8], max_pixels: u32) -> Option<GrayImage> {
    if bytes.len() <= HEADER_SIZE {
        return None;
    }
    let bitmap = &bytes[HEADER_SIZE..];
    let width = max_pixels;
    let row_bytes = (width / 8) as usize;
    if row_bytes == 0 {
        return None;
    }
    let height = (bitmap.len() / row_bytes) as u32;
    if height == 0 {
        return None;
    }

    let mut image = GrayImage::new(width, height);
    for y in 0..height {
        let row = &bitmap[(y as usize) * row_bytes..(y as usize + 1) * row_bytes];
        for x in 0..width {
            let byte = row[(x / 8) as usize];
            let bit = 7 - (x % 8);
            let set = (byte >> bit) & 1 == 1;
            // PWG-Raster 1-bit convention: 1 = black.
            image.put_pixel(x, y, Luma([if set { 0 } else { 255 }]));
        }
    }
    Some(image)
}

/// A minimal blank placeholder emitted when a PWG-Raster body cannot be
/// reinterpreted.
fn placeholder_image(max_pixels: u32) -> GrayImage {
    GrayImage::from_pixel(max_pixels, STRIP_HEIGHT, Luma([255]))
}

const STRIP_HEIGHT: u32 = 24;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_short_yields_placeholder() {
        let image = decode_best_effort(&[0u8; 10], 576);
        assert_eq!(image.width(), 576);
    }

    #[test]
    fn decodes_plausible_body() {
        let width = 16u32;
        let row_bytes = (width / 8) as usize;
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes.extend(std::iter::repeat_n(0xffu8, row_bytes * 4)); // 4 all-black rows
        let image = decode_best_effort(&bytes, width);
        assert_eq!(image.height(), 4);
        assert_eq!(image.get_pixel(0, 0).0[0], 0);
    }
}
