// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ESC/POS column-mode (24-dot double-density) raster encoder.
//
// This is the primary encoding path: each horizontal strip of up to 24
// pixel rows becomes one `ESC * 33` raster-image command, three bytes per
// column (one per 8-row band within the strip), most-significant bit
// first, ink pixels (luma 0) setting the bit.

use image::GrayImage;

const ESC: u8 = 0x1b;
const GS: u8 = 0x1d;
const STRIP_HEIGHT: u32 = 24;

/// Encode a thresholded 1-bit-equivalent grayscale image (0 = ink,
/// 255 = paper) into a complete ESC/POS command stream ready for the
/// device backend.
pub fn encode_image(image: &GrayImage) -> Vec<u8> {
    let width = image.width();
    let height = image.height();

    let mut out = Vec::with_capacity((width * height / 8) as usize + 64);

    out.extend_from_slice(&[ESC, b'@']); // initialize
    out.extend_from_slice(&[ESC, b'3', 0]); // line spacing = 0
    out.extend_from_slice(&[ESC, b'a', 1]); // center align

    let strip_count = height.div_ceil(STRIP_HEIGHT);
    for strip in 0..strip_count {
        let y0 = strip * STRIP_HEIGHT;

        out.push(ESC);
        out.push(b'*');
        out.push(33); // mode 33 = 24-dot double-density
        out.extend_from_slice(&(width as u16).to_le_bytes());

        for x in 0..width {
            for byte_idx in 0..3u32 {
                let mut byte = 0u8;
                for bit_idx in 0..8u32 {
                    let y = y0 + byte_idx * 8 + bit_idx;
                    let ink = y < height && image.get_pixel(x, y).0[0] == 0;
                    if ink {
                        byte |= 1 << (7 - bit_idx);
                    }
                }
                out.push(byte);
            }
        }
        out.push(b'\n');
    }

    out.extend_from_slice(&[ESC, b'2']); // restore default line spacing
    out.extend_from_slice(&[ESC, b'a', 0]); // left align
    out.extend_from_slice(&[ESC, b'd', 3]); // feed 3 lines
    out.extend_from_slice(&[GS, b'V', 66, 0]); // partial cut

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn solid_image(width: u32, height: u32, luma: u8) -> GrayImage {
        GrayImage::from_pixel(width, height, Luma([luma]))
    }

    #[test]
    fn begins_with_init_and_ends_with_cut() {
        let img = solid_image(8, 24, 255);
        let out = encode_image(&img);
        assert_eq!(&out[0..2], &[ESC, b'@']);
        assert_eq!(&out[out.len() - 4..], &[GS, b'V', 66, 0]);
    }

    #[test]
    fn strip_count_matches_ceil_division() {
        let img = solid_image(8, 50, 255);
        let out = encode_image(&img);
        let strips = out.windows(3).filter(|w| *w == [ESC, b'*', 33]).count();
        assert_eq!(strips, 3); // ceil(50/24) == 3
    }

    #[test]
    fn all_white_strip_is_zero_columns() {
        let img = solid_image(4, 24, 255);
        let out = encode_image(&img);
        let header_end = out
            .windows(3)
            .position(|w| w == [ESC, b'*', 33])
            .unwrap()
            + 3
            + 2; // skip mode byte + 2-byte width
        let columns = &out[header_end..header_end + 4 * 3];
        assert!(columns.iter().all(|&b| b == 0x00));
    }

    #[test]
    fn all_black_strip_is_full_columns() {
        let img = solid_image(4, 24, 0);
        let out = encode_image(&img);
        let header_end = out
            .windows(3)
            .position(|w| w == [ESC, b'*', 33])
            .unwrap()
            + 3
            + 2;
        let columns = &out[header_end..header_end + 4 * 3];
        assert!(columns.iter().all(|&b| b == 0xff));
    }
}
