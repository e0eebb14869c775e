// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image preparation for a 1-bit thermal head: resize to the printer's
// native width, enhance contrast/sharpness/brightness in that exact
// order, then Floyd–Steinberg dither to 1 bit. Each enhancement follows
// the same degenerate-image blend used by PIL's `ImageEnhance`: result =
// degenerate + factor * (original - degenerate).

use image::{DynamicImage, GrayImage, Luma};
use thermal_core::error::{Result, ThermalError};
use tracing::{debug, info, instrument};

/// Image processing pipeline operating on a single in-memory grayscale
/// image, consuming `self` at each step so operations chain fluently.
pub struct ImageProcessor {
    image: GrayImage,
}

impl ImageProcessor {
    /// Decode raw encoded bytes (JPEG, PNG) into a grayscale processor.
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)
            .map_err(|err| ThermalError::ConversionError(format!("decode image: {err}")))?;
        debug!(width = img.width(), height = img.height(), "image decoded");
        Ok(Self {
            image: img.to_luma8(),
        })
    }

    /// Wrap an already-decoded image, converting to grayscale.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self {
            image: image.to_luma8(),
        }
    }

    /// Wrap an already-grayscale bitmap (e.g. from the PWG-Raster decoder).
    pub fn from_gray(image: GrayImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn into_gray(self) -> GrayImage {
        self.image
    }

    /// Resize to `target_width`, preserving aspect ratio, but only if the
    /// image is wider than the target — the printer cannot widen a narrow
    /// image, so small images are left alone.
    #[instrument(skip(self), fields(target_width))]
    pub fn resize_to_width_if_wider(self, target_width: u32) -> Self {
        if self.image.width() <= target_width {
            return self;
        }
        let scale = target_width as f64 / self.image.width() as f64;
        let target_height = ((self.image.height() as f64) * scale).round().max(1.0) as u32;
        info!(
            from_w = self.image.width(),
            from_h = self.image.height(),
            target_width,
            target_height,
            "resizing to printer width"
        );
        let resized = DynamicImage::ImageLuma8(self.image).resize_exact(
            target_width,
            target_height,
            image::imageops::FilterType::Lanczos3,
        );
        Self {
            image: resized.to_luma8(),
        }
    }

    /// Contrast enhancement, pivoting on the image's mean luma (matches
    /// PIL's `ImageEnhance.Contrast`, not a fixed mid-gray pivot).
    #[instrument(skip(self), fields(factor))]
    pub fn enhance_contrast(self, factor: f32) -> Self {
        let mean = mean_luma(&self.image);
        Self {
            image: blend_per_pixel(&self.image, factor, |_p| mean),
        }
    }

    /// Brightness enhancement: multiplicative, `factor * pixel`.
    #[instrument(skip(self), fields(factor))]
    pub fn enhance_brightness(self, factor: f32) -> Self {
        Self {
            image: blend_per_pixel(&self.image, factor, |_p| 0.0),
        }
    }

    /// Sharpness enhancement, blending toward a 3x3-box-blurred
    /// ("degenerate") version of the image.
    #[instrument(skip(self), fields(factor))]
    pub fn enhance_sharpness(self, factor: f32) -> Self {
        let smoothed = smooth_3x3(&self.image);
        let (width, height) = self.image.dimensions();
        let mut out = GrayImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let original = self.image.get_pixel(x, y).0[0] as f32;
                let degenerate = smoothed.get_pixel(x, y).0[0] as f32;
                let value = degenerate + factor * (original - degenerate);
                out.put_pixel(x, y, Luma([value.clamp(0.0, 255.0) as u8]));
            }
        }
        Self { image: out }
    }

    /// Floyd–Steinberg error-diffusion dither to a 1-bit-equivalent image
    /// (pixels are exactly 0 or 255 afterward). Non-serpentine: every row
    /// scans left to right.
    #[instrument(skip(self))]
    pub fn dither_floyd_steinberg(self) -> GrayImage {
        floyd_steinberg(&self.image)
    }
}

fn mean_luma(image: &GrayImage) -> f32 {
    let total: u64 = image.pixels().map(|p| p.0[0] as u64).sum();
    let count = (image.width() as u64 * image.height() as u64).max(1);
    total as f32 / count as f32
}

/// Blend every pixel toward a per-pixel "degenerate" value by `factor`,
/// the shared shape of PIL's brightness/contrast enhancers.
fn blend_per_pixel(image: &GrayImage, factor: f32, degenerate_for: impl Fn(u8) -> f32) -> GrayImage {
    let (width, height) = image.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let original = image.get_pixel(x, y).0[0];
        let degenerate = degenerate_for(original);
        let value = degenerate + factor * (original as f32 - degenerate);
        Luma([value.clamp(0.0, 255.0) as u8])
    })
}

/// PIL's `ImageFilter.SMOOTH` kernel: a 3x3 box with extra weight on the
/// center pixel, normalized by 13. Edge pixels reuse the border value.
fn smooth_3x3(image: &GrayImage) -> GrayImage {
    const KERNEL: [[f32; 3]; 3] = [[1.0, 1.0, 1.0], [1.0, 5.0, 1.0], [1.0, 1.0, 1.0]];
    const NORM: f32 = 13.0;

    let (width, height) = image.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let mut acc = 0.0f32;
        for (ky, row) in KERNEL.iter().enumerate() {
            for (kx, weight) in row.iter().enumerate() {
                let sx = (x as i64 + kx as i64 - 1).clamp(0, width as i64 - 1) as u32;
                let sy = (y as i64 + ky as i64 - 1).clamp(0, height as i64 - 1) as u32;
                acc += weight * image.get_pixel(sx, sy).0[0] as f32;
            }
        }
        Luma([(acc / NORM).clamp(0.0, 255.0) as u8])
    })
}

/// Floyd–Steinberg dithering with the classic weights (7/16, 3/16, 5/16,
/// 1/16) distributed to the right, below-left, below, and below-right
/// neighbours.
fn floyd_steinberg(image: &GrayImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut errors: Vec<f32> = image.pixels().map(|p| p.0[0] as f32).collect();
    let mut out = GrayImage::new(width, height);

    let idx = |x: i64, y: i64| -> Option<usize> {
        if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
            None
        } else {
            Some(y as usize * width as usize + x as usize)
        }
    };

    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let i = idx(x, y).unwrap();
            let old = errors[i].clamp(0.0, 255.0);
            let new_pixel = if old < 128.0 { 0u8 } else { 255u8 };
            out.put_pixel(x as u32, y as u32, Luma([new_pixel]));
            let error = old - new_pixel as f32;

            if let Some(j) = idx(x + 1, y) {
                errors[j] += error * 7.0 / 16.0;
            }
            if let Some(j) = idx(x - 1, y + 1) {
                errors[j] += error * 3.0 / 16.0;
            }
            if let Some(j) = idx(x, y + 1) {
                errors[j] += error * 5.0 / 16.0;
            }
            if let Some(j) = idx(x + 1, y + 1) {
                errors[j] += error * 1.0 / 16.0;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_preserves_aspect_ratio() {
        let image = GrayImage::from_pixel(1000, 500, Luma([128]));
        let processor = ImageProcessor { image };
        let resized = processor.resize_to_width_if_wider(576);
        assert_eq!(resized.width(), 576);
        assert_eq!(resized.height(), 288);
    }

    #[test]
    fn resize_skips_narrow_images() {
        let image = GrayImage::from_pixel(400, 200, Luma([128]));
        let processor = ImageProcessor { image };
        let resized = processor.resize_to_width_if_wider(576);
        assert_eq!(resized.width(), 400);
    }

    #[test]
    fn dither_produces_only_black_or_white() {
        let image = GrayImage::from_fn(16, 16, |x, _y| Luma([(x * 16) as u8]));
        let dithered = floyd_steinberg(&image);
        assert!(dithered.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn uniform_gray_dithers_to_checkerboard_ratio() {
        let image = GrayImage::from_pixel(32, 32, Luma([128]));
        let dithered = floyd_steinberg(&image);
        let black = dithered.pixels().filter(|p| p.0[0] == 0).count();
        let total = (32 * 32) as f32;
        let ratio = black as f32 / total;
        assert!((0.3..0.7).contains(&ratio));
    }

    #[test]
    fn brightness_factor_one_is_identity() {
        let image = GrayImage::from_pixel(4, 4, Luma([100]));
        let processor = ImageProcessor { image };
        let out = processor.enhance_brightness(1.0).into_gray();
        assert_eq!(out.get_pixel(0, 0).0[0], 100);
    }
}
