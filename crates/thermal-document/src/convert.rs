// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Top-level document conversion pipeline: format sniff result in, a
// complete ESC/POS command stream out.

use thermal_core::error::{Result, ThermalError};
use thermal_core::DocumentFormat;
use tracing::{info, instrument};

use crate::image::processor::ImageProcessor;
use crate::{escpos, pdf, pwg};

/// Contrast/sharpness/brightness enhancement factors applied, in that
/// exact order, before dithering. Deviating from this order is
/// user-visible on the printed receipt.
const CONTRAST_FACTOR: f32 = 1.8;
const SHARPNESS_FACTOR: f32 = 2.0;
const BRIGHTNESS_FACTOR: f32 = 1.1;

/// Convert a document to a ready-to-send ESC/POS command stream.
///
/// `max_pixels` is the printer's native raster width (e.g. 576 for an
/// 80mm head at 203 DPI); `dpi` is used only for PDF rasterisation.
#[instrument(skip(document_bytes), fields(document_len = document_bytes.len(), ?format))]
pub async fn convert_to_escpos(
    document_bytes: &[u8],
    format: DocumentFormat,
    max_pixels: u32,
    dpi: u32,
) -> Result<Vec<u8>> {
    if format == DocumentFormat::EscPos {
        info!("document is already ESC/POS — passing through");
        return Ok(document_bytes.to_vec());
    }

    let processor = match format {
        DocumentFormat::Pdf => {
            let png_bytes = pdf::rasterize_first_page(document_bytes, dpi).await?;
            ImageProcessor::from_bytes(&png_bytes)?
        }
        DocumentFormat::Jpeg | DocumentFormat::Png => ImageProcessor::from_bytes(document_bytes)?,
        DocumentFormat::PwgRaster => {
            ImageProcessor::from_gray(pwg::decode_best_effort(document_bytes, max_pixels))
        }
        DocumentFormat::OctetStream => {
            return Err(ThermalError::UnsupportedFormat(
                "octet-stream data did not sniff as a known format".into(),
            ));
        }
        DocumentFormat::EscPos => unreachable!("handled by the early return above"),
    };

    let dithered = processor
        .resize_to_width_if_wider(max_pixels)
        .enhance_contrast(CONTRAST_FACTOR)
        .enhance_sharpness(SHARPNESS_FACTOR)
        .enhance_brightness(BRIGHTNESS_FACTOR)
        .dither_floyd_steinberg();

    Ok(escpos::encode_image(&dithered))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = image::GrayImage::from_pixel(width, height, image::Luma([200]));
        let mut buffer = Vec::new();
        image::DynamicImage::ImageLuma8(image)
            .write_to(&mut std::io::Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[tokio::test]
    async fn converts_png_to_escpos() {
        let bytes = png_bytes(32, 32);
        let out = convert_to_escpos(&bytes, DocumentFormat::Png, 576, 203)
            .await
            .unwrap();
        assert_eq!(&out[0..2], &[0x1b, b'@']);
        assert_eq!(&out[out.len() - 4..], &[0x1d, b'V', 66, 0]);
    }

    #[tokio::test]
    async fn escpos_passthrough_is_unmodified() {
        let bytes = vec![0x1b, b'@', 1, 2, 3];
        let out = convert_to_escpos(&bytes, DocumentFormat::EscPos, 576, 203)
            .await
            .unwrap();
        assert_eq!(out, bytes);
    }
}
