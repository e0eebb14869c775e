// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF → bitmap rasterisation. A PDF is opaque to this server: pages are
// rendered by spawning an external Ghostscript-compatible binary rather
// than by parsing the PDF object graph in-process. A fast path extracts a
// single embedded JPEG/PNG directly from simple "scanned page" PDFs
// without paying for a rasteriser round trip at all.

use std::time::Duration;

use thermal_core::error::{Result, ThermalError};
use tokio::process::Command;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

const POLL_ATTEMPTS: u32 = 10;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Rasterise the first page of a PDF to PNG bytes at the given DPI, trying
/// the embedded-image fast path first.
#[instrument(skip(pdf_bytes), fields(pdf_len = pdf_bytes.len(), dpi))]
pub async fn rasterize_first_page(pdf_bytes: &[u8], dpi: u32) -> Result<Vec<u8>> {
    if let Some(embedded) = extract_embedded_image(pdf_bytes) {
        debug!(bytes = embedded.len(), "using embedded image fast path");
        return Ok(embedded);
    }
    rasterize_with_ghostscript(pdf_bytes, dpi).await
}

/// Whether the PDF looks like a single scanned page wrapped around one
/// embedded image (common for receipt/letter scans), as opposed to a
/// text-laid-out document that genuinely needs rendering.
fn is_image_wrapped_pdf(bytes: &[u8]) -> bool {
    contains(bytes, b"/DCTDecode") || contains(bytes, b"JFIF") || (contains(bytes, b"/FlateDecode") && contains(bytes, b"PNG"))
}

/// Extract a single embedded JPEG or PNG directly from the PDF's raw bytes
/// by locating its magic markers, without parsing the PDF object graph.
fn extract_embedded_image(bytes: &[u8]) -> Option<Vec<u8>> {
    if !is_image_wrapped_pdf(bytes) {
        return None;
    }

    if let Some(start) = find(bytes, b"\xff\xd8\xff")
        && let Some(end_rel) = find(&bytes[start..], b"\xff\xd9")
    {
        let end = start + end_rel + 2;
        return Some(bytes[start..end].to_vec());
    }
    if let Some(start) = find(bytes, b"\x89PNG")
        && let Some(end_rel) = find(&bytes[start..], b"IEND")
    {
        let end = (start + end_rel + 8).min(bytes.len());
        return Some(bytes[start..end].to_vec());
    }
    None
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Rasterise via an external Ghostscript-compatible binary, polling the
/// output directory briefly for the rendered page before giving up.
async fn rasterize_with_ghostscript(pdf_bytes: &[u8], dpi: u32) -> Result<Vec<u8>> {
    let dir = tempfile::tempdir()
        .map_err(|e| ThermalError::ConversionError(format!("temp dir: {e}")))?;
    let input_path = dir.path().join("input.pdf");
    tokio::fs::write(&input_path, pdf_bytes)
        .await
        .map_err(|e| ThermalError::ConversionError(format!("write input.pdf: {e}")))?;
    let output_pattern = dir.path().join("output-%03d.png");

    for attempt in 0..2 {
        run_ghostscript(&input_path, &output_pattern, dpi).await?;

        if let Some(png) = poll_for_output(dir.path()).await {
            return Ok(png);
        }
        warn!(attempt, "ghostscript produced no output, retrying");
    }

    Err(ThermalError::ConversionError(
        "ghostscript did not produce an output page".into(),
    ))
}

async fn run_ghostscript(
    input_path: &std::path::Path,
    output_pattern: &std::path::Path,
    dpi: u32,
) -> Result<()> {
    let status = Command::new("gs")
        .arg("-dNOPAUSE")
        .arg("-dBATCH")
        .arg("-dSAFER")
        .arg("-sDEVICE=png16m")
        .arg(format!("-r{dpi}"))
        .arg("-dTextAlphaBits=4")
        .arg("-dGraphicsAlphaBits=4")
        .arg(format!("-sOutputFile={}", output_pattern.display()))
        .arg(input_path)
        .status()
        .await
        .map_err(|e| ThermalError::ConversionError(format!("spawn ghostscript: {e}")))?;

    if !status.success() {
        warn!(?status, "ghostscript exited non-zero");
    }
    Ok(())
}

async fn poll_for_output(dir: &std::path::Path) -> Option<Vec<u8>> {
    let candidates = [dir.join("output-001.png"), dir.join("output.png")];
    for _ in 0..POLL_ATTEMPTS {
        for candidate in &candidates {
            if let Ok(bytes) = tokio::fs::read(candidate).await {
                info!(path = %candidate.display(), "ghostscript output found");
                return Some(bytes);
            }
        }
        sleep(POLL_INTERVAL).await;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_embedded_jpeg() {
        let mut pdf = b"%PDF-1.4\n/DCTDecode\n".to_vec();
        pdf.extend_from_slice(&[0xff, 0xd8, 0xff, 0x01, 0x02, 0xff, 0xd9]);
        pdf.extend_from_slice(b"\n%%EOF");
        let extracted = extract_embedded_image(&pdf).expect("should find jpeg");
        assert_eq!(extracted, vec![0xff, 0xd8, 0xff, 0x01, 0x02, 0xff, 0xd9]);
    }

    #[test]
    fn text_only_pdf_has_no_embedded_image() {
        let pdf = b"%PDF-1.4\n/Type /Catalog\n%%EOF".to_vec();
        assert!(extract_embedded_image(&pdf).is_none());
    }
}
