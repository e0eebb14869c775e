// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Format sniffing from magic bytes, for when a client sends
// `application/octet-stream` or omits `document-format` entirely.

use thermal_core::DocumentFormat;

/// ESC/POS command markers searched for in the leading bytes of a stream
/// that isn't recognised by any other magic number.
const ESCPOS_MARKERS: [&[u8]; 5] = [b"\x1b@", b"\x1b*", b"\x1d", b"\x1ba", b"\x1bE"];

/// Inspect the leading bytes of a document and guess its format.
///
/// Mirrors the order an original Python implementation of this sniffer
/// used: PDF, JPEG, PNG, then a scan for ESC/POS control bytes, falling
/// back to `OctetStream` when nothing matches.
pub fn sniff_format(bytes: &[u8]) -> DocumentFormat {
    if bytes.starts_with(b"%PDF") {
        return DocumentFormat::Pdf;
    }
    if bytes.starts_with(b"\xff\xd8\xff") {
        return DocumentFormat::Jpeg;
    }
    if bytes.starts_with(b"\x89PNG") {
        return DocumentFormat::Png;
    }
    if is_escpos_data(bytes) {
        return DocumentFormat::EscPos;
    }
    DocumentFormat::OctetStream
}

/// Whether the stream looks like an already-encoded ESC/POS command
/// sequence rather than raw binary data.
fn is_escpos_data(bytes: &[u8]) -> bool {
    if bytes.len() < 10 {
        return false;
    }
    let head = &bytes[..bytes.len().min(256)];
    ESCPOS_MARKERS.iter().any(|marker| {
        head.windows(marker.len()).any(|w| w == *marker)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_pdf() {
        assert_eq!(sniff_format(b"%PDF-1.4\n..."), DocumentFormat::Pdf);
    }

    #[test]
    fn detects_jpeg() {
        let mut data = vec![0xff, 0xd8, 0xff, 0xe0];
        data.extend_from_slice(&[0u8; 20]);
        assert_eq!(sniff_format(&data), DocumentFormat::Jpeg);
    }

    #[test]
    fn detects_png() {
        let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
        data.extend_from_slice(&[0u8; 20]);
        assert_eq!(sniff_format(&data), DocumentFormat::Png);
    }

    #[test]
    fn detects_escpos_init() {
        let mut data = b"\x1b@".to_vec();
        data.extend_from_slice(&[0u8; 20]);
        assert_eq!(sniff_format(&data), DocumentFormat::EscPos);
    }

    #[test]
    fn short_garbage_is_octet_stream() {
        assert_eq!(sniff_format(b"\x1b@"), DocumentFormat::OctetStream);
    }

    #[test]
    fn unrecognised_is_octet_stream() {
        let data = vec![0u8; 32];
        assert_eq!(sniff_format(&data), DocumentFormat::OctetStream);
    }
}
