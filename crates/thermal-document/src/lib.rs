// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document conversion pipeline: sniff the incoming bytes, rasterise to a
// bitmap (via Ghostscript for PDF, decoding directly for images, a
// best-effort reinterpretation for PWG-Raster), prepare the bitmap for a
// 1-bit thermal head, and encode it as ESC/POS.

pub mod convert;
pub mod escpos;
pub mod image;
pub mod pdf;
pub mod pwg;
pub mod sniff;

pub use convert::convert_to_escpos;
pub use image::processor::ImageProcessor;
pub use sniff::sniff_format;
