// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer and server configuration.
//
// Loading this struct from the environment and the command line is the
// binary's job (`thermal_app::config`), not the core's — the core only
// consumes an already-validated `Config`.

use serde::{Deserialize, Serialize};

/// Immutable server/printer configuration, constructed once in `main` and
/// passed by reference to every other component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub printer_name: String,
    pub printer_info: String,
    pub printer_location: String,
    pub printer_make_model: String,
    /// Roll width in millimetres (58, 80, or 110).
    pub width_mm: u32,
    /// Printer resolution in DPI (203 or 300).
    pub dpi: u32,
    /// Maximum printable width in pixels (derived from width_mm/dpi by the
    /// known printer's native raster width, e.g. 576 for 80mm @ 203dpi).
    pub max_pixels: u32,
    pub usb_vendor_id: Option<u16>,
    pub usb_product_id: Option<u16>,
    pub usb_timeout_ms: u64,
    pub printer_uuid: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 631,
            printer_name: "Thermal-Printer".into(),
            printer_info: "IPP Thermal Printer".into(),
            printer_location: "Office".into(),
            printer_make_model: "Generic Thermal ESC/POS Printer".into(),
            width_mm: 80,
            dpi: 203,
            max_pixels: 576,
            usb_vendor_id: None,
            usb_product_id: None,
            usb_timeout_ms: 5000,
            printer_uuid: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl Config {
    /// Validate the configuration, returning every violation found (rather
    /// than failing on the first) so a misconfigured deployment gets a
    /// complete error report.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push("port must be between 1 and 65535".into());
        }
        if !matches!(self.width_mm, 58 | 80 | 110) {
            errors.push(format!(
                "width_mm must be one of 58, 80, 110 (got {})",
                self.width_mm
            ));
        }
        if !matches!(self.dpi, 203 | 300) {
            errors.push(format!("dpi must be 203 or 300 (got {})", self.dpi));
        }
        if self.printer_name.trim().is_empty() {
            errors.push("printer_name must not be empty".into());
        }
        if self.max_pixels == 0 {
            errors.push("max_pixels must be greater than zero".into());
        }

        errors
    }

    /// `printer-uri` as advertised in IPP responses and HTTP info pages.
    pub fn printer_uri(&self, port: u16) -> String {
        format!("ipp://localhost:{port}/ipp/print")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn rejects_non_standard_width() {
        let config = Config {
            width_mm: 42,
            ..Config::default()
        };
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.contains("width_mm")));
    }

    #[test]
    fn rejects_empty_name() {
        let config = Config {
            printer_name: "  ".into(),
            ..Config::default()
        };
        assert!(config.validate().iter().any(|e| e.contains("printer_name")));
    }
}
