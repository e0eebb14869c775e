// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reads the process environment (spec §6.4) into a `thermal_core::Config`,
// then layers CLI overrides (§6.5) on top. This is the only place the
// server reads `std::env` -- the core crate never does.

use thermal_core::Config;

use crate::cli::Cli;

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Build a `Config` from `PRINTSERVER_*`/`PRINTER_*`/`USB_*` environment
/// variables (spec §6.4), then apply any CLI overrides (`--host`,
/// `--port`).
pub fn from_env(cli: &Cli) -> Config {
    let defaults = Config::default();

    let mut config = Config {
        host: env_string("PRINTSERVER_HOST", &defaults.host),
        port: env_parse("PRINTSERVER_PORT", defaults.port),
        printer_name: env_string("PRINTER_NAME", &defaults.printer_name),
        printer_info: env_string("PRINTER_INFO", &defaults.printer_info),
        printer_location: env_string("PRINTER_LOCATION", &defaults.printer_location),
        printer_make_model: env_string("PRINTER_MAKE_MODEL", &defaults.printer_make_model),
        width_mm: env_parse("PRINTER_WIDTH_MM", defaults.width_mm),
        dpi: env_parse("PRINTER_DPI", defaults.dpi),
        max_pixels: env_parse("PRINTER_MAX_PIXELS", defaults.max_pixels),
        usb_vendor_id: std::env::var("USB_VENDOR_ID")
            .ok()
            .and_then(|v| u16::from_str_radix(v.trim_start_matches("0x"), 16).ok()),
        usb_product_id: std::env::var("USB_PRODUCT_ID")
            .ok()
            .and_then(|v| u16::from_str_radix(v.trim_start_matches("0x"), 16).ok()),
        usb_timeout_ms: env_parse("USB_TIMEOUT", defaults.usb_timeout_ms),
        printer_uuid: env_string("PRINTER_UUID", &defaults.printer_uuid),
    };

    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_take_precedence_over_env() {
        let cli = Cli {
            host: Some("127.0.0.1".into()),
            port: Some(9631),
            ..Cli::default_for_test()
        };
        let config = from_env(&cli);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9631);
    }
}
