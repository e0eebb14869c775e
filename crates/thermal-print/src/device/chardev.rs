// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Character-device printer backend, used when no USB bulk interface can
// be claimed (e.g. the kernel's `usblp` driver already owns the device).
// Writes are unbuffered with an explicit flush after every call.

use std::fs::OpenOptions;
use std::io::Write;

use thermal_core::error::{Result, ThermalError};
use tracing::{debug, info, instrument};

use super::DeviceBackend;

/// Character-device paths tried in order; the first one that opens for
/// writing wins.
const CANDIDATE_PATHS: &[&str] = &["/dev/usb/lp0", "/dev/usb/lp1", "/dev/lp0", "/dev/lp1"];

pub struct CharDeviceBackend {
    path: String,
    file: std::fs::File,
    connected: bool,
}

impl DeviceBackend for CharDeviceBackend {
    fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.file
            .write_all(bytes)
            .and_then(|_| self.file.flush())
            .map_err(|e| {
                ThermalError::PrinterConnectionError(format!(
                    "character-device write to {} failed: {e}",
                    self.path
                ))
            })
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

/// Open the first writable character device in [`CANDIDATE_PATHS`].
#[instrument]
pub fn discover() -> Result<CharDeviceBackend> {
    for path in CANDIDATE_PATHS {
        match OpenOptions::new().write(true).open(path) {
            Ok(file) => {
                info!(path, "opened character-device printer backend");
                return Ok(CharDeviceBackend {
                    path: path.to_string(),
                    file,
                    connected: true,
                });
            }
            Err(e) => debug!(path, error = %e, "character device not usable"),
        }
    }
    Err(ThermalError::PrinterConnectionError(
        "no writable character-device printer path found".into(),
    ))
}
