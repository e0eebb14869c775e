// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer device backend: discovers and writes to the physical thermal
// printer, either over USB bulk transfer or through a Linux character
// device (`/dev/usb/lp*`). Exactly one backend handle is live at a time,
// guarded process-wide by a single-holder, non-reentrant mutex so that at
// most one job ever holds the writer at once.

pub mod chardev;
pub mod usb;

use std::sync::Arc;

use thermal_core::error::{Result, ThermalError};
use tokio::sync::Mutex;
use tracing::{instrument, warn};

/// Default USB bulk-transfer timeout, and the upper bound a write waits
/// before the backend gives up and marks itself disconnected.
pub const DEFAULT_USB_TIMEOUT_MS: u64 = 5000;

/// A connected printer's write surface. Implementors must never panic on
/// I/O failure -- they downgrade to `disconnected` and surface a typed
/// error instead.
pub trait DeviceBackend: Send + Sync {
    /// Send raw bytes to the device, chunked internally as the transport
    /// requires (USB: by `wMaxPacketSize`; character device: whole write).
    fn send_raw(&mut self, bytes: &[u8]) -> Result<()>;

    /// Whether the backend believes the device is currently reachable.
    fn is_connected(&self) -> bool;

    /// Mark the backend disconnected, e.g. after a write failure.
    fn disconnect(&mut self);
}

/// Discover a printer backend using the configured vendor/product id, the
/// built-in allow-list, then a scan for USB printer-class devices, falling
/// back to known character-device paths.
///
/// Returns `Err(PrinterConnectionError)` if no backend can be opened by
/// any strategy.
#[instrument(skip(usb_vendor_id, usb_product_id))]
pub fn discover(
    usb_vendor_id: Option<u16>,
    usb_product_id: Option<u16>,
    usb_timeout_ms: u64,
) -> Result<Box<dyn DeviceBackend>> {
    match usb::discover(usb_vendor_id, usb_product_id, usb_timeout_ms) {
        Ok(backend) => return Ok(Box::new(backend)),
        Err(e) => warn!(error = %e, "USB discovery failed, falling back to character device"),
    }

    chardev::discover()
        .map(|backend| Box::new(backend) as Box<dyn DeviceBackend>)
        .map_err(|e| {
            ThermalError::PrinterConnectionError(format!(
                "no printer device found (USB and character-device discovery both failed: {e})"
            ))
        })
}

/// Process-wide handle to the active device backend. Holds at most one
/// backend at a time behind a non-reentrant `tokio::sync::Mutex`; a second
/// writer blocks until the first releases the lock, which is how the
/// pipeline achieves globally-serialized, FIFO-fair device writes.
#[derive(Clone)]
pub struct DeviceHandle {
    inner: Arc<Mutex<Option<Box<dyn DeviceBackend>>>>,
    usb_vendor_id: Option<u16>,
    usb_product_id: Option<u16>,
    usb_timeout_ms: u64,
}

impl DeviceHandle {
    pub fn new(usb_vendor_id: Option<u16>, usb_product_id: Option<u16>, usb_timeout_ms: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
            usb_vendor_id,
            usb_product_id,
            usb_timeout_ms,
        }
    }

    /// Whether a backend is currently connected.
    pub async fn is_connected(&self) -> bool {
        self.inner
            .lock()
            .await
            .as_ref()
            .map(|b| b.is_connected())
            .unwrap_or(false)
    }

    /// Send bytes to the device, acquiring the writer lock for the
    /// duration. On failure the backend is marked disconnected and the
    /// next call attempts exactly one reconnection before giving up.
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub async fn send_raw(&self, bytes: &[u8]) -> Result<()> {
        let mut guard = self.inner.lock().await;

        if guard.is_none() || !guard.as_ref().unwrap().is_connected() {
            *guard = Some(discover(self.usb_vendor_id, self.usb_product_id, self.usb_timeout_ms)?);
        }

        let backend = guard.as_mut().unwrap();
        match backend.send_raw(bytes) {
            Ok(()) => Ok(()),
            Err(e) => {
                backend.disconnect();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeBackend {
        connected: bool,
        fail: bool,
        pub written: Vec<u8>,
    }

    impl DeviceBackend for FakeBackend {
        fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
            if self.fail {
                return Err(ThermalError::PrinterConnectionError("fake failure".into()));
            }
            self.written.extend_from_slice(bytes);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn disconnect(&mut self) {
            self.connected = false;
        }
    }

    #[tokio::test]
    async fn handle_serializes_writes_behind_single_mutex() {
        let handle = DeviceHandle::new(None, None, 5000);
        *handle.inner.lock().await = Some(Box::new(FakeBackend {
            connected: true,
            fail: false,
            written: Vec::new(),
        }));
        handle.send_raw(b"abc").await.unwrap();
        handle.send_raw(b"def").await.unwrap();
        assert!(handle.is_connected().await);
    }

    #[tokio::test]
    async fn write_failure_marks_disconnected() {
        let handle = DeviceHandle::new(None, None, 5000);
        *handle.inner.lock().await = Some(Box::new(FakeBackend {
            connected: true,
            fail: true,
            written: Vec::new(),
        }));
        assert!(handle.send_raw(b"abc").await.is_err());
    }
}
