// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// USB bulk-transfer printer backend, built on `rusb`. Discovery tries, in
// order: the configured vendor/product id, a built-in allow-list of known
// thermal-printer ids, then a scan of every USB device for a printer-class
// (0x07) interface.

use std::time::Duration;

use rusb::{Direction, TransferType, UsbContext};
use thermal_core::error::{Result, ThermalError};
use tracing::{debug, info, instrument, warn};

use super::DeviceBackend;

/// USB printer device-class code (USB-IF base class "Printer").
const USB_CLASS_PRINTER: u8 = 0x07;

/// Fallback `wMaxPacketSize` when the endpoint descriptor doesn't specify
/// one (shouldn't happen in practice, but a bulk endpoint is guaranteed to
/// report something).
const DEFAULT_MAX_PACKET_SIZE: usize = 64;

/// Known (vendor, product) ids for common thermal receipt printers that
/// don't always identify with a generic printer-class interface.
const KNOWN_THERMAL_PRINTERS: &[(u16, u16)] = &[
    (0x0483, 0x5743), // generic STMicro-based ESC/POS printer
    (0x04b8, 0x0202), // Epson TM-T20-family
    (0x0519, 0x0001), // Star Micronics TSP100-family
    (0x0fe6, 0x811e), // ICS Advent / common generic ESC/POS USB printer
];

pub struct UsbBackend {
    handle: rusb::DeviceHandle<rusb::Context>,
    interface_number: u8,
    out_endpoint: u8,
    max_packet_size: usize,
    timeout: Duration,
    connected: bool,
}

impl UsbBackend {
    fn open(
        device: rusb::Device<rusb::Context>,
        timeout: Duration,
    ) -> Result<Self> {
        let config = device
            .active_config_descriptor()
            .or_else(|_| device.config_descriptor(0))
            .map_err(|e| ThermalError::PrinterConnectionError(format!("no config descriptor: {e}")))?;

        let mut found = None;
        'outer: for interface in config.interfaces() {
            for descriptor in interface.descriptors() {
                for endpoint in descriptor.endpoint_descriptors() {
                    if endpoint.transfer_type() == TransferType::Bulk
                        && endpoint.direction() == Direction::Out
                    {
                        found = Some((
                            descriptor.interface_number(),
                            endpoint.address(),
                            endpoint.max_packet_size() as usize,
                        ));
                        break 'outer;
                    }
                }
            }
        }

        let (interface_number, out_endpoint, max_packet_size) = found.ok_or_else(|| {
            ThermalError::PrinterConnectionError("no bulk OUT endpoint found".into())
        })?;
        let max_packet_size = if max_packet_size == 0 { DEFAULT_MAX_PACKET_SIZE } else { max_packet_size };

        let handle = device
            .open()
            .map_err(|e| ThermalError::PrinterConnectionError(format!("failed to open device: {e}")))?;

        if let Ok(true) = handle.kernel_driver_active(interface_number) {
            let _ = handle.detach_kernel_driver(interface_number);
        }
        // A "device busy" error here is acceptable -- some printers reject
        // set_configuration once already configured by the kernel.
        let _ = handle.set_active_configuration(config.number());
        handle
            .claim_interface(interface_number)
            .map_err(|e| ThermalError::PrinterConnectionError(format!("failed to claim interface: {e}")))?;

        info!(interface_number, out_endpoint, max_packet_size, "USB printer opened");

        Ok(Self {
            handle,
            interface_number,
            out_endpoint,
            max_packet_size,
            timeout,
            connected: true,
        })
    }
}

impl DeviceBackend for UsbBackend {
    fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        for chunk in bytes.chunks(self.max_packet_size) {
            let written = self
                .handle
                .write_bulk(self.out_endpoint, chunk, self.timeout)
                .map_err(|e| ThermalError::PrinterConnectionError(format!("USB write failed: {e}")))?;
            if written != chunk.len() {
                return Err(ThermalError::PrinterConnectionError(format!(
                    "short USB write: wrote {written} of {} bytes",
                    chunk.len()
                )));
            }
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) {
        let _ = self.handle.release_interface(self.interface_number);
        self.connected = false;
    }
}

/// Discover and open a USB thermal printer. Tries, in order: the
/// configured vendor/product id (if given), the built-in allow-list, then
/// any device exposing a printer-class (0x07) interface.
#[instrument(skip(usb_vendor_id, usb_product_id))]
pub fn discover(
    usb_vendor_id: Option<u16>,
    usb_product_id: Option<u16>,
    usb_timeout_ms: u64,
) -> Result<UsbBackend> {
    let timeout = Duration::from_millis(usb_timeout_ms);
    let context = rusb::Context::new()
        .map_err(|e| ThermalError::PrinterConnectionError(format!("libusb init failed: {e}")))?;
    let devices = context
        .devices()
        .map_err(|e| ThermalError::PrinterConnectionError(format!("USB enumeration failed: {e}")))?;

    if let (Some(vid), Some(pid)) = (usb_vendor_id, usb_product_id) {
        for device in devices.iter() {
            if let Ok(descriptor) = device.device_descriptor()
                && descriptor.vendor_id() == vid
                && descriptor.product_id() == pid
            {
                debug!(vid, pid, "matched configured USB vendor/product id");
                return UsbBackend::open(device, timeout);
            }
        }
        return Err(ThermalError::PrinterConnectionError(format!(
            "configured USB device {vid:04x}:{pid:04x} not found"
        )));
    }

    for device in devices.iter() {
        if let Ok(descriptor) = device.device_descriptor() {
            let key = (descriptor.vendor_id(), descriptor.product_id());
            if KNOWN_THERMAL_PRINTERS.contains(&key) {
                debug!(vid = key.0, pid = key.1, "matched known thermal printer allow-list");
                return UsbBackend::open(device, timeout);
            }
        }
    }

    for device in devices.iter() {
        if let Ok(config) = device.active_config_descriptor().or_else(|_| device.config_descriptor(0)) {
            let is_printer_class = config
                .interfaces()
                .flat_map(|i| i.descriptors())
                .any(|d| d.class_code() == USB_CLASS_PRINTER);
            if is_printer_class {
                debug!("matched USB printer-class (0x07) interface via scan");
                return UsbBackend::open(device, timeout);
            }
        }
    }

    warn!("no USB printer device found by any discovery strategy");
    Err(ThermalError::PrinterConnectionError("no USB printer device found".into()))
}
