// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Maps the core error taxonomy onto IPP status codes (RFC 8011 §13).

use thermal_core::error::ThermalError;

pub const STATUS_OK: u16 = 0x0000;
pub const STATUS_BAD_REQUEST: u16 = 0x0400;
pub const STATUS_NOT_FOUND: u16 = 0x0406;
pub const STATUS_NOT_POSSIBLE: u16 = 0x0404;
pub const STATUS_DOCUMENT_FORMAT_NOT_SUPPORTED: u16 = 0x040A;
pub const STATUS_OPERATION_NOT_SUPPORTED: u16 = 0x0501;
pub const STATUS_NOT_ACCEPTING_JOBS: u16 = 0x0506;
pub const STATUS_INTERNAL_ERROR: u16 = 0x0500;

/// Classify an error into the IPP status code a synchronous handler should
/// return. Pipeline errors that occur after accept (`ConversionError`,
/// `PrinterConnectionError`) have no IPP status of their own -- they only
/// ever surface as job state via Get-Jobs -- so they fall back to the
/// internal-error code here defensively; callers must not invoke this for
/// those two variants on the accept path.
pub fn to_ipp_status(err: &ThermalError) -> u16 {
    match err {
        ThermalError::BadRequest(_) => STATUS_BAD_REQUEST,
        ThermalError::UnsupportedFormat(_) => STATUS_DOCUMENT_FORMAT_NOT_SUPPORTED,
        ThermalError::NotFound(_) => STATUS_NOT_FOUND,
        ThermalError::NotPossible(_) => STATUS_NOT_POSSIBLE,
        ThermalError::OperationNotSupported(_) => STATUS_OPERATION_NOT_SUPPORTED,
        ThermalError::NotAcceptingJobs(_) => STATUS_NOT_ACCEPTING_JOBS,
        ThermalError::ConversionError(_) => STATUS_INTERNAL_ERROR,
        ThermalError::PrinterConnectionError(_) => STATUS_INTERNAL_ERROR,
        ThermalError::Io(_) => STATUS_INTERNAL_ERROR,
        ThermalError::Serialization(_) => STATUS_INTERNAL_ERROR,
        ThermalError::InternalError(_) => STATUS_INTERNAL_ERROR,
    }
}
