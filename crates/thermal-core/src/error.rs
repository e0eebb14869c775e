// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error type for the thermal print server.

use thiserror::Error;

/// Top-level error type for all server operations.
///
/// Each variant maps to exactly one IPP status code at the dispatch site
/// (see `thermal_print::ipp::status_for`); this enum itself carries no IPP
/// knowledge.
#[derive(Debug, Error)]
pub enum ThermalError {
    /// Malformed IPP request: truncated framing, attribute before the first
    /// delimiter tag, or other wire-level violation.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The document-format sniffed or declared is not one this server
    /// converts.
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// A referenced job-id does not exist (and never did).
    #[error("not found: {0}")]
    NotFound(String),

    /// The request is syntactically valid but cannot be honoured given the
    /// target's current state (e.g. cancelling an already-terminal job).
    #[error("not possible: {0}")]
    NotPossible(String),

    /// The requested IPP operation is not one of the five implemented.
    #[error("operation not supported: {0}")]
    OperationNotSupported(String),

    /// The printer is stopped (device disconnected) and cannot accept jobs.
    #[error("not accepting jobs: {0}")]
    NotAcceptingJobs(String),

    /// Document conversion (rasterisation, dithering, encoding) failed.
    #[error("conversion failed: {0}")]
    ConversionError(String),

    /// The printer device could not be opened, claimed, or written to.
    #[error("printer connection failed: {0}")]
    PrinterConnectionError(String),

    /// File I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure, e.g. building the `/printer` snapshot.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anything else — logged and surfaced as a server-error-internal-error.
    #[error("internal error: {0}")]
    InternalError(String),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ThermalError>;
