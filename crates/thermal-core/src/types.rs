// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the thermal print server: jobs, job lifecycle
// states, document formats, and printer state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Integer identifier for a print job, also used as the IPP `job-id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub i32);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a print job (RFC 8011 §4.3.7 `job-state` values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Queued, not yet accepted for processing.
    Pending,
    /// Being converted and/or written to the device.
    Processing,
    /// User or client requested cancellation.
    Canceled,
    /// Processing failed (conversion or device error).
    Aborted,
    /// Successfully printed.
    Completed,
}

impl JobState {
    /// IPP `job-state` enum value (RFC 8011 §4.3.7).
    pub fn ipp_value(self) -> i32 {
        match self {
            Self::Pending => 3,
            Self::Processing => 5,
            Self::Canceled => 7,
            Self::Aborted => 8,
            Self::Completed => 9,
        }
    }

    /// Whether this state is terminal (no further transitions possible).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Canceled | Self::Aborted | Self::Completed)
    }

    /// IPP `job-state-reasons` keyword for the current state.
    pub fn reason_keyword(self) -> &'static str {
        match self {
            Self::Pending => "job-queued",
            Self::Processing => "job-printing",
            Self::Canceled => "job-canceled-by-user",
            Self::Aborted => "job-aborted-by-system",
            Self::Completed => "job-completed-successfully",
        }
    }
}

/// Document formats the converter pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentFormat {
    Pdf,
    Jpeg,
    Png,
    PwgRaster,
    /// Already-encoded ESC/POS command stream — passed straight through.
    EscPos,
    OctetStream,
}

impl DocumentFormat {
    /// MIME type string as used on the wire and in IPP `document-format`.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::PwgRaster => "image/pwg-raster",
            Self::EscPos => "application/vnd.escpos",
            Self::OctetStream => "application/octet-stream",
        }
    }

    /// Map an IPP/HTTP `document-format` MIME string to a format, if known.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "application/pdf" => Some(Self::Pdf),
            "image/jpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/pwg-raster" => Some(Self::PwgRaster),
            "application/vnd.escpos" => Some(Self::EscPos),
            "application/octet-stream" => Some(Self::OctetStream),
            _ => None,
        }
    }
}

/// Current state of the printer as a whole (spec §4.2, §9.50).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrinterState {
    Idle,
    Processing,
    Stopped,
}

impl PrinterState {
    /// IPP `printer-state` enum value (RFC 8011 §4.4.11).
    pub fn ipp_value(self) -> i32 {
        match self {
            Self::Idle => 3,
            Self::Processing => 4,
            Self::Stopped => 5,
        }
    }
}

/// A print job tracked by the in-memory job store.
///
/// `document_bytes` is cheap to clone (`bytes::Bytes` is refcounted) so a
/// `Job` can be snapshotted for `Get-Jobs` without copying the payload.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub uuid: Uuid,
    pub name: String,
    pub requesting_user_name: String,
    pub format: DocumentFormat,
    pub state: JobState,
    pub state_reasons: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub document_bytes: bytes::Bytes,
    pub error: Option<String>,
}

impl Job {
    pub fn new(
        id: JobId,
        name: String,
        requesting_user_name: String,
        format: DocumentFormat,
        document_bytes: bytes::Bytes,
    ) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            name,
            requesting_user_name,
            format,
            state: JobState::Pending,
            state_reasons: vec!["job-queued".into()],
            created_at: Utc::now(),
            completed_at: None,
            document_bytes,
            error: None,
        }
    }

    /// Move to `state`, replacing `state_reasons` with the single reason
    /// keyword for that state. Stamps `completed_at` on reaching a terminal
    /// state; terminal jobs never transition again (enforced by callers).
    pub fn transition(&mut self, state: JobState) {
        self.state = state;
        self.state_reasons = vec![state.reason_keyword().to_string()];
        if state.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
    }
}
