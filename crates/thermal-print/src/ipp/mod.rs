// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// IPP protocol handling: binary codec, status-code mapping, and the HTTP
// server that dispatches the five implemented operations.

pub mod codec;
pub mod server;
pub mod status;

pub use codec::{IppMessage, IppResponseBuilder};
pub use server::serve;
