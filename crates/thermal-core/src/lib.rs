// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types, error taxonomy, and configuration shared across the
// thermal print server's crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::ThermalError;
pub use types::*;
