// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line surface (spec §6.5).

use clap::Parser;

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "thermal-ippd", version, about = "Driverless thermal-printer IPP server")]
pub struct Cli {
    /// Override PRINTSERVER_HOST.
    #[arg(long)]
    pub host: Option<String>,

    /// Override PRINTSERVER_PORT.
    #[arg(long)]
    pub port: Option<u16>,

    /// Override LOG_LEVEL.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Write logs to this file in addition to stderr.
    #[arg(long)]
    pub log_file: Option<String>,

    /// Disable mDNS announcement.
    #[arg(long)]
    pub no_mdns: bool,

    /// Enable debug-level logging, equivalent to --log-level debug.
    #[arg(long)]
    pub debug: bool,

    /// Probe device connectivity and exit (0 = reachable, 1 = not) without
    /// binding the HTTP server.
    #[arg(long)]
    pub health_check: bool,

    /// Print the resolved configuration and exit.
    #[arg(long)]
    pub status: bool,
}

#[cfg(test)]
impl Cli {
    pub fn default_for_test() -> Self {
        Self::default()
    }
}
