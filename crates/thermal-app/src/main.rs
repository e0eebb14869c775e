// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// thermal-ippd — driverless network print server exposing a thermal
// receipt printer as an IPP endpoint.
//
// Entry point: parses the CLI, loads configuration from the environment,
// discovers the printer device, binds the HTTP/IPP surface, and waits for
// a shutdown signal.

mod cli;
mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use cli::Cli;
use thermal_print::device::{self, DeviceHandle};
use thermal_print::{serve, JobStore};
use tokio::sync::Notify;
use tracing::{error, info};

/// Grace window the server waits for in-flight pipelines to reach a
/// terminal state before forcing shutdown.
const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(10);

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let config = config::from_env(&cli);

    let errors = config.validate();
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("configuration error: {error}");
        }
        return std::process::ExitCode::from(1);
    }

    init_logging(&cli);

    if cli.status {
        print_status(&config);
        return std::process::ExitCode::SUCCESS;
    }

    if cli.health_check {
        return health_check(&config);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return std::process::ExitCode::from(1);
        }
    };

    match runtime.block_on(run(config, cli)) {
        Ok(Interrupted(true)) => std::process::ExitCode::from(130),
        Ok(Interrupted(false)) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server exited with error");
            std::process::ExitCode::from(1)
        }
    }
}

struct Interrupted(bool);

fn init_logging(cli: &Cli) {
    let level = if cli.debug {
        "debug".to_string()
    } else {
        cli.log_level.clone().unwrap_or_else(|| std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()))
    };
    let filter = tracing_subscriber::EnvFilter::try_new(&level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if let Some(path) = &cli.log_file {
        let file_appender = tracing_appender::rolling::never(
            std::path::Path::new(path).parent().unwrap_or_else(|| std::path::Path::new(".")),
            std::path::Path::new(path).file_name().unwrap_or_default(),
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // Leaked intentionally: the guard must outlive the subscriber, and
        // the subscriber lives for the process's entire lifetime.
        Box::leak(Box::new(guard));
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(non_blocking).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn print_status(config: &thermal_core::Config) {
    let report = serde_json::json!({
        "printer_name": config.printer_name,
        "printer_info": config.printer_info,
        "printer_location": config.printer_location,
        "printer_make_model": config.printer_make_model,
        "host": config.host,
        "port": config.port,
        "width_mm": config.width_mm,
        "dpi": config.dpi,
        "max_pixels": config.max_pixels,
        "printer_uuid": config.printer_uuid,
        "printer_uri": config.printer_uri(config.port),
    });
    println!("{}", serde_json::to_string_pretty(&report).unwrap());
}

fn health_check(config: &thermal_core::Config) -> std::process::ExitCode {
    match device::discover(config.usb_vendor_id, config.usb_product_id, config.usb_timeout_ms) {
        Ok(_) => {
            println!("printer device reachable");
            std::process::ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("printer device not reachable: {e}");
            std::process::ExitCode::from(1)
        }
    }
}

async fn run(config: thermal_core::Config, cli: Cli) -> std::io::Result<Interrupted> {
    info!(printer_name = %config.printer_name, "thermal-ippd starting");

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("invalid bind address: {e}")))?;

    let store = JobStore::new();
    let device = DeviceHandle::new(config.usb_vendor_id, config.usb_product_id, config.usb_timeout_ms);

    if !cli.no_mdns {
        info!(
            service = "_ipp._tcp.local.",
            name = %config.printer_name,
            port = config.port,
            "mDNS announcement data (registration is out of scope; logged for operator visibility)"
        );
    }

    let shutdown = Arc::new(Notify::new());
    let mut interrupted = false;

    tokio::select! {
        result = serve(addr, config, store, device, shutdown.clone()) => {
            result?;
        }
        signal = wait_for_shutdown_signal() => {
            info!(?signal, "shutdown signal received, draining in-flight work");
            shutdown.notify_one();
            interrupted = true;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        }
    }

    Ok(Interrupted(interrupted))
}

#[derive(Debug)]
enum ShutdownSignal {
    Interrupt,
    Terminate,
    #[cfg_attr(not(unix), allow(dead_code))]
    Hangup,
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> ShutdownSignal {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");

    tokio::select! {
        _ = sigint.recv() => ShutdownSignal::Interrupt,
        _ = sigterm.recv() => ShutdownSignal::Terminate,
        _ = sighup.recv() => ShutdownSignal::Hangup,
    }
}

#[cfg(windows)]
async fn wait_for_shutdown_signal() -> ShutdownSignal {
    let mut ctrl_c = tokio::signal::windows::ctrl_c().expect("failed to install Ctrl-C handler");
    let mut ctrl_break = tokio::signal::windows::ctrl_break().expect("failed to install Ctrl-Break handler");

    tokio::select! {
        _ = ctrl_c.recv() => ShutdownSignal::Interrupt,
        _ = ctrl_break.recv() => ShutdownSignal::Terminate,
    }
}
