// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP surface: an IPP endpoint (`POST /ipp/printer`, `POST /ipp/print`)
// plus a small human/JSON status surface (`GET /`, `GET /printer`) served
// over the same listener via `hyper` + `hyper-util`'s auto connection
// builder.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Instant;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto;
use thermal_core::types::{DocumentFormat, PrinterState};
use thermal_core::Config;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info, instrument, warn};

use crate::device::DeviceHandle;
use crate::job_store::JobStore;
use crate::pipeline;

use super::codec::{self, IppMessage, IppResponseBuilder};
use super::status::{self, to_ipp_status};

const OP_PRINT_JOB: u16 = 0x0002;
const OP_VALIDATE_JOB: u16 = 0x0004;
const OP_CANCEL_JOB: u16 = 0x0008;
const OP_GET_JOBS: u16 = 0x000A;
const OP_GET_PRINTER_ATTRIBUTES: u16 = 0x000B;

static PROCESS_START: OnceLock<Instant> = OnceLock::new();

fn process_start() -> Instant {
    *PROCESS_START.get_or_init(Instant::now)
}

/// Serve the IPP and status HTTP surface until `shutdown` is notified.
///
/// Accepts connections on `addr` and dispatches each to [`handle`]. Runs
/// until the provided `shutdown` notify fires, then stops accepting new
/// connections; in-flight connections are driven to completion by the
/// auto-detected HTTP/1.1 connection loop but no new ones are taken.
#[instrument(skip(config, store, device, shutdown))]
pub async fn serve(
    addr: SocketAddr,
    config: Config,
    store: JobStore,
    device: DeviceHandle,
    shutdown: std::sync::Arc<Notify>,
) -> std::io::Result<()> {
    process_start();
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "IPP server listening");

    loop {
        let accepted = tokio::select! {
            result = listener.accept() => result,
            _ = shutdown.notified() => {
                info!("shutdown requested, no longer accepting connections");
                return Ok(());
            }
        };

        let (stream, peer) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "failed to accept connection");
                continue;
            }
        };

        let config = config.clone();
        let store = store.clone();
        let device = device.clone();

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = hyper::service::service_fn(move |req| {
                let config = config.clone();
                let store = store.clone();
                let device = device.clone();
                async move { handle(req, config, store, device).await }
            });
            if let Err(e) = auto::Builder::new(hyper_util::rt::TokioExecutor::new())
                .serve_connection(io, service)
                .await
            {
                warn!(%peer, error = %e, "connection error");
            }
        });
    }
}

async fn handle(
    req: Request<Incoming>,
    config: Config,
    store: JobStore,
    device: DeviceHandle,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match (&method, path.as_str()) {
        (&Method::POST, "/ipp/printer") | (&Method::POST, "/ipp/print") => {
            handle_ipp(req, &config, &store, &device).await
        }
        (&Method::GET, "/") => html_status(&config, &store).await,
        (&Method::GET, "/printer") => json_printer(&config, &store).await,
        _ => text_response(StatusCode::NOT_FOUND, "not found"),
    };

    Ok(with_common_headers(response))
}

fn with_common_headers(mut response: Response<Full<Bytes>>) -> Response<Full<Bytes>> {
    let date = chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
    let headers = response.headers_mut();
    headers.insert("Server", "thermal-ippd".parse().unwrap());
    headers.insert("Date", date.parse().unwrap());
    headers.insert("Access-Control-Allow-Origin", "*".parse().unwrap());
    response
}

async fn handle_ipp(
    req: Request<Incoming>,
    config: &Config,
    store: &JobStore,
    device: &DeviceHandle,
) -> Response<Full<Bytes>> {
    let content_type = req
        .headers()
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.starts_with("application/ipp") {
        return text_response(
            StatusCode::BAD_REQUEST,
            "Content-Type must be application/ipp",
        );
    }

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!(error = %e, "failed to read request body");
            return text_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to read body");
        }
    };

    let message = match codec::parse(&body) {
        Ok(message) => message,
        Err(e) => {
            return text_response(StatusCode::BAD_REQUEST, &format!("malformed IPP request: {e}"));
        }
    };

    let bytes = dispatch(message, config, store, device).await;
    let mut response = Response::new(Full::new(Bytes::from(bytes)));
    response
        .headers_mut()
        .insert(hyper::header::CONTENT_TYPE, "application/ipp".parse().unwrap());
    response
}

#[instrument(skip(config, store, device, message), fields(op = message.op_or_status, request_id = message.request_id))]
async fn dispatch(
    message: IppMessage,
    config: &Config,
    store: &JobStore,
    device: &DeviceHandle,
) -> Vec<u8> {
    let request_id = message.request_id;

    match message.op_or_status {
        OP_GET_PRINTER_ATTRIBUTES => get_printer_attributes(request_id, config, store, &message).await,
        OP_VALIDATE_JOB => validate_job(request_id, &message),
        OP_PRINT_JOB => print_job(request_id, &message, config, store, device).await,
        OP_GET_JOBS => get_jobs(request_id, config, store).await,
        OP_CANCEL_JOB => cancel_job(request_id, &message, store).await,
        other => {
            warn!(op = other, "unsupported IPP operation requested");
            error_response(
                request_id,
                to_ipp_status(&thermal_core::ThermalError::OperationNotSupported(format!(
                    "operation 0x{other:04X} is not supported"
                ))),
            )
        }
    }
}

fn error_response(request_id: u32, status: u16) -> Vec<u8> {
    IppResponseBuilder::new(status, request_id).begin_operation_attrs().build()
}

/// Attributes the server always reports regardless of a `requested-
/// attributes` filter (spec.md:120): these reflect live printer state, not
/// static capability, so omitting them would make the response stale.
const ALWAYS_DYNAMIC_ATTRIBUTES: &[&str] = &[
    "printer-state",
    "printer-state-reasons",
    "queued-job-count",
    "printer-up-time",
    "printer-uri-supported",
];

type PrinterAttrEntry<'a> = (&'static str, Box<dyn FnOnce(IppResponseBuilder) -> IppResponseBuilder + 'a>);

async fn get_printer_attributes(
    request_id: u32,
    config: &Config,
    store: &JobStore,
    message: &IppMessage,
) -> Vec<u8> {
    let printer_state = store.printer_state().await;
    let queued = store.queued_job_count().await;
    let uptime = process_start().elapsed().as_secs() as i32;

    let requested = message.operation_attrs.get_all_strings("requested-attributes");
    let want_all = requested.is_empty() || requested.iter().any(|name| name == "all");
    let wants = |name: &str| {
        want_all || ALWAYS_DYNAMIC_ATTRIBUTES.contains(&name) || requested.iter().any(|r| r == name)
    };

    let entries: Vec<PrinterAttrEntry<'_>> = vec![
        ("charset-supported", Box::new(|b: IppResponseBuilder| b.keyword("charset-supported", "utf-8"))),
        ("compression-supported", Box::new(|b: IppResponseBuilder| b.keyword("compression-supported", "none"))),
        (
            "document-format-supported",
            Box::new(|b: IppResponseBuilder| {
                b.mime_media_type("document-format-supported", "application/pdf")
                    .mime_media_type_additional("image/pwg-raster")
                    .mime_media_type_additional("image/jpeg")
                    .mime_media_type_additional("image/png")
                    .mime_media_type_additional("application/octet-stream")
            }),
        ),
        ("printer-name", Box::new(move |b: IppResponseBuilder| b.name_attr("printer-name", &config.printer_name))),
        ("printer-info", Box::new(move |b: IppResponseBuilder| b.text("printer-info", &config.printer_info))),
        (
            "printer-location",
            Box::new(move |b: IppResponseBuilder| b.text("printer-location", &config.printer_location)),
        ),
        (
            "printer-make-and-model",
            Box::new(move |b: IppResponseBuilder| b.text("printer-make-and-model", &config.printer_make_model)),
        ),
        (
            "printer-state",
            Box::new(move |b: IppResponseBuilder| b.enum_attr("printer-state", printer_state.ipp_value())),
        ),
        (
            "printer-state-reasons",
            Box::new(move |b: IppResponseBuilder| {
                b.keyword("printer-state-reasons", printer_state_reason(printer_state))
            }),
        ),
        (
            "operations-supported",
            Box::new(|b: IppResponseBuilder| {
                b.enum_attr("operations-supported", OP_PRINT_JOB as i32)
                    .enum_additional(OP_VALIDATE_JOB as i32)
                    .enum_additional(OP_GET_JOBS as i32)
                    .enum_additional(OP_GET_PRINTER_ATTRIBUTES as i32)
                    .enum_additional(OP_CANCEL_JOB as i32)
            }),
        ),
        ("color-supported", Box::new(|b: IppResponseBuilder| b.boolean("color-supported", false))),
        ("media-supported", Box::new(|b: IppResponseBuilder| b.keyword("media-supported", "roll"))),
        ("printer-kind", Box::new(|b: IppResponseBuilder| b.keyword("printer-kind", "thermal"))),
        ("sides-supported", Box::new(|b: IppResponseBuilder| b.keyword("sides-supported", "one-sided"))),
        (
            "print-quality-supported",
            Box::new(|b: IppResponseBuilder| {
                b.enum_attr("print-quality-supported", 3).enum_additional(4).enum_additional(5)
            }),
        ),
        (
            "printer-resolution-supported",
            Box::new(move |b: IppResponseBuilder| {
                b.resolution("printer-resolution-supported", config.dpi as i32, config.dpi as i32, 3)
            }),
        ),
        (
            "media-size-supported",
            Box::new(move |b: IppResponseBuilder| {
                b.integer("media-size-supported-x-dimension", (config.width_mm * 100) as i32)
                    .integer("media-size-supported-y-dimension", 32767)
            }),
        ),
        (
            "printer-uri-supported",
            Box::new(move |b: IppResponseBuilder| b.uri("printer-uri-supported", &config.printer_uri(config.port))),
        ),
        ("uri-security-supported", Box::new(|b: IppResponseBuilder| b.keyword("uri-security-supported", "none"))),
        (
            "uri-authentication-supported",
            Box::new(|b: IppResponseBuilder| b.keyword("uri-authentication-supported", "none")),
        ),
        (
            "printer-uuid",
            Box::new(move |b: IppResponseBuilder| b.uri("printer-uuid", &format!("urn:uuid:{}", config.printer_uuid))),
        ),
        ("queued-job-count", Box::new(move |b: IppResponseBuilder| b.integer("queued-job-count", queued as i32))),
        ("printer-up-time", Box::new(move |b: IppResponseBuilder| b.integer("printer-up-time", uptime))),
    ];

    let mut builder = IppResponseBuilder::new(status::STATUS_OK, request_id)
        .begin_operation_attrs()
        .begin_group(codec::TAG_PRINTER_ATTRIBUTES);

    for (name, apply) in entries {
        if wants(name) {
            builder = apply(builder);
        }
    }

    builder.build()
}

fn printer_state_reason(state: PrinterState) -> &'static str {
    match state {
        PrinterState::Idle => "none",
        PrinterState::Processing => "job-printing",
        PrinterState::Stopped => "paused",
    }
}

fn validate_job(request_id: u32, message: &IppMessage) -> Vec<u8> {
    let declared_format = message.operation_attrs.get_string("document-format");

    // A declared format must be one this printer knows how to handle at
    // all; `application/octet-stream` is itself a supported, declarable
    // format (§6.3) -- it is resolved by sniffing the body at Print-Job
    // time, which Validate-Job has no body to do (spec.md:122).
    if let Some(mime) = &declared_format
        && DocumentFormat::from_mime(mime).is_none()
    {
        return IppResponseBuilder::new(
            to_ipp_status(&thermal_core::ThermalError::UnsupportedFormat(format!(
                "document-format {mime} not supported"
            ))),
            request_id,
        )
        .begin_operation_attrs()
        .build();
    }

    IppResponseBuilder::new(status::STATUS_OK, request_id)
        .begin_operation_attrs()
        .build()
}

async fn print_job(
    request_id: u32,
    message: &IppMessage,
    config: &Config,
    store: &JobStore,
    device: &DeviceHandle,
) -> Vec<u8> {
    let name = message
        .operation_attrs
        .get_string("job-name")
        .unwrap_or_else(|| "Untitled Document".to_string());
    let user = message
        .operation_attrs
        .get_string("requesting-user-name")
        .unwrap_or_else(|| "anonymous".to_string());
    let declared_format = message.operation_attrs.get_string("document-format");

    let format = declared_format
        .as_deref()
        .and_then(DocumentFormat::from_mime)
        .unwrap_or(DocumentFormat::OctetStream);
    let format = if format == DocumentFormat::OctetStream {
        thermal_document::sniff_format(&message.body)
    } else {
        format
    };

    if format == DocumentFormat::OctetStream {
        return IppResponseBuilder::new(
            to_ipp_status(&thermal_core::ThermalError::UnsupportedFormat(
                "unable to determine document format".into(),
            )),
            request_id,
        )
        .begin_operation_attrs()
        .build();
    }

    let job = store
        .accept(name, user, format, Bytes::from(message.body.clone()))
        .await;

    tokio::spawn(pipeline::run(
        store.clone(),
        device.clone(),
        job.id,
        config.max_pixels,
        config.dpi,
    ));

    IppResponseBuilder::new(status::STATUS_OK, request_id)
        .begin_operation_attrs()
        .begin_group(codec::TAG_JOB_ATTRIBUTES)
        .integer("job-id", job.id.0)
        .uri("job-uri", &format!("{}/jobs/{}", config.printer_uri(config.port), job.id.0))
        .enum_attr("job-state", job.state.ipp_value())
        .keyword("job-state-reasons", job.state.reason_keyword())
        .integer("time-at-creation", job.created_at.timestamp() as i32)
        .build()
}

async fn get_jobs(request_id: u32, config: &Config, store: &JobStore) -> Vec<u8> {
    let jobs = store.snapshot_all().await;
    let mut builder = IppResponseBuilder::new(status::STATUS_OK, request_id).begin_operation_attrs();
    for job in jobs {
        builder = builder
            .begin_group(codec::TAG_JOB_ATTRIBUTES)
            .integer("job-id", job.id.0)
            .enum_attr("job-state", job.state.ipp_value())
            .keyword("job-state-reasons", job.state_reasons.first().map(String::as_str).unwrap_or("none"))
            .uri("job-uri", &format!("{}/jobs/{}", config.printer_uri(config.port), job.id.0))
            .integer("time-at-creation", job.created_at.timestamp() as i32);
    }
    builder.build()
}

async fn cancel_job(request_id: u32, message: &IppMessage, store: &JobStore) -> Vec<u8> {
    let Some(job_id) = message.operation_attrs.get_integer("job-id") else {
        return IppResponseBuilder::new(status::STATUS_BAD_REQUEST, request_id)
            .begin_operation_attrs()
            .build();
    };

    match store.cancel(thermal_core::types::JobId(job_id)).await {
        Ok(()) => IppResponseBuilder::new(status::STATUS_OK, request_id)
            .begin_operation_attrs()
            .build(),
        Err(e) => IppResponseBuilder::new(to_ipp_status(&e), request_id)
            .begin_operation_attrs()
            .build(),
    }
}

async fn html_status(config: &Config, store: &JobStore) -> Response<Full<Bytes>> {
    let state = store.printer_state().await;
    let queued = store.queued_job_count().await;
    let body = format!(
        "<!doctype html><html><head><title>{name}</title></head><body>\
         <h1>{name}</h1><p>{info}</p><p>Location: {location}</p>\
         <p>State: {state:?}</p><p>Queued jobs: {queued}</p></body></html>",
        name = config.printer_name,
        info = config.printer_info,
        location = config.printer_location,
    );
    let mut response = Response::new(Full::new(Bytes::from(body)));
    response
        .headers_mut()
        .insert(hyper::header::CONTENT_TYPE, "text/html; charset=utf-8".parse().unwrap());
    response
}

async fn json_printer(config: &Config, store: &JobStore) -> Response<Full<Bytes>> {
    let state = store.printer_state().await;
    let queued = store.queued_job_count().await;
    let body = serde_json::json!({
        "printer_name": config.printer_name,
        "printer_info": config.printer_info,
        "printer_location": config.printer_location,
        "printer_make_model": config.printer_make_model,
        "printer_state": state.ipp_value(),
        "printer_uri": config.printer_uri(config.port),
        "supported_formats": [
            "application/pdf", "image/pwg-raster", "image/jpeg", "image/png", "application/octet-stream",
        ],
        "active_jobs": queued,
    });
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    response
        .headers_mut()
        .insert(hyper::header::CONTENT_TYPE, "application/json".parse().unwrap());
    response
}

fn text_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(hyper::header::CONTENT_TYPE, "text/plain; charset=utf-8".parse().unwrap());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_printer_attributes_reports_minimum_attribute_set() {
        let config = Config::default();
        let store = JobStore::new();
        let message = codec::parse(&build_test_request(OP_GET_PRINTER_ATTRIBUTES, 1)).unwrap();
        let bytes = get_printer_attributes(1, &config, &store, &message).await;
        let resp = codec::parse(&bytes).unwrap();
        assert_eq!(resp.op_or_status, status::STATUS_OK);
        assert_eq!(resp.printer_attrs.get_string("printer-name").as_deref(), Some(config.printer_name.as_str()));
        assert_eq!(resp.printer_attrs.get_integer("printer-state"), Some(3));
    }

    #[tokio::test]
    async fn get_printer_attributes_filters_to_requested_subset() {
        let config = Config::default();
        let store = JobStore::new();
        let mut buf = build_test_request(OP_GET_PRINTER_ATTRIBUTES, 1);
        // insert a requested-attributes value before the END tag written by build_test_request
        buf.truncate(buf.len() - 1);
        buf.push(codec::VALUE_TAG_KEYWORD);
        buf.extend_from_slice(&20u16.to_be_bytes());
        buf.extend_from_slice(b"requested-attributes");
        buf.extend_from_slice(&12u16.to_be_bytes());
        buf.extend_from_slice(b"printer-name");
        buf.push(codec::TAG_END_OF_ATTRIBUTES);
        let message = codec::parse(&buf).unwrap();

        let bytes = get_printer_attributes(1, &config, &store, &message).await;
        let resp = codec::parse(&bytes).unwrap();

        // explicitly requested attribute present
        assert_eq!(resp.printer_attrs.get_string("printer-name").as_deref(), Some(config.printer_name.as_str()));
        // always-dynamic attribute present even though not requested
        assert!(resp.printer_attrs.get_integer("printer-state").is_some());
        // capability attribute not requested and not always-dynamic: absent
        assert!(resp.printer_attrs.get_string("printer-make-and-model").is_none());
    }

    #[tokio::test]
    async fn validate_job_with_no_declared_format_succeeds() {
        let buf = build_test_request(OP_VALIDATE_JOB, 2);
        let message = codec::parse(&buf).unwrap();
        let bytes = validate_job(2, &message);
        let resp = codec::parse(&bytes).unwrap();
        assert_eq!(resp.op_or_status, status::STATUS_OK);
    }

    #[tokio::test]
    async fn validate_job_with_declared_octet_stream_succeeds() {
        let mut buf = build_test_request(OP_VALIDATE_JOB, 3);
        buf.truncate(buf.len() - 1);
        buf.push(codec::VALUE_TAG_MIME_MEDIA_TYPE);
        buf.extend_from_slice(&15u16.to_be_bytes());
        buf.extend_from_slice(b"document-format");
        buf.extend_from_slice(&24u16.to_be_bytes());
        buf.extend_from_slice(b"application/octet-stream");
        buf.push(codec::TAG_END_OF_ATTRIBUTES);
        let message = codec::parse(&buf).unwrap();

        let bytes = validate_job(3, &message);
        let resp = codec::parse(&bytes).unwrap();
        assert_eq!(resp.op_or_status, status::STATUS_OK);
    }

    #[tokio::test]
    async fn validate_job_with_unknown_declared_format_fails() {
        let mut buf = build_test_request(OP_VALIDATE_JOB, 4);
        buf.truncate(buf.len() - 1);
        buf.push(codec::VALUE_TAG_MIME_MEDIA_TYPE);
        buf.extend_from_slice(&15u16.to_be_bytes());
        buf.extend_from_slice(b"document-format");
        buf.extend_from_slice(&24u16.to_be_bytes());
        buf.extend_from_slice(b"application/xml-invalid!");
        buf.push(codec::TAG_END_OF_ATTRIBUTES);
        let message = codec::parse(&buf).unwrap();

        let bytes = validate_job(4, &message);
        let resp = codec::parse(&bytes).unwrap();
        assert_eq!(resp.op_or_status, status::STATUS_DOCUMENT_FORMAT_NOT_SUPPORTED);
    }

    #[tokio::test]
    async fn print_job_response_carries_job_uri_and_time_at_creation() {
        let config = Config::default();
        let store = JobStore::new();
        let device = DeviceHandle::new(config.usb_vendor_id, config.usb_product_id, config.usb_timeout_ms);
        let mut buf = build_test_request(OP_PRINT_JOB, 5);
        buf.truncate(buf.len() - 1);
        buf.push(codec::TAG_END_OF_ATTRIBUTES);
        // ESC/POS marker long enough for the sniffer's minimum-length check
        buf.extend_from_slice(b"\x1b@\x1b3\x00some receipt body");
        let message = codec::parse(&buf).unwrap();

        let bytes = print_job(5, &message, &config, &store, &device).await;
        let resp = codec::parse(&bytes).unwrap();
        assert_eq!(resp.op_or_status, status::STATUS_OK);
        assert!(resp.job_attrs[0].get_string("job-uri").unwrap().ends_with("/jobs/1"));
        assert!(resp.job_attrs[0].get_integer("time-at-creation").is_some());
    }

    #[tokio::test]
    async fn get_jobs_response_carries_job_uri_and_time_at_creation() {
        let config = Config::default();
        let store = JobStore::new();
        store.accept("doc".into(), "user".into(), DocumentFormat::EscPos, Bytes::from_static(b"\x1b@")).await;

        let bytes = get_jobs(1, &config, &store).await;
        let resp = codec::parse(&bytes).unwrap();
        assert_eq!(resp.job_attrs.len(), 1);
        assert!(resp.job_attrs[0].get_string("job-uri").unwrap().ends_with("/jobs/1"));
        assert!(resp.job_attrs[0].get_integer("time-at-creation").is_some());
    }

    fn build_test_request(op: u16, request_id: u32) -> Vec<u8> {
        let mut buf = vec![2, 1];
        buf.extend_from_slice(&op.to_be_bytes());
        buf.extend_from_slice(&request_id.to_be_bytes());
        buf.push(codec::TAG_OPERATION_ATTRIBUTES);
        buf.push(codec::VALUE_TAG_CHARSET);
        buf.extend_from_slice(&18u16.to_be_bytes());
        buf.extend_from_slice(b"attributes-charset");
        buf.extend_from_slice(&5u16.to_be_bytes());
        buf.extend_from_slice(b"utf-8");
        buf.push(codec::TAG_END_OF_ATTRIBUTES);
        buf
    }
}
