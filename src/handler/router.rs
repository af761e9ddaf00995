//! Request dispatch module
//!
//! Entry point for HTTP request processing: body limits, delegation to the
//! rewriter, error mapping and access logging.

use crate::config::AppState;
use crate::error::RewriteError;
use crate::http;
use crate::logger::{self, AccessLogEntry};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderName, HeaderValue, REFERER, SERVER, USER_AGENT};
use hyper::{Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Request line details captured before the request is consumed
struct RequestInfo {
    method: String,
    path: String,
    query: Option<String>,
    version: String,
    referer: Option<String>,
    user_agent: Option<String>,
}

impl RequestInfo {
    fn capture<B>(req: &Request<B>) -> Self {
        let header = |name: HeaderName| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };
        Self {
            method: req.method().to_string(),
            path: req.uri().path().to_string(),
            query: req.uri().query().map(ToString::to_string),
            version: format!("{:?}", req.version())
                .trim_start_matches("HTTP/")
                .to_string(),
            referer: header(REFERER),
            user_agent: header(USER_AGENT),
        }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let started = Instant::now();
    let info = RequestInfo::capture(&req);

    logger::log_headers_count(req.headers().len(), state.config.logging.show_headers);

    let (response, store_path) = dispatch(req, &state).await;
    let response = with_server_header(response, &state.config.http.server_name);

    if state.config.logging.access_log {
        log_access(&info, &response, store_path, peer_addr, started, &state);
    }
    Ok(response)
}

/// Read the body, hand the request to the rewriter and map failures
async fn dispatch<B>(req: Request<B>, state: &AppState) -> (Response<Full<Bytes>>, Option<String>)
where
    B: Body<Data = Bytes>,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let max_body_size = state.config.http.max_body_size;
    if let Some(resp) = check_body_size(&req, max_body_size) {
        return (resp, None);
    }

    let req = match collect_body(req, max_body_size).await {
        Ok(req) => req,
        Err(resp) => return (resp, None),
    };

    match state.rewriter.handle(req).await {
        Ok(delegated) => (delegated.response, Some(delegated.lookup_path)),
        Err(RewriteError::Store(e)) => {
            logger::log_error(&format!("Asset store lookup failed: {e}"));
            (http::build_502_response(), None)
        }
        Err(e) => {
            logger::log_error(&format!("Rewrite failed: {e}"));
            (http::build_500_response(), None)
        }
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get("content-length")?;
    let Ok(size_str) = content_length.to_str() else {
        logger::log_warning("Content-Length header contains non-ASCII characters");
        return None;
    };
    match size_str.parse::<u64>() {
        Ok(size) if size > max_body_size => {
            logger::log_warning(&format!(
                "Request body too large: {size} bytes (max: {max_body_size})"
            ));
            Some(http::build_413_response())
        }
        Ok(_) => None,
        Err(_) => {
            logger::log_warning(&format!(
                "Invalid Content-Length value: '{size_str}', skipping size check"
            ));
            None
        }
    }
}

/// Buffer the body so the store receives a replayable request
///
/// Enforces the size limit on the bytes actually read, covering chunked
/// bodies without a Content-Length.
async fn collect_body<B>(
    req: Request<B>,
    max_body_size: u64,
) -> Result<Request<Full<Bytes>>, Response<Full<Bytes>>>
where
    B: Body<Data = Bytes>,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    let (parts, body) = req.into_parts();
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(Request::from_parts(parts, Full::new(collected.to_bytes()))),
        Err(e) if e.is::<LengthLimitError>() => {
            logger::log_warning(&format!("Request body exceeded {max_body_size} bytes"));
            Err(http::build_413_response())
        }
        Err(e) => {
            logger::log_warning(&format!("Failed to read request body: {e}"));
            Err(http::build_400_response())
        }
    }
}

/// Add the configured `Server` header unless the store already set one
fn with_server_header(mut response: Response<Full<Bytes>>, server_name: &str) -> Response<Full<Bytes>> {
    if !response.headers().contains_key(SERVER) {
        if let Ok(value) = HeaderValue::from_str(server_name) {
            response.headers_mut().insert(SERVER, value);
        }
    }
    response
}

fn log_access(
    info: &RequestInfo,
    response: &Response<Full<Bytes>>,
    store_path: Option<String>,
    peer_addr: SocketAddr,
    started: Instant,
    state: &AppState,
) {
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        info.method.clone(),
        info.path.clone(),
    );
    entry.query.clone_from(&info.query);
    entry.store_path = store_path;
    entry.http_version.clone_from(&info.version);
    entry.status = response.status().as_u16();
    entry.body_bytes = response
        .body()
        .size_hint()
        .exact()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0);
    entry.referer.clone_from(&info.referer);
    entry.user_agent.clone_from(&info.user_agent);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

    logger::log_access(&entry, &state.config.logging.access_log_format);
}
