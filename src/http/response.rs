//! HTTP response building module
//!
//! Builders for the statuses the proxy and the directory store produce.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};

/// Plain-text response with the given status
pub fn build_text_response(status: StatusCode, text: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from_static(text.as_bytes())))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(Bytes::from_static(text.as_bytes())))
        })
}

/// 304 Not Modified response
pub fn build_304_response(etag: &str, cache_control: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header("ETag", etag)
        .header("Cache-Control", cache_control)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error("304", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

pub fn build_400_response() -> Response<Full<Bytes>> {
    build_text_response(StatusCode::BAD_REQUEST, "400 Bad Request")
}

pub fn build_404_response() -> Response<Full<Bytes>> {
    build_text_response(StatusCode::NOT_FOUND, "404 Not Found")
}

/// 405 Method Not Allowed, advertising the methods the store serves
pub fn build_405_response() -> Response<Full<Bytes>> {
    let mut resp = build_text_response(StatusCode::METHOD_NOT_ALLOWED, "405 Method Not Allowed");
    resp.headers_mut().insert(
        hyper::header::ALLOW,
        hyper::header::HeaderValue::from_static("GET, HEAD"),
    );
    resp
}

pub fn build_413_response() -> Response<Full<Bytes>> {
    build_text_response(StatusCode::PAYLOAD_TOO_LARGE, "413 Payload Too Large")
}

pub fn build_500_response() -> Response<Full<Bytes>> {
    build_text_response(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error")
}

/// 502 Bad Gateway, used when the asset store itself fails
pub fn build_502_response() -> Response<Full<Bytes>> {
    build_text_response(StatusCode::BAD_GATEWAY, "502 Bad Gateway")
}

/// 200 response for a stored asset with validators
pub fn build_asset_response(
    data: Bytes,
    content_type: &str,
    etag: &str,
    cache_control: &str,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let content_length = data.len();
    let body = if is_head { Bytes::new() } else { data };

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", content_type)
        .header("Content-Length", content_length)
        .header("ETag", etag)
        .header("Cache-Control", cache_control)
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
