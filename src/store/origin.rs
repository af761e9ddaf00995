//! Upstream origin asset store
//!
//! Forwards the lookup to an HTTP origin and relays its response. Status,
//! headers and body come back untouched; transport failures become
//! `StoreError`s.

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{
    HeaderMap, HeaderName, HeaderValue, CONNECTION, HOST, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION,
    TE, TRAILER, TRANSFER_ENCODING, UPGRADE,
};
use hyper::http::uri::{Authority, Scheme};
use hyper::{Request, Response, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::error::{ConfigError, StoreError};

/// Connection-scoped headers that must not travel to the origin
const HOP_BY_HOP: [HeaderName; 7] = [
    CONNECTION,
    PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION,
    TE,
    TRAILER,
    TRANSFER_ENCODING,
    UPGRADE,
];

pub struct OriginStore {
    client: Client<HttpConnector, Full<Bytes>>,
    scheme: Scheme,
    authority: Authority,
    /// Path prefix of the origin URL without trailing slash
    base_path: String,
    host_header: HeaderValue,
    preserve_host: bool,
}

impl OriginStore {
    pub fn new(url: &str, preserve_host: bool) -> Result<Self, ConfigError> {
        let uri: Uri = url
            .parse()
            .map_err(|e| ConfigError::Validation(format!("store.url `{url}`: {e}")))?;
        let (Some(scheme), Some(authority)) = (uri.scheme().cloned(), uri.authority().cloned())
        else {
            return Err(ConfigError::Validation(format!(
                "store.url `{url}` must be absolute"
            )));
        };
        let host_header = HeaderValue::from_str(authority.as_str())
            .map_err(|e| ConfigError::Validation(format!("store.url `{url}`: {e}")))?;

        let client = Client::builder(TokioExecutor::new()).build_http();

        Ok(Self {
            client,
            scheme,
            authority,
            base_path: uri.path().trim_end_matches('/').to_string(),
            host_header,
            preserve_host,
        })
    }

    /// Absolute upstream URI for a lookup's path and query
    pub fn upstream_uri(&self, lookup: &Uri) -> Result<Uri, StoreError> {
        let path_and_query = lookup.path_and_query().map_or("/", |pq| pq.as_str());
        Ok(Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(format!("{}{}", self.base_path, path_and_query))
            .build()?)
    }

    pub async fn fetch(&self, req: Request<Full<Bytes>>) -> Result<Response<Full<Bytes>>, StoreError> {
        let (mut parts, body) = req.into_parts();
        parts.uri = self.upstream_uri(&parts.uri)?;
        strip_hop_by_hop(&mut parts.headers);
        if !self.preserve_host {
            parts.headers.insert(HOST, self.host_header.clone());
        }

        let upstream = self.client.request(Request::from_parts(parts, body)).await?;
        let (parts, body) = upstream.into_parts();
        let bytes = body.collect().await.map_err(StoreError::Body)?.to_bytes();
        Ok(Response::from_parts(parts, Full::new(bytes)))
    }
}

/// Drop hop-by-hop headers, including any the client listed in `Connection`
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-connection");
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::StatusCode;
    use hyper_util::rt::TokioIo;
    use std::convert::Infallible;
    use tokio::net::TcpListener;

    /// Spawn a one-connection origin that echoes the request line and Host
    async fn spawn_echo_origin() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let service = service_fn(|req: Request<hyper::body::Incoming>| async move {
                let host = req
                    .headers()
                    .get(HOST)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-")
                    .to_string();
                let line = format!("{} {} {}", req.method(), req.uri(), host);
                let status = if req.uri().path().ends_with(".png") {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::OK
                };
                let mut builder = Response::builder()
                    .status(status)
                    .header("X-Origin", "echo");
                if req.headers().contains_key("x-session") {
                    builder = builder.header("X-Saw-Session", "1");
                }
                Ok::<_, Infallible>(
                    builder
                        .body(Full::new(Bytes::from(line)))
                        .unwrap(),
                )
            });
            let _ = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await;
        });
        addr
    }

    fn get(uri: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .uri(uri)
            .header(HOST, "assets.example.com")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[test]
    fn test_upstream_uri_joins_base_path() {
        let store = OriginStore::new("http://origin.internal:9000/static/", false).unwrap();
        let uri = store
            .upstream_uri(&"/hero.webp?v=2".parse().unwrap())
            .unwrap();
        assert_eq!(
            uri.to_string(),
            "http://origin.internal:9000/static/hero.webp?v=2"
        );
    }

    #[test]
    fn test_relative_url_rejected() {
        assert!(OriginStore::new("/static", false).is_err());
    }

    #[tokio::test]
    async fn test_fetch_relays_response_and_rewrites_host() {
        let addr = spawn_echo_origin().await;
        let store = OriginStore::new(&format!("http://{addr}"), false).unwrap();
        let resp = store.fetch(get("/hero.webp")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["x-origin"], "echo");
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from(format!("GET /hero.webp {addr}")));
    }

    #[tokio::test]
    async fn test_fetch_preserves_host_and_status() {
        let addr = spawn_echo_origin().await;
        let store = OriginStore::new(&format!("http://{addr}"), true).unwrap();
        let resp = store.fetch(get("/hero.png")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from_static(b"GET /hero.png assets.example.com"));
    }

    #[test]
    fn test_hop_by_hop_headers_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive, X-Session"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-session", HeaderValue::from_static("abc"));
        headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
        headers.insert("x-trace", HeaderValue::from_static("t-1"));
        headers.insert(HOST, HeaderValue::from_static("assets.example.com"));

        strip_hop_by_hop(&mut headers);

        assert!(!headers.contains_key(CONNECTION));
        assert!(!headers.contains_key("keep-alive"));
        assert!(!headers.contains_key("x-session"));
        assert!(!headers.contains_key(UPGRADE));
        assert_eq!(headers["x-trace"], "t-1");
        assert_eq!(headers[HOST], "assets.example.com");
    }

    #[tokio::test]
    async fn test_connection_header_not_forwarded() {
        let addr = spawn_echo_origin().await;
        let store = OriginStore::new(&format!("http://{addr}"), true).unwrap();
        let req = Request::builder()
            .uri("/hero.webp")
            .header(HOST, "assets.example.com")
            .header(CONNECTION, "close, X-Session")
            .header("x-session", "abc")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let resp = store.fetch(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(!resp.headers().contains_key("x-saw-session"));
    }

    #[tokio::test]
    async fn test_unreachable_origin_is_store_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let store = OriginStore::new(&format!("http://{addr}"), false).unwrap();
        let err = store.fetch(get("/hero.webp")).await.unwrap_err();
        assert!(matches!(err, StoreError::Upstream(_)));
    }
}
