//! Directory-backed asset store
//!
//! Maps the request path onto a file below a root directory. Lookups are
//! exact: no index files, no directory listings, no globbing.

use std::io::ErrorKind;
use std::path::PathBuf;

use http_body_util::Full;
use percent_encoding::percent_decode_str;
use hyper::body::Bytes;
use hyper::header::IF_NONE_MATCH;
use hyper::{Method, Request, Response};
use tokio::fs;

use crate::error::StoreError;
use crate::http::{self, cache, mime};
use crate::logger;

const CACHE_CONTROL: &str = "public, max-age=3600";

pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Serve the file named by the request path
    ///
    /// Only `GET` and `HEAD` are served. A missing root directory is a
    /// store failure; a missing file is a plain 404.
    pub async fn fetch(&self, req: Request<Full<Bytes>>) -> Result<Response<Full<Bytes>>, StoreError> {
        let is_head = match *req.method() {
            Method::GET => false,
            Method::HEAD => true,
            _ => return Ok(http::build_405_response()),
        };

        let Some(file_path) = self.resolve(req.uri().path()).await? else {
            return Ok(http::build_404_response());
        };

        let content = match fs::read(&file_path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(http::build_404_response()),
            Err(e) => return Err(StoreError::Io(file_path.display().to_string(), e)),
        };

        let etag = cache::generate_etag(&content);
        let if_none_match = req
            .headers()
            .get(IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok());
        if cache::check_etag_match(if_none_match, &etag) {
            return Ok(http::build_304_response(&etag, CACHE_CONTROL));
        }

        Ok(http::build_asset_response(
            Bytes::from(content),
            mime::content_type_for(&file_path),
            &etag,
            CACHE_CONTROL,
            is_head,
        ))
    }

    /// Resolve a request path to a regular file inside the root
    ///
    /// The path is percent-decoded first; invalid UTF-8 resolves to nothing.
    async fn resolve(&self, path: &str) -> Result<Option<PathBuf>, StoreError> {
        let Ok(decoded) = percent_decode_str(path).decode_utf8() else {
            return Ok(None);
        };
        let relative = decoded.strip_prefix('/').unwrap_or(&decoded);
        if relative.is_empty() || relative.ends_with('/') || relative.contains('\0') {
            return Ok(None);
        }

        let root = fs::canonicalize(&self.root)
            .await
            .map_err(|e| StoreError::Io(self.root.display().to_string(), e))?;

        // Not found is the common case, nothing to log
        let Ok(canonical) = fs::canonicalize(root.join(relative)).await else {
            return Ok(None);
        };
        if !canonical.starts_with(&root) {
            logger::log_warning(&format!(
                "Path traversal attempt blocked: {} -> {}",
                path,
                canonical.display()
            ));
            return Ok(None);
        }

        match fs::metadata(&canonical).await {
            Ok(meta) if meta.is_file() => Ok(Some(canonical)),
            _ => Ok(None),
        }
    }
}
