//! Request rewriting
//!
//! Classifies the request path and delegates exactly one lookup to the
//! asset store. Method, headers and body travel unchanged; only the URI
//! path may be substituted. Store responses and errors are relayed as-is.

pub mod rules;

pub use rules::{Decision, RuleSet};

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::http::uri::PathAndQuery;
use hyper::{Request, Response, Uri};

use crate::error::RewriteError;
use crate::logger;
use crate::store::AssetStore;

/// Result of a delegated lookup
#[derive(Debug)]
pub struct Delegated {
    /// Path the store was asked for
    pub lookup_path: String,
    pub response: Response<Full<Bytes>>,
}

/// Stateless rewriter over an asset store
pub struct Rewriter<S> {
    rules: RuleSet,
    store: S,
}

impl<S: AssetStore> Rewriter<S> {
    pub const fn new(rules: RuleSet, store: S) -> Self {
        Self { rules, store }
    }

    pub const fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Handle one request: classify, rewrite if needed, fetch once
    pub async fn handle(&self, req: Request<Full<Bytes>>) -> Result<Delegated, RewriteError> {
        let path = req.uri().path().to_string();
        let decision = self.rules.classify(&path);

        let (req, lookup_path) = match &decision {
            Decision::PassThrough => (req, path.clone()),
            Decision::Substitute(new_path) => (retarget(req, new_path)?, new_path.clone()),
        };

        if logger::debug_enabled() {
            let rule = self
                .rules
                .matching_rule(&path)
                .map_or("none", |r| r.name.as_str());
            logger::log_debug(&format!("[Rewrite] {path} -> {lookup_path} (rule: {rule})"));
        }

        let response = self.store.fetch(req).await?;
        Ok(Delegated {
            lookup_path,
            response,
        })
    }
}

/// Point the request at `new_path` on the same origin
///
/// The query string is not carried over to the substituted path.
fn retarget(req: Request<Full<Bytes>>, new_path: &str) -> Result<Request<Full<Bytes>>, RewriteError> {
    let (mut parts, body) = req.into_parts();
    let mut uri_parts = parts.uri.into_parts();
    uri_parts.path_and_query = Some(new_path.parse::<PathAndQuery>()?);
    parts.uri = Uri::from_parts(uri_parts)?;
    Ok(Request::from_parts(parts, body))
}
