//! Asset store backends
//!
//! A store resolves one request to one response by exact path. The
//! rewriter treats whatever it returns as authoritative.

pub mod directory;
pub mod origin;

use std::future::Future;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Request, Response};

pub use directory::DirectoryStore;
pub use origin::OriginStore;

use crate::config::StoreConfig;
use crate::error::{ConfigError, StoreError};

/// Exact-path asset lookup
pub trait AssetStore {
    fn fetch(
        &self,
        req: Request<Full<Bytes>>,
    ) -> impl Future<Output = Result<Response<Full<Bytes>>, StoreError>> + Send;
}

/// Store selected by configuration
pub enum Backend {
    Directory(DirectoryStore),
    Origin(OriginStore),
}

impl Backend {
    pub fn from_config(cfg: &StoreConfig) -> Result<Self, ConfigError> {
        match cfg {
            StoreConfig::Directory { root } => Ok(Self::Directory(DirectoryStore::new(root))),
            StoreConfig::Origin { url, preserve_host } => {
                Ok(Self::Origin(OriginStore::new(url, *preserve_host)?))
            }
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Directory(_) => "directory",
            Self::Origin(_) => "origin",
        }
    }
}

impl AssetStore for Backend {
    async fn fetch(&self, req: Request<Full<Bytes>>) -> Result<Response<Full<Bytes>>, StoreError> {
        match self {
            Self::Directory(store) => store.fetch(req).await,
            Self::Origin(store) => store.fetch(req).await,
        }
    }
}
