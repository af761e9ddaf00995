// Application state module
// Immutable configuration plus the rewriter built from it

use super::types::Config;
use crate::error::ConfigError;
use crate::rewrite::{RuleSet, Rewriter};
use crate::store::Backend;

/// Application state shared by all connections
///
/// Built once at startup and never mutated; the degradation switch lives
/// inside the compiled rule set.
pub struct AppState {
    pub config: Config,
    pub rewriter: Rewriter<Backend>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let rules = RuleSet::from_config(&config.rewrite);
        let store = Backend::from_config(&config.store)?;
        Ok(Self {
            config,
            rewriter: Rewriter::new(rules, store),
        })
    }

    pub const fn store_kind(&self) -> &'static str {
        self.rewriter.store().kind()
    }
}
