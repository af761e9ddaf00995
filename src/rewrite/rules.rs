//! Rewrite rule engine
//!
//! An ordered list of `(matcher, strategy)` pairs evaluated top to bottom.
//! The first matching rule decides; the last rule matches every path, so
//! classification is total.

use std::fmt;

use crate::config::RewriteConfig;

/// Outcome of classifying a request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Forward the original request verbatim
    PassThrough,
    /// Look up this path in the store instead
    Substitute(String),
}

/// Path condition of a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathMatcher {
    /// Path ends with `.` followed by one of these tokens (ASCII case-insensitive)
    KnownExtension(Vec<String>),
    /// Path equals this literal
    Exact(String),
    /// Every path
    Any,
}

impl PathMatcher {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::KnownExtension(exts) => has_known_extension(path, exts),
            Self::Exact(literal) => path == literal,
            Self::Any => true,
        }
    }
}

/// What to do with a matching path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    PassThrough,
    /// Append `.` + extension to the path
    AppendExtension(String),
}

impl Strategy {
    fn apply(&self, path: &str) -> Decision {
        match self {
            Self::PassThrough => Decision::PassThrough,
            Self::AppendExtension(ext) => Decision::Substitute(format!("{path}.{ext}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub matcher: PathMatcher,
    pub strategy: Strategy,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Compiled rule list
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Compile the configured rules
    ///
    /// Order: known extensions pass through, then literal overrides in
    /// configured order, then the degradation-switch fallback.
    pub fn from_config(cfg: &RewriteConfig) -> Self {
        let mut rules = Vec::with_capacity(cfg.special_path_overrides.len() + 2);

        rules.push(Rule {
            name: "known-extension".to_string(),
            matcher: PathMatcher::KnownExtension(cfg.passthrough_extensions.clone()),
            strategy: Strategy::PassThrough,
        });

        for entry in &cfg.special_path_overrides {
            rules.push(Rule {
                name: format!("override:{}", entry.path),
                matcher: PathMatcher::Exact(entry.path.clone()),
                strategy: Strategy::AppendExtension(entry.extension.clone()),
            });
        }

        rules.push(Rule {
            name: "fallback".to_string(),
            matcher: PathMatcher::Any,
            strategy: Strategy::AppendExtension(cfg.effective_fallback().to_string()),
        });

        Self { rules }
    }

    /// Find the first rule matching `path`
    pub fn matching_rule(&self, path: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.matcher.matches(path))
    }

    /// Classify a path; pure function of the path and the rule list
    pub fn classify(&self, path: &str) -> Decision {
        self.matching_rule(path)
            .map_or(Decision::PassThrough, |rule| rule.strategy.apply(path))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

/// Check whether `path` ends with `.` + one of `exts`, ignoring ASCII case
///
/// Compares bytes so multi-byte paths never split on a char boundary.
pub fn has_known_extension(path: &str, exts: &[String]) -> bool {
    let bytes = path.as_bytes();
    exts.iter().any(|ext| {
        let ext = ext.as_bytes();
        if ext.is_empty() || bytes.len() <= ext.len() {
            return false;
        }
        let tail = &bytes[bytes.len() - ext.len() - 1..];
        tail[0] == b'.' && tail[1..].eq_ignore_ascii_case(ext)
    })
}
