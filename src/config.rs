//! Backend locator parsing.
//!
//! A locator is a URL whose scheme selects the backend kind and whose query
//! pairs become constructor parameters, e.g. `mem://` or
//! `mem://?disable=true`. The `disable` flag (or the negation of `enable`,
//! default enabled) is folded into [`BackendConfig::enabled`] rather than
//! passed through to the backend.

use crate::error::{CacheError, CacheResult};
use std::collections::HashMap;
use std::fmt;
use url::Url;

/// Backend kind selected by the locator scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// In-memory backend (`mem://`, `memory://`)
    Memory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Memory => f.write_str("memory"),
        }
    }
}

/// Parsed backend locator.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Backend kind
    pub kind: BackendKind,

    /// The original locator string
    pub url: String,

    /// Whether the backend starts enabled
    pub enabled: bool,

    /// Remaining query parameters, handed to the backend constructor
    pub params: HashMap<String, String>,
}

impl BackendConfig {
    /// Parse `locator` into a backend configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use keyway::config::{BackendConfig, BackendKind};
    ///
    /// let config = BackendConfig::from_url("mem://?disable=true").unwrap();
    /// assert_eq!(config.kind, BackendKind::Memory);
    /// assert!(!config.enabled);
    /// ```
    pub fn from_url(locator: &str) -> CacheResult<Self> {
        let parsed = Url::parse(locator)
            .map_err(|e| CacheError::InvalidUrl(format!("{locator}: {e}")))?;

        let kind = match parsed.scheme() {
            "mem" | "memory" => BackendKind::Memory,
            other => {
                return Err(CacheError::InvalidUrl(format!(
                    "unsupported scheme `{other}` in {locator}"
                )));
            }
        };

        let mut params: HashMap<String, String> = parsed.query_pairs().into_owned().collect();

        // `disable` wins over `enable`; both are removed from the params
        // the backend constructor sees.
        let enable = params.remove("enable");
        let enabled = match params.remove("disable") {
            Some(flag) => !parse_flag(&flag),
            None => enable.map(|flag| parse_flag(&flag)).unwrap_or(true),
        };

        Ok(Self {
            kind,
            url: locator.to_string(),
            enabled,
            params,
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
