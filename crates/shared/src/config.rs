use const_format::concatcp;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Every partition this worker has ever created starts with this
pub const CACHE_PREFIX: &str = "estou-escalado-cache-";

/// Bump this whenever the shell changes so activate can drop the old partition
pub const CACHE_VERSION: u32 = 2;

pub const CACHE_NAME: &str = concatcp!(CACHE_PREFIX, "v", CACHE_VERSION);

/// The "shell" of the app. '.' is the index at the scope root
pub const SHELL_ASSETS: &[&str] = &[
    ".",
    "index.html",
    "manifest.json",
    "favicon.png",
    "icon-192x192.png",
    "icon-512x512.png",
    // Header logo
    "https://i.imgur.com/5aGcTPI.png",
];

/// Live spreadsheet endpoints. These must never be served stale
pub const DATA_FRAGMENTS: &[&str] = &[
    "script.google.com/macros/",
    "docs.google.com/spreadsheets/",
    "output=csv",
];

/// CORS proxy hosts. Fetched directly and never stored
pub const PASSTHROUGH_FRAGMENTS: &[&str] = &["allorigins.win"];

/// Message a page posts to make a waiting worker take over
pub const SKIP_WAITING: &str = "SKIP_WAITING";

/// Where cache-first looks for a stored response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheLookup {
    /// Only the partition named by `cache_name`
    #[default]
    Current,
    /// Every partition in cache storage
    AnyPartition,
}

/// Immutable worker configuration.
///
/// Built from the constants above by `Default`. Any field can be overridden
/// from a JSON object, missing fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub cache_name: String,
    pub shell_assets: Vec<String>,
    pub data_fragments: Vec<String>,
    pub passthrough_fragments: Vec<String>,
    pub lookup: CacheLookup,
    /// Store shell responses that missed the cache and came back 200
    pub shell_write_back: bool,
    /// Skip the waiting phase once install succeeds
    pub skip_waiting: bool,
    /// Take control of open pages once activate succeeds
    pub claim_clients: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        fn owned(list: &[&str]) -> Vec<String> {
            list.iter().map(|s| s.to_string()).collect()
        }

        Self {
            cache_name: CACHE_NAME.to_string(),
            shell_assets: owned(SHELL_ASSETS),
            data_fragments: owned(DATA_FRAGMENTS),
            passthrough_fragments: owned(PASSTHROUGH_FRAGMENTS),
            lookup: CacheLookup::Current,
            shell_write_back: true,
            skip_waiting: true,
            claim_clients: true,
        }
    }
}

impl CacheConfig {
    /// Parses overrides from a JSON string and validates the result
    pub fn from_json(json: &str) -> Result<Self, CacheError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| CacheError::Config(e.to_string()))?;
        config.validate()
    }

    /// Checks the values can't produce a worker that silently does nothing
    pub fn validate(self) -> Result<Self, CacheError> {
        if self.cache_name.trim().is_empty() {
            return Err(CacheError::Config("cache_name must not be empty".to_string()));
        }

        // An empty fragment would match every URL
        if let Some(list) = [&self.data_fragments, &self.passthrough_fragments]
            .into_iter()
            .find(|list| list.iter().any(|f| f.is_empty()))
        {
            return Err(CacheError::Config(format!("empty url fragment in {list:?}")));
        }

        if self.shell_assets.iter().any(|a| a.is_empty()) {
            return Err(CacheError::Config("empty shell asset url".to_string()));
        }

        Ok(self)
    }

    /// True if `name` is a partition other than the current one
    pub fn is_stale(&self, name: &str) -> bool {
        name != self.cache_name
    }
}

#[cfg(feature = "wasm")]
mod wasm {
    use gloo::utils::format::JsValueSerdeExt;
    use wasm_bindgen::JsValue;

    use super::CacheConfig;
    use crate::error::CacheError;

    impl CacheConfig {
        /// Reads overrides from the object handed over by the worker's js glue.
        /// `undefined` and `null` give the defaults
        pub fn from_js(value: &JsValue) -> Result<Self, CacheError> {
            if value.is_undefined() || value.is_null() {
                return Ok(Self::default());
            }

            let config: Self = JsValueSerdeExt::into_serde(value)
                .map_err(|e| CacheError::Config(e.to_string()))?;
            config.validate()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cache_name_is_versioned() {
        assert_eq!(CACHE_NAME, "estou-escalado-cache-v2");
        assert_eq!(CacheConfig::default().cache_name, CACHE_NAME);
    }

    #[test]
    fn test_default_shell_contains_index_and_manifest() {
        let config = CacheConfig::default();
        assert!(config.shell_assets.iter().any(|a| a == "index.html"));
        assert!(config.shell_assets.iter().any(|a| a == "manifest.json"));
        assert_eq!(config.shell_assets[0], ".");
    }

    #[test]
    fn test_json_overrides_keep_other_defaults() {
        let config = CacheConfig::from_json(
            r#"{ "cache_name": "estou-escalado-cache-v3", "lookup": "any_partition" }"#,
        )
        .unwrap();

        assert_eq!(config.cache_name, "estou-escalado-cache-v3");
        assert_eq!(config.lookup, CacheLookup::AnyPartition);
        assert_eq!(config.shell_assets, CacheConfig::default().shell_assets);
        assert!(config.shell_write_back);
    }

    #[test]
    fn test_empty_cache_name_rejected() {
        let err = CacheConfig::from_json(r#"{ "cache_name": "  " }"#).unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }

    #[test]
    fn test_empty_fragment_rejected() {
        let err = CacheConfig::from_json(r#"{ "data_fragments": ["exec", ""] }"#).unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let err = CacheConfig::from_json("{ cache_name").unwrap_err();
        assert!(matches!(err, CacheError::Config(_)));
    }

    #[test]
    fn test_is_stale() {
        let config = CacheConfig::default();
        assert!(config.is_stale("estou-escalado-cache-v1"));
        assert!(!config.is_stale(CACHE_NAME));
    }
}
