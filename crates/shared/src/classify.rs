use std::fmt::Display;

use crate::config::CacheConfig;

/// How an intercepted request should be answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Live data. Network first, stored copy for later but never served stale
    Data,
    /// Static app shell. Cache first
    Shell,
    /// Straight to the network, nothing stored
    Passthrough,
}

impl Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use RequestKind::*;
        let s = match self {
            Data => "data",
            Shell => "shell",
            Passthrough => "passthrough",
        };
        f.write_str(s)
    }
}

/// Sorts URLs into [RequestKind]s by substring containment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classifier {
    data_fragments: Vec<String>,
    passthrough_fragments: Vec<String>,
}

impl Classifier {
    pub fn new(data_fragments: Vec<String>, passthrough_fragments: Vec<String>) -> Self {
        Self {
            data_fragments,
            passthrough_fragments,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            config.data_fragments.clone(),
            config.passthrough_fragments.clone(),
        )
    }

    /// Passthrough wins over data so a proxied data url is never stored
    pub fn classify(&self, url: &str) -> RequestKind {
        let contains = |fragments: &[String]| fragments.iter().any(|f| url.contains(f.as_str()));

        if contains(&self.passthrough_fragments) {
            RequestKind::Passthrough
        } else if contains(&self.data_fragments) {
            RequestKind::Data
        } else {
            RequestKind::Shell
        }
    }
}
