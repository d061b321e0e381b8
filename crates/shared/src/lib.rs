//! Types shared between the offline worker and anything that configures it:
//! the versioned cache config, url classification and the error type.

pub mod classify;
pub mod config;
pub mod error;
pub mod utils;

pub use classify::{Classifier, RequestKind};
pub use config::{CacheConfig, CacheLookup, CACHE_NAME, SKIP_WAITING};
pub use error::{CacheError, ErrorContext, ResultContext};
