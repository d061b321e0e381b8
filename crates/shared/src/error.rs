use thiserror::Error;

#[cfg(feature = "wasm")]
pub use js::*;

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// A shell asset couldn't be fetched so nothing was installed
    #[error("install failed on {url}: {source}")]
    Install {
        url: String,
        source: Box<CacheError>,
    },
    #[error("network request for {url} failed: {message}")]
    Network { url: String, message: String },
    #[error("{url} responded with {status}")]
    Status { url: String, status: u16 },
    #[error("cache storage error: {0}")]
    Storage(String),
    #[error("platform error: {0}")]
    Platform(String),
    #[error("invalid config: {0}")]
    Config(String),

    #[error("{context}: {inner}")]
    WithContext {
        context: String,
        inner: Box<CacheError>,
    },
}

impl CacheError {
    pub fn network<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Strips any context wrappers
    pub fn root(&self) -> &CacheError {
        match self {
            Self::WithContext { inner, .. } => inner.root(),
            e => e,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self.root(), Self::Network { .. })
    }
}

pub trait ErrorContext<E>: Sized {
    /// Add helpful context to errors
    ///
    /// `context` is provided as a closure to avoid potential formatting cost if
    /// the result isn't an error
    fn with_context<S: Into<String>, F: FnOnce() -> S>(self, context: F) -> E;
    /// Add helpful context to errors
    fn context<S: Into<String>>(self, context: S) -> E;
}

impl<E: Into<CacheError>> ErrorContext<CacheError> for E {
    fn with_context<S: Into<String>, F: FnOnce() -> S>(self, context: F) -> CacheError {
        self.context(context())
    }
    fn context<S: Into<String>>(self, context: S) -> CacheError {
        CacheError::WithContext {
            context: context.into(),
            inner: Box::new(self.into()),
        }
    }
}

pub trait ResultContext<T, E: ErrorContext<E>> {
    fn with_context<S: Into<String>, F: FnOnce() -> S>(self, context: F) -> Result<T, E>;
    fn context<S: Into<String>>(self, context: S) -> Result<T, E>;
}

impl<T, E: ErrorContext<E>> ResultContext<T, E> for Result<T, E> {
    fn with_context<S: Into<String>, F: FnOnce() -> S>(self, context: F) -> Result<T, E> {
        self.context(context())
    }
    fn context<S: Into<String>>(self, context: S) -> Result<T, E> {
        self.map_err(|e| e.context(context))
    }
}

#[cfg(feature = "wasm")]
mod js {
    use thiserror::Error;
    use wasm_bindgen::{JsCast, JsValue};
    use web_sys::js_sys::{
        Error as GenericJsError, RangeError as JsRangeError, ReferenceError as JsReferenceError,
        SyntaxError as JsSyntaxError, TypeError as JsTypeError, UriError as JsUriError,
    };

    use super::CacheError;

    /// A decoded promise rejection or thrown value
    #[derive(Debug, Clone, Error)]
    pub enum JsError {
        #[error("GenericJs Error: {0:?}")]
        GenericJs(GenericJsError),
        #[error("JsRange Error: {0:?}")]
        JsRange(JsRangeError),
        #[error("JsReference Error: {0:?}")]
        JsReference(JsReferenceError),
        #[error("JsSyntax Error: {0:?}")]
        JsSyntax(JsSyntaxError),
        // fetch rejects with a TypeError when the network is down
        #[error("JsType Error: {0:?}")]
        JsType(JsTypeError),
        #[error("JsUri Error: {0:?}")]
        JsUri(JsUriError),
        #[error("UnknownJsValue Error: {0:?}")]
        UnknownJsValue(String),
    }

    impl From<JsValue> for JsError {
        fn from(err: JsValue) -> JsError {
            if err.is_instance_of::<JsRangeError>() {
                return JsError::JsRange(err.into());
            }
            if err.is_instance_of::<JsReferenceError>() {
                return JsError::JsReference(err.into());
            }
            if err.is_instance_of::<JsSyntaxError>() {
                return JsError::JsSyntax(err.into());
            }
            if err.is_instance_of::<JsTypeError>() {
                return JsError::JsType(err.into());
            }
            if err.is_instance_of::<JsUriError>() {
                return JsError::JsUri(err.into());
            }
            if err.is_instance_of::<GenericJsError>() {
                return JsError::GenericJs(err.into());
            }
            JsError::UnknownJsValue(format!("{:?}", err))
        }
    }

    impl CacheError {
        pub fn storage_js(err: JsValue) -> Self {
            Self::Storage(JsError::from(err).to_string())
        }

        pub fn platform_js(err: JsValue) -> Self {
            Self::Platform(JsError::from(err).to_string())
        }

        pub fn network_js<U: Into<String>>(url: U, err: JsValue) -> Self {
            Self::network(url, JsError::from(err).to_string())
        }
    }

    // Rejects the event's promise with something readable in devtools
    impl From<CacheError> for JsValue {
        fn from(err: CacheError) -> JsValue {
            GenericJsError::new(&err.to_string()).into()
        }
    }
}
