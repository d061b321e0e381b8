#[cfg(feature = "wasm")]
pub mod tracing;
