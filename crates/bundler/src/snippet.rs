//! Fills in the registration snippet that ends the bundled worker js

use anyhow::{bail, Context};
use base64::{display::Base64Display, engine::general_purpose::STANDARD};
use shared::CacheConfig;

/// The snippet as it sits in the worker crate
pub const REGISTER_LISTENERS_JS: &str =
    include_str!("../../service-worker/js/register_listeners.js");

/// Replaced by the base64 encoded worker wasm
pub const WASM_PLACEHOLDER: &str = "SERVICE_WORKER_BASE64";
/// Replaced by the config object handed to `worker_register`
pub const CONFIG_PLACEHOLDER: &str = "SERVICE_WORKER_CONFIG";

/// Substitutes both placeholders. Without a config the worker gets
/// `undefined` and falls back to its defaults
pub fn render(
    template: &str,
    wasm: &[u8],
    config: Option<&CacheConfig>,
) -> Result<String, anyhow::Error> {
    for placeholder in [WASM_PLACEHOLDER, CONFIG_PLACEHOLDER] {
        if !template.contains(placeholder) {
            bail!("{placeholder} missing from the registration snippet");
        }
    }

    let wasm_base64 = Base64Display::new(wasm, &STANDARD).to_string();
    let config = match config {
        Some(config) => serde_json::to_string(config).context("serialize[config]")?,
        None => "undefined".to_string(),
    };

    Ok(template
        .replace(WASM_PLACEHOLDER, &wasm_base64)
        .replace(CONFIG_PLACEHOLDER, &config))
}

/// The generated bindings followed by the registration snippet
pub fn bundle(bindings_js: &str, snippet: &str) -> String {
    format!("{bindings_js}\n{snippet}")
}
