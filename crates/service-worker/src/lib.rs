//! Offline support for Estou Escalado.
//!
//! The app shell is cached at install, old versions are dropped at activate
//! and every fetch is routed cache first (shell), network first (live
//! spreadsheet data) or straight through (CORS proxy).

use std::rc::Rc;

use console_error_panic_hook::set_once as set_panic_hook;
use shared::{utils::tracing::configure_tracing_once as configure_tracing, CacheConfig};
use tracing::info;
use wasm_bindgen::{prelude::wasm_bindgen, JsValue};
use web_sys::ServiceWorkerGlobalScope;

pub mod browser;
pub mod controller;
pub mod platform;
pub mod registry;

#[cfg(test)]
mod memory;

pub use controller::CacheController;

use browser::{BrowserPlatform, BrowserRegistry};

/// Called once from the worker's js glue after the wasm module loads.
///
/// `config` is an optional object overriding fields of [CacheConfig]
#[wasm_bindgen]
pub fn worker_register(sw: ServiceWorkerGlobalScope, config: JsValue) -> Result<(), JsValue> {
    set_panic_hook();
    configure_tracing();

    let config = CacheConfig::from_js(&config)?;
    let cache_name = config.cache_name.clone();

    let controller = Rc::new(CacheController::new(config, BrowserPlatform::new(sw.clone())?));
    controller.register(&mut BrowserRegistry::new(sw))?;

    info!(cache = cache_name, "Worker registered");
    Ok(())
}
