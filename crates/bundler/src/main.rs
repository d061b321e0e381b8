//! Produces the deployable `sw.js`: the worker's wasm-bindgen glue with the
//! wasm embedded as base64 and the listener registration appended.

use std::{
    fs::{create_dir_all, read, read_to_string, write},
    path::PathBuf,
};

use anyhow::Context;
use clap::Parser;
use shared::CacheConfig;
use tracing::{debug, info};
use tracing_subscriber::fmt::format::FmtSpan;

mod snippet;
mod wasm;

const WORKER_PACKAGE: &str = "escalado-service-worker";

#[derive(Debug, Parser)]
#[clap(name = "bundle-worker")]
struct Cli {
    /// Where sw.js is written
    #[clap(long, env, default_value = "dist")]
    out_dir: PathBuf,
    /// Scratch space for cargo and wasm-bindgen
    #[clap(long, env, default_value = "target/bundle")]
    target_dir: PathBuf,
    /// JSON overrides for the worker config, checked before they're embedded
    #[clap(long, env)]
    config: Option<PathBuf>,
    #[clap(long, env, default_value = "false")]
    release: bool,
    /// Skip wasm-opt, mostly to speed up local builds
    #[clap(long, env, default_value = "false")]
    no_opt: bool,
}

fn configure_tracing() {
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(tracing::Level::TRACE)
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_span_events(FmtSpan::CLOSE)
            .finish(),
    )
    .expect("Failed to set default tracing subscriber");
}

fn load_config(path: Option<&PathBuf>) -> Result<Option<CacheConfig>, anyhow::Error> {
    let Some(path) = path else {
        return Ok(None);
    };

    let json = read_to_string(path).with_context(|| format!("read_to_string[{path:?}]"))?;
    let config = CacheConfig::from_json(&json).with_context(|| format!("config[{path:?}]"))?;
    Ok(Some(config))
}

fn main() -> Result<(), anyhow::Error> {
    configure_tracing();

    let args = Cli::parse();
    debug!(?args);

    let config = load_config(args.config.as_ref())?;
    if let Some(config) = &config {
        info!(cache = config.cache_name, "Embedding config");
    }

    let wasm_file =
        wasm::build(WORKER_PACKAGE, &args.target_dir, args.release).context("build_wasm")?;

    let bindgen_dir = args.target_dir.join("bindgen");
    create_dir_all(&bindgen_dir).context("create_dir_all[bindgen_dir]")?;
    let (bg_file, js_file) = wasm::generate_bindings(&wasm_file, &bindgen_dir, args.release)
        .context("generate_bindings")?;

    let bg_file = match args.no_opt {
        true => bg_file,
        false => wasm::optimize(&bg_file).context("optimize_wasm")?,
    };

    info!("Loading worker wasm bytes");
    let wasm_bytes = read(&bg_file).context("read[bg_file]")?;
    let bindings_js = read_to_string(&js_file).context("read_to_string[js_file]")?;

    let snippet = snippet::render(snippet::REGISTER_LISTENERS_JS, &wasm_bytes, config.as_ref())?;

    create_dir_all(&args.out_dir).context("create_dir_all[out_dir]")?;
    let sw_js = args.out_dir.join("sw.js");
    write(&sw_js, snippet::bundle(&bindings_js, &snippet)).context("write[sw.js]")?;

    info!(
        out = ?sw_js,
        wasm_bytes = wasm_bytes.len(),
        "Bundled worker"
    );
    Ok(())
}
