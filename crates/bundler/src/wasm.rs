//! Builds the worker crate for wasm32 and runs it through wasm-bindgen and
//! wasm-opt

use std::{
    path::{Path, PathBuf},
    process::Command,
    time::Instant,
};

use anyhow::{bail, Context};
use tracing::info;
use wasm_opt::{OptimizationOptions, Pass};

const WASM_TARGET: &str = "wasm32-unknown-unknown";

/// Release builds use the size optimized profile from the workspace manifest
pub fn profile(release: bool) -> &'static str {
    match release {
        true => "wasm-release",
        false => "debug",
    }
}

/// File stem cargo gives the cdylib
pub fn lib_file_name(package: &str) -> String {
    package.replace('-', "_")
}

// Runs cargo rustc to build the wasm lib
pub fn build(package: &str, target_dir: &Path, release: bool) -> Result<PathBuf, anyhow::Error> {
    let mut cargo_cmd = Command::new("cargo");
    cargo_cmd.args(["rustc", "--package", package, "--lib", "--crate-type", "cdylib"]);
    cargo_cmd.args(["--target", WASM_TARGET]);
    cargo_cmd.arg("--target-dir").arg(target_dir);

    if release {
        cargo_cmd.args(["--profile", profile(true)]);
    }

    let start = Instant::now();
    info!(package, "Building wasm");
    if !cargo_cmd.status().context("cargo rustc")?.success() {
        bail!("cargo rustc failed for {package}");
    }
    info!(
        package,
        "Building wasm took {:.2}s",
        start.elapsed().as_secs_f32()
    );

    let wasm = out_path(&lib_file_name(package), target_dir, profile(release));
    if !wasm.exists() {
        bail!("Wasm file doesn't exist after running cargo for {package}. Should be at {wasm:?}");
    }
    Ok(wasm)
}

// Works out where the wasm is output to
pub fn out_path(lib_file_name: &str, target_dir: &Path, profile: &str) -> PathBuf {
    target_dir
        .join(WASM_TARGET)
        .join(profile)
        .join(format!("{lib_file_name}.wasm"))
}

/// Runs bindgen on the wasm lib. Workers get `no-modules` output because
/// module service workers aren't supported everywhere.
///
/// Returns the bg wasm and the js glue
pub fn generate_bindings(
    input: &Path,
    out_dir: &Path,
    release: bool,
) -> Result<(PathBuf, PathBuf), anyhow::Error> {
    let start = Instant::now();
    info!(?input, "Generating bindings");

    let mut bg = wasm_bindgen_cli_support::Bindgen::new();
    bg.no_modules(true)?
        .input_path(input)
        .remove_name_section(release)
        .remove_producers_section(release)
        .keep_debug(!release)
        .omit_default_module_path(false)
        .generate(out_dir)?;

    info!(
        "Generating bindings took {:.2}s",
        start.elapsed().as_secs_f32()
    );

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("Wasm path {input:?} has no utf8 file name"))?;
    let js_file = out_dir.join(format!("{stem}.js"));
    let bg_file = out_dir.join(format!("{stem}_bg.wasm"));

    // Check the output we were expecting was created
    for file in [&js_file, &bg_file] {
        if !file.exists() {
            bail!("Bindgen output doesn't exist after running wasm-bindgen. Should be at {file:?}");
        }
    }

    Ok((bg_file, js_file))
}

// Run wasm-opt on the wasm
pub fn optimize(input: &Path) -> Result<PathBuf, anyhow::Error> {
    let output = input.with_extension("opt.wasm");

    let mut opt_options = OptimizationOptions::new_optimize_for_size_aggressively();
    opt_options.passes.more_passes.push(Pass::StripDwarf);
    opt_options
        .run(input, &output)
        .with_context(|| format!("wasm-opt {input:?}"))?;

    if !output.exists() {
        bail!("Optimized file doesn't exist after running wasm-opt. Should be at {output:?}");
    }

    Ok(output)
}
