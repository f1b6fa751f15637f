use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Copy a binary and its shared-library dependencies into a bin/ + lib/ tree.
#[derive(Parser, Debug)]
#[command(name = "copy-deps", version, about)]
struct Args {
    /// Dynamically linked binary to stage
    binary: PathBuf,
    /// Destination root; bin/ and lib/ are created beneath it
    dest: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();
    let summary = poppler_layer::stage(&args.binary, &args.dest)?;
    tracing::info!(
        "Staged {} with {} libraries ({} already present)",
        summary.binary.display(),
        summary.libs_copied,
        summary.libs_skipped
    );
    Ok(())
}
