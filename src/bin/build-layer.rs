use anyhow::Result;
use clap::Parser;
use poppler_layer::LayerConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Build the poppler layer image and extract the layer zip from it.
#[derive(Parser, Debug)]
#[command(name = "build-layer", version, about)]
struct Args {
    /// Container CLI to invoke
    #[arg(long, default_value = "docker")]
    docker: PathBuf,
    /// Dockerfile describing the layer image
    #[arg(long, default_value = "Dockerfile")]
    dockerfile: PathBuf,
    /// Build context directory
    #[arg(long, default_value = ".")]
    context: PathBuf,
    /// Tag for the built image
    #[arg(long, default_value = "poppler-lambda-layer")]
    tag: String,
    /// Target platform for the image
    #[arg(long, default_value = "linux/amd64")]
    platform: String,
    /// Path of the zip inside the container
    #[arg(long, default_value = "/poppler-lambda-layer.zip")]
    artifact: PathBuf,
    /// Where to write the zip locally
    #[arg(long, default_value = "./poppler-lambda-layer.zip")]
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = LayerConfig {
        docker: args.docker,
        dockerfile: args.dockerfile,
        context: args.context,
        image_tag: args.tag,
        platform: args.platform,
        artifact: args.artifact,
        output: args.output,
    };
    poppler_layer::build_layer(&config)?;
    Ok(())
}
