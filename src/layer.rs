//! Building the Lambda layer zip through the docker CLI.
//!
//! Four sequential docker invocations: build the image for the target
//! platform, create (not start) a container from it, copy the zip the
//! image build produced out of the container filesystem, remove the
//! container. The image is left on the host for reuse.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::process::Command;
use tracing::{info, warn};

/// Fixed names used by the layer build.
#[derive(Debug, Clone)]
pub struct LayerConfig {
    /// Container CLI to invoke, normally `docker` from the path.
    pub docker: PathBuf,
    /// Build description file passed to `docker build -f`.
    pub dockerfile: PathBuf,
    /// Build context directory.
    pub context: PathBuf,
    /// Tag applied to the built image.
    pub image_tag: String,
    /// Target platform, e.g. `linux/amd64`.
    pub platform: String,
    /// Absolute path of the zip inside the container filesystem.
    pub artifact: PathBuf,
    /// Local path the zip is extracted to.
    pub output: PathBuf,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            docker: PathBuf::from("docker"),
            dockerfile: PathBuf::from("Dockerfile"),
            context: PathBuf::from("."),
            image_tag: "poppler-lambda-layer".to_string(),
            platform: "linux/amd64".to_string(),
            artifact: PathBuf::from("/poppler-lambda-layer.zip"),
            output: PathBuf::from("./poppler-lambda-layer.zip"),
        }
    }
}

/// Build the image and extract the layer zip from a throwaway container.
///
/// Every step is checked; the container is removed even when extraction
/// fails, so a failed run leaves only the image behind. When both the
/// extraction and the removal fail, the extraction error is the one
/// returned and the removal failure is only logged.
pub fn build_layer(config: &LayerConfig) -> Result<PathBuf> {
    build_image(config)?;
    let container_id = create_container(config)?;
    let extracted = extract_artifact(config, &container_id);
    if let Err(rm_err) = remove_container(config, &container_id) {
        match extracted {
            Ok(()) => return Err(rm_err),
            Err(_) => warn!("{rm_err:#}"),
        }
    }
    extracted?;

    info!("Layer zip written to {}", config.output.display());
    Ok(config.output.clone())
}

/// Run `docker build` with stdio inherited so the operator sees the
/// raw build output.
fn build_image(config: &LayerConfig) -> Result<()> {
    info!(
        "Building image {} for {}",
        config.image_tag, config.platform
    );
    let status = Command::new(&config.docker)
        .arg("build")
        .arg("--platform")
        .arg(&config.platform)
        .arg("-t")
        .arg(&config.image_tag)
        .arg("-f")
        .arg(&config.dockerfile)
        .arg(&config.context)
        .status()
        .context("docker command not found")?;

    if !status.success() {
        bail!("docker build failed for image '{}'", config.image_tag);
    }
    Ok(())
}

/// Create a container from the image without starting it, returning its id.
fn create_container(config: &LayerConfig) -> Result<String> {
    let output = Command::new(&config.docker)
        .arg("create")
        .arg(&config.image_tag)
        .output()
        .context("docker command not found")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "docker create failed for image '{}': {}",
            config.image_tag,
            stderr.trim()
        );
    }

    let id = parse_container_id(&String::from_utf8_lossy(&output.stdout))?;
    info!("Created container {}", id);
    Ok(id)
}

/// Extract the container id from `docker create` stdout.
fn parse_container_id(stdout: &str) -> Result<String> {
    let id = stdout.trim();
    if id.is_empty() {
        bail!("docker create returned no container id");
    }
    // docker prints warnings before the id on some platform mismatches
    Ok(id
        .lines()
        .last()
        .unwrap_or(id)
        .trim()
        .to_string())
}

/// Copy the artifact out of the (stopped) container filesystem.
fn extract_artifact(config: &LayerConfig, container_id: &str) -> Result<()> {
    let status = Command::new(&config.docker)
        .arg("cp")
        .arg(format!("{}:{}", container_id, config.artifact.display()))
        .arg(&config.output)
        .status()
        .context("docker command not found")?;

    if !status.success() {
        bail!(
            "docker cp failed extracting {} from container {}",
            config.artifact.display(),
            container_id
        );
    }
    info!(
        "{}:{} -> {}",
        container_id,
        config.artifact.display(),
        config.output.display()
    );
    Ok(())
}

fn remove_container(config: &LayerConfig, container_id: &str) -> Result<()> {
    let output = Command::new(&config.docker)
        .arg("rm")
        .arg(container_id)
        .output()
        .context("docker command not found")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "docker rm failed for container {}: {}",
            container_id,
            stderr.trim()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::TempDir;

    /// Install a shell script standing in for the docker CLI. It appends
    /// each subcommand to `log` and exits non-zero for the subcommands
    /// listed in `failing`.
    fn fake_docker(dir: &Path, log: &Path, failing: &[&str]) -> LayerConfig {
        let mut script = format!("#!/bin/sh\necho \"$1\" >> {}\n", log.display());
        script.push_str("case \"$1\" in\n");
        script.push_str("  create) echo cafebabe ;;\n");
        for subcommand in failing {
            script.push_str(&format!("  {}) exit 1 ;;\n", subcommand));
        }
        script.push_str("esac\n");

        let path = dir.join("docker");
        fs::write(&path, script).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();

        LayerConfig {
            docker: path,
            ..LayerConfig::default()
        }
    }

    fn logged_calls(log: &Path) -> Vec<String> {
        fs::read_to_string(log)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_build_layer_step_order() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("calls.log");
        let config = fake_docker(temp.path(), &log, &[]);

        let output = build_layer(&config).unwrap();

        assert_eq!(output, config.output);
        assert_eq!(logged_calls(&log), ["build", "create", "cp", "rm"]);
    }

    #[test]
    fn test_container_removed_when_extraction_fails() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("calls.log");
        let config = fake_docker(temp.path(), &log, &["cp"]);

        let err = build_layer(&config).unwrap_err();

        assert!(err.to_string().contains("docker cp failed"));
        assert!(
            logged_calls(&log).contains(&"rm".to_string()),
            "container was not removed after failed extraction"
        );
    }

    #[test]
    fn test_extraction_error_wins_over_rm_error() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("calls.log");
        let config = fake_docker(temp.path(), &log, &["cp", "rm"]);

        let err = build_layer(&config).unwrap_err();

        assert!(
            err.to_string().contains("docker cp failed"),
            "expected the extraction error, got: {}",
            err
        );
    }

    #[test]
    fn test_rm_error_surfaces_when_extraction_succeeds() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("calls.log");
        let config = fake_docker(temp.path(), &log, &["rm"]);

        let err = build_layer(&config).unwrap_err();

        assert!(err.to_string().contains("docker rm failed"));
    }

    #[test]
    fn test_default_config() {
        let config = LayerConfig::default();
        assert_eq!(config.docker, Path::new("docker"));
        assert_eq!(config.image_tag, "poppler-lambda-layer");
        assert_eq!(config.platform, "linux/amd64");
        assert_eq!(config.artifact, Path::new("/poppler-lambda-layer.zip"));
        assert_eq!(config.output, Path::new("./poppler-lambda-layer.zip"));
    }

    #[test]
    fn test_parse_container_id() {
        let id = parse_container_id("3f2a9c01b4de\n").unwrap();
        assert_eq!(id, "3f2a9c01b4de");
    }

    #[test]
    fn test_parse_container_id_skips_warnings() {
        let stdout = "WARNING: image platform does not match host\n3f2a9c01b4de\n";
        let id = parse_container_id(stdout).unwrap();
        assert_eq!(id, "3f2a9c01b4de");
    }

    #[test]
    fn test_parse_container_id_empty() {
        assert!(parse_container_id("\n").is_err());
    }
}
