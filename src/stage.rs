//! Staging a binary and its libraries into a bin/ + lib/ tree.

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::deps::resolve_dependencies;

/// Result of staging one binary with its dependencies.
#[derive(Debug)]
pub struct StageSummary {
    /// Where the binary landed under `bin/`.
    pub binary: PathBuf,
    /// Libraries copied into `lib/` by this run.
    pub libs_copied: usize,
    /// Libraries skipped because `lib/` already held a file of that name.
    pub libs_skipped: usize,
}

/// Make a file executable (chmod 755).
pub fn make_executable(path: &Path) -> Result<()> {
    let mut perms = fs::metadata(path)
        .with_context(|| format!("Failed to read metadata: {}", path.display()))?
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)
        .with_context(|| format!("Failed to set permissions: {}", path.display()))?;
    Ok(())
}

/// Stage a binary and all of its shared-library dependencies under
/// `dest_root`, in the layout a Lambda layer expects:
///
/// - the binary goes to `dest_root/bin/<name>`, overwriting any previous
///   copy and keeping it executable;
/// - each resolved dependency goes to `dest_root/lib/<name>`, without
///   overwriting a file already there (first dependency wins).
///
/// Dependency paths that no longer exist on disk are skipped silently.
/// Fails on the first error; files copied before that point remain.
pub fn stage(binary_path: &Path, dest_root: &Path) -> Result<StageSummary> {
    let bin_dir = dest_root.join("bin");
    let lib_dir = dest_root.join("lib");
    fs::create_dir_all(&bin_dir)
        .with_context(|| format!("Failed to create {}", bin_dir.display()))?;
    fs::create_dir_all(&lib_dir)
        .with_context(|| format!("Failed to create {}", lib_dir.display()))?;

    let binary = stage_binary(binary_path, &bin_dir)?;

    let mut libs_copied = 0;
    let mut libs_skipped = 0;
    for dep in resolve_dependencies(binary_path)? {
        if stage_library(&dep, &lib_dir)? {
            libs_copied += 1;
        } else {
            libs_skipped += 1;
        }
    }

    Ok(StageSummary {
        binary,
        libs_copied,
        libs_skipped,
    })
}

/// Copy the binary itself into the staging bin directory.
fn stage_binary(binary_path: &Path, bin_dir: &Path) -> Result<PathBuf> {
    let name = binary_path
        .file_name()
        .with_context(|| format!("Path has no file name: {}", binary_path.display()))?;
    let dest = bin_dir.join(name);

    fs::copy(binary_path, &dest).with_context(|| {
        format!(
            "Failed to copy {} to {}",
            binary_path.display(),
            dest.display()
        )
    })?;
    make_executable(&dest)?;
    info!("{} -> {}", binary_path.display(), dest.display());

    Ok(dest)
}

/// Copy one library into the staging lib directory, no-clobber.
///
/// Returns `Ok(true)` if the library was copied, `Ok(false)` if it was
/// skipped (already present, or the source is not an existing regular
/// file).
fn stage_library(lib_path: &Path, lib_dir: &Path) -> Result<bool> {
    // ldd can report paths that have since been removed
    if !lib_path.is_file() {
        return Ok(false);
    }
    let name = match lib_path.file_name() {
        Some(name) => name,
        None => return Ok(false),
    };

    let dest = lib_dir.join(name);
    if dest.exists() {
        return Ok(false); // Already staged
    }

    fs::copy(lib_path, &dest).with_context(|| {
        format!(
            "Failed to copy {} to {}",
            lib_path.display(),
            dest.display()
        )
    })?;
    info!("{} -> {}", lib_path.display(), dest.display());

    Ok(true)
}
