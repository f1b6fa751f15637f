//! Shared-library dependency resolution using ldd.

use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Resolve the shared-library dependencies of a binary using ldd.
///
/// ldd resolves the full transitive closure through the host dynamic
/// linker, so the returned set already includes indirect dependencies.
///
/// # Errors
///
/// Returns an error if:
/// - The file does not exist
/// - `ldd` is not installed
/// - `ldd` fails for reasons other than "not a dynamic executable"
///
/// Returns `Ok(HashSet::new())` if the file is not dynamically linked
/// (a static binary, a script, a text file).
#[must_use = "resolved dependencies should be processed"]
pub fn resolve_dependencies(binary_path: &Path) -> Result<HashSet<PathBuf>> {
    // Check file exists first for a clear error message
    if !binary_path.exists() {
        bail!("File does not exist: {}", binary_path.display());
    }

    let output = Command::new("ldd")
        .arg(binary_path)
        .output()
        .context("ldd command not found")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        // ldd rejects non-dynamic inputs with a message that varies by
        // libc (glibc, musl, busybox). None of these are errors here.
        if is_not_dynamic(&stderr) || is_not_dynamic(&stdout) {
            return Ok(HashSet::new());
        }
        bail!(
            "ldd failed on {}: {}",
            binary_path.display(),
            stderr.trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_ldd_output(&stdout))
}

fn is_not_dynamic(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("not a dynamic executable")
        || lower.contains("not a valid dynamic program")
        || lower.contains("not an elf")
}

/// Parse ldd output into a deduplicated set of library paths.
///
/// Example ldd output:
/// ```text
///     linux-vdso.so.1 (0x00007ffc8a1f2000)
///     libc.so.6 => /lib/x86_64-linux-gnu/libc.so.6 (0x00007f0a2c000000)
///     /lib64/ld-linux-x86-64.so.2 (0x00007f0a2c3e9000)
/// ```
///
/// Every whitespace-separated token starting with `/` is a resolved
/// library path. Sonames, `=>` arrows, load addresses, and `not found`
/// markers are ignored.
pub fn parse_ldd_output(output: &str) -> HashSet<PathBuf> {
    output
        .lines()
        .flat_map(str::split_whitespace)
        .filter(|token| token.starts_with('/'))
        .map(PathBuf::from)
        .collect()
}
