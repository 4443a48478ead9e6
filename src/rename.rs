use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use tracing::debug;

/// Where `path` ends up when its stem is replaced by `stem`, keeping directory and extension.
pub fn target_path(path: &Path, stem: &str) -> anyhow::Result<PathBuf> {
    if stem.trim().is_empty() {
        bail!("refusing to rename {} to an empty name", path.display());
    }
    if stem.contains(['/', '\\']) {
        bail!("file name `{stem}` contains a path separator");
    }
    let name = match path.extension() {
        Some(ext) => format!("{stem}.{}", ext.to_string_lossy()),
        None => stem.to_string(),
    };
    Ok(path.with_file_name(name))
}

/// Rename `path` so its stem becomes `stem`. With `dry_run` nothing is touched and the target is
/// only computed.
pub fn rename(path: &Path, stem: &str, dry_run: bool) -> anyhow::Result<PathBuf> {
    let target = target_path(path, stem)?;
    if dry_run || target == path {
        debug!(dry_run, target = %target.display(), "not renaming");
        return Ok(target);
    }
    if target.exists() {
        bail!("{} already exists", target.display());
    }
    std::fs::rename(path, &target).with_context(|| {
        format!(
            "failed to rename {} to {}",
            path.display(),
            target.display()
        )
    })?;
    Ok(target)
}
