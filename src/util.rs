// promptmap/src/util.rs

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

/// Display name of a directory (last component), canonicalized when possible.
/// Falls back to the parent's name, then to "project", instead of erroring.
pub fn dir_display_name(p: &Path) -> String {
    // canonicalize when possible, but don’t fail the whole call if it errors
    let canon: PathBuf = p.canonicalize().unwrap_or_else(|_| p.to_path_buf());
    canon
        .file_name()
        .or_else(|| canon.parent().and_then(|pp| pp.file_name()))
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| "project".into())
}

/// Path relative to `root`, `/`-separated.
pub fn normalize_rel(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}

/// Write `text` to `path`, creating parent directories first.
pub fn write_output(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}
