//! Asset Copier

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Copy `src` to `dst`, creating `dst`'s parent directories.
pub fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dst)?;
    Ok(())
}

/// Copy each `(source, relative destination)` pair under `target_root`.
///
/// Failures are logged and skipped. Returns the sources that were skipped.
pub fn copy_optional(target_root: &Path, pairs: &[(PathBuf, PathBuf)]) -> Vec<PathBuf> {
    let mut skipped = vec![];
    for (src, rel) in pairs {
        let dst = target_root.join(rel);
        if let Err(e) = copy_file(src, &dst) {
            tracing::warn!(src = %src.display(), error = %e, "optional asset skipped");
            skipped.push(src.clone());
        }
    }
    skipped
}
