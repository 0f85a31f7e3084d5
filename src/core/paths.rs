//! Syntactic path normalization for cache keys.
//!
//! Cache keys must be absolute, lexically canonical paths. Only syntactic
//! normalization is performed: `.` and `..` segments are collapsed without
//! touching the filesystem, so symlinks are never resolved. When the
//! current directory cannot be determined for a relative path, the
//! original string is returned unchanged; producers and consumers both go
//! through this function, so lookups stay consistent either way.

use std::path::{Component, Path, PathBuf};

/// Normalizes a path into the canonical cache-key form.
pub fn normalize(path: &Path) -> String {
    if path.is_absolute() {
        return clean(path).to_string_lossy().into_owned();
    }
    match std::env::current_dir() {
        Ok(cwd) => clean(&cwd.join(path)).to_string_lossy().into_owned(),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

/// Normalizes a path given as a string. See [`normalize`].
pub fn normalize_str(path: &str) -> String {
    normalize(Path::new(path))
}

/// Lexically cleans a path: collapses `.` segments and resolves `..`
/// against the preceding component, textually.
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(name) => out.push(name),
        }
    }
    out
}
