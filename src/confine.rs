//! Confinement of user-supplied paths to a single media root.
//!
//! Every handler that touches the filesystem resolves its path argument here first.
//! Both sides of the containment check are canonical: the root is canonicalized once
//! at construction and candidate paths are canonicalized (symlinks, `.` and `..`
//! resolved) before the component-wise prefix comparison. Paths that do not exist yet
//! (upload targets, new folders) are normalized lexically and anchored on their
//! deepest existing, canonicalized ancestor.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use path_absolutize::Absolutize;
use tracing::warn;

use crate::error::{AppError, AppResult};

/// A path proven to live under the confinement root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfinedPath {
    absolute: PathBuf,
    relative: PathBuf,
}

impl ConfinedPath {
    pub fn absolute(&self) -> &Path { &self.absolute }

    pub fn relative(&self) -> &Path { &self.relative }

    pub fn is_root(&self) -> bool { self.relative.as_os_str().is_empty() }

    /// Relative path with `/` separators; empty for the root itself.
    pub fn relative_string(&self) -> String { to_slash_string(&self.relative) }

    pub fn file_name(&self) -> Option<String> {
        self.absolute.file_name().map(|n| n.to_string_lossy().to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Confinement {
    root: PathBuf,
}

impl Confinement {
    /// Canonicalizes `root`; fails when the root does not exist.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().canonicalize()?;
        Ok(Self { root })
    }

    /// Canonical root every resolved path is checked against.
    pub fn root(&self) -> &Path { &self.root }

    pub fn resolve(&self, user_path: &str) -> AppResult<ConfinedPath> {
        if user_path.contains('\0') {
            return Err(AppError::access_denied("invalid_path", "path contains NUL bytes"));
        }
        if user_path.chars().all(|c| c == '/' || c == '.') && !user_path.contains("..") {
            return Ok(ConfinedPath { absolute: self.root.clone(), relative: PathBuf::new() });
        }
        let resolved = canonicalize_lenient(&self.root.join(user_path))?;
        if !resolved.starts_with(&self.root) {
            warn!(target: "confine", requested = %user_path, resolved = %resolved.display(), "path escapes media root");
            return Err(AppError::access_denied("path_escape", "Access denied"));
        }
        let relative = resolved
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(ConfinedPath { absolute: resolved, relative })
    }
}

/// One-off resolution against `root` without keeping a [`Confinement`] around.
pub fn resolve(root: &Path, user_path: &str) -> AppResult<ConfinedPath> {
    Confinement::new(root)?.resolve(user_path)
}

/// Canonicalize `path`; when it does not exist, normalize it lexically and rebuild it
/// on top of its deepest existing ancestor so symlinks in that ancestor still resolve.
fn canonicalize_lenient(path: &Path) -> AppResult<PathBuf> {
    if let Ok(p) = path.canonicalize() {
        return Ok(p);
    }
    let normalized = path.absolutize()?.to_path_buf();
    let mut existing = normalized.as_path();
    let mut tail: Vec<OsString> = Vec::new();
    loop {
        if let Ok(base) = existing.canonicalize() {
            let mut out = base;
            for segment in tail.iter().rev() {
                out.push(segment);
            }
            return Ok(out);
        }
        let (Some(name), Some(parent)) = (existing.file_name(), existing.parent()) else {
            return Ok(normalized);
        };
        tail.push(name.to_os_string());
        existing = parent;
    }
}

pub(crate) fn to_slash_string(p: &Path) -> String {
    p.components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}
