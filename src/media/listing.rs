//! Directory listings for the sidebar tree and the folder panel.
//!
//! Entries that cannot be read (permission errors, entries removed mid-walk) are
//! skipped; an unreadable directory yields an empty listing.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::mime::MediaKind;
use crate::confine::to_slash_string;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderContents {
    pub folders: Vec<FolderEntry>,
    pub files: Vec<FileEntry>,
}

/// Top-level folders of `root`, sorted by name.
pub fn directory_structure(root: &Path) -> Vec<FolderEntry> {
    folder_contents(root, root).folders
}

/// Folders and files directly inside `dir`; paths are reported relative to `root`.
pub fn folder_contents(dir: &Path, root: &Path) -> FolderContents {
    let mut out = FolderContents::default();
    let rd = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            warn!(target: "listing", dir = %dir.display(), error = %e, "cannot read directory");
            return out;
        }
    };
    for ent in rd.flatten() {
        let path = ent.path();
        // follow symlinks, like the file routes do
        let Ok(meta) = std::fs::metadata(&path) else { continue };
        let name = ent.file_name().to_string_lossy().to_string();
        let rel = path.strip_prefix(root).map(to_slash_string).unwrap_or_else(|_| name.clone());
        if meta.is_dir() {
            out.folders.push(FolderEntry { name, path: rel, kind: "folder".to_string() });
        } else if meta.is_file() {
            out.files.push(FileEntry { kind: MediaKind::classify(&path), name, path: rel, size: meta.len() });
        }
    }
    out.folders.sort_by(|a, b| a.name.cmp(&b.name));
    out.files.sort_by(|a, b| a.name.cmp(&b.name));
    out
}
