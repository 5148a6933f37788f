//! Filesystem-facing helpers for the dashboard: media classification, directory
//! listings, upload naming and the thumbnail cache.

pub mod listing;
pub mod mime;
pub mod thumbnail;
pub mod upload;

pub use listing::{directory_structure, folder_contents, FileEntry, FolderContents, FolderEntry};
pub use mime::{content_type_for, MediaKind};
pub use thumbnail::ThumbnailCache;
pub use upload::{sanitize_file_name, store_upload, timestamped_name};
