//! Upload naming: client filenames are reduced to a single component and never
//! overwrite an existing file.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

const MAX_NAME_ATTEMPTS: u32 = 64;

/// Keep only the final component of a client supplied filename.
pub fn sanitize_file_name(raw: &str) -> AppResult<String> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if name.is_empty() || name == "." || name == ".." || name.contains('\0') {
        return Err(AppError::user("invalid_filename", format!("invalid file name '{raw}'")));
    }
    Ok(name.to_string())
}

/// `name` with `_<suffix>` inserted before the last extension.
fn suffixed_name(name: &str, suffix: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => format!("{stem}_{suffix}.{ext}"),
        Some((stem, _)) => format!("{stem}_{suffix}"),
        None => format!("{name}_{suffix}"),
    }
}

/// Collision name: `photo.jpg` -> `photo_<ts>.jpg`, `README` -> `README_<ts>`.
pub fn timestamped_name(name: &str, unix_ts: i64) -> String { suffixed_name(name, &unix_ts.to_string()) }

/// Write `data` into `dir` under `name`, or under a timestamped variant when `name`
/// is taken. Existing files are never opened for writing. Returns the path written.
pub fn store_upload(dir: &Path, name: &str, data: &[u8], unix_ts: i64) -> io::Result<PathBuf> {
    let mut candidate = name.to_string();
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let path = dir.join(&candidate);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut f) => {
                f.write_all(data)?;
                f.sync_all()?;
                return Ok(path);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                candidate = if attempt == 0 {
                    timestamped_name(name, unix_ts)
                } else {
                    suffixed_name(name, &format!("{unix_ts}_{attempt}"))
                };
            }
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(io::ErrorKind::AlreadyExists, format!("no free name for '{name}'")))
}
