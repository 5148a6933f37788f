//! On-disk JPEG thumbnail cache for image files.
//!
//! Entries are named by an xxh3 hash of the source's absolute path and are rebuilt
//! whenever the source file is newer than the cached JPEG.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use image::codecs::jpeg::JpegEncoder;
use tracing::{debug, warn};

use super::mime::MediaKind;

pub const THUMBNAIL_SIZE: u32 = 200;
const JPEG_QUALITY: u8 = 85;

#[derive(Debug)]
pub struct ThumbnailCache {
    dir: PathBuf,
    size: u32,
    seq: AtomicU64,
}

impl ThumbnailCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into(), size: THUMBNAIL_SIZE, seq: AtomicU64::new(0) } }

    pub fn dir(&self) -> &Path { &self.dir }

    pub fn cache_path(&self, source: &Path) -> PathBuf {
        let h = xxhash_rust::xxh3::xxh3_64(source.as_os_str().as_encoded_bytes());
        self.dir.join(format!("{h:016x}.jpg"))
    }

    /// Path of a fresh thumbnail for `source`, generating it if needed. `None` means the
    /// caller should fall back to the original file (not an image, undecodable, I/O error).
    /// Blocking; run off the async executor.
    pub fn get_or_create(&self, source: &Path) -> Option<PathBuf> {
        if MediaKind::classify(source) != MediaKind::Image {
            return None;
        }
        let target = self.cache_path(source);
        let src_mtime = fs::metadata(source).and_then(|m| m.modified()).ok()?;
        if let Ok(cached) = fs::metadata(&target).and_then(|m| m.modified()) {
            if cached >= src_mtime {
                return Some(target);
            }
        }
        match self.render(source, &target) {
            Ok(()) => {
                debug!(target: "thumbnail", source = %source.display(), "thumbnail generated");
                Some(target)
            }
            Err(e) => {
                warn!(target: "thumbnail", source = %source.display(), error = %e, "thumbnail generation failed");
                None
            }
        }
    }

    fn render(&self, source: &Path, target: &Path) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let img = image::open(source)?;
        let rgb = img.thumbnail(self.size, self.size).to_rgb8();
        // unique temp name so concurrent requests for the same source never share a file
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        let tmp = target.with_extension(format!("{}.{n}.part", std::process::id()));
        let result = (|| -> anyhow::Result<()> {
            let mut out = BufWriter::new(File::create(&tmp)?);
            JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode_image(&rgb)?;
            out.flush()?;
            drop(out);
            fs::rename(&tmp, target)?;
            Ok(())
        })();
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::tempdir;

    fn write_png(path: &Path, w: u32, h: u32) {
        let img = ImageBuffer::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128u8]));
        img.save(path).unwrap();
    }

    #[test]
    fn generates_bounded_jpeg() {
        let tmp = tempdir().unwrap();
        let src = tmp.path().join("wide.png");
        write_png(&src, 640, 320);
        let cache = ThumbnailCache::new(tmp.path().join("thumbs"));
        let thumb = cache.get_or_create(&src).unwrap();
        assert_eq!(thumb, cache.cache_path(&src));
        let decoded = image::open(&thumb).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (200, 100));
        let bytes = fs::read(&thumb).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn reuses_fresh_entry() {
        let tmp = tempdir().unwrap();
        let src = tmp.path().join("a.png");
        write_png(&src, 50, 50);
        let cache = ThumbnailCache::new(tmp.path().join("thumbs"));
        let first = cache.get_or_create(&src).unwrap();
        let stamp = fs::metadata(&first).unwrap().modified().unwrap();
        let again = cache.get_or_create(&src).unwrap();
        assert_eq!(fs::metadata(&again).unwrap().modified().unwrap(), stamp);
    }

    #[test]
    fn non_images_and_garbage_fall_back() {
        let tmp = tempdir().unwrap();
        let cache = ThumbnailCache::new(tmp.path().join("thumbs"));
        let video = tmp.path().join("clip.mp4");
        fs::write(&video, b"not really a video").unwrap();
        assert!(cache.get_or_create(&video).is_none());
        let broken = tmp.path().join("broken.jpg");
        fs::write(&broken, b"definitely not jpeg").unwrap();
        assert!(cache.get_or_create(&broken).is_none());
        assert!(cache.get_or_create(&tmp.path().join("missing.png")).is_none());
    }

    #[test]
    fn cache_key_depends_on_path() {
        let cache = ThumbnailCache::new("thumbs");
        assert_ne!(cache.cache_path(Path::new("/m/a.png")), cache.cache_path(Path::new("/m/b.png")));
        assert_eq!(cache.cache_path(Path::new("/m/a.png")), cache.cache_path(Path::new("/m/a.png")));
    }
}
