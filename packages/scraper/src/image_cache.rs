//! MD5-sharded thumbnail cache.
//!
//! Thumbnails live at `<root>/<h0h1>/<h2h3>/<id>.jpg`, where `h0..h3` are
//! the first four hex digits of `MD5(id)`. Two levels of 256 directories
//! keep any single directory small.
//!
//! A thumbnail that is already on disk is never downloaded again.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::ImageFormat;

use crate::{Fetcher, ScrapeError};

/// Returns the shard directory for `id`, relative to the cache root.
#[must_use]
pub fn shard_dir(id: &str) -> PathBuf {
    let mut context = md5::Context::new();
    context.consume(id.as_bytes());
    let digest = format!("{:x}", context.finalize());
    Path::new(&digest[..2]).join(&digest[2..4])
}

/// On-disk thumbnail store keyed by listing id.
#[derive(Debug, Clone)]
pub struct ImageCache {
    root: PathBuf,
}

impl ImageCache {
    /// Creates a cache rooted at `root`. Directories are created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns where the thumbnail for `id` is (or would be) stored.
    #[must_use]
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(shard_dir(id)).join(format!("{id}.jpg"))
    }

    /// Returns the cached thumbnail for `id`, downloading it from `url`
    /// first if it is not on disk yet.
    ///
    /// Downloaded images are decoded and re-encoded as JPEG.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if the download, decode, encode, or write
    /// fails. Nothing is left at the final path in that case.
    pub async fn fetch<F: Fetcher>(
        &self,
        fetcher: &F,
        url: &str,
        id: &str,
    ) -> Result<PathBuf, ScrapeError> {
        let path = self.path_for(id);
        if path.is_file() {
            log::trace!("Image cache hit for {id}: {}", path.display());
            return Ok(path);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let bytes = fetcher.fetch_bytes(url).await?;
        let target = path.clone();
        tokio::task::spawn_blocking(move || transcode_to_jpeg(&bytes, &target)).await??;

        log::debug!("Cached image for {id} at {}", path.display());
        Ok(path)
    }
}

/// Decodes `bytes` as any supported image format and writes it to `path`
/// as JPEG.
///
/// The JPEG is written to a temporary sibling and renamed into place so a
/// half-written file is never mistaken for a cache hit.
fn transcode_to_jpeg(bytes: &[u8], path: &Path) -> Result<(), ScrapeError> {
    // JPEG has no alpha channel.
    let rgb = image::load_from_memory(bytes)?.into_rgb8();

    let mut encoded = Vec::new();
    image::DynamicImage::ImageRgb8(rgb)
        .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Jpeg)?;

    let tmp_path = path.with_extension("jpg.part");
    std::fs::write(&tmp_path, &encoded)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Serves the same image for every URL and counts requests.
    struct CountingFetcher {
        body: Vec<u8>,
        requests: AtomicUsize,
    }

    impl CountingFetcher {
        fn serving(body: Vec<u8>) -> Self {
            Self {
                body,
                requests: AtomicUsize::new(0),
            }
        }

        fn png() -> Self {
            let img = image::RgbaImage::from_pixel(4, 3, image::Rgba([200, 20, 20, 128]));
            let mut body = Vec::new();
            image::DynamicImage::ImageRgba8(img)
                .write_to(&mut Cursor::new(&mut body), ImageFormat::Png)
                .unwrap();
            Self::serving(body)
        }

        fn requests(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }
    }

    impl Fetcher for CountingFetcher {
        async fn fetch_text(&self, url: &str) -> Result<String, ScrapeError> {
            Err(ScrapeError::Parse(format!("no page at {url}")))
        }

        async fn fetch_bytes(&self, _url: &str) -> Result<Vec<u8>, ScrapeError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }
    }

    fn fresh_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "listing_image_cache_test_{name}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn shards_by_md5_prefix() {
        // md5("12345") = 827ccb0eea8a706c4c34a16891f84e7b
        assert_eq!(shard_dir("12345"), Path::new("82").join("7c"));

        let cache = ImageCache::new("/data/imgs");
        assert_eq!(
            cache.path_for("12345"),
            Path::new("/data/imgs/82/7c/12345.jpg")
        );
    }

    #[tokio::test]
    async fn downloads_once_then_hits_cache() {
        let dir = fresh_dir("hit");
        let cache = ImageCache::new(&dir);
        let fetcher = CountingFetcher::png();

        let first = cache
            .fetch(&fetcher, "http://img/12345.png", "12345")
            .await
            .unwrap();
        assert_eq!(first, cache.path_for("12345"));
        assert!(first.is_file());
        assert_eq!(fetcher.requests(), 1);

        let decoded = image::open(&first).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 3));

        let second = cache
            .fetch(&fetcher, "http://img/12345.png", "12345")
            .await
            .unwrap();
        assert_eq!(second, first);
        assert_eq!(fetcher.requests(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn undecodable_image_leaves_no_file() {
        let dir = fresh_dir("garbage");
        let cache = ImageCache::new(&dir);
        let fetcher = CountingFetcher::serving(b"<html>not an image</html>".to_vec());

        let result = cache.fetch(&fetcher, "http://img/1.jpg", "1").await;
        assert!(matches!(result, Err(ScrapeError::Image(_))));
        assert!(!cache.path_for("1").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
