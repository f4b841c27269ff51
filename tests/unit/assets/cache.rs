use std::io::Cursor;
use std::sync::{Condvar, Mutex};

use super::*;
use crate::assets::registry::{AssetRecord, StaticAssetRegistry};

fn png_bytes() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

struct GatedSource {
    open: Mutex<bool>,
    cv: Condvar,
}

impl GatedSource {
    fn new(open: bool) -> Self {
        Self {
            open: Mutex::new(open),
            cv: Condvar::new(),
        }
    }

    fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }
}

impl AssetSource for GatedSource {
    fn fetch(&self, file_path: &str) -> SceneResult<Vec<u8>> {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cv.wait(open).unwrap();
        }
        if file_path.starts_with("broken") {
            return Err(SceneError::asset(format!("no bytes for {file_path}")));
        }
        Ok(png_bytes())
    }
}

fn cache_with(source: Arc<GatedSource>) -> AssetCache {
    let registry = StaticAssetRegistry::new([
        AssetRecord::new("ok", "ok.png"),
        AssetRecord::new("bad", "broken.png"),
    ]);
    AssetCache::new(Arc::new(registry), source, 16.0, Some(2)).unwrap()
}

const WAIT: Duration = Duration::from_secs(10);

#[test]
fn unknown_id_is_missing_and_never_fetched() {
    let mut cache = cache_with(Arc::new(GatedSource::new(true)));
    assert!(matches!(cache.lookup("ghost"), AssetLookup::Missing));
    assert_eq!(cache.fetch_count("ghost"), 0);
    assert_eq!(cache.pending_count(), 0);
}

#[test]
fn concurrent_misses_share_one_fetch() {
    let source = Arc::new(GatedSource::new(false));
    let mut cache = cache_with(Arc::clone(&source));

    assert!(matches!(cache.lookup("ok"), AssetLookup::Pending));
    assert!(matches!(cache.lookup("ok"), AssetLookup::Pending));
    assert_eq!(cache.fetch_count("ok"), 1);
    assert_eq!(cache.pending_count(), 1);

    source.open();
    assert!(cache.wait_idle(WAIT));
    match cache.lookup("ok") {
        AssetLookup::Ready(img) => assert_eq!((img.width, img.height), (16, 16)),
        other => panic!("expected ready, got {other:?}"),
    }
    assert_eq!(cache.fetch_count("ok"), 1);
    assert_eq!(cache.ready_count(), 1);
}

#[test]
fn failures_stick_until_retry() {
    let mut cache = cache_with(Arc::new(GatedSource::new(true)));
    assert!(matches!(cache.lookup("bad"), AssetLookup::Pending));
    assert!(cache.wait_idle(WAIT));

    assert!(matches!(cache.lookup("bad"), AssetLookup::Failed));
    assert!(cache.failure("bad").unwrap().contains("no bytes"));
    assert_eq!(cache.fetch_count("bad"), 1);

    assert!(!cache.retry("ok"));
    assert!(cache.retry("bad"));
    assert!(matches!(cache.lookup("bad"), AssetLookup::Pending));
    assert_eq!(cache.fetch_count("bad"), 2);
    assert!(cache.wait_idle(WAIT));
}

#[test]
fn results_from_before_clear_are_discarded() {
    let source = Arc::new(GatedSource::new(false));
    let mut cache = cache_with(Arc::clone(&source));

    assert!(matches!(cache.lookup("ok"), AssetLookup::Pending));
    cache.clear();
    assert_eq!(cache.pending_count(), 0);
    assert!(cache.wait_idle(Duration::ZERO));

    assert!(matches!(cache.lookup("ok"), AssetLookup::Pending));
    assert_eq!(cache.fetch_count("ok"), 2);
    source.open();
    assert!(cache.wait_idle(WAIT));
    assert_eq!(cache.pending_count(), 0);
    assert!(matches!(cache.lookup("ok"), AssetLookup::Ready(_)));
}

#[test]
fn zero_threads_is_rejected() {
    let registry = Arc::new(StaticAssetRegistry::default());
    let source = Arc::new(GatedSource::new(true));
    assert!(AssetCache::new(registry, source, 16.0, Some(0)).is_err());
}

struct PanickingSource;

impl AssetSource for PanickingSource {
    fn fetch(&self, file_path: &str) -> SceneResult<Vec<u8>> {
        panic!("decoder blew up on {file_path}");
    }
}

#[test]
fn panicking_load_fails_the_slot() {
    let registry = StaticAssetRegistry::new([AssetRecord::new("boom", "boom.png")]);
    let mut cache =
        AssetCache::new(Arc::new(registry), Arc::new(PanickingSource), 16.0, Some(1)).unwrap();

    assert!(matches!(cache.lookup("boom"), AssetLookup::Pending));
    assert!(cache.wait_idle(WAIT));
    assert_eq!(cache.pending_count(), 0);
    assert!(matches!(cache.lookup("boom"), AssetLookup::Failed));
    let msg = cache.failure("boom").unwrap();
    assert!(msg.contains("panicked"), "{msg}");
    assert!(msg.contains("decoder blew up on boom.png"), "{msg}");

    // The pool survives and serves the retry.
    assert!(cache.retry("boom"));
    assert!(matches!(cache.lookup("boom"), AssetLookup::Pending));
    assert!(cache.wait_idle(WAIT));
    assert_eq!(cache.fetch_count("boom"), 2);
}

#[test]
fn fetch_counts_outlive_clear() {
    let mut cache = cache_with(Arc::new(GatedSource::new(true)));
    assert!(matches!(cache.lookup("ok"), AssetLookup::Pending));
    assert!(cache.wait_idle(WAIT));
    cache.clear();
    assert_eq!(cache.ready_count(), 0);
    assert_eq!(cache.fetch_count("ok"), 1);
}
