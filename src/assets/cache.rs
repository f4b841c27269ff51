use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use crate::assets::decode::{AssetImage, decode_asset};
use crate::assets::registry::AssetRegistry;
use crate::assets::source::AssetSource;
use crate::foundation::error::{SceneError, SceneResult};

/// Result of looking an asset up in the [`AssetCache`].
#[derive(Clone, Debug)]
pub enum AssetLookup {
    /// Content is decoded and ready to draw.
    Ready(Arc<AssetImage>),
    /// A load is in flight (or was just started).
    Pending,
    /// The last load failed; stays failed until [`AssetCache::retry`].
    Failed,
    /// The registry has no entry for this id.
    Missing,
}

#[derive(Clone, Debug)]
enum Slot {
    Pending,
    Ready(Arc<AssetImage>),
    Failed(String),
}

struct LoadDone {
    generation: u64,
    asset_id: String,
    result: SceneResult<AssetImage>,
}

/// Asset-id keyed cache of decoded content with asynchronous, de-duplicated loading.
///
/// A miss starts exactly one load per id on a dedicated thread pool. Finished loads wait in a
/// channel until [`AssetCache::drain`] (called at the start of each render) applies them, so a
/// fill never changes a frame that was already produced. [`AssetCache::clear`] bumps a generation
/// counter, which makes late results from earlier loads be discarded.
pub struct AssetCache {
    registry: Arc<dyn AssetRegistry>,
    source: Arc<dyn AssetSource>,
    pool: rayon::ThreadPool,
    tx: mpsc::Sender<LoadDone>,
    rx: mpsc::Receiver<LoadDone>,
    slots: HashMap<String, Slot>,
    // Lifetime diagnostics. Survives `clear`; keys are bounded by the registry's ids.
    fetch_counts: HashMap<String, u64>,
    generation: u64,
    pending: usize,
    logical_unit: f64,
}

impl AssetCache {
    /// Create an empty cache. `threads` of `None` uses rayon's default pool size.
    pub fn new(
        registry: Arc<dyn AssetRegistry>,
        source: Arc<dyn AssetSource>,
        logical_unit: f64,
        threads: Option<usize>,
    ) -> SceneResult<Self> {
        let pool = build_thread_pool(threads)?;
        let (tx, rx) = mpsc::channel();
        Ok(Self {
            registry,
            source,
            pool,
            tx,
            rx,
            slots: HashMap::new(),
            fetch_counts: HashMap::new(),
            generation: 0,
            pending: 0,
            logical_unit,
        })
    }

    /// Registry used to resolve ids.
    pub fn registry(&self) -> &dyn AssetRegistry {
        self.registry.as_ref()
    }

    /// Resolve `asset_id`, starting a background load on first miss.
    pub fn lookup(&mut self, asset_id: &str) -> AssetLookup {
        let Some(record) = self.registry.get_asset_by_id(asset_id) else {
            return AssetLookup::Missing;
        };

        match self.slots.get(asset_id) {
            Some(Slot::Ready(img)) => return AssetLookup::Ready(Arc::clone(img)),
            Some(Slot::Pending) => return AssetLookup::Pending,
            Some(Slot::Failed(_)) => return AssetLookup::Failed,
            None => {}
        }

        let file_path = record.file_path.clone();
        self.start_load(asset_id.to_string(), file_path);
        AssetLookup::Pending
    }

    fn start_load(&mut self, asset_id: String, file_path: String) {
        tracing::debug!(asset_id = %asset_id, file_path = %file_path, "asset load started");
        self.slots.insert(asset_id.clone(), Slot::Pending);
        *self.fetch_counts.entry(asset_id.clone()).or_default() += 1;
        self.pending += 1;

        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let generation = self.generation;
        let unit = self.logical_unit;
        self.pool.spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                source
                    .fetch(&file_path)
                    .and_then(|bytes| decode_asset(&file_path, &bytes, unit))
            }))
            .unwrap_or_else(|payload| Err(panic_error(&file_path, &*payload)));
            // Send fails only once the cache itself is gone.
            let _ = tx.send(LoadDone {
                generation,
                asset_id,
                result,
            });
        });
    }

    /// Apply every finished load without blocking. Returns how many slots changed.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(done) = self.rx.try_recv() {
            applied += usize::from(self.apply(done));
        }
        applied
    }

    fn apply(&mut self, done: LoadDone) -> bool {
        if done.generation != self.generation {
            tracing::trace!(asset_id = %done.asset_id, "dropping stale asset load");
            return false;
        }
        self.pending = self.pending.saturating_sub(1);
        let slot = match done.result {
            Ok(img) => Slot::Ready(Arc::new(img)),
            Err(err) => {
                tracing::warn!(asset_id = %done.asset_id, error = %err, "asset load failed");
                Slot::Failed(err.to_string())
            }
        };
        self.slots.insert(done.asset_id, slot);
        true
    }

    /// Block until no load is in flight or `timeout` elapses. Returns `true` when idle.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.pending > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            match self.rx.recv_timeout(deadline - now) {
                Ok(done) => {
                    self.apply(done);
                }
                Err(_) => return false,
            }
        }
        true
    }

    /// Forget a failed load so the next lookup fetches again. Returns `false` if it was not failed.
    pub fn retry(&mut self, asset_id: &str) -> bool {
        if matches!(self.slots.get(asset_id), Some(Slot::Failed(_))) {
            self.slots.remove(asset_id);
            return true;
        }
        false
    }

    /// Error message of a failed load.
    pub fn failure(&self, asset_id: &str) -> Option<&str> {
        match self.slots.get(asset_id) {
            Some(Slot::Failed(msg)) => Some(msg),
            _ => None,
        }
    }

    /// Drop all content and detach in-flight loads. Fetch counts are kept.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.slots.clear();
        self.pending = 0;
    }

    /// How many loads were started for `asset_id` over the cache's lifetime, across
    /// [`AssetCache::clear`] calls.
    pub fn fetch_count(&self, asset_id: &str) -> u64 {
        self.fetch_counts.get(asset_id).copied().unwrap_or(0)
    }

    /// Loads in flight for the current generation.
    pub fn pending_count(&self) -> usize {
        self.pending
    }

    /// Number of ids with decoded content.
    pub fn ready_count(&self) -> usize {
        self.slots
            .values()
            .filter(|s| matches!(s, Slot::Ready(_)))
            .count()
    }
}

fn panic_error(file_path: &str, payload: &(dyn Any + Send)) -> SceneError {
    let msg = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    SceneError::asset(format!("asset load '{file_path}' panicked: {msg}"))
}

fn build_thread_pool(threads: Option<usize>) -> SceneResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(SceneError::validation(
            "asset loader 'threads' must be >= 1 when set",
        ));
    }
    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("errl-assets-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| SceneError::asset(format!("failed to build asset loader pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/cache.rs"]
mod tests;
