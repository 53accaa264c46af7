//! Keyed quote and chart stores with an optional on-disk snapshot.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::codec::{decode, encode, WireMessage};
use crate::metrics::{Counter, MetricsRegistry, Timing};
use crate::{Chart, Interval, Quote, StockError, Symbol};

pub const CHART_SNAPSHOT_FILE: &str = "iex-chart-cache.bin";
pub const QUOTE_SNAPSHOT_FILE: &str = "iex-quote-cache.bin";

/// How a cache participates in a planner call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Never read or write; every request goes upstream.
    Bypass,
    /// Read and write the in-memory map only.
    Memory,
    /// Like `Memory`, plus load on startup and save after each planner success. (Default)
    Persistent,
}

impl Default for CacheMode {
    fn default() -> Self {
        Self::Persistent
    }
}

impl CacheMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bypass => "bypass",
            Self::Memory => "memory",
            Self::Persistent => "persistent",
        }
    }
}

impl std::str::FromStr for CacheMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bypass" | "off" => Ok(Self::Bypass),
            "memory" => Ok(Self::Memory),
            "persistent" | "disk" => Ok(Self::Persistent),
            other => Err(format!(
                "unknown cache mode '{other}' (expected bypass, memory or persistent)"
            )),
        }
    }
}

/// Key of a cache entry. Every key names exactly one symbol.
pub trait CacheKey: Debug + Clone + Ord + Send + Sync + 'static {
    fn symbol(&self) -> &Symbol;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChartCacheKey {
    pub symbol: Symbol,
    pub interval: Interval,
}

impl CacheKey for ChartCacheKey {
    fn symbol(&self) -> &Symbol {
        &self.symbol
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuoteCacheKey {
    pub symbol: Symbol,
}

impl CacheKey for QuoteCacheKey {
    fn symbol(&self) -> &Symbol {
        &self.symbol
    }
}

/// Stored value plus the instant it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheValue<V> {
    pub value: V,
    pub last_update_time: DateTime<Utc>,
}

/// Serializable image of a cache, ordered by key.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<K, V> {
    pub entries: Vec<(K, CacheValue<V>)>,
}

pub type ChartCache = Cache<ChartCacheKey, Chart>;
pub type QuoteCache = Cache<QuoteCacheKey, Quote>;

#[derive(Debug)]
struct CacheMetrics {
    gets: Arc<Counter>,
    hits: Arc<Counter>,
    misses: Arc<Counter>,
    puts: Arc<Counter>,
    load_time: Arc<Timing>,
    save_time: Arc<Timing>,
}

impl CacheMetrics {
    fn register(prefix: &str, registry: &MetricsRegistry) -> Self {
        Self {
            gets: registry.counter(&format!("{prefix}-cache-gets")),
            hits: registry.counter(&format!("{prefix}-cache-hits")),
            misses: registry.counter(&format!("{prefix}-cache-misses")),
            puts: registry.counter(&format!("{prefix}-cache-puts")),
            load_time: registry.timing(&format!("{prefix}-cache-load-time")),
            save_time: registry.timing(&format!("{prefix}-cache-save-time")),
        }
    }
}

/// Thread-safe keyed store.
///
/// Values cross the boundary by clone in both directions, so no caller ever
/// holds a reference into the locked map.
#[derive(Debug)]
pub struct Cache<K, V> {
    prefix: &'static str,
    mode: CacheMode,
    path: Option<PathBuf>,
    clock: Clock,
    entries: Mutex<BTreeMap<K, CacheValue<V>>>,
    metrics: CacheMetrics,
}

impl<K, V> Cache<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
    Snapshot<K, V>: WireMessage,
{
    /// Empty cache. `path` is only used in `Persistent` mode.
    pub fn new(
        prefix: &'static str,
        mode: CacheMode,
        path: Option<PathBuf>,
        clock: Clock,
        registry: &MetricsRegistry,
    ) -> Self {
        Self {
            prefix,
            mode,
            path: if mode == CacheMode::Persistent { path } else { None },
            clock,
            entries: Mutex::new(BTreeMap::new()),
            metrics: CacheMetrics::register(prefix, registry),
        }
    }

    /// Cache populated from its snapshot, if one exists.
    pub fn open(
        prefix: &'static str,
        mode: CacheMode,
        path: Option<PathBuf>,
        clock: Clock,
        registry: &MetricsRegistry,
    ) -> Result<Self, StockError> {
        let cache = Self::new(prefix, mode, path, clock, registry);
        cache.load()?;
        Ok(cache)
    }

    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<K, CacheValue<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &K) -> Option<CacheValue<V>> {
        self.metrics.gets.incr();
        let found = if self.mode == CacheMode::Bypass {
            None
        } else {
            self.lock().get(key).cloned()
        };
        if found.is_some() {
            self.metrics.hits.incr();
        } else {
            self.metrics.misses.incr();
        }
        found
    }

    /// Store a copy of `value`, stamped with the clock's current time.
    pub fn put(&self, key: K, value: &V) {
        let now = self.clock.now();
        self.put_at(key, value, now);
    }

    /// Store a copy of `value`, stamped with `at`.
    pub fn put_at(&self, key: K, value: &V, at: DateTime<Utc>) {
        self.put_all([(key, value.clone())], at);
    }

    /// Store several values under one lock acquisition.
    pub fn put_all(&self, values: impl IntoIterator<Item = (K, V)>, at: DateTime<Utc>) {
        if self.mode == CacheMode::Bypass {
            return;
        }
        let mut entries = self.lock();
        for (key, value) in values {
            self.metrics.puts.incr();
            debug!(cache = self.prefix, symbol = %key.symbol(), "cache put");
            entries.insert(
                key,
                CacheValue {
                    value,
                    last_update_time: at,
                },
            );
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the in-memory map with the snapshot's contents.
    ///
    /// A missing snapshot yields an empty cache; an unreadable or corrupt one
    /// fails with `CacheIo` and leaves the map untouched.
    pub fn load(&self) -> Result<usize, StockError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(0);
        };

        let started = Instant::now();
        let mut entries = self.lock();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == IoErrorKind::NotFound => {
                debug!(cache = self.prefix, path = %path.display(), "no snapshot on disk");
                entries.clear();
                self.metrics.load_time.record(started.elapsed());
                return Ok(0);
            }
            Err(error) => {
                return Err(StockError::cache_io(format!(
                    "failed to read {}: {error}",
                    path.display()
                )))
            }
        };

        let snapshot: Snapshot<K, V> = decode(&bytes).map_err(|error| {
            StockError::cache_io(format!(
                "corrupt snapshot {}: {}",
                path.display(),
                error.message()
            ))
        })?;
        *entries = snapshot.entries.into_iter().collect();
        let count = entries.len();
        self.metrics.load_time.record(started.elapsed());

        info!(cache = self.prefix, path = %path.display(), entries = count, "loaded cache snapshot");
        Ok(count)
    }

    /// Write the whole map to the snapshot file.
    ///
    /// The bytes go to a sibling temp file which is then renamed over the
    /// snapshot, all under the cache lock, so readers see either the old or
    /// the new image.
    pub fn save(&self) -> Result<(), StockError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        let started = Instant::now();
        let entries = self.lock();
        let snapshot = Snapshot {
            entries: entries
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        };
        let bytes = encode(&snapshot);

        if let Some(parent) = path.parent() {
            ensure_cache_dir(parent)?;
        }
        let staging = staging_path(path);
        fs::write(&staging, &bytes).map_err(|error| {
            StockError::cache_io(format!("failed to write {}: {error}", staging.display()))
        })?;
        fs::rename(&staging, path).map_err(|error| {
            let _ = fs::remove_file(&staging);
            StockError::cache_io(format!("failed to replace {}: {error}", path.display()))
        })?;
        drop(entries);
        self.metrics.save_time.record(started.elapsed());

        debug!(
            cache = self.prefix,
            path = %path.display(),
            bytes = bytes.len(),
            "saved cache snapshot"
        );
        Ok(())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Create `dir` and its parents with mode 0755 if missing.
pub fn ensure_cache_dir(dir: &Path) -> Result<(), StockError> {
    if dir.as_os_str().is_empty() || dir.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(dir).map_err(|error| {
        StockError::cache_io(format!(
            "failed to create cache directory {}: {error}",
            dir.display()
        ))
    })
}
