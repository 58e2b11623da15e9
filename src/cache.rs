//! Response cache for content queries.
//!
//! Every page load runs one or more CMS queries. Most copy changes rarely, so
//! responses are cached per `(query, params)` and served until their TTL
//! elapses or an editor publish invalidates one of their tags.
//!
//! # Design
//!
//! ## Cache keys
//!
//! The cache is keyed by a SHA-256 over the length-prefixed query text and
//! the parameters encoded as one JSON object. Parameters live in a `BTreeMap`, so two requests with
//! the same parameters in a different insertion order share an entry.
//!
//! ## Policies
//!
//! | Policy | Reads cache | Writes cache | TTL |
//! |--------|-------------|--------------|-----|
//! | `FullCache { ttl: None }` | yes | yes | configured default (1 hour) |
//! | `FullCache { ttl: Some(n) }` | yes | yes | `n` seconds |
//! | `Revalidate(n)` | yes | yes | `n` seconds |
//! | `NoStore` | no | no | - |
//!
//! An entry is fresh while its age is below both the TTL it was stored with
//! and the TTL of the request reading it.
//!
//! ## Tags
//!
//! Entries carry the tags of the request that stored them (`home`,
//! `property`, ...). [`ResponseCache::invalidate_tag`] drops every entry with
//! a given tag regardless of age.
//!
//! ## Concurrency
//!
//! Entries sit behind a single mutex that is never held across a fetch.
//! Two concurrent misses on one key both fetch and the later write wins;
//! readers always see a whole entry or none.
//!
//! ## Storage
//!
//! The CLI persists the cache as `<cache_dir>/.cache-manifest.json` so
//! consecutive runs share it. A missing, corrupt or wrong-version file loads
//! as an empty cache.

use crate::store::QueryRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Name of the persisted cache file within the cache directory.
const MANIFEST_FILENAME: &str = ".cache-manifest.json";

/// Version of the persisted format. Bump to invalidate all existing caches.
const MANIFEST_VERSION: u32 = 2;

/// How a single fetch interacts with the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Cache until the TTL elapses or a tag is invalidated. `None` uses the
    /// configured default TTL.
    FullCache { ttl: Option<u64> },
    /// Always fetch fresh; never read or write the cache.
    NoStore,
    /// Cache for the given number of seconds.
    Revalidate(u64),
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::FullCache { ttl: None }
    }
}

impl CachePolicy {
    /// Effective TTL in seconds, or `None` when the cache is bypassed.
    pub fn ttl(&self, default_ttl: u64) -> Option<u64> {
        match self {
            Self::FullCache { ttl } => Some(ttl.unwrap_or(default_ttl)),
            Self::NoStore => None,
            Self::Revalidate(secs) => Some(*secs),
        }
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullCache { ttl: None } => write!(f, "full-cache"),
            Self::FullCache { ttl: Some(secs) } => write!(f, "full-cache ({secs}s)"),
            Self::NoStore => write!(f, "no-store"),
            Self::Revalidate(secs) => write!(f, "revalidate ({secs}s)"),
        }
    }
}

/// Source of "now", in seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> u64 {
        (**self).now()
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// SHA-256 cache key for a request, returned as a hex string.
///
/// Hashes the length-prefixed query text followed by the params as one
/// canonical JSON object, so no query or parameter name can alias another
/// request.
pub fn cache_key(request: &QueryRequest) -> String {
    let params: serde_json::Map<String, Value> = request
        .params
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    let mut hasher = Sha256::new();
    hasher.update((request.query.len() as u64).to_le_bytes());
    hasher.update(request.query.as_bytes());
    hasher.update(Value::Object(params).to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// One cached response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Unix seconds at which the response was stored.
    pub stored_at: u64,
    pub ttl_secs: u64,
}

impl CacheEntry {
    fn is_fresh(&self, now: u64, max_age: u64) -> bool {
        now.saturating_sub(self.stored_at) < self.ttl_secs.min(max_age)
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: HashMap<String, CacheEntry>,
}

/// Thread-safe map of cache key → response.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    /// Create an empty cache.
    pub fn empty() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // Entries are replaced whole, so a poisoned map is still consistent
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cached value for `key` if it is younger than `max_age` seconds
    /// and its own TTL.
    pub fn get_fresh(&self, key: &str, now: u64, max_age: u64) -> Option<Value> {
        self.lock()
            .get(key)
            .filter(|entry| entry.is_fresh(now, max_age))
            .map(|entry| entry.value.clone())
    }

    /// Store a response, replacing any previous entry for the key.
    pub fn insert(&self, key: String, entry: CacheEntry) {
        self.lock().insert(key, entry);
    }

    /// Drop every entry carrying `tag`. Returns the number removed.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.tags.iter().any(|t| t == tag));
        before - entries.len()
    }

    /// Drop entries whose own TTL has elapsed. Returns the number removed.
    pub fn purge_expired(&self, now: u64) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now, u64::MAX));
        before - entries.len()
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Load from the cache directory. Returns an empty cache if the file
    /// doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(cache_dir: &Path) -> Self {
        let path = cache_dir.join(MANIFEST_FILENAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let snapshot: Snapshot = match serde_json::from_str(&content) {
            Ok(s) => s,
            Err(_) => return Self::empty(),
        };
        if snapshot.version != MANIFEST_VERSION {
            return Self::empty();
        }
        Self {
            entries: Mutex::new(snapshot.entries),
        }
    }

    /// Save to the cache directory, creating it if needed.
    pub fn save(&self, cache_dir: &Path) -> io::Result<()> {
        std::fs::create_dir_all(cache_dir)?;
        let snapshot = Snapshot {
            version: MANIFEST_VERSION,
            entries: self.lock().clone(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(manifest_path(cache_dir), json)
    }
}

/// Resolve the persisted cache path for a cache directory.
pub fn manifest_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(MANIFEST_FILENAME)
}

/// Summary of cache behaviour over a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
    pub bypasses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn bypass(&mut self) {
        self.bypasses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses + self.bypasses
    }

    /// Number of requests that reached the content store.
    pub fn live_fetches(&self) -> u32 {
        self.misses + self.bypasses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bypasses > 0 {
            write!(
                f,
                "{} cached, {} fetched, {} uncached ({} total)",
                self.hits,
                self.misses,
                self.bypasses,
                self.total()
            )
        } else if self.hits > 0 {
            write!(
                f,
                "{} cached, {} fetched ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} fetched", self.misses)
        }
    }
}
