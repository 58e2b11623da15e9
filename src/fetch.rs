//! Cached fetch wrapper around a [`ContentStore`].
//!
//! [`CachedFetcher::fetch`] executes exactly one logical fetch per call:
//! either a cache hit or one live request to the store, depending on the
//! [`CachePolicy`] in [`FetchOptions`]. The wrapper adds no retries and no
//! error suppression; store errors come back to the caller unchanged and
//! nothing is cached for a failed request.
//!
//! Progress is reported as [`FetchEvent`]s on an optional channel, the same
//! way the CLI reports every other stage. The library itself never prints.

use crate::cache::{
    CacheEntry, CachePolicy, CacheStats, Clock, ResponseCache, SystemClock, cache_key,
};
use crate::store::{ContentStore, QueryRequest, StoreError};
use serde_json::Value;
use std::sync::mpsc::Sender;
use std::sync::{Mutex, PoisonError};

/// Default TTL for full-cache entries: one hour.
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Per-call fetch options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub policy: CachePolicy,
    /// Tags stored with the cached response, for targeted invalidation.
    pub tags: Vec<String>,
    /// Human-readable name of the request, used in progress output.
    pub label: Option<String>,
}

impl FetchOptions {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn display_label(&self) -> String {
        self.label
            .clone()
            .or_else(|| self.tags.first().cloned())
            .unwrap_or_else(|| "query".to_string())
    }
}

/// Progress events emitted while fetching content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    /// Served from cache without contacting the store.
    CacheHit { label: String },
    /// No fresh entry; a live fetch follows.
    CacheMiss { label: String },
    /// `no-store` request; the cache was not consulted.
    Bypass { label: String },
    /// A live response was cached.
    Stored { label: String, ttl_secs: u64 },
    /// Entries were dropped for a tag.
    Invalidated { tag: String, removed: usize },
    /// A page used hardcoded copy instead of CMS content.
    FallbackUsed { label: String, reason: String },
}

/// A content store with a response cache in front of it.
///
/// Safe to share across threads: the cache and stats are internally locked
/// and no lock is held while the store is queried.
pub struct CachedFetcher<S, C = SystemClock> {
    store: S,
    cache: ResponseCache,
    clock: C,
    default_ttl: u64,
    stats: Mutex<CacheStats>,
    events: Option<Sender<FetchEvent>>,
}

impl<S: ContentStore> CachedFetcher<S, SystemClock> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: ContentStore, C: Clock> CachedFetcher<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self {
            store,
            cache: ResponseCache::empty(),
            clock,
            default_ttl: DEFAULT_TTL_SECS,
            stats: Mutex::new(CacheStats::default()),
            events: None,
        }
    }

    /// Start from a previously loaded cache.
    pub fn cache(mut self, cache: ResponseCache) -> Self {
        self.cache = cache;
        self
    }

    /// TTL used by `FullCache { ttl: None }`.
    pub fn default_ttl(mut self, secs: u64) -> Self {
        self.default_ttl = secs;
        self
    }

    /// Report progress on `tx`.
    pub fn events(mut self, tx: Sender<FetchEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn response_cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn emit(&self, event: FetchEvent) {
        if let Some(tx) = &self.events {
            // Receiver gone means nobody is listening; not an error
            let _ = tx.send(event);
        }
    }

    fn record(&self, f: impl FnOnce(&mut CacheStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut stats);
    }

    /// Run `request` under `options.policy`.
    pub fn fetch(
        &self,
        request: &QueryRequest,
        options: &FetchOptions,
    ) -> Result<Value, StoreError> {
        let label = options.display_label();
        let Some(ttl) = options.policy.ttl(self.default_ttl) else {
            self.record(CacheStats::bypass);
            self.emit(FetchEvent::Bypass { label });
            return self.store.query(request);
        };

        let key = cache_key(request);
        if let Some(value) = self.cache.get_fresh(&key, self.clock.now(), ttl) {
            self.record(CacheStats::hit);
            self.emit(FetchEvent::CacheHit { label });
            return Ok(value);
        }

        self.record(CacheStats::miss);
        self.emit(FetchEvent::CacheMiss {
            label: label.clone(),
        });
        let value = self.store.query(request)?;
        self.cache.insert(
            key,
            CacheEntry {
                value: value.clone(),
                tags: options.tags.clone(),
                stored_at: self.clock.now(),
                ttl_secs: ttl,
            },
        );
        self.emit(FetchEvent::Stored {
            label,
            ttl_secs: ttl,
        });
        Ok(value)
    }

    /// Drop every cached response tagged with `tag`.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        let removed = self.cache.invalidate_tag(tag);
        self.emit(FetchEvent::Invalidated {
            tag: tag.to_string(),
            removed,
        });
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ManualClock, StubStore};
    use serde_json::json;
    use std::sync::mpsc;

    fn home_query() -> QueryRequest {
        QueryRequest::new("*[_type == \"home\"][0]").param("locale", "de")
    }

    fn full_cache() -> FetchOptions {
        FetchOptions::default().tag("home")
    }

    // =========================================================================
    // full-cache
    // =========================================================================

    #[test]
    fn full_cache_second_call_is_served_from_cache() {
        let store = StubStore::returning(json!({"heroTitle": "Wir bauen"}));
        let fetcher = CachedFetcher::with_clock(&store, ManualClock::at(1_000));

        let first = fetcher.fetch(&home_query(), &full_cache()).unwrap();
        let second = fetcher.fetch(&home_query(), &full_cache()).unwrap();

        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
        assert_eq!(store.calls(), 1);
        assert_eq!(
            fetcher.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                bypasses: 0
            }
        );
    }

    #[test]
    fn full_cache_refetches_after_default_ttl() {
        let store = StubStore::returning(json!(1));
        let clock = ManualClock::at(0);
        let fetcher = CachedFetcher::with_clock(&store, &clock);

        fetcher.fetch(&home_query(), &full_cache()).unwrap();
        clock.advance(DEFAULT_TTL_SECS - 1);
        fetcher.fetch(&home_query(), &full_cache()).unwrap();
        assert_eq!(store.calls(), 1);

        clock.advance(1);
        fetcher.fetch(&home_query(), &full_cache()).unwrap();
        assert_eq!(store.calls(), 2);
    }

    #[test]
    fn configured_default_ttl_applies() {
        let store = StubStore::returning(json!(1));
        let clock = ManualClock::at(0);
        let fetcher = CachedFetcher::with_clock(&store, &clock).default_ttl(10);

        fetcher.fetch(&home_query(), &full_cache()).unwrap();
        clock.advance(10);
        fetcher.fetch(&home_query(), &full_cache()).unwrap();
        assert_eq!(store.calls(), 2);
    }

    #[test]
    fn different_params_are_cached_separately() {
        let store = StubStore::returning(json!(1));
        let fetcher = CachedFetcher::with_clock(&store, ManualClock::at(0));
        let en = QueryRequest::new("*[_type == \"home\"][0]").param("locale", "en");

        fetcher.fetch(&home_query(), &full_cache()).unwrap();
        fetcher.fetch(&en, &full_cache()).unwrap();
        assert_eq!(store.calls(), 2);
    }

    #[test]
    fn tag_invalidation_forces_refetch() {
        let store = StubStore::returning(json!(1));
        let fetcher = CachedFetcher::with_clock(&store, ManualClock::at(0));

        fetcher.fetch(&home_query(), &full_cache()).unwrap();
        assert_eq!(fetcher.invalidate_tag("home"), 1);
        fetcher.fetch(&home_query(), &full_cache()).unwrap();
        assert_eq!(store.calls(), 2);
    }

    // =========================================================================
    // revalidate / no-store
    // =========================================================================

    #[test]
    fn revalidate_uses_its_own_ttl() {
        let store = StubStore::returning(json!(1));
        let clock = ManualClock::at(0);
        let fetcher = CachedFetcher::with_clock(&store, &clock);
        let opts = FetchOptions::new(CachePolicy::Revalidate(60));

        fetcher.fetch(&home_query(), &opts).unwrap();
        clock.advance(59);
        fetcher.fetch(&home_query(), &opts).unwrap();
        assert_eq!(store.calls(), 1);
        clock.advance(1);
        fetcher.fetch(&home_query(), &opts).unwrap();
        assert_eq!(store.calls(), 2);
    }

    #[test]
    fn no_store_fetches_every_time() {
        let store = StubStore::returning(json!(1));
        let fetcher = CachedFetcher::with_clock(&store, ManualClock::at(0));
        let opts = FetchOptions::new(CachePolicy::NoStore);

        // A warm cache entry must not be used either
        fetcher.fetch(&home_query(), &full_cache()).unwrap();
        for _ in 0..3 {
            fetcher.fetch(&home_query(), &opts).unwrap();
        }
        assert_eq!(store.calls(), 4);
        assert_eq!(fetcher.stats().bypasses, 3);
    }

    #[test]
    fn no_store_does_not_write_cache() {
        let store = StubStore::returning(json!(1));
        let fetcher = CachedFetcher::with_clock(&store, ManualClock::at(0));
        fetcher
            .fetch(&home_query(), &FetchOptions::new(CachePolicy::NoStore))
            .unwrap();
        assert!(fetcher.response_cache().is_empty());
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn store_error_propagates_and_is_not_cached() {
        let store = StubStore::failing("connection reset");
        let fetcher = CachedFetcher::with_clock(&store, ManualClock::at(0));

        let err = fetcher.fetch(&home_query(), &full_cache()).unwrap_err();
        assert!(matches!(err, StoreError::Transport(ref m) if m == "connection reset"));
        assert!(fetcher.response_cache().is_empty());

        // No retry happened
        assert_eq!(store.calls(), 1);
    }

    // =========================================================================
    // Events
    // =========================================================================

    #[test]
    fn events_report_miss_store_hit() {
        let (tx, rx) = mpsc::channel();
        let store = StubStore::returning(json!(1));
        let fetcher = CachedFetcher::with_clock(&store, ManualClock::at(0)).events(tx);
        let opts = full_cache().label("home/de");

        fetcher.fetch(&home_query(), &opts).unwrap();
        fetcher.fetch(&home_query(), &opts).unwrap();
        drop(fetcher);

        let events: Vec<FetchEvent> = rx.iter().collect();
        assert_eq!(
            events,
            vec![
                FetchEvent::CacheMiss {
                    label: "home/de".into()
                },
                FetchEvent::Stored {
                    label: "home/de".into(),
                    ttl_secs: DEFAULT_TTL_SECS
                },
                FetchEvent::CacheHit {
                    label: "home/de".into()
                },
            ]
        );
    }

    #[test]
    fn label_defaults_to_first_tag() {
        assert_eq!(full_cache().display_label(), "home");
        assert_eq!(FetchOptions::default().display_label(), "query");
    }

    #[test]
    fn concurrent_fetches_share_one_cache() {
        use rayon::prelude::*;
        let store = StubStore::returning(json!({"ok": true}));
        let fetcher = CachedFetcher::with_clock(&store, ManualClock::at(0));
        fetcher.fetch(&home_query(), &full_cache()).unwrap();

        let results: Vec<Value> = (0..16)
            .into_par_iter()
            .map(|_| fetcher.fetch(&home_query(), &full_cache()).unwrap())
            .collect();
        assert!(results.iter().all(|v| *v == json!({"ok": true})));
        assert_eq!(store.calls(), 1);
        assert_eq!(fetcher.stats().hits, 16);
    }
}
