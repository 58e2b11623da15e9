//! # Groundwork
//!
//! Locale-aware content resolution for a construction company website. The
//! site's copy (home, services, contact, blog, properties) lives in a headless
//! CMS as per-locale maps; this crate turns a page request for a locale into
//! normalized records, with caching in front of the CMS and hardcoded copy
//! behind it.
//!
//! # Architecture: Three Layers
//!
//! ```text
//! 1. Resolve    field + locale      →  query expression   (locale → default fallback)
//! 2. Fetch      query + params      →  JSON               (cache policy, tags)
//! 3. Normalize  JSON + locale       →  page record        (legacy shapes, fallback copy)
//! ```
//!
//! Each layer is a plain function or a small struct that takes its settings
//! as arguments. There are no process-wide globals: the default locale and
//! the default TTL come from [`config::SiteConfig`] and are passed in.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`locale`] | Locale tags, supported set, negotiation of incoming tags |
//! | [`query`] | Field paths and `coalesce` expressions; post-fetch locale picking |
//! | [`planning`] | Legacy/current architecture-planning shapes → one canonical link |
//! | [`cache`] | Cache policies, keys, the in-memory response cache and its on-disk form |
//! | [`fetch`] | The cached fetch wrapper and its progress events |
//! | [`store`] | The content store trait and the CMS HTTP client |
//! | [`pages`] | Page queries and loaders with fallback copy |
//! | [`fallback`] | Hardcoded copy per locale |
//! | [`config`] | `groundwork.toml` loading, merging and validation |
//! | [`types`] | Normalized page records |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Fallback in the Query, Normalization in Rust
//!
//! Translatable text falls back inside the query (`coalesce(title.de,
//! title.en)`), so one round-trip returns the right string. The
//! architecture-planning attribute is the exception: it exists in two shapes
//! from before and after a schema migration, so it is fetched raw, decoded
//! once into [`planning::PlanningValue`] and resolved locally.
//!
//! ## Errors Stop at the Page
//!
//! [`fetch::CachedFetcher::fetch`] returns store errors unchanged and never
//! retries. [`pages::PageLoader`] is where failures turn into fallback copy,
//! because only the page knows what a sensible default looks like.

pub mod cache;
pub mod config;
pub mod fallback;
pub mod fetch;
pub mod locale;
pub mod output;
pub mod pages;
pub mod planning;
pub mod query;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
