//! Page records built on top of the resolution layer.
//!
//! Each loader builds one GROQ query for a locale, fetches it through the
//! [`CachedFetcher`] and turns the response into a normalized record from
//! [`types`](crate::types). Loaders never fail: when the store errors or
//! returns nothing usable, hardcoded copy from [`fallback`](crate::fallback)
//! is substituted and a [`FetchEvent::FallbackUsed`] event records why.
//! Fields the CMS leaves blank are filled from the same copy.
//!
//! ## Queries
//!
//! ```text
//! home        *[_type == "homePage"][0]{ heroTitle, heroSubtitle, intro, highlights }
//! services    *[_type == "service"] | order(orderRank asc){ slug, title, summary }
//! contact     *[_type == "contactPage"][0]{ heading, body, email, phone, address }
//! blog        *[_type == "post" && defined(slug.current)] | order(publishedAt desc)[0...20]{ ... }
//! properties  *[_type == "property" && defined(slug.current)] | order(title asc){ ... }
//! property    *[_type == "property" && slug.current == $slug][0]{ ... }
//! ```
//!
//! Localized text goes through
//! [`localized_text_field`](crate::query::localized_text_field), so the store
//! already applies the locale → default fallback for non-default locales,
//! including translations saved as empty strings. The architecture-planning
//! attribute is fetched raw and resolved locally by [`normalize_planning`],
//! because its two historical shapes cannot be reconciled inside the query.

use crate::cache::{CachePolicy, Clock};
use crate::fallback;
use crate::fetch::{CachedFetcher, FetchEvent, FetchOptions};
use crate::locale::{Locale, LocaleSettings};
use crate::planning::normalize_planning;
use crate::query::{
    FieldShape, Projected, QueryError, pick_localized, pick_localized_str, projection,
};
use crate::store::{ContentStore, QueryRequest, StoreError};
use crate::types::{BlogPost, ContactPage, ContentSource, HomePage, Loaded, Property, ServiceEntry};
use rayon::prelude::*;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Number of posts on the blog index.
const BLOG_PAGE_SIZE: usize = 20;

#[derive(Error, Debug)]
pub enum PageError {
    #[error("Query error: {0}")]
    Query(#[from] QueryError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// The site's content pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    Home,
    Services,
    Contact,
    Blog,
    Properties,
}

impl PageKind {
    pub const ALL: [PageKind; 5] = [
        PageKind::Home,
        PageKind::Services,
        PageKind::Contact,
        PageKind::Blog,
        PageKind::Properties,
    ];

    /// Cache tag attached to every response for this page.
    pub fn tag(&self) -> &'static str {
        match self {
            PageKind::Home => "home",
            PageKind::Services => "services",
            PageKind::Contact => "contact",
            PageKind::Blog => "blog",
            PageKind::Properties => "property",
        }
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// =============================================================================
// Queries
// =============================================================================

fn localized(path: &str, shape: FieldShape, alias: &str) -> Result<Projected, QueryError> {
    Projected::localized(path, shape)?.alias(alias)
}

fn text(path: &str, alias: &str) -> Result<Projected, QueryError> {
    Projected::text(path)?.alias(alias)
}

fn plain(path: &str, alias: &str) -> Result<Projected, QueryError> {
    Projected::plain(path)?.alias(alias)
}

pub fn home_query(locale: &Locale, settings: &LocaleSettings) -> Result<QueryRequest, QueryError> {
    let fields = [
        text("hero.title", "heroTitle")?,
        text("hero.subtitle", "heroSubtitle")?,
        text("intro", "intro")?,
        localized("highlights", FieldShape::Array, "highlights")?,
    ];
    Ok(QueryRequest::new(format!(
        "*[_type == \"homePage\"][0]{}",
        projection(&fields, locale, settings)
    )))
}

pub fn services_query(
    locale: &Locale,
    settings: &LocaleSettings,
) -> Result<QueryRequest, QueryError> {
    let fields = [
        plain("slug.current", "slug")?,
        text("title", "title")?,
        text("summary", "summary")?,
    ];
    Ok(QueryRequest::new(format!(
        "*[_type == \"service\"] | order(orderRank asc){}",
        projection(&fields, locale, settings)
    )))
}

pub fn contact_query(
    locale: &Locale,
    settings: &LocaleSettings,
) -> Result<QueryRequest, QueryError> {
    let fields = [
        text("heading", "heading")?,
        text("body", "body")?,
        plain("email", "email")?,
        plain("phone", "phone")?,
        text("address", "address")?,
    ];
    Ok(QueryRequest::new(format!(
        "*[_type == \"contactPage\"][0]{}",
        projection(&fields, locale, settings)
    )))
}

fn blog_fields() -> Result<[Projected; 4], QueryError> {
    Ok([
        plain("slug.current", "slug")?,
        text("title", "title")?,
        text("excerpt", "excerpt")?,
        plain("publishedAt", "publishedAt")?,
    ])
}

pub fn blog_query(locale: &Locale, settings: &LocaleSettings) -> Result<QueryRequest, QueryError> {
    Ok(QueryRequest::new(format!(
        "*[_type == \"post\" && defined(slug.current)] | order(publishedAt desc)[0...{}]{}",
        BLOG_PAGE_SIZE,
        projection(&blog_fields()?, locale, settings)
    )))
}

pub fn blog_post_query(
    slug: &str,
    locale: &Locale,
    settings: &LocaleSettings,
) -> Result<QueryRequest, QueryError> {
    Ok(QueryRequest::new(format!(
        "*[_type == \"post\" && slug.current == $slug][0]{}",
        projection(&blog_fields()?, locale, settings)
    ))
    .param("slug", slug))
}

fn property_fields() -> Result<[Projected; 6], QueryError> {
    Ok([
        plain("slug.current", "slug")?,
        text("title", "title")?,
        text("location", "location")?,
        text("description", "description")?,
        plain("gallery", "gallery")?,
        plain("architecturePlanning", "architecturePlanning")?,
    ])
}

pub fn properties_query(
    locale: &Locale,
    settings: &LocaleSettings,
) -> Result<QueryRequest, QueryError> {
    Ok(QueryRequest::new(format!(
        "*[_type == \"property\" && defined(slug.current)] | order(title asc){}",
        projection(&property_fields()?, locale, settings)
    )))
}

pub fn property_query(
    slug: &str,
    locale: &Locale,
    settings: &LocaleSettings,
) -> Result<QueryRequest, QueryError> {
    Ok(QueryRequest::new(format!(
        "*[_type == \"property\" && slug.current == $slug][0]{}",
        projection(&property_fields()?, locale, settings)
    ))
    .param("slug", slug))
}

// =============================================================================
// Response decoding
// =============================================================================

/// Reads fields out of one fetched document for a locale.
struct Doc<'a> {
    value: &'a Value,
    locale: &'a Locale,
    settings: &'a LocaleSettings,
}

impl Doc<'_> {
    fn text(&self, key: &str) -> Option<String> {
        self.value
            .get(key)
            .and_then(|v| pick_localized_str(v, self.locale, self.settings))
    }

    fn text_or(&self, key: &str, fallback: String) -> String {
        self.text(key).unwrap_or(fallback)
    }

    fn list(&self, key: &str) -> Vec<String> {
        let Some(Value::Array(items)) = self
            .value
            .get(key)
            .and_then(|v| pick_localized(v, self.locale, self.settings))
        else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| pick_localized_str(item, self.locale, self.settings))
            .collect()
    }
}

fn documents(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        _ => &[],
    }
}

fn decode_home(doc: &Doc<'_>) -> HomePage {
    let copy = fallback::home(doc.locale);
    HomePage {
        hero_title: doc.text_or("heroTitle", copy.hero_title),
        hero_subtitle: doc.text_or("heroSubtitle", copy.hero_subtitle),
        intro: doc.text_or("intro", copy.intro),
        highlights: doc.list("highlights"),
    }
}

fn decode_service(doc: &Doc<'_>) -> Option<ServiceEntry> {
    Some(ServiceEntry {
        slug: doc.text("slug")?,
        title: doc.text("title")?,
        summary: doc.text("summary").unwrap_or_default(),
    })
}

fn decode_contact(doc: &Doc<'_>) -> ContactPage {
    let copy = fallback::contact(doc.locale);
    ContactPage {
        heading: doc.text_or("heading", copy.heading),
        body: doc.text_or("body", copy.body),
        email: doc.text_or("email", copy.email),
        phone: doc.text_or("phone", copy.phone),
        address: doc.text_or("address", copy.address),
    }
}

fn decode_post(doc: &Doc<'_>) -> Option<BlogPost> {
    Some(BlogPost {
        slug: doc.text("slug")?,
        title: doc.text("title")?,
        excerpt: doc.text("excerpt").unwrap_or_default(),
        published_at: doc.text("publishedAt"),
    })
}

fn decode_property(doc: &Doc<'_>) -> Option<Property> {
    Some(Property {
        slug: doc.text("slug")?,
        title: doc.text("title")?,
        location: doc.text("location").unwrap_or_default(),
        description: doc.text("description").unwrap_or_default(),
        gallery: doc.list("gallery"),
        architecture_planning: normalize_planning(
            doc.value.get("architecturePlanning"),
            doc.locale,
            doc.settings,
        ),
    })
}

// =============================================================================
// Loader
// =============================================================================

/// Loads page records for any locale through a shared fetcher.
pub struct PageLoader<'a, S, C> {
    fetcher: &'a CachedFetcher<S, C>,
    settings: &'a LocaleSettings,
    policy: CachePolicy,
}

impl<'a, S: ContentStore, C: Clock> PageLoader<'a, S, C> {
    pub fn new(fetcher: &'a CachedFetcher<S, C>, settings: &'a LocaleSettings) -> Self {
        Self {
            fetcher,
            settings,
            policy: CachePolicy::default(),
        }
    }

    /// Cache policy for every page fetch.
    pub fn policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    fn fetch(
        &self,
        kind: PageKind,
        locale: &Locale,
        query: Result<QueryRequest, QueryError>,
    ) -> Result<Value, PageError> {
        let options = FetchOptions::new(self.policy)
            .tag(kind.tag())
            .tag(format!("locale:{locale}"))
            .label(format!("{kind}/{locale}"));
        Ok(self.fetcher.fetch(&query?, &options)?)
    }

    fn doc<'v>(&'v self, value: &'v Value, locale: &'v Locale) -> Doc<'v> {
        Doc {
            value,
            locale,
            settings: self.settings,
        }
    }

    fn report_fallback(&self, kind: PageKind, locale: &Locale, reason: String) {
        self.fetcher.emit(FetchEvent::FallbackUsed {
            label: format!("{kind}/{locale}"),
            reason,
        });
    }

    fn fall_back<T>(
        &self,
        kind: PageKind,
        locale: &Locale,
        reason: String,
        record: T,
    ) -> Loaded<T> {
        self.report_fallback(kind, locale, reason);
        Loaded::fallback(record)
    }

    pub fn home(&self, locale: &Locale) -> Loaded<HomePage> {
        match self.fetch(PageKind::Home, locale, home_query(locale, self.settings)) {
            Ok(value) if value.is_object() => Loaded::cms(decode_home(&self.doc(&value, locale))),
            Ok(_) => self.fall_back(
                PageKind::Home,
                locale,
                "no home document".into(),
                fallback::home(locale),
            ),
            Err(e) => self.fall_back(PageKind::Home, locale, e.to_string(), fallback::home(locale)),
        }
    }

    pub fn services(&self, locale: &Locale) -> Loaded<Vec<ServiceEntry>> {
        let query = services_query(locale, self.settings);
        let value = match self.fetch(PageKind::Services, locale, query) {
            Ok(value) => value,
            Err(e) => {
                return self.fall_back(
                    PageKind::Services,
                    locale,
                    e.to_string(),
                    fallback::services(locale),
                );
            }
        };
        let services: Vec<ServiceEntry> = documents(&value)
            .iter()
            .filter_map(|v| decode_service(&self.doc(v, locale)))
            .collect();
        if services.is_empty() {
            return self.fall_back(
                PageKind::Services,
                locale,
                "no service documents".into(),
                fallback::services(locale),
            );
        }
        Loaded::cms(services)
    }

    pub fn contact(&self, locale: &Locale) -> Loaded<ContactPage> {
        match self.fetch(PageKind::Contact, locale, contact_query(locale, self.settings)) {
            Ok(value) if value.is_object() => {
                Loaded::cms(decode_contact(&self.doc(&value, locale)))
            }
            Ok(_) => self.fall_back(
                PageKind::Contact,
                locale,
                "no contact document".into(),
                fallback::contact(locale),
            ),
            Err(e) => self.fall_back(
                PageKind::Contact,
                locale,
                e.to_string(),
                fallback::contact(locale),
            ),
        }
    }

    /// Latest posts. An empty list is a valid CMS answer.
    pub fn blog(&self, locale: &Locale) -> Loaded<Vec<BlogPost>> {
        match self.fetch(PageKind::Blog, locale, blog_query(locale, self.settings)) {
            Ok(value) => Loaded::cms(
                documents(&value)
                    .iter()
                    .filter_map(|v| decode_post(&self.doc(v, locale)))
                    .collect(),
            ),
            Err(e) => self.fall_back(PageKind::Blog, locale, e.to_string(), Vec::new()),
        }
    }

    /// A single post, or `None` when it does not exist or cannot be fetched.
    pub fn blog_post(&self, slug: &str, locale: &Locale) -> Option<BlogPost> {
        match self.fetch(PageKind::Blog, locale, blog_post_query(slug, locale, self.settings)) {
            Ok(value) => decode_post(&self.doc(&value, locale)),
            Err(e) => {
                self.report_fallback(PageKind::Blog, locale, e.to_string());
                None
            }
        }
    }

    /// All properties. An empty list is a valid CMS answer.
    pub fn properties(&self, locale: &Locale) -> Loaded<Vec<Property>> {
        match self.fetch(PageKind::Properties, locale, properties_query(locale, self.settings)) {
            Ok(value) => Loaded::cms(
                documents(&value)
                    .iter()
                    .filter_map(|v| decode_property(&self.doc(v, locale)))
                    .collect(),
            ),
            Err(e) => self.fall_back(PageKind::Properties, locale, e.to_string(), Vec::new()),
        }
    }

    /// A single property, or `None` when it does not exist or cannot be fetched.
    pub fn property(&self, slug: &str, locale: &Locale) -> Option<Property> {
        match self.fetch(
            PageKind::Properties,
            locale,
            property_query(slug, locale, self.settings),
        ) {
            Ok(value) => decode_property(&self.doc(&value, locale)),
            Err(e) => {
                self.report_fallback(PageKind::Properties, locale, e.to_string());
                None
            }
        }
    }

    /// Where the copy for a page came from, loading it if needed.
    pub fn source_of(&self, kind: PageKind, locale: &Locale) -> ContentSource {
        match kind {
            PageKind::Home => self.home(locale).source,
            PageKind::Services => self.services(locale).source,
            PageKind::Contact => self.contact(locale).source,
            PageKind::Blog => self.blog(locale).source,
            PageKind::Properties => self.properties(locale).source,
        }
    }

    /// Load every page for `locale` in parallel to warm the cache.
    ///
    /// Results are returned in [`PageKind::ALL`] order.
    pub fn prefetch_all(&self, locale: &Locale) -> Vec<(PageKind, ContentSource)> {
        PageKind::ALL
            .par_iter()
            .map(|kind| (*kind, self.source_of(*kind, locale)))
            .collect()
    }
}
