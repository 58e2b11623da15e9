//! Locale-aware query building for the CMS.
//!
//! Localized documents store each translatable attribute as a per-locale map:
//!
//! ```json
//! { "title": { "en": "Residential builds", "de": "Wohnbau" } }
//! ```
//!
//! Page queries select the right translation with a GROQ `coalesce`, so a
//! missing German title falls back to the English one inside the store:
//!
//! ```text
//! locale = en   →  title
//! locale = de   →  coalesce(title.de, title.en)
//! array, de     →  coalesce(gallery.de[], gallery.en[])
//! ```
//!
//! For the default locale no fallback is possible, so the bare path is
//! selected and the whole per-locale map comes back. [`pick_localized`] reads
//! either shape after the fetch, which is also how stores without a
//! `coalesce` operator are served: fetch the map once, pick locally.
//!
//! Field paths are validated once in [`FieldPath::parse`] and locales are
//! rendered with bracket syntax when they are not plain identifiers
//! (`title["de-at"]`), so nothing caller-controlled is interpolated raw.

use crate::locale::{Locale, LocaleSettings};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum QueryError {
    #[error("Invalid field path '{0}': segments must match [A-Za-z_][A-Za-z0-9_]*")]
    InvalidField(String),
    #[error("Invalid projection alias '{0}'")]
    InvalidAlias(String),
}

/// A validated dotted field path such as `title` or `hero.heading`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a dotted path.
    ///
    /// - `"title"` → ok
    /// - `"hero.heading"` → ok
    /// - `"_id"` → ok
    /// - `""`, `"hero."`, `"1st"`, `"title[0]"`, `"a b"` → [`QueryError::InvalidField`]
    pub fn parse(path: &str) -> Result<Self, QueryError> {
        let segments: Vec<String> = path.split('.').map(String::from).collect();
        if segments.iter().all(|s| is_identifier(s)) {
            Ok(Self { segments })
        } else {
            Err(QueryError::InvalidField(path.to_string()))
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment, used as the default projection alias.
    pub fn leaf(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// How a localized field is laid out. The fallback policy is identical for
/// all shapes; only the base path differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldShape {
    /// `title` → `title.de`
    #[default]
    Scalar,
    /// `hero.heading` → `hero.heading.de`
    Nested,
    /// `gallery` → `gallery.de[]`
    Array,
}

impl std::str::FromStr for FieldShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scalar" => Ok(Self::Scalar),
            "nested" => Ok(Self::Nested),
            "array" => Ok(Self::Array),
            other => Err(format!(
                "unknown field shape '{other}' (expected scalar, nested or array)"
            )),
        }
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Render the member access for a locale: `.de` or `["de-at"]`.
fn locale_accessor(locale: &Locale) -> String {
    if is_identifier(locale.as_str()) {
        format!(".{}", locale.as_str())
    } else {
        // Locale tags are normalized to [a-z0-9-], so no escaping is needed
        let escaped: String = locale
            .as_str()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
        format!("[\"{escaped}\"]")
    }
}

fn locale_branch(path: &FieldPath, shape: FieldShape, locale: &Locale) -> String {
    let base = format!("{}{}", path, locale_accessor(locale));
    match shape {
        FieldShape::Array => format!("{base}[]"),
        FieldShape::Scalar | FieldShape::Nested => base,
    }
}

/// Build the query expression selecting `path` for `locale`.
///
/// Returns the bare path for the default locale and
/// `coalesce(<path>.<locale>, <path>.<default>)` otherwise. A locale outside
/// the supported set is treated as the default.
pub fn localized_field(
    path: &FieldPath,
    shape: FieldShape,
    locale: &Locale,
    settings: &LocaleSettings,
) -> String {
    if settings.is_default(locale) || !settings.is_supported(locale) {
        return match shape {
            FieldShape::Array => format!("{path}[]"),
            FieldShape::Scalar | FieldShape::Nested => path.to_string(),
        };
    }
    format!(
        "coalesce({}, {})",
        locale_branch(path, shape, locale),
        locale_branch(path, shape, settings.default_locale())
    )
}

/// [`localized_field`] for text: an empty translation also falls back.
///
/// `coalesce` only skips null, so a translation saved as `""` would win over
/// the default. The locale branch is wrapped in a `select` that yields null
/// for empty strings:
///
/// ```text
/// coalesce(select(title.de != "" => title.de), title.en)
/// ```
pub fn localized_text_field(
    path: &FieldPath,
    locale: &Locale,
    settings: &LocaleSettings,
) -> String {
    if settings.is_default(locale) || !settings.is_supported(locale) {
        return path.to_string();
    }
    let branch = locale_branch(path, FieldShape::Scalar, locale);
    format!(
        "coalesce(select({branch} != \"\" => {branch}), {})",
        locale_branch(path, FieldShape::Scalar, settings.default_locale())
    )
}

/// One entry of a GROQ projection: `"alias": <expression>`.
#[derive(Debug, Clone)]
pub struct Projected {
    pub alias: String,
    pub path: FieldPath,
    /// `None` for non-localized fields (`slug.current`, `_id`, dates).
    pub shape: Option<FieldShape>,
    /// Treat an empty translation as missing (text fields).
    pub skip_blank: bool,
}

impl Projected {
    /// A localized field aliased to its leaf name.
    pub fn localized(path: &str, shape: FieldShape) -> Result<Self, QueryError> {
        let path = FieldPath::parse(path)?;
        Ok(Self {
            alias: path.leaf().to_string(),
            path,
            shape: Some(shape),
            skip_blank: false,
        })
    }

    /// A localized text field: an empty translation falls back to the default.
    pub fn text(path: &str) -> Result<Self, QueryError> {
        Ok(Self {
            skip_blank: true,
            ..Self::localized(path, FieldShape::Scalar)?
        })
    }

    /// A plain field copied as-is.
    pub fn plain(path: &str) -> Result<Self, QueryError> {
        let path = FieldPath::parse(path)?;
        Ok(Self {
            alias: path.leaf().to_string(),
            path,
            shape: None,
            skip_blank: false,
        })
    }

    pub fn alias(mut self, alias: &str) -> Result<Self, QueryError> {
        if !is_identifier(alias) {
            return Err(QueryError::InvalidAlias(alias.to_string()));
        }
        self.alias = alias.to_string();
        Ok(self)
    }

    fn render(&self, locale: &Locale, settings: &LocaleSettings) -> String {
        let expr = match self.shape {
            Some(_) if self.skip_blank => localized_text_field(&self.path, locale, settings),
            Some(shape) => localized_field(&self.path, shape, locale, settings),
            None => self.path.to_string(),
        };
        format!("\"{}\": {}", self.alias, expr)
    }
}

/// Render a projection object for `locale`.
///
/// ```text
/// { "title": coalesce(title.de, title.en), "slug": slug.current }
/// ```
pub fn projection(fields: &[Projected], locale: &Locale, settings: &LocaleSettings) -> String {
    let body: Vec<String> = fields.iter().map(|f| f.render(locale, settings)).collect();
    format!("{{ {} }}", body.join(", "))
}

// =============================================================================
// Post-fetch locale merge
// =============================================================================

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

fn is_locale_map(map: &serde_json::Map<String, Value>, settings: &LocaleSettings) -> bool {
    settings
        .supported()
        .iter()
        .any(|l| map.contains_key(l.as_str()))
}

/// Pick the value for `locale` out of a fetched field.
///
/// Accepts either a per-locale map (`{"en": .., "de": ..}`) or a value that
/// was already resolved by the store. Maps are read in priority order
/// (`locale`, then default); the first present entry wins. Null, empty and
/// whitespace-only values count as absent.
pub fn pick_localized(value: &Value, locale: &Locale, settings: &LocaleSettings) -> Option<Value> {
    if let Value::Object(map) = value
        && is_locale_map(map, settings)
    {
        return settings
            .priority(locale)
            .iter()
            .filter_map(|l| map.get(l.as_str()))
            .find(|v| is_present(v))
            .cloned();
    }
    is_present(value).then(|| value.clone())
}

/// [`pick_localized`] for text fields: returns the trimmed string.
pub fn pick_localized_str(
    value: &Value,
    locale: &Locale,
    settings: &LocaleSettings,
) -> Option<String> {
    match pick_localized(value, locale, settings)? {
        Value::String(s) => Some(s.trim().to_string()),
        _ => None,
    }
}
