//! Normalization of the architecture-planning attribute.
//!
//! Property documents link to their architecture planning document. The
//! attribute has been stored in two shapes over the life of the dataset:
//!
//! - **Legacy**: a plain title string, no link (`"Plan A"`)
//! - **Current**: a record with a title and a URL (`{"title": "Plan A", "url": "https://..."}`)
//!
//! Either shape may sit inside a per-locale map or directly on the document.
//! [`PlanningValue`] decodes a single value into one of the two variants, and
//! [`normalize_planning`] walks the locale fallback chain and produces the
//! canonical [`PlanningLink`] the property page renders.
//!
//! ## Resolution order
//!
//! ```text
//! 1. raw[locale]  →  raw[default]  →  raw itself (flat, non-localized)
//! 2. structured with title and url       →  { title, url }
//! 3. structured but incomplete, locale ≠ default
//!                                         →  retry 2 with raw[default]
//! 4. non-blank string                     →  { title, url: "#" }
//! 5. anything else                        →  None
//! ```
//!
//! Blank and whitespace-only strings are treated as absent everywhere.

use crate::locale::{Locale, LocaleSettings};
use crate::types::PlanningLink;
use serde::Deserialize;
use serde_json::Value;

/// URL used for legacy entries, which never stored a link.
pub const LEGACY_URL_PLACEHOLDER: &str = "#";

/// A single planning value as stored in the CMS.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PlanningValue {
    Legacy(String),
    Structured {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        url: Option<String>,
    },
}

impl PlanningValue {
    /// Decode a JSON value. Numbers, arrays, booleans and null decode to `None`.
    pub fn decode(value: &Value) -> Option<Self> {
        match value {
            Value::String(_) | Value::Object(_) => Self::deserialize(value).ok(),
            _ => None,
        }
    }

    /// The structured variant with both fields non-blank.
    fn complete(&self) -> Option<PlanningLink> {
        match self {
            Self::Structured { title, url } => {
                let title = non_blank(title.as_deref())?;
                let url = non_blank(url.as_deref())?;
                Some(PlanningLink { title, url })
            }
            Self::Legacy(_) => None,
        }
    }

    fn legacy(&self) -> Option<PlanningLink> {
        match self {
            Self::Legacy(title) => non_blank(Some(title)).map(|title| PlanningLink {
                title,
                url: LEGACY_URL_PLACEHOLDER.to_string(),
            }),
            Self::Structured { .. } => None,
        }
    }
}

fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

/// The entry for `locale`, if present. Null and blank strings count as absent.
fn locale_entry<'a>(raw: &'a Value, locale: &Locale) -> Option<&'a Value> {
    raw.get(locale.as_str())
        .filter(|v| !v.is_null() && v.as_str().is_none_or(|s| !s.trim().is_empty()))
}

/// Resolve the architecture-planning attribute for `locale`.
///
/// `None` is a normal result: the attribute is missing or unusable, and the
/// property page simply omits the link.
pub fn normalize_planning(
    raw: Option<&Value>,
    locale: &Locale,
    settings: &LocaleSettings,
) -> Option<PlanningLink> {
    let raw = raw.filter(|v| !v.is_null())?;
    let default = settings.default_locale();

    let resolved = locale_entry(raw, locale)
        .or_else(|| locale_entry(raw, default))
        .unwrap_or(raw);
    let value = PlanningValue::decode(resolved)?;

    if let Some(link) = value.complete() {
        return Some(link);
    }
    if matches!(value, PlanningValue::Structured { .. }) && locale != default {
        return locale_entry(raw, default)
            .and_then(PlanningValue::decode)
            .and_then(|v| v.complete());
    }
    value.legacy()
}
