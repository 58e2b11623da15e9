//! Normalized content records handed to the site's pages.
//!
//! Every record is already resolved for one locale: strings are the chosen
//! translation, never per-locale maps. These types are what the `fetch`
//! command prints as JSON.

use serde::{Deserialize, Serialize};

/// Canonical architecture-planning link on a property.
///
/// Legacy entries carry `url = "#"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanningLink {
    pub title: String,
    pub url: String,
}

/// Where a page record's copy came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentSource {
    /// Resolved from the CMS response.
    Cms,
    /// The CMS had nothing usable or the fetch failed; hardcoded copy was used.
    Fallback,
}

/// A page record plus the source of its copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loaded<T> {
    pub source: ContentSource,
    pub record: T,
}

impl<T> Loaded<T> {
    pub fn cms(record: T) -> Self {
        Self {
            source: ContentSource::Cms,
            record,
        }
    }

    pub fn fallback(record: T) -> Self {
        Self {
            source: ContentSource::Fallback,
            record,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomePage {
    pub hero_title: String,
    pub hero_subtitle: String,
    pub intro: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<String>,
}

/// One entry on the services page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub slug: String,
    pub title: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPage {
    pub heading: String,
    pub body: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPost {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub slug: String,
    pub title: String,
    pub location: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gallery: Vec<String>,
    /// Absent when the CMS has no usable planning attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture_planning: Option<PlanningLink>,
}
