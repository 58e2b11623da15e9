//! Locale tags and negotiation.
//!
//! Every page on the site is requested for a locale taken from its route
//! (`/de/services`, `/en/blog/...`). Content in the CMS is stored as
//! per-locale maps, and the default locale is the last fallback whenever a
//! translation is missing.
//!
//! ## Negotiation
//!
//! Incoming tags are matched against the supported list in this order:
//!
//! 1. exact match, case-insensitive (`DE` → `de`)
//! 2. primary subtag (`de-AT`, `de_CH` → `de`)
//! 3. the default locale
//!
//! Step 3 is permissive: an unknown or malformed tag silently becomes the
//! default. With `strict` enabled, [`LocaleSettings::negotiate`] returns
//! [`LocaleError::Unsupported`] instead.

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LocaleError {
    #[error("Unsupported locale '{tag}' (supported: {supported})")]
    Unsupported { tag: String, supported: String },
}

/// A normalized, lowercase language tag such as `en` or `de`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locale(String);

impl Locale {
    /// Build a locale from a raw tag, lowercasing it and using `-` as the
    /// subtag separator.
    pub fn new(tag: &str) -> Self {
        Self(tag.trim().to_ascii_lowercase().replace('_', "-"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Primary language subtag: `de` for `de-at`.
    pub fn primary(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The set of locales the site serves, with exactly one default.
///
/// Built from [`LocalesConfig`](crate::config::LocalesConfig) and passed
/// explicitly to the resolver, normalizer and page loaders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleSettings {
    default: Locale,
    supported: Vec<Locale>,
    strict: bool,
}

impl LocaleSettings {
    /// The default locale is always added to `supported` if missing.
    pub fn new(default: &str, supported: &[&str]) -> Self {
        let default = Locale::new(default);
        let mut locales: Vec<Locale> = Vec::with_capacity(supported.len() + 1);
        for locale in supported.iter().map(|s| Locale::new(s)) {
            if !locale.as_str().is_empty() && !locales.contains(&locale) {
                locales.push(locale);
            }
        }
        if !locales.contains(&default) {
            locales.insert(0, default.clone());
        }
        Self {
            default,
            supported: locales,
            strict: false,
        }
    }

    /// Reject unknown tags instead of falling back to the default.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn default_locale(&self) -> &Locale {
        &self.default
    }

    pub fn supported(&self) -> &[Locale] {
        &self.supported
    }

    pub fn is_default(&self, locale: &Locale) -> bool {
        *locale == self.default
    }

    pub fn is_supported(&self, locale: &Locale) -> bool {
        self.supported.contains(locale)
    }

    /// Resolve a requested tag to a supported locale.
    ///
    /// In permissive mode this never fails.
    pub fn negotiate(&self, tag: &str) -> Result<Locale, LocaleError> {
        let requested = Locale::new(tag);
        if self.is_supported(&requested) {
            return Ok(requested);
        }
        if let Some(found) = self
            .supported
            .iter()
            .find(|l| !requested.primary().is_empty() && l.as_str() == requested.primary())
        {
            return Ok(found.clone());
        }
        if self.strict {
            return Err(LocaleError::Unsupported {
                tag: tag.to_string(),
                supported: self
                    .supported
                    .iter()
                    .map(Locale::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
        Ok(self.default.clone())
    }

    /// Lookup order for a requested locale: the locale itself, then the
    /// default (deduplicated when they are the same).
    pub fn priority(&self, locale: &Locale) -> Vec<Locale> {
        if self.is_default(locale) {
            vec![self.default.clone()]
        } else {
            vec![locale.clone(), self.default.clone()]
        }
    }
}

impl Default for LocaleSettings {
    fn default() -> Self {
        Self::new("en", &["en", "de"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_is_lowercased_and_normalized() {
        assert_eq!(Locale::new(" DE_at ").as_str(), "de-at");
        assert_eq!(Locale::new("de-AT").primary(), "de");
        assert_eq!(Locale::new("en").primary(), "en");
    }

    #[test]
    fn default_is_always_supported() {
        let s = LocaleSettings::new("en", &["de"]);
        assert_eq!(s.supported(), &[Locale::new("en"), Locale::new("de")]);
        assert!(s.is_default(&Locale::new("en")));
    }

    #[test]
    fn negotiate_exact_match() {
        let s = LocaleSettings::default();
        assert_eq!(s.negotiate("de").unwrap(), Locale::new("de"));
        assert_eq!(s.negotiate("DE").unwrap(), Locale::new("de"));
    }

    #[test]
    fn negotiate_primary_subtag() {
        let s = LocaleSettings::default();
        assert_eq!(s.negotiate("de-AT").unwrap(), Locale::new("de"));
        assert_eq!(s.negotiate("de_CH").unwrap(), Locale::new("de"));
    }

    #[test]
    fn negotiate_unknown_falls_back_to_default() {
        let s = LocaleSettings::default();
        assert_eq!(s.negotiate("fr").unwrap(), Locale::new("en"));
        assert_eq!(s.negotiate("").unwrap(), Locale::new("en"));
        assert_eq!(s.negotiate("%%%").unwrap(), Locale::new("en"));
    }

    #[test]
    fn negotiate_strict_rejects_unknown() {
        let s = LocaleSettings::default().strict(true);
        let err = s.negotiate("fr").unwrap_err();
        assert_eq!(
            err,
            LocaleError::Unsupported {
                tag: "fr".into(),
                supported: "en, de".into()
            }
        );
        // Known tags still resolve in strict mode
        assert_eq!(s.negotiate("de-AT").unwrap(), Locale::new("de"));
    }

    #[test]
    fn priority_for_default_has_single_entry() {
        let s = LocaleSettings::default();
        assert_eq!(s.priority(&Locale::new("en")), vec![Locale::new("en")]);
    }

    #[test]
    fn priority_for_other_locale_ends_with_default() {
        let s = LocaleSettings::default();
        assert_eq!(
            s.priority(&Locale::new("de")),
            vec![Locale::new("de"), Locale::new("en")]
        );
    }
}
