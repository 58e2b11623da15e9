//! Hardcoded copy used when the CMS has nothing usable.
//!
//! Pages must render even when the content store is unreachable or an editor
//! has not filled in a document yet. English is the last resort for locales
//! without their own copy.

use crate::locale::Locale;
use crate::types::{ContactPage, HomePage, ServiceEntry};

fn is_german(locale: &Locale) -> bool {
    locale.primary() == "de"
}

pub fn home(locale: &Locale) -> HomePage {
    if is_german(locale) {
        HomePage {
            hero_title: "Wir bauen Ihre Zukunft".into(),
            hero_subtitle: "Neubau, Sanierung und Projektsteuerung aus einer Hand".into(),
            intro: "Seit über zwanzig Jahren planen und bauen wir Wohn- und Gewerbeimmobilien \
                    in der Region."
                .into(),
            highlights: Vec::new(),
        }
    } else {
        HomePage {
            hero_title: "Building your future".into(),
            hero_subtitle: "New builds, renovation and project management under one roof".into(),
            intro: "For more than twenty years we have planned and built residential and \
                    commercial properties across the region."
                .into(),
            highlights: Vec::new(),
        }
    }
}

pub fn services(locale: &Locale) -> Vec<ServiceEntry> {
    let entries: &[(&str, &str, &str)] = if is_german(locale) {
        &[
            ("new-builds", "Neubau", "Schlüsselfertige Wohn- und Gewerbebauten."),
            ("renovation", "Sanierung", "Modernisierung und energetische Sanierung."),
            ("project-management", "Projektsteuerung", "Termine, Kosten und Qualität im Griff."),
        ]
    } else {
        &[
            ("new-builds", "New builds", "Turnkey residential and commercial buildings."),
            ("renovation", "Renovation", "Modernisation and energy retrofits."),
            (
                "project-management",
                "Project management",
                "Schedule, budget and quality under control.",
            ),
        ]
    };
    entries
        .iter()
        .map(|(slug, title, summary)| ServiceEntry {
            slug: (*slug).into(),
            title: (*title).into(),
            summary: (*summary).into(),
        })
        .collect()
}

pub fn contact(locale: &Locale) -> ContactPage {
    let (heading, body) = if is_german(locale) {
        ("Kontakt", "Erzählen Sie uns von Ihrem Projekt. Wir melden uns innerhalb eines Werktags.")
    } else {
        ("Contact", "Tell us about your project. We reply within one business day.")
    };
    ContactPage {
        heading: heading.into(),
        body: body.into(),
        email: "info@example.com".into(),
        phone: "+49 30 000000".into(),
        address: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn german_copy_for_german_locales() {
        assert_eq!(home(&Locale::new("de")).hero_title, "Wir bauen Ihre Zukunft");
        assert_eq!(contact(&Locale::new("de-at")).heading, "Kontakt");
    }

    #[test]
    fn english_copy_is_last_resort() {
        assert_eq!(home(&Locale::new("fr")).hero_title, "Building your future");
        assert_eq!(services(&Locale::new("en")).len(), 3);
    }
}
