//! CLI output formatting.
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.
//!
//! # Output Format
//!
//! ## Fetch events
//!
//! ```text
//! home/de: cache miss
//! home/de: stored (ttl 3600s)
//! services/de: cached
//! contact/de: fallback copy (Store error: HTTP error: ...)
//! ```
//!
//! ## Prefetch
//!
//! ```text
//! Pages (de)
//! 001 home        cms
//! 002 services    fallback
//! ```

use crate::fetch::FetchEvent;
use crate::pages::PageKind;
use crate::types::ContentSource;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn source_label(source: ContentSource) -> &'static str {
    match source {
        ContentSource::Cms => "cms",
        ContentSource::Fallback => "fallback",
    }
}

/// One line per fetch event.
pub fn format_fetch_event(event: &FetchEvent) -> Vec<String> {
    match event {
        FetchEvent::CacheHit { label } => vec![format!("{label}: cached")],
        FetchEvent::CacheMiss { label } => vec![format!("{label}: cache miss")],
        FetchEvent::Bypass { label } => vec![format!("{label}: fetched (no-store)")],
        FetchEvent::Stored { label, ttl_secs } => {
            vec![format!("{label}: stored (ttl {ttl_secs}s)")]
        }
        FetchEvent::Invalidated { tag, removed } => {
            let noun = if *removed == 1 { "entry" } else { "entries" };
            vec![format!("tag '{tag}': {removed} cached {noun} removed")]
        }
        FetchEvent::FallbackUsed { label, reason } => {
            vec![format!("{label}: fallback copy ({reason})")]
        }
    }
}

/// Page-by-page summary of a prefetch run.
pub fn format_prefetch(locale: &str, results: &[(PageKind, ContentSource)]) -> Vec<String> {
    let mut lines = vec![format!("Pages ({locale})")];
    let width = results
        .iter()
        .map(|(kind, _)| kind.tag().len())
        .max()
        .unwrap_or(0);
    for (i, (kind, source)) in results.iter().enumerate() {
        lines.push(format!(
            "{} {:<width$}    {}",
            format_index(i + 1),
            kind.tag(),
            source_label(*source),
        ));
    }
    lines
}

/// The resolved query expression for a field.
pub fn format_query(field: &str, locale: &str, expression: &str) -> Vec<String> {
    vec![format!("{field} ({locale})"), format!("    {expression}")]
}

pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

pub fn print_prefetch(locale: &str, results: &[(PageKind, ContentSource)]) {
    print_lines(&format_prefetch(locale, results));
}
