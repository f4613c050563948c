//! Navigation extraction.
//!
//! A book can describe its structure in up to three places: the legacy NCX,
//! the EPUB 3 navigation document, and the navigation document's own
//! heading. Each is parsed into a [`NavSource`] and the sources are merged
//! by precedence into one [`NavEntry`] per content document.

mod ncx;
mod xhtml;

pub use ncx::parse_ncx;
pub use xhtml::parse_nav_document;

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::analyze::PackageInfo;
use crate::book::Package;

/// Structural classification of a document taken from a landmarks nav.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Landmark {
    /// `epub:type` token, e.g. "toc" or "bodymatter".
    pub token: String,
    /// Target element id when the landmark points inside the document.
    pub fragment: Option<String>,
}

/// Navigation data for one content document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavEntry {
    /// Package-relative href of the document, without fragment.
    pub href: String,
    pub title: Option<String>,
    pub landmark: Option<Landmark>,
}

impl NavEntry {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            title: None,
            landmark: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_landmark(mut self, token: impl Into<String>, fragment: Option<&str>) -> Self {
        self.landmark = Some(Landmark {
            token: token.into(),
            fragment: fragment.map(str::to_string),
        });
        self
    }
}

/// Merged navigation data keyed by document href.
pub type NavMap = BTreeMap<String, NavEntry>;

/// Entries from one navigation source, each already unique per href.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavSource {
    /// NCX table of contents: titles only.
    Legacy(Vec<NavEntry>),
    /// EPUB 3 navigation document: titles and landmarks.
    Modern(Vec<NavEntry>),
    /// A document describing itself, such as the nav document's `<h1>`.
    InDocument(Vec<NavEntry>),
}

impl NavSource {
    /// Higher precedence replaces lower precedence entries for the same href.
    fn precedence(&self) -> u8 {
        match self {
            NavSource::InDocument(_) => 0,
            NavSource::Legacy(_) => 1,
            NavSource::Modern(_) => 2,
        }
    }

    fn into_entries(self) -> Vec<NavEntry> {
        match self {
            NavSource::Legacy(entries)
            | NavSource::Modern(entries)
            | NavSource::InDocument(entries) => entries,
        }
    }
}

/// Merge sources: a higher-precedence entry replaces a lower one entirely,
/// title and landmark alike.
pub fn merge(mut sources: Vec<NavSource>) -> NavMap {
    sources.sort_by_key(NavSource::precedence);

    let mut map = NavMap::new();
    for source in sources {
        for entry in source.into_entries() {
            map.insert(entry.href.clone(), entry);
        }
    }
    map
}

/// Parse whichever navigation documents the package has and merge them.
///
/// A navigation document that is missing or fails to parse is skipped with a
/// warning; titles and landmarks are then simply unavailable for the
/// documents it would have covered.
pub fn extract(package: &Package, info: &PackageInfo) -> NavMap {
    let mut sources = Vec::new();

    if let Some(ncx_href) = &info.ncx_href {
        match package.get_resource(ncx_href) {
            Some(resource) => match parse_ncx(&resource.data, ncx_href) {
                Ok(entries) => sources.push(NavSource::Legacy(entries)),
                Err(e) => warn!(href = %ncx_href, error = %e, "ignoring unreadable NCX"),
            },
            None => warn!(href = %ncx_href, "NCX listed in manifest but missing"),
        }
    }

    if let Some(nav_href) = &info.nav_href {
        match package.get_resource(nav_href) {
            Some(resource) => match parse_nav_document(&resource.data, nav_href) {
                Ok(parsed) => {
                    sources.push(NavSource::Modern(parsed.entries));
                    if let Some(heading) = parsed.heading {
                        sources.push(NavSource::InDocument(vec![
                            NavEntry::new(nav_href.clone()).with_title(heading),
                        ]));
                    }
                }
                Err(e) => warn!(href = %nav_href, error = %e, "ignoring unreadable nav document"),
            },
            None => warn!(href = %nav_href, "nav document listed in manifest but missing"),
        }
    }

    if sources.is_empty() {
        debug!("no navigation sources; titles and landmarks left unchanged");
    }

    let map = merge(sources);
    debug!(entries = map.len(), "navigation map built");
    map
}

/// Collapse runs of whitespace in link and label text.
pub(crate) fn normalize_title(text: &str) -> Option<String> {
    let title = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() { None } else { Some(title) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modern_overrides_legacy() {
        let legacy = NavSource::Legacy(vec![
            NavEntry::new("ch1.xhtml").with_title("Chapter 1"),
            NavEntry::new("ch2.xhtml").with_title("Chapter 2"),
        ]);
        let modern = NavSource::Modern(vec![
            NavEntry::new("ch1.xhtml")
                .with_title("Chapter One")
                .with_landmark("bodymatter", None),
        ]);

        // Order of the input does not matter.
        let map = merge(vec![modern, legacy]);

        let ch1 = &map["ch1.xhtml"];
        assert_eq!(ch1.title.as_deref(), Some("Chapter One"));
        assert_eq!(ch1.landmark.as_ref().unwrap().token, "bodymatter");
        assert_eq!(map["ch2.xhtml"].title.as_deref(), Some("Chapter 2"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_modern_override_is_total() {
        let legacy = NavSource::Legacy(vec![NavEntry::new("cover.xhtml").with_title("Cover")]);
        let modern = NavSource::Modern(vec![
            NavEntry::new("cover.xhtml").with_landmark("cover", None),
        ]);
        let map = merge(vec![legacy, modern]);
        // The modern entry carried no title, and it still wins as a whole.
        assert_eq!(map["cover.xhtml"].title, None);
    }

    #[test]
    fn test_in_document_is_lowest() {
        let own = NavSource::InDocument(vec![NavEntry::new("nav.xhtml").with_title("Contents")]);
        let legacy = NavSource::Legacy(vec![NavEntry::new("nav.xhtml").with_title("Table of Contents")]);
        let map = merge(vec![legacy.clone(), own.clone()]);
        assert_eq!(map["nav.xhtml"].title.as_deref(), Some("Table of Contents"));

        let map = merge(vec![own]);
        assert_eq!(map["nav.xhtml"].title.as_deref(), Some("Contents"));
    }

    #[test]
    fn test_empty_sources() {
        assert!(merge(Vec::new()).is_empty());
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Chapter\n   One "), Some("Chapter One".into()));
        assert_eq!(normalize_title(" \n "), None);
    }
}
