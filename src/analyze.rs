//! Package analysis: language resolution and package-level metadata.

use tracing::{debug, info, warn};

use crate::book::{Package, PackageVersion};
use crate::epub::{OpfEdits, rewrite_opf};
use crate::error::{Error, Result};

/// Options for [`analyze`].
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Language to use when the package declares none.
    pub fallback_language: Option<String>,
    /// Write accessibility metadata into the package document when it has none.
    pub accessibility_metadata: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            fallback_language: None,
            accessibility_metadata: true,
        }
    }
}

impl AnalyzeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback_language(mut self, language: impl Into<String>) -> Self {
        self.fallback_language = Some(language.into());
        self
    }

    pub fn with_accessibility_metadata(mut self, enabled: bool) -> Self {
        self.accessibility_metadata = enabled;
        self
    }
}

/// What the rest of the pipeline needs to know about a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    /// Primary language subtag, e.g. "en".
    pub language: String,
    pub version: PackageVersion,
    /// EPUB 3 navigation document.
    pub nav_href: Option<String>,
    /// Legacy NCX.
    pub ncx_href: Option<String>,
}

/// Resolve the book's language and bring the package document up to date.
///
/// Sets `xml:lang` on `<package>` when missing and, if enabled, declares the
/// fixed accessibility metadata once. Fails with [`Error::MissingLanguage`]
/// when neither the package nor the caller provides a language; the package
/// is left untouched in that case.
pub fn analyze(package: &mut Package, options: &AnalyzeOptions) -> Result<PackageInfo> {
    let declared = package
        .metadata
        .primary_language()
        .map(str::to_string)
        .or_else(|| package.root_language.clone())
        .or_else(|| options.fallback_language.clone());
    let language = declared
        .as_deref()
        .and_then(primary_subtag)
        .ok_or(Error::MissingLanguage)?;

    let set_root = package.root_language.is_none();
    let add_metadata =
        options.accessibility_metadata && !package.metadata.has_accessibility_metadata;
    let edits = OpfEdits {
        root_language: set_root.then_some(language.as_str()),
        accessibility_metadata: add_metadata.then_some(package.version),
    };

    if set_root || add_metadata {
        let rewritten = rewrite_opf(&package.opf, &edits)?;
        package.opf = rewritten.content;
        if rewritten.metadata_written {
            debug!("declared accessibility metadata");
            package.metadata.has_accessibility_metadata = true;
        } else if add_metadata {
            warn!("package document has no <metadata> element; accessibility metadata not declared");
        }
    }
    if set_root {
        debug!(language = %language, "set package xml:lang");
        package.root_language = Some(language.clone());
    }

    let info = PackageInfo {
        language,
        version: package.version,
        nav_href: package.nav_href.clone(),
        ncx_href: package.ncx_href.clone(),
    };
    info!(
        language = %info.language,
        version = ?info.version,
        nav = info.nav_href.as_deref().unwrap_or("-"),
        ncx = info.ncx_href.as_deref().unwrap_or("-"),
        "analyzed package"
    );
    Ok(info)
}

/// "en-US" -> "en". Empty or blank tags yield `None`.
fn primary_subtag(tag: &str) -> Option<String> {
    let subtag = tag.trim().split(['-', '_']).next()?.trim();
    if subtag.is_empty() {
        None
    } else {
        Some(subtag.to_ascii_lowercase())
    }
}
