use std::collections::HashMap;

/// Media type of XHTML content documents.
pub const XHTML_MEDIA_TYPE: &str = "application/xhtml+xml";
/// Media type of the legacy NCX table of contents.
pub const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

/// In-memory view of an EPUB package.
///
/// Every resource listed in the manifest is keyed by its href relative to the
/// package document, the same way manifest items and spine entries refer to
/// it. Files that live outside the manifest (META-INF, mimetype, strays) are
/// kept in `extra_files` so that a written package is complete.
#[derive(Debug, Clone, Default)]
pub struct Package {
    pub version: PackageVersion,
    pub metadata: Metadata,
    /// `xml:lang` on the `<package>` root element, if present.
    pub root_language: Option<String>,
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
    /// Legacy NCX table of contents (href relative to the package document).
    pub ncx_href: Option<String>,
    /// EPUB 3 navigation document (href relative to the package document).
    pub nav_href: Option<String>,
    /// Path of the package document inside the container (e.g. "OEBPS/content.opf").
    pub opf_path: String,
    /// Package document source.
    pub opf: String,
    pub resources: HashMap<String, Resource>,
    /// Container entries that are not manifest resources, keyed by full path.
    pub extra_files: Vec<(String, Vec<u8>)>,
}

/// Packaging format generation, taken from the `<package version>` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackageVersion {
    #[default]
    Epub2,
    Epub3,
}

impl PackageVersion {
    pub fn parse(version: &str) -> Self {
        if version.trim().starts_with('3') {
            PackageVersion::Epub3
        } else {
            PackageVersion::Epub2
        }
    }

    /// Whether `epub:type` semantics may be written into content documents.
    pub fn supports_semantics(self) -> bool {
        self == PackageVersion::Epub3
    }
}

/// Package metadata relevant to accessibility processing.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub title: String,
    /// Every `dc:language` value, in document order.
    pub languages: Vec<String>,
    pub identifier: String,
    /// Whether any `schema:access*` metadata is already declared.
    pub has_accessibility_metadata: bool,
}

/// A `<manifest>` item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Vec<String>,
}

/// An item in the reading order (spine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    pub idref: String,
    pub href: String,
    pub linear: bool,
}

/// A resource (content document, image, CSS, font, etc.)
#[derive(Debug, Clone)]
pub struct Resource {
    pub data: Vec<u8>,
    pub media_type: String,
}

impl Package {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource and its manifest entry.
    pub fn add_resource(
        &mut self,
        id: impl Into<String>,
        href: impl Into<String>,
        data: Vec<u8>,
        media_type: impl Into<String>,
    ) {
        let href = href.into();
        let media_type = media_type.into();
        self.manifest.push(ManifestItem {
            id: id.into(),
            href: href.clone(),
            media_type: media_type.clone(),
            properties: Vec::new(),
        });
        self.resources.insert(href, Resource { data, media_type });
    }

    /// Get a resource by href
    pub fn get_resource(&self, href: &str) -> Option<&Resource> {
        self.resources.get(href)
    }

    /// Append a manifest item to the reading order.
    pub fn add_spine_item(&mut self, idref: &str) {
        if let Some(item) = self.manifest_item(idref) {
            let href = item.href.clone();
            self.spine.push(SpineItem {
                idref: idref.to_string(),
                href,
                linear: true,
            });
        }
    }

    pub fn manifest_item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.id == id)
    }

    /// Hrefs of textual content documents: spine order first, then any
    /// remaining XHTML (such as a nav document kept out of the spine) in
    /// manifest order.
    pub fn text_hrefs(&self) -> Vec<String> {
        let mut hrefs: Vec<String> = Vec::new();
        for item in &self.spine {
            if self
                .manifest_item(&item.idref)
                .is_some_and(|m| is_textual(&m.media_type))
                && !hrefs.contains(&item.href)
            {
                hrefs.push(item.href.clone());
            }
        }
        for item in &self.manifest {
            if is_textual(&item.media_type) && !hrefs.contains(&item.href) {
                hrefs.push(item.href.clone());
            }
        }
        hrefs
    }

    /// Directory of the package document inside the container, without a
    /// trailing slash ("" when the package document is at the root).
    pub fn opf_dir(&self) -> &str {
        self.opf_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }
}

impl ManifestItem {
    pub fn has_property(&self, property: &str) -> bool {
        self.properties.iter().any(|p| p == property)
    }
}

impl Metadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.languages.push(language.into());
        self
    }

    /// First declared `dc:language`.
    pub fn primary_language(&self) -> Option<&str> {
        self.languages
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
    }
}

/// Whether a media type denotes a markup content document.
pub fn is_textual(media_type: &str) -> bool {
    matches!(
        media_type.trim().to_ascii_lowercase().as_str(),
        "application/xhtml+xml" | "text/html"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_version_parse() {
        assert_eq!(PackageVersion::parse("3.0"), PackageVersion::Epub3);
        assert_eq!(PackageVersion::parse(" 3.2"), PackageVersion::Epub3);
        assert_eq!(PackageVersion::parse("2.0"), PackageVersion::Epub2);
        assert_eq!(PackageVersion::parse(""), PackageVersion::Epub2);
    }

    #[test]
    fn test_text_hrefs_spine_first() {
        let mut pkg = Package::new();
        pkg.add_resource("nav", "nav.xhtml", Vec::new(), XHTML_MEDIA_TYPE);
        pkg.add_resource("img", "cover.jpg", Vec::new(), "image/jpeg");
        pkg.add_resource("c2", "ch2.xhtml", Vec::new(), XHTML_MEDIA_TYPE);
        pkg.add_resource("c1", "ch1.xhtml", Vec::new(), XHTML_MEDIA_TYPE);
        pkg.add_spine_item("c1");
        pkg.add_spine_item("c2");

        assert_eq!(pkg.text_hrefs(), vec!["ch1.xhtml", "ch2.xhtml", "nav.xhtml"]);
    }

    #[test]
    fn test_primary_language_skips_blank() {
        let meta = Metadata::new("Book").with_language("  ").with_language("fr");
        assert_eq!(meta.primary_language(), Some("fr"));
        assert_eq!(Metadata::default().primary_language(), None);
    }

    #[test]
    fn test_opf_dir() {
        let mut pkg = Package::new();
        pkg.opf_path = "OEBPS/content.opf".into();
        assert_eq!(pkg.opf_dir(), "OEBPS");
        pkg.opf_path = "content.opf".into();
        assert_eq!(pkg.opf_dir(), "");
    }
}
