//! EPUB parsing utilities (container.xml, OPF)

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::book::{ManifestItem, Metadata, NCX_MEDIA_TYPE, PackageVersion};
use crate::error::{Error, Result};
use crate::xml::{attr_value, local_name, resolve_entity, strip_bom};

/// Parsed OPF package data.
#[derive(Debug)]
pub struct OpfData {
    pub version: PackageVersion,
    pub metadata: Metadata,
    /// `xml:lang` on the package root.
    pub root_language: Option<String>,
    /// Manifest items in document order.
    pub manifest: Vec<ManifestItem>,
    /// Spine entries as (idref, linear).
    pub spine: Vec<(String, bool)>,
    /// Manifest id named by `<spine toc>`.
    pub toc_id: Option<String>,
}

impl OpfData {
    /// Href of the legacy NCX: the spine `toc` reference, else the first
    /// manifest item with the NCX media type.
    pub fn ncx_href(&self) -> Option<String> {
        self.toc_id
            .as_ref()
            .and_then(|id| self.manifest.iter().find(|item| &item.id == id))
            .or_else(|| {
                self.manifest
                    .iter()
                    .find(|item| item.media_type == NCX_MEDIA_TYPE)
            })
            .map(|item| item.href.clone())
    }

    /// Href of the EPUB 3 navigation document (manifest property `nav`).
    pub fn nav_href(&self) -> Option<String> {
        self.manifest
            .iter()
            .find(|item| item.has_property("nav"))
            .map(|item| item.href.clone())
    }
}

/// Parse META-INF/container.xml to find the OPF path.
pub fn parse_container_xml(bytes: &[u8]) -> Result<String> {
    let content = String::from_utf8(strip_bom(bytes).to_vec())?;

    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name(e.name().as_ref()) == b"rootfile" =>
            {
                if let Some(path) = attr_value(&e, b"full-path") {
                    return Ok(path);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Err(Error::InvalidEpub(
        "No rootfile found in container.xml".into(),
    ))
}

/// Parse OPF package document.
pub fn parse_opf(content: &str) -> Result<OpfData> {
    let mut reader = Reader::from_str(content);

    let mut version = PackageVersion::default();
    let mut root_language = None;
    let mut metadata = Metadata::default();
    let mut manifest: Vec<ManifestItem> = Vec::new();
    let mut spine: Vec<(String, bool)> = Vec::new();
    let mut toc_id: Option<String> = None;

    let mut in_metadata = false;
    let mut current_element: Option<String> = None;
    let mut buf_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                match local {
                    b"package" => {
                        if let Some(v) = attr_value(&e, b"version") {
                            version = PackageVersion::parse(&v);
                        }
                        root_language = attr_value(&e, b"xml:lang").filter(|l| !l.trim().is_empty());
                    }
                    b"metadata" => in_metadata = true,
                    b"title" | b"language" | b"identifier" => {
                        if in_metadata {
                            current_element = Some(String::from_utf8_lossy(local).to_string());
                            buf_text.clear();
                        }
                    }
                    b"meta" => {
                        if is_accessibility_meta(&e) {
                            metadata.has_accessibility_metadata = true;
                        }
                    }
                    b"spine" => toc_id = attr_value(&e, b"toc"),
                    b"item" => manifest.extend(manifest_item(&e)),
                    b"itemref" => spine.extend(spine_item(&e)),
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                match local {
                    b"item" => manifest.extend(manifest_item(&e)),
                    b"itemref" => spine.extend(spine_item(&e)),
                    b"meta" => {
                        if is_accessibility_meta(&e) {
                            metadata.has_accessibility_metadata = true;
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if current_element.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if current_element.is_some() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        buf_text.push_str(&resolved);
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());

                if local == b"metadata" {
                    in_metadata = false;
                }

                if let Some(ref elem) = current_element {
                    let text = buf_text.trim().to_string();
                    match elem.as_str() {
                        "title" if metadata.title.is_empty() => metadata.title = text,
                        "language" => metadata.languages.push(text),
                        "identifier" if metadata.identifier.is_empty() => {
                            metadata.identifier = text
                        }
                        _ => {}
                    }
                    current_element = None;
                    buf_text.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Ok(OpfData {
        version,
        metadata,
        root_language,
        manifest,
        spine,
        toc_id,
    })
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn manifest_item(e: &BytesStart<'_>) -> Option<ManifestItem> {
    let id = attr_value(e, b"id").filter(|id| !id.is_empty())?;
    Some(ManifestItem {
        id,
        href: attr_value(e, b"href").unwrap_or_default(),
        media_type: attr_value(e, b"media-type").unwrap_or_default(),
        properties: attr_value(e, b"properties")
            .map(|p| p.split_ascii_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
    })
}

fn spine_item(e: &BytesStart<'_>) -> Option<(String, bool)> {
    let idref = attr_value(e, b"idref")?;
    let linear = attr_value(e, b"linear").is_none_or(|v| v.trim() != "no");
    Some((idref, linear))
}

/// `<meta property="schema:access...">` (EPUB 3) or `<meta name="schema:access...">` (EPUB 2).
fn is_accessibility_meta(e: &BytesStart<'_>) -> bool {
    [b"property".as_slice(), b"name".as_slice()]
        .iter()
        .filter_map(|key| attr_value(e, key))
        .any(|value| value.starts_with("schema:access"))
}
