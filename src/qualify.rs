//! Qualification checks.
//!
//! Automated accessibility fixing assumes the book is sufficient in textual
//! form. Scripted content, audio, video and MathML break that assumption, so
//! a book containing any of them is refused before anything is edited.

use std::fmt;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::book::{Package, is_textual};
use crate::util::decode_markup;
use crate::xml::{attr_value, local_name};

/// Kind of resource that rules out automated processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Script,
    Audio,
    Video,
    Math,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Script => "script",
            ResourceKind::Audio => "audio",
            ResourceKind::Video => "video",
            ResourceKind::Math => "math",
        }
    }

    fn from_media_type(media_type: &str) -> Option<Self> {
        let media_type = media_type.trim().to_ascii_lowercase();
        if media_type.starts_with("audio/") {
            Some(ResourceKind::Audio)
        } else if media_type.starts_with("video/") {
            Some(ResourceKind::Video)
        } else if matches!(
            media_type.as_str(),
            "application/javascript"
                | "text/javascript"
                | "application/ecmascript"
                | "application/x-javascript"
        ) {
            Some(ResourceKind::Script)
        } else if media_type == "application/mathml+xml" {
            Some(ResourceKind::Math)
        } else {
            None
        }
    }

    /// Audio or video judged by the file extension of a URL, for embedded
    /// media that declares no `type`.
    fn from_extension(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "mp3" | "m4a" | "aac" | "oga" | "ogg" | "opus" | "wav" | "flac" => {
                Some(ResourceKind::Audio)
            }
            "mp4" | "m4v" | "webm" | "ogv" | "mov" => Some(ResourceKind::Video),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a book was refused, and where the offending content was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disqualification {
    pub kind: ResourceKind,
    /// Manifest href of the resource or document.
    pub location: String,
    /// Element or attribute that triggered the refusal, for markup hits.
    pub element: Option<String>,
}

impl fmt::Display for Disqualification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot process a book containing {} content ({}",
            self.kind, self.location
        )?;
        if let Some(element) = &self.element {
            write!(f, ", <{}>", element)?;
        }
        f.write_str(")")
    }
}

/// Check that the package contains nothing but static text and images.
///
/// Manifest declarations are checked first, then each textual document in
/// manifest order; the first hit is returned.
pub fn check(package: &Package) -> Result<(), Disqualification> {
    for item in &package.manifest {
        let kind = ResourceKind::from_media_type(&item.media_type).or_else(|| {
            if item.has_property("scripted") {
                Some(ResourceKind::Script)
            } else if item.has_property("mathml") {
                Some(ResourceKind::Math)
            } else {
                None
            }
        });
        if let Some(kind) = kind {
            return Err(Disqualification {
                kind,
                location: item.href.clone(),
                element: None,
            });
        }
    }

    for item in &package.manifest {
        if !is_textual(&item.media_type) {
            continue;
        }
        let Some(resource) = package.get_resource(&item.href) else {
            continue;
        };
        if let Some((kind, element)) = scan_markup(&resource.data) {
            return Err(Disqualification {
                kind,
                location: item.href.clone(),
                element: Some(element),
            });
        }
    }

    debug!("package qualifies for automated processing");
    Ok(())
}

/// Scan one document for disqualifying markup.
///
/// Returns the kind and the element (or `element@attribute`) found. A
/// document that fails to parse is scanned up to the error; malformed markup
/// is reported later, per document, by the mutator.
pub fn scan_markup(bytes: &[u8]) -> Option<(ResourceKind, String)> {
    let content = decode_markup(bytes);
    let mut reader = Reader::from_str(&content);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if let Some(hit) = scan_element(&e) {
                    return Some(hit);
                }
            }
            Ok(Event::Eof) => return None,
            Err(e) => {
                debug!(error = %e, "stopped qualification scan at parse error");
                return None;
            }
            _ => {}
        }
    }
}

fn scan_element(e: &BytesStart<'_>) -> Option<(ResourceKind, String)> {
    let name = e.name();
    let local = String::from_utf8_lossy(local_name(name.as_ref())).to_ascii_lowercase();

    let kind = match local.as_str() {
        "script" => Some(ResourceKind::Script),
        "audio" => Some(ResourceKind::Audio),
        "video" => Some(ResourceKind::Video),
        "math" => Some(ResourceKind::Math),
        "embed" | "object" | "source" => match attr_value(e, b"type") {
            Some(media_type) => ResourceKind::from_media_type(&media_type),
            None => attr_value(e, b"src")
                .or_else(|| attr_value(e, b"data"))
                .and_then(|url| ResourceKind::from_extension(&url)),
        }
        .filter(|k| matches!(k, ResourceKind::Audio | ResourceKind::Video)),
        _ => None,
    };
    if let Some(kind) = kind {
        return Some((kind, local));
    }

    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
        if key.starts_with("on") && key.len() > 2 {
            return Some((ResourceKind::Script, format!("{}@{}", local, key)));
        }
        if matches!(key.as_str(), "href" | "src" | "action" | "xlink:href") {
            let trimmed: Vec<u8> = attr
                .value
                .iter()
                .copied()
                .skip_while(u8::is_ascii_whitespace)
                .take(11)
                .collect();
            if trimmed.eq_ignore_ascii_case(b"javascript:") {
                return Some((ResourceKind::Script, format!("{}@{}", local, key)));
            }
        }
    }

    None
}
