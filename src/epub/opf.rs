//! Package document rewriting.
//!
//! The OPF is streamed through quick-xml and copied event by event; only the
//! `<package>` start tag and the end of `<metadata>` are touched. An empty
//! `<metadata/>` is expanded so the declarations have somewhere to go.

use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::book::PackageVersion;
use crate::error::Result;
use crate::xml::{has_attr, local_name, set_attributes};

/// Fixed accessibility declarations, valid once a book has passed qualification.
pub const ACCESSIBILITY_SUMMARY: &str = "This publication conforms to WCAG 2.0 AA.";

const EPUB3_ACCESSIBILITY_META: &[(&str, &str)] = &[
    ("schema:accessibilitySummary", ACCESSIBILITY_SUMMARY),
    ("schema:accessMode", "textual"),
    ("schema:accessMode", "visual"),
    ("schema:accessModeSufficient", "textual"),
    ("schema:accessibilityFeature", "structuralNavigation"),
];

const EPUB2_ACCESSIBILITY_META: &[(&str, &str)] = &[
    ("schema:accessibilitySummary", ACCESSIBILITY_SUMMARY),
    ("schema:accessMode", "textual"),
    ("schema:accessModeSufficient", "textual"),
    ("schema:accessibilityFeature", "structuralNavigation"),
];

/// Edits to apply to the package document.
#[derive(Debug, Clone, Default)]
pub struct OpfEdits<'a> {
    /// Set `xml:lang` on `<package>` when it has none.
    pub root_language: Option<&'a str>,
    /// Append accessibility metadata in the form matching this version.
    pub accessibility_metadata: Option<PackageVersion>,
}

/// Result of [`rewrite_opf`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenOpf {
    pub content: String,
    /// Accessibility metadata was actually written. False when it was not
    /// requested or the document has no `<metadata>` element.
    pub metadata_written: bool,
}

/// Rewrite the package document. Returns the source unchanged when there is
/// nothing to do.
pub fn rewrite_opf(content: &str, edits: &OpfEdits<'_>) -> Result<RewrittenOpf> {
    if edits.root_language.is_none() && edits.accessibility_metadata.is_none() {
        return Ok(RewrittenOpf {
            content: content.to_string(),
            metadata_written: false,
        });
    }

    let mut reader = Reader::from_str(content);
    let mut writer = Writer::new(Vec::with_capacity(content.len() + 512));
    let mut metadata_written = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if local_name(e.name().as_ref()) == b"package" => {
                match edits.root_language {
                    Some(lang) if !has_attr(&e, b"xml:lang") => {
                        writer.write_event(Event::Start(set_attributes(&e, &[("xml:lang", lang)])?))?;
                    }
                    _ => writer.write_event(Event::Start(e))?,
                }
            }
            Event::End(e) if local_name(e.name().as_ref()) == b"metadata" => {
                if let Some(version) = edits.accessibility_metadata
                    && !metadata_written
                {
                    write_accessibility_meta(&mut writer, version)?;
                    metadata_written = true;
                }
                writer.write_event(Event::End(e))?;
            }
            Event::Empty(e) if local_name(e.name().as_ref()) == b"metadata" => {
                match edits.accessibility_metadata {
                    Some(version) if !metadata_written => {
                        let end = e.to_end().into_owned();
                        writer.write_event(Event::Start(e))?;
                        writer.write_event(Event::Text(BytesText::new("\n")))?;
                        write_accessibility_meta(&mut writer, version)?;
                        writer.write_event(Event::End(end))?;
                        metadata_written = true;
                    }
                    _ => writer.write_event(Event::Empty(e))?,
                }
            }
            Event::Eof => break,
            event => writer.write_event(event)?,
        }
    }

    Ok(RewrittenOpf {
        content: String::from_utf8(writer.into_inner())?,
        metadata_written,
    })
}

fn write_accessibility_meta(writer: &mut Writer<Vec<u8>>, version: PackageVersion) -> Result<()> {
    match version {
        PackageVersion::Epub3 => {
            for (property, value) in EPUB3_ACCESSIBILITY_META {
                writer
                    .create_element("meta")
                    .with_attribute(("property", *property))
                    .write_text_content(BytesText::new(value))?;
                writer.write_event(Event::Text(BytesText::new("\n")))?;
            }
        }
        PackageVersion::Epub2 => {
            for (name, value) in EPUB2_ACCESSIBILITY_META {
                writer
                    .create_element("meta")
                    .with_attributes([("name", *name), ("content", *value)])
                    .write_empty()?;
                writer.write_event(Event::Text(BytesText::new("\n")))?;
            }
        }
    }
    Ok(())
}
