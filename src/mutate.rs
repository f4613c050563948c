//! Content document rewriting.
//!
//! Each document is streamed through quick-xml once. Events that need no
//! change are copied as read, and a start tag is rebuilt only when one of
//! its attributes changes, so running the mutator over its own output
//! reproduces that output byte for byte.
//!
//! Edits, in order of appearance in a document:
//!
//! - `<html>` gets `lang` and `xml:lang` set to the book language;
//! - `<head>` ends up with one non-empty `<title>`, synthesized from the
//!   navigation title when the document has none;
//! - every `<img>` outside `<svg>` gets an `alt` attribute (empty when
//!   missing) and is recorded for review;
//! - in EPUB 3, the landmark element gets its `epub:type`, and any element
//!   with a mapped `epub:type` gets the matching ARIA `role`.

use std::fmt;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};

use crate::book::PackageVersion;
use crate::error::{Error, Result};
use crate::nav::NavEntry;
use crate::roles;
use crate::util::decode_markup;
use crate::xml::{attr_value, has_attr, local_name, resolve_entity, set_attributes};

const EPUB_NAMESPACE: &str = "http://www.idpf.org/2007/ops";

/// One `<img>` found in a content document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Href of the owning document.
    pub document: String,
    /// Position among the document's `<img>` elements outside `<svg>`.
    pub index: usize,
    /// `src` as written in the document.
    pub src: String,
    /// Current alt text.
    pub alt: String,
    /// The `alt` attribute was missing and has been added empty.
    pub created: bool,
}

/// Non-fatal problems found while rewriting a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    /// No usable `<title>` and no navigation title to synthesize one from.
    MissingTitle,
    /// The document has no `<head>`, so no title could be added.
    MissingHead,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingTitle => f.write_str("document has no title and navigation offers none"),
            Warning::MissingHead => f.write_str("document has no <head>"),
        }
    }
}

/// Output of [`mutate`].
#[derive(Debug, Clone)]
pub struct Mutation {
    /// Rewritten document, UTF-8 encoded.
    pub output: Vec<u8>,
    pub images: Vec<ImageRecord>,
    pub warnings: Vec<Warning>,
}

/// Rewrite one content document.
///
/// `nav` supplies the title to synthesize and the landmark to annotate;
/// without it only language, title presence and alt fixes apply. Markup that
/// cannot be parsed fails with [`Error::Malformed`] and nothing is produced.
pub fn mutate(
    href: &str,
    bytes: &[u8],
    nav: Option<&NavEntry>,
    language: &str,
    version: PackageVersion,
) -> Result<Mutation> {
    let content = decode_markup(bytes);
    let mut reader = Reader::from_str(&content);
    let mut writer = Writer::new(Vec::with_capacity(content.len() + 256));

    let semantics = version.supports_semantics();
    let mut landmark = nav
        .and_then(|entry| entry.landmark.as_ref())
        .filter(|_| semantics)
        .and_then(|landmark| {
            roles::landmark_type(&landmark.token)
                .map(|value| (value, landmark.fragment.as_deref()))
        });
    let mut editor = TagEditor {
        href,
        language,
        semantics,
        declare_epub_namespace: landmark.is_some(),
        images: ImageCounter::default(),
        records: Vec::new(),
    };
    let nav_title = nav
        .and_then(|entry| entry.title.as_deref())
        .map(str::trim)
        .filter(|title| !title.is_empty());

    let mut warnings = Vec::new();
    let mut head: Option<Vec<Event<'_>>> = None;
    let mut head_seen = false;

    loop {
        let event = reader.read_event().map_err(|e| malformed(href, e))?;
        let event = match event {
            Event::Eof => break,
            Event::Decl(decl) => Event::Decl(utf8_decl(decl)),
            Event::Start(e) => {
                let local = local_name(e.name().as_ref()).to_vec();
                let e = editor.edit(e, &mut landmark)?;
                editor.images.enter(&local);
                if local == b"head" && !head_seen {
                    head_seen = true;
                    writer.write_event(Event::Start(e))?;
                    head = Some(Vec::new());
                    continue;
                }
                Event::Start(e)
            }
            Event::Empty(e) => {
                let local = local_name(e.name().as_ref()).to_vec();
                let e = editor.edit(e, &mut landmark)?;
                if local == b"head" && !head_seen {
                    head_seen = true;
                    match nav_title {
                        Some(title) => {
                            let end = end_tag(&e);
                            writer.write_event(Event::Start(e))?;
                            for event in synthesized_title(None, title) {
                                writer.write_event(event)?;
                            }
                            writer.write_event(Event::End(end))?;
                        }
                        None => {
                            warnings.push(Warning::MissingTitle);
                            writer.write_event(Event::Empty(e))?;
                        }
                    }
                    continue;
                }
                Event::Empty(e)
            }
            Event::End(e) => {
                let qname = e.name();
                let local = local_name(qname.as_ref());
                editor.images.leave(local);
                if local == b"head"
                    && let Some(events) = head.take()
                {
                    let (events, titled) = settle_title(events, nav_title);
                    if !titled {
                        warnings.push(Warning::MissingTitle);
                    }
                    for event in events {
                        writer.write_event(event)?;
                    }
                }
                Event::End(e)
            }
            other => other,
        };

        match head.as_mut() {
            Some(events) => events.push(event),
            None => writer.write_event(event)?,
        }
    }

    if head.is_some() {
        return Err(Error::Malformed {
            href: href.to_string(),
            reason: "unclosed <head>".into(),
        });
    }
    if !head_seen {
        warnings.push(Warning::MissingHead);
    }

    Ok(Mutation {
        output: writer.into_inner(),
        images: editor.records,
        warnings,
    })
}

// ----------------------------------------------------------------------------
// Start tag edits
// ----------------------------------------------------------------------------

/// Per-document state for start tag edits.
struct TagEditor<'d> {
    href: &'d str,
    language: &'d str,
    semantics: bool,
    declare_epub_namespace: bool,
    images: ImageCounter,
    records: Vec<ImageRecord>,
}

impl TagEditor<'_> {
    /// Apply every attribute edit for this element. The tag is returned as is
    /// when nothing changes.
    fn edit<'a>(
        &mut self,
        e: BytesStart<'a>,
        landmark: &mut Option<(String, Option<&str>)>,
    ) -> Result<BytesStart<'a>> {
        let qname = e.name();
        let local = local_name(qname.as_ref());
        let mut updates: Vec<(&'static str, &str)> = Vec::new();

        if local == b"html" {
            for key in ["lang", "xml:lang"] {
                if attr_value(&e, key.as_bytes()).as_deref() != Some(self.language) {
                    updates.push((key, self.language));
                }
            }
            if self.declare_epub_namespace && !has_attr(&e, b"xmlns:epub") {
                updates.push(("xmlns:epub", EPUB_NAMESPACE));
            }
        }

        if let Some(index) = self.images.image(local) {
            let alt = attr_value(&e, b"alt");
            if alt.is_none() {
                updates.push(("alt", ""));
            }
            self.records.push(ImageRecord {
                document: self.href.to_string(),
                index,
                src: attr_value(&e, b"src").unwrap_or_default(),
                created: alt.is_none(),
                alt: alt.unwrap_or_default(),
            });
        }

        if !self.semantics {
            return self.rebuild(e, &updates);
        }

        let mut epub_type = attr_value(&e, b"epub:type");
        let is_target = match landmark.as_ref() {
            Some((_, Some(id))) => attr_value(&e, b"id").as_deref() == Some(*id),
            Some((_, None)) => local == b"body",
            None => false,
        };
        let mut injected = false;
        if is_target
            && let Some((value, _)) = landmark.take()
            && epub_type.is_none()
        {
            epub_type = Some(value);
            injected = true;
        }

        let role = epub_type
            .as_deref()
            .and_then(roles::aria_role)
            .filter(|_| !has_attr(&e, b"role"));
        if injected && let Some(value) = epub_type.as_deref() {
            updates.push(("epub:type", value));
        }
        if let Some(role) = role {
            updates.push(("role", role));
        }

        self.rebuild(e, &updates)
    }

    fn rebuild<'a>(&self, e: BytesStart<'a>, updates: &[(&str, &str)]) -> Result<BytesStart<'a>> {
        if updates.is_empty() {
            return Ok(e);
        }
        set_attributes(&e, updates).map_err(|err| malformed(self.href, err))
    }
}

/// Numbers `<img>` elements outside `<svg>` in document order.
#[derive(Debug, Default)]
pub(crate) struct ImageCounter {
    svg_depth: usize,
    next: usize,
}

impl ImageCounter {
    /// Call for every start or empty tag; returns the image's index for an
    /// `<img>` that counts.
    pub(crate) fn image(&mut self, local: &[u8]) -> Option<usize> {
        if local != b"img" || self.svg_depth > 0 {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(index)
    }

    /// Call for start tags only.
    pub(crate) fn enter(&mut self, local: &[u8]) {
        if local == b"svg" {
            self.svg_depth += 1;
        }
    }

    pub(crate) fn leave(&mut self, local: &[u8]) {
        if local == b"svg" {
            self.svg_depth = self.svg_depth.saturating_sub(1);
        }
    }
}

// ----------------------------------------------------------------------------
// Title
// ----------------------------------------------------------------------------

/// A `<title>` element within buffered head events.
struct TitleSpan {
    start: usize,
    end: usize,
    has_text: bool,
}

/// Leave exactly one title in the head. The first title with text is kept;
/// when there is none, the first title is filled (or one is appended) from
/// `fallback`. Every other title is removed.
///
/// Returns the events and whether the head now has a non-empty title.
fn settle_title<'a>(head: Vec<Event<'a>>, fallback: Option<&str>) -> (Vec<Event<'a>>, bool) {
    let spans = title_spans(&head);
    let with_text = spans.iter().position(|span| span.has_text);
    let retained = with_text.or(if spans.is_empty() { None } else { Some(0) });
    let fill = match with_text {
        Some(_) => None,
        None => fallback,
    };

    let mut dropped = vec![false; head.len()];
    let mut replace_at = None;
    for (j, span) in spans.iter().enumerate() {
        if Some(j) == retained {
            if fill.is_some() {
                replace_at = Some(span.start);
                dropped[span.start + 1..=span.end].fill(true);
            }
        } else {
            dropped[span.start..=span.end].fill(true);
        }
    }

    let mut out = Vec::with_capacity(head.len() + 3);
    for (i, event) in head.into_iter().enumerate() {
        if dropped[i] {
            continue;
        }
        match (replace_at == Some(i), fill) {
            (true, Some(title)) => {
                let start = match &event {
                    Event::Start(e) | Event::Empty(e) => Some(e),
                    _ => None,
                };
                out.extend(synthesized_title(start, title));
            }
            _ => out.push(event),
        }
    }
    if retained.is_none()
        && let Some(title) = fill
    {
        out.extend(synthesized_title(None, title));
    }

    (out, with_text.is_some() || fill.is_some())
}

fn title_spans(head: &[Event<'_>]) -> Vec<TitleSpan> {
    let mut spans = Vec::new();
    let mut open: Option<TitleSpan> = None;

    for (i, event) in head.iter().enumerate() {
        match event {
            Event::Start(e) if open.is_none() && local_name(e.name().as_ref()) == b"title" => {
                open = Some(TitleSpan {
                    start: i,
                    end: i,
                    has_text: false,
                });
            }
            Event::Empty(e) if open.is_none() && local_name(e.name().as_ref()) == b"title" => {
                spans.push(TitleSpan {
                    start: i,
                    end: i,
                    has_text: false,
                });
            }
            Event::End(e) if local_name(e.name().as_ref()) == b"title" => {
                if let Some(mut span) = open.take() {
                    span.end = i;
                    spans.push(span);
                }
            }
            Event::Text(t) => mark_text(&mut open, &String::from_utf8_lossy(t.as_ref())),
            Event::CData(t) => mark_text(&mut open, &String::from_utf8_lossy(t.as_ref())),
            Event::GeneralRef(r) => {
                let entity = String::from_utf8_lossy(r.as_ref());
                // Unknown entities still count as content.
                let text = resolve_entity(&entity).unwrap_or_else(|| entity.to_string());
                mark_text(&mut open, &text);
            }
            _ => {}
        }
    }
    spans
}

fn mark_text(open: &mut Option<TitleSpan>, text: &str) {
    if let Some(span) = open
        && !text.trim().is_empty()
    {
        span.has_text = true;
    }
}

/// `<title>` with the given text, reusing an existing title tag's attributes.
fn synthesized_title<'a>(start: Option<&BytesStart<'a>>, title: &str) -> [Event<'a>; 3] {
    let start = start.cloned().unwrap_or_else(|| BytesStart::new("title"));
    let end = end_tag(&start);
    [
        Event::Start(start),
        Event::Text(BytesText::new(title).into_owned()),
        Event::End(end),
    ]
}

fn end_tag(start: &BytesStart<'_>) -> BytesEnd<'static> {
    BytesEnd::new(String::from_utf8_lossy(start.name().as_ref()).into_owned())
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Output is always UTF-8; a declaration naming another encoding is updated.
pub(crate) fn utf8_decl(decl: BytesDecl<'_>) -> BytesDecl<'_> {
    let is_utf8 = match decl.encoding() {
        Some(Ok(encoding)) => encoding.eq_ignore_ascii_case(b"utf-8"),
        _ => true,
    };
    if is_utf8 {
        return decl;
    }
    let version = decl
        .version()
        .map(|v| String::from_utf8_lossy(&v).into_owned())
        .unwrap_or_else(|_| "1.0".to_string());
    let standalone = match decl.standalone() {
        Some(Ok(value)) => Some(String::from_utf8_lossy(&value).into_owned()),
        _ => None,
    };
    BytesDecl::new(&version, Some("UTF-8"), standalone.as_deref())
}

fn malformed(href: &str, err: impl fmt::Display) -> Error {
    Error::Malformed {
        href: href.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn run(doc: &str, nav: Option<&NavEntry>, version: PackageVersion) -> Mutation {
        mutate("text/doc.xhtml", doc.as_bytes(), nav, "en", version).unwrap()
    }

    fn output(m: &Mutation) -> String {
        String::from_utf8(m.output.clone()).unwrap()
    }

    fn assert_stable(doc: &str, nav: Option<&NavEntry>, version: PackageVersion) {
        let first = run(doc, nav, version);
        let second = mutate("text/doc.xhtml", &first.output, nav, "en", version).unwrap();
        assert_eq!(output(&first), output(&second));
    }

    const INDEX: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
</head>
<body>
  <p><img src="../images/cat.jpg" alt="A cat"/></p>
  <p><img src="../images/dog.png" /></p>
</body>
</html>"#;

    #[test]
    fn test_end_to_end_document() {
        let nav = NavEntry::new("index.xhtml").with_title("Home");
        let m = run(INDEX, Some(&nav), PackageVersion::Epub3);
        let out = output(&m);

        assert!(out.contains(r#"<html xmlns="http://www.w3.org/1999/xhtml" lang="en" xml:lang="en">"#));
        assert!(out.contains("<title>Home</title></head>"));
        assert!(out.contains(r#"<img src="../images/cat.jpg" alt="A cat"/>"#));
        assert!(out.contains(r#"<img src="../images/dog.png" alt=""/>"#));
        assert!(m.warnings.is_empty());

        assert_eq!(m.images.len(), 2);
        assert_eq!(m.images[0].alt, "A cat");
        assert!(!m.images[0].created);
        assert_eq!(m.images[1].index, 1);
        assert_eq!(m.images[1].src, "../images/dog.png");
        assert_eq!(m.images[1].alt, "");
        assert!(m.images[1].created);

        assert_stable(INDEX, Some(&nav), PackageVersion::Epub3);
    }

    #[test]
    fn test_untouched_document_is_copied() {
        let doc = r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" lang="en" xml:lang="en">
<head><title>Already &amp; done</title><!-- note --></head>
<body><p class='x'>Text &#8212; <br/>more</p><![CDATA[raw]]></body>
</html>"#;
        let m = run(doc, None, PackageVersion::Epub2);
        assert_eq!(output(&m), doc);
        assert!(m.warnings.is_empty());
    }

    #[test]
    fn test_language_replaced_when_different() {
        let doc = r#"<html lang="fr" xml:lang="en"><head><title>T</title></head><body/></html>"#;
        let out = output(&run(doc, None, PackageVersion::Epub2));
        assert!(out.starts_with(r#"<html lang="en" xml:lang="en">"#));
    }

    #[test]
    fn test_title_synthesized_from_nav() {
        let nav = NavEntry::new("doc.xhtml").with_title("Preface");
        let doc = r#"<html><head><meta charset="utf-8"/></head><body/></html>"#;
        let out = output(&run(doc, Some(&nav), PackageVersion::Epub2));
        assert!(out.contains(r#"<head><meta charset="utf-8"/><title>Preface</title></head>"#));
    }

    #[test]
    fn test_empty_title_filled() {
        let nav = NavEntry::new("doc.xhtml").with_title("Q & A");
        for doc in [
            r#"<html><head><title>  </title></head><body/></html>"#,
            r#"<html><head><title/></head><body/></html>"#,
        ] {
            let m = run(doc, Some(&nav), PackageVersion::Epub2);
            assert!(output(&m).contains("<head><title>Q &amp; A</title></head>"), "{doc}");
            assert!(m.warnings.is_empty());
            assert_stable(doc, Some(&nav), PackageVersion::Epub2);
        }
    }

    #[test]
    fn test_missing_title_without_nav_warns() {
        let doc = r#"<html><head><title></title></head><body/></html>"#;
        let m = run(doc, None, PackageVersion::Epub2);
        assert_eq!(m.warnings, vec![Warning::MissingTitle]);
        // Left as it was.
        assert!(output(&m).contains("<head><title></title></head>"));

        let nav = NavEntry::new("doc.xhtml").with_landmark("cover", None);
        let m = run(doc, Some(&nav), PackageVersion::Epub2);
        assert_eq!(m.warnings, vec![Warning::MissingTitle]);
    }

    #[test]
    fn test_extra_titles_dropped() {
        let nav = NavEntry::new("doc.xhtml").with_title("Nav");
        let doc = r#"<html><head><title></title><title>Real</title><title>Other</title></head><body/></html>"#;
        let out = output(&run(doc, Some(&nav), PackageVersion::Epub2));
        assert!(out.contains("<head><title>Real</title></head>"));
    }

    #[test]
    fn test_empty_head_element() {
        let nav = NavEntry::new("doc.xhtml").with_title("Cover");
        let doc = r#"<html><head/><body/></html>"#;
        let m = run(doc, Some(&nav), PackageVersion::Epub2);
        assert!(output(&m).contains("<head><title>Cover</title></head>"));
        assert_stable(doc, Some(&nav), PackageVersion::Epub2);

        let m = run(doc, None, PackageVersion::Epub2);
        assert_eq!(m.warnings, vec![Warning::MissingTitle]);
    }

    #[test]
    fn test_missing_head_warns() {
        let nav = NavEntry::new("doc.xhtml").with_title("Cover");
        let m = run(r#"<html><body><p>x</p></body></html>"#, Some(&nav), PackageVersion::Epub2);
        assert_eq!(m.warnings, vec![Warning::MissingHead]);
        assert!(!output(&m).contains("<title>"));
    }

    #[test]
    fn test_svg_images_skipped() {
        let doc = r#"<html><head><title>T</title></head><body>
<svg xmlns="http://www.w3.org/2000/svg"><foreignObject><img src="in-svg.png"/></foreignObject><image href="cover.jpg"/></svg>
<img src="after.png"/>
</body></html>"#;
        let m = run(doc, None, PackageVersion::Epub3);
        let out = output(&m);
        assert!(out.contains(r#"<img src="in-svg.png"/>"#));
        assert!(out.contains(r#"<img src="after.png" alt=""/>"#));
        assert_eq!(m.images.len(), 1);
        assert_eq!(m.images[0].index, 0);
        assert_eq!(m.images[0].src, "after.png");
    }

    #[test]
    fn test_landmark_on_body() {
        let nav = NavEntry::new("doc.xhtml")
            .with_title("Cover")
            .with_landmark("cover", None);
        let doc = r#"<html xmlns="http://www.w3.org/1999/xhtml"><head><title>Cover</title></head><body class="c"><p/></body></html>"#;
        let out = output(&run(doc, Some(&nav), PackageVersion::Epub3));
        assert!(out.contains(r#"xmlns:epub="http://www.idpf.org/2007/ops""#));
        assert!(out.contains(r#"<body class="c" epub:type="cover" role="doc-cover">"#));
        assert_stable(doc, Some(&nav), PackageVersion::Epub3);
    }

    #[test]
    fn test_landmark_on_fragment() {
        let nav = NavEntry::new("doc.xhtml").with_landmark("loi", Some("figures"));
        let doc = r#"<html><head><title>T</title></head><body><section id="intro"/><section id="figures"><h1>Figures</h1></section></body></html>"#;
        let out = output(&run(doc, Some(&nav), PackageVersion::Epub3));
        assert!(out.contains(r#"<body>"#));
        assert!(out.contains(r#"<section id="intro"/>"#));
        assert!(out.contains(r#"<section id="figures" epub:type="loi" role="directory">"#));
    }

    #[test]
    fn test_landmark_with_several_tokens() {
        let nav = NavEntry::new("doc.xhtml").with_landmark("frontmatter  preface", None);
        let doc = r#"<html><head><title>T</title></head><body><p/></body></html>"#;
        let out = output(&run(doc, Some(&nav), PackageVersion::Epub3));
        assert!(out.contains(r#"xmlns:epub="http://www.idpf.org/2007/ops""#));
        assert!(out.contains(r#"<body epub:type="frontmatter preface" role="doc-preface">"#));
        assert_stable(doc, Some(&nav), PackageVersion::Epub3);

        let nav = NavEntry::new("doc.xhtml").with_landmark("made-up other", None);
        let out = output(&run(doc, Some(&nav), PackageVersion::Epub3));
        assert!(out.contains("<body><p/>"));
    }

    #[test]
    fn test_author_semantics_kept() {
        let nav = NavEntry::new("doc.xhtml").with_landmark("bodymatter", None);
        let doc = r#"<html xmlns:epub="http://www.idpf.org/2007/ops"><head><title>T</title></head><body epub:type="chapter" role="main"><aside epub:type="footnote">n</aside></body></html>"#;
        let out = output(&run(doc, Some(&nav), PackageVersion::Epub3));
        assert!(out.contains(r#"<body epub:type="chapter" role="main">"#));
        assert!(out.contains(r#"<aside epub:type="footnote" role="doc-footnote">"#));
    }

    #[test]
    fn test_role_free_semantics() {
        let nav = NavEntry::new("doc.xhtml").with_landmark("bodymatter", None);
        let doc = r#"<html><head><title>T</title></head><body></body></html>"#;
        let out = output(&run(doc, Some(&nav), PackageVersion::Epub3));
        assert!(out.contains(r#"<body epub:type="bodymatter">"#));
    }

    #[test]
    fn test_no_semantics_in_epub2_or_for_unknown_tokens() {
        let doc = r#"<html><head><title>T</title></head><body><div epub:type="chapter"/></body></html>"#;

        let nav = NavEntry::new("doc.xhtml").with_landmark("cover", None);
        let out = output(&run(doc, Some(&nav), PackageVersion::Epub2));
        assert!(!out.contains("xmlns:epub"));
        assert!(out.contains("<body>"));
        assert!(!out.contains("role="));

        let nav = NavEntry::new("doc.xhtml").with_landmark("made-up", None);
        let out = output(&run(doc, Some(&nav), PackageVersion::Epub3));
        assert!(!out.contains("xmlns:epub"));
        assert!(out.contains("<body>"));
        assert!(out.contains(r#"<div epub:type="chapter" role="doc-chapter"/>"#));
    }

    #[test]
    fn test_legacy_encoding_rewritten_as_utf8() {
        let mut doc = br#"<?xml version="1.0" encoding="iso-8859-1"?>
<html><head><title>Caf"#
            .to_vec();
        doc.push(0xE9);
        doc.extend_from_slice(b"</title></head><body/></html>");

        let m = mutate("doc.xhtml", &doc, None, "fr", PackageVersion::Epub2).unwrap();
        let out = String::from_utf8(m.output).unwrap();
        assert!(out.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(out.contains("<title>Café</title>"));
    }

    #[test]
    fn test_malformed_document() {
        let doc = r#"<html><head><title>T</title></head><body><p></div></body></html>"#;
        let err = mutate("bad.xhtml", doc.as_bytes(), None, "en", PackageVersion::Epub3).unwrap_err();
        assert!(matches!(err, Error::Malformed { ref href, .. } if href == "bad.xhtml"));
    }

    #[test]
    fn test_image_counter() {
        let mut counter = ImageCounter::default();
        assert_eq!(counter.image(b"img"), Some(0));
        counter.enter(b"svg");
        assert_eq!(counter.image(b"img"), None);
        counter.leave(b"svg");
        assert_eq!(counter.image(b"img"), Some(1));
        assert_eq!(counter.image(b"p"), None);
    }

    fn text() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![
                prop::char::range('a', 'z'),
                Just(' '),
                Just('&'),
                Just('<'),
                Just('"'),
                Just('\''),
                Just('é'),
            ],
            0..16,
        )
        .prop_map(|chars| chars.into_iter().collect())
    }

    proptest! {
        #[test]
        fn prop_mutate_is_idempotent(
            title in text(),
            alt in prop::option::of(text()),
            nav_title in prop::option::of(text()),
            with_landmark in any::<bool>(),
            epub3 in any::<bool>(),
        ) {
            let alt_attr = alt
                .map(|a| format!(r#" alt="{}""#, quick_xml::escape::escape(a.as_str())))
                .unwrap_or_default();
            let doc = format!(
                r#"<html><head><title>{}</title></head><body><img src="a.png"{}/><svg><img src="b.png"/></svg></body></html>"#,
                quick_xml::escape::escape(title.as_str()),
                alt_attr,
            );
            let mut nav = NavEntry::new("doc.xhtml");
            nav.title = nav_title;
            if with_landmark {
                nav = nav.with_landmark("preface", None);
            }
            let version = if epub3 { PackageVersion::Epub3 } else { PackageVersion::Epub2 };

            let first = mutate("doc.xhtml", doc.as_bytes(), Some(&nav), "en", version).unwrap();
            let second = mutate("doc.xhtml", &first.output, Some(&nav), "en", version).unwrap();
            prop_assert_eq!(&first.output, &second.output);
            prop_assert_eq!(first.images.len(), 1);
            prop_assert_eq!(&second.images, &first.images.iter().cloned().map(|mut r| { r.created = false; r }).collect::<Vec<_>>());

            let out = String::from_utf8(second.output).unwrap();
            prop_assert!(out.contains(r#"lang="en" xml:lang="en""#));
        }
    }
}
