//! EPUB 3 navigation document.

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{Landmark, NavEntry, normalize_title};
use crate::error::Result;
use crate::util::decode_markup;
use crate::xml::{attr_value, local_name, resolve_entity, resolve_href, split_fragment};

/// Result of parsing a navigation document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedNav {
    /// One entry per target document: toc documents in order, then documents
    /// only reachable from the landmarks list.
    pub entries: Vec<NavEntry>,
    /// Text of the document's first `<h1>`.
    pub heading: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NavKind {
    Toc,
    Landmarks,
    Other,
}

/// A link being read: resolved href, fragment, `epub:type`, text so far.
struct OpenLink {
    href: String,
    fragment: Option<String>,
    epub_type: Option<String>,
    text: String,
}

/// Parse a navigation document.
///
/// Inside `<nav epub:type="toc">` every link names its target document; the
/// first link to a document gives its title. Inside
/// `<nav epub:type="landmarks">` every typed link classifies its target; the
/// last typed link to a document wins.
pub fn parse_nav_document(bytes: &[u8], nav_href: &str) -> Result<ParsedNav> {
    let content = decode_markup(bytes);
    let mut reader = Reader::from_str(&content);

    let mut navs: Vec<NavKind> = Vec::new();
    let mut link: Option<OpenLink> = None;
    let mut heading: Option<String> = None;
    let mut heading_text: Option<String> = None;

    let mut toc_order: Vec<String> = Vec::new();
    let mut toc_titles: HashMap<String, Option<String>> = HashMap::new();
    let mut landmark_order: Vec<String> = Vec::new();
    let mut landmarks: HashMap<String, (Landmark, Option<String>)> = HashMap::new();

    let mut finish = |link: OpenLink, kind: Option<NavKind>| {
        let title = normalize_title(&link.text);
        match kind {
            Some(NavKind::Toc) => {
                if !toc_titles.contains_key(&link.href) {
                    toc_order.push(link.href.clone());
                    toc_titles.insert(link.href, title);
                }
            }
            Some(NavKind::Landmarks) => {
                let Some(token) = link.epub_type else { return };
                if !landmarks.contains_key(&link.href) {
                    landmark_order.push(link.href.clone());
                }
                let landmark = Landmark {
                    token,
                    fragment: link.fragment,
                };
                landmarks.insert(link.href, (landmark, title));
            }
            _ => {}
        }
    };

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"nav" => navs.push(nav_kind(&e)),
                b"a" if is_collecting(&navs) => link = open_link(&e, nav_href),
                b"h1" if heading.is_none() && heading_text.is_none() => {
                    heading_text = Some(String::new())
                }
                _ => {}
            },
            Event::Empty(e) => {
                if local_name(e.name().as_ref()) == b"a"
                    && is_collecting(&navs)
                    && let Some(empty) = open_link(&e, nav_href)
                {
                    finish(empty, navs.last().copied());
                }
            }
            Event::Text(e) => {
                let text = String::from_utf8_lossy(e.as_ref());
                push_text(&mut link, &mut heading_text, &text);
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(e.as_ref());
                push_text(&mut link, &mut heading_text, &text);
            }
            Event::GeneralRef(e) => {
                let entity = String::from_utf8_lossy(e.as_ref());
                if let Some(resolved) = resolve_entity(&entity) {
                    push_text(&mut link, &mut heading_text, &resolved);
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"nav" => {
                    navs.pop();
                }
                b"a" => {
                    if let Some(open) = link.take() {
                        finish(open, navs.last().copied());
                    }
                }
                b"h1" => {
                    if let Some(text) = heading_text.take() {
                        heading = Some(normalize_title(&text).unwrap_or_default());
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    let mut entries = Vec::with_capacity(toc_order.len() + landmark_order.len());
    for href in toc_order {
        let title = toc_titles.remove(&href).flatten();
        let (landmark, landmark_title) = match landmarks.remove(&href) {
            Some((landmark, text)) => (Some(landmark), text),
            None => (None, None),
        };
        entries.push(NavEntry {
            href,
            title: title.or(landmark_title),
            landmark,
        });
    }
    for href in landmark_order {
        if let Some((landmark, title)) = landmarks.remove(&href) {
            entries.push(NavEntry {
                href,
                title,
                landmark: Some(landmark),
            });
        }
    }

    Ok(ParsedNav {
        entries,
        heading: heading.filter(|h| !h.is_empty()),
    })
}

fn nav_kind(e: &BytesStart<'_>) -> NavKind {
    let epub_type = attr_value(e, b"epub:type").unwrap_or_default();
    let mut tokens = epub_type.split_ascii_whitespace();
    if tokens.clone().any(|t| t == "toc") {
        NavKind::Toc
    } else if tokens.any(|t| t == "landmarks") {
        NavKind::Landmarks
    } else {
        NavKind::Other
    }
}

fn is_collecting(navs: &[NavKind]) -> bool {
    matches!(navs.last(), Some(NavKind::Toc | NavKind::Landmarks))
}

fn open_link(e: &BytesStart<'_>, nav_href: &str) -> Option<OpenLink> {
    let raw = attr_value(e, b"href")?;
    let (_, fragment) = split_fragment(&raw);
    let fragment = fragment.map(str::to_string);
    // A bare "#id" points into the nav document itself.
    let href = if raw.trim_start().starts_with('#') {
        nav_href.to_string()
    } else {
        resolve_href(nav_href, &raw)?
    };
    Some(OpenLink {
        href,
        fragment,
        epub_type: attr_value(e, b"epub:type")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()),
        text: String::new(),
    })
}

fn push_text(link: &mut Option<OpenLink>, heading: &mut Option<String>, text: &str) {
    if let Some(link) = link {
        link.text.push_str(text);
    }
    if let Some(heading) = heading {
        heading.push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAV: &str = r##"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>Navigation</title></head>
<body>
  <h1>Table of <em>Contents</em></h1>
  <nav epub:type="toc" id="toc">
    <ol>
      <li><a href="text/cover.xhtml">Cover</a></li>
      <li><a href="text/ch1.xhtml">Chapter
          One</a>
        <ol>
          <li><a href="text/ch1.xhtml#s1">Section 1.1</a></li>
        </ol>
      </li>
      <li><a href="text/notes.xhtml">Notes &amp; Sources</a></li>
    </ol>
  </nav>
  <nav epub:type="landmarks" hidden="">
    <ol>
      <li><a epub:type="cover" href="text/cover.xhtml">Cover</a></li>
      <li><a epub:type="toc" href="#toc">Contents</a></li>
      <li><a epub:type="bodymatter" href="text/ch1.xhtml">Start</a></li>
      <li><a href="text/notes.xhtml">Untyped</a></li>
      <li><a epub:type="loi" href="text/figures.xhtml#list">Illustrations</a></li>
    </ol>
  </nav>
  <nav epub:type="page-list" hidden="">
    <ol><li><a href="text/ch1.xhtml#p1">1</a></li></ol>
  </nav>
</body>
</html>"##;

    fn parsed() -> ParsedNav {
        parse_nav_document(NAV.as_bytes(), "nav.xhtml").unwrap()
    }

    fn entry<'a>(nav: &'a ParsedNav, href: &str) -> &'a NavEntry {
        nav.entries.iter().find(|e| e.href == href).unwrap()
    }

    #[test]
    fn test_toc_titles() {
        let nav = parsed();
        assert_eq!(entry(&nav, "text/cover.xhtml").title.as_deref(), Some("Cover"));
        // First link wins over the nested section link; whitespace collapsed.
        assert_eq!(entry(&nav, "text/ch1.xhtml").title.as_deref(), Some("Chapter One"));
        assert_eq!(
            entry(&nav, "text/notes.xhtml").title.as_deref(),
            Some("Notes & Sources")
        );
    }

    #[test]
    fn test_landmarks() {
        let nav = parsed();
        let ch1 = entry(&nav, "text/ch1.xhtml");
        assert_eq!(
            ch1.landmark,
            Some(Landmark {
                token: "bodymatter".into(),
                fragment: None
            })
        );
        assert_eq!(entry(&nav, "text/cover.xhtml").landmark.as_ref().unwrap().token, "cover");
        // Untyped landmark links classify nothing.
        assert_eq!(entry(&nav, "text/notes.xhtml").landmark, None);
    }

    #[test]
    fn test_landmark_only_documents() {
        let nav = parsed();
        let figures = entry(&nav, "text/figures.xhtml");
        assert_eq!(figures.title.as_deref(), Some("Illustrations"));
        let landmark = figures.landmark.as_ref().unwrap();
        assert_eq!(landmark.token, "loi");
        assert_eq!(landmark.fragment.as_deref(), Some("list"));

        let own = entry(&nav, "nav.xhtml");
        assert_eq!(own.landmark.as_ref().unwrap().token, "toc");
        assert_eq!(own.landmark.as_ref().unwrap().fragment.as_deref(), Some("toc"));
    }

    #[test]
    fn test_page_list_ignored() {
        let nav = parsed();
        let hrefs: Vec<&str> = nav.entries.iter().map(|e| e.href.as_str()).collect();
        assert_eq!(
            hrefs,
            vec![
                "text/cover.xhtml",
                "text/ch1.xhtml",
                "text/notes.xhtml",
                "nav.xhtml",
                "text/figures.xhtml"
            ]
        );
    }

    #[test]
    fn test_heading() {
        assert_eq!(parsed().heading.as_deref(), Some("Table of Contents"));
    }

    #[test]
    fn test_last_landmark_wins() {
        let nav = r#"<html xmlns:epub="http://www.idpf.org/2007/ops"><body>
<nav epub:type="landmarks"><ol>
  <li><a epub:type="frontmatter" href="a.xhtml">Front</a></li>
  <li><a epub:type="preface" href="a.xhtml#pre">Preface</a></li>
</ol></nav></body></html>"#;
        let parsed = parse_nav_document(nav.as_bytes(), "nav.xhtml").unwrap();
        assert_eq!(parsed.entries.len(), 1);
        let landmark = parsed.entries[0].landmark.as_ref().unwrap();
        assert_eq!(landmark.token, "preface");
        assert_eq!(landmark.fragment.as_deref(), Some("pre"));
        assert_eq!(parsed.heading, None);
    }

    #[test]
    fn test_malformed() {
        let nav = r#"<html><body><nav epub:type="toc"><ol><li></ol></nav></body></html>"#;
        assert!(parse_nav_document(nav.as_bytes(), "nav.xhtml").is_err());
    }
}
