//! Legacy NCX table of contents.

use std::collections::HashSet;

use quick_xml::Reader;
use quick_xml::events::Event;

use super::{NavEntry, normalize_title};
use crate::error::Result;
use crate::util::decode_markup;
use crate::xml::{attr_value, local_name, resolve_entity, resolve_href};

/// Parse an NCX into one entry per target document, in reading order.
///
/// `ncx_href` is the NCX's own package-relative href; `content src`
/// references are resolved against it. When several navPoints target the same
/// document the first one (the outermost, in document order) names it.
pub fn parse_ncx(bytes: &[u8], ncx_href: &str) -> Result<Vec<NavEntry>> {
    let content = decode_markup(bytes);
    let mut reader = Reader::from_str(&content);

    // navPoints in start order as (label, src); the stack holds indices
    // into it so nested points fill in their own slot.
    let mut points: Vec<(String, Option<String>)> = Vec::new();
    let mut stack: Vec<usize> = Vec::new();
    let mut in_text = false;
    let mut in_label = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"navPoint" => {
                    stack.push(points.len());
                    points.push((String::new(), None));
                }
                b"navLabel" => in_label = true,
                b"text" => in_text = in_label,
                b"content" => set_src(&mut points, &stack, attr_value(&e, b"src")),
                _ => {}
            },
            Event::Empty(e) => {
                if local_name(e.name().as_ref()) == b"content" {
                    set_src(&mut points, &stack, attr_value(&e, b"src"));
                }
            }
            Event::Text(e) => {
                if in_text && let Some(&i) = stack.last() {
                    points[i].0.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::CData(e) => {
                if in_text && let Some(&i) = stack.last() {
                    points[i].0.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if in_text && let Some(&i) = stack.last() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        points[i].0.push_str(&resolved);
                    }
                }
            }
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"text" => in_text = false,
                b"navLabel" => in_label = false,
                b"navPoint" => {
                    stack.pop();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    let mut seen = HashSet::new();
    let entries = points
        .into_iter()
        .filter_map(|(label, src)| {
            let href = resolve_href(ncx_href, &src?)?;
            if !seen.insert(href.clone()) {
                return None;
            }
            let mut entry = NavEntry::new(href);
            entry.title = normalize_title(&label);
            Some(entry)
        })
        .collect();

    Ok(entries)
}

fn set_src(points: &mut [(String, Option<String>)], stack: &[usize], src: Option<String>) {
    if let Some(&i) = stack.last()
        && points[i].1.is_none()
    {
        points[i].1 = src;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ncx_flat() {
        let ncx = r#"<?xml version="1.0"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <docTitle><text>The Book</text></docTitle>
  <navMap>
    <navPoint id="np1" playOrder="1">
      <navLabel><text>Chapter 1</text></navLabel>
      <content src="ch1.xhtml"/>
    </navPoint>
    <navPoint id="np2" playOrder="2">
      <navLabel><text>Tom &amp; Jerry</text></navLabel>
      <content src="ch2.xhtml#start"/>
    </navPoint>
  </navMap>
</ncx>"#;

        let entries = parse_ncx(ncx.as_bytes(), "toc.ncx").unwrap();

        assert_eq!(
            entries,
            vec![
                NavEntry::new("ch1.xhtml").with_title("Chapter 1"),
                NavEntry::new("ch2.xhtml").with_title("Tom & Jerry"),
            ]
        );
    }

    #[test]
    fn test_parse_ncx_nested_first_occurrence_wins() {
        let ncx = r#"<?xml version="1.0"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <navMap>
    <navPoint id="part1" playOrder="1">
      <navLabel><text>Part I</text></navLabel>
      <content src="Text/part1.xhtml"/>
      <navPoint id="ch1" playOrder="2">
        <navLabel><text>Chapter 1</text></navLabel>
        <content src="Text/ch1.xhtml"/>
        <navPoint id="ch1s1" playOrder="3">
          <navLabel><text>Section 1.1</text></navLabel>
          <content src="Text/ch1.xhtml#s1"/>
        </navPoint>
      </navPoint>
    </navPoint>
  </navMap>
</ncx>"#;

        let entries = parse_ncx(ncx.as_bytes(), "OEBPS-relative/toc.ncx").unwrap();

        let titles: Vec<(&str, &str)> = entries
            .iter()
            .map(|e| (e.href.as_str(), e.title.as_deref().unwrap_or("")))
            .collect();
        assert_eq!(
            titles,
            vec![
                ("OEBPS-relative/Text/part1.xhtml", "Part I"),
                ("OEBPS-relative/Text/ch1.xhtml", "Chapter 1"),
            ]
        );
        assert!(entries.iter().all(|e| e.landmark.is_none()));
    }

    #[test]
    fn test_parse_ncx_ignores_doc_title() {
        let ncx = r#"<ncx><docTitle><text>Book</text></docTitle><navMap/></ncx>"#;
        assert!(parse_ncx(ncx.as_bytes(), "toc.ncx").unwrap().is_empty());
    }

    #[test]
    fn test_parse_ncx_malformed() {
        let ncx = r#"<ncx><navMap><navPoint></navMap></ncx>"#;
        assert!(parse_ncx(ncx.as_bytes(), "toc.ncx").is_err());
    }
}
