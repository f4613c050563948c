//! Shared quick-xml helpers for reading and rewriting markup.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use quick_xml::events::BytesStart;
use quick_xml::events::attributes::Attribute;

/// Strip UTF-8 BOM if present.
pub fn strip_bom(data: &[u8]) -> &[u8] {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &data[3..]
    } else {
        data
    }
}

/// Extract local name from namespaced XML name (e.g., "dc:title" -> "title").
pub fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|&b| b == b':')
        .map(|i| &name[i + 1..])
        .unwrap_or(name)
}

/// Resolve XML entity references.
pub fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        "nbsp" => return Some("\u{a0}".to_string()),
        _ => {}
    }

    if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        if let Ok(code) = u32::from_str_radix(hex, 16)
            && let Some(c) = char::from_u32(code)
        {
            return Some(c.to_string());
        }
    } else if let Some(dec) = entity.strip_prefix('#')
        && let Ok(code) = dec.parse::<u32>()
        && let Some(c) = char::from_u32(code)
    {
        return Some(c.to_string());
    }

    None
}

/// Decode a raw (still escaped) attribute value.
///
/// Values with entities quick-xml does not know are returned verbatim.
pub fn decode_attr(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    match quick_xml::escape::unescape(&text) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => text.into_owned(),
    }
}

/// Look up an attribute by its qualified name and decode its value.
pub fn attr_value(start: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| decode_attr(&attr.value))
}

/// Whether the element carries an attribute with this qualified name.
pub fn has_attr(start: &BytesStart<'_>, key: &[u8]) -> bool {
    start
        .attributes()
        .flatten()
        .any(|attr| attr.key.as_ref() == key)
}

/// Copy a start tag, replacing or appending the given attributes.
///
/// Untouched attributes keep their raw value and position; updated ones are
/// written in place, new ones are appended in `updates` order. Values in
/// `updates` are plain text and get escaped.
pub fn set_attributes(
    start: &BytesStart<'_>,
    updates: &[(&str, &str)],
) -> Result<BytesStart<'static>, quick_xml::Error> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    let mut applied = vec![false; updates.len()];

    for attr in start.attributes() {
        let attr = attr?;
        match updates
            .iter()
            .position(|(key, _)| key.as_bytes() == attr.key.as_ref())
        {
            Some(i) if applied[i] => {}
            Some(i) => {
                out.push_attribute(updates[i]);
                applied[i] = true;
            }
            None => out.push_attribute(Attribute {
                key: attr.key,
                value: requote(attr.value),
            }),
        }
    }

    for (update, done) in updates.iter().zip(applied) {
        if !done {
            out.push_attribute(*update);
        }
    }

    Ok(out)
}

/// Raw values from single-quoted attributes may contain `"`; every rewritten
/// attribute is double-quoted.
fn requote(value: Cow<'_, [u8]>) -> Cow<'_, [u8]> {
    if memchr::memchr(b'"', &value).is_none() {
        return value;
    }
    let mut out = Vec::with_capacity(value.len() + 8);
    for &b in value.iter() {
        if b == b'"' {
            out.extend_from_slice(b"&quot;");
        } else {
            out.push(b);
        }
    }
    Cow::Owned(out)
}

/// Split an href into path and fragment.
pub fn split_fragment(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment).filter(|f| !f.is_empty())),
        None => (href, None),
    }
}

/// Resolve `href`, found in the document at `base` (a package-relative path),
/// to a package-relative path without fragment.
///
/// Returns `None` for external and empty references.
pub fn resolve_href(base: &str, href: &str) -> Option<String> {
    let (path, _) = split_fragment(href.trim());
    if path.is_empty() || is_external(path) {
        return None;
    }
    let decoded = percent_decode_str(path).decode_utf8_lossy();

    let mut parts: Vec<&str> = match base.rsplit_once('/') {
        Some((dir, _)) if !decoded.starts_with('/') => dir.split('/').collect(),
        _ => Vec::new(),
    };
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

fn is_external(path: &str) -> bool {
    path.contains("://")
        || ["mailto:", "data:", "javascript:", "tel:"]
            .iter()
            .any(|scheme| {
                path.get(..scheme.len())
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
            })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bom() {
        let with_bom = &[0xEF, 0xBB, 0xBF, b'h', b'i'];
        assert_eq!(strip_bom(with_bom), b"hi");
        assert_eq!(strip_bom(b"hello"), b"hello");
        assert!(strip_bom(&[]).is_empty());
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"title"), b"title");
        assert_eq!(local_name(b"dc:title"), b"title");
        assert_eq!(local_name(b"m:math"), b"math");
        assert_eq!(local_name(b""), b"");
    }

    #[test]
    fn test_resolve_entity() {
        assert_eq!(resolve_entity("amp"), Some("&".to_string()));
        assert_eq!(resolve_entity("#65"), Some("A".to_string()));
        assert_eq!(resolve_entity("#x2019"), Some("\u{2019}".to_string()));
        assert_eq!(resolve_entity("bogus"), None);
    }

    #[test]
    fn test_decode_attr() {
        assert_eq!(decode_attr(b"Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(decode_attr(b"caf&#233;"), "café");
        // Unknown entity is left alone rather than failing.
        assert_eq!(decode_attr(b"a&hellip;"), "a&hellip;");
    }

    #[test]
    fn test_set_attributes_preserves_order() {
        let start = BytesStart::from_content(r#"img src="a.png" class='x' alt="old""#, 3);
        let out = set_attributes(&start, &[("alt", "new & improved"), ("role", "img")]).unwrap();
        assert_eq!(
            String::from_utf8_lossy(&out),
            r#"img src="a.png" class="x" alt="new &amp; improved" role="img""#
        );
    }

    #[test]
    fn test_set_attributes_requotes_single_quoted() {
        let start = BytesStart::from_content(r#"img alt='say "hi"'"#, 3);
        let out = set_attributes(&start, &[("src", "b.png")]).unwrap();
        assert_eq!(
            String::from_utf8_lossy(&out),
            r#"img alt="say &quot;hi&quot;" src="b.png""#
        );
    }

    #[test]
    fn test_attr_value() {
        let start = BytesStart::from_content(r#"a href="ch1.xhtml#s1" epub:type="toc""#, 1);
        assert_eq!(attr_value(&start, b"epub:type"), Some("toc".to_string()));
        assert_eq!(attr_value(&start, b"type"), None);
        assert!(has_attr(&start, b"href"));
    }

    #[test]
    fn test_resolve_href() {
        assert_eq!(resolve_href("text/nav.xhtml", "ch1.xhtml#s1"), Some("text/ch1.xhtml".into()));
        assert_eq!(resolve_href("text/nav.xhtml", "../images/a%20b.png"), Some("images/a b.png".into()));
        assert_eq!(resolve_href("nav.xhtml", "./ch1.xhtml"), Some("ch1.xhtml".into()));
        assert_eq!(resolve_href("nav.xhtml", "#top"), None);
        assert_eq!(resolve_href("nav.xhtml", "https://example.com/x.html"), None);
        assert_eq!(resolve_href("nav.xhtml", "mailto:me@example.com"), None);
    }

    #[test]
    fn test_split_fragment() {
        assert_eq!(split_fragment("a.xhtml#x"), ("a.xhtml", Some("x")));
        assert_eq!(split_fragment("a.xhtml#"), ("a.xhtml", None));
        assert_eq!(split_fragment("a.xhtml"), ("a.xhtml", None));
    }
}
