//! Maps `epub:type` semantics to ARIA roles.
//!
//! One table serves both landmark injection and role completion for
//! semantics authors already wrote, so the two can never disagree.

/// A structural semantic with its ARIA role, if ARIA defines one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemanticRole {
    /// `epub:type` token to write into a document.
    pub semantic_type: &'static str,
    /// `role` attribute value, `None` for semantics without an ARIA counterpart.
    pub role: Option<&'static str>,
}

/// `epub:type` token → ARIA role. `None` marks known semantics that have no
/// role; they still get their `epub:type` injected.
///
/// Lists of illustrations, tables, audio and video, and the landmarks nav
/// itself, have no DPUB-ARIA role and map to `directory`.
static ROLE_TABLE: &[(&str, Option<&str>)] = &[
    ("abstract", Some("doc-abstract")),
    ("acknowledgments", Some("doc-acknowledgments")),
    ("afterword", Some("doc-afterword")),
    ("appendix", Some("doc-appendix")),
    ("backmatter", None),
    ("biblioentry", Some("doc-biblioentry")),
    ("bibliography", Some("doc-bibliography")),
    ("biblioref", Some("doc-biblioref")),
    ("bodymatter", None),
    ("chapter", Some("doc-chapter")),
    ("colophon", Some("doc-colophon")),
    ("conclusion", Some("doc-conclusion")),
    ("copyright-page", None),
    ("cover", Some("doc-cover")),
    ("credit", Some("doc-credit")),
    ("credits", Some("doc-credits")),
    ("dedication", Some("doc-dedication")),
    ("endnote", Some("doc-endnote")),
    ("endnotes", Some("doc-endnotes")),
    ("epigraph", Some("doc-epigraph")),
    ("epilogue", Some("doc-epilogue")),
    ("errata", Some("doc-errata")),
    ("figure", Some("figure")),
    ("footnote", Some("doc-footnote")),
    ("foreword", Some("doc-foreword")),
    ("frontmatter", None),
    ("glossary", Some("doc-glossary")),
    ("glossdef", Some("definition")),
    ("glossref", Some("doc-glossref")),
    ("glossterm", Some("term")),
    ("index", Some("doc-index")),
    ("introduction", Some("doc-introduction")),
    ("landmarks", Some("directory")),
    ("list", Some("list")),
    ("list-item", Some("listitem")),
    ("loa", Some("directory")),
    ("loi", Some("directory")),
    ("lot", Some("directory")),
    ("lov", Some("directory")),
    ("noteref", Some("doc-noteref")),
    ("notice", Some("doc-notice")),
    ("page-list", Some("doc-pagelist")),
    ("pagebreak", Some("doc-pagebreak")),
    ("part", Some("doc-part")),
    ("preface", Some("doc-preface")),
    ("prologue", Some("doc-prologue")),
    ("pullquote", Some("doc-pullquote")),
    ("qna", Some("doc-qna")),
    ("referrer", Some("doc-backlink")),
    ("subtitle", Some("doc-subtitle")),
    ("table", Some("table")),
    ("table-cell", Some("cell")),
    ("table-row", Some("row")),
    ("tip", Some("doc-tip")),
    ("titlepage", None),
    ("toc", Some("doc-toc")),
];

/// Look up a single `epub:type` token.
///
/// Unknown tokens map to `None`; callers skip semantic injection for them.
pub fn map(token: &str) -> Option<SemanticRole> {
    let token = token.trim();
    let token = token.strip_prefix("epub:").unwrap_or(token);
    ROLE_TABLE
        .binary_search_by(|(key, _)| (*key).cmp(token))
        .ok()
        .map(|i| SemanticRole {
            semantic_type: ROLE_TABLE[i].0,
            role: ROLE_TABLE[i].1,
        })
}

/// Normalize a landmark's `epub:type` value when at least one of its tokens
/// is known. Every token is kept, so `"frontmatter preface"` stays whole.
pub fn landmark_type(epub_type: &str) -> Option<String> {
    let tokens: Vec<&str> = epub_type.split_ascii_whitespace().collect();
    tokens
        .iter()
        .any(|token| map(token).is_some())
        .then(|| tokens.join(" "))
}

/// ARIA role for an `epub:type` attribute value, which may hold several
/// whitespace-separated tokens. The first token with a role wins.
pub fn aria_role(epub_type: &str) -> Option<&'static str> {
    epub_type
        .split_ascii_whitespace()
        .find_map(|token| map(token).and_then(|m| m.role))
}
