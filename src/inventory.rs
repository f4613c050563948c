//! Image inventory for human review.
//!
//! [`collect`] turns the mutator's image records into a [`ReviewSet`] that an
//! external review tool edits as JSON; [`apply`] writes the edited
//! descriptions back into the exact `<img>` elements they came from.

use std::collections::{BTreeMap, HashMap};

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::book::Package;
use crate::error::Result;
use crate::mutate::{ImageCounter, ImageRecord, utf8_decl};
use crate::util::{decode_markup, detect_image_format, extract_image_dimensions};
use crate::xml::{attr_value, local_name, resolve_href, set_attributes};

/// An image awaiting a description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub record: ImageRecord,
    /// Package-relative href of the image file, when `src` points inside the package.
    pub image_href: Option<String>,
    pub media_type: Option<String>,
    /// Pixel `(width, height)` read from the image header.
    pub dimensions: Option<(u32, u32)>,
    /// Alt text to write back. Starts as the current alt text.
    pub description: String,
}

impl ReviewItem {
    /// Whether the reviewer changed the description.
    pub fn is_edited(&self) -> bool {
        self.description != self.record.alt
    }
}

/// Every image of a book in reading order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSet {
    pub items: Vec<ReviewItem>,
}

impl ReviewSet {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items whose description is still empty.
    pub fn pending(&self) -> impl Iterator<Item = &ReviewItem> {
        self.items
            .iter()
            .filter(|item| item.description.trim().is_empty())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Build the review set from image records gathered in processing order.
pub fn collect(records: Vec<ImageRecord>, package: &Package) -> ReviewSet {
    let items: Vec<ReviewItem> = records
        .into_iter()
        .map(|record| {
            let image_href = resolve_href(&record.document, &record.src);
            let resource = image_href.as_deref().and_then(|href| package.get_resource(href));
            let media_type = match (&image_href, resource) {
                (Some(_), Some(resource)) if !resource.media_type.is_empty() => {
                    Some(resource.media_type.clone())
                }
                (Some(href), resource) => {
                    let data = resource.map(|r| r.data.as_slice()).unwrap_or_default();
                    detect_image_format(href, data).map(|format| format.mime_type().to_string())
                }
                (None, _) => None,
            };
            ReviewItem {
                dimensions: resource.and_then(|r| extract_image_dimensions(&r.data)),
                description: record.alt.clone(),
                image_href,
                media_type,
                record,
            }
        })
        .collect();

    debug!(images = items.len(), "collected images for review");
    ReviewSet { items }
}

/// Why an edited description could not be written back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    #[error("document no longer exists")]
    MissingDocument,
    #[error("document has no image at this position")]
    MissingImage,
    #[error("image source changed to {found:?}")]
    SourceChanged { found: String },
    #[error("document could not be read: {0}")]
    Unreadable(String),
}

/// A review item that no longer matches its document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{document} image #{index}: {reason}")]
pub struct StaleReference {
    pub document: String,
    pub index: usize,
    pub reason: StaleReason,
}

/// Outcome of [`apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Descriptions written.
    pub applied: usize,
    /// Items left alone because their description was not edited.
    pub unchanged: usize,
    pub stale: Vec<StaleReference>,
}

/// Write edited descriptions back into their documents.
///
/// Each document is rewritten at most once. An item whose document, image
/// position or `src` no longer matches is reported as stale; the remaining
/// items still apply.
pub fn apply(package: &mut Package, review: &ReviewSet) -> ApplyReport {
    let mut report = ApplyReport::default();
    let mut by_document: BTreeMap<&str, HashMap<usize, &ReviewItem>> = BTreeMap::new();

    for item in &review.items {
        if item.is_edited() {
            by_document
                .entry(item.record.document.as_str())
                .or_default()
                .insert(item.record.index, item);
        } else {
            report.unchanged += 1;
        }
    }

    for (document, edits) in by_document {
        let Some(resource) = package.resources.get_mut(document) else {
            report.stale.extend(stale_all(document, &edits, StaleReason::MissingDocument));
            continue;
        };

        match rewrite_alts(&resource.data, &edits) {
            Ok(rewrite) => {
                if rewrite.applied > 0 {
                    resource.data = rewrite.output;
                }
                debug!(document, applied = rewrite.applied, "applied descriptions");
                report.applied += rewrite.applied;
                report.stale.extend(rewrite.stale.into_iter().map(|(index, reason)| {
                    StaleReference {
                        document: document.to_string(),
                        index,
                        reason,
                    }
                }));
            }
            Err(e) => {
                let reason = StaleReason::Unreadable(e.to_string());
                report.stale.extend(stale_all(document, &edits, reason));
            }
        }
    }

    for stale in &report.stale {
        warn!("{stale}");
    }
    info!(
        applied = report.applied,
        unchanged = report.unchanged,
        stale = report.stale.len(),
        "applied review"
    );
    report
}

fn stale_all(
    document: &str,
    edits: &HashMap<usize, &ReviewItem>,
    reason: StaleReason,
) -> Vec<StaleReference> {
    let mut indices: Vec<usize> = edits.keys().copied().collect();
    indices.sort_unstable();
    indices
        .into_iter()
        .map(|index| StaleReference {
            document: document.to_string(),
            index,
            reason: reason.clone(),
        })
        .collect()
}

struct AltRewrite {
    output: Vec<u8>,
    applied: usize,
    stale: Vec<(usize, StaleReason)>,
}

/// Tracks images while a document is copied.
struct AltEditor<'e> {
    edits: &'e HashMap<usize, &'e ReviewItem>,
    images: ImageCounter,
    seen: usize,
    applied: usize,
    stale: Vec<(usize, StaleReason)>,
}

impl AltEditor<'_> {
    fn edit<'a>(&mut self, e: BytesStart<'a>) -> Result<BytesStart<'a>> {
        let qname = e.name();
        let Some(index) = self.images.image(local_name(qname.as_ref())) else {
            return Ok(e);
        };
        self.seen = index + 1;
        let Some(item) = self.edits.get(&index) else {
            return Ok(e);
        };
        let src = attr_value(&e, b"src").unwrap_or_default();
        if src != item.record.src {
            self.stale
                .push((index, StaleReason::SourceChanged { found: src }));
            return Ok(e);
        }
        self.applied += 1;
        Ok(set_attributes(&e, &[("alt", item.description.as_str())])?)
    }
}

/// Set `alt` on the images named in `edits`, leaving everything else as read.
fn rewrite_alts(bytes: &[u8], edits: &HashMap<usize, &ReviewItem>) -> Result<AltRewrite> {
    let content = decode_markup(bytes);
    let mut reader = Reader::from_str(&content);
    let mut writer = Writer::new(Vec::with_capacity(content.len() + 256));
    let mut editor = AltEditor {
        edits,
        images: ImageCounter::default(),
        seen: 0,
        applied: 0,
        stale: Vec::new(),
    };

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Decl(decl) => writer.write_event(Event::Decl(utf8_decl(decl)))?,
            Event::Start(e) => {
                let local = local_name(e.name().as_ref()).to_vec();
                let e = editor.edit(e)?;
                editor.images.enter(&local);
                writer.write_event(Event::Start(e))?;
            }
            Event::Empty(e) => {
                let e = editor.edit(e)?;
                writer.write_event(Event::Empty(e))?;
            }
            Event::End(e) => {
                editor.images.leave(local_name(e.name().as_ref()));
                writer.write_event(Event::End(e))?;
            }
            event => writer.write_event(event)?,
        }
    }

    let mut stale = editor.stale;
    let mut missing: Vec<usize> = edits.keys().copied().filter(|&i| i >= editor.seen).collect();
    missing.sort_unstable();
    stale.extend(missing.into_iter().map(|i| (i, StaleReason::MissingImage)));

    Ok(AltRewrite {
        output: writer.into_inner(),
        applied: editor.applied,
        stale,
    })
}
