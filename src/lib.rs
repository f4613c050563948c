//! # a11ypub
//!
//! Accessibility fixes for EPUB 2 and EPUB 3 packages.
//!
//! A book is first checked for content that automated fixing cannot vouch
//! for (scripts, audio, video, MathML). A qualifying book then gets:
//!
//! - its language declared on the package and on every content document
//! - fixed accessibility metadata in the package document
//! - a `<title>` in every content document, taken from the table of contents
//! - `epub:type` and ARIA `role` attributes for its landmarks (EPUB 3)
//! - an `alt` attribute on every image, plus an inventory of images that
//!   still need a human-written description
//!
//! ## Quick Start
//!
//! ```no_run
//! use a11ypub::{Pipeline, PipelineOptions, read_package, write_package};
//!
//! let mut package = read_package("book.epub")?;
//! let report = Pipeline::new(PipelineOptions::default()).run(&mut package)?;
//! for failure in &report.failures {
//!     eprintln!("{}: {}", failure.href, failure.error);
//! }
//! write_package(&package, "book-a11y.epub")?;
//! std::fs::write("review.json", report.review.to_json()?)?;
//! # Ok::<(), a11ypub::Error>(())
//! ```
//!
//! ## Applying Descriptions
//!
//! The review set is plain JSON. Once descriptions have been filled in:
//!
//! ```no_run
//! use a11ypub::{ReviewSet, apply, read_package, write_package};
//!
//! let mut package = read_package("book-a11y.epub")?;
//! let review = ReviewSet::from_json(&std::fs::read_to_string("review.json")?)?;
//! let report = apply(&mut package, &review);
//! for stale in &report.stale {
//!     eprintln!("{stale}");
//! }
//! write_package(&package, "book-a11y.epub")?;
//! # Ok::<(), a11ypub::Error>(())
//! ```

pub mod analyze;
pub mod book;
pub mod epub;
pub mod error;
pub mod inventory;
pub mod mutate;
pub mod nav;
pub mod pipeline;
pub mod qualify;
pub mod roles;
pub(crate) mod util;
pub(crate) mod xml;

pub use analyze::{AnalyzeOptions, PackageInfo};
pub use book::{ManifestItem, Metadata, Package, PackageVersion, Resource, SpineItem};
pub use epub::{read_package, read_package_from_reader, write_package, write_package_to_writer};
pub use error::{Error, Result};
pub use inventory::{ApplyReport, ReviewItem, ReviewSet, StaleReason, StaleReference, apply};
pub use mutate::{ImageRecord, Mutation, Warning};
pub use nav::{Landmark, NavEntry, NavMap};
pub use pipeline::{DocumentFailure, DocumentWarning, Pipeline, PipelineOptions, RunReport};
pub use qualify::{Disqualification, ResourceKind};
