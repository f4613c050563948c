//! End-to-end processing of a package.

use tracing::{debug, info, warn};

use crate::analyze::{AnalyzeOptions, PackageInfo, analyze};
use crate::book::Package;
use crate::error::{Error, Result};
use crate::inventory::{self, ReviewSet};
use crate::mutate::{Warning, mutate};
use crate::nav;
use crate::qualify;

/// Options for a [`Pipeline`] run.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub analyze: AnalyzeOptions,
}

impl PipelineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Language to use when the package declares none.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.analyze = self.analyze.with_fallback_language(language);
        self
    }

    pub fn with_accessibility_metadata(mut self, enabled: bool) -> Self {
        self.analyze = self.analyze.with_accessibility_metadata(enabled);
        self
    }
}

/// A content document that could not be processed. Its bytes are unchanged.
#[derive(Debug)]
pub struct DocumentFailure {
    pub href: String,
    pub error: Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentWarning {
    pub href: String,
    pub warning: Warning,
}

/// Summary of a run.
#[derive(Debug)]
pub struct RunReport {
    pub info: PackageInfo,
    /// Content documents rewritten without error.
    pub processed: usize,
    /// Of those, documents whose bytes actually changed.
    pub changed: usize,
    pub failures: Vec<DocumentFailure>,
    pub warnings: Vec<DocumentWarning>,
    /// Images for human review, in reading order.
    pub review: ReviewSet,
}

impl RunReport {
    /// No failures and no warnings.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.warnings.is_empty()
    }
}

/// Qualify, analyze and rewrite a package in place.
///
/// A disqualified book or one without a language fails before anything is
/// edited. After that, each content document succeeds or fails on its own;
/// failures and warnings are collected in the [`RunReport`].
///
/// # Example
///
/// ```no_run
/// use a11ypub::{Pipeline, PipelineOptions, read_package, write_package};
///
/// let mut package = read_package("book.epub")?;
/// let report = Pipeline::new(PipelineOptions::new().with_language("en")).run(&mut package)?;
/// println!("{} images to review", report.review.len());
/// write_package(&package, "book-a11y.epub")?;
/// # Ok::<(), a11ypub::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    pub fn run(&self, package: &mut Package) -> Result<RunReport> {
        qualify::check(package)?;
        let info = analyze(package, &self.options.analyze)?;
        let nav = nav::extract(package, &info);

        let mut processed = 0;
        let mut changed = 0;
        let mut failures = Vec::new();
        let mut warnings = Vec::new();
        let mut images = Vec::new();

        for href in package.text_hrefs() {
            let Some(resource) = package.resources.get_mut(&href) else {
                warn!(href = %href, "content document listed in manifest but missing");
                failures.push(DocumentFailure {
                    error: Error::MissingElement(format!("content document {href}")),
                    href,
                });
                continue;
            };

            match mutate(&href, &resource.data, nav.get(&href), &info.language, info.version) {
                Ok(mutation) => {
                    processed += 1;
                    if mutation.output != resource.data {
                        changed += 1;
                        resource.data = mutation.output;
                    }
                    debug!(
                        href = %href,
                        images = mutation.images.len(),
                        warnings = mutation.warnings.len(),
                        "processed document"
                    );
                    images.extend(mutation.images);
                    warnings.extend(mutation.warnings.into_iter().map(|warning| {
                        DocumentWarning {
                            href: href.clone(),
                            warning,
                        }
                    }));
                }
                Err(error) => {
                    warn!(href = %href, error = %error, "skipping document");
                    failures.push(DocumentFailure { href, error });
                }
            }
        }

        let review = inventory::collect(images, package);
        info!(
            processed,
            changed,
            failed = failures.len(),
            warnings = warnings.len(),
            images = review.len(),
            "processed package"
        );

        Ok(RunReport {
            info,
            processed,
            changed,
            failures,
            warnings,
            review,
        })
    }
}
