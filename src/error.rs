//! Error types for a11ypub operations.

use thiserror::Error;

use crate::qualify::Disqualification;

/// Errors that can occur while reading, fixing or writing a package.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid EPUB: {0}")]
    InvalidEpub(String),

    #[error("Missing required element: {0}")]
    MissingElement(String),

    #[error("Malformed document {href}: {reason}")]
    Malformed { href: String, reason: String },

    /// The book contains content that rules out automated processing.
    #[error("{0}")]
    Disqualified(Disqualification),

    /// No language is declared and the caller did not supply one.
    #[error(
        "no dc:language is declared in the package document; supply a language to continue"
    )]
    MissingLanguage,

    #[error("Review set error: {0}")]
    Review(#[from] serde_json::Error),

    #[error("UTF-8 decoding error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    /// Whether this error aborts the whole run rather than a single document.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Error::Disqualified(_) | Error::MissingLanguage)
    }
}

impl From<Disqualification> for Error {
    fn from(d: Disqualification) -> Self {
        Error::Disqualified(d)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
