//! EPUB container reading, writing and package document edits.

mod opf;
mod parser;
mod reader;
mod writer;

pub use opf::{ACCESSIBILITY_SUMMARY, OpfEdits, RewrittenOpf, rewrite_opf};
pub use parser::{OpfData, parse_container_xml, parse_opf};
pub use reader::{read_package, read_package_from_reader};
pub use writer::{write_package, write_package_to_writer};
