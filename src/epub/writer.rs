use std::io::{Seek, Write};
use std::path::Path;

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::reader::join_path;
use crate::book::Package;
use crate::error::Result;

const MIMETYPE: &[u8] = b"application/epub+zip";

/// Write a [`Package`] to an EPUB file on disk.
///
/// # Example
///
/// ```no_run
/// use a11ypub::{read_package, write_package};
///
/// let package = read_package("input.epub")?;
/// write_package(&package, "output.epub")?;
/// # Ok::<(), a11ypub::Error>(())
/// ```
pub fn write_package<P: AsRef<Path>>(package: &Package, path: P) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_package_to_writer(package, file)
}

/// Write a [`Package`] to any [`Write`] + [`Seek`] destination.
///
/// Entry order: `mimetype` (stored), `META-INF/*`, the package document,
/// manifest resources in manifest order, then any remaining files.
pub fn write_package_to_writer<W: Write + Seek>(package: &Package, writer: W) -> Result<()> {
    let mut zip = ZipWriter::new(writer);

    let options_stored =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let options_deflate =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    // 1. mimetype must be first and uncompressed
    zip.start_file("mimetype", options_stored)?;
    zip.write_all(MIMETYPE)?;

    // 2. META-INF
    let (meta_inf, others): (Vec<_>, Vec<_>) = package
        .extra_files
        .iter()
        .filter(|(name, _)| name != "mimetype")
        .partition(|(name, _)| name.starts_with("META-INF/"));

    let has_container = meta_inf
        .iter()
        .any(|(name, _)| name == "META-INF/container.xml");
    if !has_container {
        zip.start_file("META-INF/container.xml", options_deflate)?;
        zip.write_all(container_xml(&package.opf_path).as_bytes())?;
    }
    for (name, data) in meta_inf {
        zip.start_file(name.as_str(), options_deflate)?;
        zip.write_all(data)?;
    }

    // 3. Package document
    zip.start_file(package.opf_path.as_str(), options_deflate)?;
    zip.write_all(package.opf.as_bytes())?;

    // 4. Manifest resources
    let opf_dir = package.opf_dir();
    let mut written = std::collections::HashSet::new();
    for item in &package.manifest {
        if !written.insert(item.href.as_str()) {
            continue;
        }
        if let Some(resource) = package.resources.get(&item.href) {
            zip.start_file(join_path(opf_dir, &item.href), options_deflate)?;
            zip.write_all(&resource.data)?;
        }
    }

    // 5. Remaining files
    for (name, data) in others {
        zip.start_file(name.as_str(), options_deflate)?;
        zip.write_all(data)?;
    }

    zip.finish()?;
    Ok(())
}

fn container_xml(opf_path: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="{}" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#,
        quick_xml::escape::escape(opf_path)
    )
}
