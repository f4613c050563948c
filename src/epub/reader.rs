use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;

use tracing::debug;
use zip::ZipArchive;

use super::parser::{OpfData, parse_container_xml, parse_opf};
use crate::book::{Package, Resource, SpineItem};
use crate::error::{Error, Result};
use crate::util::{decode_text, extract_xml_encoding};
use crate::xml::resolve_href;

/// Read an EPUB file from disk into a [`Package`].
///
/// Supports EPUB 2 and EPUB 3. Every container entry is loaded: manifest
/// resources into [`Package::resources`], everything else into
/// [`Package::extra_files`].
///
/// # Example
///
/// ```no_run
/// use a11ypub::read_package;
///
/// let package = read_package("path/to/book.epub")?;
/// println!("Title: {}", package.metadata.title);
/// # Ok::<(), a11ypub::Error>(())
/// ```
pub fn read_package<P: AsRef<Path>>(path: P) -> Result<Package> {
    let file = std::fs::File::open(path)?;
    read_package_from_reader(file)
}

/// Read an EPUB from any [`Read`] + [`Seek`] source.
///
/// Useful for reading from memory buffers or network streams.
pub fn read_package_from_reader<R: Read + Seek>(reader: R) -> Result<Package> {
    let mut archive = ZipArchive::new(reader)?;

    // 1. Load every entry
    let mut entries: Vec<(String, Vec<u8>)> = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;
        entries.push((name, contents));
    }

    // 2. Find and parse the OPF
    let container = find_entry(&entries, "META-INF/container.xml")
        .ok_or_else(|| Error::MissingElement("META-INF/container.xml".into()))?;
    let opf_path = parse_container_xml(container)?;
    let opf_bytes = find_entry(&entries, &opf_path)
        .ok_or_else(|| Error::InvalidEpub(format!("package document {} not found", opf_path)))?;
    let opf = decode_text(opf_bytes, extract_xml_encoding(opf_bytes)).into_owned();
    let opf = opf.trim_start_matches('\u{feff}').to_string();
    let data = parse_opf(&opf)?;

    build_package(data, opf_path, opf, entries)
}

fn build_package(
    data: OpfData,
    opf_path: String,
    opf: String,
    entries: Vec<(String, Vec<u8>)>,
) -> Result<Package> {
    let ncx_href = data.ncx_href().and_then(|h| resolve_href("", &h));
    let nav_href = data.nav_href().and_then(|h| resolve_href("", &h));

    let mut package = Package {
        version: data.version,
        metadata: data.metadata,
        root_language: data.root_language,
        ncx_href,
        nav_href,
        opf_path,
        opf,
        ..Package::default()
    };
    let opf_dir = package.opf_dir().to_string();

    // 3. Manifest resources, keyed by normalized package-relative href
    let mut by_path: HashMap<String, Vec<u8>> = entries
        .into_iter()
        .filter(|(name, _)| *name != package.opf_path)
        .collect();

    for mut item in data.manifest {
        let Some(href) = resolve_href("", &item.href) else {
            debug!(id = %item.id, href = %item.href, "skipping manifest item without local href");
            continue;
        };
        item.href = href;
        let full_path = join_path(&opf_dir, &item.href);
        let bytes = by_path
            .remove(&full_path)
            .or_else(|| by_path.remove(&percent_encode_path(&full_path)));
        match bytes {
            Some(bytes) => {
                package.resources.insert(
                    item.href.clone(),
                    Resource {
                        data: bytes,
                        media_type: item.media_type.clone(),
                    },
                );
            }
            None => debug!(href = %item.href, "manifest item missing from container"),
        }
        package.manifest.push(item);
    }

    // 4. Spine
    for (idref, linear) in data.spine {
        if let Some(item) = package.manifest_item(&idref) {
            let href = item.href.clone();
            package.spine.push(SpineItem {
                idref,
                href,
                linear,
            });
        }
    }

    // 5. Everything else travels untouched
    let mut extra: Vec<(String, Vec<u8>)> = by_path.into_iter().collect();
    extra.sort_by(|a, b| a.0.cmp(&b.0));
    package.extra_files = extra;

    debug!(
        version = ?package.version,
        manifest = package.manifest.len(),
        spine = package.spine.len(),
        "read package"
    );

    Ok(package)
}

fn find_entry<'a>(entries: &'a [(String, Vec<u8>)], path: &str) -> Option<&'a [u8]> {
    entries
        .iter()
        .find(|(name, _)| name == path)
        .map(|(_, data)| data.as_slice())
}

pub(crate) fn join_path(base: &str, href: &str) -> String {
    if base.is_empty() {
        href.to_string()
    } else {
        format!("{}/{}", base, href)
    }
}

/// Some containers store entries under their percent-encoded names.
fn percent_encode_path(path: &str) -> String {
    use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
    const PATH: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'#').add(b'%').add(b'?');
    utf8_percent_encode(path, PATH).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "ch1.xhtml"), "ch1.xhtml");
        assert_eq!(join_path("OEBPS", "text/ch1.xhtml"), "OEBPS/text/ch1.xhtml");
    }

    #[test]
    fn test_percent_encode_path() {
        assert_eq!(percent_encode_path("OEBPS/a b.xhtml"), "OEBPS/a%20b.xhtml");
        assert_eq!(percent_encode_path("OEBPS/ab.xhtml"), "OEBPS/ab.xhtml");
    }

    #[test]
    fn test_missing_container() {
        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            zip.start_file("mimetype", zip::write::SimpleFileOptions::default())
                .unwrap();
            std::io::Write::write_all(&mut zip, b"application/epub+zip").unwrap();
            zip.finish().unwrap();
        }
        buf.set_position(0);
        assert!(matches!(
            read_package_from_reader(buf),
            Err(Error::MissingElement(_))
        ));
    }
}
