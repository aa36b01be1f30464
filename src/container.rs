//! Publication container access.
//!
//! The lifecycle only needs two things from a container: read a named entry
//! and replace a named entry. `ZipContainer` provides both for EPUB/zip
//! publications; other formats can plug in through `PublicationContainer`.

use crate::LcpError;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Location of the license inside a publication. Readers rely on this exact path.
pub const LICENSE_ENTRY: &str = "META-INF/license.lcpl";

/// Named-entry access to a publication container on disk.
pub trait PublicationContainer: Send + Sync {
    /// Bytes of the entry `name`.
    fn read_entry(&self, path: &Path, name: &str) -> Result<Vec<u8>, LcpError>;

    /// Remove the entry `name` if present, then add it with `data`.
    fn replace_entry(&self, path: &Path, name: &str, data: &[u8]) -> Result<(), LcpError>;
}

/// Zip-based container (EPUB, audiobook, PDF packages).
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipContainer;

impl PublicationContainer for ZipContainer {
    fn read_entry(&self, path: &Path, name: &str) -> Result<Vec<u8>, LcpError> {
        let mut archive = open_archive(path)?;
        let mut entry = archive
            .by_name(name)
            .map_err(|_| LcpError::FileNotInArchive(name.to_string()))?;

        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| LcpError::Archive(format!("Failed to read {}: {}", name, e)))?;
        Ok(data)
    }

    fn replace_entry(&self, path: &Path, name: &str, data: &[u8]) -> Result<(), LcpError> {
        let mut archive = open_archive(path)?;
        let temp_path = path.with_extension("tmp");

        let result = rewrite_with_entry(&mut archive, &temp_path, name, data);
        drop(archive);
        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        fs::rename(&temp_path, path)
            .map_err(|e| LcpError::Archive(format!("Failed to replace container: {}", e)))
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>, LcpError> {
    let file = File::open(path)
        .map_err(|e| LcpError::Archive(format!("Failed to open {}: {}", path.display(), e)))?;
    ZipArchive::new(file)
        .map_err(|e| LcpError::Archive(format!("Not a zip container {}: {}", path.display(), e)))
}

/// Copy every entry except `name` verbatim, then append `name`.
///
/// Raw copies keep each entry's position and compression, so an EPUB's
/// leading stored `mimetype` stays valid.
fn rewrite_with_entry(
    archive: &mut ZipArchive<File>,
    temp_path: &Path,
    name: &str,
    data: &[u8],
) -> Result<(), LcpError> {
    let zip_err = |e: zip::result::ZipError| LcpError::Archive(e.to_string());

    let output = File::create(temp_path)
        .map_err(|e| LcpError::Archive(format!("Failed to create temp container: {}", e)))?;
    let mut writer = ZipWriter::new(output);

    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i).map_err(zip_err)?;
        if entry.name() == name {
            continue;
        }
        writer.raw_copy_file(entry).map_err(zip_err)?;
    }

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    writer.start_file(name, options).map_err(zip_err)?;
    writer
        .write_all(data)
        .map_err(|e| LcpError::Archive(format!("Failed to write {}: {}", name, e)))?;
    writer.finish().map_err(zip_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_epub(path: &Path, license: Option<&[u8]>) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("mimetype", stored).unwrap();
        zip.write_all(b"application/epub+zip").unwrap();
        zip.start_file("META-INF/container.xml", deflated).unwrap();
        zip.write_all(b"<container/>").unwrap();
        if let Some(license) = license {
            zip.start_file(LICENSE_ENTRY, deflated).unwrap();
            zip.write_all(license).unwrap();
        }
        zip.start_file("OEBPS/chapter1.xhtml", deflated).unwrap();
        zip.write_all(b"<html>encrypted</html>").unwrap();
        zip.finish().unwrap();
    }

    fn entry_names(path: &Path) -> Vec<String> {
        let archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        archive.file_names().map(String::from).collect()
    }

    #[test]
    fn replaced_license_reads_back_identical() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("book.epub");
        write_epub(&path, Some(b"{\"id\":\"old\"}"));

        let fresh = br#"{"id": "new", "provider": "https://p.example.com"}"#;
        ZipContainer.replace_entry(&path, LICENSE_ENTRY, fresh).unwrap();

        assert_eq!(ZipContainer.read_entry(&path, LICENSE_ENTRY).unwrap(), fresh);
        assert_eq!(
            ZipContainer.read_entry(&path, "OEBPS/chapter1.xhtml").unwrap(),
            b"<html>encrypted</html>"
        );
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn replace_keeps_a_single_license_entry_and_mimetype_first() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("book.epub");
        write_epub(&path, Some(b"old"));

        ZipContainer.replace_entry(&path, LICENSE_ENTRY, b"new").unwrap();

        let names = entry_names(&path);
        assert_eq!(names.iter().filter(|n| *n == LICENSE_ENTRY).count(), 1);
        let archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.name_for_index(0), Some("mimetype"));
    }

    #[test]
    fn replace_adds_missing_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("book.epub");
        write_epub(&path, None);

        ZipContainer.replace_entry(&path, LICENSE_ENTRY, b"license").unwrap();
        assert_eq!(ZipContainer.read_entry(&path, LICENSE_ENTRY).unwrap(), b"license");
    }

    #[test]
    fn missing_entry_is_file_not_in_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("book.epub");
        write_epub(&path, None);

        let result = ZipContainer.read_entry(&path, LICENSE_ENTRY);
        assert!(matches!(result, Err(LcpError::FileNotInArchive(_))));
    }

    #[test]
    fn non_zip_is_archive_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("book.epub");
        fs::write(&path, b"plain text").unwrap();

        assert!(matches!(
            ZipContainer.read_entry(&path, LICENSE_ENTRY),
            Err(LcpError::Archive(_))
        ));
        assert!(matches!(
            ZipContainer.replace_entry(&path, LICENSE_ENTRY, b"x"),
            Err(LcpError::Archive(_))
        ));
        assert_eq!(fs::read(&path).unwrap(), b"plain text");
    }
}
