//! Compressed index bundles
//!
//! A bundle is a zip archive carrying an index file plus its referenced
//! assets (icons, artifacts). Remote servers and the custom local
//! repository both ship bundles so a catalog and its icons travel as one
//! file.

use anyhow::{bail, Context, Result};
use appdepot_core::hashing::sha256_file;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Extract a bundle into `dest_dir`, returning the extracted paths.
/// Entries that would escape the destination are rejected.
pub fn extract_bundle(archive_path: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>> {
    let file = File::open(archive_path)
        .with_context(|| format!("failed to open bundle {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("not a valid bundle: {}", archive_path.display()))?;

    std::fs::create_dir_all(dest_dir)?;
    let mut extracted = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let relative = match entry.enclosed_name() {
            Some(name) => name,
            None => bail!(
                "bundle entry '{}' escapes the extraction directory",
                entry.name()
            ),
        };
        let target = dest_dir.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        std::io::copy(&mut entry, &mut out)?;
        extracted.push(target);
    }

    debug!(
        "Extracted {} entries from {}",
        extracted.len(),
        archive_path.display()
    );
    Ok(extracted)
}

/// Write `files` into a bundle at `archive_path`, each stored under its
/// file name
pub fn write_bundle(archive_path: &Path, files: &[&Path]) -> Result<()> {
    if let Some(parent) = archive_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let out = File::create(archive_path)
        .with_context(|| format!("failed to create bundle {}", archive_path.display()))?;
    let mut writer = ZipWriter::new(out);
    let options = SimpleFileOptions::default();

    for file in files {
        let name = file
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("unusable bundle entry name: {}", file.display()))?;
        writer.start_file(name, options)?;
        let content = std::fs::read(file)?;
        writer.write_all(&content)?;
    }
    writer.finish()?;
    Ok(())
}

/// Whether a freshly fetched index differs from the previous one. A
/// missing previous index counts as changed.
pub fn index_changed(old_index: &Path, new_index: &Path) -> Result<bool> {
    if !old_index.exists() {
        return Ok(true);
    }
    let old = sha256_file(old_index)?;
    let new = sha256_file(new_index)?;
    Ok(old != new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("product.inf");
        let icon = dir.path().join("tool.png");
        std::fs::write(&index, "# index\n").unwrap();
        std::fs::write(&icon, b"png-bytes").unwrap();

        let archive = dir.path().join("product.infz");
        write_bundle(&archive, &[&index, &icon]).unwrap();

        let dest = dir.path().join("out");
        let extracted = extract_bundle(&archive, &dest).unwrap();
        assert_eq!(extracted.len(), 2);
        assert_eq!(
            std::fs::read_to_string(dest.join("product.inf")).unwrap(),
            "# index\n"
        );
        assert_eq!(std::fs::read(dest.join("tool.png")).unwrap(), b"png-bytes");
    }

    #[test]
    fn test_index_changed() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.inf");
        let new = dir.path().join("new.inf");
        std::fs::write(&new, "a\n").unwrap();

        assert!(index_changed(&old, &new).unwrap());

        std::fs::write(&old, "a\n").unwrap();
        assert!(!index_changed(&old, &new).unwrap());

        std::fs::write(&old, "b\n").unwrap();
        assert!(index_changed(&old, &new).unwrap());
    }
}
