//! Zip extraction.

use crate::error::PrepError;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Unpack every entry of `archive_path` into `destination_dir`.
///
/// Directories named by entries are created as needed. Returns the extracted
/// file paths in archive order. Entries whose names would land outside
/// `destination_dir` make the whole archive invalid.
pub fn extract(archive_path: &Path, destination_dir: &Path) -> Result<Vec<PathBuf>, PrepError> {
    let file = File::open(archive_path).map_err(|e| PrepError::from_io(archive_path, e))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| PrepError::corrupt_archive(archive_path, e.to_string()))?;

    tracing::info!(
        archive = %archive_path.display(),
        entries = archive.len(),
        dest = %destination_dir.display(),
        "extracting archive"
    );

    fs::create_dir_all(destination_dir).map_err(|e| PrepError::io(destination_dir, e))?;

    let mut extracted = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| PrepError::corrupt_archive(archive_path, e.to_string()))?;

        let relative = entry.enclosed_name().ok_or_else(|| {
            PrepError::corrupt_archive(
                archive_path,
                format!("entry '{}' escapes the destination directory", entry.name()),
            )
        })?;
        let outpath = destination_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath).map_err(|e| PrepError::io(&outpath, e))?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent).map_err(|e| PrepError::io(parent, e))?;
        }

        // Read failures mean a damaged entry; only the write below is an I/O error.
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).map_err(|e| {
            PrepError::corrupt_archive(archive_path, format!("entry '{}': {e}", entry.name()))
        })?;

        if outpath.exists() {
            tracing::warn!(path = %outpath.display(), "overwriting existing file");
        }
        fs::write(&outpath, &contents).map_err(|e| PrepError::io(&outpath, e))?;

        tracing::debug!(entry = entry.name(), size = entry.size(), "extracted");
        extracted.push(outpath);
    }

    Ok(extracted)
}
