use crate::error::PrepError;
use std::fs;
use std::path::Path;

/// Delete the file at `path`. A missing file is an error.
pub fn remove(path: &Path) -> Result<(), PrepError> {
    fs::remove_file(path).map_err(|e| PrepError::from_io(path, e))?;
    tracing::info!(path = %path.display(), "removed file");
    Ok(())
}
