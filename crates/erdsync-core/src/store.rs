//! Loading and atomically saving schema documents

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::yaml::Document;

/// Load a document, or `None` when the file does not exist yet
pub fn load(path: &Path) -> Result<Option<Document>> {
    // A path under a non-directory does not exist either; saving reports it
    if !path.exists() {
        return Ok(None);
    }
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(Error::file_operation("read", path, err)),
    };
    Document::parse(&text)
        .map(Some)
        .map_err(|err| err.with_path(path))
}

/// Load a document that must exist
pub fn load_existing(path: &Path) -> Result<Document> {
    load(path)?.ok_or_else(|| Error::FileNotFound {
        path: path.to_path_buf(),
    })
}

/// Write a document through a sibling temp file renamed over the target,
/// so readers never observe a partially written file.
pub fn save(path: &Path, doc: &Document) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|err| Error::file_operation("create directory", parent, err))?;

    let mut file = NamedTempFile::new_in(parent)
        .map_err(|err| Error::file_operation("create temp file in", parent, err))?;
    file.write_all(doc.render().as_bytes())
        .and_then(|()| file.as_file().sync_all())
        .map_err(|err| Error::file_operation("write", file.path(), err))?;

    if let Ok(metadata) = fs::metadata(path) {
        // Temp files are created owner-only; keep the target's permissions
        file.as_file()
            .set_permissions(metadata.permissions())
            .map_err(|err| Error::file_operation("set permissions on", file.path(), err))?;
    }

    file.persist(path)
        .map_err(|err| Error::file_operation("replace", path, err.error))?;
    tracing::debug!("saved {}", path.display());
    Ok(())
}
