use std::{io, path::Path};

use tempfile::NamedTempFile;

/// Creates a temporary file in the same directory as `path`, so that
/// [`persist`] is a plain rename. The file is removed if it's dropped before.
pub(crate) fn create_beside(path: impl AsRef<Path>) -> io::Result<NamedTempFile> {
    let dir = match path.as_ref().parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    tempfile::Builder::new()
        .prefix(".scanfetch-")
        .suffix(".part")
        .tempfile_in(dir)
}

pub(crate) fn persist(file: NamedTempFile, path: impl AsRef<Path>) -> io::Result<()> {
    file.persist(path).map_err(io::Error::from)?;

    Ok(())
}
