use std::{
    fs::{self, File},
    io::{self, BufReader},
    path::Path,
};

use camino::Utf8Path;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::{atomic, Error, ExpandError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ExtractionStats {
    pub written: usize,
    /// Files already present from a previous, interrupted, extraction
    pub skipped: usize,
}

/// Extracts every file of `archive` under `destination`, then removes `archive`.
///
/// Files already present under `destination` are left untouched,
/// so an interrupted extraction resumes where it stopped.
///
/// ## Errors
///
/// Fails with [`Error::Expand`] if the archive can't be read, an entry can't be written,
/// or an entry would land outside of `destination`. The archive is kept in that case.
pub fn expand(archive: &Utf8Path, destination: &Utf8Path) -> Result<ExtractionStats> {
    let expand_error = |source: ExpandError| Error::Expand {
        archive: archive.to_owned(),
        source,
    };

    let stats = extract_entries(archive, destination).map_err(expand_error)?;
    fs::remove_file(archive).map_err(|err| expand_error(err.into()))?;

    info!(
        "unzipped {archive} to {destination} ({} written, {} skipped)",
        stats.written, stats.skipped
    );

    Ok(stats)
}

fn extract_entries(
    archive: &Utf8Path,
    destination: &Utf8Path,
) -> Result<ExtractionStats, ExpandError> {
    fs::create_dir_all(destination)?;

    let mut zip = ZipArchive::new(BufReader::new(File::open(archive)?))?;
    let mut stats = ExtractionStats::default();

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let Some(relative_path) = entry.enclosed_name().map(Path::to_path_buf) else {
            return Err(ExpandError::UnsafeEntry(entry.name().to_string()));
        };
        let target = destination.as_std_path().join(relative_path);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if target.exists() {
            debug!("{} already extracted, skipping", target.display());
            stats.skipped += 1;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = atomic::create_beside(&target)?;
        io::copy(&mut entry, &mut file)?;
        atomic::persist(file, &target)?;
        stats.written += 1;
    }

    Ok(stats)
}
