use camino::{Utf8Path, Utf8PathBuf};

pub static DOCUMENT_EXTENSION: &str = "pdf";

/// Local paths of everything produced for one chapter under the download folder
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChapterFiles {
    pub index: u32,
    /// `{index}.{archive_extension}`, removed once expanded
    pub archive: Utf8PathBuf,
    /// `{index}/`, removed once composed
    pub extraction_dir: Utf8PathBuf,
    /// `{index}.pdf`, the only artifact that stays
    pub document: Utf8PathBuf,
}

impl ChapterFiles {
    #[must_use]
    pub fn new(download_folder: impl AsRef<Utf8Path>, index: u32, archive_extension: &str) -> Self {
        let download_folder = download_folder.as_ref();
        let extraction_dir = download_folder.join(index.to_string());

        Self {
            index,
            archive: extraction_dir.with_extension(archive_extension),
            document: extraction_dir.with_extension(DOCUMENT_EXTENSION),
            extraction_dir,
        }
    }

    /// The archive is gone and its content is on disk
    #[must_use]
    pub fn is_expanded(&self) -> bool {
        !self.archive.exists() && self.extraction_dir.is_dir()
    }

    /// Only the document is left, nothing more to do but saving the progress
    #[must_use]
    pub fn is_composed(&self) -> bool {
        !self.archive.exists() && !self.extraction_dir.exists() && self.document.is_file()
    }
}
