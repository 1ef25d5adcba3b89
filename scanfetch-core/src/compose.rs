use std::{cmp::Ordering, ffi::OsStr, fs, io, path::PathBuf};

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use glob::{glob_with, MatchOptions, Pattern};
use tokio::process::Command;
use tracing::{debug, info};

use crate::{ComposeError, Error, Result};

/// Turns an ordered list of pages into a single document
#[async_trait]
pub trait Render: Send + Sync {
    /// ## Errors
    ///
    /// Fails if the document couldn't be created
    async fn render(&self, pages: &[Utf8PathBuf], document: &Utf8Path)
        -> Result<(), ComposeError>;
}

#[async_trait]
impl<'a, T> Render for &'a T
where
    T: Render + ?Sized,
{
    async fn render(
        &self,
        pages: &[Utf8PathBuf],
        document: &Utf8Path,
    ) -> Result<(), ComposeError> {
        (**self).render(pages, document).await
    }
}

/// Renders through an external program called as `program <pages>... <document>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalRenderer {
    program: PathBuf,
}

impl ExternalRenderer {
    /// Looks `program` up on `PATH`
    ///
    /// ## Errors
    ///
    /// Fails with [`Error::RendererNotFound`] if it can't be found
    pub fn discover(program: impl AsRef<OsStr>) -> Result<Self> {
        let program = program.as_ref();
        let path = which::which(program).map_err(|source| Error::RendererNotFound {
            program: program.to_string_lossy().to_string(),
            source,
        })?;
        debug!("using renderer {}", path.display());

        Ok(Self { program: path })
    }
}

#[async_trait]
impl Render for ExternalRenderer {
    async fn render(
        &self,
        pages: &[Utf8PathBuf],
        document: &Utf8Path,
    ) -> Result<(), ComposeError> {
        let program = self.program.display().to_string();
        debug!("running {program} on {} pages", pages.len());

        // A leftover document would hide a renderer that writes nothing
        if let Err(err) = fs::remove_file(document) {
            if err.kind() != io::ErrorKind::NotFound {
                return Err(err.into());
            }
        }

        let output = Command::new(&self.program)
            .args(pages)
            .arg(document)
            .output()
            .await?;

        if !output.status.success() {
            return Err(ComposeError::RendererFailed {
                program,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if !document.is_file() {
            return Err(ComposeError::MissingDocument {
                program,
                document: document.to_owned(),
            });
        }

        Ok(())
    }
}

/// Renders every image found under `images_dir` into `document`, then removes `images_dir`.
///
/// Returns the number of pages. `images_dir` is only removed once the renderer succeeded.
///
/// ## Errors
///
/// Fails with [`Error::Compose`] if no image is found, the renderer fails,
/// or `images_dir` can't be removed
pub async fn compose<R>(
    renderer: &R,
    images_dir: &Utf8Path,
    document: &Utf8Path,
    extensions: &[String],
) -> Result<usize>
where
    R: Render + ?Sized,
{
    let compose_error = |source: ComposeError| Error::Compose {
        document: document.to_owned(),
        source,
    };

    info!("Converting images of {images_dir} to {document}");

    let pages = collect_images(images_dir, extensions).map_err(compose_error)?;
    renderer
        .render(&pages, document)
        .await
        .map_err(compose_error)?;
    fs::remove_dir_all(images_dir).map_err(|err| compose_error(err.into()))?;

    info!("{document} created with {} pages", pages.len());

    Ok(pages.len())
}

/// All the files under `images_dir` matching one of `extensions` (case insensitive),
/// in reading order
///
/// ## Errors
///
/// Fails if the directory can't be walked or no image is found
pub fn collect_images(
    images_dir: &Utf8Path,
    extensions: &[String],
) -> Result<Vec<Utf8PathBuf>, ComposeError> {
    // Dotfiles such as `__MACOSX/._01.jpg` aren't pages
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };
    let root = Pattern::escape(images_dir.as_str());
    let mut pages = Vec::new();

    for extension in extensions {
        for path in glob_with(&format!("{root}/**/*.{extension}"), options)? {
            let path = Utf8PathBuf::from_path_buf(path?).map_err(ComposeError::NonUtf8Path)?;
            if path.is_file() {
                pages.push(path);
            }
        }
    }

    // Same file matched by two spellings of an extension (jpg, JPG)
    pages.sort_by(|a, b| natural_cmp(a.as_str(), b.as_str()));
    pages.dedup();

    if pages.is_empty() {
        return Err(ComposeError::NoImages(images_dir.to_owned()));
    }

    Ok(pages)
}

/// Compares strings with digit runs compared by value: `2.jpg` < `10.jpg`
#[must_use]
pub fn natural_cmp(left: &str, right: &str) -> Ordering {
    let (mut left, mut right) = (left, right);

    loop {
        match (left.chars().next(), right.chars().next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let (left_digits, left_rest) = split_digits(left);
                let (right_digits, right_rest) = split_digits(right);
                let left_value = left_digits.trim_start_matches('0');
                let right_value = right_digits.trim_start_matches('0');

                let ordering = left_value
                    .len()
                    .cmp(&right_value.len())
                    .then_with(|| left_value.cmp(right_value))
                    // 007 after 7, otherwise they'd be equal
                    .then_with(|| left_digits.len().cmp(&right_digits.len()));
                if ordering != Ordering::Equal {
                    return ordering;
                }

                left = left_rest;
                right = right_rest;
            }
            (Some(l), Some(r)) => {
                if l != r {
                    return l.cmp(&r);
                }

                left = &left[l.len_utf8()..];
                right = &right[r.len_utf8()..];
            }
        }
    }
}

fn split_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}
