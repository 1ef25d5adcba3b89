use std::{io, path::PathBuf, process::ExitStatus};

use camino::Utf8PathBuf;
use glob::{GlobError, PatternError};
use reqwest::StatusCode;
use url::Url;
use zip::result::ZipError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("you need to adjust the latest chapter downloaded in {path} (found {content:?})")]
    InvalidProgress { path: Utf8PathBuf, content: String },

    #[error("settings error: {0}")]
    Settings(#[source] Box<figment::Error>),

    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("renderer {program} not found: {source}")]
    RendererNotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error("{url} not found")]
    NotFound { url: Url },

    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to expand {archive}: {source}")]
    Expand {
        archive: Utf8PathBuf,
        #[source]
        source: ExpandError,
    },

    #[error("failed to compose {document}: {source}")]
    Compose {
        document: Utf8PathBuf,
        #[source]
        source: ComposeError,
    },

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error {0}")]
    IO(#[from] io::Error),
}

impl Error {
    /// Wraps a transport failure, turning a 404 answer into [`Error::NotFound`]
    pub(crate) fn fetch(url: Url, source: reqwest::Error) -> Self {
        if source.status() == Some(StatusCode::NOT_FOUND) {
            Self::NotFound { url }
        } else {
            Self::Fetch { url, source }
        }
    }

    /// The HTTP status behind a fetch failure, when there is one
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::NotFound { .. } => Some(StatusCode::NOT_FOUND),
            Self::Fetch { source, .. } => source.status(),
            _ => None,
        }
    }

    /// The remote chapter doesn't exist (yet): the latest one has been reached
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Errors the operator has to fix by hand, retrying won't help
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidProgress { .. }
                | Self::Settings(_)
                | Self::UrlParse(_)
                | Self::RendererNotFound { .. }
        )
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Settings(Box::new(err))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExpandError {
    #[error("IO error {0}")]
    IO(#[from] io::Error),

    #[error("Zip error {0}")]
    Zip(#[from] ZipError),

    #[error("archive entry {0:?} would be extracted outside of the destination")]
    UnsafeEntry(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("IO error {0}")]
    IO(#[from] io::Error),

    #[error("Glob error: {0}")]
    Glob(#[from] GlobError),

    #[error("Glob pattern error: {0}")]
    GlobPattern(#[from] PatternError),

    #[error("{0:?} is not a valid utf-8 path")]
    NonUtf8Path(PathBuf),

    #[error("no image found in {0}")]
    NoImages(Utf8PathBuf),

    #[error("{program} exited with {status}: {stderr}")]
    RendererFailed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{program} succeeded but didn't create {document}")]
    MissingDocument {
        program: String,
        document: Utf8PathBuf,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
