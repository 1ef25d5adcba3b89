use std::io::Write;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use reqwest::{Client, Response};
use tracing::{debug, info};
use url::Url;

use crate::{atomic, ChapterFiles, Error, Result, Settings};

/// Makes the archive of a chapter available locally
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Returns the path of the local archive for chapter `index`
    ///
    /// ## Errors
    ///
    /// [`Error::NotFound`] when the chapter doesn't exist remotely,
    /// any other error for transport or local write failures
    async fn fetch(&self, index: u32) -> Result<Utf8PathBuf>;
}

#[async_trait]
impl<'a, T> Fetch for &'a T
where
    T: Fetch + ?Sized,
{
    async fn fetch(&self, index: u32) -> Result<Utf8PathBuf> {
        (**self).fetch(index).await
    }
}

/// Downloads chapter archives over HTTP, one request per missing archive, no retry
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    remote_url: Url,
    download_folder: Utf8PathBuf,
    archive_extension: String,
}

impl HttpFetcher {
    /// ## Errors
    ///
    /// Fails if `remote_url` isn't a valid url or the http client can't be built
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = settings.timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            remote_url: base_url(&settings.remote_url)?,
            download_folder: settings.download_folder.clone(),
            archive_extension: settings.archive_extension.clone(),
        })
    }

    /// `{remote_url}/{index}.{archive_extension}`
    ///
    /// ## Errors
    ///
    /// Fails if the resulting url is invalid
    pub fn remote_url(&self, index: u32) -> Result<Url> {
        Ok(self
            .remote_url
            .join(&format!("{index}.{}", self.archive_extension))?)
    }

    async fn download(&self, url: &Url, destination: &Utf8Path) -> Result<()> {
        info!("Downloading {url}");

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(|err| Error::fetch(url.clone(), err))?;

        // Nothing shows up at `destination` until the whole body is there
        let mut file = atomic::create_beside(destination)?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| Error::fetch(url.clone(), err))?
        {
            file.write_all(&chunk)?;
        }
        atomic::persist(file, destination)?;

        info!("downloaded {url} to {destination}");

        Ok(())
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, index: u32) -> Result<Utf8PathBuf> {
        let files = ChapterFiles::new(&self.download_folder, index, &self.archive_extension);

        if files.archive.exists() {
            debug!("{} already downloaded, skipping", files.archive);
            return Ok(files.archive);
        }

        self.download(&self.remote_url(index)?, &files.archive).await?;

        Ok(files.archive)
    }
}

/// `Url::join` drops the last path segment unless it ends with a slash
fn base_url(remote_url: &str) -> Result<Url> {
    if remote_url.ends_with('/') {
        Ok(remote_url.parse()?)
    } else {
        Ok(format!("{remote_url}/").parse()?)
    }
}
