use std::fs;

use camino::Utf8PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::{
    compose, expand, ChapterFiles, Error, ExtractionStats, Fetch, ProgressStore, Render, Result,
    Settings,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Event {
    Started { index: u32, attempt: u32 },
    Fetching { index: u32 },
    Fetched { index: u32, archive: Utf8PathBuf },
    Expanded { index: u32, stats: ExtractionStats },
    Composed { index: u32, pages: usize, document: Utf8PathBuf },
    Completed { index: u32 },
    Failed { index: u32, attempt: u32, error: String },
}

/// How a run ended, both variants stop the loop
#[derive(Debug)]
pub enum Outcome {
    /// The chapter after `last_completed` doesn't exist yet
    LatestReached { last_completed: u32 },
    /// Chapter `index` failed `attempts` times in a row
    ErrorLimit {
        index: u32,
        attempts: u32,
        error: Error,
    },
}

/// Downloads, unpacks and renders chapters one after the other,
/// starting right after the last one recorded in the progress file.
pub struct Pipeline<'a, F, R> {
    settings: &'a Settings,
    progress: ProgressStore,
    fetcher: F,
    renderer: R,
    sender: mpsc::UnboundedSender<Event>,
}

impl<'a, F, R> Pipeline<'a, F, R>
where
    F: Fetch,
    R: Render,
{
    #[must_use]
    pub fn new(settings: &'a Settings, fetcher: F, renderer: R) -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();

        Self {
            settings,
            progress: ProgressStore::new(settings.progress_file.clone()),
            fetcher,
            renderer,
            sender: tx,
        }
    }

    #[must_use]
    pub fn set_sender(mut self, sender: mpsc::UnboundedSender<Event>) -> Self {
        self.sender = sender;
        self
    }

    /// Processes chapters until one isn't found remotely or one keeps failing.
    ///
    /// A chapter that fails is attempted again, up to `max_attempts` times in a row.
    /// The progress file is only updated once a chapter is fully processed.
    ///
    /// ## Errors
    ///
    /// Only fails before the first chapter: unreadable or invalid progress file,
    /// or a download folder that can't be created
    pub async fn run(&self) -> Result<Outcome> {
        let mut last_completed = self.progress.read()?;

        if !self.settings.download_folder.exists() {
            fs::create_dir_all(&self.settings.download_folder)?;
            info!("Folder {} created", self.settings.download_folder);
        }

        let mut attempts = 0;

        loop {
            let Some(index) = last_completed.checked_add(1) else {
                return Ok(Outcome::LatestReached { last_completed });
            };

            attempts += 1;
            self.send(Event::Started {
                index,
                attempt: attempts,
            });

            match self.process(index).await {
                Ok(()) => {
                    last_completed = index;
                    attempts = 0;
                    info!("Chapter #{index} done");
                    self.send(Event::Completed { index });
                }
                Err(err) if err.is_not_found() => {
                    info!("chapter #{index} not found, #{last_completed} was the latest");
                    return Ok(Outcome::LatestReached { last_completed });
                }
                Err(err) => {
                    warn!("chapter #{index}, attempt {attempts}: {err}");
                    self.send(Event::Failed {
                        index,
                        attempt: attempts,
                        error: err.to_string(),
                    });

                    if attempts >= self.settings.max_attempts {
                        return Ok(Outcome::ErrorLimit {
                            index,
                            attempts,
                            error: err,
                        });
                    }
                }
            }
        }
    }

    async fn process(&self, index: u32) -> Result<()> {
        let files = ChapterFiles::new(
            &self.settings.download_folder,
            index,
            &self.settings.archive_extension,
        );

        if files.is_composed() {
            debug!("{} already created", files.document);
        } else {
            if files.is_expanded() {
                debug!("{} already extracted", files.extraction_dir);
            } else {
                self.send(Event::Fetching { index });
                let archive = self.fetcher.fetch(index).await?;
                self.send(Event::Fetched {
                    index,
                    archive: archive.clone(),
                });

                let stats = expand(&archive, &files.extraction_dir)?;
                self.send(Event::Expanded { index, stats });
            }

            let pages = compose(
                &self.renderer,
                &files.extraction_dir,
                &files.document,
                &self.settings.image_extensions,
            )
            .await?;
            self.send(Event::Composed {
                index,
                pages,
                document: files.document.clone(),
            });
        }

        self.progress.write(index)
    }

    fn send(&self, event: Event) {
        // Nobody listening is fine
        if self.sender.send(event).is_err() {
            trace!("no event receiver");
        }
    }
}
