//! End to end runs of the pipeline against an in-memory archive source
//! and a renderer that writes the page names into the document.

use std::{
    collections::HashMap,
    fs,
    io::{self, Cursor, Write},
    sync::Mutex,
};

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use scanfetch_core::{
    ChapterFiles, ComposeError, Error, Event, Fetch, Outcome, Pipeline, ProgressStore, Render,
    Result, Settings,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use zip::{write::FileOptions, ZipWriter};

fn chapter_zip() -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for name in ["02.jpg", "10.jpg", "01.jpg", "credits.txt"] {
        zip.start_file(name, FileOptions::default()).unwrap();
        zip.write_all(name.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

struct ArchiveSource {
    download_folder: Utf8PathBuf,
    archives: HashMap<u32, Vec<u8>>,
    /// How many times each chapter fails before being served
    failures: Mutex<HashMap<u32, u32>>,
    requests: Mutex<Vec<u32>>,
}

impl ArchiveSource {
    fn new(settings: &Settings, chapters: impl IntoIterator<Item = u32>) -> Self {
        Self {
            download_folder: settings.download_folder.clone(),
            archives: chapters.into_iter().map(|index| (index, chapter_zip())).collect(),
            failures: Mutex::default(),
            requests: Mutex::default(),
        }
    }

    fn failing(self, index: u32, times: u32) -> Self {
        self.failures.lock().unwrap().insert(index, times);
        self
    }
}

#[async_trait]
impl Fetch for ArchiveSource {
    async fn fetch(&self, index: u32) -> Result<Utf8PathBuf> {
        let files = ChapterFiles::new(&self.download_folder, index, "zip");
        if files.archive.exists() {
            return Ok(files.archive);
        }

        self.requests.lock().unwrap().push(index);

        if let Some(remaining) = self.failures.lock().unwrap().get_mut(&index) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset").into());
            }
        }

        let Some(bytes) = self.archives.get(&index) else {
            return Err(Error::NotFound {
                url: format!("http://scans.test/{index}.zip").parse().unwrap(),
            });
        };
        fs::write(&files.archive, bytes)?;

        Ok(files.archive)
    }
}

#[derive(Default)]
struct PageListRenderer {
    fail: bool,
}

#[async_trait]
impl Render for PageListRenderer {
    async fn render(&self, pages: &[Utf8PathBuf], document: &Utf8Path) -> Result<(), ComposeError> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::Other, "renderer crashed").into());
        }

        let names = pages
            .iter()
            .filter_map(|page| page.file_name())
            .collect::<Vec<_>>();
        fs::write(document, names.join("\n"))?;

        Ok(())
    }
}

fn setup(last_completed: Option<u32>) -> (TempDir, Settings) {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp_dir.path().to_path_buf()).unwrap();
    let settings = Settings {
        download_folder: root.join("scans"),
        progress_file: root.join("latest_chapter_downloaded.yml"),
        ..Settings::default()
    };

    if let Some(last_completed) = last_completed {
        ProgressStore::new(settings.progress_file.clone())
            .write(last_completed)
            .unwrap();
    }

    (temp_dir, settings)
}

fn chapter_files(settings: &Settings, index: u32) -> ChapterFiles {
    ChapterFiles::new(&settings.download_folder, index, "zip")
}

fn last_completed(settings: &Settings) -> u32 {
    ProgressStore::new(settings.progress_file.clone())
        .read()
        .unwrap()
}

#[tokio::test]
async fn test_runs_until_latest_chapter() {
    let (_temp_dir, settings) = setup(Some(5));
    let source = ArchiveSource::new(&settings, [6, 7]);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let outcome = Pipeline::new(&settings, &source, PageListRenderer::default())
        .set_sender(tx)
        .run()
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::LatestReached { last_completed: 7 }));
    assert_eq!(last_completed(&settings), 7);
    assert_eq!(*source.requests.lock().unwrap(), vec![6, 7, 8]);

    for index in [6, 7] {
        let files = chapter_files(&settings, index);
        assert!(!files.archive.exists());
        assert!(!files.extraction_dir.exists());
        // pages in reading order, other files left out
        assert_eq!(
            fs::read_to_string(&files.document).unwrap(),
            "01.jpg\n02.jpg\n10.jpg"
        );
    }

    let files = chapter_files(&settings, 8);
    assert!(!files.archive.exists());
    assert!(!files.extraction_dir.exists());
    assert!(!files.document.exists());

    let mut completed = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let Event::Completed { index } = event {
            completed.push(index);
        }
    }
    assert_eq!(completed, vec![6, 7]);
}

#[tokio::test]
async fn test_stops_after_too_many_failures() {
    let (_temp_dir, settings) = setup(Some(5));
    let source = ArchiveSource::new(&settings, [6, 7]).failing(6, 3);

    let outcome = Pipeline::new(&settings, &source, PageListRenderer::default())
        .run()
        .await
        .unwrap();

    match outcome {
        Outcome::ErrorLimit {
            index,
            attempts,
            error,
        } => {
            assert_eq!((index, attempts), (6, 3));
            assert!(matches!(error, Error::IO(_)));
        }
        other => panic!("expected the error limit, got {other:?}"),
    }
    assert_eq!(last_completed(&settings), 5);
    assert_eq!(*source.requests.lock().unwrap(), vec![6, 6, 6]);
}

#[tokio::test]
async fn test_retries_the_same_chapter() {
    let (_temp_dir, settings) = setup(Some(5));
    let source = ArchiveSource::new(&settings, [6]).failing(6, 2);

    let outcome = Pipeline::new(&settings, &source, PageListRenderer::default())
        .run()
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::LatestReached { last_completed: 6 }));
    assert_eq!(last_completed(&settings), 6);
    assert_eq!(*source.requests.lock().unwrap(), vec![6, 6, 6, 7]);
}

#[tokio::test]
async fn test_failure_count_resets_after_success() {
    let (_temp_dir, settings) = setup(Some(5));
    let source = ArchiveSource::new(&settings, [6, 7])
        .failing(6, 2)
        .failing(7, 2);

    let outcome = Pipeline::new(&settings, &source, PageListRenderer::default())
        .run()
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::LatestReached { last_completed: 7 }));
}

#[tokio::test]
async fn test_missing_progress_file() {
    let (_temp_dir, settings) = setup(None);
    let source = ArchiveSource::new(&settings, [1]);

    let err = Pipeline::new(&settings, &source, PageListRenderer::default())
        .run()
        .await
        .unwrap_err();

    assert!(err.is_configuration());
    assert!(settings.progress_file.exists());
    assert!(source.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_render_keeps_images_and_skips_download() {
    let (_temp_dir, settings) = setup(Some(5));
    let source = ArchiveSource::new(&settings, [6]);

    let outcome = Pipeline::new(&settings, &source, PageListRenderer { fail: true })
        .run()
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        Outcome::ErrorLimit {
            index: 6,
            error: Error::Compose { .. },
            ..
        }
    ));
    let files = chapter_files(&settings, 6);
    assert!(files.extraction_dir.join("01.jpg").exists());
    assert!(!files.document.exists());
    // downloaded and unzipped once, only rendering was attempted again
    assert_eq!(*source.requests.lock().unwrap(), vec![6]);
    assert_eq!(last_completed(&settings), 5);
}

#[tokio::test]
async fn test_resumes_from_extracted_chapter() {
    let (_temp_dir, settings) = setup(Some(5));
    let source = ArchiveSource::new(&settings, std::iter::empty());
    let files = chapter_files(&settings, 6);
    fs::create_dir_all(&files.extraction_dir).unwrap();
    fs::write(files.extraction_dir.join("1.jpg"), b"img").unwrap();

    let outcome = Pipeline::new(&settings, &source, PageListRenderer::default())
        .run()
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::LatestReached { last_completed: 6 }));
    assert_eq!(fs::read_to_string(&files.document).unwrap(), "1.jpg");
    assert_eq!(*source.requests.lock().unwrap(), vec![7]);
}

#[tokio::test]
async fn test_resumes_from_composed_chapter() {
    let (_temp_dir, settings) = setup(Some(5));
    let source = ArchiveSource::new(&settings, std::iter::empty());
    let files = chapter_files(&settings, 6);
    fs::create_dir_all(&settings.download_folder).unwrap();
    fs::write(&files.document, b"pdf").unwrap();

    let outcome = Pipeline::new(&settings, &source, PageListRenderer::default())
        .run()
        .await
        .unwrap();

    assert!(matches!(outcome, Outcome::LatestReached { last_completed: 6 }));
    assert_eq!(fs::read(&files.document).unwrap(), b"pdf");
    assert_eq!(*source.requests.lock().unwrap(), vec![7]);
}
