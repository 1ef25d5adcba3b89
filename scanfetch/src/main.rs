#![deny(clippy::all)]
#![deny(clippy::pedantic)]

use std::{process::ExitCode, time::Duration};

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use scanfetch_core::{
    Event, ExternalRenderer, HttpFetcher, Outcome, Pipeline, ProgressStore, Settings,
};
use tokio::sync::mpsc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::args::Args;

mod args;

/// Exit code when a chapter kept failing
static ERROR_LIMIT_EXIT_CODE: u8 = 2;

fn init_tracing(verbose: bool) {
    let default_directives = if verbose {
        "scanfetch=debug,scanfetch_core=debug"
    } else {
        "error"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// What the console shows for an event
#[derive(Debug, PartialEq, Eq)]
enum Report {
    /// Replaces the spinner message
    Status(String),
    /// Printed on its own line
    Line(String),
}

fn describe(event: Event, verbose: bool) -> Option<Report> {
    match event {
        Event::Started { index, attempt } => Some(Report::Status(format!(
            "Chapter #{index} (attempt {attempt})"
        ))),
        Event::Fetching { index } => Some(Report::Status(format!(
            "Downloading chapter #{index}..."
        ))),
        Event::Fetched { archive, .. } => Some(Report::Line(format!(
            "...Success, downloaded to {archive}"
        ))),
        Event::Expanded { index, stats } => Some(Report::Line(format!(
            "...Success, chapter #{index} unzipped ({} files, {} already there)",
            stats.written, stats.skipped
        ))),
        Event::Composed {
            pages, document, ..
        } => Some(Report::Line(format!(
            "...Success, {document} created ({pages} pages)"
        ))),
        Event::Completed { index } => Some(Report::Line(format!("Chapter #{index} done"))),
        Event::Failed {
            index,
            attempt,
            error,
        } => verbose.then(|| {
            Report::Line(format!(
                "\tError on chapter #{index} (attempt {attempt}): {error}"
            ))
        }),
    }
}

async fn report(mut rx: mpsc::UnboundedReceiver<Event>, verbose: bool) {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(120));

    while let Some(event) = rx.recv().await {
        match describe(event, verbose) {
            Some(Report::Status(message)) => bar.set_message(message),
            // Printed even when the spinner is hidden (not a terminal)
            Some(Report::Line(line)) => bar.suspend(|| println!("{line}")),
            None => {}
        }
    }

    bar.finish_and_clear();
}

/// `0` once the latest chapter is reached, [`ERROR_LIMIT_EXIT_CODE`] if a chapter kept failing.
/// Startup errors exit with `1` through the `Err` returned by `main`.
fn exit_code(outcome: &Outcome) -> u8 {
    match outcome {
        Outcome::LatestReached { .. } => 0,
        Outcome::ErrorLimit { .. } => ERROR_LIMIT_EXIT_CODE,
    }
}

/// Checks the progress file, then builds the fetcher and finds the renderer
///
/// A fresh progress file needs editing first, so it's reported before a missing renderer
fn prepare(settings: &Settings) -> scanfetch_core::Result<(HttpFetcher, ExternalRenderer)> {
    let last_completed = ProgressStore::new(settings.progress_file.clone()).read()?;
    debug!("starting after chapter #{last_completed}");

    let fetcher = HttpFetcher::new(settings)?;
    let renderer = ExternalRenderer::discover(&settings.renderer)?;

    Ok((fetcher, renderer))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let mut settings = Settings::load(&args.settings)?;
    args.apply(&mut settings);

    init_tracing(settings.verbose);
    debug!(?settings, "settings loaded");

    let (fetcher, renderer) = prepare(&settings)?;

    println!("Starting downloading scans from {}", settings.remote_url);

    let (tx, rx) = mpsc::unbounded_channel();
    let reporter = tokio::spawn(report(rx, settings.verbose));

    let outcome = Pipeline::new(&settings, fetcher, renderer)
        .set_sender(tx)
        .run()
        .await;

    // the pipeline, and so the sender, is gone: the reporter drains and stops
    reporter.await?;

    let outcome = outcome?;
    match &outcome {
        Outcome::LatestReached { last_completed } => {
            println!("Obviously, chapter #{last_completed} was the latest.");
            println!(
                "Otherwise, try to adjust the chapter number in {}",
                settings.progress_file
            );
        }
        Outcome::ErrorLimit {
            index,
            attempts,
            error,
        } => {
            eprintln!("Too many errors to continue on chapter #{index} ({attempts} attempts): {error}");
            eprintln!("Please check the trace, run with --verbose for details.");
        }
    }

    Ok(ExitCode::from(exit_code(&outcome)))
}
