#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub use chapter::ChapterFiles;
pub use compose::{collect_images, compose, natural_cmp, ExternalRenderer, Render};
pub use errors::{ComposeError, Error, ExpandError, Result};
pub use expand::{expand, ExtractionStats};
pub use fetch::{Fetch, HttpFetcher};
pub use pipeline::{Event, Outcome, Pipeline};
pub use progress::ProgressStore;
pub use settings::Settings;

mod atomic;
pub mod chapter;
pub mod compose;
pub mod errors;
pub mod expand;
pub mod fetch;
pub mod pipeline;
pub mod progress;
pub mod settings;
