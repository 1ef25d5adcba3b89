use std::{fs, io::Write};

use camino::{Utf8Path, Utf8PathBuf};
use serde_yaml::Value;
use tracing::{debug, info};

use crate::{atomic, Error, Result};

/// Written on first run, deliberately not a number so the operator has to pick the starting chapter
pub static PLACEHOLDER: &str = "???";

/// The last chapter fully processed, kept as a single yaml scalar
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgressStore {
    path: Utf8PathBuf,
}

impl ProgressStore {
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Reads the last chapter downloaded, creating the file with a placeholder if it doesn't exist
    ///
    /// ## Errors
    ///
    /// Fails if the file can't be read or written,
    /// or with [`Error::InvalidProgress`] until it holds a non-negative integer
    pub fn read(&self) -> Result<u32> {
        if !self.path.exists() {
            info!("creating {}, set the latest chapter downloaded in it", self.path);
            self.store(&format!("\"{PLACEHOLDER}\""))?;
        }

        let content = fs::read_to_string(&self.path)?;

        parse(&content).ok_or_else(|| Error::InvalidProgress {
            path: self.path.clone(),
            content: content.trim().to_string(),
        })
    }

    /// Overwrites the last chapter downloaded
    ///
    /// ## Errors
    ///
    /// Fails if the file can't be written
    pub fn write(&self, index: u32) -> Result<()> {
        self.store(serde_yaml::to_string(&index)?.trim_end())?;
        debug!("saved chapter {index} as the latest downloaded");

        Ok(())
    }

    fn store(&self, scalar: &str) -> Result<()> {
        let mut file = atomic::create_beside(&self.path)?;
        writeln!(file, "--- {scalar}")?;
        atomic::persist(file, &self.path)?;

        Ok(())
    }
}

/// A yaml document holding a single non-negative integer, possibly quoted
fn parse(content: &str) -> Option<u32> {
    match serde_yaml::from_str(content).ok()? {
        Value::Number(number) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
