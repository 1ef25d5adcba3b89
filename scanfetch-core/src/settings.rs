use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{de, Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::Result;

pub static APP_NAME: &str = "scanfetch";
pub static DEFAULT_SETTINGS_FILE: &str = "settings.yml";
pub static DEFAULT_PROGRESS_FILE: &str = "latest_chapter_downloaded.yml";
pub static DEFAULT_REMOTE_URL: &str = "http://narutobase.net/downloads/naruto-manga";
pub static DEFAULT_ARCHIVE_EXTENSION: &str = "zip";
pub static DEFAULT_RENDERER: &str = "convert";
pub static DEFAULT_IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
pub static DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub static DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Settings file keys live under this top-level entry
pub static SETTINGS_PROFILE: &str = "settings";

/// Environment variables with this prefix override the settings file
pub static ENV_PREFIX: &str = "SCANFETCH_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Archives, extraction directories and documents all land here
    pub download_folder: Utf8PathBuf,
    /// Print error details for every failed attempt
    #[serde(deserialize_with = "yes_or_no")]
    pub verbose: bool,
    /// Chapter `n` is fetched from `{remote_url}/{n}.{archive_extension}`
    pub remote_url: String,
    pub archive_extension: String,
    pub progress_file: Utf8PathBuf,
    /// Program turning the pages into a document, resolved on `PATH`
    pub renderer: String,
    pub image_extensions: Vec<String>,
    /// Consecutive failures tolerated on a single chapter
    pub max_attempts: u32,
    /// Network timeout in seconds, `0` disables it
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            download_folder: default_download_folder(),
            verbose: false,
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            archive_extension: DEFAULT_ARCHIVE_EXTENSION.to_string(),
            progress_file: Utf8PathBuf::from(DEFAULT_PROGRESS_FILE),
            renderer: DEFAULT_RENDERER.to_string(),
            image_extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    /// Defaults, then the (optional) yaml file at `path`, then the environment
    #[must_use]
    pub fn figment(path: impl AsRef<Utf8Path>) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Yaml::file(path.as_ref()).nested())
            .merge(Env::prefixed(ENV_PREFIX).global())
            .select(SETTINGS_PROFILE)
    }

    /// Load the settings, a missing file only means defaults are used
    ///
    /// ## Errors
    ///
    /// Fails if the file can't be parsed or a value has the wrong type
    pub fn load(path: impl AsRef<Utf8Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("no settings file at {path}, using defaults");
        }

        Ok(Self::figment(path).extract()?)
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

fn default_download_folder() -> Utf8PathBuf {
    let downloads = Utf8PathBuf::from("Downloads").join(APP_NAME);

    match home::home_dir().and_then(|home| Utf8PathBuf::from_path_buf(home).ok()) {
        Some(home) => home.join(downloads),
        None => downloads,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum YesNo {
    Bool(bool),
    Text(String),
}

fn yes_or_no<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match YesNo::deserialize(deserializer)? {
        YesNo::Bool(value) => Ok(value),
        YesNo::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" | "on" => Ok(true),
            "no" | "n" | "false" | "off" | "" => Ok(false),
            other => Err(de::Error::custom(format!(
                "expected yes or no, found {other:?}"
            ))),
        },
    }
}
