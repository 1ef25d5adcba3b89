use camino::Utf8PathBuf;
use clap::Parser;
use scanfetch_core::{settings::DEFAULT_SETTINGS_FILE, Settings};

#[derive(Parser, Debug)]
#[clap(about, author, version)]
pub struct Args {
    /// Settings file, its keys are read under a top-level `settings` entry
    #[clap(short, long, default_value = DEFAULT_SETTINGS_FILE)]
    pub settings: Utf8PathBuf,
    /// Where archives are downloaded and documents created, overrides the settings file
    #[clap(short, long)]
    pub download_folder: Option<Utf8PathBuf>,
    /// File holding the number of the latest chapter downloaded
    #[clap(short, long)]
    pub progress_file: Option<Utf8PathBuf>,
    /// Print the error of every failed attempt
    #[clap(short, long, action)]
    pub verbose: bool,
}

impl Args {
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(download_folder) = &self.download_folder {
            settings.download_folder = download_folder.clone();
        }
        if let Some(progress_file) = &self.progress_file {
            settings.progress_file = progress_file.clone();
        }
        if self.verbose {
            settings.verbose = true;
        }
    }
}
