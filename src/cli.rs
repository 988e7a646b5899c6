//! Command-line arguments

use crate::config::Config;
use crate::entry::Entry;
use crate::observer::Selection;
use clap::Parser;
use glob::Pattern;
use std::path::PathBuf;

/// Extract a ZIP archive into a folder tree, entry by entry
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ziplift",
    version,
    about = "Extract a ZIP archive into a folder tree with live progress, retry and cancellation",
    after_help = "EXAMPLES:\n    \
        ziplift photos.zip ~/Pictures\n    \
        ziplift release.zip out/ --workers 4 --exclude '*.pdb'\n    \
        ziplift backup.zip --no-verify --retries 3"
)]
pub struct Cli {
    /// Archive to extract
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Destination directory; the archive lands in <DEST>/<archive name>
    #[arg(value_name = "DEST", default_value = ".")]
    pub dest: PathBuf,

    /// Concurrent folder creations and file uploads
    #[arg(short = 'w', long, value_name = "NUM")]
    pub workers: Option<usize>,

    /// Skip CRC-32 verification of decompressed files
    #[arg(long)]
    pub no_verify: bool,

    /// Skip entries whose path matches this glob (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Retry rounds for entries that failed
    #[arg(long, value_name = "NUM")]
    pub retries: Option<u32>,

    /// Configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Do not draw the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Apply flag overrides on top of a loaded configuration
    pub fn merge(&self, mut config: Config) -> Config {
        if let Some(workers) = self.workers {
            config.session.workers = workers;
        }
        if self.no_verify {
            config.session.verify_checksum = false;
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        config
    }

    pub fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }

    pub fn exclusions(&self) -> Result<Exclusions, glob::PatternError> {
        let patterns = self
            .exclude
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Exclusions { patterns })
    }
}

/// Selection rejecting entries that match any exclude glob
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    patterns: Vec<Pattern>,
}

impl Selection for Exclusions {
    fn is_selected(&self, entry: &Entry) -> bool {
        !self
            .patterns
            .iter()
            .any(|p| p.matches(entry.path()) || p.matches(entry.name()))
    }
}
