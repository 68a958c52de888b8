use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

use crate::df::ExtractOptions;
use crate::df::extractor::{DEFAULT_DEST_ROOT, DEFAULT_MAX_DEPTH};

#[derive(Parser, Debug)]
#[command(name = "dfunpack")]
#[command(version)]
#[command(about = "Extract DF game data archives, including nested .DF archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  dfunpack DATA.DF               extract everything into data/\n  \
  dfunpack -d out DATA.DF        extract into out/\n  \
  dfunpack -lv DATA.DF           list the root directory with offsets and sizes")]
pub struct Cli {
    /// Root archive path
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Extract files into DIR
    #[arg(short = 'd', long = "dest", value_name = "DIR", default_value = DEFAULT_DEST_ROOT)]
    pub dest: PathBuf,

    /// List the root directory instead of extracting
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely (offsets, sizes, payload kind)
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Leave nested archives deeper than N levels packed (the format sets no
    /// limit; this stops self-containing archives)
    #[arg(long = "max-depth", value_name = "N", default_value_t = DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,
}

impl Cli {
    pub fn is_list(&self) -> bool {
        self.list || self.verbose
    }

    /// Default log level, before `RUST_LOG` is applied
    pub fn log_level(&self) -> LevelFilter {
        match self.quiet {
            0 => LevelFilter::Info,
            1 => LevelFilter::Warn,
            _ => LevelFilter::Error,
        }
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            dest_root: self.dest.clone(),
            max_depth: self.max_depth,
        }
    }
}
