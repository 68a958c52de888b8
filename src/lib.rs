//! # dfunpack
//!
//! Extractor for the nested `DATA.DF` archives used to ship game data.
//!
//! A root archive holds a flat directory of named byte ranges. Each range is
//! either stored raw or DEFLATE-compressed (flagged by a leading `0xEC`
//! byte), and entries named `*.DF` are archives of a second layout that are
//! unpacked into the same destination directory as soon as they are written.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use dfunpack::{DfExtractor, ExtractOptions};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let extractor = DfExtractor::new(ExtractOptions::default());
//!     let report = extractor.extract_file(Path::new("DATA.DF")).await?;
//!     println!("{} files written, {} skipped", report.extracted, report.skipped);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod df;
pub mod error;
pub mod io;

pub use cli::Cli;
pub use df::{DfExtractor, DfParser, DirectoryEntry, DirectoryKind, ExtractOptions, ExtractionReport};
pub use error::{DfError, Result};
pub use io::{LocalFileReader, MemoryReader, ReadAt};
