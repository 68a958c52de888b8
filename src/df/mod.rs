//! DF archive parsing and extraction.
//!
//! ## Architecture
//!
//! - [`structures`]: fixed-width directory records of both archive layouts
//! - [`parser`]: directory decoding and payload resolution against a host stream
//! - [`inflate`]: chunked DEFLATE decoding of compressed payloads
//! - [`extractor`]: per-entry extraction and recursion into nested archives
//!
//! ## Format Overview
//!
//! A root archive starts with a `u32` entry count followed by 40-byte
//! records (`char[32]` name, `u32` offset, `u32` size). Entries whose name
//! ends in `.DF` are nested archives: a 16-byte header (`u32` count, `u32`
//! offset, two reserved words) followed by 0x224-byte records with 512-byte
//! names. All integers are little-endian and all offsets are absolute within
//! the archive holding the directory.
//!
//! A payload whose first byte is `0xEC` is a raw DEFLATE stream; anything
//! else is stored as-is.

pub mod extractor;
pub mod inflate;
pub mod parser;
pub mod structures;

pub use extractor::{DfExtractor, ExtractOptions, ExtractionReport};
pub use parser::{DfParser, Payload};
pub use structures::*;
