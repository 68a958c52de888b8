use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while decoding or extracting a DF archive.
///
/// Entry-level kinds ([`DfError::is_entry_level`]) only ever skip the
/// offending entry; the remaining kinds end the extraction of the archive
/// they were raised for.
#[derive(Debug, Error)]
pub enum DfError {
    #[error("can't open {}: {source}", path.display())]
    OpenFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("directory truncated: {expected} bytes declared, {available} available")]
    TruncatedDirectory { expected: u64, available: u64 },

    #[error("entry has offset {offset} and size {size}, nothing to extract")]
    InvalidEntry { offset: u64, size: u64 },

    #[error("can't seek to offset {offset} (stream is {stream_size} bytes)")]
    SeekFailed { offset: u64, stream_size: u64 },

    #[error("no data at offset {offset}")]
    EmptyPayload { offset: u64 },

    #[error("decompression failed: {0}")]
    DecompressionFailed(#[source] io::Error),

    #[error("refusing to extract {0:?} outside the destination directory")]
    UnsafePath(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl DfError {
    /// Whether this error only concerns a single directory entry.
    pub fn is_entry_level(&self) -> bool {
        matches!(
            self,
            DfError::InvalidEntry { .. }
                | DfError::SeekFailed { .. }
                | DfError::EmptyPayload { .. }
                | DfError::DecompressionFailed(_)
                | DfError::UnsafePath(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_level_kinds() {
        assert!(DfError::EmptyPayload { offset: 4 }.is_entry_level());
        assert!(DfError::UnsafePath("../x".into()).is_entry_level());
        assert!(
            !DfError::TruncatedDirectory {
                expected: 44,
                available: 10
            }
            .is_entry_level()
        );
    }
}
