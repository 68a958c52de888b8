//! Directory decoding and payload resolution.
//!
//! Both directory layouts start at byte 0 of their host stream and are made
//! of fixed-width little-endian records, so the whole table is fetched in
//! a single read once its length is known and then sliced record by record.

use log::{debug, warn};
use std::sync::Arc;

use crate::error::{DfError, Result};
use crate::io::ReadAt;

use super::structures::*;

/// Raw bytes of one directory entry as read from the host stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub data: Vec<u8>,
    /// Size declared by the directory entry
    pub requested: u64,
}

impl Payload {
    /// Whether the stream ended before the declared size was read.
    pub fn is_truncated(&self) -> bool {
        (self.data.len() as u64) < self.requested
    }

    /// Whether the payload starts with the compressed block marker.
    pub fn is_compressed(&self) -> bool {
        self.data.first() == Some(&COMPRESSED_MARKER)
    }
}

/// Low-level DF archive parser.
///
/// Generic over the host stream so the same code reads the root archive,
/// nested archives written to disk, and in-memory buffers.
pub struct DfParser<R: ReadAt + ?Sized> {
    /// The underlying host stream
    reader: Arc<R>,
    /// Total size of the host stream in bytes
    size: u64,
}

impl<R: ReadAt + ?Sized> DfParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Decode the directory at the start of the stream using the given layout.
    pub async fn read_directory(&self, kind: DirectoryKind) -> Result<Vec<DirectoryEntry>> {
        let entries: Vec<DirectoryEntry> = match kind {
            DirectoryKind::Root => self
                .read_root_directory()
                .await?
                .into_iter()
                .map(DirectoryEntry::Root)
                .collect(),
            DirectoryKind::Nested => {
                let (_, entries) = self.read_nested_directory().await?;
                entries.into_iter().map(DirectoryEntry::Nested).collect()
            }
        };
        Ok(entries)
    }

    /// Read the root directory: a `u32` count then `count` 40-byte records.
    ///
    /// A zero count is reported and yields an empty list.
    pub async fn read_root_directory(&self) -> Result<Vec<RootEntry>> {
        let count_buf = self.read_table(0, 4).await?;
        let count = u32::from_le_bytes([count_buf[0], count_buf[1], count_buf[2], count_buf[3]]);

        if count == 0 {
            warn!("The archive doesn't contain any data");
            return Ok(Vec::new());
        }
        debug!("Root directory declares {} entries", count);

        let table = self
            .read_table(4, count as u64 * RootEntry::SIZE as u64)
            .await?;

        table
            .chunks_exact(RootEntry::SIZE)
            .map(RootEntry::from_bytes)
            .collect()
    }

    /// Read a nested directory: a 16-byte header then 548-byte records.
    pub async fn read_nested_directory(&self) -> Result<(SubArchiveHeader, Vec<SubEntry>)> {
        let header_buf = self.read_table(0, SubArchiveHeader::SIZE as u64).await?;
        let header = SubArchiveHeader::from_bytes(&header_buf)?;

        if header.file_count == 0 {
            warn!("The nested archive doesn't contain any data");
            return Ok((header, Vec::new()));
        }
        debug!(
            "Nested directory declares {} entries (header offset {:#x})",
            header.file_count, header.offset
        );

        let table = self
            .read_table(
                SubArchiveHeader::SIZE as u64,
                header.file_count as u64 * SubEntry::SIZE as u64,
            )
            .await?;

        let entries = table
            .chunks_exact(SubEntry::SIZE)
            .map(SubEntry::from_bytes)
            .collect::<Result<Vec<_>>>()?;

        Ok((header, entries))
    }

    /// Read exactly `len` directory bytes at `offset`.
    ///
    /// The length is checked against the stream before allocating, so a
    /// corrupt count fails instead of reserving gigabytes.
    async fn read_table(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        let expected = offset + len;
        if expected > self.size {
            return Err(DfError::TruncatedDirectory {
                expected,
                available: self.size,
            });
        }

        let mut buf = vec![0u8; len as usize];
        let read = self.reader.read_full_at(offset, &mut buf).await?;
        if read < buf.len() {
            return Err(DfError::TruncatedDirectory {
                expected,
                available: offset + read as u64,
            });
        }

        Ok(buf)
    }

    /// Read up to `size` bytes at the absolute `offset`.
    ///
    /// A read cut short by the end of the stream is not an error: the bytes
    /// that exist are returned and [`Payload::is_truncated`] reports it.
    pub async fn resolve_payload(&self, offset: u64, size: u64) -> Result<Payload> {
        if offset == 0 || size == 0 {
            return Err(DfError::InvalidEntry { offset, size });
        }
        // Positioning past the end succeeds; the read that follows finds nothing
        if offset >= self.size {
            return Err(DfError::EmptyPayload { offset });
        }

        let available = self.size - offset;
        let mut data = vec![0u8; size.min(available) as usize];
        let read = self
            .reader
            .read_full_at(offset, &mut data)
            .await
            .map_err(|e| {
                debug!("Read at offset {} failed: {}", offset, e);
                DfError::SeekFailed {
                    offset,
                    stream_size: self.size,
                }
            })?;

        if read == 0 {
            return Err(DfError::EmptyPayload { offset });
        }
        data.truncate(read);

        let payload = Payload {
            data,
            requested: size,
        };
        if payload.is_truncated() {
            warn!(
                "Wanted {} bytes at offset {}, got {}; output will be incomplete",
                size,
                offset,
                payload.data.len()
            );
        }

        Ok(payload)
    }

    /// Total size of the host stream in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;

    fn root_archive(entries: &[(&str, u32, u32)], tail: &[u8]) -> Vec<u8> {
        let mut data = (entries.len() as u32).to_le_bytes().to_vec();
        for (name, offset, size) in entries {
            let mut name_field = [0u8; RootEntry::NAME_LEN];
            name_field[..name.len()].copy_from_slice(name.as_bytes());
            data.extend_from_slice(&name_field);
            data.extend_from_slice(&offset.to_le_bytes());
            data.extend_from_slice(&size.to_le_bytes());
        }
        data.extend_from_slice(tail);
        data
    }

    fn parser(data: Vec<u8>) -> DfParser<MemoryReader> {
        DfParser::new(Arc::new(MemoryReader::new(data)))
    }

    #[tokio::test]
    async fn decodes_every_root_entry_in_order() {
        let data = root_archive(&[("A.BIN", 84, 2), ("B.BIN", 86, 3)], b"xxyyy");
        let entries = parser(data).read_root_directory().await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "A.BIN");
        assert_eq!((entries[0].offset, entries[0].size), (84, 2));
        assert_eq!(entries[1].name, "B.BIN");
        assert_eq!((entries[1].offset, entries[1].size), (86, 3));
    }

    #[tokio::test]
    async fn zero_count_is_empty_not_error() {
        let entries = parser(vec![0, 0, 0, 0]).read_root_directory().await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn short_root_table_is_truncated_directory() {
        let mut data = root_archive(&[("A.BIN", 84, 2)], &[]);
        data[0] = 5;
        let err = parser(data).read_root_directory().await.unwrap_err();
        assert!(matches!(
            err,
            DfError::TruncatedDirectory {
                expected: 204,
                available: 44
            }
        ));
    }

    #[tokio::test]
    async fn missing_count_is_truncated_directory() {
        let err = parser(vec![1, 0]).read_root_directory().await.unwrap_err();
        assert!(matches!(err, DfError::TruncatedDirectory { .. }));
    }

    #[tokio::test]
    async fn huge_count_fails_without_allocating() {
        let err = parser(vec![0xFF; 8]).read_root_directory().await.unwrap_err();
        assert!(matches!(err, DfError::TruncatedDirectory { .. }));
    }

    #[tokio::test]
    async fn nested_directory_selected_by_kind() {
        let mut data = Vec::new();
        for word in [1u32, 0, 0, 0] {
            data.extend_from_slice(&word.to_le_bytes());
        }
        let mut record = vec![0u8; SubEntry::SIZE];
        record[12..16].copy_from_slice(&5u32.to_le_bytes());
        record[16..21].copy_from_slice(b"a.txt");
        record[16 + SubEntry::NAME_LEN + 4..16 + SubEntry::NAME_LEN + 8]
            .copy_from_slice(&564u32.to_le_bytes());
        data.extend_from_slice(&record);
        data.extend_from_slice(b"hello");

        let entries = parser(data)
            .read_directory(DirectoryKind::Nested)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name(), "a.txt");
        assert_eq!(entries[0].offset(), 564);
        assert_eq!(entries[0].size(), 5);
    }

    #[tokio::test]
    async fn resolves_exact_payload() {
        let data = root_archive(&[("A.BIN", 44, 4)], b"DATA");
        let payload = parser(data).resolve_payload(44, 4).await.unwrap();
        assert_eq!(payload.data, b"DATA");
        assert!(!payload.is_truncated());
        assert!(!payload.is_compressed());
    }

    #[tokio::test]
    async fn oversized_payload_is_truncated_not_fatal() {
        let data = root_archive(&[("A.BIN", 44, 100)], b"DATA");
        let payload = parser(data).resolve_payload(44, 100).await.unwrap();
        assert_eq!(payload.data, b"DATA");
        assert_eq!(payload.requested, 100);
        assert!(payload.is_truncated());
    }

    #[tokio::test]
    async fn zero_offset_or_size_is_invalid_entry() {
        let p = parser(root_archive(&[], b"DATA"));
        assert!(matches!(
            p.resolve_payload(0, 4).await.unwrap_err(),
            DfError::InvalidEntry { .. }
        ));
        assert!(matches!(
            p.resolve_payload(4, 0).await.unwrap_err(),
            DfError::InvalidEntry { .. }
        ));
    }

    #[tokio::test]
    async fn offset_at_or_past_end_is_empty_payload() {
        let p = parser(root_archive(&[], b"DATA"));
        assert!(matches!(
            p.resolve_payload(8, 4).await.unwrap_err(),
            DfError::EmptyPayload { offset: 8 }
        ));
        assert!(matches!(
            p.resolve_payload(0x1000, 1).await.unwrap_err(),
            DfError::EmptyPayload { offset: 0x1000 }
        ));
    }

    struct FailingReader;

    #[async_trait::async_trait]
    impl ReadAt for FailingReader {
        async fn read_at(&self, _offset: u64, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("device gone"))
        }

        fn size(&self) -> u64 {
            64
        }
    }

    #[tokio::test]
    async fn read_error_is_seek_failure() {
        let p = DfParser::new(Arc::new(FailingReader));
        assert!(matches!(
            p.resolve_payload(8, 4).await.unwrap_err(),
            DfError::SeekFailed {
                offset: 8,
                stream_size: 64
            }
        ));
    }

    #[tokio::test]
    async fn compressed_marker_detected() {
        let p = parser(vec![0, 0, 0, 0, COMPRESSED_MARKER, 1, 2]);
        assert!(p.resolve_payload(4, 3).await.unwrap().is_compressed());
    }
}
