//! Streaming decompression of `0xEC` payloads.
//!
//! Compressed entries are raw DEFLATE streams; the marker byte is the first
//! header byte of a non-final dynamic-Huffman block and is fed to the
//! decoder like any other byte.

use flate2::read::DeflateDecoder;
use std::io::{self, Read};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{DfError, Result};

/// Size of each decompressed chunk handed to the writer
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Pull source over an in-memory compressed buffer.
#[derive(Debug)]
pub struct PayloadSource {
    buf: Vec<u8>,
    used: usize,
}

impl PayloadSource {
    pub fn new(buf: Vec<u8>) -> Self {
        Self { buf, used: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.used
    }

    /// Copy up to `into.len()` bytes from the cursor, returning 0 once the
    /// buffer is exhausted.
    pub fn pull(&mut self, into: &mut [u8]) -> usize {
        let n = into.len().min(self.remaining());
        into[..n].copy_from_slice(&self.buf[self.used..self.used + n]);
        self.used += n;
        n
    }
}

impl Read for PayloadSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.pull(buf))
    }
}

/// Drives a DEFLATE decoder over a [`PayloadSource`] one chunk at a time.
pub struct Inflater {
    decoder: DeflateDecoder<PayloadSource>,
    chunk: Vec<u8>,
}

impl Inflater {
    pub fn new(compressed: Vec<u8>) -> Self {
        Self {
            decoder: DeflateDecoder::new(PayloadSource::new(compressed)),
            chunk: vec![0u8; CHUNK_SIZE],
        }
    }

    /// Next block of decompressed bytes; empty once the stream is finished.
    pub fn next_chunk(&mut self) -> Result<&[u8]> {
        let n = loop {
            match self.decoder.read(&mut self.chunk) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(DfError::DecompressionFailed(e)),
            }
        };
        Ok(&self.chunk[..n])
    }
}

/// Decompress `compressed` into `output`, writing each chunk as soon as it
/// is produced. Returns the number of decompressed bytes written.
pub async fn inflate_to<W>(compressed: Vec<u8>, output: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut inflater = Inflater::new(compressed);
    let mut written = 0u64;

    loop {
        let chunk = inflater.next_chunk()?;
        if chunk.is_empty() {
            break;
        }
        output.write_all(chunk).await?;
        written += chunk.len() as u64;
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::DeflateEncoder;
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn pull_returns_min_of_request_and_remaining() {
        let mut source = PayloadSource::new(b"abcdefg".to_vec());
        let mut buf = [0u8; 5];

        assert_eq!(source.pull(&mut buf), 5);
        assert_eq!(&buf, b"abcde");
        assert_eq!(source.remaining(), 2);

        assert_eq!(source.pull(&mut buf), 2);
        assert_eq!(&buf[..2], b"fg");

        assert_eq!(source.pull(&mut buf), 0);
        assert_eq!(source.pull(&mut buf), 0);
    }

    #[tokio::test]
    async fn inflates_multi_chunk_output() {
        let original: Vec<u8> = (0..CHUNK_SIZE * 3 + 123)
            .map(|i| (i % 251) as u8 ^ (i / 997) as u8)
            .collect();

        let mut output = Vec::new();
        let written = inflate_to(deflate(&original), &mut output).await.unwrap();

        assert_eq!(written, original.len() as u64);
        assert_eq!(output, original);
    }

    #[tokio::test]
    async fn corrupt_stream_is_decompression_failure() {
        // BTYPE 11 is reserved and always rejected
        let mut output = Vec::new();
        let err = inflate_to(vec![0xFF, 0xFF, 0xFF, 0xFF], &mut output)
            .await
            .unwrap_err();
        assert!(matches!(err, DfError::DecompressionFailed(_)));
    }
}
