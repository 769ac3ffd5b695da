//! Streaming chunked I/O over the metadata container
//!
//! [`ChunkWriter`] buffers up to `chunk_size` payload bytes, then compresses
//! and frames them. [`ChunkReader`] undoes this one chunk at a time. Both
//! track the running payload length and CRC32 so the trailer can be written
//! and checked without a second pass.

use super::compression::{compress_if_beneficial, decompress, CompressionConfig};
use super::header::{
    read_exact_or_corrupt, ChunkFrame, Trailer, FRAME_SIZE, MAX_CHUNK_SIZE, TRAILER_SIZE,
};
use crate::error::{FragmentError, Result};
use crc32fast::Hasher;
use std::io::{self, Read, Write};

/// What a finished [`ChunkWriter`] produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkStats {
    /// Uncompressed payload bytes
    pub payload_len: u64,
    /// Bytes written to the sink, frames and trailer included
    pub stored_len: u64,
    /// Data chunks, not counting the end frame
    pub chunks: u64,
}

/// Chunked, compressing writer
///
/// Nothing is final until [`ChunkWriter::finish`] writes the end frame and the
/// trailer; a writer dropped before that leaves a container that fails to load.
pub struct ChunkWriter<W: Write> {
    inner: W,
    buffer: Vec<u8>,
    chunk_size: usize,
    compression: CompressionConfig,
    hasher: Hasher,
    payload_len: u64,
    stored_len: u64,
    chunks: u64,
}

impl<W: Write> ChunkWriter<W> {
    pub fn new(inner: W, chunk_size: usize, compression: CompressionConfig) -> Self {
        let chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
        ChunkWriter {
            inner,
            buffer: Vec::with_capacity(chunk_size),
            chunk_size,
            compression,
            hasher: Hasher::new(),
            payload_len: 0,
            stored_len: 0,
            chunks: 0,
        }
    }

    fn emit_chunk(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let (stored, method) = compress_if_beneficial(&self.buffer, &self.compression)
            .map_err(into_io_error)?;

        let frame = ChunkFrame {
            method,
            raw_len: self.buffer.len() as u32,
            stored_len: stored.len() as u32,
        };
        self.inner.write_all(&frame.to_bytes())?;
        self.inner.write_all(&stored)?;

        self.hasher.update(&self.buffer);
        self.payload_len += self.buffer.len() as u64;
        self.stored_len += (FRAME_SIZE + stored.len()) as u64;
        self.chunks += 1;
        self.buffer.clear();
        Ok(())
    }

    /// Write the last chunk, the end frame and the trailer; returns the sink
    pub fn finish(self) -> Result<W> {
        self.finish_with_stats().map(|(inner, _)| inner)
    }

    /// Like [`ChunkWriter::finish`], also reporting what was written
    pub fn finish_with_stats(mut self) -> Result<(W, ChunkStats)> {
        self.emit_chunk().map_err(from_write_error)?;

        let trailer = Trailer {
            payload_len: self.payload_len,
            checksum: self.hasher.clone().finalize(),
        };
        self.inner.write_all(&ChunkFrame::end().to_bytes())?;
        self.inner.write_all(&trailer.to_bytes())?;
        self.inner.flush()?;

        let stats = ChunkStats {
            payload_len: self.payload_len,
            stored_len: self.stored_len + (FRAME_SIZE + TRAILER_SIZE) as u64,
            chunks: self.chunks,
        };
        Ok((self.inner, stats))
    }

    /// Uncompressed payload bytes accepted so far
    pub fn payload_len(&self) -> u64 {
        self.payload_len + self.buffer.len() as u64
    }

    /// Bytes written to the sink so far (frames included)
    pub fn stored_len(&self) -> u64 {
        self.stored_len
    }

    pub fn chunks(&self) -> u64 {
        self.chunks
    }
}

impl<W: Write> Write for ChunkWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let room = self.chunk_size - self.buffer.len();
        let n = room.min(buf.len());
        self.buffer.extend_from_slice(&buf[..n]);

        if self.buffer.len() == self.chunk_size {
            self.emit_chunk()?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.emit_chunk()?;
        self.inner.flush()
    }
}

/// Chunked, decompressing reader
pub struct ChunkReader<R: Read> {
    inner: R,
    chunk: Vec<u8>,
    pos: usize,
    hasher: Hasher,
    payload_len: u64,
    reached_end: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(inner: R) -> Self {
        ChunkReader {
            inner,
            chunk: Vec::new(),
            pos: 0,
            hasher: Hasher::new(),
            payload_len: 0,
            reached_end: false,
        }
    }

    /// Load the next chunk; returns false at the end frame
    fn next_chunk(&mut self) -> Result<bool> {
        let mut frame_bytes = [0u8; FRAME_SIZE];
        read_exact_or_corrupt(&mut self.inner, &mut frame_bytes, "chunk frame")?;
        let frame = ChunkFrame::from_bytes(&frame_bytes)?;

        if frame.is_end() {
            self.reached_end = true;
            self.chunk.clear();
            self.pos = 0;
            return Ok(false);
        }

        let mut stored = vec![0u8; frame.stored_len as usize];
        read_exact_or_corrupt(&mut self.inner, &mut stored, "chunk data")?;
        let chunk = decompress(&stored, frame.method, frame.raw_len as usize)?;

        self.hasher.update(&chunk);
        self.payload_len += chunk.len() as u64;
        self.chunk = chunk;
        self.pos = 0;
        Ok(true)
    }

    /// Check that the payload was consumed exactly, then verify the trailer
    ///
    /// Bytes left over in the payload, a length or checksum mismatch, or data
    /// after the trailer all count as corruption.
    pub fn finish(mut self) -> Result<R> {
        if self.pos < self.chunk.len() {
            return Err(FragmentError::CorruptData(
                "unexpected bytes after catalog payload".to_string(),
            ));
        }
        if !self.reached_end && self.next_chunk()? {
            return Err(FragmentError::CorruptData(
                "unexpected chunk after catalog payload".to_string(),
            ));
        }

        let mut trailer_bytes = [0u8; TRAILER_SIZE];
        read_exact_or_corrupt(&mut self.inner, &mut trailer_bytes, "trailer")?;
        let trailer = Trailer::from_bytes(&trailer_bytes)?;

        if trailer.payload_len != self.payload_len {
            return Err(FragmentError::CorruptData(format!(
                "trailer declares {} payload bytes, read {}",
                trailer.payload_len, self.payload_len
            )));
        }
        if trailer.checksum != self.hasher.clone().finalize() {
            return Err(FragmentError::ChecksumMismatch);
        }

        let mut probe = [0u8; 1];
        loop {
            match self.inner.read(&mut probe) {
                Ok(0) => break,
                Ok(_) => {
                    return Err(FragmentError::CorruptData(
                        "unexpected bytes after trailer".to_string(),
                    ))
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(FragmentError::Io(e)),
            }
        }

        Ok(self.inner)
    }

    /// Uncompressed payload bytes decoded so far
    pub fn payload_len(&self) -> u64 {
        self.payload_len
    }
}

impl<R: Read> Read for ChunkReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.pos == self.chunk.len() {
            if self.reached_end || !self.next_chunk().map_err(into_io_error)? {
                return Ok(0);
            }
        }

        let n = (self.chunk.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Carry a `FragmentError` through an `io::Error`
fn into_io_error(err: FragmentError) -> io::Error {
    match err {
        FragmentError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

/// Recover the `FragmentError` carried by [`into_io_error`]
///
/// A short read of the payload means the container was cut off.
pub(crate) fn from_io_error(err: io::Error) -> FragmentError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => {
            FragmentError::CorruptData("catalog payload truncated".to_string())
        }
        io::ErrorKind::InvalidData => match err.into_inner() {
            Some(inner) => match inner.downcast::<FragmentError>() {
                Ok(fragment_err) => *fragment_err,
                Err(other) => FragmentError::CorruptData(other.to_string()),
            },
            None => FragmentError::CorruptData("invalid catalog data".to_string()),
        },
        _ => FragmentError::Io(err),
    }
}

/// Write-side counterpart of [`from_io_error`]
///
/// Only a carried `FragmentError` is unwrapped; every sink failure stays `Io`.
pub(crate) fn from_write_error(err: io::Error) -> FragmentError {
    let carries_fragment_error = err
        .get_ref()
        .is_some_and(|inner| inner.is::<FragmentError>());
    if !carries_fragment_error {
        return FragmentError::Io(err);
    }

    match err.into_inner().map(|inner| inner.downcast::<FragmentError>()) {
        Some(Ok(fragment_err)) => *fragment_err,
        Some(Err(other)) => FragmentError::Io(io::Error::new(io::ErrorKind::InvalidData, other)),
        None => FragmentError::Io(io::ErrorKind::InvalidData.into()),
    }
}
