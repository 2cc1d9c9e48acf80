//! PNG chunk framing: length, type, payload, CRC-32 over type and payload.

use std::fmt;
use std::io::Read;

use crate::compress::crc32::{crc32, Crc32};
use crate::error::{Error, Result};

/// PNG file signature.
pub const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Largest chunk payload allowed by the format.
pub const MAX_CHUNK_LEN: u32 = 0x7FFF_FFFF;

/// Four-letter chunk type.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkType(pub [u8; 4]);

impl ChunkType {
    pub const IHDR: ChunkType = ChunkType(*b"IHDR");
    pub const PLTE: ChunkType = ChunkType(*b"PLTE");
    pub const IDAT: ChunkType = ChunkType(*b"IDAT");
    pub const IEND: ChunkType = ChunkType(*b"IEND");

    /// Critical chunks have an uppercase first letter; a decoder that does not
    /// understand one must give up.
    pub fn is_critical(self) -> bool {
        self.0[0] & 0x20 == 0
    }
}

impl fmt::Debug for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

/// Append one complete chunk to `out`.
pub fn write_chunk(out: &mut Vec<u8>, kind: ChunkType, data: &[u8]) {
    debug_assert!(data.len() <= MAX_CHUNK_LEN as usize);
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    let start = out.len();
    out.extend_from_slice(&kind.0);
    out.extend_from_slice(data);
    let crc = crc32(&out[start..]);
    out.extend_from_slice(&crc.to_be_bytes());
}

/// Sequential chunk reader that checks every CRC.
///
/// Payloads can be read in pieces with [`ChunkReader::read`], so a large
/// chunk never has to be buffered whole.
pub struct ChunkReader<R> {
    inner: R,
    kind: ChunkType,
    remaining: u32,
    crc: Crc32,
    open: bool,
}

impl<R: Read> ChunkReader<R> {
    /// Wrap `inner`, which must be positioned just after the signature.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            kind: ChunkType([0; 4]),
            remaining: 0,
            crc: Crc32::new(),
            open: false,
        }
    }

    /// Read the next chunk header. Any unread part of the current chunk is
    /// skipped and its CRC verified first.
    pub fn next_chunk(&mut self) -> Result<ChunkType> {
        if self.open {
            self.finish_chunk()?;
        }
        let mut header = [0u8; 8];
        self.inner.read_exact(&mut header)?;
        let length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        if length > MAX_CHUNK_LEN {
            return Err(Error::invalid(format!("chunk length {length} out of range")));
        }
        let kind = ChunkType([header[4], header[5], header[6], header[7]]);
        if !kind.0.iter().all(u8::is_ascii_alphabetic) {
            return Err(Error::invalid(format!("invalid chunk type {kind:?}")));
        }

        self.kind = kind;
        self.remaining = length;
        self.crc = Crc32::new();
        self.crc.update(&kind.0);
        self.open = true;
        log::trace!("png chunk {:?}, {} bytes", kind, length);
        Ok(kind)
    }

    /// Type of the current chunk.
    pub fn kind(&self) -> ChunkType {
        self.kind
    }

    /// Unread payload bytes of the current chunk.
    pub fn remaining(&self) -> usize {
        self.remaining as usize
    }

    /// Read up to `buf.len()` payload bytes, returning how many were read
    /// (zero at the end of the payload).
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len().min(self.remaining as usize);
        self.inner.read_exact(&mut buf[..n])?;
        self.crc.update(&buf[..n]);
        self.remaining -= n as u32;
        Ok(n)
    }

    /// Read the whole payload of a chunk no larger than `limit` bytes.
    pub fn read_payload(&mut self, limit: usize) -> Result<Vec<u8>> {
        if self.remaining() > limit {
            return Err(Error::invalid(format!(
                "{:?} chunk too long ({} bytes)",
                self.kind, self.remaining
            )));
        }
        let mut data = vec![0u8; self.remaining()];
        self.read(&mut data)?;
        Ok(data)
    }

    /// Skip whatever is left of the payload and verify the CRC.
    pub fn finish_chunk(&mut self) -> Result<()> {
        let mut scratch = [0u8; 4096];
        while self.remaining > 0 {
            self.read(&mut scratch)?;
        }
        let mut stored = [0u8; 4];
        self.inner.read_exact(&mut stored)?;
        self.open = false;
        let expected = u32::from_be_bytes(stored);
        let actual = self.crc.finalize();
        if expected != actual {
            return Err(Error::invalid(format!(
                "CRC mismatch in {:?} chunk: stored {expected:08x}, computed {actual:08x}",
                self.kind
            )));
        }
        Ok(())
    }
}
