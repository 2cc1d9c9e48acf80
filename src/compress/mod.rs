//! DEFLATE (RFC 1951) and zlib (RFC 1950) compression.
//!
//! Both directions are exposed two ways:
//!
//! - one-shot helpers ([`deflate_zlib`], [`inflate_zlib`], ...) for whole
//!   buffers already in memory;
//! - resumable contexts ([`Deflater`], [`Inflater`]) that consume input and
//!   produce output in caller-sized pieces. Each call reports how much it
//!   consumed and produced in a [`StreamResult`]; all state needed to resume
//!   lives in the context.
//!
//! ```rust
//! use imgcodec::compress::{Deflater, Flush, Format, Inflater, Status, Strategy};
//!
//! # fn main() -> imgcodec::Result<()> {
//! let data = b"so much depends upon a red wheel barrow".repeat(20);
//!
//! let mut deflater = Deflater::new(6, Strategy::Default, Format::Zlib)?;
//! let mut compressed = vec![0u8; 1024];
//! let res = deflater.deflate(&data, &mut compressed, Flush::Finish)?;
//! assert_eq!(res.status, Status::StreamEnd);
//! compressed.truncate(res.bytes_written);
//!
//! let mut inflater = Inflater::new(Format::Zlib);
//! let mut out = vec![0u8; data.len()];
//! let res = inflater.inflate(&compressed, &mut out)?;
//! assert_eq!(res.status, Status::StreamEnd);
//! assert_eq!(out, data);
//! # Ok(())
//! # }
//! ```

pub mod adler32;
pub mod crc32;
pub mod deflate;
pub mod huffman;
pub mod inflate;
pub mod lz77;

pub use adler32::{adler32, Adler32};
pub use crc32::{crc32, Crc32};
pub use deflate::{deflate, deflate_zlib, Deflater};
pub use inflate::{inflate, inflate_zlib, Inflater};

/// Default compression level.
pub const DEFAULT_LEVEL: u8 = 6;

/// Flush behavior for [`Deflater::deflate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Flush {
    /// Buffer freely; emit blocks only when they fill.
    #[default]
    None,
    /// Emit everything so far, then an empty stored block, byte-aligning the output.
    Sync,
    /// Like `Sync`, and forget match history so decoding can restart here.
    Full,
    /// Emit the final block and the zlib trailer.
    Finish,
}

/// Match-finding strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    /// Lazy or greedy LZ77 depending on level.
    #[default]
    Default,
    /// Discard short matches (length 5 or less); suits filtered image rows.
    ///
    /// Only the lazy parser (levels 4-9) applies this. Greedy levels 1-3
    /// parse exactly as with `Default`, matching zlib.
    Filtered,
    /// Literals only.
    HuffmanOnly,
    /// Matches at distance 1 only.
    Rle,
    /// Never emit dynamic Huffman blocks.
    Fixed,
}

/// Stream envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// RFC 1950: 2-byte header, optional dictionary id, Adler-32 trailer.
    #[default]
    Zlib,
    /// Bare RFC 1951 blocks.
    Raw,
}

/// Non-fatal outcome of a streaming call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Progress was made; call again with more input or output space.
    Ok,
    /// The stream is complete and all output has been delivered.
    StreamEnd,
    /// The zlib header requests a preset dictionary; supply it with
    /// [`Inflater::set_dictionary`] and call again.
    NeedDict,
    /// No input consumed and no output produced. Not an error: supply more
    /// input or output space and retry.
    BufError,
}

/// Result of one streaming call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamResult {
    /// Bytes consumed from the input slice.
    pub bytes_consumed: usize,
    /// Bytes written to the output slice.
    pub bytes_written: usize,
    /// Stream status after the call.
    pub status: Status,
}

/// Length code base values (symbols 257-285).
pub(crate) const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];

/// Extra bits for length codes.
pub(crate) const LENGTH_EXTRA: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

/// Distance code base values (codes 0-29).
pub(crate) const DIST_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];

/// Extra bits for distance codes.
pub(crate) const DIST_EXTRA: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// Order in which code length code lengths are transmitted.
pub(crate) const CODE_LENGTH_ORDER: [usize; 19] =
    [16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15];
