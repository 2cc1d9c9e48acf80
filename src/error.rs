//! Error types for imgcodec.

use thiserror::Error;

/// Result type alias for imgcodec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while encoding or decoding.
#[derive(Debug, Error)]
pub enum Error {
    /// Image dimensions are zero or otherwise unusable.
    #[error("invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Image is larger than the codec or the address space allows.
    #[error("image too large: {width}x{height} (maximum dimension {max})")]
    ImageTooLarge { width: u32, height: u32, max: u32 },

    /// Pixel buffer length does not match the image geometry.
    #[error("invalid data length: expected {expected} bytes, got {actual}")]
    InvalidDataLength { expected: usize, actual: usize },

    /// Color type is not supported by the target format.
    #[error("unsupported color type")]
    UnsupportedColorType,

    /// Compression level outside 0..=9.
    #[error("invalid compression level {0} (expected 0-9)")]
    InvalidCompressionLevel(u8),

    /// JPEG quality outside 1..=100.
    #[error("invalid JPEG quality {0} (expected 1-100)")]
    InvalidQuality(u8),

    /// JPEG restart interval of zero.
    #[error("invalid restart interval {0}")]
    InvalidRestartInterval(u16),

    /// Malformed or corrupt input (bad signature, CRC, Huffman code, ...).
    #[error("invalid data: {0}")]
    InvalidDecode(String),

    /// Well-formed input using a feature this crate does not implement.
    #[error("unsupported: {0}")]
    UnsupportedDecode(String),

    /// A streaming codec was driven in a way its state does not allow.
    #[error("stream misuse: {0}")]
    StreamState(&'static str),

    /// A working buffer could not be allocated.
    #[error("failed to allocate {0} bytes")]
    OutOfMemory(usize),

    /// Underlying reader or writer failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed, corrupt or unsupported input. Fatal to the current decode.
    Format,
    /// Allocation failure for working buffers.
    Resource,
    /// Programming-contract violation on a streaming codec.
    ProtocolState,
    /// Invalid arguments supplied by the caller.
    Usage,
    /// Failure of the underlying stream.
    Io,
}

impl Error {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidDecode(_) | Error::UnsupportedDecode(_) => ErrorKind::Format,
            Error::OutOfMemory(_) => ErrorKind::Resource,
            Error::StreamState(_) => ErrorKind::ProtocolState,
            Error::Io(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => ErrorKind::Format,
            Error::Io(_) => ErrorKind::Io,
            Error::InvalidDimensions { .. }
            | Error::ImageTooLarge { .. }
            | Error::InvalidDataLength { .. }
            | Error::UnsupportedColorType
            | Error::InvalidCompressionLevel(_)
            | Error::InvalidQuality(_)
            | Error::InvalidRestartInterval(_) => ErrorKind::Usage,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidDecode(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Error::UnsupportedDecode(msg.into())
    }
}

/// Allocate a zeroed byte buffer, reporting allocation failure instead of aborting.
pub(crate) fn alloc_zeroed(len: usize) -> Result<Vec<u8>> {
    alloc_filled(len, 0u8)
}

/// Allocate `len` copies of `value`, reporting allocation failure instead of aborting.
pub(crate) fn alloc_filled<T: Clone>(len: usize, value: T) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| Error::OutOfMemory(len.saturating_mul(std::mem::size_of::<T>())))?;
    buf.resize(len, value);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidDimensions {
            width: 0,
            height: 7,
        };
        assert_eq!(err.to_string(), "invalid image dimensions: 0x7");

        let err = Error::invalid("bad CRC in IHDR");
        assert_eq!(err.to_string(), "invalid data: bad CRC in IHDR");
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::invalid("x").kind(), ErrorKind::Format);
        assert_eq!(Error::unsupported("x").kind(), ErrorKind::Format);
        assert_eq!(Error::OutOfMemory(1).kind(), ErrorKind::Resource);
        assert_eq!(Error::StreamState("x").kind(), ErrorKind::ProtocolState);
        assert_eq!(Error::InvalidQuality(0).kind(), ErrorKind::Usage);

        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short");
        assert_eq!(Error::from(eof).kind(), ErrorKind::Format);
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(Error::from(denied).kind(), ErrorKind::Io);
    }

    #[test]
    fn test_alloc_zeroed() {
        let buf = alloc_zeroed(16).unwrap();
        assert_eq!(buf, vec![0u8; 16]);
        assert!(matches!(alloc_zeroed(usize::MAX), Err(Error::OutOfMemory(_))));
    }
}
