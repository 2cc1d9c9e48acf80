//! PNG encoder and decoder.
//!
//! 8-bit, non-interlaced images in every PNG color type. Decoding yields
//! Gray, GrayAlpha, Rgb or Rgba pixels; indexed images are expanded through
//! their palette to Rgb.
//!
//! ```rust
//! use imgcodec::png::{self, PngOptions};
//! use imgcodec::ColorType;
//!
//! # fn main() -> imgcodec::Result<()> {
//! let pixels = vec![0, 64, 128, 255];
//! let options = PngOptions::builder(2, 2).color_type(ColorType::Gray).build();
//! let bytes = png::encode(&pixels, &options)?;
//!
//! let image = png::decode(&bytes[..])?;
//! assert_eq!((image.width, image.height), (2, 2));
//! assert_eq!(image.pixels, pixels);
//! # Ok(())
//! # }
//! ```

pub mod chunk;
pub mod decode;
pub mod encode;
pub mod filter;

pub use decode::{decode, decode_into, probe};
pub use encode::{encode, encode_into, PngOptions, PngOptionsBuilder};
pub use filter::{FilterStrategy, FilterType};

/// Largest width or height the format allows (2^31 - 1).
pub const MAX_DIMENSION: u32 = 0x7FFF_FFFF;
