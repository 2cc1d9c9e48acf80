//! # imgcodec
//!
//! Image codecs written entirely in Rust on top of their own DEFLATE engine.
//!
//! - **DEFLATE**: resumable [`compress::Deflater`] and [`compress::Inflater`]
//!   contexts with flush modes, zlib envelopes and preset dictionaries, plus
//!   one-shot helpers.
//! - **PNG**: streaming decoder for every 8-bit color type (palette expanded
//!   to RGB) and an encoder with all five scanline filters.
//! - **JPEG**: baseline decoder with any 1-4 sampling factors and restart
//!   markers, baseline encoder with 4:4:4 / 4:2:0 subsampling.
//! - **BMP, TGA, PGM/PPM**: readers and writers for the common layouts.
//!
//! ## Quickstart
//!
//! ```rust
//! use imgcodec::{jpeg, png, ColorType, ImageFormat};
//! use imgcodec::jpeg::JpegOptions;
//! use imgcodec::png::PngOptions;
//!
//! # fn main() -> imgcodec::Result<()> {
//! // PNG: 3x1 RGB pixels (red, green, blue)
//! let pixels = vec![255, 0, 0, 0, 255, 0, 0, 0, 255];
//! let png_opts = PngOptions::builder(3, 1).color_type(ColorType::Rgb).build();
//! let png_bytes = png::encode(&pixels, &png_opts)?;
//! let image = png::decode(&png_bytes[..])?;
//! assert_eq!(image.pixels, pixels);
//!
//! // JPEG: lossy, so only the geometry survives exactly.
//! let jpg_opts = JpegOptions::builder(3, 1).quality(90).build();
//! let jpg_bytes = jpeg::encode(&pixels, &jpg_opts)?;
//! let info = ImageFormat::Jpeg.probe(&mut std::io::Cursor::new(&jpg_bytes))?;
//! assert_eq!((info.width, info.height), (3, 1));
//! # Ok(())
//! # }
//! ```
//!
//! ### Two-call decoding
//!
//! ```rust
//! use std::io::Cursor;
//! use imgcodec::{ColorType, Image, ImageFormat};
//!
//! # fn main() -> imgcodec::Result<()> {
//! let image = Image { width: 2, height: 1, color_type: ColorType::Gray, pixels: vec![1, 2] };
//! let bmp = ImageFormat::Bmp.encode(&image)?;
//!
//! let mut reader = Cursor::new(bmp);
//! let format = ImageFormat::detect(&mut reader)?;
//! let info = format.probe(&mut reader)?;
//! let mut pixels = vec![0u8; info.buffer_len()?];
//! format.decode_into(&mut reader, &mut pixels)?;
//! assert_eq!(pixels, vec![1, 1, 1, 2, 2, 2]); // BMP stores gray as RGB
//! # Ok(())
//! # }
//! ```
//!
//! ### DEFLATE
//!
//! ```rust
//! use imgcodec::compress;
//!
//! # fn main() -> imgcodec::Result<()> {
//! let data = b"hello hello hello hello".repeat(8);
//! let packed = compress::deflate_zlib(&data, 9)?;
//! assert!(packed.len() < data.len());
//! assert_eq!(compress::inflate_zlib(&packed, Some(data.len()))?, data);
//! # Ok(())
//! # }
//! ```
//!
//! See [`compress`] for the resumable streaming contexts.
//!
//! ## Feature flags
//! - `parallel`: filter PNG rows on the rayon thread pool.
//! - `cli`: the `imgcodec` command-line converter.
//!
//! ## Logging
//! Codecs report stream structure through the [`log`] facade at `debug` and
//! per-block detail at `trace`. Errors are only ever returned, never logged.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod bits;
pub mod bmp;
pub mod color;
pub mod compress;
pub mod error;
pub mod format;
pub mod image;
pub mod jpeg;
pub mod png;
pub mod ppm;
pub mod tga;

pub use crate::color::ColorType;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::format::ImageFormat;
pub use crate::image::{Image, ImageInfo};
