//! Format selection and dispatch.
//!
//! [`ImageFormat`] names each supported container and routes probe, decode
//! and encode calls to the matching codec module. Formats are recognized by
//! signature where they have one; TGA has none and is only chosen by
//! extension or explicitly.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Error, Result};
use crate::image::{Image, ImageInfo};
use crate::{bmp, jpeg, png, ppm, tga};

/// A supported image container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Bmp,
    Tga,
    /// Netpbm PGM and PPM.
    Ppm,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 5] = [
        ImageFormat::Png,
        ImageFormat::Jpeg,
        ImageFormat::Bmp,
        ImageFormat::Tga,
        ImageFormat::Ppm,
    ];

    /// Identify a format from the first bytes of a file.
    pub fn from_signature(header: &[u8]) -> Option<Self> {
        if header.starts_with(&png::chunk::SIGNATURE) {
            return Some(ImageFormat::Png);
        }
        if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageFormat::Jpeg);
        }
        if header.starts_with(b"BM") {
            return Some(ImageFormat::Bmp);
        }
        match header {
            [b'P', b'2' | b'3' | b'5' | b'6', ..] => Some(ImageFormat::Ppm),
            _ => None,
        }
    }

    /// Identify a format from a file extension, ignoring case.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.extensions().contains(&ext.as_str()))
    }

    /// Identify a format from a path's extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Sniff the signature at the current position, leaving the stream where
    /// it was.
    pub fn detect<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let start = reader.stream_position()?;
        let mut header = [0u8; 8];
        let mut filled = 0;
        while filled < header.len() {
            match reader.read(&mut header[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        reader.seek(SeekFrom::Start(start))?;
        Self::from_signature(&header[..filled])
            .ok_or_else(|| Error::unsupported("unrecognized image signature"))
    }

    /// File extensions, preferred one first.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            ImageFormat::Png => &["png"],
            ImageFormat::Jpeg => &["jpg", "jpeg", "jpe", "jfif"],
            ImageFormat::Bmp => &["bmp", "dib"],
            ImageFormat::Tga => &["tga", "icb", "vda", "vst"],
            ImageFormat::Ppm => &["ppm", "pgm", "pnm"],
        }
    }

    /// Read only the header and report the decoded geometry. The stream
    /// position is restored.
    pub fn probe<R: Read + Seek>(self, reader: &mut R) -> Result<ImageInfo> {
        match self {
            ImageFormat::Png => png::probe(reader),
            ImageFormat::Jpeg => jpeg::probe(reader),
            ImageFormat::Bmp => bmp::probe(reader),
            ImageFormat::Tga => tga::probe(reader),
            ImageFormat::Ppm => ppm::probe(reader),
        }
    }

    /// Decode into a caller-owned buffer sized with [`ImageInfo::buffer_len`].
    pub fn decode_into<R: Read>(self, reader: R, pixels: &mut [u8]) -> Result<ImageInfo> {
        match self {
            ImageFormat::Png => png::decode_into(reader, pixels),
            ImageFormat::Jpeg => jpeg::decode_into(reader, pixels),
            ImageFormat::Bmp => bmp::decode_into(reader, pixels),
            ImageFormat::Tga => tga::decode_into(reader, pixels),
            ImageFormat::Ppm => ppm::decode_into(reader, pixels),
        }
    }

    pub fn decode<R: Read>(self, reader: R) -> Result<Image> {
        match self {
            ImageFormat::Png => png::decode(reader),
            ImageFormat::Jpeg => jpeg::decode(reader),
            ImageFormat::Bmp => bmp::decode(reader),
            ImageFormat::Tga => tga::decode(reader),
            ImageFormat::Ppm => ppm::decode(reader),
        }
    }

    /// Encode with each codec's default options.
    ///
    /// JPEG accepts only Gray and Rgb; every other format takes all four
    /// color types.
    pub fn encode(self, image: &Image) -> Result<Vec<u8>> {
        let Image {
            width,
            height,
            color_type,
            ref pixels,
        } = *image;
        match self {
            ImageFormat::Png => {
                let options = png::PngOptions::builder(width, height)
                    .color_type(color_type)
                    .build();
                png::encode(pixels, &options)
            }
            ImageFormat::Jpeg => {
                let options = jpeg::JpegOptions::builder(width, height)
                    .color_type(color_type)
                    .build();
                jpeg::encode(pixels, &options)
            }
            ImageFormat::Bmp => bmp::encode(pixels, width, height, color_type),
            ImageFormat::Tga => tga::encode(pixels, width, height, color_type),
            ImageFormat::Ppm => ppm::encode(pixels, width, height, color_type),
        }
    }
}

/// Detect the format by signature and decode the whole image.
pub fn decode<R: Read + Seek>(mut reader: R) -> Result<(ImageFormat, Image)> {
    let format = ImageFormat::detect(&mut reader)?;
    let image = format.decode(reader)?;
    Ok((format, image))
}
