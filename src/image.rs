//! Decoded image containers.

use crate::color::ColorType;
use crate::error::{Error, Result};

/// Geometry and pixel layout reported by a probe or a decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Layout of the decoded pixels.
    pub color_type: ColorType,
}

impl ImageInfo {
    /// Bytes per row of decoded pixels.
    pub fn row_bytes(&self) -> Result<usize> {
        (self.width as usize)
            .checked_mul(self.color_type.bytes_per_pixel())
            .ok_or(Error::ImageTooLarge {
                width: self.width,
                height: self.height,
                max: u32::MAX,
            })
    }

    /// Size of the buffer [`decode_into`](crate::format::ImageFormat::decode_into)
    /// expects: `width * height * bytes_per_pixel`.
    pub fn buffer_len(&self) -> Result<usize> {
        self.row_bytes()?
            .checked_mul(self.height as usize)
            .ok_or(Error::ImageTooLarge {
                width: self.width,
                height: self.height,
                max: u32::MAX,
            })
    }
}

/// An owned, fully decoded image with tightly packed rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Layout of `pixels`.
    pub color_type: ColorType,
    /// Row-major pixel data, top row first.
    pub pixels: Vec<u8>,
}

impl Image {
    /// Geometry of this image.
    pub fn info(&self) -> ImageInfo {
        ImageInfo {
            width: self.width,
            height: self.height,
            color_type: self.color_type,
        }
    }
}

/// Check that `data` holds exactly `width * height` pixels of `color_type`.
pub(crate) fn check_pixel_buffer(
    data_len: usize,
    width: u32,
    height: u32,
    color_type: ColorType,
) -> Result<()> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(color_type.bytes_per_pixel()))
        .ok_or(Error::InvalidDataLength {
            expected: usize::MAX,
            actual: data_len,
        })?;
    if data_len != expected {
        return Err(Error::InvalidDataLength {
            expected,
            actual: data_len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_len() {
        let info = ImageInfo {
            width: 3,
            height: 2,
            color_type: ColorType::Rgba,
        };
        assert_eq!(info.row_bytes().unwrap(), 12);
        assert_eq!(info.buffer_len().unwrap(), 24);
    }

    #[test]
    fn test_check_pixel_buffer() {
        assert!(check_pixel_buffer(6, 2, 1, ColorType::Rgb).is_ok());
        assert!(matches!(
            check_pixel_buffer(5, 2, 1, ColorType::Rgb),
            Err(Error::InvalidDataLength {
                expected: 6,
                actual: 5
            })
        ));
    }
}
