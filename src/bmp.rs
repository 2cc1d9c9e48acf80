//! Windows BMP reader and writer.
//!
//! Reads uncompressed 24-bit and 32-bit images (`BI_RGB`, and `BI_BITFIELDS`
//! for 32-bit) with BITMAPINFOHEADER, V4 and V5 headers or the OS/2 2.x
//! variants, in either row order. Writes 24-bit files for Gray and Rgb input
//! and 32-bit V4 files with an alpha mask for GrayAlpha and Rgba.

use std::io::{self, Read, Seek, SeekFrom};

use crate::color::ColorType;
use crate::error::{alloc_zeroed, Error, Result};
use crate::image::{check_pixel_buffer, Image, ImageInfo};

const MAGIC: [u8; 2] = *b"BM";
const FILE_HEADER_LEN: u32 = 14;
const INFO_HEADER_LEN: u32 = 40;
const V4_HEADER_LEN: u32 = 108;

const BI_RGB: u32 = 0;
const BI_BITFIELDS: u32 = 3;

/// "sRGB" in the V4 colour space field.
const LCS_SRGB: u32 = 0x7352_4742;

/// One channel of a `BI_BITFIELDS` pixel.
#[derive(Debug, Clone, Copy)]
struct Mask {
    mask: u32,
    shift: u32,
    bits: u32,
}

impl Mask {
    fn new(mask: u32) -> Self {
        Self {
            mask,
            shift: if mask == 0 { 0 } else { mask.trailing_zeros() },
            bits: mask.count_ones(),
        }
    }

    /// Channel value scaled to 8 bits; `default` when the mask is empty.
    fn extract(&self, pixel: u32, default: u8) -> u8 {
        if self.bits == 0 {
            return default;
        }
        let v = (pixel & self.mask) >> self.shift;
        match self.bits {
            8 => v as u8,
            b if b > 8 => (v >> (b - 8)) as u8,
            b => ((v * 255) / ((1 << b) - 1)) as u8,
        }
    }
}

#[derive(Debug)]
struct Header {
    width: u32,
    height: u32,
    bottom_up: bool,
    bit_count: u16,
    /// Red, green, blue, alpha.
    masks: [Mask; 4],
    /// Bytes between the end of the headers and the pixel array.
    gap: u64,
}

impl Header {
    fn info(&self) -> ImageInfo {
        ImageInfo {
            width: self.width,
            height: self.height,
            color_type: if self.bit_count == 24 {
                ColorType::Rgb
            } else {
                ColorType::Rgba
            },
        }
    }

    fn stride(&self) -> usize {
        (self.width as usize * (self.bit_count as usize / 8) + 3) & !3
    }
}

fn le_u16(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn le_u32(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

fn read_header<R: Read>(reader: &mut R) -> Result<Header> {
    let mut file_header = [0u8; FILE_HEADER_LEN as usize];
    reader.read_exact(&mut file_header)?;
    if file_header[..2] != MAGIC {
        return Err(Error::invalid("not a BMP file (bad signature)"));
    }
    let data_offset = le_u32(&file_header, 10);

    let mut size_bytes = [0u8; 4];
    reader.read_exact(&mut size_bytes)?;
    let info_len = u32::from_le_bytes(size_bytes);
    match info_len {
        40 | 108 | 124 | 16..=64 => {}
        12 => return Err(Error::unsupported("OS/2 1.x BMP header")),
        n => return Err(Error::invalid(format!("unknown BMP info header size {n}"))),
    }
    // Fields past the declared size read as zero.
    let mut info = [0u8; 124];
    info[..4].copy_from_slice(&size_bytes);
    reader.read_exact(&mut info[4..info_len as usize])?;

    let width = le_u32(&info, 4) as i32;
    let height = le_u32(&info, 8) as i32;
    let bit_count = le_u16(&info, 14);
    let compression = le_u32(&info, 16);
    if width <= 0 || height == 0 {
        return Err(Error::invalid(format!("invalid BMP dimensions {width}x{height}")));
    }

    let mut consumed = FILE_HEADER_LEN + info_len;
    let masks = match (compression, bit_count) {
        (BI_RGB, 24) | (BI_RGB, 32) => [0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0].map(Mask::new),
        (BI_BITFIELDS, 32) => {
            let (r, g, b, a) = if info_len >= 52 {
                let a = if info_len >= 56 { le_u32(&info, 52) } else { 0 };
                (le_u32(&info, 40), le_u32(&info, 44), le_u32(&info, 48), a)
            } else {
                let mut extra = [0u8; 12];
                reader.read_exact(&mut extra)?;
                consumed += 12;
                (le_u32(&extra, 0), le_u32(&extra, 4), le_u32(&extra, 8), 0)
            };
            [r, g, b, a].map(Mask::new)
        }
        (BI_RGB | BI_BITFIELDS, n) => {
            return Err(Error::unsupported(format!("{n}-bit BMP")));
        }
        (c, _) => return Err(Error::unsupported(format!("BMP compression {c}"))),
    };
    if data_offset < consumed {
        return Err(Error::invalid(format!(
            "BMP pixel data offset {data_offset} overlaps the headers"
        )));
    }

    let header = Header {
        width: width as u32,
        height: height.unsigned_abs(),
        bottom_up: height > 0,
        bit_count,
        masks,
        gap: u64::from(data_offset - consumed),
    };
    log::debug!(
        "bmp: {}x{} {}-bit, info header {} bytes, compression {}, {}",
        header.width,
        header.height,
        bit_count,
        info_len,
        compression,
        if header.bottom_up { "bottom-up" } else { "top-down" }
    );
    Ok(header)
}

fn read_pixels<R: Read>(mut reader: R, header: &Header, pixels: &mut [u8]) -> Result<()> {
    io::copy(&mut (&mut reader).take(header.gap), &mut io::sink())?;

    let info = header.info();
    let row_bytes = info.row_bytes()?;
    let mut row = alloc_zeroed(header.stride())?;
    for i in 0..header.height as usize {
        reader.read_exact(&mut row)?;
        let y = if header.bottom_up {
            header.height as usize - 1 - i
        } else {
            i
        };
        let dst = &mut pixels[y * row_bytes..(y + 1) * row_bytes];
        if header.bit_count == 24 {
            for (d, s) in dst.chunks_exact_mut(3).zip(row.chunks_exact(3)) {
                d.copy_from_slice(&[s[2], s[1], s[0]]);
            }
        } else {
            let [r, g, b, a] = header.masks;
            for (d, s) in dst.chunks_exact_mut(4).zip(row.chunks_exact(4)) {
                let px = u32::from_le_bytes([s[0], s[1], s[2], s[3]]);
                d.copy_from_slice(&[
                    r.extract(px, 0),
                    g.extract(px, 0),
                    b.extract(px, 0),
                    a.extract(px, 255),
                ]);
            }
        }
    }
    Ok(())
}

/// Read the BMP headers and report the decoded geometry, leaving the stream
/// where it was.
pub fn probe<R: Read + Seek>(reader: &mut R) -> Result<ImageInfo> {
    let start = reader.stream_position()?;
    let result = read_header(reader).map(|h| h.info());
    reader.seek(SeekFrom::Start(start))?;
    result
}

/// Decode into a buffer of exactly `width * height * bytes_per_pixel` bytes.
pub fn decode_into<R: Read>(mut reader: R, pixels: &mut [u8]) -> Result<ImageInfo> {
    let header = read_header(&mut reader)?;
    let info = header.info();
    let expected = info.buffer_len()?;
    if pixels.len() != expected {
        return Err(Error::InvalidDataLength {
            expected,
            actual: pixels.len(),
        });
    }
    read_pixels(reader, &header, pixels)?;
    Ok(info)
}

/// Decode a BMP into a newly allocated [`Image`].
pub fn decode<R: Read>(mut reader: R) -> Result<Image> {
    let header = read_header(&mut reader)?;
    let info = header.info();
    let mut pixels = alloc_zeroed(info.buffer_len()?)?;
    read_pixels(reader, &header, &mut pixels)?;
    Ok(Image {
        width: info.width,
        height: info.height,
        color_type: info.color_type,
        pixels,
    })
}

/// Encode pixels as a bottom-up BMP.
pub fn encode(data: &[u8], width: u32, height: u32, color_type: ColorType) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    encode_into(&mut output, data, width, height, color_type)?;
    Ok(output)
}

/// Encode into a caller-provided buffer, which is cleared first.
pub fn encode_into(
    output: &mut Vec<u8>,
    data: &[u8],
    width: u32,
    height: u32,
    color_type: ColorType,
) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions { width, height });
    }
    let max = i32::MAX as u32;
    if width > max || height > max {
        return Err(Error::ImageTooLarge { width, height, max });
    }
    check_pixel_buffer(data.len(), width, height, color_type)?;

    let alpha = color_type.has_alpha();
    let (bytes_pp, header_len) = if alpha { (4, V4_HEADER_LEN) } else { (3, INFO_HEADER_LEN) };
    let stride = (width as usize * bytes_pp + 3) & !3;
    let too_large = || Error::ImageTooLarge {
        width,
        height,
        max: u32::MAX,
    };
    let image_size = stride
        .checked_mul(height as usize)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(too_large)?;
    let offset = FILE_HEADER_LEN + header_len;
    let file_size = offset.checked_add(image_size).ok_or_else(too_large)?;

    output.clear();
    output.reserve(file_size as usize);
    output.extend_from_slice(&MAGIC);
    output.extend_from_slice(&file_size.to_le_bytes());
    output.extend_from_slice(&[0; 4]);
    output.extend_from_slice(&offset.to_le_bytes());

    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&(width as i32).to_le_bytes());
    output.extend_from_slice(&(height as i32).to_le_bytes());
    output.extend_from_slice(&1u16.to_le_bytes());
    output.extend_from_slice(&(bytes_pp as u16 * 8).to_le_bytes());
    let compression = if alpha { BI_BITFIELDS } else { BI_RGB };
    output.extend_from_slice(&compression.to_le_bytes());
    output.extend_from_slice(&image_size.to_le_bytes());
    // Resolution and palette counts.
    output.extend_from_slice(&[0; 16]);
    if alpha {
        for mask in [0x00FF_0000u32, 0x0000_FF00, 0x0000_00FF, 0xFF00_0000] {
            output.extend_from_slice(&mask.to_le_bytes());
        }
        output.extend_from_slice(&LCS_SRGB.to_le_bytes());
        // Endpoints and gamma, unused with sRGB.
        output.extend_from_slice(&[0; 48]);
    }

    let channels = color_type.bytes_per_pixel();
    let row_bytes = width as usize * channels;
    let padding = stride - width as usize * bytes_pp;
    for row in data.chunks_exact(row_bytes).rev() {
        for px in row.chunks_exact(channels) {
            match color_type {
                ColorType::Gray => output.extend_from_slice(&[px[0]; 3]),
                ColorType::GrayAlpha => output.extend_from_slice(&[px[0], px[0], px[0], px[1]]),
                ColorType::Rgb => output.extend_from_slice(&[px[2], px[1], px[0]]),
                ColorType::Rgba => output.extend_from_slice(&[px[2], px[1], px[0], px[3]]),
            }
        }
        output.extend(std::iter::repeat(0).take(padding));
    }

    log::debug!(
        "bmp encode: {}x{} {:?} as {}-bit, {} bytes",
        width,
        height,
        color_type,
        bytes_pp * 8,
        output.len()
    );
    Ok(())
}
