//! Truevision TGA reader and writer.
//!
//! Reads 24-bit and 32-bit true-color images, raw (type 2) or run-length
//! encoded (type 10). Writes run-length encoded files with a bottom-left
//! origin, one packet sequence per row.

use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};

use crate::color::ColorType;
use crate::error::{alloc_zeroed, Error, Result};
use crate::image::{check_pixel_buffer, Image, ImageInfo};

const HEADER_LEN: usize = 18;
const TYPE_TRUE_COLOR: u8 = 2;
const TYPE_TRUE_COLOR_RLE: u8 = 10;
/// Descriptor bit set when rows are stored top to bottom.
const ORIGIN_TOP: u8 = 0x20;
const MAX_PACKET: usize = 128;

#[derive(Debug)]
struct Header {
    width: u32,
    height: u32,
    rle: bool,
    bytes_pp: usize,
    top_down: bool,
    /// Image ID plus color map bytes to skip before the pixels.
    skip: u64,
}

impl Header {
    fn parse(h: &[u8; HEADER_LEN]) -> Result<Self> {
        let id_len = h[0];
        let map_type = h[1];
        let image_type = h[2];
        let map_len = u16::from_le_bytes([h[5], h[6]]);
        let map_entry_bits = h[7];
        let width = u16::from_le_bytes([h[12], h[13]]);
        let height = u16::from_le_bytes([h[14], h[15]]);
        let bpp = h[16];
        let descriptor = h[17];

        let rle = match image_type {
            TYPE_TRUE_COLOR => false,
            TYPE_TRUE_COLOR_RLE => true,
            1 | 3 | 9 | 11 => {
                return Err(Error::unsupported(format!("TGA image type {image_type}")))
            }
            t => return Err(Error::invalid(format!("unknown TGA image type {t}"))),
        };
        if map_type > 1 {
            return Err(Error::invalid(format!("invalid TGA color map type {map_type}")));
        }
        if bpp != 24 && bpp != 32 {
            return Err(Error::unsupported(format!("{bpp}-bit TGA")));
        }
        if width == 0 || height == 0 {
            return Err(Error::invalid(format!("invalid TGA dimensions {width}x{height}")));
        }

        let map_bytes = if map_type == 1 {
            u64::from(map_len) * u64::from(map_entry_bits).div_ceil(8)
        } else {
            0
        };
        Ok(Self {
            width: width.into(),
            height: height.into(),
            rle,
            bytes_pp: bpp as usize / 8,
            top_down: descriptor & ORIGIN_TOP != 0,
            skip: u64::from(id_len) + map_bytes,
        })
    }

    fn info(&self) -> ImageInfo {
        ImageInfo {
            width: self.width,
            height: self.height,
            color_type: if self.bytes_pp == 3 {
                ColorType::Rgb
            } else {
                ColorType::Rgba
            },
        }
    }
}

fn read_header<R: Read>(reader: &mut R) -> Result<Header> {
    let mut raw = [0u8; HEADER_LEN];
    reader.read_exact(&mut raw)?;
    let header = Header::parse(&raw)?;
    log::debug!(
        "tga: {}x{} {}-bit {}, {} origin",
        header.width,
        header.height,
        header.bytes_pp * 8,
        if header.rle { "rle" } else { "raw" },
        if header.top_down { "top-left" } else { "bottom-left" }
    );
    Ok(header)
}

/// Copy one stored BGR(A) pixel to RGB(A).
fn put_pixel(dst: &mut [u8], src: &[u8]) {
    dst[0] = src[2];
    dst[1] = src[1];
    dst[2] = src[0];
    if src.len() == 4 {
        dst[3] = src[3];
    }
}

fn read_pixels<R: BufRead>(reader: &mut R, header: &Header, pixels: &mut [u8]) -> Result<()> {
    io::copy(&mut reader.by_ref().take(header.skip), &mut io::sink())?;

    let bpp = header.bytes_pp;
    let width = header.width as usize;
    let height = header.height as usize;
    let total = width * height;
    // Stored pixel n lands on this output pixel.
    let target = |n: usize| {
        let (row, x) = (n / width, n % width);
        let y = if header.top_down { row } else { height - 1 - row };
        (y * width + x) * bpp
    };

    let mut px = [0u8; 4];
    let px = &mut px[..bpp];
    if !header.rle {
        for n in 0..total {
            reader.read_exact(px)?;
            let at = target(n);
            put_pixel(&mut pixels[at..at + bpp], px);
        }
        return Ok(());
    }

    let mut n = 0;
    while n < total {
        let mut packet = [0u8; 1];
        reader.read_exact(&mut packet)?;
        let count = (packet[0] & 0x7F) as usize + 1;
        if n + count > total {
            return Err(Error::invalid("TGA run-length packet runs past the image"));
        }
        if packet[0] & 0x80 != 0 {
            reader.read_exact(px)?;
            for i in n..n + count {
                let at = target(i);
                put_pixel(&mut pixels[at..at + bpp], px);
            }
        } else {
            for i in n..n + count {
                reader.read_exact(px)?;
                let at = target(i);
                put_pixel(&mut pixels[at..at + bpp], px);
            }
        }
        n += count;
    }
    log::trace!("tga: decoded {} run-length pixels", total);
    Ok(())
}

/// Read the TGA header and report the decoded geometry, leaving the stream
/// where it was.
pub fn probe<R: Read + Seek>(reader: &mut R) -> Result<ImageInfo> {
    let start = reader.stream_position()?;
    let result = read_header(reader).map(|h| h.info());
    reader.seek(SeekFrom::Start(start))?;
    result
}

/// Decode into a buffer of exactly `width * height * bytes_per_pixel` bytes.
pub fn decode_into<R: Read>(reader: R, pixels: &mut [u8]) -> Result<ImageInfo> {
    let mut reader = BufReader::new(reader);
    let header = read_header(&mut reader)?;
    let info = header.info();
    let expected = info.buffer_len()?;
    if pixels.len() != expected {
        return Err(Error::InvalidDataLength {
            expected,
            actual: pixels.len(),
        });
    }
    read_pixels(&mut reader, &header, pixels)?;
    Ok(info)
}

/// Decode a TGA into a newly allocated [`Image`].
pub fn decode<R: Read>(reader: R) -> Result<Image> {
    let mut reader = BufReader::new(reader);
    let header = read_header(&mut reader)?;
    let info = header.info();
    let mut pixels = alloc_zeroed(info.buffer_len()?)?;
    read_pixels(&mut reader, &header, &mut pixels)?;
    Ok(Image {
        width: info.width,
        height: info.height,
        color_type: info.color_type,
        pixels,
    })
}

/// Encode pixels as a run-length encoded TGA. Gray input is written as
/// 24-bit, GrayAlpha and Rgba as 32-bit with 8 alpha bits.
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
    let max = u32::from(u16::MAX);
    if width > max || height > max {
        return Err(Error::ImageTooLarge { width, height, max });
    }
    check_pixel_buffer(data.len(), width, height, color_type)?;

    let alpha = color_type.has_alpha();
    let bpp = if alpha { 4 } else { 3 };
    let mut header = [0u8; HEADER_LEN];
    header[2] = TYPE_TRUE_COLOR_RLE;
    header[12..14].copy_from_slice(&(width as u16).to_le_bytes());
    header[14..16].copy_from_slice(&(height as u16).to_le_bytes());
    header[16] = bpp as u8 * 8;
    header[17] = if alpha { 8 } else { 0 };

    output.clear();
    output.extend_from_slice(&header);

    let channels = color_type.bytes_per_pixel();
    let row_bytes = width as usize * channels;
    let mut stored = Vec::with_capacity(width as usize * bpp);
    for row in data.chunks_exact(row_bytes).rev() {
        stored.clear();
        for px in row.chunks_exact(channels) {
            match color_type {
                ColorType::Gray => stored.extend_from_slice(&[px[0]; 3]),
                ColorType::GrayAlpha => stored.extend_from_slice(&[px[0], px[0], px[0], px[1]]),
                ColorType::Rgb => stored.extend_from_slice(&[px[2], px[1], px[0]]),
                ColorType::Rgba => stored.extend_from_slice(&[px[2], px[1], px[0], px[3]]),
            }
        }
        write_rle_row(output, &stored, bpp);
    }

    log::debug!(
        "tga encode: {}x{} {:?} as {}-bit rle, {} bytes",
        width,
        height,
        color_type,
        bpp * 8,
        output.len()
    );
    Ok(())
}

/// Packetize one row: repeats of two or more pixels become run packets,
/// everything else goes into raw packets.
fn write_rle_row(output: &mut Vec<u8>, row: &[u8], bpp: usize) {
    let pixels: Vec<&[u8]> = row.chunks_exact(bpp).collect();
    let n = pixels.len();
    let run_at = |x: usize| {
        pixels[x..]
            .iter()
            .take(MAX_PACKET)
            .take_while(|p| **p == pixels[x])
            .count()
    };

    let mut x = 0;
    while x < n {
        let run = run_at(x);
        if run >= 2 {
            output.push(0x80 | (run - 1) as u8);
            output.extend_from_slice(pixels[x]);
            x += run;
            continue;
        }
        let start = x;
        x += 1;
        while x < n && x - start < MAX_PACKET && (x + 1 >= n || pixels[x] != pixels[x + 1]) {
            x += 1;
        }
        output.push((x - start - 1) as u8);
        output.extend_from_slice(&row[start * bpp..x * bpp]);
    }
}
