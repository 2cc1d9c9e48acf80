//! Streaming PNG decoder.
//!
//! IDAT payloads are pulled through one [`Inflater`] as they are read, and
//! each scanline is unfiltered as soon as it is complete, so only the current
//! and previous rows are held besides the caller's output buffer.

use std::io::{Read, Seek, SeekFrom};

use crate::color::ColorType;
use crate::compress::{Format, Inflater, Status};
use crate::error::{alloc_zeroed, Error, Result};
use crate::image::{Image, ImageInfo};

use super::chunk::{ChunkReader, ChunkType, SIGNATURE};
use super::filter::{unfilter_row, FilterType};
use super::MAX_DIMENSION;

const IDAT_READ_SIZE: usize = 32 * 1024;

/// Color type byte of IHDR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PngColor {
    Gray,
    Rgb,
    Indexed,
    GrayAlpha,
    Rgba,
}

impl PngColor {
    fn from_u8(v: u8) -> Result<Self> {
        Ok(match v {
            0 => PngColor::Gray,
            2 => PngColor::Rgb,
            3 => PngColor::Indexed,
            4 => PngColor::GrayAlpha,
            6 => PngColor::Rgba,
            _ => return Err(Error::invalid(format!("invalid PNG color type {v}"))),
        })
    }

    fn channels(self) -> usize {
        match self {
            PngColor::Gray | PngColor::Indexed => 1,
            PngColor::GrayAlpha => 2,
            PngColor::Rgb => 3,
            PngColor::Rgba => 4,
        }
    }

    fn output(self) -> ColorType {
        match self {
            PngColor::Gray => ColorType::Gray,
            PngColor::GrayAlpha => ColorType::GrayAlpha,
            PngColor::Rgb | PngColor::Indexed => ColorType::Rgb,
            PngColor::Rgba => ColorType::Rgba,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Header {
    width: u32,
    height: u32,
    color: PngColor,
}

impl Header {
    fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != 13 {
            return Err(Error::invalid(format!("IHDR length {} (expected 13)", data.len())));
        }
        let width = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let height = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if width == 0 || height == 0 {
            return Err(Error::invalid(format!("invalid PNG dimensions {width}x{height}")));
        }
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(Error::invalid(format!("PNG dimensions {width}x{height} out of range")));
        }
        let (bit_depth, color_type) = (data[8], data[9]);
        let color = PngColor::from_u8(color_type)?;
        let depth_ok = match color {
            PngColor::Gray => matches!(bit_depth, 1 | 2 | 4 | 8 | 16),
            PngColor::Indexed => matches!(bit_depth, 1 | 2 | 4 | 8),
            _ => matches!(bit_depth, 8 | 16),
        };
        if !depth_ok {
            return Err(Error::invalid(format!(
                "bit depth {bit_depth} not allowed with color type {color_type}"
            )));
        }
        if bit_depth != 8 {
            return Err(Error::unsupported(format!("PNG bit depth {bit_depth}")));
        }
        if data[10] != 0 {
            return Err(Error::invalid(format!("unknown compression method {}", data[10])));
        }
        if data[11] != 0 {
            return Err(Error::invalid(format!("unknown filter method {}", data[11])));
        }
        match data[12] {
            0 => {}
            1 => return Err(Error::unsupported("interlaced PNG")),
            m => return Err(Error::invalid(format!("unknown interlace method {m}"))),
        }
        Ok(Self {
            width,
            height,
            color,
        })
    }

    fn info(&self) -> ImageInfo {
        ImageInfo {
            width: self.width,
            height: self.height,
            color_type: self.color.output(),
        }
    }
}

fn read_header<R: Read>(mut reader: R) -> Result<(ChunkReader<R>, Header)> {
    let mut signature = [0u8; 8];
    reader.read_exact(&mut signature)?;
    if signature != SIGNATURE {
        return Err(Error::invalid("not a PNG file (bad signature)"));
    }
    let mut chunks = ChunkReader::new(reader);
    if chunks.next_chunk()? != ChunkType::IHDR {
        return Err(Error::invalid("first chunk is not IHDR"));
    }
    let header = Header::parse(&chunks.read_payload(13)?)?;
    chunks.finish_chunk()?;
    Ok((chunks, header))
}

/// Read the PNG header and report the decoded geometry, leaving the stream
/// where it was.
pub fn probe<R: Read + Seek>(reader: &mut R) -> Result<ImageInfo> {
    let start = reader.stream_position()?;
    let result = read_header(&mut *reader).map(|(_, header)| header.info());
    reader.seek(SeekFrom::Start(start))?;
    result
}

/// Decode a PNG into a caller-owned buffer of exactly
/// `width * height * bytes_per_pixel` bytes.
pub fn decode_into<R: Read>(reader: R, pixels: &mut [u8]) -> Result<ImageInfo> {
    let (chunks, header) = read_header(reader)?;
    let info = header.info();
    let expected = info.buffer_len()?;
    if pixels.len() != expected {
        return Err(Error::InvalidDataLength {
            expected,
            actual: pixels.len(),
        });
    }
    Body::new(chunks, header)?.run(pixels)?;
    Ok(info)
}

/// Decode a PNG into a newly allocated [`Image`].
pub fn decode<R: Read>(reader: R) -> Result<Image> {
    let (chunks, header) = read_header(reader)?;
    let info = header.info();
    let mut pixels = alloc_zeroed(info.buffer_len()?)?;
    Body::new(chunks, header)?.run(&mut pixels)?;
    Ok(Image {
        width: info.width,
        height: info.height,
        color_type: info.color_type,
        pixels,
    })
}

/// Decoding state after IHDR.
struct Body<R> {
    chunks: ChunkReader<R>,
    header: Header,
    inflater: Inflater,
    palette: Option<Vec<[u8; 3]>>,
    /// Filter tag plus one raw row.
    scan: Vec<u8>,
    filled: usize,
    prev: Vec<u8>,
    rows_done: u32,
    seen_idat: bool,
}

impl<R: Read> Body<R> {
    fn new(chunks: ChunkReader<R>, header: Header) -> Result<Self> {
        let stride = header.width as usize * header.color.channels();
        log::debug!(
            "png: {}x{} {:?}, {} bytes per row",
            header.width,
            header.height,
            header.color,
            stride
        );
        Ok(Self {
            chunks,
            header,
            inflater: Inflater::new(Format::Zlib),
            palette: None,
            scan: alloc_zeroed(stride + 1)?,
            filled: 0,
            prev: alloc_zeroed(stride)?,
            rows_done: 0,
            seen_idat: false,
        })
    }

    fn run(mut self, pixels: &mut [u8]) -> Result<()> {
        loop {
            let kind = self.chunks.next_chunk()?;
            match kind {
                ChunkType::IHDR => return Err(Error::invalid("duplicate IHDR chunk")),
                ChunkType::PLTE => self.read_palette()?,
                ChunkType::IDAT => {
                    if self.header.color == PngColor::Indexed && self.palette.is_none() {
                        return Err(Error::invalid("indexed PNG without a PLTE chunk before IDAT"));
                    }
                    self.seen_idat = true;
                    self.read_idat(pixels)?;
                }
                ChunkType::IEND => {
                    self.chunks.finish_chunk()?;
                    break;
                }
                _ if kind.is_critical() => {
                    return Err(Error::unsupported(format!("critical chunk {kind:?}")));
                }
                _ => log::trace!("png: skipping {:?}", kind),
            }
        }

        if self.rows_done < self.header.height {
            return Err(Error::invalid(format!(
                "IEND after {} of {} scanlines",
                self.rows_done, self.header.height
            )));
        }
        if !self.inflater.is_done() {
            return Err(Error::invalid("image data ends before the end of the zlib stream"));
        }
        Ok(())
    }

    fn read_palette(&mut self) -> Result<()> {
        if self.seen_idat {
            return Err(Error::invalid("PLTE chunk after IDAT"));
        }
        if self.palette.is_some() {
            return Err(Error::invalid("duplicate PLTE chunk"));
        }
        let data = self.chunks.read_payload(256 * 3)?;
        if data.is_empty() || data.len() % 3 != 0 {
            return Err(Error::invalid(format!("PLTE length {} is invalid", data.len())));
        }
        // Gray images may not carry a palette; color images use it as a hint only.
        match self.header.color {
            PngColor::Gray | PngColor::GrayAlpha => {
                return Err(Error::invalid("PLTE chunk in a grayscale PNG"));
            }
            _ => {}
        }
        let entries = data.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
        self.palette = Some(entries);
        Ok(())
    }

    fn read_idat(&mut self, pixels: &mut [u8]) -> Result<()> {
        let mut input = [0u8; IDAT_READ_SIZE];
        let mut spare = [0u8; 1];
        loop {
            let n = self.chunks.read(&mut input)?;
            if n == 0 {
                return Ok(());
            }
            let mut pos = 0;
            while pos < n && !self.inflater.is_done() {
                let decoding = self.rows_done < self.header.height;
                let out = if decoding {
                    &mut self.scan[self.filled..]
                } else {
                    &mut spare[..]
                };
                let res = self.inflater.inflate(&input[pos..n], out)?;
                pos += res.bytes_consumed;
                if decoding {
                    self.filled += res.bytes_written;
                    if self.filled == self.scan.len() {
                        self.finish_row(pixels)?;
                    }
                } else if res.bytes_written > 0 {
                    return Err(Error::invalid("more image data than the dimensions allow"));
                }
                match res.status {
                    Status::Ok | Status::StreamEnd => {}
                    Status::NeedDict => {
                        return Err(Error::invalid("PNG image data requests a preset dictionary"));
                    }
                    Status::BufError => return Err(Error::invalid("image data stream stalled")),
                }
            }
        }
    }

    fn finish_row(&mut self, pixels: &mut [u8]) -> Result<()> {
        let filter = FilterType::from_u8(self.scan[0])?;
        let bpp = self.header.color.channels();
        let row = &mut self.scan[1..];
        unfilter_row(filter, row, &self.prev, bpp);

        let out_stride = self.header.width as usize * self.header.color.output().bytes_per_pixel();
        let y = self.rows_done as usize;
        let dst = &mut pixels[y * out_stride..(y + 1) * out_stride];
        match &self.palette {
            Some(palette) if self.header.color == PngColor::Indexed => {
                for (px, &index) in dst.chunks_exact_mut(3).zip(row.iter()) {
                    let entry = palette.get(index as usize).ok_or_else(|| {
                        Error::invalid(format!(
                            "palette index {index} out of range ({} entries)",
                            palette.len()
                        ))
                    })?;
                    px.copy_from_slice(entry);
                }
            }
            _ => dst.copy_from_slice(row),
        }

        self.prev.copy_from_slice(row);
        self.filled = 0;
        self.rows_done += 1;
        Ok(())
    }
}
