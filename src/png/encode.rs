//! PNG encoder.

use crate::color::ColorType;
use crate::compress::{Deflater, Flush, Format, Status, Strategy, DEFAULT_LEVEL};
use crate::error::{alloc_zeroed, Error, Result};
use crate::image::check_pixel_buffer;

use super::chunk::{write_chunk, ChunkType, MAX_CHUNK_LEN, SIGNATURE};
use super::filter::{filter_image, FilterStrategy};
use super::MAX_DIMENSION;

/// Default IDAT payload size.
pub const DEFAULT_IDAT_CHUNK_SIZE: usize = 64 * 1024;

/// PNG encoding options.
///
/// Use [`PngOptions::builder`] to create options with a fluent API.
///
/// # Example
///
/// ```rust
/// use imgcodec::png::{encode, FilterStrategy, PngOptions};
/// use imgcodec::ColorType;
///
/// let pixels = vec![255, 0, 0, 0, 255, 0]; // 2x1 RGB
/// let options = PngOptions::builder(2, 1)
///     .color_type(ColorType::Rgb)
///     .compression_level(9)
///     .filter_strategy(FilterStrategy::Paeth)
///     .build();
/// let png_bytes = encode(&pixels, &options).unwrap();
/// assert_eq!(&png_bytes[1..4], b"PNG");
/// ```
#[derive(Debug, Clone)]
pub struct PngOptions {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Layout of the input pixels.
    pub color_type: ColorType,
    /// DEFLATE level 0-9.
    pub compression_level: u8,
    /// DEFLATE match strategy.
    pub strategy: Strategy,
    /// Scanline filter selection.
    pub filter_strategy: FilterStrategy,
    /// Maximum IDAT payload size in bytes.
    pub idat_chunk_size: usize,
}

impl Default for PngOptions {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            color_type: ColorType::Rgba,
            compression_level: DEFAULT_LEVEL,
            strategy: Strategy::Default,
            filter_strategy: FilterStrategy::Adaptive,
            idat_chunk_size: DEFAULT_IDAT_CHUNK_SIZE,
        }
    }
}

impl PngOptions {
    /// Preset 0: fast. Level 2, `Up` filter on every row.
    pub fn fast(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            compression_level: 2,
            filter_strategy: FilterStrategy::Up,
            ..Default::default()
        }
    }

    /// Preset 1: balanced. Level 6, adaptive filters.
    pub fn balanced(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Preset 2: max. Level 9, adaptive filters, filtered match strategy.
    pub fn max(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            compression_level: 9,
            strategy: Strategy::Filtered,
            ..Default::default()
        }
    }

    /// Create from preset (0=fast, 1=balanced, 2=max).
    pub fn from_preset(width: u32, height: u32, preset: u8) -> Self {
        match preset {
            0 => Self::fast(width, height),
            2 => Self::max(width, height),
            _ => Self::balanced(width, height),
        }
    }

    /// Create a builder. Color type defaults to RGBA, level to 6.
    pub fn builder(width: u32, height: u32) -> PngOptionsBuilder {
        PngOptionsBuilder::new(width, height)
    }
}

/// Builder for [`PngOptions`].
#[derive(Debug, Clone)]
pub struct PngOptionsBuilder {
    options: PngOptions,
}

impl PngOptionsBuilder {
    /// Create a new builder with image dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            options: PngOptions::balanced(width, height),
        }
    }

    /// Set the color type of the pixel data.
    pub fn color_type(mut self, color_type: ColorType) -> Self {
        self.options.color_type = color_type;
        self
    }

    pub fn compression_level(mut self, level: u8) -> Self {
        self.options.compression_level = level;
        self
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.options.strategy = strategy;
        self
    }

    pub fn filter_strategy(mut self, filter_strategy: FilterStrategy) -> Self {
        self.options.filter_strategy = filter_strategy;
        self
    }

    /// Clamped to 1..=2^31-1.
    pub fn idat_chunk_size(mut self, size: usize) -> Self {
        self.options.idat_chunk_size = size.clamp(1, MAX_CHUNK_LEN as usize);
        self
    }

    /// Apply a preset while retaining dimensions and color type.
    pub fn preset(mut self, preset: u8) -> Self {
        let color_type = self.options.color_type;
        self.options = PngOptions::from_preset(self.options.width, self.options.height, preset);
        self.options.color_type = color_type;
        self
    }

    /// Build the [`PngOptions`].
    #[must_use]
    pub fn build(self) -> PngOptions {
        self.options
    }
}

/// Encode raw pixels as PNG.
#[must_use = "encoding produces a PNG file that should be used"]
pub fn encode(data: &[u8], options: &PngOptions) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    encode_into(&mut output, data, options)?;
    Ok(output)
}

/// Encode raw pixels as PNG into a caller-provided buffer, which is cleared
/// first so it can be reused across encodes.
#[must_use = "this `Result` may indicate an encoding error"]
pub fn encode_into(output: &mut Vec<u8>, data: &[u8], options: &PngOptions) -> Result<()> {
    let PngOptions {
        width,
        height,
        color_type,
        ..
    } = *options;
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions { width, height });
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(Error::ImageTooLarge {
            width,
            height,
            max: MAX_DIMENSION,
        });
    }
    if options.compression_level > 9 {
        return Err(Error::InvalidCompressionLevel(options.compression_level));
    }
    check_pixel_buffer(data.len(), width, height, color_type)?;

    let bpp = color_type.bytes_per_pixel();
    let stride = width as usize * bpp;
    let scanlines = filter_image(data, stride, bpp, options.filter_strategy)?;

    output.clear();
    output.reserve(scanlines.len() / 2 + 64);
    output.extend_from_slice(&SIGNATURE);
    write_chunk(output, ChunkType::IHDR, &ihdr(width, height, color_type));
    let chunks = write_idat(output, &scanlines, options)?;
    write_chunk(output, ChunkType::IEND, &[]);

    log::debug!(
        "png encode: {}x{} {:?}, {} scanline bytes -> {} bytes in {} IDAT chunks",
        width,
        height,
        color_type,
        scanlines.len(),
        output.len(),
        chunks
    );
    Ok(())
}

fn ihdr(width: u32, height: u32, color_type: ColorType) -> [u8; 13] {
    let color = match color_type {
        ColorType::Gray => 0,
        ColorType::Rgb => 2,
        ColorType::GrayAlpha => 4,
        ColorType::Rgba => 6,
    };
    let mut data = [0u8; 13];
    data[..4].copy_from_slice(&width.to_be_bytes());
    data[4..8].copy_from_slice(&height.to_be_bytes());
    data[8] = 8;
    data[9] = color;
    // Compression, filter and interlace methods are all 0.
    data
}

/// Stream the scanlines through a [`Deflater`], cutting an IDAT chunk each
/// time the chunk buffer fills. Returns the number of chunks written.
fn write_idat(output: &mut Vec<u8>, scanlines: &[u8], options: &PngOptions) -> Result<usize> {
    let mut deflater = Deflater::new(options.compression_level, options.strategy, Format::Zlib)?;
    let mut chunk = alloc_zeroed(options.idat_chunk_size.clamp(1, MAX_CHUNK_LEN as usize))?;
    let mut filled = 0;
    let mut input = scanlines;
    let mut count = 0;
    loop {
        let res = deflater.deflate(input, &mut chunk[filled..], Flush::Finish)?;
        input = &input[res.bytes_consumed..];
        filled += res.bytes_written;
        let done = res.status == Status::StreamEnd;
        if filled == chunk.len() || (done && filled > 0) {
            write_chunk(output, ChunkType::IDAT, &chunk[..filled]);
            filled = 0;
            count += 1;
        }
        match res.status {
            Status::StreamEnd => return Ok(count),
            Status::Ok => {}
            Status::NeedDict | Status::BufError => {
                return Err(Error::StreamState("deflate stalled while writing IDAT"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::png::decode;

    #[test]
    fn test_encode_1x1_rgb() {
        let opts = PngOptions::builder(1, 1).color_type(ColorType::Rgb).build();
        let png = encode(&[255, 0, 0], &opts).unwrap();
        assert_eq!(&png[..8], &SIGNATURE);
        assert_eq!(&png[12..16], b"IHDR");
        assert_eq!(&png[16..24], &[0, 0, 0, 1, 0, 0, 0, 1]);
        assert_eq!(&png[24..29], &[8, 2, 0, 0, 0]);
        assert_eq!(&png[png.len() - 8..png.len() - 4], b"IEND");
    }

    #[test]
    fn test_validation() {
        let opts = PngOptions::builder(0, 1).build();
        assert!(matches!(
            encode(&[], &opts),
            Err(Error::InvalidDimensions { .. })
        ));

        let opts = PngOptions::builder(2, 2).color_type(ColorType::Gray).build();
        assert!(matches!(
            encode(&[0; 3], &opts),
            Err(Error::InvalidDataLength {
                expected: 4,
                actual: 3
            })
        ));

        let opts = PngOptions::builder(1, 1)
            .color_type(ColorType::Gray)
            .compression_level(10)
            .build();
        assert!(matches!(
            encode(&[0], &opts),
            Err(Error::InvalidCompressionLevel(10))
        ));
    }

    #[test]
    fn test_small_idat_chunks_roundtrip() {
        let (w, h) = (37u32, 23u32);
        let pixels: Vec<u8> = (0..w * h * 4).map(|i| (i * 7 % 253) as u8).collect();
        let opts = PngOptions::builder(w, h)
            .color_type(ColorType::Rgba)
            .idat_chunk_size(100)
            .build();
        let png = encode(&pixels, &opts).unwrap();
        let idat_count = png.windows(4).filter(|w| *w == b"IDAT").count();
        assert!(idat_count > 3, "expected several IDAT chunks, got {idat_count}");

        let image = decode::decode(&png[..]).unwrap();
        assert_eq!(image.color_type, ColorType::Rgba);
        assert_eq!(image.pixels, pixels);
    }

    #[test]
    fn test_encode_into_reuses_buffer() {
        let opts = PngOptions::builder(2, 1).color_type(ColorType::GrayAlpha).build();
        let mut buf = vec![0xAA; 1000];
        encode_into(&mut buf, &[1, 2, 3, 4], &opts).unwrap();
        assert_eq!(buf, encode(&[1, 2, 3, 4], &opts).unwrap());
    }

    #[test]
    fn test_preset_keeps_color_type() {
        let opts = PngOptions::builder(4, 4)
            .color_type(ColorType::Gray)
            .preset(2)
            .build();
        assert_eq!(opts.color_type, ColorType::Gray);
        assert_eq!(opts.compression_level, 9);
        assert_eq!(PngOptions::from_preset(1, 1, 0).filter_strategy, FilterStrategy::Up);
    }
}
