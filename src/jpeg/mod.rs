//! Baseline JPEG codec.
//!
//! The encoder writes JFIF files with one sequential Huffman-coded scan using
//! the standard Annex K tables, 4:4:4 or 4:2:0 chroma subsampling, and
//! optional restart markers. The decoder ([`decode`], [`decode_into`],
//! [`probe`]) reads baseline files with any sampling factors from 1 to 4.

pub mod dct;
pub mod decode;
pub mod huffman;
pub mod idct;
pub mod quantize;

pub use decode::{decode, decode_into, probe};

use crate::bits::BitWriterMsb;
use crate::color::{rgb_to_ycbcr, ColorType};
use crate::error::{Error, Result};
use crate::image::check_pixel_buffer;

use dct::dct_2d;
use huffman::{encode_block, EncodeTable, HuffmanTables};
use quantize::{quantize_block, zigzag_reorder, QuantizationTables};

/// Maximum supported image dimension for JPEG.
pub const MAX_DIMENSION: u32 = 65535;

const SOI: u16 = 0xFFD8;
const EOI: u16 = 0xFFD9;
const APP0: u16 = 0xFFE0;
const DQT: u16 = 0xFFDB;
const SOF0: u16 = 0xFFC0;
const DHT: u16 = 0xFFC4;
const DRI: u16 = 0xFFDD;
const SOS: u16 = 0xFFDA;

/// Chroma subsampling options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Subsampling {
    /// 4:4:4, no subsampling.
    #[default]
    S444,
    /// 4:2:0, 2x2 chroma downsample.
    S420,
}

/// JPEG encoding options.
///
/// Use [`JpegOptions::builder`] to create options with a fluent API.
///
/// # Example
///
/// ```rust
/// use imgcodec::jpeg::{encode, JpegOptions, Subsampling};
/// use imgcodec::ColorType;
///
/// let pixels = vec![255, 0, 0]; // 1x1 RGB red pixel
/// let options = JpegOptions::builder(1, 1)
///     .color_type(ColorType::Rgb)
///     .quality(85)
///     .subsampling(Subsampling::S420)
///     .build();
/// let jpeg_bytes = encode(&pixels, &options).unwrap();
/// assert_eq!(&jpeg_bytes[..2], &[0xFF, 0xD8]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct JpegOptions {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Color type of the pixel data (Rgb or Gray).
    pub color_type: ColorType,
    /// Quality level 1-100.
    pub quality: u8,
    /// Subsampling scheme. Ignored for grayscale.
    pub subsampling: Subsampling,
    /// Restart interval in MCUs (None = disabled).
    pub restart_interval: Option<u16>,
}

impl Default for JpegOptions {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            color_type: ColorType::Rgb,
            quality: 75,
            subsampling: Subsampling::S444,
            restart_interval: None,
        }
    }
}

impl JpegOptions {
    /// Create a builder. Color type defaults to RGB, quality to 75.
    pub fn builder(width: u32, height: u32) -> JpegOptionsBuilder {
        JpegOptionsBuilder::new(width, height)
    }
}

/// Builder for [`JpegOptions`].
#[derive(Debug, Clone)]
pub struct JpegOptionsBuilder {
    options: JpegOptions,
}

impl JpegOptionsBuilder {
    /// Create a new builder with image dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            options: JpegOptions {
                width,
                height,
                ..Default::default()
            },
        }
    }

    /// Set the color type of the pixel data.
    pub fn color_type(mut self, color_type: ColorType) -> Self {
        self.options.color_type = color_type;
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.options.quality = quality;
        self
    }

    pub fn subsampling(mut self, subsampling: Subsampling) -> Self {
        self.options.subsampling = subsampling;
        self
    }

    /// None disables restarts.
    pub fn restart_interval(mut self, interval: Option<u16>) -> Self {
        self.options.restart_interval = interval;
        self
    }

    /// Build the [`JpegOptions`].
    #[must_use]
    pub fn build(self) -> JpegOptions {
        self.options
    }
}

/// Encode raw pixel data (RGB or Gray, row-major) as a baseline JPEG.
#[must_use = "encoding produces a JPEG file that should be used"]
pub fn encode(data: &[u8], options: &JpegOptions) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    encode_into(&mut output, data, options)?;
    Ok(output)
}

/// Encode into a caller-provided buffer, which is cleared first so it can be
/// reused across encodes.
#[must_use = "this `Result` may indicate an encoding error"]
pub fn encode_into(output: &mut Vec<u8>, data: &[u8], options: &JpegOptions) -> Result<()> {
    let JpegOptions {
        width,
        height,
        color_type,
        quality,
        subsampling,
        restart_interval,
    } = *options;
    if quality == 0 || quality > 100 {
        return Err(Error::InvalidQuality(quality));
    }
    if restart_interval == Some(0) {
        return Err(Error::InvalidRestartInterval(0));
    }
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
    if !matches!(color_type, ColorType::Rgb | ColorType::Gray) {
        return Err(Error::UnsupportedColorType);
    }
    check_pixel_buffer(data.len(), width, height, color_type)?;

    let quant = QuantizationTables::with_quality(quality);
    let huff = HuffmanTables::standard()?;
    let subsampling = if color_type == ColorType::Gray {
        Subsampling::S444
    } else {
        subsampling
    };
    let color = color_type == ColorType::Rgb;

    output.clear();
    output.reserve(data.len() / 4);
    output.extend_from_slice(&SOI.to_be_bytes());
    write_app0(output);
    write_dqt(output, 0, &quant.luminance);
    if color {
        write_dqt(output, 1, &quant.chrominance);
    }
    write_sof0(output, width, height, color, subsampling);
    write_dht(output, 0x00, &huff.dc_luminance);
    write_dht(output, 0x10, &huff.ac_luminance);
    if color {
        write_dht(output, 0x01, &huff.dc_chrominance);
        write_dht(output, 0x11, &huff.ac_chrominance);
    }
    if let Some(interval) = restart_interval {
        write_dri(output, interval);
    }
    write_sos(output, color);

    let header_len = output.len();
    let mut scan = ScanEncoder {
        writer: BitWriterMsb::with_capacity(data.len() / 4),
        quant: &quant,
        huff: &huff,
        prev_dc: [0; 3],
    };
    encode_scan(
        &mut scan,
        data,
        width as usize,
        height as usize,
        color,
        subsampling,
        restart_interval,
    );
    output.extend_from_slice(&scan.writer.finish());
    output.extend_from_slice(&EOI.to_be_bytes());

    log::debug!(
        "jpeg encode: {}x{} {:?} q{} {:?}, {} header + {} scan bytes",
        width,
        height,
        color_type,
        quality,
        subsampling,
        header_len,
        output.len() - header_len - 2
    );
    Ok(())
}

fn write_app0(output: &mut Vec<u8>) {
    output.extend_from_slice(&APP0.to_be_bytes());
    output.extend_from_slice(&16u16.to_be_bytes());
    output.extend_from_slice(b"JFIF\0");
    // Version 1.01, no units, 1:1 aspect, no thumbnail.
    output.extend_from_slice(&[1, 1, 0, 0, 1, 0, 1, 0, 0]);
}

fn write_dqt(output: &mut Vec<u8>, id: u8, table: &[u8; 64]) {
    output.extend_from_slice(&DQT.to_be_bytes());
    output.extend_from_slice(&67u16.to_be_bytes());
    output.push(id); // 8-bit precision
    output.extend_from_slice(&zigzag_reorder(table));
}

fn write_sof0(output: &mut Vec<u8>, width: u32, height: u32, color: bool, subsampling: Subsampling) {
    let components: u8 = if color { 3 } else { 1 };
    output.extend_from_slice(&SOF0.to_be_bytes());
    output.extend_from_slice(&(8 + 3 * components as u16).to_be_bytes());
    output.push(8);
    output.extend_from_slice(&(height as u16).to_be_bytes());
    output.extend_from_slice(&(width as u16).to_be_bytes());
    output.push(components);
    if !color {
        output.extend_from_slice(&[1, 0x11, 0]);
        return;
    }
    let y_sampling = match subsampling {
        Subsampling::S444 => 0x11,
        Subsampling::S420 => 0x22,
    };
    // Component id, HxV sampling, quantization table.
    output.extend_from_slice(&[1, y_sampling, 0, 2, 0x11, 1, 3, 0x11, 1]);
}

fn write_dht(output: &mut Vec<u8>, class_id: u8, table: &EncodeTable) {
    let spec = table.spec();
    output.extend_from_slice(&DHT.to_be_bytes());
    output.extend_from_slice(&((2 + 1 + 16 + spec.values.len()) as u16).to_be_bytes());
    output.push(class_id);
    output.extend_from_slice(&spec.bits);
    output.extend_from_slice(spec.values);
}

fn write_dri(output: &mut Vec<u8>, interval: u16) {
    output.extend_from_slice(&DRI.to_be_bytes());
    output.extend_from_slice(&4u16.to_be_bytes());
    output.extend_from_slice(&interval.to_be_bytes());
}

fn write_sos(output: &mut Vec<u8>, color: bool) {
    let components: u8 = if color { 3 } else { 1 };
    output.extend_from_slice(&SOS.to_be_bytes());
    output.extend_from_slice(&(6 + 2 * components as u16).to_be_bytes());
    output.push(components);
    if color {
        // Y uses tables 0/0, Cb and Cr use 1/1.
        output.extend_from_slice(&[1, 0x00, 2, 0x11, 3, 0x11]);
    } else {
        output.extend_from_slice(&[1, 0x00]);
    }
    // Full spectral range, no successive approximation.
    output.extend_from_slice(&[0, 63, 0]);
}

struct ScanEncoder<'a> {
    writer: BitWriterMsb,
    quant: &'a QuantizationTables,
    huff: &'a HuffmanTables,
    prev_dc: [i16; 3],
}

impl ScanEncoder<'_> {
    /// Transform, quantize and entropy code one block of component `c`
    /// (0 = Y, 1 = Cb, 2 = Cr).
    fn block(&mut self, samples: &[f32; 64], c: usize) {
        let luminance = c == 0;
        let table = if luminance {
            &self.quant.luminance
        } else {
            &self.quant.chrominance
        };
        let coeffs = quantize_block(&dct_2d(samples), table);
        let (dc, ac) = self.huff.pair(luminance);
        self.prev_dc[c] = encode_block(&mut self.writer, &coeffs, self.prev_dc[c], dc, ac);
    }

    fn restart(&mut self, n: u8) {
        self.writer.write_bytes(&[0xFF, 0xD0 + (n & 0x07)]);
        self.prev_dc = [0; 3];
    }
}

fn encode_scan(
    scan: &mut ScanEncoder<'_>,
    data: &[u8],
    width: usize,
    height: usize,
    color: bool,
    subsampling: Subsampling,
    restart_interval: Option<u16>,
) {
    let mcu_size = if color && subsampling == Subsampling::S420 {
        16
    } else {
        8
    };
    let mcus_x = width.div_ceil(mcu_size);
    let mcus_y = height.div_ceil(mcu_size);
    let mut rst = 0u8;

    for my in 0..mcus_y {
        for mx in 0..mcus_x {
            let index = my * mcus_x + mx;
            if let Some(interval) = restart_interval {
                if index > 0 && index % interval as usize == 0 {
                    scan.restart(rst);
                    rst = rst.wrapping_add(1);
                }
            }
            let (x0, y0) = (mx * mcu_size, my * mcu_size);
            if !color {
                let block = extract_gray_block(data, width, height, x0, y0);
                scan.block(&block, 0);
            } else if mcu_size == 8 {
                let [y, cb, cr] = extract_block(data, width, height, x0, y0);
                scan.block(&y, 0);
                scan.block(&cb, 1);
                scan.block(&cr, 2);
            } else {
                let (ys, cb, cr) = extract_mcu_420(data, width, height, x0, y0);
                for y in &ys {
                    scan.block(y, 0);
                }
                scan.block(&cb, 1);
                scan.block(&cr, 2);
            }
        }
    }
}

/// Level-shifted 8x8 gray block; edge pixels are replicated past the border.
fn extract_gray_block(data: &[u8], width: usize, height: usize, x0: usize, y0: usize) -> [f32; 64] {
    let mut block = [0.0f32; 64];
    for dy in 0..8 {
        let y = (y0 + dy).min(height - 1);
        for dx in 0..8 {
            let x = (x0 + dx).min(width - 1);
            block[dy * 8 + dx] = data[y * width + x] as f32 - 128.0;
        }
    }
    block
}

/// Level-shifted Y, Cb and Cr blocks of an RGB 8x8 region.
fn extract_block(data: &[u8], width: usize, height: usize, x0: usize, y0: usize) -> [[f32; 64]; 3] {
    let mut blocks = [[0.0f32; 64]; 3];
    for dy in 0..8 {
        let y = (y0 + dy).min(height - 1);
        for dx in 0..8 {
            let x = (x0 + dx).min(width - 1);
            let p = (y * width + x) * 3;
            let (yc, cb, cr) = rgb_to_ycbcr(data[p], data[p + 1], data[p + 2]);
            let i = dy * 8 + dx;
            blocks[0][i] = yc as f32 - 128.0;
            blocks[1][i] = cb as f32 - 128.0;
            blocks[2][i] = cr as f32 - 128.0;
        }
    }
    blocks
}

/// Four Y blocks plus 2x2-averaged Cb and Cr blocks of a 16x16 RGB region.
fn extract_mcu_420(
    data: &[u8],
    width: usize,
    height: usize,
    x0: usize,
    y0: usize,
) -> ([[f32; 64]; 4], [f32; 64], [f32; 64]) {
    let mut y_blocks = [[0.0f32; 64]; 4];
    let mut cb_block = [0.0f32; 64];
    let mut cr_block = [0.0f32; 64];

    for gy in 0..16 {
        let y = (y0 + gy).min(height - 1);
        for gx in 0..16 {
            let x = (x0 + gx).min(width - 1);
            let p = (y * width + x) * 3;
            let (yc, cb, cr) = rgb_to_ycbcr(data[p], data[p + 1], data[p + 2]);
            let block = (gy / 8) * 2 + gx / 8;
            y_blocks[block][(gy % 8) * 8 + gx % 8] = yc as f32 - 128.0;
            let ci = (gy / 2) * 8 + gx / 2;
            cb_block[ci] += cb as f32;
            cr_block[ci] += cr as f32;
        }
    }
    for c in 0..64 {
        cb_block[c] = cb_block[c] * 0.25 - 128.0;
        cr_block[c] = cr_block[c] * 0.25 - 128.0;
    }

    (y_blocks, cb_block, cr_block)
}
