//! Baseline JPEG decoder.
//!
//! Marker segments are read sequentially up to the single scan. Entropy-coded
//! data is then decoded one MCU row at a time into per-component line buffers,
//! which are upsampled by replication, color converted and written straight
//! into the output buffer.

use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};

use crate::bits::BitReaderMsb;
use crate::color::{ycbcr_to_rgb, ColorType};
use crate::error::{alloc_zeroed, Error, Result};
use crate::image::{Image, ImageInfo};

use super::huffman::{extend, DecodeTable};
use super::idct::idct_block;
use super::quantize::ZIGZAG;

const SOF0: u8 = 0xC0;
const DHT: u8 = 0xC4;
const JPG: u8 = 0xC8;
const DAC: u8 = 0xCC;
const RST0: u8 = 0xD0;
const RST7: u8 = 0xD7;
const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const DQT: u8 = 0xDB;
const DRI: u8 = 0xDD;
const TEM: u8 = 0x01;

const MAX_SAMPLING: usize = 4;
/// Largest number of blocks in one interleaved MCU.
const MAX_BLOCKS_PER_MCU: usize = 10;

#[derive(Debug, Clone)]
struct Component {
    id: u8,
    h: usize,
    v: usize,
    quant: usize,
}

#[derive(Debug, Clone)]
struct Frame {
    width: u32,
    height: u32,
    components: Vec<Component>,
    h_max: usize,
    v_max: usize,
}

impl Frame {
    fn info(&self) -> ImageInfo {
        ImageInfo {
            width: self.width,
            height: self.height,
            color_type: if self.components.len() == 1 {
                ColorType::Gray
            } else {
                ColorType::Rgb
            },
        }
    }
}

/// One component of the scan: frame component index and table selectors.
#[derive(Debug, Clone, Copy)]
struct ScanComponent {
    index: usize,
    dc: usize,
    ac: usize,
}

fn be16(data: &[u8]) -> u16 {
    u16::from_be_bytes([data[0], data[1]])
}

struct Decoder<R> {
    reader: R,
    quant: [Option<[u16; 64]>; 4],
    dc_tables: [Option<DecodeTable>; 4],
    ac_tables: [Option<DecodeTable>; 4],
    frame: Option<Frame>,
    restart_interval: u16,
}

impl<R: BufRead> Decoder<R> {
    fn new(mut reader: R) -> Result<Self> {
        let mut soi = [0u8; 2];
        reader.read_exact(&mut soi)?;
        if soi != [0xFF, SOI] {
            return Err(Error::invalid("not a JPEG file (missing SOI)"));
        }
        Ok(Self {
            reader,
            quant: [None; 4],
            dc_tables: Default::default(),
            ac_tables: Default::default(),
            frame: None,
            restart_interval: 0,
        })
    }

    fn next_marker(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.reader.read_exact(&mut byte)?;
        if byte[0] != 0xFF {
            return Err(Error::invalid(format!(
                "expected a marker, found byte {:#04x}",
                byte[0]
            )));
        }
        // Any number of fill bytes may precede the marker code.
        while byte[0] == 0xFF {
            self.reader.read_exact(&mut byte)?;
        }
        if byte[0] == 0 {
            return Err(Error::invalid("stuffed zero byte outside entropy-coded data"));
        }
        Ok(byte[0])
    }

    fn read_segment(&mut self) -> Result<Vec<u8>> {
        let mut len = [0u8; 2];
        self.reader.read_exact(&mut len)?;
        let len = be16(&len) as usize;
        if len < 2 {
            return Err(Error::invalid(format!("marker segment length {len}")));
        }
        let mut data = vec![0u8; len - 2];
        self.reader.read_exact(&mut data)?;
        Ok(data)
    }

    /// Process markers until the frame header has been seen.
    fn read_frame_header(&mut self) -> Result<ImageInfo> {
        loop {
            if let Some(frame) = &self.frame {
                return Ok(frame.info());
            }
            let marker = self.next_marker()?;
            if self.handle_marker(marker)?.is_some() {
                return Err(Error::invalid("SOS before SOF0"));
            }
        }
    }

    /// Process markers up to and including SOS.
    fn read_scan_header(&mut self) -> Result<Vec<ScanComponent>> {
        loop {
            let marker = self.next_marker()?;
            if let Some(scan) = self.handle_marker(marker)? {
                return Ok(scan);
            }
        }
    }

    fn handle_marker(&mut self, marker: u8) -> Result<Option<Vec<ScanComponent>>> {
        match marker {
            SOF0 => {
                if self.frame.is_some() {
                    return Err(Error::invalid("more than one SOF marker"));
                }
                let segment = self.read_segment()?;
                self.frame = Some(parse_sof(&segment)?);
            }
            0xC2 | 0xC6 | 0xCA | 0xCE => {
                return Err(Error::unsupported("progressive JPEG"));
            }
            DAC | 0xC9..=0xCB | 0xCD..=0xCF => {
                return Err(Error::unsupported("arithmetic-coded JPEG"));
            }
            0xC1..=0xCF if marker != DHT && marker != JPG => {
                return Err(Error::unsupported(format!(
                    "SOF{} frames (only baseline SOF0)",
                    marker - SOF0
                )));
            }
            DHT => {
                let segment = self.read_segment()?;
                self.parse_dht(&segment)?;
            }
            DQT => {
                let segment = self.read_segment()?;
                self.parse_dqt(&segment)?;
            }
            DRI => {
                let segment = self.read_segment()?;
                if segment.len() != 2 {
                    return Err(Error::invalid("DRI segment length"));
                }
                self.restart_interval = be16(&segment);
            }
            SOS => {
                let segment = self.read_segment()?;
                return self.parse_sos(&segment).map(Some);
            }
            EOI => return Err(Error::invalid("EOI before any scan")),
            SOI => return Err(Error::invalid("unexpected SOI")),
            RST0..=RST7 => {
                return Err(Error::invalid(format!(
                    "RST{} outside entropy-coded data",
                    marker - RST0
                )));
            }
            TEM => {}
            _ => {
                // APPn, COM and anything else with a length field.
                let segment = self.read_segment()?;
                log::trace!("jpeg: skipping marker {marker:#04x}, {} bytes", segment.len());
            }
        }
        Ok(None)
    }

    fn parse_dht(&mut self, mut segment: &[u8]) -> Result<()> {
        while !segment.is_empty() {
            let class = segment[0] >> 4;
            let id = (segment[0] & 0x0F) as usize;
            if class > 1 || id > 3 {
                return Err(Error::invalid(format!(
                    "invalid Huffman table class/id {:#04x}",
                    segment[0]
                )));
            }
            if segment.len() < 17 {
                return Err(Error::invalid("truncated DHT segment"));
            }
            let mut bits = [0u8; 16];
            bits.copy_from_slice(&segment[1..17]);
            let count: usize = bits.iter().map(|&b| b as usize).sum();
            let values = segment
                .get(17..17 + count)
                .ok_or_else(|| Error::invalid("truncated DHT segment"))?;
            let table = DecodeTable::new(&bits, values)?;
            log::trace!(
                "jpeg: {} Huffman table {id}, {count} codes",
                if class == 0 { "DC" } else { "AC" }
            );
            if class == 0 {
                self.dc_tables[id] = Some(table);
            } else {
                self.ac_tables[id] = Some(table);
            }
            segment = &segment[17 + count..];
        }
        Ok(())
    }

    fn parse_dqt(&mut self, mut segment: &[u8]) -> Result<()> {
        while !segment.is_empty() {
            let precision = segment[0] >> 4;
            let id = (segment[0] & 0x0F) as usize;
            if precision > 1 || id > 3 {
                return Err(Error::invalid(format!(
                    "invalid quantization table precision/id {:#04x}",
                    segment[0]
                )));
            }
            let size = if precision == 0 { 64 } else { 128 };
            let data = segment
                .get(1..1 + size)
                .ok_or_else(|| Error::invalid("truncated DQT segment"))?;
            let mut table = [0u16; 64];
            for (k, &pos) in ZIGZAG.iter().enumerate() {
                table[pos] = if precision == 0 {
                    data[k] as u16
                } else {
                    be16(&data[2 * k..])
                };
            }
            self.quant[id] = Some(table);
            segment = &segment[1 + size..];
        }
        Ok(())
    }

    fn parse_sos(&self, segment: &[u8]) -> Result<Vec<ScanComponent>> {
        let frame = self
            .frame
            .as_ref()
            .ok_or_else(|| Error::invalid("SOS before SOF0"))?;
        let count = *segment
            .first()
            .ok_or_else(|| Error::invalid("empty SOS segment"))? as usize;
        if segment.len() != 1 + 2 * count + 3 {
            return Err(Error::invalid("SOS segment length"));
        }
        if count != frame.components.len() {
            return Err(Error::unsupported(format!(
                "scan covering {count} of {} components (multi-scan JPEG)",
                frame.components.len()
            )));
        }

        let mut scan: Vec<ScanComponent> = Vec::with_capacity(count);
        for sel in segment[1..1 + 2 * count].chunks_exact(2) {
            let (id, tables) = (sel[0], sel[1]);
            let index = frame
                .components
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(|| Error::invalid(format!("scan references unknown component {id}")))?;
            if scan.iter().any(|s| s.index == index) {
                return Err(Error::invalid(format!("component {id} listed twice in scan")));
            }
            let (dc, ac) = ((tables >> 4) as usize, (tables & 0x0F) as usize);
            if dc > 3 || ac > 3 {
                return Err(Error::invalid(format!(
                    "invalid Huffman table selectors {tables:#04x} for component {id}"
                )));
            }
            if self.dc_tables[dc].is_none() {
                return Err(Error::invalid(format!("DC Huffman table {dc} not defined before SOS")));
            }
            if self.ac_tables[ac].is_none() {
                return Err(Error::invalid(format!("AC Huffman table {ac} not defined before SOS")));
            }
            let quant = frame.components[index].quant;
            if self.quant[quant].is_none() {
                return Err(Error::invalid(format!(
                    "quantization table {quant} not defined before SOS"
                )));
            }
            scan.push(ScanComponent { index, dc, ac });
        }

        let tail = &segment[1 + 2 * count..];
        if tail != [0, 63, 0] {
            return Err(Error::unsupported(format!(
                "spectral selection {}..={} / approximation {:#04x} in a baseline scan",
                tail[0], tail[1], tail[2]
            )));
        }
        Ok(scan)
    }

    fn decode_scan(self, scan: &[ScanComponent], out: &mut [u8]) -> Result<()> {
        let Decoder {
            reader,
            quant,
            dc_tables,
            ac_tables,
            frame,
            restart_interval,
        } = self;
        let frame = frame.ok_or_else(|| Error::invalid("SOS before SOF0"))?;

        let mcu_w = 8 * frame.h_max;
        let mcu_h = 8 * frame.v_max;
        let mcus_x = (frame.width as usize).div_ceil(mcu_w);
        let mcus_y = (frame.height as usize).div_ceil(mcu_h);

        // One MCU row of samples per component.
        let strides: Vec<usize> = frame.components.iter().map(|c| mcus_x * c.h * 8).collect();
        let mut planes = frame
            .components
            .iter()
            .zip(&strides)
            .map(|(c, &stride)| alloc_zeroed(stride * c.v * 8))
            .collect::<Result<Vec<_>>>()?;

        let mut units = Vec::with_capacity(scan.len());
        for s in scan {
            let comp = &frame.components[s.index];
            let missing = || Error::invalid("table missing at SOS");
            units.push(Unit {
                plane: s.index,
                h: comp.h,
                v: comp.v,
                dc: dc_tables[s.dc].as_ref().ok_or_else(missing)?,
                ac: ac_tables[s.ac].as_ref().ok_or_else(missing)?,
                quant: quant[comp.quant].as_ref().ok_or_else(missing)?,
                pred: 0,
            });
        }

        log::debug!(
            "jpeg: {}x{}, {} components, MCU {}x{}, {}x{} MCUs, restart interval {}",
            frame.width,
            frame.height,
            frame.components.len(),
            mcu_w,
            mcu_h,
            mcus_x,
            mcus_y,
            restart_interval
        );

        let mut bits = BitReaderMsb::new(reader);
        let mut coeffs = [0i32; 64];
        let interval = restart_interval as usize;
        let mut next_rst = 0u8;
        let mut mcu_index = 0usize;
        for mcu_y in 0..mcus_y {
            for mcu_x in 0..mcus_x {
                if interval > 0 && mcu_index > 0 && mcu_index % interval == 0 {
                    expect_restart(&mut bits, next_rst)?;
                    next_rst = (next_rst + 1) & 7;
                    for unit in &mut units {
                        unit.pred = 0;
                    }
                }
                for unit in &mut units {
                    let stride = strides[unit.plane];
                    for by in 0..unit.v {
                        for bx in 0..unit.h {
                            decode_block(&mut bits, unit, &mut coeffs)?;
                            let x0 = (mcu_x * unit.h + bx) * 8;
                            let start = by * 8 * stride + x0;
                            idct_block(&coeffs, &mut planes[unit.plane][start..], stride);
                        }
                    }
                }
                mcu_index += 1;
            }
            emit_rows(&frame, &planes, &strides, mcu_y, out);
        }

        match bits.take_marker()? {
            Some(EOI) => {}
            Some(marker) => log::debug!("jpeg: stopping at marker {marker:#04x} after the scan"),
            None => log::debug!("jpeg: entropy-coded data ends without EOI"),
        }
        Ok(())
    }
}

/// Decoding state of one scan component.
struct Unit<'a> {
    plane: usize,
    h: usize,
    v: usize,
    dc: &'a DecodeTable,
    ac: &'a DecodeTable,
    quant: &'a [u16; 64],
    pred: i32,
}

fn parse_sof(segment: &[u8]) -> Result<Frame> {
    if segment.len() < 6 {
        return Err(Error::invalid("truncated SOF0 segment"));
    }
    if segment[0] != 8 {
        return Err(Error::unsupported(format!("{}-bit JPEG samples", segment[0])));
    }
    let height = be16(&segment[1..]) as u32;
    let width = be16(&segment[3..]) as u32;
    if width == 0 {
        return Err(Error::invalid("JPEG width is zero"));
    }
    if height == 0 {
        return Err(Error::unsupported("image height defined by a DNL marker"));
    }
    let count = segment[5] as usize;
    if count != 1 && count != 3 {
        return Err(Error::unsupported(format!("JPEG with {count} components")));
    }
    if segment.len() != 6 + 3 * count {
        return Err(Error::invalid("SOF0 segment length"));
    }

    let mut components: Vec<Component> = Vec::with_capacity(count);
    for spec in segment[6..].chunks_exact(3) {
        let (id, h, v, quant) = (spec[0], (spec[1] >> 4) as usize, (spec[1] & 0x0F) as usize, spec[2]);
        if !(1..=MAX_SAMPLING).contains(&h) || !(1..=MAX_SAMPLING).contains(&v) {
            return Err(Error::invalid(format!(
                "invalid sampling factors {h}x{v} for component {id}"
            )));
        }
        if quant > 3 {
            return Err(Error::invalid(format!(
                "invalid quantization table {quant} for component {id}"
            )));
        }
        if components.iter().any(|c| c.id == id) {
            return Err(Error::invalid(format!("duplicate component id {id}")));
        }
        components.push(Component {
            id,
            h,
            v,
            quant: quant as usize,
        });
    }

    // A single-component scan is never interleaved: its MCU is one block.
    if count == 1 {
        components[0].h = 1;
        components[0].v = 1;
    }
    let blocks: usize = components.iter().map(|c| c.h * c.v).sum();
    if blocks > MAX_BLOCKS_PER_MCU {
        return Err(Error::invalid(format!("{blocks} blocks per MCU")));
    }
    let h_max = components.iter().map(|c| c.h).max().unwrap_or(1);
    let v_max = components.iter().map(|c| c.v).max().unwrap_or(1);
    Ok(Frame {
        width,
        height,
        components,
        h_max,
        v_max,
    })
}

/// Decode one block's coefficients, dequantized, in natural order.
fn decode_block<R: BufRead>(
    bits: &mut BitReaderMsb<R>,
    unit: &mut Unit<'_>,
    coeffs: &mut [i32; 64],
) -> Result<()> {
    coeffs.fill(0);

    let cat = unit.dc.decode(bits)?;
    if cat > 11 {
        return Err(Error::invalid(format!("DC category {cat} out of range")));
    }
    let diff = extend(bits.read_bits(cat as u32)?, cat);
    unit.pred = unit.pred.wrapping_add(diff);
    coeffs[0] = unit.pred.saturating_mul(unit.quant[0] as i32);

    let mut k = 1;
    while k < 64 {
        let rs = unit.ac.decode(bits)?;
        let (run, size) = ((rs >> 4) as usize, rs & 0x0F);
        if size == 0 {
            if run != 15 {
                break;
            }
            if k + 16 > 64 {
                return Err(Error::invalid(format!(
                    "AC coefficient index {} out of range",
                    k + 15
                )));
            }
            k += 16;
            continue;
        }
        if size > 10 {
            return Err(Error::invalid(format!("AC coefficient size {size} out of range")));
        }
        k += run;
        if k > 63 {
            return Err(Error::invalid(format!("AC coefficient index {k} out of range")));
        }
        let value = extend(bits.read_bits(size as u32)?, size);
        let pos = ZIGZAG[k];
        coeffs[pos] = value * unit.quant[pos] as i32;
        k += 1;
    }
    Ok(())
}

fn expect_restart<R: BufRead>(bits: &mut BitReaderMsb<R>, n: u8) -> Result<()> {
    match bits.take_marker()? {
        Some(marker) if marker == RST0 + n => {
            bits.reset();
            log::trace!("jpeg: RST{n}");
            Ok(())
        }
        Some(marker) => Err(Error::invalid(format!(
            "expected RST{n}, found marker {marker:#04x}"
        ))),
        None => Err(Error::invalid(format!("expected RST{n}, found end of data"))),
    }
}

/// Row of component `k`'s line buffer that covers output row `py` of the MCU row.
fn plane_row<'a>(frame: &Frame, planes: &'a [Vec<u8>], strides: &[usize], k: usize, py: usize) -> &'a [u8] {
    let r = py * frame.components[k].v / frame.v_max;
    &planes[k][r * strides[k]..(r + 1) * strides[k]]
}

/// Upsample and convert the rows of MCU row `mcu_y` into `out`.
fn emit_rows(frame: &Frame, planes: &[Vec<u8>], strides: &[usize], mcu_y: usize, out: &mut [u8]) {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let mcu_h = 8 * frame.v_max;
    let channels = if frame.components.len() == 1 { 1 } else { 3 };
    let row_bytes = width * channels;

    for py in 0..mcu_h {
        let y = mcu_y * mcu_h + py;
        if y >= height {
            break;
        }
        let dst = &mut out[y * row_bytes..(y + 1) * row_bytes];
        if channels == 1 {
            let start = py * strides[0];
            dst.copy_from_slice(&planes[0][start..start + width]);
            continue;
        }

        let (ys, cbs, crs) = (
            plane_row(frame, planes, strides, 0, py),
            plane_row(frame, planes, strides, 1, py),
            plane_row(frame, planes, strides, 2, py),
        );
        let (hy, hcb, hcr) = (
            frame.components[0].h,
            frame.components[1].h,
            frame.components[2].h,
        );
        for (x, px) in dst.chunks_exact_mut(3).enumerate() {
            let (r, g, b) = ycbcr_to_rgb(
                ys[x * hy / frame.h_max],
                cbs[x * hcb / frame.h_max],
                crs[x * hcr / frame.h_max],
            );
            px[0] = r;
            px[1] = g;
            px[2] = b;
        }
    }
}

/// Read the JPEG headers up to the frame header and report the decoded
/// geometry, leaving the stream where it was.
pub fn probe<R: Read + Seek>(reader: &mut R) -> Result<ImageInfo> {
    let start = reader.stream_position()?;
    let result = Decoder::new(BufReader::new(&mut *reader)).and_then(|mut d| d.read_frame_header());
    reader.seek(SeekFrom::Start(start))?;
    result
}

fn start<R: Read>(reader: R) -> Result<(Decoder<BufReader<R>>, Vec<ScanComponent>, ImageInfo)> {
    let mut decoder = Decoder::new(BufReader::new(reader))?;
    let scan = decoder.read_scan_header()?;
    let info = decoder
        .frame
        .as_ref()
        .map(Frame::info)
        .ok_or_else(|| Error::invalid("SOS before SOF0"))?;
    Ok((decoder, scan, info))
}

/// Decode a baseline JPEG into a caller-owned buffer of exactly
/// `width * height * bytes_per_pixel` bytes (RGB, or gray for
/// single-component images).
pub fn decode_into<R: Read>(reader: R, pixels: &mut [u8]) -> Result<ImageInfo> {
    let (decoder, scan, info) = start(reader)?;
    let expected = info.buffer_len()?;
    if pixels.len() != expected {
        return Err(Error::InvalidDataLength {
            expected,
            actual: pixels.len(),
        });
    }
    decoder.decode_scan(&scan, pixels)?;
    Ok(info)
}

/// Decode a baseline JPEG into a newly allocated [`Image`].
pub fn decode<R: Read>(reader: R) -> Result<Image> {
    let (decoder, scan, info) = start(reader)?;
    let mut pixels = alloc_zeroed(info.buffer_len()?)?;
    decoder.decode_scan(&scan, &mut pixels)?;
    Ok(Image {
        width: info.width,
        height: info.height,
        color_type: info.color_type,
        pixels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg::{encode, JpegOptions, Subsampling};
    use std::io::Cursor;

    /// 8x8 gray image with one-code Huffman tables and unit quantization.
    fn minimal_jpeg(dc_symbol: u8, ac_symbol: u8, entropy: &[u8]) -> Vec<u8> {
        let mut out = vec![0xFF, SOI];
        out.extend_from_slice(&[0xFF, DQT, 0, 67, 0]);
        out.extend_from_slice(&[1u8; 64]);
        for (class, symbol) in [(0x00, dc_symbol), (0x10, ac_symbol)] {
            out.extend_from_slice(&[0xFF, DHT, 0, 20, class, 1]);
            out.extend_from_slice(&[0u8; 15]);
            out.push(symbol);
        }
        out.extend_from_slice(&[0xFF, SOF0, 0, 11, 8, 0, 8, 0, 8, 1, 1, 0x11, 0]);
        out.extend_from_slice(&[0xFF, SOS, 0, 8, 1, 1, 0x00, 0, 63, 0]);
        out.extend_from_slice(entropy);
        out.extend_from_slice(&[0xFF, EOI]);
        out
    }

    fn gradient(width: u32, height: u32) -> Vec<u8> {
        let mut pixels = Vec::new();
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[(x * 8) as u8, (y * 8) as u8, 128]);
            }
        }
        pixels
    }

    #[test]
    fn test_minimal_flat_block() {
        let image = decode(&minimal_jpeg(0, 0x00, &[0x00])[..]).unwrap();
        assert_eq!((image.width, image.height), (8, 8));
        assert_eq!(image.color_type, ColorType::Gray);
        assert!(image.pixels.iter().all(|&p| p == 128));
    }

    #[test]
    fn test_dc_category_out_of_range() {
        let err = decode(&minimal_jpeg(12, 0x00, &[0x00])[..]).unwrap_err();
        assert!(err.to_string().contains("DC category 12"), "{err}");
    }

    #[test]
    fn test_ac_index_out_of_range() {
        // ZRL four times runs past coefficient 63.
        let err = decode(&minimal_jpeg(0, 0xF0, &[0x00])[..]).unwrap_err();
        assert!(err.to_string().contains("AC coefficient index"), "{err}");
    }

    #[test]
    fn test_missing_tables_before_sos() {
        let mut data = minimal_jpeg(0, 0x00, &[0x00]);
        // Drop the DQT segment (69 bytes after SOI).
        data.drain(2..2 + 69);
        let err = decode(&data[..]).unwrap_err();
        assert!(err.to_string().contains("quantization table 0"), "{err}");

        let mut data = minimal_jpeg(0, 0x00, &[0x00]);
        // Drop the AC DHT segment.
        data.drain(2 + 69 + 22..2 + 69 + 44);
        let err = decode(&data[..]).unwrap_err();
        assert!(err.to_string().contains("AC Huffman table 0"), "{err}");
    }

    #[test]
    fn test_rejects_progressive_and_bad_sampling() {
        let mut data = minimal_jpeg(0, 0x00, &[0x00]);
        let sof = data.windows(2).position(|w| w == [0xFF, SOF0]).unwrap();
        data[sof + 1] = 0xC2;
        assert!(matches!(decode(&data[..]), Err(Error::UnsupportedDecode(_))));

        for sampling in [0x01u8, 0x50] {
            let mut data = minimal_jpeg(0, 0x00, &[0x00]);
            data[sof + 2 + 9] = sampling;
            let err = decode(&data[..]).unwrap_err();
            assert!(err.to_string().contains("sampling factors"), "{err}");
        }
    }

    #[test]
    fn test_roundtrip_gray() {
        let pixels: Vec<u8> = (0..16 * 16).map(|i| (i % 16 * 12 + i / 16 * 3) as u8).collect();
        let opts = JpegOptions::builder(16, 16)
            .color_type(ColorType::Gray)
            .quality(100)
            .build();
        let jpeg = encode(&pixels, &opts).unwrap();
        let image = decode(&jpeg[..]).unwrap();
        assert_eq!(image.color_type, ColorType::Gray);
        for (a, b) in image.pixels.iter().zip(&pixels) {
            assert!((*a as i32 - *b as i32).abs() <= 3, "{a} vs {b}");
        }
    }

    #[test]
    fn test_420_decodes_full_size_rgb() {
        let (w, h) = (24, 20);
        let pixels = gradient(w, h);
        let opts = JpegOptions::builder(w, h)
            .color_type(ColorType::Rgb)
            .quality(95)
            .subsampling(Subsampling::S420)
            .build();
        let jpeg = encode(&pixels, &opts).unwrap();
        let image = decode(&jpeg[..]).unwrap();
        assert_eq!(image.color_type, ColorType::Rgb);
        assert_eq!(image.pixels.len(), (w * h * 3) as usize);
        let mean_err: f64 = image
            .pixels
            .iter()
            .zip(&pixels)
            .map(|(a, b)| (*a as f64 - *b as f64).abs())
            .sum::<f64>()
            / pixels.len() as f64;
        assert!(mean_err < 6.0, "mean error {mean_err}");
    }

    #[test]
    fn test_restart_intervals_decode_identically() {
        let pixels = gradient(40, 24);
        let base = JpegOptions::builder(40, 24).color_type(ColorType::Rgb).quality(80);
        let plain = encode(&pixels, &base.clone().build()).unwrap();
        let restarted = encode(&pixels, &base.restart_interval(Some(1)).build()).unwrap();
        assert_ne!(plain, restarted);
        assert_eq!(
            decode(&plain[..]).unwrap().pixels,
            decode(&restarted[..]).unwrap().pixels
        );
    }

    #[test]
    fn test_wrong_restart_marker() {
        let pixels = gradient(16, 8);
        let opts = JpegOptions::builder(16, 8)
            .color_type(ColorType::Rgb)
            .restart_interval(Some(1))
            .build();
        let mut jpeg = encode(&pixels, &opts).unwrap();
        let sos = jpeg.windows(2).position(|w| w == [0xFF, SOS]).unwrap();
        let rst = sos + jpeg[sos..].windows(2).position(|w| w == [0xFF, RST0]).unwrap();
        jpeg[rst + 1] = RST0 + 3;
        let err = decode(&jpeg[..]).unwrap_err();
        assert!(err.to_string().contains("expected RST0"), "{err}");
    }

    #[test]
    fn test_probe_restores_position() {
        let data = minimal_jpeg(0, 0x00, &[0x00]);
        let mut cursor = Cursor::new(data);
        let info = probe(&mut cursor).unwrap();
        assert_eq!((info.width, info.height, info.color_type), (8, 8, ColorType::Gray));
        assert_eq!(cursor.position(), 0);
        assert!(decode_into(&mut cursor, &mut [0u8; 63]).is_err());
    }
}
