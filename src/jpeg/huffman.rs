//! JPEG Huffman coding.
//!
//! Tables are described the way DHT segments carry them: a count of codes per
//! length 1..=16 followed by the symbols in code order. Codes are assigned
//! canonically from those counts, so the same description serves the encoder
//! and the decoder.

use std::io::BufRead;

use crate::bits::{BitReaderMsb, BitWriterMsb};
use crate::error::{Error, Result};

use super::quantize::ZIGZAG;

/// A Huffman table as transmitted in a DHT segment.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    /// Number of codes of each length 1..=16.
    pub bits: [u8; 16],
    /// Symbols in order of increasing code.
    pub values: &'static [u8],
}

/// Annex K.3 luminance DC table.
pub const DC_LUMINANCE: TableSpec = TableSpec {
    bits: [0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0],
    values: &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
};

/// Annex K.3 chrominance DC table.
pub const DC_CHROMINANCE: TableSpec = TableSpec {
    bits: [0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0],
    values: &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
};

/// Annex K.3 luminance AC table.
pub const AC_LUMINANCE: TableSpec = TableSpec {
    bits: [0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 125],
    values: &[
        0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12, 0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61,
        0x07, 0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xa1, 0x08, 0x23, 0x42, 0xb1, 0xc1, 0x15, 0x52,
        0xd1, 0xf0, 0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0a, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x25,
        0x26, 0x27, 0x28, 0x29, 0x2a, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3a, 0x43, 0x44, 0x45,
        0x46, 0x47, 0x48, 0x49, 0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x63, 0x64,
        0x65, 0x66, 0x67, 0x68, 0x69, 0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a, 0x83,
        0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99,
        0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4, 0xb5, 0xb6,
        0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xd2, 0xd3,
        0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe1, 0xe2, 0xe3, 0xe4, 0xe5, 0xe6, 0xe7, 0xe8,
        0xe9, 0xea, 0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8, 0xf9, 0xfa,
    ],
};

/// Annex K.3 chrominance AC table.
pub const AC_CHROMINANCE: TableSpec = TableSpec {
    bits: [0, 2, 1, 2, 4, 4, 3, 4, 7, 5, 4, 4, 0, 1, 2, 119],
    values: &[
        0x00, 0x01, 0x02, 0x03, 0x11, 0x04, 0x05, 0x21, 0x31, 0x06, 0x12, 0x41, 0x51, 0x07, 0x61,
        0x71, 0x13, 0x22, 0x32, 0x81, 0x08, 0x14, 0x42, 0x91, 0xa1, 0xb1, 0xc1, 0x09, 0x23, 0x33,
        0x52, 0xf0, 0x15, 0x62, 0x72, 0xd1, 0x0a, 0x16, 0x24, 0x34, 0xe1, 0x25, 0xf1, 0x17, 0x18,
        0x19, 0x1a, 0x26, 0x27, 0x28, 0x29, 0x2a, 0x35, 0x36, 0x37, 0x38, 0x39, 0x3a, 0x43, 0x44,
        0x45, 0x46, 0x47, 0x48, 0x49, 0x4a, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x63,
        0x64, 0x65, 0x66, 0x67, 0x68, 0x69, 0x6a, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a,
        0x82, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8a, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97,
        0x98, 0x99, 0x9a, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7, 0xa8, 0xa9, 0xaa, 0xb2, 0xb3, 0xb4,
        0xb5, 0xb6, 0xb7, 0xb8, 0xb9, 0xba, 0xc2, 0xc3, 0xc4, 0xc5, 0xc6, 0xc7, 0xc8, 0xc9, 0xca,
        0xd2, 0xd3, 0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd9, 0xda, 0xe2, 0xe3, 0xe4, 0xe5, 0xe6, 0xe7,
        0xe8, 0xe9, 0xea, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8, 0xf9, 0xfa,
    ],
};

/// Longest JPEG Huffman code.
pub const MAX_CODE_LEN: usize = 16;

/// Run of sixteen zero coefficients.
const ZRL: u8 = 0xF0;
/// End of block.
const EOB: u8 = 0x00;

/// Walk the canonical code assignment for `bits`, calling `f(symbol_index,
/// code, length)` for every code. Fails if the lengths are over-subscribed.
fn for_each_code(bits: &[u8; 16], mut f: impl FnMut(usize, u16, u8)) -> Result<usize> {
    let mut code = 0u32;
    let mut index = 0;
    for (i, &count) in bits.iter().enumerate() {
        let len = i + 1;
        for _ in 0..count {
            if code >= 1 << len {
                return Err(Error::invalid("over-subscribed Huffman table"));
            }
            f(index, code as u16, len as u8);
            code += 1;
            index += 1;
        }
        code <<= 1;
    }
    Ok(index)
}

#[derive(Debug, Clone, Copy, Default)]
struct HuffCode {
    code: u16,
    length: u8,
}

/// Symbol-indexed code table for the encoder.
#[derive(Debug, Clone)]
pub struct EncodeTable {
    spec: TableSpec,
    codes: [HuffCode; 256],
}

impl EncodeTable {
    /// Build the code table for `spec`.
    pub fn new(spec: TableSpec) -> Result<Self> {
        let mut codes = [HuffCode::default(); 256];
        let count = for_each_code(&spec.bits, |i, code, length| {
            if let Some(&symbol) = spec.values.get(i) {
                codes[symbol as usize] = HuffCode { code, length };
            }
        })?;
        if count != spec.values.len() {
            return Err(Error::invalid("Huffman table symbol count mismatch"));
        }
        Ok(Self { spec, codes })
    }

    /// The table description, for writing a DHT segment.
    pub fn spec(&self) -> &TableSpec {
        &self.spec
    }

    #[inline]
    fn write(&self, writer: &mut BitWriterMsb, symbol: u8) {
        let c = self.codes[symbol as usize];
        debug_assert!(c.length > 0, "symbol {symbol:#04x} has no code");
        writer.write_bits(c.code as u32, c.length);
    }
}

/// The four standard tables used by the baseline encoder.
#[derive(Debug, Clone)]
pub struct HuffmanTables {
    pub dc_luminance: EncodeTable,
    pub ac_luminance: EncodeTable,
    pub dc_chrominance: EncodeTable,
    pub ac_chrominance: EncodeTable,
}

impl HuffmanTables {
    /// Build the Annex K tables.
    pub fn standard() -> Result<Self> {
        Ok(Self {
            dc_luminance: EncodeTable::new(DC_LUMINANCE)?,
            ac_luminance: EncodeTable::new(AC_LUMINANCE)?,
            dc_chrominance: EncodeTable::new(DC_CHROMINANCE)?,
            ac_chrominance: EncodeTable::new(AC_CHROMINANCE)?,
        })
    }

    /// DC and AC tables for luminance (`true`) or chrominance.
    pub fn pair(&self, luminance: bool) -> (&EncodeTable, &EncodeTable) {
        if luminance {
            (&self.dc_luminance, &self.ac_luminance)
        } else {
            (&self.dc_chrominance, &self.ac_chrominance)
        }
    }
}

/// Magnitude category: the number of bits needed for `|value|`.
#[inline]
pub fn category(value: i16) -> u8 {
    (16 - value.unsigned_abs().leading_zeros()) as u8
}

/// Category and amplitude bits for `value`. Negative values are stored as
/// `value - 1` in `category` bits (one's complement of the magnitude).
#[inline]
fn encode_value(value: i16) -> (u8, u16) {
    let cat = category(value);
    let bits = if value < 0 {
        (value as i32 - 1) as u16 & ((1u32 << cat) - 1) as u16
    } else {
        value as u16
    };
    (cat, bits)
}

/// Sign-extend amplitude `bits` read for category `cat`.
#[inline]
pub fn extend(bits: u32, cat: u8) -> i32 {
    if cat == 0 {
        return 0;
    }
    let bits = bits as i32;
    if bits < 1 << (cat - 1) {
        bits - (1 << cat) + 1
    } else {
        bits
    }
}

/// Entropy code one quantized block (natural order). Returns the DC value,
/// which becomes the predictor for the next block of the component.
pub fn encode_block(
    writer: &mut BitWriterMsb,
    block: &[i16; 64],
    prev_dc: i16,
    dc_table: &EncodeTable,
    ac_table: &EncodeTable,
) -> i16 {
    let dc = block[0];
    let (cat, bits) = encode_value(dc.wrapping_sub(prev_dc));
    dc_table.write(writer, cat);
    writer.write_bits(bits as u32, cat);

    let mut run = 0u8;
    for &pos in &ZIGZAG[1..] {
        let coef = block[pos];
        if coef == 0 {
            run += 1;
            continue;
        }
        while run >= 16 {
            ac_table.write(writer, ZRL);
            run -= 16;
        }
        let (cat, bits) = encode_value(coef);
        ac_table.write(writer, (run << 4) | cat);
        writer.write_bits(bits as u32, cat);
        run = 0;
    }
    if run > 0 {
        ac_table.write(writer, EOB);
    }
    dc
}

const FAST_BITS: u32 = 9;

/// Decoding table built from a DHT segment.
///
/// Codes up to 9 bits resolve with one lookup; longer codes fall back to a
/// per-length search over `max_code`.
#[derive(Debug, Clone)]
pub struct DecodeTable {
    /// `(length << 8) | symbol`, or 0 when the prefix needs the slow path.
    fast: Vec<u16>,
    /// Largest code of each length, or -1 when there is none.
    max_code: [i32; MAX_CODE_LEN + 1],
    /// Added to a code of the given length to index `values`.
    val_offset: [i32; MAX_CODE_LEN + 1],
    values: Vec<u8>,
}

impl DecodeTable {
    /// Build from code counts per length and the symbols in code order.
    pub fn new(bits: &[u8; 16], values: &[u8]) -> Result<Self> {
        let total: usize = bits.iter().map(|&b| b as usize).sum();
        if total == 0 || total > 256 || total != values.len() {
            return Err(Error::invalid(format!(
                "Huffman table declares {total} codes for {} symbols",
                values.len()
            )));
        }

        let mut fast = vec![0u16; 1 << FAST_BITS];
        let mut max_code = [-1i32; MAX_CODE_LEN + 1];
        let mut val_offset = [0i32; MAX_CODE_LEN + 1];
        for_each_code(bits, |i, code, length| {
            let len = length as usize;
            if max_code[len] < 0 {
                val_offset[len] = i as i32 - code as i32;
            }
            max_code[len] = code as i32;
            if length as u32 <= FAST_BITS {
                let shift = FAST_BITS - length as u32;
                let start = (code as usize) << shift;
                let entry = ((length as u16) << 8) | values[i] as u16;
                fast[start..start + (1 << shift)].fill(entry);
            }
        })?;

        Ok(Self {
            fast,
            max_code,
            val_offset,
            values: values.to_vec(),
        })
    }

    /// Decode one symbol.
    #[inline]
    pub fn decode<R: BufRead>(&self, reader: &mut BitReaderMsb<R>) -> Result<u8> {
        let entry = self.fast[reader.peek(FAST_BITS)? as usize];
        if entry != 0 {
            reader.consume(u32::from(entry >> 8))?;
            return Ok(entry as u8);
        }
        let window = reader.peek(MAX_CODE_LEN as u32)?;
        for len in FAST_BITS as usize + 1..=MAX_CODE_LEN {
            let code = (window >> (MAX_CODE_LEN - len)) as i32;
            if code <= self.max_code[len] {
                reader.consume(len as u32)?;
                let index = (code + self.val_offset[len]) as usize;
                return self
                    .values
                    .get(index)
                    .copied()
                    .ok_or_else(|| Error::invalid("corrupt Huffman table"));
            }
        }
        Err(Error::invalid("invalid Huffman code"))
    }
}
