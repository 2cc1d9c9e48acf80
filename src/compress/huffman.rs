//! Huffman coding for DEFLATE.
//!
//! Encoding side: [`build_lengths`] turns symbol frequencies into code lengths
//! bounded by a maximum depth, and [`assign_codes`] turns lengths into
//! canonical codes. Decoding side: [`DecodeTable`] maps LSB-first stream bits
//! back to symbols with a direct lookup for short codes and a canonical walk
//! for long ones.

use crate::error::{Error, Result};

/// Maximum code length for literal/length and distance codes.
pub const MAX_CODE_LENGTH: u8 = 15;

/// Maximum code length for the code length alphabet.
pub const MAX_CODE_LENGTH_BITS: u8 = 7;

/// A canonical Huffman code, most significant bit first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HuffmanCode {
    /// Code value.
    pub code: u16,
    /// Code length in bits; zero for unused symbols.
    pub length: u8,
}

impl HuffmanCode {
    /// The same code with its bits reversed, ready for an LSB-first writer.
    #[inline]
    pub const fn reversed(self) -> Self {
        Self {
            code: reverse_bits(self.code, self.length),
            length: self.length,
        }
    }
}

/// Reverse the low `length` bits of `code`.
#[inline]
pub const fn reverse_bits(code: u16, length: u8) -> u16 {
    if length == 0 {
        return 0;
    }
    code.reverse_bits() >> (16 - length as u32)
}

/// Canonical code assignment (RFC 1951 section 3.2.2).
///
/// Codes of equal length are consecutive in symbol order and shorter codes
/// are numerically smaller prefixes.
pub fn assign_codes(lengths: &[u8]) -> Vec<HuffmanCode> {
    let mut bl_count = [0u16; 16];
    for &len in lengths {
        bl_count[len as usize] += 1;
    }
    bl_count[0] = 0;

    let mut next_code = [0u16; 16];
    let mut code = 0u16;
    for bits in 1..16 {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
    }

    lengths
        .iter()
        .map(|&len| {
            if len == 0 {
                return HuffmanCode::default();
            }
            let code = next_code[len as usize];
            next_code[len as usize] += 1;
            HuffmanCode { code, length: len }
        })
        .collect()
}

/// Build bounded-depth code lengths from symbol frequencies.
///
/// The construction is deterministic: leaves are ordered by (frequency,
/// symbol) and ties between a leaf and an internal node go to the leaf, so
/// equal frequency tables always produce identical lengths. When fewer than
/// two symbols occur, the lowest unused symbols are added so the result is a
/// complete two-code prefix code. Depths beyond `max_len` are folded back by
/// moving leaves from the deepest level up, keeping the code complete.
pub fn build_lengths(freqs: &[u32], max_len: u8) -> Vec<u8> {
    let n = freqs.len();
    let mut lengths = vec![0u8; n];

    let mut used: Vec<usize> = (0..n).filter(|&s| freqs[s] > 0).collect();
    if used.is_empty() {
        return lengths;
    }
    let mut weights: Vec<u64> = freqs.iter().map(|&f| f as u64).collect();
    let mut filler = 0;
    while used.len() < 2 && n >= 2 {
        while weights[filler] > 0 {
            filler += 1;
        }
        weights[filler] = 1;
        used.push(filler);
    }
    if used.len() == 1 {
        lengths[used[0]] = 1;
        return lengths;
    }

    used.sort_by_key(|&s| (weights[s], s));

    // Two-queue construction. Nodes 0..leaves are leaves in sorted order,
    // internal nodes are appended after them in creation order, which is
    // already ascending by weight.
    let leaves = used.len();
    let mut weight: Vec<u64> = used.iter().map(|&s| weights[s]).collect();
    let mut parent: Vec<usize> = vec![usize::MAX; leaves];
    weight.reserve(leaves - 1);
    parent.reserve(leaves - 1);

    let mut next_leaf = 0;
    let mut next_node = leaves;
    for _ in 0..leaves - 1 {
        let a = take_min(&weight, leaves, &mut next_leaf, &mut next_node);
        let b = take_min(&weight, leaves, &mut next_leaf, &mut next_node);
        let id = weight.len();
        weight.push(weight[a] + weight[b]);
        parent.push(usize::MAX);
        parent[a] = id;
        parent[b] = id;
    }

    // Depths: the root is the last node; parents always have larger ids.
    let total = weight.len();
    let mut depth = vec![0u32; total];
    for id in (0..total - 1).rev() {
        depth[id] = depth[parent[id]] + 1;
    }

    let max_len = max_len as usize;
    if depth[..leaves].iter().all(|&d| d as usize <= max_len) {
        for (i, &s) in used.iter().enumerate() {
            lengths[s] = depth[i] as u8;
        }
        return lengths;
    }

    let mut bl_count = vec![0u64; max_len + 1];
    for &d in &depth[..leaves] {
        bl_count[(d as usize).min(max_len)] += 1;
    }

    // Clamping made the code over-subscribed. Each step moves a leaf one
    // level deeper to pair with a clamped leaf, removing one unit of excess
    // (in units of 2^-max_len).
    let kraft: u64 = (1..=max_len).map(|b| bl_count[b] << (max_len - b)).sum();
    let mut excess = kraft - (1u64 << max_len);
    while excess > 0 {
        let mut bits = max_len - 1;
        while bl_count[bits] == 0 {
            bits -= 1;
        }
        bl_count[bits] -= 1;
        bl_count[bits + 1] += 2;
        bl_count[max_len] -= 1;
        excess -= 1;
    }

    // Hand out the corrected lengths: least frequent symbols get the longest.
    let mut order = 0;
    for bits in (1..=max_len).rev() {
        for _ in 0..bl_count[bits] {
            lengths[used[order]] = bits as u8;
            order += 1;
        }
    }
    lengths
}

fn take_min(weight: &[u64], leaves: usize, next_leaf: &mut usize, next_node: &mut usize) -> usize {
    let node_ready = *next_node < weight.len();
    let leaf_ready = *next_leaf < leaves;
    if leaf_ready && (!node_ready || weight[*next_leaf] <= weight[*next_node]) {
        *next_leaf += 1;
        *next_leaf - 1
    } else {
        *next_node += 1;
        *next_node - 1
    }
}

/// Build canonical codes straight from frequencies.
pub fn build_codes(freqs: &[u32], max_len: u8) -> Vec<HuffmanCode> {
    assign_codes(&build_lengths(freqs, max_len))
}

const fn fixed_literal_lengths() -> [u8; 288] {
    let mut lengths = [0u8; 288];
    let mut i = 0;
    while i < 288 {
        lengths[i] = match i {
            0..=143 => 8,
            144..=255 => 9,
            256..=279 => 7,
            _ => 8,
        };
        i += 1;
    }
    lengths
}

const fn canonical_reversed<const N: usize>(lengths: &[u8; N]) -> [HuffmanCode; N] {
    let mut bl_count = [0u16; 16];
    let mut i = 0;
    while i < N {
        bl_count[lengths[i] as usize] += 1;
        i += 1;
    }
    bl_count[0] = 0;
    let mut next_code = [0u16; 16];
    let mut code = 0u16;
    let mut bits = 1;
    while bits < 16 {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
        bits += 1;
    }
    let mut codes = [HuffmanCode { code: 0, length: 0 }; N];
    let mut sym = 0;
    while sym < N {
        let len = lengths[sym];
        if len > 0 {
            codes[sym] = HuffmanCode {
                code: reverse_bits(next_code[len as usize], len),
                length: len,
            };
            next_code[len as usize] += 1;
        }
        sym += 1;
    }
    codes
}

/// Code lengths of the fixed literal/length code (RFC 1951 section 3.2.6).
pub const FIXED_LITERAL_LENGTHS: [u8; 288] = fixed_literal_lengths();

/// Code lengths of the fixed distance code, including unused symbols 30 and 31.
pub const FIXED_DISTANCE_LENGTHS: [u8; 32] = [5; 32];

/// Fixed literal/length codes, bit-reversed for LSB-first output.
pub static FIXED_LITERAL_CODES: [HuffmanCode; 288] = canonical_reversed(&FIXED_LITERAL_LENGTHS);

/// Fixed distance codes, bit-reversed for LSB-first output.
pub static FIXED_DISTANCE_CODES: [HuffmanCode; 32] = canonical_reversed(&FIXED_DISTANCE_LENGTHS);

/// Bits resolved by one direct lookup.
const FAST_BITS: u32 = 9;
const FAST_SIZE: usize = 1 << FAST_BITS;
const FAST_MASK: u64 = FAST_SIZE as u64 - 1;

/// Which alphabet a decode table serves; decides whether an incomplete code is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// The 19-symbol code length alphabet: must be complete.
    CodeLengths,
    /// Literal/length or distance alphabet: may be a single one-bit code.
    Symbols,
}

/// Decoder for an LSB-first canonical Huffman code.
///
/// Codes of up to nine bits resolve in one lookup keyed by the next nine
/// stream bits; longer codes fall back to a canonical walk over the count
/// table, one bit at a time.
#[derive(Debug, Clone)]
pub struct DecodeTable {
    /// `(symbol << 4) | length`, zero when the code is longer than `FAST_BITS`.
    fast: Vec<u16>,
    counts: [u16; 16],
    /// Symbols ordered by (length, symbol).
    symbols: Vec<u16>,
    max_len: u32,
}

impl DecodeTable {
    /// Build a table from per-symbol code lengths.
    pub fn from_lengths(lengths: &[u8], kind: TableKind) -> Result<Self> {
        let mut counts = [0u16; 16];
        for &len in lengths {
            if len as usize > MAX_CODE_LENGTH as usize {
                return Err(Error::invalid("code length exceeds 15 bits"));
            }
            counts[len as usize] += 1;
        }
        counts[0] = 0;

        let max_len = (1..16).rev().find(|&l| counts[l] > 0).unwrap_or(0) as u32;

        let mut left: i32 = 1;
        for &count in &counts[1..] {
            left <<= 1;
            left -= count as i32;
            if left < 0 {
                return Err(Error::invalid("over-subscribed Huffman code lengths"));
            }
        }
        if max_len > 0 && left > 0 && (kind == TableKind::CodeLengths || max_len != 1) {
            return Err(Error::invalid("incomplete Huffman code lengths"));
        }

        let mut offsets = [0usize; 16];
        for len in 1..15 {
            offsets[len + 1] = offsets[len] + counts[len] as usize;
        }
        let mut symbols = vec![0u16; offsets[15] + counts[15] as usize];
        for (sym, &len) in lengths.iter().enumerate() {
            if len > 0 {
                symbols[offsets[len as usize]] = sym as u16;
                offsets[len as usize] += 1;
            }
        }

        let mut fast = vec![0u16; FAST_SIZE];
        let codes = assign_codes(lengths);
        for (sym, code) in codes.iter().enumerate() {
            let len = code.length as u32;
            if len == 0 || len > FAST_BITS {
                continue;
            }
            let entry = ((sym as u16) << 4) | len as u16;
            let mut index = reverse_bits(code.code, code.length) as usize;
            while index < FAST_SIZE {
                fast[index] = entry;
                index += 1 << len;
            }
        }

        Ok(Self {
            fast,
            counts,
            symbols,
            max_len,
        })
    }

    /// True when the table holds no codes at all.
    pub fn is_empty(&self) -> bool {
        self.max_len == 0
    }

    /// Decode one symbol from `hold`, of which the low `available` bits are
    /// real stream bits.
    ///
    /// Returns `Ok(Some((symbol, length)))` on success and `Ok(None)` when the
    /// code may be longer than `available`; the caller should supply more
    /// bits and retry. A bit pattern that matches no code within the longest
    /// code length is an error.
    #[inline]
    pub fn decode(&self, hold: u64, available: u32) -> Result<Option<(u16, u32)>> {
        let entry = self.fast[(hold & FAST_MASK) as usize];
        if entry != 0 {
            let len = (entry & 0xF) as u32;
            return Ok((len <= available).then_some((entry >> 4, len)));
        }
        if self.max_len == 0 {
            return Err(Error::invalid("symbol decoded from an empty Huffman code"));
        }

        let mut code: u32 = 0;
        let mut first: u32 = 0;
        let mut index: u32 = 0;
        for len in 1..=self.max_len {
            if len > available {
                return Ok(None);
            }
            code |= ((hold >> (len - 1)) & 1) as u32;
            let count = self.counts[len as usize] as u32;
            if code < first + count {
                let symbol = self.symbols[(index + code - first) as usize];
                return Ok(Some((symbol, len)));
            }
            index += count;
            first = (first + count) << 1;
            code <<= 1;
        }
        Err(Error::invalid("invalid Huffman code"))
    }
}
