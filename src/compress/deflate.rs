//! DEFLATE compression (RFC 1951) with an optional zlib envelope (RFC 1950).
//!
//! [`Deflater`] is a resumable compressor: each call consumes what input it
//! can, writes what output fits, and remembers everything else. Tokens from
//! the LZ77 parser collect in a block buffer; when it fills (or a flush asks
//! for it) the block is written as stored, fixed-Huffman or dynamic-Huffman,
//! whichever is smallest.

use crate::bits::BitWriter;
use crate::compress::huffman::{
    self, HuffmanCode, FIXED_DISTANCE_CODES, FIXED_DISTANCE_LENGTHS, FIXED_LITERAL_CODES,
    FIXED_LITERAL_LENGTHS,
};
use crate::compress::lz77::{
    Parse, ParseMode, SlidingWindow, Token, TokenSink, MAX_MATCH_LENGTH, MAX_STORED,
    MIN_MATCH_LENGTH,
};
use crate::compress::{
    adler32, Adler32, Flush, Format, Status, Strategy, StreamResult, CODE_LENGTH_ORDER,
    DIST_BASE, DIST_EXTRA, LENGTH_BASE, LENGTH_EXTRA,
};
use crate::error::{alloc_zeroed, Error, Result};

/// Literal/length alphabet size (0-285).
const L_CODES: usize = 286;
/// Distance alphabet size.
const D_CODES: usize = 30;
/// Code length alphabet size.
const BL_CODES: usize = 19;
const END_BLOCK: usize = 256;

/// Tokens buffered per block.
const SYM_BUFFER: usize = 16384;

/// Length code index (0-28) for each match length 3-258.
const LENGTH_CODE: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut code = 0;
    while code < 29 {
        let base = LENGTH_BASE[code] as usize - MIN_MATCH_LENGTH;
        let span = 1usize << LENGTH_EXTRA[code];
        let mut i = 0;
        while i < span && base + i < 256 {
            table[base + i] = code as u8;
            i += 1;
        }
        code += 1;
    }
    table
};

/// Distance code for `dist - 1`: direct below 256, else indexed by `(dist - 1) >> 7`.
const DIST_CODE: [u8; 512] = {
    let mut table = [0u8; 512];
    let mut code = 0;
    while code < D_CODES {
        let base = DIST_BASE[code] as usize - 1;
        let span = 1usize << DIST_EXTRA[code];
        let mut i = 0;
        while i < span {
            let d = base + i;
            if d < 256 {
                table[d] = code as u8;
            } else {
                table[256 + (d >> 7)] = code as u8;
            }
            i += 1;
        }
        code += 1;
    }
    table
};

/// Length code index (0-28) for a match length.
#[inline]
fn length_code(length: u16) -> usize {
    debug_assert!(
        (MIN_MATCH_LENGTH as u16..=MAX_MATCH_LENGTH as u16).contains(&length),
        "Invalid length: {}",
        length
    );
    LENGTH_CODE[length as usize - MIN_MATCH_LENGTH] as usize
}

/// Distance code (0-29) for a match distance.
#[inline]
fn distance_code(distance: u16) -> usize {
    let d = distance as usize - 1;
    if d < 256 {
        DIST_CODE[d] as usize
    } else {
        DIST_CODE[256 + (d >> 7)] as usize
    }
}

/// Upper bound on the compressed size of `len` input bytes, envelope included.
pub fn compress_bound(len: usize) -> usize {
    len + (len >> 12) + (len >> 14) + (len >> 25) + 13 + 6
}

/// Tokens of the block being built, with their symbol frequencies.
struct BlockBuffer {
    tokens: Vec<Token>,
    lit_freq: [u32; L_CODES],
    dist_freq: [u32; D_CODES],
}

impl BlockBuffer {
    fn new() -> Result<Self> {
        let mut tokens = Vec::new();
        tokens
            .try_reserve_exact(SYM_BUFFER)
            .map_err(|_| Error::OutOfMemory(SYM_BUFFER * std::mem::size_of::<Token>()))?;
        Ok(Self {
            tokens,
            lit_freq: [0; L_CODES],
            dist_freq: [0; D_CODES],
        })
    }

    fn clear(&mut self) {
        self.tokens.clear();
        self.lit_freq = [0; L_CODES];
        self.dist_freq = [0; D_CODES];
    }

    fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl TokenSink for BlockBuffer {
    #[inline]
    fn push(&mut self, token: Token) -> bool {
        match token {
            Token::Literal(byte) => self.lit_freq[byte as usize] += 1,
            Token::Match { length, distance } => {
                self.lit_freq[257 + length_code(length)] += 1;
                self.dist_freq[distance_code(distance)] += 1;
            }
        }
        self.tokens.push(token);
        self.tokens.len() >= SYM_BUFFER - 1
    }
}

/// Bits needed to send the block's tokens plus end-of-block with the given lengths.
fn data_bits(block: &BlockBuffer, lit_lengths: &[u8], dist_lengths: &[u8]) -> u64 {
    let mut bits = lit_lengths[END_BLOCK] as u64;
    for (sym, &freq) in block.lit_freq.iter().enumerate() {
        if freq == 0 {
            continue;
        }
        let mut per = lit_lengths[sym] as u64;
        if sym > END_BLOCK {
            per += LENGTH_EXTRA[sym - 257] as u64;
        }
        bits += freq as u64 * per;
    }
    for (code, &freq) in block.dist_freq.iter().enumerate() {
        bits += freq as u64 * (dist_lengths[code] as u64 + DIST_EXTRA[code] as u64);
    }
    bits
}

/// Code-length sequence entry: (symbol 0-18, extra value, extra bit count).
type ClSymbol = (u8, u8, u8);

/// Huffman codes chosen for one dynamic block, with the header that describes them.
struct DynamicTrees {
    lit: Vec<HuffmanCode>,
    dist: Vec<HuffmanCode>,
    cl: Vec<HuffmanCode>,
    cl_lengths: Vec<u8>,
    encoded_lengths: Vec<ClSymbol>,
    hlit: usize,
    hdist: usize,
    hclen: usize,
    /// Block size in bits, header included.
    bits: u64,
}

impl DynamicTrees {
    fn build(block: &BlockBuffer) -> Self {
        let mut lit_freq = block.lit_freq;
        lit_freq[END_BLOCK] = 1;
        let lit_lengths = huffman::build_lengths(&lit_freq, huffman::MAX_CODE_LENGTH);
        let mut dist_lengths = huffman::build_lengths(&block.dist_freq, huffman::MAX_CODE_LENGTH);
        if dist_lengths.iter().all(|&l| l == 0) {
            // No matches: still describe a complete two-code distance tree.
            dist_lengths[0] = 1;
            dist_lengths[1] = 1;
        }

        let hlit = last_nonzero(&lit_lengths).max(257);
        let hdist = last_nonzero(&dist_lengths).max(1);

        let mut cl_freq = [0u32; BL_CODES];
        let encoded_lengths =
            rle_code_lengths(&lit_lengths[..hlit], &dist_lengths[..hdist], &mut cl_freq);
        let cl_lengths = huffman::build_lengths(&cl_freq, huffman::MAX_CODE_LENGTH_BITS);

        let hclen = CODE_LENGTH_ORDER
            .iter()
            .rposition(|&sym| cl_lengths[sym] != 0)
            .map_or(4, |i| (i + 1).max(4));

        let mut bits = 3 + 5 + 5 + 4 + 3 * hclen as u64;
        for &(sym, _, extra) in &encoded_lengths {
            bits += cl_lengths[sym as usize] as u64 + extra as u64;
        }
        bits += data_bits(block, &lit_lengths, &dist_lengths);

        Self {
            lit: reversed_codes(&lit_lengths),
            dist: reversed_codes(&dist_lengths),
            cl: reversed_codes(&cl_lengths),
            cl_lengths,
            encoded_lengths,
            hlit,
            hdist,
            hclen,
            bits,
        }
    }

    fn write_header(&self, writer: &mut BitWriter, last: bool) {
        writer.write_bits(last as u32, 1);
        writer.write_bits(2, 2);
        writer.write_bits((self.hlit - 257) as u32, 5);
        writer.write_bits((self.hdist - 1) as u32, 5);
        writer.write_bits((self.hclen - 4) as u32, 4);
        for &sym in CODE_LENGTH_ORDER.iter().take(self.hclen) {
            writer.write_bits(self.cl_lengths[sym] as u32, 3);
        }
        for &(sym, extra_value, extra_bits) in &self.encoded_lengths {
            let code = self.cl[sym as usize];
            writer.write_bits(code.code as u32, code.length);
            if extra_bits > 0 {
                writer.write_bits(extra_value as u32, extra_bits);
            }
        }
    }
}

fn reversed_codes(lengths: &[u8]) -> Vec<HuffmanCode> {
    huffman::assign_codes(lengths)
        .into_iter()
        .map(HuffmanCode::reversed)
        .collect()
}

fn last_nonzero(lengths: &[u8]) -> usize {
    lengths.iter().rposition(|&l| l != 0).map_or(0, |i| i + 1)
}

/// RLE encode literal/dist code lengths and collect code length code frequencies.
///
/// Repeats of a non-zero length use code 16 (3-6 copies of the previous
/// length); runs of zeros use 17 (3-10) or 18 (11-138). The two sequences are
/// encoded as one, so runs may cross from literal to distance lengths.
fn rle_code_lengths(lit_lengths: &[u8], dist_lengths: &[u8], cl_freq: &mut [u32]) -> Vec<ClSymbol> {
    let seq: Vec<u8> = lit_lengths.iter().chain(dist_lengths).copied().collect();

    let mut encoded = Vec::new();
    let mut i = 0;
    while i < seq.len() {
        let curr = seq[i];
        let mut run = 1;
        while i + run < seq.len() && seq[i + run] == curr {
            run += 1;
        }

        let mut rem = run;
        if curr == 0 {
            while rem > 0 {
                let sym = if rem >= 11 {
                    let take = rem.min(138);
                    rem -= take;
                    (18, (take - 11) as u8, 7)
                } else if rem >= 3 {
                    let take = rem.min(10);
                    rem -= take;
                    (17, (take - 3) as u8, 3)
                } else {
                    rem -= 1;
                    (0, 0, 0)
                };
                cl_freq[sym.0 as usize] += 1;
                encoded.push(sym);
            }
        } else {
            encoded.push((curr, 0, 0));
            cl_freq[curr as usize] += 1;
            rem -= 1;
            while rem >= 3 {
                let take = rem.min(6);
                encoded.push((16, (take - 3) as u8, 2));
                cl_freq[16] += 1;
                rem -= take;
            }
            for _ in 0..rem {
                encoded.push((curr, 0, 0));
                cl_freq[curr as usize] += 1;
            }
        }

        i += run;
    }

    encoded
}

fn write_tokens(writer: &mut BitWriter, tokens: &[Token], lit: &[HuffmanCode], dist: &[HuffmanCode]) {
    for token in tokens {
        match *token {
            Token::Literal(byte) => {
                let code = lit[byte as usize];
                writer.write_bits(code.code as u32, code.length);
            }
            Token::Match { length, distance } => {
                let lc = length_code(length);
                let code = lit[257 + lc];
                writer.write_bits(code.code as u32, code.length);
                if LENGTH_EXTRA[lc] > 0 {
                    writer.write_bits((length - LENGTH_BASE[lc]) as u32, LENGTH_EXTRA[lc]);
                }

                let dc = distance_code(distance);
                let code = dist[dc];
                writer.write_bits(code.code as u32, code.length);
                if DIST_EXTRA[dc] > 0 {
                    writer.write_bits((distance - DIST_BASE[dc]) as u32, DIST_EXTRA[dc]);
                }
            }
        }
    }
    let eob = lit[END_BLOCK];
    writer.write_bits(eob.code as u32, eob.length);
}

/// Write `data` as one or more stored blocks; only the last may carry BFINAL.
fn write_stored(writer: &mut BitWriter, data: &[u8], last: bool) {
    let chunks = data.len().div_ceil(MAX_STORED).max(1);
    for i in 0..chunks {
        let chunk = &data[(i * MAX_STORED).min(data.len())..((i + 1) * MAX_STORED).min(data.len())];
        writer.write_bits((last && i + 1 == chunks) as u32, 1);
        writer.write_bits(0, 2);
        writer.align_to_byte();
        let len = chunk.len() as u16;
        writer.write_bytes(&len.to_le_bytes());
        writer.write_bytes(&(!len).to_le_bytes());
        writer.write_bytes(chunk);
    }
}

/// Bytes needed to send `len` bytes as stored blocks.
fn stored_cost(len: usize) -> u64 {
    (len + 5 * len.div_ceil(MAX_STORED).max(1)) as u64
}

enum BlockKind {
    Stored,
    Fixed,
    Dynamic(Box<DynamicTrees>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Header not yet written.
    Init,
    Busy,
    /// Final block and trailer queued; only draining remains.
    Finished,
}

/// Resumable DEFLATE/zlib compressor.
///
/// Feed input with [`Flush::None`] as it arrives and end with
/// [`Flush::Finish`]; keep calling with `Finish` and fresh output space
/// until [`Status::StreamEnd`].
pub struct Deflater {
    level: u8,
    strategy: Strategy,
    format: Format,
    window: SlidingWindow,
    block: BlockBuffer,
    writer: BitWriter,
    adler: Adler32,
    dict_id: Option<u32>,
    state: State,
    /// Flush mode of the previous call; `None` after a call that ran out of
    /// output in the middle of its work.
    last_flush: Option<Flush>,
    total_in: u64,
    total_out: u64,
}

impl Deflater {
    /// Create a compressor. `level` ranges 0 (store) to 9 (best).
    pub fn new(level: u8, strategy: Strategy, format: Format) -> Result<Self> {
        if level > 9 {
            return Err(Error::InvalidCompressionLevel(level));
        }
        Ok(Self {
            level,
            strategy,
            format,
            window: SlidingWindow::new(level, strategy)?,
            block: BlockBuffer::new()?,
            writer: BitWriter::with_capacity(1 << 12),
            adler: Adler32::new(),
            dict_id: None,
            state: State::Init,
            last_flush: None,
            total_in: 0,
            total_out: 0,
        })
    }

    /// Compression level.
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Input bytes consumed since creation or the last reset.
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Output bytes produced since creation or the last reset.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Adler-32 of the input consumed so far (zlib format only; 1 otherwise).
    pub fn adler(&self) -> u32 {
        self.adler.checksum()
    }

    /// Prime the window with `dict` so the first bytes of input can match it.
    /// Must be called before the first [`Deflater::deflate`]. Returns the
    /// dictionary's Adler-32, which a zlib stream records in its header.
    pub fn set_dictionary(&mut self, dict: &[u8]) -> Result<u32> {
        if self.state != State::Init {
            return Err(Error::StreamState(
                "dictionary must be set before compression starts",
            ));
        }
        self.window.set_dictionary(dict);
        let id = adler32(dict);
        if self.format == Format::Zlib {
            self.dict_id = Some(id);
        }
        Ok(id)
    }

    /// Return to the freshly created state, keeping level, strategy and format.
    pub fn reset(&mut self) {
        self.window.reset();
        self.block.clear();
        self.writer.clear();
        self.adler = Adler32::new();
        self.dict_id = None;
        self.state = State::Init;
        self.last_flush = None;
        self.total_in = 0;
        self.total_out = 0;
    }

    /// Compress from `input` into `output`.
    ///
    /// Returns [`Status::BufError`] when the call could make no progress,
    /// for example a repeated flush with no new input.
    pub fn deflate(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<StreamResult> {
        if output.is_empty() {
            return Err(Error::StreamState("deflate called with no output space"));
        }
        if self.state == State::Finished {
            if !input.is_empty() {
                return Err(Error::StreamState("input supplied after the stream finished"));
            }
            if flush != Flush::Finish {
                return Err(Error::StreamState("stream already finished"));
            }
        }

        let mut consumed = 0;
        if self.state == State::Init {
            self.write_header();
            self.state = State::Busy;
        }
        let mut written = self.writer.drain_into(output);
        if !self.writer.is_empty() {
            return Ok(self.progress(consumed, written));
        }

        if self.state == State::Busy {
            let repeat = input.is_empty()
                && flush != Flush::Finish
                && self.last_flush.is_some_and(|last| flush <= last);
            self.last_flush = Some(flush);
            if !repeat {
                self.compress(input, &mut consumed, output, &mut written, flush);
            }
        }
        written += self.writer.drain_into(&mut output[written..]);
        Ok(self.progress(consumed, written))
    }

    fn progress(&mut self, consumed: usize, written: usize) -> StreamResult {
        self.total_in += consumed as u64;
        self.total_out += written as u64;
        let status = if self.state == State::Finished && self.writer.is_empty() {
            Status::StreamEnd
        } else if consumed == 0 && written == 0 {
            Status::BufError
        } else {
            Status::Ok
        };
        StreamResult {
            bytes_consumed: consumed,
            bytes_written: written,
            status,
        }
    }

    fn write_header(&mut self) {
        if self.format != Format::Zlib {
            return;
        }
        let cmf: u16 = 0x78; // CM=8, CINFO=7 (32K window)
        let flevel: u16 = match (self.level, self.strategy) {
            (_, Strategy::HuffmanOnly | Strategy::Rle) | (0..=1, _) => 0,
            (2..=5, _) => 1,
            (6, _) => 2,
            _ => 3,
        };
        let mut header = (cmf << 8) | (flevel << 6);
        if self.dict_id.is_some() {
            header |= 0x20;
        }
        header |= (31 - header % 31) % 31;
        self.writer.write_bytes(&header.to_be_bytes());
        if let Some(id) = self.dict_id {
            self.writer.write_bytes(&id.to_be_bytes());
        }
    }

    fn compress(
        &mut self,
        input: &[u8],
        consumed: &mut usize,
        output: &mut [u8],
        written: &mut usize,
        flush: Flush,
    ) {
        loop {
            let start = *consumed;
            let outcome = self
                .window
                .parse(input, consumed, flush != Flush::None, &mut self.block);
            if self.format == Format::Zlib {
                self.adler.update(&input[start..*consumed]);
            }
            match outcome {
                Parse::NeedInput => return,
                Parse::BlockFull => {
                    self.emit_block(false);
                    *written += self.writer.drain_into(&mut output[*written..]);
                    if !self.writer.is_empty() {
                        // Resume this flush on the next call even without new input.
                        self.last_flush = None;
                        return;
                    }
                }
                Parse::Drained => break,
            }
        }

        match flush {
            Flush::None => {}
            Flush::Sync | Flush::Full => {
                if self.block_pending() {
                    self.emit_block(false);
                }
                self.writer.write_bits(0, 3);
                self.writer.align_to_byte();
                self.writer.write_bytes(&[0x00, 0x00, 0xFF, 0xFF]);
                if flush == Flush::Full {
                    self.window.forget_history();
                }
            }
            Flush::Finish => {
                self.emit_block(true);
                if self.format == Format::Zlib {
                    self.writer.write_bytes(&self.adler.checksum().to_be_bytes());
                }
                self.state = State::Finished;
                log::debug!(
                    "deflate finished: {} bytes in, level {}, {:?}",
                    self.total_in + *consumed as u64,
                    self.level,
                    self.strategy
                );
            }
        }
    }

    fn block_pending(&self) -> bool {
        match self.window.mode() {
            ParseMode::Stored => self.window.has_pending_block(),
            _ => !self.block.is_empty(),
        }
    }

    fn choose_block(&self) -> BlockKind {
        let stored = self.window.block_bytes().map(|data| stored_cost(data.len()));
        if self.level == 0 {
            return BlockKind::Stored;
        }

        let fixed_bits = 3 + data_bits(&self.block, &FIXED_LITERAL_LENGTHS, &FIXED_DISTANCE_LENGTHS);
        let (huff_bits, kind) = if self.strategy == Strategy::Fixed {
            (fixed_bits, BlockKind::Fixed)
        } else {
            let trees = DynamicTrees::build(&self.block);
            if trees.bits <= fixed_bits {
                (trees.bits, BlockKind::Dynamic(Box::new(trees)))
            } else {
                (fixed_bits, BlockKind::Fixed)
            }
        };

        match stored {
            Some(cost) if cost < huff_bits.div_ceil(8) => BlockKind::Stored,
            _ => kind,
        }
    }

    fn emit_block(&mut self, last: bool) {
        let kind = self.choose_block();
        match &kind {
            BlockKind::Stored => {
                let data = self.window.block_bytes().unwrap_or_default();
                write_stored(&mut self.writer, data, last);
            }
            BlockKind::Fixed => {
                self.writer.write_bits(last as u32, 1);
                self.writer.write_bits(1, 2);
                write_tokens(
                    &mut self.writer,
                    &self.block.tokens,
                    &FIXED_LITERAL_CODES,
                    &FIXED_DISTANCE_CODES,
                );
            }
            BlockKind::Dynamic(trees) => {
                trees.write_header(&mut self.writer, last);
                write_tokens(&mut self.writer, &self.block.tokens, &trees.lit, &trees.dist);
            }
        }
        log::trace!(
            "deflate block: {} tokens, {} input bytes, {}{}",
            self.block.tokens.len(),
            self.window.block_len(),
            match kind {
                BlockKind::Stored => "stored",
                BlockKind::Fixed => "fixed",
                BlockKind::Dynamic(_) => "dynamic",
            },
            if last { ", final" } else { "" }
        );

        self.block.clear();
        self.window.start_next_block();
        if last {
            self.writer.align_to_byte();
        }
    }
}

fn compress_to_vec(data: &[u8], level: u8, strategy: Strategy, format: Format) -> Result<Vec<u8>> {
    let mut deflater = Deflater::new(level, strategy, format)?;
    let mut out = alloc_zeroed(compress_bound(data.len()))?;
    let mut input = data;
    let mut written = 0;
    loop {
        if written == out.len() {
            out.resize(out.len() + (out.len() >> 1) + 64, 0);
        }
        let res = deflater.deflate(input, &mut out[written..], Flush::Finish)?;
        input = &input[res.bytes_consumed..];
        written += res.bytes_written;
        match res.status {
            Status::StreamEnd => break,
            Status::BufError => return Err(Error::StreamState("deflate made no progress")),
            Status::Ok | Status::NeedDict => {}
        }
    }
    out.truncate(written);
    Ok(out)
}

/// Compress `data` to a raw DEFLATE stream.
pub fn deflate(data: &[u8], level: u8) -> Result<Vec<u8>> {
    compress_to_vec(data, level, Strategy::Default, Format::Raw)
}

/// Compress `data` to a zlib stream.
pub fn deflate_zlib(data: &[u8], level: u8) -> Result<Vec<u8>> {
    compress_to_vec(data, level, Strategy::Default, Format::Zlib)
}

/// Compress `data` to a zlib stream with an explicit strategy.
pub fn deflate_zlib_with(data: &[u8], level: u8, strategy: Strategy) -> Result<Vec<u8>> {
    compress_to_vec(data, level, strategy, Format::Zlib)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::{DeflateDecoder, ZlibDecoder};
    use rand::{Rng, SeedableRng};
    use std::io::Read;

    fn decompress_zlib(data: &[u8]) -> Vec<u8> {
        let mut decoder = ZlibDecoder::new(data);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).expect("zlib decode");
        out
    }

    fn decompress_raw(data: &[u8]) -> Vec<u8> {
        let mut decoder = DeflateDecoder::new(data);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).expect("deflate decode");
        out
    }

    fn text(len: usize) -> Vec<u8> {
        let words = ["lorem ", "ipsum ", "dolor ", "sit ", "amet ", "consectetur "];
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let mut out = Vec::with_capacity(len + 16);
        while out.len() < len {
            out.extend_from_slice(words[rng.gen_range(0..words.len())].as_bytes());
        }
        out.truncate(len);
        out
    }

    #[test]
    fn test_length_code() {
        assert_eq!(length_code(3), 0);
        assert_eq!(length_code(10), 7);
        assert_eq!(length_code(11), 8);
        assert_eq!(length_code(12), 8);
        assert_eq!(length_code(227), 27);
        assert_eq!(length_code(257), 27);
        assert_eq!(length_code(258), 28);
    }

    #[test]
    fn test_distance_code() {
        assert_eq!(distance_code(1), 0);
        assert_eq!(distance_code(4), 3);
        assert_eq!(distance_code(5), 4);
        assert_eq!(distance_code(256), 15);
        assert_eq!(distance_code(257), 16);
        assert_eq!(distance_code(24577), 29);
        assert_eq!(distance_code(32768), 29);
        for code in 0..D_CODES {
            assert_eq!(distance_code(DIST_BASE[code]), code);
        }
    }

    #[test]
    fn test_deflate_zlib_empty() {
        let encoded = deflate_zlib(&[], 6).unwrap();
        assert_eq!(encoded, [0x78, 0x9C, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01]);
        assert!(decompress_zlib(&encoded).is_empty());
    }

    #[test]
    fn test_zlib_header_level_flags() {
        for (level, flg) in [(0, 0x01), (1, 0x01), (2, 0x5E), (5, 0x5E), (6, 0x9C), (7, 0xDA), (9, 0xDA)] {
            let encoded = deflate_zlib(b"abc", level).unwrap();
            assert_eq!(encoded[..2], [0x78, flg], "level {}", level);
            assert_eq!(u16::from_be_bytes([encoded[0], encoded[1]]) % 31, 0);
        }
        let encoded = deflate_zlib_with(b"abc", 9, Strategy::HuffmanOnly).unwrap();
        assert_eq!(encoded[..2], [0x78, 0x01]);
    }

    #[test]
    fn test_deflate_roundtrip_all_levels() {
        let data = text(50_000);
        for level in 0..=9 {
            let encoded = deflate_zlib(&data, level).unwrap();
            assert_eq!(decompress_zlib(&encoded), data, "level {}", level);
            let raw = deflate(&data, level).unwrap();
            assert_eq!(decompress_raw(&raw), data, "raw level {}", level);
        }
    }

    #[test]
    fn test_deflate_roundtrip_strategies() {
        let mut data = text(20_000);
        data.extend(std::iter::repeat(0u8).take(5000));
        data.extend((0..5000u32).map(|i| (i % 7) as u8));
        for strategy in [
            Strategy::Default,
            Strategy::Filtered,
            Strategy::HuffmanOnly,
            Strategy::Rle,
            Strategy::Fixed,
        ] {
            let encoded = deflate_zlib_with(&data, 6, strategy).unwrap();
            assert_eq!(decompress_zlib(&encoded), data, "{:?}", strategy);
        }
    }

    #[test]
    fn test_deflate_zlib_roundtrip_random_small() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(999);
        for len in [0usize, 1, 2, 5, 32, 128, 1024, 4096] {
            let mut data = vec![0u8; len];
            rng.fill(data.as_mut_slice());
            let encoded = deflate_zlib(&data, 6).unwrap();
            assert_eq!(decompress_zlib(&encoded), data, "mismatch at len={}", len);
        }
    }

    #[test]
    fn test_deflate_zlib_incompressible_prefers_stored() {
        let mut data = vec![0u8; 10_000];
        let mut rng = rand::rngs::StdRng::seed_from_u64(1234);
        rng.fill(data.as_mut_slice());

        let encoded = deflate_zlib(&data, 6).unwrap();
        assert_eq!(decompress_zlib(&encoded), data);
        let stored_overhead = (data.len() / 65_535 + 1) * 5 + 2 + 4;
        assert!(encoded.len() <= data.len() + stored_overhead);
    }

    #[test]
    fn test_deflate_repetitive_compresses() {
        let data = b"abcdefghij".repeat(1000);
        let encoded = deflate_zlib(&data, 6).unwrap();
        assert!(encoded.len() < 100, "got {} bytes", encoded.len());
        assert_eq!(decompress_zlib(&encoded), data);
    }

    #[test]
    fn test_fixed_strategy_never_dynamic() {
        let data = text(3000);
        let encoded = deflate_with_strategy_raw(&data, Strategy::Fixed);
        // First block header: BFINAL=1, BTYPE=01.
        assert_eq!(encoded[0] & 0b111, 0b011);
        assert_eq!(decompress_raw(&encoded), data);
    }

    fn deflate_with_strategy_raw(data: &[u8], strategy: Strategy) -> Vec<u8> {
        compress_to_vec(data, 6, strategy, Format::Raw).unwrap()
    }

    #[test]
    fn test_tiny_output_buffer_matches_one_shot() {
        let data = text(70_000);
        let expected = deflate_zlib(&data, 6).unwrap();

        let mut deflater = Deflater::new(6, Strategy::Default, Format::Zlib).unwrap();
        let mut out = Vec::new();
        let mut input = &data[..];
        let mut byte = [0u8; 1];
        loop {
            let res = deflater.deflate(input, &mut byte, Flush::Finish).unwrap();
            input = &input[res.bytes_consumed..];
            out.extend_from_slice(&byte[..res.bytes_written]);
            if res.status == Status::StreamEnd {
                break;
            }
        }
        assert_eq!(out, expected);
        assert_eq!(deflater.total_in(), data.len() as u64);
        assert_eq!(deflater.total_out(), expected.len() as u64);
    }

    #[test]
    fn test_chunked_input_roundtrip() {
        let data = text(100_000);
        let mut deflater = Deflater::new(9, Strategy::Default, Format::Zlib).unwrap();
        let mut out = Vec::new();
        let mut buf = vec![0u8; 3000];
        for piece in data.chunks(1234) {
            let mut piece = piece;
            while !piece.is_empty() {
                let res = deflater.deflate(piece, &mut buf, Flush::None).unwrap();
                piece = &piece[res.bytes_consumed..];
                out.extend_from_slice(&buf[..res.bytes_written]);
            }
        }
        loop {
            let res = deflater.deflate(&[], &mut buf, Flush::Finish).unwrap();
            out.extend_from_slice(&buf[..res.bytes_written]);
            if res.status == Status::StreamEnd {
                break;
            }
        }
        assert_eq!(decompress_zlib(&out), data);
        assert_eq!(deflater.adler(), adler32(&data));
    }

    #[test]
    fn test_sync_flush_marker_and_repeat() {
        let mut deflater = Deflater::new(6, Strategy::Default, Format::Raw).unwrap();
        let mut buf = vec![0u8; 1024];
        let res = deflater.deflate(b"hello hello hello", &mut buf, Flush::Sync).unwrap();
        assert_eq!(res.status, Status::Ok);
        assert_eq!(res.bytes_consumed, 17);
        assert_eq!(buf[res.bytes_written - 4..res.bytes_written], [0x00, 0x00, 0xFF, 0xFF]);

        // Nothing new to flush.
        let again = deflater.deflate(&[], &mut buf, Flush::Sync).unwrap();
        assert_eq!(again.status, Status::BufError);
    }

    #[test]
    fn test_full_flush_stream_decodes() {
        let part = text(10_000);
        let mut deflater = Deflater::new(6, Strategy::Default, Format::Zlib).unwrap();
        let mut out = vec![0u8; compress_bound(3 * part.len())];
        let mut written = 0;
        for flush in [Flush::Full, Flush::Sync, Flush::Finish] {
            let res = deflater.deflate(&part, &mut out[written..], flush).unwrap();
            assert_eq!(res.bytes_consumed, part.len());
            written += res.bytes_written;
        }
        out.truncate(written);
        assert_eq!(decompress_zlib(&out), part.repeat(3));
    }

    #[test]
    fn test_dictionary_header() {
        let dict = b"common prefix shared by both sides";
        let mut deflater = Deflater::new(6, Strategy::Default, Format::Zlib).unwrap();
        let id = deflater.set_dictionary(dict).unwrap();
        assert_eq!(id, adler32(dict));
        let mut buf = vec![0u8; 256];
        let res = deflater
            .deflate(b"common prefix shared", &mut buf, Flush::Finish)
            .unwrap();
        assert_eq!(res.status, Status::StreamEnd);
        assert_eq!(buf[..2], [0x78, 0xBB]);
        assert_eq!(buf[2..6], id.to_be_bytes());

        assert!(matches!(
            deflater.set_dictionary(dict),
            Err(Error::StreamState(_))
        ));
    }

    #[test]
    fn test_misuse_errors() {
        assert!(matches!(
            Deflater::new(10, Strategy::Default, Format::Zlib),
            Err(Error::InvalidCompressionLevel(10))
        ));

        let mut deflater = Deflater::new(6, Strategy::Default, Format::Zlib).unwrap();
        assert!(matches!(
            deflater.deflate(b"abc", &mut [], Flush::None),
            Err(Error::StreamState(_))
        ));

        let mut buf = [0u8; 64];
        let res = deflater.deflate(b"abc", &mut buf, Flush::Finish).unwrap();
        assert_eq!(res.status, Status::StreamEnd);
        assert!(matches!(
            deflater.deflate(b"more", &mut buf, Flush::Finish),
            Err(Error::StreamState(_))
        ));
        let res = deflater.deflate(&[], &mut buf, Flush::Finish).unwrap();
        assert_eq!(res.status, Status::StreamEnd);
        assert_eq!(res.bytes_written, 0);
    }

    #[test]
    fn test_reset_reproduces_output() {
        let data = text(5000);
        let mut deflater = Deflater::new(6, Strategy::Default, Format::Zlib).unwrap();
        let mut first = vec![0u8; compress_bound(data.len())];
        let a = deflater.deflate(&data, &mut first, Flush::Finish).unwrap();
        deflater.reset();
        let mut second = vec![0u8; compress_bound(data.len())];
        let b = deflater.deflate(&data, &mut second, Flush::Finish).unwrap();
        assert_eq!(first[..a.bytes_written], second[..b.bytes_written]);
    }

    #[test]
    fn test_rle_code_lengths_runs() {
        let lit = [8u8; 10];
        let dist = [0u8; 20];
        let mut freq = [0u32; BL_CODES];
        let encoded = rle_code_lengths(&lit, &dist, &mut freq);
        assert_eq!(encoded, vec![(8, 0, 0), (16, 3, 2), (16, 0, 2), (18, 9, 7)]);
        assert_eq!(freq[8], 1);
        assert_eq!(freq[16], 2);
        assert_eq!(freq[18], 1);
    }
}
