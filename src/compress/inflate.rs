//! DEFLATE (RFC 1951) + zlib (RFC 1950) decoder.
//!
//! [`Inflater`] is a resumable state machine: it can stop at any bit
//! boundary when input or output runs out and continue on the next call.
//! Bits already pulled from the input stay in the bit accumulator, partial
//! code-length tables and pending match copies stay in the context, and the
//! last 32 KiB of output is mirrored in a ring buffer so back-references can
//! reach across calls.
//!
//! - Stored, fixed Huffman, and dynamic Huffman blocks.
//! - zlib header checks, preset dictionaries, and Adler-32 verification.
//! - Malformed streams fail with [`Error::InvalidDecode`]; the context then
//!   refuses further work until [`Inflater::reset`].

use crate::bits::BitReader;
use crate::compress::huffman::{
    DecodeTable, TableKind, FIXED_DISTANCE_LENGTHS, FIXED_LITERAL_LENGTHS,
};
use crate::compress::{
    adler32, Adler32, Format, Status, StreamResult, CODE_LENGTH_ORDER, DIST_BASE, DIST_EXTRA,
    LENGTH_BASE, LENGTH_EXTRA,
};
use crate::error::{alloc_zeroed, Error, Result};

const WINDOW_SIZE: usize = 32 * 1024;
const WINDOW_MASK: usize = WINDOW_SIZE - 1;

/// Decoder position within the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Header,
    DictId,
    Dict,
    BlockHeader,
    StoredLen,
    Stored,
    Table,
    CodeLengthLens,
    CodeLens,
    Literal,
    Distance,
    Copy,
    Check,
    Done,
    Bad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Out of input or output space.
    Pause,
    NeedDict,
    Done,
}

#[derive(Clone, Copy)]
enum Table {
    CodeLengths,
    Literals,
    Distances,
}

/// Resumable DEFLATE/zlib decompressor.
pub struct Inflater {
    format: Format,
    mode: Mode,
    bits: BitReader,
    /// Ring buffer of recent output, allocated on first use.
    window: Vec<u8>,
    wnext: usize,
    /// Valid bytes in the ring, capped at the stream's declared window size.
    whave: usize,
    window_limit: usize,
    last: bool,
    /// Remaining bytes of the stored block or match being copied.
    length: usize,
    dist: usize,
    nlen: usize,
    ndist: usize,
    ncode: usize,
    have: usize,
    cl_lens: [u8; 19],
    lens: [u8; 320],
    code_table: Option<DecodeTable>,
    lit_table: Option<DecodeTable>,
    dist_table: Option<DecodeTable>,
    adler: Adler32,
    dict_id: u32,
    total_in: u64,
    total_out: u64,
}

impl Inflater {
    /// Create a decompressor for `format`.
    pub fn new(format: Format) -> Self {
        Self {
            format,
            mode: Self::initial_mode(format),
            bits: BitReader::new(),
            window: Vec::new(),
            wnext: 0,
            whave: 0,
            window_limit: WINDOW_SIZE,
            last: false,
            length: 0,
            dist: 0,
            nlen: 0,
            ndist: 0,
            ncode: 0,
            have: 0,
            cl_lens: [0; 19],
            lens: [0; 320],
            code_table: None,
            lit_table: None,
            dist_table: None,
            adler: Adler32::new(),
            dict_id: 0,
            total_in: 0,
            total_out: 0,
        }
    }

    fn initial_mode(format: Format) -> Mode {
        match format {
            Format::Zlib => Mode::Header,
            Format::Raw => Mode::BlockHeader,
        }
    }

    /// Return to the freshly created state.
    pub fn reset(&mut self) {
        let window = std::mem::take(&mut self.window);
        *self = Self::new(self.format);
        self.window = window;
    }

    /// Input bytes consumed since creation or the last reset.
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Output bytes produced since creation or the last reset.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Adler-32 of the output produced so far (zlib format).
    pub fn adler(&self) -> u32 {
        self.adler.checksum()
    }

    /// Dictionary id requested by the zlib header, once [`Status::NeedDict`]
    /// has been reported.
    pub fn dict_id(&self) -> u32 {
        self.dict_id
    }

    /// True once the end of the stream has been reached.
    pub fn is_done(&self) -> bool {
        self.mode == Mode::Done
    }

    /// Supply the preset dictionary. For zlib streams this is only valid
    /// after [`Status::NeedDict`], and the dictionary's Adler-32 must match
    /// the id in the header. Raw streams accept a dictionary before any input.
    pub fn set_dictionary(&mut self, dict: &[u8]) -> Result<()> {
        match (self.format, self.mode) {
            (Format::Zlib, Mode::Dict) => {
                if adler32(dict) != self.dict_id {
                    return Err(Error::invalid("preset dictionary does not match the stream"));
                }
            }
            (Format::Raw, Mode::BlockHeader) if self.total_in == 0 => {}
            _ => return Err(Error::StreamState("dictionary not expected at this point")),
        }
        self.ensure_window()?;
        let tail = &dict[dict.len().saturating_sub(WINDOW_SIZE)..];
        for &byte in tail {
            self.window[self.wnext] = byte;
            self.wnext = (self.wnext + 1) & WINDOW_MASK;
        }
        self.whave = (self.whave + tail.len()).min(self.window_limit);
        if self.mode == Mode::Dict {
            self.mode = Mode::BlockHeader;
        }
        Ok(())
    }

    fn ensure_window(&mut self) -> Result<()> {
        if self.window.is_empty() {
            self.window = alloc_zeroed(WINDOW_SIZE)?;
        }
        Ok(())
    }

    /// Decompress from `input` into `output`.
    ///
    /// Returns [`Status::StreamEnd`] once the stream (and its trailer) is
    /// complete; unused input after the end is not counted as consumed.
    pub fn inflate(&mut self, input: &[u8], output: &mut [u8]) -> Result<StreamResult> {
        if self.mode == Mode::Bad {
            return Err(Error::StreamState("inflater failed earlier; reset it first"));
        }
        if output.is_empty() {
            return Err(Error::StreamState("inflate called with no output space"));
        }
        self.ensure_window()?;

        let mut consumed = 0;
        let mut written = 0;
        let mut hashed = 0;
        let flow = match self.run(input, &mut consumed, output, &mut written, &mut hashed) {
            Ok(flow) => flow,
            Err(err) => {
                log::debug!("inflate failed after {} output bytes: {}", self.total_out, err);
                self.mode = Mode::Bad;
                return Err(err);
            }
        };
        if self.format == Format::Zlib {
            self.adler.update(&output[hashed..written]);
        }

        if flow == Flow::Done {
            // Whole bytes pulled past the end belong to the caller.
            let spare = (self.bits.bit_count() / 8) as usize;
            consumed -= spare.min(consumed);
            self.bits.clear();
        }
        self.total_in += consumed as u64;
        self.total_out += written as u64;

        let status = match flow {
            Flow::Done => Status::StreamEnd,
            Flow::NeedDict => Status::NeedDict,
            Flow::Pause if consumed == 0 && written == 0 => Status::BufError,
            Flow::Pause => Status::Ok,
        };
        Ok(StreamResult {
            bytes_consumed: consumed,
            bytes_written: written,
            status,
        })
    }

    #[inline]
    fn put(&mut self, output: &mut [u8], written: &mut usize, byte: u8) {
        output[*written] = byte;
        *written += 1;
        self.window[self.wnext] = byte;
        self.wnext = (self.wnext + 1) & WINDOW_MASK;
        if self.whave < self.window_limit {
            self.whave += 1;
        }
    }

    fn put_slice(&mut self, output: &mut [u8], written: &mut usize, bytes: &[u8]) {
        output[*written..*written + bytes.len()].copy_from_slice(bytes);
        *written += bytes.len();
        let tail = &bytes[bytes.len().saturating_sub(WINDOW_SIZE)..];
        for &byte in tail {
            self.window[self.wnext] = byte;
            self.wnext = (self.wnext + 1) & WINDOW_MASK;
        }
        self.whave = (self.whave + bytes.len()).min(self.window_limit);
    }

    /// Decode the next symbol of `table` without consuming it. `None` means
    /// more input is needed.
    fn peek_symbol(&mut self, table: Table, input: &[u8], pos: &mut usize) -> Result<Option<(u16, u32)>> {
        self.bits.fill(15, input, pos);
        let table = match table {
            Table::CodeLengths => &self.code_table,
            Table::Literals => &self.lit_table,
            Table::Distances => &self.dist_table,
        };
        let table = table
            .as_ref()
            .ok_or(Error::StreamState("Huffman table used before it was built"))?;
        table.decode(self.bits.hold(), self.bits.bit_count())
    }

    fn run(
        &mut self,
        input: &[u8],
        pos: &mut usize,
        output: &mut [u8],
        written: &mut usize,
        hashed: &mut usize,
    ) -> Result<Flow> {
        loop {
            match self.mode {
                Mode::Header => {
                    if !self.bits.fill(16, input, pos) {
                        return Ok(Flow::Pause);
                    }
                    let cmf = self.bits.take(8);
                    let flg = self.bits.take(8);
                    if ((cmf << 8) | flg) % 31 != 0 {
                        return Err(Error::invalid("zlib FCHECK failed"));
                    }
                    if cmf & 0x0F != 8 {
                        return Err(Error::invalid("unsupported compression method (expect DEFLATE)"));
                    }
                    let cinfo = cmf >> 4;
                    if cinfo > 7 {
                        return Err(Error::invalid("invalid CINFO/window size"));
                    }
                    self.window_limit = 1 << (cinfo + 8);
                    self.mode = if flg & 0x20 != 0 {
                        Mode::DictId
                    } else {
                        Mode::BlockHeader
                    };
                }
                Mode::DictId => {
                    if !self.bits.fill(32, input, pos) {
                        return Ok(Flow::Pause);
                    }
                    let mut id = 0u32;
                    for _ in 0..4 {
                        id = (id << 8) | self.bits.take(8);
                    }
                    self.dict_id = id;
                    self.mode = Mode::Dict;
                    return Ok(Flow::NeedDict);
                }
                Mode::Dict => return Ok(Flow::NeedDict),
                Mode::BlockHeader => {
                    if self.last {
                        self.mode = Mode::Check;
                        continue;
                    }
                    if !self.bits.fill(3, input, pos) {
                        return Ok(Flow::Pause);
                    }
                    self.last = self.bits.take(1) == 1;
                    match self.bits.take(2) {
                        0 => self.mode = Mode::StoredLen,
                        1 => {
                            self.lit_table =
                                Some(DecodeTable::from_lengths(&FIXED_LITERAL_LENGTHS, TableKind::Symbols)?);
                            self.dist_table =
                                Some(DecodeTable::from_lengths(&FIXED_DISTANCE_LENGTHS, TableKind::Symbols)?);
                            self.mode = Mode::Literal;
                        }
                        2 => self.mode = Mode::Table,
                        _ => return Err(Error::invalid("reserved BTYPE encountered")),
                    }
                }
                Mode::StoredLen => {
                    self.bits.align();
                    if !self.bits.fill(32, input, pos) {
                        return Ok(Flow::Pause);
                    }
                    let len = self.bits.take(16);
                    let nlen = self.bits.take(16);
                    if len != !nlen & 0xFFFF {
                        return Err(Error::invalid("stored block LEN/NLEN mismatch"));
                    }
                    self.length = len as usize;
                    self.mode = Mode::Stored;
                }
                Mode::Stored => {
                    while self.length > 0 {
                        if *written == output.len() {
                            return Ok(Flow::Pause);
                        }
                        if self.bits.bit_count() >= 8 {
                            let byte = self.bits.take(8) as u8;
                            self.put(output, written, byte);
                            self.length -= 1;
                            continue;
                        }
                        if *pos == input.len() {
                            return Ok(Flow::Pause);
                        }
                        let n = self
                            .length
                            .min(output.len() - *written)
                            .min(input.len() - *pos);
                        self.put_slice(output, written, &input[*pos..*pos + n]);
                        *pos += n;
                        self.length -= n;
                    }
                    self.mode = Mode::BlockHeader;
                }
                Mode::Table => {
                    if !self.bits.fill(14, input, pos) {
                        return Ok(Flow::Pause);
                    }
                    self.nlen = self.bits.take(5) as usize + 257;
                    self.ndist = self.bits.take(5) as usize + 1;
                    self.ncode = self.bits.take(4) as usize + 4;
                    if self.nlen > 286 || self.ndist > 30 {
                        return Err(Error::invalid("too many length or distance symbols"));
                    }
                    self.have = 0;
                    self.cl_lens = [0; 19];
                    self.mode = Mode::CodeLengthLens;
                }
                Mode::CodeLengthLens => {
                    while self.have < self.ncode {
                        if !self.bits.fill(3, input, pos) {
                            return Ok(Flow::Pause);
                        }
                        self.cl_lens[CODE_LENGTH_ORDER[self.have]] = self.bits.take(3) as u8;
                        self.have += 1;
                    }
                    self.code_table =
                        Some(DecodeTable::from_lengths(&self.cl_lens, TableKind::CodeLengths)?);
                    self.have = 0;
                    self.lens = [0; 320];
                    self.mode = Mode::CodeLens;
                }
                Mode::CodeLens => {
                    let total = self.nlen + self.ndist;
                    while self.have < total {
                        let Some((sym, len)) = self.peek_symbol(Table::CodeLengths, input, pos)? else {
                            return Ok(Flow::Pause);
                        };
                        if sym < 16 {
                            self.bits.consume(len);
                            self.lens[self.have] = sym as u8;
                            self.have += 1;
                            continue;
                        }
                        let (extra, base, value) = match sym {
                            16 => {
                                if self.have == 0 {
                                    return Err(Error::invalid("repeat of previous length with no previous length"));
                                }
                                (2, 3, self.lens[self.have - 1])
                            }
                            17 => (3, 3, 0),
                            _ => (7, 11, 0),
                        };
                        if !self.bits.fill(len + extra, input, pos) {
                            return Ok(Flow::Pause);
                        }
                        self.bits.consume(len);
                        let count = base + self.bits.take(extra) as usize;
                        if self.have + count > total {
                            return Err(Error::invalid("code length repeat overruns the table"));
                        }
                        self.lens[self.have..self.have + count].fill(value);
                        self.have += count;
                    }
                    if self.lens[256] == 0 {
                        return Err(Error::invalid("missing end-of-block code"));
                    }
                    self.lit_table = Some(DecodeTable::from_lengths(
                        &self.lens[..self.nlen],
                        TableKind::Symbols,
                    )?);
                    self.dist_table = Some(DecodeTable::from_lengths(
                        &self.lens[self.nlen..total],
                        TableKind::Symbols,
                    )?);
                    self.mode = Mode::Literal;
                }
                Mode::Literal => loop {
                    let Some((sym, len)) = self.peek_symbol(Table::Literals, input, pos)? else {
                        return Ok(Flow::Pause);
                    };
                    match sym {
                        0..=255 => {
                            if *written == output.len() {
                                return Ok(Flow::Pause);
                            }
                            self.bits.consume(len);
                            self.put(output, written, sym as u8);
                        }
                        256 => {
                            self.bits.consume(len);
                            self.mode = Mode::BlockHeader;
                            break;
                        }
                        257..=285 => {
                            let idx = sym as usize - 257;
                            let extra = LENGTH_EXTRA[idx] as u32;
                            if !self.bits.fill(len + extra, input, pos) {
                                return Ok(Flow::Pause);
                            }
                            self.bits.consume(len);
                            self.length = LENGTH_BASE[idx] as usize + self.bits.take(extra) as usize;
                            self.mode = Mode::Distance;
                            break;
                        }
                        _ => return Err(Error::invalid("invalid literal/length symbol")),
                    }
                },
                Mode::Distance => {
                    let Some((sym, len)) = self.peek_symbol(Table::Distances, input, pos)? else {
                        return Ok(Flow::Pause);
                    };
                    let sym = sym as usize;
                    if sym >= DIST_BASE.len() {
                        return Err(Error::invalid("distance symbol out of range"));
                    }
                    let extra = DIST_EXTRA[sym] as u32;
                    if !self.bits.fill(len + extra, input, pos) {
                        return Ok(Flow::Pause);
                    }
                    self.bits.consume(len);
                    self.dist = DIST_BASE[sym] as usize + self.bits.take(extra) as usize;
                    if self.dist > self.whave {
                        return Err(Error::invalid(format!(
                            "distance {} exceeds available history ({} bytes)",
                            self.dist, self.whave
                        )));
                    }
                    self.mode = Mode::Copy;
                }
                Mode::Copy => {
                    while self.length > 0 {
                        if *written == output.len() {
                            return Ok(Flow::Pause);
                        }
                        let byte = self.window[(self.wnext + WINDOW_SIZE - self.dist) & WINDOW_MASK];
                        self.put(output, written, byte);
                        self.length -= 1;
                    }
                    self.mode = Mode::Literal;
                }
                Mode::Check => {
                    self.bits.align();
                    if self.format == Format::Zlib {
                        if !self.bits.fill(32, input, pos) {
                            return Ok(Flow::Pause);
                        }
                        let mut expected = 0u32;
                        for _ in 0..4 {
                            expected = (expected << 8) | self.bits.take(8);
                        }
                        self.adler.update(&output[*hashed..*written]);
                        *hashed = *written;
                        let actual = self.adler.checksum();
                        if expected != actual {
                            return Err(Error::invalid(format!(
                                "Adler32 mismatch: expected {expected:#010x}, got {actual:#010x}"
                            )));
                        }
                    }
                    self.mode = Mode::Done;
                }
                Mode::Done => return Ok(Flow::Done),
                Mode::Bad => return Err(Error::StreamState("inflater failed earlier; reset it first")),
            }
        }
    }
}

fn inflate_to_vec(data: &[u8], format: Format, expected_size: Option<usize>) -> Result<Vec<u8>> {
    let mut inflater = Inflater::new(format);
    let initial = expected_size.unwrap_or(data.len().saturating_mul(3)).max(64);
    let mut out = alloc_zeroed(initial)?;
    let mut input = data;
    let mut written = 0;
    loop {
        if written == out.len() {
            let grow = out.len();
            out.try_reserve(grow)
                .map_err(|_| Error::OutOfMemory(out.len() + grow))?;
            out.resize(out.len() + grow, 0);
        }
        let res = inflater.inflate(input, &mut out[written..])?;
        input = &input[res.bytes_consumed..];
        written += res.bytes_written;
        match res.status {
            Status::StreamEnd => break,
            Status::NeedDict => {
                return Err(Error::unsupported("zlib FDICT preset dictionary not supported"))
            }
            Status::BufError => return Err(Error::invalid("unexpected end of compressed data")),
            Status::Ok => {}
        }
    }
    out.truncate(written);

    if let Some(exp) = expected_size {
        if written != exp {
            return Err(Error::invalid(format!(
                "decompressed size mismatch: expected {exp}, got {written}"
            )));
        }
    }
    Ok(out)
}

/// Inflate a raw DEFLATE stream.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    inflate_to_vec(data, Format::Raw, None)
}

/// Inflate a zlib-wrapped DEFLATE stream.
///
/// If `expected_size` is provided, the output buffer will be pre-allocated and
/// the final size validated against it.
pub fn inflate_zlib(data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>> {
    inflate_to_vec(data, Format::Zlib, expected_size)
}
