//! LZ77 match finding over a sliding window.
//!
//! The window holds two 32 KiB halves plus lookahead slack. Every position
//! with at least three bytes of lookahead is threaded onto a hash chain
//! keyed by those three bytes; `head` holds the newest position per hash
//! and `prev` links each position to the previous one with the same hash.
//! When the read position crosses into the upper half, the upper half is
//! copied down and every chain entry is rebased.
//!
//! Parsers pull input into the window, push [`Token`]s into a
//! [`TokenSink`] and stop as soon as the sink reports a full block, so the
//! caller can emit the block and resume exactly where parsing left off.

use crate::compress::Strategy;
use crate::error::{alloc_filled, alloc_zeroed, Result};

/// Size of one window half; also the largest DEFLATE distance.
pub const WINDOW_SIZE: usize = 32768;

const WINDOW_MASK: usize = WINDOW_SIZE - 1;

/// Maximum match length (as per DEFLATE spec).
pub const MAX_MATCH_LENGTH: usize = 258;

/// Minimum match length worth encoding.
pub const MIN_MATCH_LENGTH: usize = 3;

/// Lookahead needed to guarantee a full-length match can be examined.
pub const MIN_LOOKAHEAD: usize = MAX_MATCH_LENGTH + MIN_MATCH_LENGTH + 1;

/// Farthest distance matches are searched at; keeps the lookahead inside the window.
pub const MAX_DISTANCE: usize = WINDOW_SIZE - MIN_LOOKAHEAD;

/// Largest payload of a single stored block.
pub const MAX_STORED: usize = 65535;

/// Length-3 matches farther back than this are not worth their distance bits.
const TOO_FAR: usize = 4096;

const HASH_BITS: usize = 15;
const HASH_SIZE: usize = 1 << HASH_BITS;
const HASH_MASK: usize = HASH_SIZE - 1;
/// Shift chosen so three updates push the oldest byte out of the hash.
const HASH_SHIFT: usize = (HASH_BITS + MIN_MATCH_LENGTH - 1) / MIN_MATCH_LENGTH;

const NIL: i32 = -1;

/// LZ77 token representing either a literal or a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// A literal byte that couldn't be compressed.
    Literal(u8),
    /// A back-reference: (length, distance).
    Match {
        /// Length of the match (3-258).
        length: u16,
        /// Distance back to the match (1-32768).
        distance: u16,
    },
}

/// Match-search tuning for one compression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchConfig {
    /// Quarter the chain search once the previous match is at least this long.
    pub good_length: u16,
    /// Lazy parsers skip the search when the previous match reaches this;
    /// greedy parsers only hash match interiors up to this length.
    pub max_lazy: u16,
    /// Stop searching once a match this long is found.
    pub nice_length: u16,
    /// Maximum hash-chain links followed per search.
    pub max_chain: u16,
}

impl MatchConfig {
    const fn new(good_length: u16, max_lazy: u16, nice_length: u16, max_chain: u16) -> Self {
        Self {
            good_length,
            max_lazy,
            nice_length,
            max_chain,
        }
    }

    /// Tuning for `level` (clamped to 0-9).
    pub fn for_level(level: u8) -> Self {
        LEVEL_CONFIG[level.min(9) as usize]
    }
}

/// Per-level tuning. Level 0 stores; 1-3 parse greedily; 4-9 lazily.
pub const LEVEL_CONFIG: [MatchConfig; 10] = [
    MatchConfig::new(0, 0, 0, 0),
    MatchConfig::new(4, 4, 8, 4),
    MatchConfig::new(4, 5, 16, 8),
    MatchConfig::new(4, 6, 32, 32),
    MatchConfig::new(4, 4, 16, 16),
    MatchConfig::new(8, 16, 32, 32),
    MatchConfig::new(8, 16, 128, 128),
    MatchConfig::new(8, 32, 128, 256),
    MatchConfig::new(32, 128, 258, 1024),
    MatchConfig::new(32, 258, 258, 4096),
];

/// Which parser drives the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// No matching; input is only accumulated for stored blocks.
    Stored,
    /// Take the first acceptable match at each position.
    Greedy,
    /// Defer each match by one byte in case the next position matches longer.
    Lazy,
    /// Literals only.
    HuffmanOnly,
    /// Runs of the previous byte (distance 1) only.
    Rle,
}

impl ParseMode {
    /// Parser used for a level and strategy.
    pub fn select(level: u8, strategy: Strategy) -> Self {
        match (level, strategy) {
            (0, _) => ParseMode::Stored,
            (_, Strategy::HuffmanOnly) => ParseMode::HuffmanOnly,
            (_, Strategy::Rle) => ParseMode::Rle,
            (1..=3, _) => ParseMode::Greedy,
            _ => ParseMode::Lazy,
        }
    }
}

/// Receiver of parsed tokens.
pub trait TokenSink {
    /// Record a token. Returns `true` once the current block is full and
    /// should be emitted before parsing continues. A full sink must still
    /// accept one more token.
    fn push(&mut self, token: Token) -> bool;
}

/// Why a parser stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parse {
    /// All input was pulled in and too little lookahead remains to continue
    /// without a flush.
    NeedInput,
    /// The sink is full; emit the block and call again.
    BlockFull,
    /// Flush requested and every buffered byte has been tokenized.
    Drained,
}

/// Sliding window with hash chains and the parse state that spans calls.
pub struct SlidingWindow {
    buf: Vec<u8>,
    head: Vec<i32>,
    prev: Vec<i32>,
    ins_h: usize,
    /// Next position to tokenize.
    strstart: usize,
    /// Valid bytes at and after `strstart`.
    lookahead: usize,
    /// Window position where the current block began; negative once the
    /// block's first bytes have slid out of the window.
    block_start: isize,
    /// Bytes before `strstart` not yet inserted into the hash chains.
    insert: usize,
    match_length: usize,
    match_start: usize,
    prev_length: usize,
    prev_match: usize,
    match_available: bool,
    config: MatchConfig,
    mode: ParseMode,
    filtered: bool,
}

impl SlidingWindow {
    /// Allocate a window tuned for `level` and `strategy`.
    pub fn new(level: u8, strategy: Strategy) -> Result<Self> {
        let mut window = Self {
            buf: alloc_zeroed(2 * WINDOW_SIZE + MIN_LOOKAHEAD)?,
            head: alloc_filled(HASH_SIZE, NIL)?,
            prev: alloc_filled(WINDOW_SIZE, NIL)?,
            ins_h: 0,
            strstart: 0,
            lookahead: 0,
            block_start: 0,
            insert: 0,
            match_length: 0,
            match_start: 0,
            prev_length: 0,
            prev_match: 0,
            match_available: false,
            config: MatchConfig::for_level(level),
            mode: ParseMode::select(level, strategy),
            filtered: strategy == Strategy::Filtered,
        };
        window.reset();
        Ok(window)
    }

    /// Forget all input and history, keeping the tuning.
    pub fn reset(&mut self) {
        self.head.fill(NIL);
        self.prev.fill(NIL);
        self.ins_h = 0;
        self.strstart = 0;
        self.lookahead = 0;
        self.block_start = 0;
        self.insert = 0;
        self.match_length = MIN_MATCH_LENGTH - 1;
        self.prev_length = MIN_MATCH_LENGTH - 1;
        self.match_start = 0;
        self.prev_match = 0;
        self.match_available = false;
    }

    /// Parser in use.
    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    /// Buffered bytes not yet tokenized.
    pub fn lookahead(&self) -> usize {
        self.lookahead
    }

    /// Whether any window bytes belong to the block not yet emitted.
    pub fn has_pending_block(&self) -> bool {
        self.block_end() as isize > self.block_start
    }

    /// Uncompressed bytes of the pending block, if they are all still in the window.
    pub fn block_bytes(&self) -> Option<&[u8]> {
        let start = usize::try_from(self.block_start).ok()?;
        Some(&self.buf[start..self.block_end()])
    }

    /// Length of the pending block in uncompressed bytes.
    pub fn block_len(&self) -> usize {
        (self.block_end() as isize - self.block_start) as usize
    }

    /// Mark the pending block as emitted.
    pub fn start_next_block(&mut self) {
        self.block_start = self.block_end() as isize;
    }

    /// Drop all match history (full flush). Positions restart at zero when
    /// nothing is buffered.
    pub fn forget_history(&mut self) {
        self.head.fill(NIL);
        if self.lookahead == 0 {
            self.strstart = 0;
            self.block_start = 0;
            self.insert = 0;
        }
    }

    /// Preload `dict` as history. Only the last window's worth is kept.
    pub fn set_dictionary(&mut self, dict: &[u8]) {
        let dict = &dict[dict.len().saturating_sub(WINDOW_SIZE)..];
        self.reset();
        self.buf[..dict.len()].copy_from_slice(dict);
        if dict.len() >= MIN_MATCH_LENGTH {
            self.ins_h = (dict[0] as usize) & HASH_MASK;
            self.ins_h = update_hash(self.ins_h, dict[1]);
            for pos in 0..=dict.len() - MIN_MATCH_LENGTH {
                self.insert_string(pos);
            }
        }
        self.strstart = dict.len();
        self.block_start = dict.len() as isize;
        self.insert = dict.len().min(MIN_MATCH_LENGTH - 1);
    }

    fn block_end(&self) -> usize {
        self.strstart - self.match_available as usize
    }

    /// Tokenize buffered and new input until input runs out, the sink
    /// fills, or (with `flush`) everything has been tokenized.
    pub fn parse<S: TokenSink>(
        &mut self,
        input: &[u8],
        pos: &mut usize,
        flush: bool,
        sink: &mut S,
    ) -> Parse {
        match self.mode {
            ParseMode::Stored => self.parse_stored(input, pos, flush),
            ParseMode::Greedy => self.parse_greedy(input, pos, flush, sink),
            ParseMode::Lazy => self.parse_lazy(input, pos, flush, sink),
            ParseMode::HuffmanOnly => self.parse_literals(input, pos, flush, sink),
            ParseMode::Rle => self.parse_rle(input, pos, flush, sink),
        }
    }

    /// Copy input into the window, sliding the upper half down when the
    /// read position gets close to the end.
    fn fill(&mut self, input: &[u8], pos: &mut usize) {
        loop {
            let mut more = 2 * WINDOW_SIZE - self.lookahead - self.strstart;

            if self.strstart >= WINDOW_SIZE + MAX_DISTANCE {
                self.buf.copy_within(WINDOW_SIZE..2 * WINDOW_SIZE, 0);
                self.match_start = self.match_start.saturating_sub(WINDOW_SIZE);
                self.strstart -= WINDOW_SIZE;
                self.block_start -= WINDOW_SIZE as isize;
                self.insert = self.insert.min(self.strstart);
                self.slide_chains();
                more += WINDOW_SIZE;
            }

            if *pos >= input.len() {
                return;
            }

            let n = more.min(input.len() - *pos);
            let dst = self.strstart + self.lookahead;
            self.buf[dst..dst + n].copy_from_slice(&input[*pos..*pos + n]);
            *pos += n;
            self.lookahead += n;

            if self.lookahead + self.insert >= MIN_MATCH_LENGTH {
                let mut s = self.strstart - self.insert;
                self.ins_h = (self.buf[s] as usize) & HASH_MASK;
                self.ins_h = update_hash(self.ins_h, self.buf[s + 1]);
                while self.insert > 0 {
                    self.insert_string(s);
                    s += 1;
                    self.insert -= 1;
                    if self.lookahead + self.insert < MIN_MATCH_LENGTH {
                        break;
                    }
                }
            }

            if self.lookahead >= MIN_LOOKAHEAD || *pos >= input.len() {
                return;
            }
        }
    }

    fn slide_chains(&mut self) {
        let w = WINDOW_SIZE as i32;
        for entry in self.head.iter_mut().chain(self.prev.iter_mut()) {
            *entry = if *entry >= w { *entry - w } else { NIL };
        }
    }

    /// Thread `pos` onto its hash chain and return the previous chain head.
    #[inline]
    fn insert_string(&mut self, pos: usize) -> i32 {
        self.ins_h = update_hash(self.ins_h, self.buf[pos + MIN_MATCH_LENGTH - 1]);
        let head = self.head[self.ins_h];
        self.prev[pos & WINDOW_MASK] = head;
        self.head[self.ins_h] = pos as i32;
        head
    }

    /// Longest match at `strstart` along the chain starting at `cur_match`.
    /// Only a strictly longer candidate replaces the current best, so among
    /// equal lengths the nearest wins.
    fn longest_match(&mut self, cur_match: i32) -> usize {
        let scan = self.strstart;
        let mut chain = self.config.max_chain as usize;
        let mut best_len = self.prev_length;
        let nice = (self.config.nice_length as usize).min(self.lookahead);
        let max_len = MAX_MATCH_LENGTH.min(self.lookahead);

        if best_len >= max_len {
            return best_len.min(self.lookahead);
        }
        if self.prev_length >= self.config.good_length as usize {
            chain >>= 2;
        }
        let limit = if scan > MAX_DISTANCE {
            (scan - MAX_DISTANCE) as i32
        } else {
            NIL
        };

        let mut cur = cur_match;
        loop {
            let m = cur as usize;
            let buf = &self.buf;
            if buf[m + best_len] == buf[scan + best_len]
                && buf[m + best_len - 1] == buf[scan + best_len - 1]
                && buf[m] == buf[scan]
                && buf[m + 1] == buf[scan + 1]
            {
                let len = common_prefix(buf, m, scan, max_len);
                if len > best_len {
                    self.match_start = m;
                    best_len = len;
                    if len >= nice {
                        break;
                    }
                }
            }

            cur = self.prev[m & WINDOW_MASK];
            if cur <= limit {
                break;
            }
            chain -= 1;
            if chain == 0 {
                break;
            }
        }

        best_len.min(self.lookahead)
    }

    fn candidate(&self, hash_head: i32) -> Option<i32> {
        (hash_head != NIL && self.strstart - hash_head as usize <= MAX_DISTANCE)
            .then_some(hash_head)
    }

    fn parse_stored(&mut self, input: &[u8], pos: &mut usize, flush: bool) -> Parse {
        loop {
            if self.lookahead == 0 {
                self.fill(input, pos);
                if self.lookahead == 0 {
                    if !flush {
                        return Parse::NeedInput;
                    }
                    break;
                }
            }

            self.strstart += self.lookahead;
            self.lookahead = 0;

            let max_end = self.block_start + MAX_STORED as isize;
            if self.strstart as isize >= max_end {
                self.lookahead = (self.strstart as isize - max_end) as usize;
                self.strstart = max_end as usize;
                return Parse::BlockFull;
            }
            // Emit before the block's first byte can slide out of the window.
            if self.strstart as isize - self.block_start >= MAX_DISTANCE as isize {
                return Parse::BlockFull;
            }
        }
        self.insert = 0;
        Parse::Drained
    }

    fn parse_greedy<S: TokenSink>(
        &mut self,
        input: &[u8],
        pos: &mut usize,
        flush: bool,
        sink: &mut S,
    ) -> Parse {
        loop {
            if self.lookahead < MIN_LOOKAHEAD {
                self.fill(input, pos);
                if self.lookahead < MIN_LOOKAHEAD && !flush {
                    return Parse::NeedInput;
                }
                if self.lookahead == 0 {
                    break;
                }
            }

            let mut hash_head = NIL;
            if self.lookahead >= MIN_MATCH_LENGTH {
                hash_head = self.insert_string(self.strstart);
            }
            if let Some(cur) = self.candidate(hash_head) {
                self.match_length = self.longest_match(cur);
            }

            let full;
            if self.match_length >= MIN_MATCH_LENGTH {
                full = sink.push(Token::Match {
                    length: self.match_length as u16,
                    distance: (self.strstart - self.match_start) as u16,
                });
                self.lookahead -= self.match_length;

                if self.match_length <= self.config.max_lazy as usize
                    && self.lookahead >= MIN_MATCH_LENGTH
                {
                    // Hash every position inside the match.
                    self.match_length -= 1;
                    while self.match_length > 0 {
                        self.strstart += 1;
                        self.insert_string(self.strstart);
                        self.match_length -= 1;
                    }
                    self.strstart += 1;
                } else {
                    self.strstart += self.match_length;
                    self.match_length = 0;
                    self.ins_h = (self.buf[self.strstart] as usize) & HASH_MASK;
                    self.ins_h = update_hash(self.ins_h, self.buf[self.strstart + 1]);
                }
            } else {
                full = sink.push(Token::Literal(self.buf[self.strstart]));
                self.lookahead -= 1;
                self.strstart += 1;
            }

            if full {
                return Parse::BlockFull;
            }
        }
        self.insert = self.strstart.min(MIN_MATCH_LENGTH - 1);
        Parse::Drained
    }

    fn parse_lazy<S: TokenSink>(
        &mut self,
        input: &[u8],
        pos: &mut usize,
        flush: bool,
        sink: &mut S,
    ) -> Parse {
        loop {
            if self.lookahead < MIN_LOOKAHEAD {
                self.fill(input, pos);
                if self.lookahead < MIN_LOOKAHEAD && !flush {
                    return Parse::NeedInput;
                }
                if self.lookahead == 0 {
                    break;
                }
            }

            let mut hash_head = NIL;
            if self.lookahead >= MIN_MATCH_LENGTH {
                hash_head = self.insert_string(self.strstart);
            }

            self.prev_length = self.match_length;
            self.prev_match = self.match_start;
            self.match_length = MIN_MATCH_LENGTH - 1;

            if self.prev_length < self.config.max_lazy as usize {
                if let Some(cur) = self.candidate(hash_head) {
                    self.match_length = self.longest_match(cur);
                    if self.match_length <= 5
                        && (self.filtered
                            || (self.match_length == MIN_MATCH_LENGTH
                                && self.strstart - self.match_start > TOO_FAR))
                    {
                        self.match_length = MIN_MATCH_LENGTH - 1;
                    }
                }
            }

            if self.prev_length >= MIN_MATCH_LENGTH && self.match_length <= self.prev_length {
                // The match found one byte back is at least as good: take it.
                let max_insert = self.strstart + self.lookahead - MIN_MATCH_LENGTH;
                let full = sink.push(Token::Match {
                    length: self.prev_length as u16,
                    distance: (self.strstart - 1 - self.prev_match) as u16,
                });
                self.lookahead -= self.prev_length - 1;
                self.prev_length -= 2;
                while self.prev_length > 0 {
                    self.strstart += 1;
                    if self.strstart <= max_insert {
                        self.insert_string(self.strstart);
                    }
                    self.prev_length -= 1;
                }
                self.match_available = false;
                self.match_length = MIN_MATCH_LENGTH - 1;
                self.strstart += 1;
                if full {
                    return Parse::BlockFull;
                }
            } else if self.match_available {
                let full = sink.push(Token::Literal(self.buf[self.strstart - 1]));
                self.strstart += 1;
                self.lookahead -= 1;
                if full {
                    return Parse::BlockFull;
                }
            } else {
                self.match_available = true;
                self.strstart += 1;
                self.lookahead -= 1;
            }
        }

        if self.match_available {
            sink.push(Token::Literal(self.buf[self.strstart - 1]));
            self.match_available = false;
        }
        self.insert = self.strstart.min(MIN_MATCH_LENGTH - 1);
        Parse::Drained
    }

    fn parse_rle<S: TokenSink>(
        &mut self,
        input: &[u8],
        pos: &mut usize,
        flush: bool,
        sink: &mut S,
    ) -> Parse {
        loop {
            if self.lookahead <= MAX_MATCH_LENGTH {
                self.fill(input, pos);
                if self.lookahead <= MAX_MATCH_LENGTH && !flush {
                    return Parse::NeedInput;
                }
                if self.lookahead == 0 {
                    break;
                }
            }

            let mut run = 0;
            if self.lookahead >= MIN_MATCH_LENGTH && self.strstart > 0 {
                let s = self.strstart;
                let byte = self.buf[s - 1];
                if self.buf[s..s + MIN_MATCH_LENGTH].iter().all(|&b| b == byte) {
                    let max = MAX_MATCH_LENGTH.min(self.lookahead);
                    run = self.buf[s..s + max]
                        .iter()
                        .take_while(|&&b| b == byte)
                        .count();
                }
            }

            let full = if run >= MIN_MATCH_LENGTH {
                self.lookahead -= run;
                self.strstart += run;
                sink.push(Token::Match {
                    length: run as u16,
                    distance: 1,
                })
            } else {
                let byte = self.buf[self.strstart];
                self.lookahead -= 1;
                self.strstart += 1;
                sink.push(Token::Literal(byte))
            };
            if full {
                return Parse::BlockFull;
            }
        }
        self.insert = 0;
        Parse::Drained
    }

    fn parse_literals<S: TokenSink>(
        &mut self,
        input: &[u8],
        pos: &mut usize,
        flush: bool,
        sink: &mut S,
    ) -> Parse {
        loop {
            if self.lookahead == 0 {
                self.fill(input, pos);
                if self.lookahead == 0 {
                    if !flush {
                        return Parse::NeedInput;
                    }
                    break;
                }
            }
            let byte = self.buf[self.strstart];
            self.lookahead -= 1;
            self.strstart += 1;
            if sink.push(Token::Literal(byte)) {
                return Parse::BlockFull;
            }
        }
        self.insert = 0;
        Parse::Drained
    }
}

#[inline]
fn update_hash(h: usize, byte: u8) -> usize {
    ((h << HASH_SHIFT) ^ byte as usize) & HASH_MASK
}

#[inline]
fn load_u64(buf: &[u8], at: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(word)
}

/// Number of equal bytes at `a` and `b`, up to `max_len`, compared a word at a time.
#[inline]
fn common_prefix(buf: &[u8], a: usize, b: usize, max_len: usize) -> usize {
    let mut length = 0;
    while length + 8 <= max_len {
        let xor = load_u64(buf, a + length) ^ load_u64(buf, b + length);
        if xor != 0 {
            return length + (xor.trailing_zeros() / 8) as usize;
        }
        length += 8;
    }
    while length < max_len && buf[a + length] == buf[b + length] {
        length += 1;
    }
    length
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unbounded sink, optionally reporting "full" every `block` tokens.
    struct Collect {
        tokens: Vec<Token>,
        block: usize,
    }

    impl Collect {
        fn new() -> Self {
            Self {
                tokens: Vec::new(),
                block: usize::MAX,
            }
        }
    }

    impl TokenSink for Collect {
        fn push(&mut self, token: Token) -> bool {
            self.tokens.push(token);
            self.tokens.len() % self.block == 0
        }
    }

    fn expand(tokens: &[Token]) -> Vec<u8> {
        let mut out = Vec::new();
        for &token in tokens {
            match token {
                Token::Literal(b) => out.push(b),
                Token::Match { length, distance } => {
                    assert!((MIN_MATCH_LENGTH..=MAX_MATCH_LENGTH).contains(&(length as usize)));
                    assert!(distance as usize >= 1 && distance as usize <= out.len());
                    let start = out.len() - distance as usize;
                    for i in 0..length as usize {
                        out.push(out[start + i]);
                    }
                }
            }
        }
        out
    }

    fn tokenize(data: &[u8], level: u8, strategy: Strategy) -> Vec<Token> {
        let mut window = SlidingWindow::new(level, strategy).unwrap();
        let mut sink = Collect::new();
        let mut pos = 0;
        assert_eq!(window.parse(data, &mut pos, true, &mut sink), Parse::Drained);
        assert_eq!(pos, data.len());
        sink.tokens
    }

    fn sample(len: usize) -> Vec<u8> {
        let words: [&[u8]; 5] = [b"pixel ", b"row ", b"filter ", b"deflate ", b"window "];
        let mut out = Vec::with_capacity(len);
        let mut state = 12345u32;
        while out.len() < len {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
            out.extend_from_slice(words[(state >> 16) as usize % words.len()]);
            if state % 7 == 0 {
                out.push((state >> 8) as u8);
            }
        }
        out.truncate(len);
        out
    }

    #[test]
    fn test_lz77_no_matches() {
        let data = b"abcdefgh";
        let tokens = tokenize(data, 6, Strategy::Default);
        assert_eq!(tokens.len(), 8);
        for (i, &token) in tokens.iter().enumerate() {
            assert_eq!(token, Token::Literal(data[i]));
        }
    }

    #[test]
    fn test_lz77_empty() {
        assert!(tokenize(&[], 6, Strategy::Default).is_empty());
    }

    #[test]
    fn test_lazy_prefers_longer_match_one_byte_later() {
        // At "abcdefgh" the best match is "abc" (3); one byte later "bcdefgh" matches 7.
        let data = b"xabcbcdefghQabcdefgh";
        let lazy = tokenize(data, 6, Strategy::Default);
        assert!(lazy.contains(&Token::Match {
            length: 7,
            distance: 9
        }));
        assert_eq!(expand(&lazy), data);

        let greedy = tokenize(data, 1, Strategy::Default);
        assert!(greedy.contains(&Token::Match {
            length: 3,
            distance: 11
        }));
        assert_eq!(expand(&greedy), data);
    }

    #[test]
    fn test_equal_length_prefers_nearest() {
        let data = b"abcd1abcd2abcd";
        for level in [1, 9] {
            let tokens = tokenize(data, level, Strategy::Default);
            assert_eq!(
                tokens.last(),
                Some(&Token::Match {
                    length: 4,
                    distance: 5
                }),
                "level {}",
                level
            );
        }
    }

    #[test]
    fn test_rle_uses_distance_one() {
        let tokens = tokenize(b"aaaaaaaaaa", 6, Strategy::Rle);
        assert_eq!(
            tokens,
            vec![
                Token::Literal(b'a'),
                Token::Match {
                    length: 9,
                    distance: 1
                }
            ]
        );
    }

    #[test]
    fn test_huffman_only_emits_literals() {
        let data = b"abcabcabcabc";
        let tokens = tokenize(data, 6, Strategy::HuffmanOnly);
        assert_eq!(tokens.len(), data.len());
        assert!(tokens.iter().all(|t| matches!(t, Token::Literal(_))));
    }

    #[test]
    fn test_filtered_drops_short_matches() {
        let data = b"abcdeXabcdeYabcdefghijZabcdefghij";
        let tokens = tokenize(data, 6, Strategy::Filtered);
        for token in &tokens {
            if let Token::Match { length, .. } = token {
                assert!(*length > 5);
            }
        }
        assert_eq!(expand(&tokens), data);
    }

    #[test]
    fn test_filtered_is_default_at_greedy_levels() {
        let data = b"abcdeXabcdeYabcdefghijZabcdefghij";
        for level in 1..=3 {
            assert_eq!(
                tokenize(data, level, Strategy::Filtered),
                tokenize(data, level, Strategy::Default),
                "level {}",
                level
            );
        }
        let short = tokenize(data, 1, Strategy::Filtered)
            .iter()
            .any(|t| matches!(t, Token::Match { length, .. } if *length <= 5));
        assert!(short);
    }

    #[test]
    fn test_every_level_reconstructs_across_window_slides() {
        let data = sample(200_000);
        for level in 1..=9 {
            let tokens = tokenize(&data, level, Strategy::Default);
            assert_eq!(expand(&tokens), data, "level {}", level);
        }
        for strategy in [Strategy::Filtered, Strategy::Rle, Strategy::HuffmanOnly] {
            let tokens = tokenize(&data, 6, strategy);
            assert_eq!(expand(&tokens), data, "{:?}", strategy);
        }
    }

    #[test]
    fn test_matches_stay_within_window() {
        let mut data = sample(40_000);
        data.extend_from_within(..40_000);
        for token in tokenize(&data, 9, Strategy::Default) {
            if let Token::Match { distance, .. } = token {
                assert!(distance as usize <= MAX_DISTANCE);
            }
        }
    }

    #[test]
    fn test_incremental_input_and_full_blocks() {
        let data = sample(100_000);
        let mut window = SlidingWindow::new(6, Strategy::Default).unwrap();
        let mut sink = Collect {
            tokens: Vec::new(),
            block: 1000,
        };
        let mut blocks = 0;
        let pieces: Vec<&[u8]> = data.chunks(4097).collect();
        for (i, piece) in pieces.iter().enumerate() {
            let last = i + 1 == pieces.len();
            let mut pos = 0;
            loop {
                match window.parse(piece, &mut pos, last, &mut sink) {
                    Parse::BlockFull => {
                        blocks += 1;
                        window.start_next_block();
                    }
                    Parse::NeedInput => {
                        assert_eq!(pos, piece.len());
                        break;
                    }
                    Parse::Drained => {
                        assert!(last);
                        break;
                    }
                }
            }
        }
        assert!(blocks > 0);
        assert_eq!(expand(&sink.tokens), data);
    }

    #[test]
    fn test_stored_mode_splits_blocks() {
        let data = sample(150_000);
        let mut window = SlidingWindow::new(0, Strategy::Default).unwrap();
        let mut sink = Collect::new();
        let mut pos = 0;
        let mut stored = Vec::new();
        loop {
            match window.parse(&data, &mut pos, true, &mut sink) {
                Parse::BlockFull | Parse::Drained if window.has_pending_block() => {
                    let bytes = window.block_bytes().unwrap();
                    assert!(bytes.len() <= MAX_STORED);
                    stored.extend_from_slice(bytes);
                    window.start_next_block();
                }
                Parse::Drained => break,
                other => panic!("unexpected {:?}", other),
            }
        }
        assert!(sink.tokens.is_empty());
        assert_eq!(stored, data);
    }

    #[test]
    fn test_dictionary_supplies_history() {
        let dict = b"the quick brown fox jumps over the lazy dog";
        let mut window = SlidingWindow::new(6, Strategy::Default).unwrap();
        window.set_dictionary(dict);
        let mut sink = Collect::new();
        let mut pos = 0;
        window.parse(b"quick brown fox", &mut pos, true, &mut sink);
        assert_eq!(
            sink.tokens,
            vec![Token::Match {
                length: 15,
                distance: 39
            }]
        );
    }

    #[test]
    fn test_common_prefix() {
        let buf = b"abcdefghijklmnopabcdefghijkXmnop";
        assert_eq!(common_prefix(buf, 0, 16, 16), 11);
        assert_eq!(common_prefix(buf, 0, 16, 5), 5);
        assert_eq!(common_prefix(buf, 0, 0, 16), 16);
    }

    #[test]
    fn test_level_config_table() {
        assert_eq!(MatchConfig::for_level(6), MatchConfig::new(8, 16, 128, 128));
        assert_eq!(MatchConfig::for_level(9).max_chain, 4096);
        assert_eq!(ParseMode::select(0, Strategy::Rle), ParseMode::Stored);
        assert_eq!(ParseMode::select(3, Strategy::Default), ParseMode::Greedy);
        assert_eq!(ParseMode::select(4, Strategy::Filtered), ParseMode::Lazy);
        assert_eq!(ParseMode::select(9, Strategy::HuffmanOnly), ParseMode::HuffmanOnly);
    }
}
