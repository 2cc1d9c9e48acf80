//! Bit-level readers and writers.
//!
//! DEFLATE packs bits LSB-first within each byte; JPEG entropy-coded data is
//! MSB-first with `0xFF 0x00` byte stuffing. The direction is fixed per type.

use std::io::{self, BufRead};

use crate::error::{Error, Result};

/// LSB-first bit writer used by the DEFLATE encoder.
///
/// Completed bytes accumulate in an internal buffer that can be drained
/// incrementally with [`BitWriter::drain_into`].
#[derive(Debug, Default)]
pub struct BitWriter {
    buffer: Vec<u8>,
    read_pos: usize,
    bit_buf: u64,
    bit_count: u32,
}

impl BitWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Append the low `num_bits` bits of `value` (at most 32).
    #[inline]
    pub fn write_bits(&mut self, value: u32, num_bits: u8) {
        debug_assert!(num_bits <= 32);
        debug_assert!(num_bits == 32 || value >> num_bits == 0);
        self.bit_buf |= (value as u64) << self.bit_count;
        self.bit_count += num_bits as u32;
        while self.bit_count >= 8 {
            self.buffer.push(self.bit_buf as u8);
            self.bit_buf >>= 8;
            self.bit_count -= 8;
        }
    }

    /// Pad with zero bits up to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        if self.bit_count > 0 {
            self.buffer.push(self.bit_buf as u8);
            self.bit_buf = 0;
            self.bit_count = 0;
        }
    }

    /// Append whole bytes. The writer must be byte-aligned.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        debug_assert_eq!(self.bit_count, 0, "write_bytes on unaligned writer");
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of bits written past the last complete byte.
    #[inline]
    pub fn pending_bits(&self) -> u32 {
        self.bit_count
    }

    /// Number of complete bytes not yet drained.
    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    /// True when no complete bytes are waiting to be drained.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy as many complete bytes as fit into `out`, returning the count.
    pub fn drain_into(&mut self, out: &mut [u8]) -> usize {
        let n = self.len().min(out.len());
        out[..n].copy_from_slice(&self.buffer[self.read_pos..self.read_pos + n]);
        self.read_pos += n;
        if self.read_pos == self.buffer.len() {
            self.buffer.clear();
            self.read_pos = 0;
        }
        n
    }

    /// Discard all buffered output and partial bits.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.read_pos = 0;
        self.bit_buf = 0;
        self.bit_count = 0;
    }

    /// Align and return every undrained byte.
    pub fn finish(mut self) -> Vec<u8> {
        self.align_to_byte();
        self.buffer.split_off(self.read_pos)
    }
}

/// Resumable LSB-first bit cursor used by the DEFLATE decoder.
///
/// The reader never owns input: callers pass the current input slice and a
/// position, and bits pulled into the accumulator persist across calls.
#[derive(Debug, Default, Clone)]
pub struct BitReader {
    hold: u64,
    count: u32,
}

impl BitReader {
    /// Create an empty cursor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pull whole bytes until at least `bits` are buffered or input runs out.
    /// Returns whether `bits` are available.
    #[inline]
    pub fn fill(&mut self, bits: u32, input: &[u8], pos: &mut usize) -> bool {
        debug_assert!(bits <= 56);
        while self.count < bits {
            let Some(&byte) = input.get(*pos) else {
                return false;
            };
            *pos += 1;
            self.hold |= (byte as u64) << self.count;
            self.count += 8;
        }
        true
    }

    /// Look at the low `bits` buffered bits without consuming them.
    #[inline]
    pub fn peek(&self, bits: u32) -> u32 {
        debug_assert!(bits <= 32);
        (self.hold & ((1u64 << bits) - 1)) as u32
    }

    /// Drop `bits` buffered bits.
    #[inline]
    pub fn consume(&mut self, bits: u32) {
        debug_assert!(bits <= self.count);
        self.hold >>= bits;
        self.count -= bits;
    }

    /// Remove and return `bits` buffered bits.
    #[inline]
    pub fn take(&mut self, bits: u32) -> u32 {
        let value = self.peek(bits);
        self.consume(bits);
        value
    }

    /// Discard bits up to the next byte boundary.
    #[inline]
    pub fn align(&mut self) {
        let extra = self.count % 8;
        self.consume(extra);
    }

    /// Raw view of the accumulator (low bit is the next bit in the stream).
    #[inline]
    pub fn hold(&self) -> u64 {
        self.hold
    }

    /// Number of buffered bits.
    #[inline]
    pub fn bit_count(&self) -> u32 {
        self.count
    }

    /// Forget everything buffered.
    pub fn clear(&mut self) {
        self.hold = 0;
        self.count = 0;
    }
}

/// MSB-first bit writer with JPEG byte stuffing.
///
/// Every `0xFF` produced by entropy coding is followed by a stuffed `0x00`.
#[derive(Debug, Default)]
pub struct BitWriterMsb {
    buffer: Vec<u8>,
    bit_buf: u32,
    bit_count: u32,
}

impl BitWriterMsb {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Append the low `num_bits` bits of `value`, most significant first (at most 16).
    #[inline]
    pub fn write_bits(&mut self, value: u32, num_bits: u8) {
        debug_assert!(num_bits <= 16);
        if num_bits == 0 {
            return;
        }
        let mask = (1u32 << num_bits) - 1;
        self.bit_buf = (self.bit_buf << num_bits) | (value & mask);
        self.bit_count += num_bits as u32;
        while self.bit_count >= 8 {
            self.bit_count -= 8;
            let byte = (self.bit_buf >> self.bit_count) as u8;
            self.buffer.push(byte);
            if byte == 0xFF {
                self.buffer.push(0x00);
            }
        }
        self.bit_buf &= (1u32 << self.bit_count) - 1;
    }

    /// Pad the final partial byte with one bits.
    pub fn flush(&mut self) {
        if self.bit_count > 0 {
            let pad = 8 - self.bit_count as u8;
            self.write_bits((1u32 << pad) - 1, pad);
        }
    }

    /// Append raw bytes (markers) without stuffing. Flushes first.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.flush();
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True when nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.bit_count == 0
    }

    /// Flush and return the encoded bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.flush();
        self.buffer
    }
}

/// MSB-first reader over JPEG entropy-coded data.
///
/// Stuffed zero bytes are skipped transparently. Any other byte following
/// `0xFF` is a marker: it ends the data, is remembered for [`take_marker`],
/// and further reads see zero padding. Consuming padding is an error.
///
/// [`take_marker`]: BitReaderMsb::take_marker
#[derive(Debug)]
pub struct BitReaderMsb<R> {
    inner: R,
    acc: u64,
    count: u32,
    padding: u32,
    marker: Option<u8>,
    eof: bool,
}

impl<R: BufRead> BitReaderMsb<R> {
    /// Wrap a buffered byte source positioned at the start of entropy data.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            acc: 0,
            count: 0,
            padding: 0,
            marker: None,
            eof: false,
        }
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let buf = self.inner.fill_buf()?;
        let Some(&byte) = buf.first() else {
            return Ok(None);
        };
        self.inner.consume(1);
        Ok(Some(byte))
    }

    fn fill(&mut self, bits: u32) -> Result<()> {
        while self.count < bits {
            let byte = if self.marker.is_some() || self.eof {
                None
            } else {
                self.next_data_byte()?
            };
            match byte {
                Some(b) => self.acc |= (b as u64) << (56 - self.count),
                None => self.padding += 8,
            }
            self.count += 8;
        }
        Ok(())
    }

    fn next_data_byte(&mut self) -> Result<Option<u8>> {
        let Some(byte) = self.next_byte()? else {
            self.eof = true;
            return Ok(None);
        };
        if byte != 0xFF {
            return Ok(Some(byte));
        }
        loop {
            match self.next_byte()? {
                None => {
                    self.eof = true;
                    return Ok(None);
                }
                Some(0x00) => return Ok(Some(0xFF)),
                Some(0xFF) => continue,
                Some(code) => {
                    self.marker = Some(code);
                    return Ok(None);
                }
            }
        }
    }

    /// Look at the next `bits` bits (at most 16); padding reads as zero.
    #[inline]
    pub fn peek(&mut self, bits: u32) -> Result<u32> {
        debug_assert!(bits <= 16);
        if bits == 0 {
            return Ok(0);
        }
        self.fill(bits)?;
        Ok((self.acc >> (64 - bits)) as u32)
    }

    /// Consume `bits` previously peeked bits.
    #[inline]
    pub fn consume(&mut self, bits: u32) -> Result<()> {
        if bits == 0 {
            return Ok(());
        }
        self.fill(bits)?;
        if bits + self.padding > self.count {
            return Err(Error::invalid("entropy-coded data ended prematurely"));
        }
        self.acc <<= bits;
        self.count -= bits;
        Ok(())
    }

    /// Read the next `bits` bits (0..=16).
    #[inline]
    pub fn read_bits(&mut self, bits: u32) -> Result<u32> {
        let value = self.peek(bits)?;
        self.consume(bits)?;
        Ok(value)
    }

    /// Read a single bit.
    #[inline]
    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    /// Drop buffered bits, including whole bytes already loaded, so reading
    /// resumes at the byte after the stashed marker.
    pub fn reset(&mut self) {
        self.acc = 0;
        self.count = 0;
        self.padding = 0;
    }

    /// Return the marker that ended the data, reading ahead to find it if the
    /// decoder stopped before the entropy bytes ran out.
    pub fn take_marker(&mut self) -> Result<Option<u8>> {
        while self.marker.is_none() && !self.eof {
            self.next_data_byte()?;
        }
        Ok(self.marker.take())
    }

    /// Recover the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_writer_lsb_order() {
        let mut writer = BitWriter::new();
        writer.write_bits(1, 1);
        writer.write_bits(1, 2);
        writer.write_bits(0b10110, 5);
        assert_eq!(writer.finish(), vec![0b1011_0011]);
    }

    #[test]
    fn test_bit_writer_drain_in_pieces() {
        let mut writer = BitWriter::new();
        for b in 0..10u32 {
            writer.write_bits(b, 8);
        }
        let mut out = [0u8; 4];
        assert_eq!(writer.drain_into(&mut out), 4);
        assert_eq!(out, [0, 1, 2, 3]);
        assert_eq!(writer.len(), 6);
        let mut rest = [0u8; 16];
        assert_eq!(writer.drain_into(&mut rest), 6);
        assert_eq!(&rest[..6], &[4, 5, 6, 7, 8, 9]);
        assert!(writer.is_empty());
    }

    #[test]
    fn test_bit_reader_resumes_across_slices() {
        let data = [0b1011_0011u8, 0xAA];
        let mut reader = BitReader::new();

        let mut pos = 0;
        assert!(reader.fill(3, &data[..1], &mut pos));
        assert_eq!(reader.take(1), 1);
        assert_eq!(reader.take(2), 1);
        assert!(!reader.fill(12, &data[..1], &mut pos));
        assert_eq!(reader.bit_count(), 5);

        let mut pos = 0;
        assert!(reader.fill(12, &data[1..], &mut pos));
        assert_eq!(reader.take(5), 0b10110);
        assert_eq!(reader.take(8), 0xAA);
    }

    #[test]
    fn test_bit_reader_align() {
        let data = [0xFFu8, 0x12];
        let mut reader = BitReader::new();
        let mut pos = 0;
        assert!(reader.fill(16, &data, &mut pos));
        reader.consume(3);
        reader.align();
        assert_eq!(reader.take(8), 0x12);
    }

    #[test]
    fn test_msb_writer_stuffs_ff() {
        let mut writer = BitWriterMsb::new();
        writer.write_bits(0xFF, 8);
        writer.write_bits(0b101, 3);
        let bytes = writer.finish();
        assert_eq!(bytes, vec![0xFF, 0x00, 0b1011_1111]);
    }

    #[test]
    fn test_msb_reader_unstuffs_and_stops_at_marker() {
        let data = [0xFFu8, 0x00, 0b1010_0000, 0xFF, 0xD0, 0x55];
        let mut reader = BitReaderMsb::new(&data[..]);
        assert_eq!(reader.read_bits(8).unwrap(), 0xFF);
        assert_eq!(reader.read_bits(3).unwrap(), 0b101);
        assert_eq!(reader.read_bits(5).unwrap(), 0);
        // Only padding remains.
        assert_eq!(reader.peek(8).unwrap(), 0);
        assert!(reader.read_bits(1).is_err());
        assert_eq!(reader.take_marker().unwrap(), Some(0xD0));
        reader.reset();
        assert_eq!(reader.read_bits(8).unwrap(), 0x55);
    }

    #[test]
    fn test_msb_reader_skips_fill_bytes_before_marker() {
        let data = [0x80u8, 0xFF, 0xFF, 0xFF, 0xD9];
        let mut reader = BitReaderMsb::new(&data[..]);
        assert!(reader.read_bit().unwrap());
        assert_eq!(reader.take_marker().unwrap(), Some(0xD9));
    }

    #[test]
    fn test_msb_reader_eof_is_error_only_when_consumed() {
        let data = [0xC0u8];
        let mut reader = BitReaderMsb::new(&data[..]);
        assert_eq!(reader.peek(16).unwrap(), 0xC000);
        assert_eq!(reader.read_bits(2).unwrap(), 0b11);
        assert_eq!(reader.read_bits(6).unwrap(), 0);
        assert!(reader.read_bits(1).is_err());
        assert_eq!(reader.take_marker().unwrap(), None);
    }
}
