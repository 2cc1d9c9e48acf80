//! Adler-32 checksum (RFC 1950), used by the zlib envelope.

/// Largest prime smaller than 65536.
const MOD_ADLER: u32 = 65521;

/// Largest n such that 255n(n+1)/2 + (n+1)(MOD_ADLER-1) fits in u32.
const NMAX: usize = 5552;

/// Compute the Adler-32 checksum of `data`.
pub fn adler32(data: &[u8]) -> u32 {
    let mut hasher = Adler32::new();
    hasher.update(data);
    hasher.checksum()
}

/// Incremental Adler-32 state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adler32 {
    a: u32,
    b: u32,
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Adler32 {
    /// Start a new checksum (value 1).
    pub const fn new() -> Self {
        Self { a: 1, b: 0 }
    }

    /// Resume from a previously computed checksum.
    pub const fn from_checksum(checksum: u32) -> Self {
        Self {
            a: checksum & 0xFFFF,
            b: checksum >> 16,
        }
    }

    /// Feed more bytes.
    pub fn update(&mut self, data: &[u8]) {
        let (mut a, mut b) = (self.a, self.b);
        for chunk in data.chunks(NMAX) {
            for &byte in chunk {
                a += byte as u32;
                b += a;
            }
            a %= MOD_ADLER;
            b %= MOD_ADLER;
        }
        self.a = a;
        self.b = b;
    }

    /// Current checksum value.
    pub const fn checksum(&self) -> u32 {
        (self.b << 16) | self.a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adler32_known_values() {
        assert_eq!(adler32(b""), 1);
        assert_eq!(adler32(b"hello"), 0x062C_0215);
        assert_eq!(adler32(b"Wikipedia"), 0x11E6_0398);
    }

    #[test]
    fn test_adler32_incremental_matches_one_shot() {
        let data: Vec<u8> = (0..20_000u32).map(|i| (i * 31 % 251) as u8).collect();
        let mut hasher = Adler32::new();
        for piece in data.chunks(777) {
            hasher.update(piece);
        }
        assert_eq!(hasher.checksum(), adler32(&data));
    }

    #[test]
    fn test_adler32_long_run_of_ff_does_not_overflow() {
        let data = vec![0xFFu8; 100_000];
        let mut a = 1u64;
        let mut b = 0u64;
        for &byte in &data {
            a = (a + byte as u64) % 65521;
            b = (b + a) % 65521;
        }
        assert_eq!(adler32(&data), ((b << 16) | a) as u32);
    }

    #[test]
    fn test_adler32_resume() {
        let first = adler32(b"hel");
        let mut hasher = Adler32::from_checksum(first);
        hasher.update(b"lo");
        assert_eq!(hasher.checksum(), adler32(b"hello"));
    }
}
