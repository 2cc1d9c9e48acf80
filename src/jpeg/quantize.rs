//! Quantization tables and zig-zag ordering.

/// Natural (row-major) index of each coefficient in zig-zag scan order.
pub const ZIGZAG: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27,
    20, 13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58,
    59, 52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// Annex K.1 luminance table, natural order.
pub const STD_LUMINANCE: [u8; 64] = [
    16, 11, 10, 16, 24, 40, 51, 61, //
    12, 12, 14, 19, 26, 58, 60, 55, //
    14, 13, 16, 24, 40, 57, 69, 56, //
    14, 17, 22, 29, 51, 87, 80, 62, //
    18, 22, 37, 56, 68, 109, 103, 77, //
    24, 35, 55, 64, 81, 104, 113, 92, //
    49, 64, 78, 87, 103, 121, 120, 101, //
    72, 92, 95, 98, 112, 100, 103, 99,
];

/// Annex K.2 chrominance table, natural order.
pub const STD_CHROMINANCE: [u8; 64] = [
    17, 18, 24, 47, 99, 99, 99, 99, //
    18, 21, 26, 66, 99, 99, 99, 99, //
    24, 26, 56, 99, 99, 99, 99, 99, //
    47, 66, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99,
];

/// Quantization tables for one encode, natural order.
#[derive(Debug, Clone)]
pub struct QuantizationTables {
    pub luminance: [u8; 64],
    pub chrominance: [u8; 64],
}

impl QuantizationTables {
    /// Scale the Annex K tables to `quality` (1..=100) with the IJG curve:
    /// 50 keeps them as is, 100 makes every step 1.
    pub fn with_quality(quality: u8) -> Self {
        Self {
            luminance: scale_table(&STD_LUMINANCE, quality),
            chrominance: scale_table(&STD_CHROMINANCE, quality),
        }
    }
}

fn scale_table(base: &[u8; 64], quality: u8) -> [u8; 64] {
    let q = quality.clamp(1, 100) as u32;
    let scale = if q < 50 { 5000 / q } else { 200 - 2 * q };
    let mut out = [0u8; 64];
    for (dst, &b) in out.iter_mut().zip(base) {
        *dst = ((b as u32 * scale + 50) / 100).clamp(1, 255) as u8;
    }
    out
}

/// Reorder a natural-order table into zig-zag order, as DQT stores it.
pub fn zigzag_reorder<T: Copy + Default>(natural: &[T; 64]) -> [T; 64] {
    let mut out = [T::default(); 64];
    for (dst, &pos) in out.iter_mut().zip(&ZIGZAG) {
        *dst = natural[pos];
    }
    out
}

/// Divide DCT coefficients by the table steps, rounding to nearest.
pub fn quantize_block(coeffs: &[f32; 64], table: &[u8; 64]) -> [i16; 64] {
    let mut out = [0i16; 64];
    for ((dst, &c), &step) in out.iter_mut().zip(coeffs).zip(table) {
        *dst = (c / step as f32).round() as i16;
    }
    out
}
