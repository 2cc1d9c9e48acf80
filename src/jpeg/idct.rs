//! Fixed-point inverse DCT for the decoder.
//!
//! A separable matrix multiply against the cosine basis scaled by 4096. The
//! row pass keeps two extra fraction bits; the column pass removes all scaling
//! with rounding, undoes the level shift and clamps to 0..=255.

/// `round(4096 * BASIS[u][x])`, see [`super::dct::BASIS`].
const BASIS_FIXED: [[i32; 8]; 8] = [
    [1448, 1448, 1448, 1448, 1448, 1448, 1448, 1448],
    [2009, 1703, 1138, 400, -400, -1138, -1703, -2009],
    [1892, 784, -784, -1892, -1892, -784, 784, 1892],
    [1703, -400, -2009, -1138, 1138, 2009, 400, -1703],
    [1448, -1448, -1448, 1448, 1448, -1448, -1448, 1448],
    [1138, -2009, 400, 1703, -1703, -400, 2009, -1138],
    [784, -1892, 1892, -784, -784, 1892, -1892, 784],
    [400, -1138, 1703, -2009, 2009, -1703, 1138, -400],
];

const ROW_SHIFT: u32 = 10;
const COL_SHIFT: u32 = 14;

/// Dequantized coefficients are clamped to this magnitude; every legal 8-bit
/// stream stays well inside it and it keeps both passes within `i32`.
const COEF_LIMIT: i32 = 8191;

/// Inverse transform of one block of dequantized coefficients (natural order,
/// `[v * 8 + u]`) into 8-bit samples written to `out` with the given stride.
pub fn idct_block(coeffs: &[i32; 64], out: &mut [u8], stride: usize) {
    // Rows: tmp[v][x] = Σu BASIS[u][x] * F[v][u].
    let mut tmp = [0i32; 64];
    for v in 0..8 {
        let row = &coeffs[v * 8..v * 8 + 8];
        if row[1..].iter().all(|&c| c == 0) {
            let dc = row[0].clamp(-COEF_LIMIT, COEF_LIMIT) * BASIS_FIXED[0][0];
            tmp[v * 8..v * 8 + 8].fill((dc + (1 << (ROW_SHIFT - 1))) >> ROW_SHIFT);
            continue;
        }
        for x in 0..8 {
            let mut sum = 0i32;
            for (u, basis) in BASIS_FIXED.iter().enumerate() {
                sum += row[u].clamp(-COEF_LIMIT, COEF_LIMIT) * basis[x];
            }
            tmp[v * 8 + x] = (sum + (1 << (ROW_SHIFT - 1))) >> ROW_SHIFT;
        }
    }

    // Columns: f[y][x] = Σv BASIS[v][y] * tmp[v][x].
    for y in 0..8 {
        let dst = &mut out[y * stride..y * stride + 8];
        for (x, sample) in dst.iter_mut().enumerate() {
            let mut sum = 0i32;
            for (v, basis) in BASIS_FIXED.iter().enumerate() {
                sum += basis[y] * tmp[v * 8 + x];
            }
            let value = ((sum + (1 << (COL_SHIFT - 1))) >> COL_SHIFT) + 128;
            *sample = value.clamp(0, 255) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::dct::{dct_2d, BASIS};
    use super::*;

    fn idct(coeffs: &[i32; 64]) -> [u8; 64] {
        let mut out = [0u8; 64];
        idct_block(coeffs, &mut out, 8);
        out
    }

    #[test]
    fn test_fixed_basis_matches_float() {
        for u in 0..8 {
            for x in 0..8 {
                assert_eq!(BASIS_FIXED[u][x], (BASIS[u][x] * 4096.0).round() as i32);
            }
        }
    }

    #[test]
    fn test_dc_only() {
        let mut coeffs = [0i32; 64];
        assert!(idct(&coeffs).iter().all(|&s| s == 128));
        // DC of 80 is a flat +10.
        coeffs[0] = 80;
        assert!(idct(&coeffs).iter().all(|&s| s == 138));
        coeffs[0] = -8 * 200;
        assert!(idct(&coeffs).iter().all(|&s| s == 0));
    }

    #[test]
    fn test_inverts_forward_dct() {
        let mut block = [0.0f32; 64];
        let mut expected = [0u8; 64];
        for i in 0..64 {
            let v = ((i * 37 + 11) % 256) as u8;
            expected[i] = v;
            block[i] = v as f32 - 128.0;
        }
        let forward = dct_2d(&block);
        let mut coeffs = [0i32; 64];
        for i in 0..64 {
            coeffs[i] = forward[i].round() as i32;
        }
        let out = idct(&coeffs);
        for i in 0..64 {
            let diff = (out[i] as i32 - expected[i] as i32).abs();
            assert!(diff <= 2, "sample {i}: {} vs {}", out[i], expected[i]);
        }
    }

    #[test]
    fn test_strided_output() {
        let coeffs = [0i32; 64];
        let mut out = vec![7u8; 8 * 16];
        idct_block(&coeffs, &mut out, 16);
        assert!(out[..8].iter().all(|&s| s == 128));
        assert!(out[8..16].iter().all(|&s| s == 7));
    }

    #[test]
    fn test_garbage_coefficients_stay_in_range() {
        let coeffs = [i32::MAX; 64];
        let _ = idct(&coeffs);
        let coeffs = [i32::MIN; 64];
        let _ = idct(&coeffs);
    }
}
