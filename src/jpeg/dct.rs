//! Forward DCT for the encoder.

/// `BASIS[u][x] = c(u)/2 * cos((2x+1)uπ/16)`, with `c(0) = 1/√2` and
/// `c(u) = 1` otherwise. The 2-D transform is orthonormal with this basis.
pub const BASIS: [[f32; 8]; 8] = [
    [
        0.353553391, 0.353553391, 0.353553391, 0.353553391, 0.353553391, 0.353553391, 0.353553391,
        0.353553391,
    ],
    [
        0.490392640, 0.415734806, 0.277785117, 0.097545161, -0.097545161, -0.277785117,
        -0.415734806, -0.490392640,
    ],
    [
        0.461939766, 0.191341716, -0.191341716, -0.461939766, -0.461939766, -0.191341716,
        0.191341716, 0.461939766,
    ],
    [
        0.415734806, -0.097545161, -0.490392640, -0.277785117, 0.277785117, 0.490392640,
        0.097545161, -0.415734806,
    ],
    [
        0.353553391, -0.353553391, -0.353553391, 0.353553391, 0.353553391, -0.353553391,
        -0.353553391, 0.353553391,
    ],
    [
        0.277785117, -0.490392640, 0.097545161, 0.415734806, -0.415734806, -0.097545161,
        0.490392640, -0.277785117,
    ],
    [
        0.191341716, -0.461939766, 0.461939766, -0.191341716, -0.191341716, 0.461939766,
        -0.461939766, 0.191341716,
    ],
    [
        0.097545161, -0.277785117, 0.415734806, -0.490392640, 0.490392640, -0.415734806,
        0.277785117, -0.097545161,
    ],
];

/// 2-D forward DCT of a level-shifted 8x8 block (row-major in, row-major
/// coefficients out, `[v * 8 + u]`).
pub fn dct_2d(block: &[f32; 64]) -> [f32; 64] {
    // Rows: tmp[y][u] = Σx BASIS[u][x] * f[y][x].
    let mut tmp = [0.0f32; 64];
    for y in 0..8 {
        let row = &block[y * 8..y * 8 + 8];
        for (u, basis) in BASIS.iter().enumerate() {
            tmp[y * 8 + u] = row.iter().zip(basis).map(|(&f, &b)| f * b).sum();
        }
    }
    // Columns: out[v][u] = Σy BASIS[v][y] * tmp[y][u].
    let mut out = [0.0f32; 64];
    for (v, basis) in BASIS.iter().enumerate() {
        for u in 0..8 {
            out[v * 8 + u] = (0..8).map(|y| basis[y] * tmp[y * 8 + u]).sum();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_block_has_only_dc() {
        let block = [10.0f32; 64];
        let out = dct_2d(&block);
        assert!((out[0] - 80.0).abs() < 1e-3, "dc = {}", out[0]);
        assert!(out[1..].iter().all(|c| c.abs() < 1e-3));
    }

    #[test]
    fn test_horizontal_ramp_is_first_row_only() {
        let mut block = [0.0f32; 64];
        for y in 0..8 {
            for x in 0..8 {
                block[y * 8 + x] = x as f32 * 4.0 - 14.0;
            }
        }
        let out = dct_2d(&block);
        assert!(out[1] < -1.0, "ramp should put energy in F(0,1): {}", out[1]);
        for v in 1..8 {
            for u in 0..8 {
                assert!(out[v * 8 + u].abs() < 1e-3);
            }
        }
    }
}
