//! Deterministic test images and byte corpora.

use imgcodec::ColorType;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Sizes that hit partial MCUs, single rows and odd strides.
pub const EDGE_CASE_DIMENSIONS: &[(u32, u32)] = &[
    (1, 1),
    (1, 9),
    (9, 1),
    (7, 7),
    (8, 8),
    (15, 17),
    (16, 16),
    (33, 5),
];

pub fn gradient_rgb(width: u32, height: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.push((x * 255 / width.max(2).saturating_sub(1)) as u8);
            pixels.push((y * 255 / height.max(2).saturating_sub(1)) as u8);
            pixels.push(((x + y) * 4 % 256) as u8);
        }
    }
    pixels
}

pub fn gradient_gray(width: u32, height: u32) -> Vec<u8> {
    (0..height)
        .flat_map(|y| (0..width).map(move |x| ((x * 3 + y * 5) % 256) as u8))
        .collect()
}

pub fn checkerboard(width: u32, height: u32, cell: u32, channels: usize) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width as usize * height as usize * channels);
    for y in 0..height {
        for x in 0..width {
            let v = if (x / cell + y / cell) % 2 == 0 { 240 } else { 16 };
            pixels.extend(std::iter::repeat(v).take(channels));
        }
    }
    pixels
}

pub fn noise(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen()).collect()
}

/// Gradient with a diagonal alpha ramp.
pub fn rgba(width: u32, height: u32) -> Vec<u8> {
    gradient_rgb(width, height)
        .chunks_exact(3)
        .enumerate()
        .flat_map(|(i, px)| [px[0], px[1], px[2], (i * 7 % 256) as u8])
        .collect()
}

pub fn pixels_for(color_type: ColorType, width: u32, height: u32) -> Vec<u8> {
    match color_type {
        ColorType::Gray => gradient_gray(width, height),
        ColorType::GrayAlpha => gradient_gray(width, height)
            .into_iter()
            .flat_map(|v| [v, 255 - v])
            .collect(),
        ColorType::Rgb => gradient_rgb(width, height),
        ColorType::Rgba => rgba(width, height),
    }
}

/// English-like text with plenty of repeats at varying distances.
pub fn text_corpus(len: usize) -> Vec<u8> {
    const WORDS: &[&str] = &[
        "the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog", "image", "codec",
        "deflate", "window", "huffman", "literal", "distance", "length", "block",
    ];
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut out = Vec::with_capacity(len + 16);
    while out.len() < len {
        out.extend_from_slice(WORDS[rng.gen_range(0..WORDS.len())].as_bytes());
        out.push(if rng.gen_ratio(1, 12) { b'\n' } else { b' ' });
    }
    out.truncate(len);
    out
}

pub fn max_abs_diff(a: &[u8], b: &[u8]) -> u8 {
    assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(&x, &y)| x.abs_diff(y))
        .max()
        .unwrap_or(0)
}

pub fn mean_abs_diff(a: &[u8], b: &[u8]) -> f64 {
    assert_eq!(a.len(), b.len());
    if a.is_empty() {
        return 0.0;
    }
    let total: u64 = a.iter().zip(b).map(|(&x, &y)| x.abs_diff(y) as u64).sum();
    total as f64 / a.len() as f64
}

pub fn psnr(a: &[u8], b: &[u8]) -> f64 {
    assert_eq!(a.len(), b.len());
    let mse: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        / a.len() as f64;
    if mse == 0.0 {
        f64::INFINITY
    } else {
        10.0 * (255.0 * 255.0 / mse).log10()
    }
}
