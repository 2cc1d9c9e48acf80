//! Scanline filters.
//!
//! Each filtered row is prefixed by its filter type. Predictions use the byte
//! `bpp` positions to the left (`a`), the byte above (`b`) and the byte above
//! and to the left (`c`); missing neighbors are zero. All arithmetic wraps
//! modulo 256.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{alloc_zeroed, Error, Result};

/// Per-row filter type as stored in the image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FilterType {
    None = 0,
    Sub = 1,
    Up = 2,
    Average = 3,
    Paeth = 4,
}

impl FilterType {
    /// All filter types in tag order.
    pub const ALL: [FilterType; 5] = [
        FilterType::None,
        FilterType::Sub,
        FilterType::Up,
        FilterType::Average,
        FilterType::Paeth,
    ];

    /// Parse a row tag.
    pub fn from_u8(tag: u8) -> Result<Self> {
        Self::ALL
            .get(tag as usize)
            .copied()
            .ok_or_else(|| Error::invalid(format!("invalid scanline filter type {tag}")))
    }
}

/// How the encoder picks a filter for each row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterStrategy {
    /// No filtering.
    None,
    Sub,
    Up,
    Average,
    Paeth,
    /// Per row, the filter whose residuals have the smallest sum of absolute
    /// values (read as signed bytes).
    #[default]
    Adaptive,
}

/// Paeth predictor. Ties prefer `a`, then `b`, then `c`.
#[inline]
pub fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
    let (ia, ib, ic) = (a as i16, b as i16, c as i16);
    let p = ia + ib - ic;
    let pa = (p - ia).abs();
    let pb = (p - ib).abs();
    let pc = (p - ic).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[inline]
fn predict(filter: FilterType, a: u8, b: u8, c: u8) -> u8 {
    match filter {
        FilterType::None => 0,
        FilterType::Sub => a,
        FilterType::Up => b,
        FilterType::Average => ((a as u16 + b as u16) >> 1) as u8,
        FilterType::Paeth => paeth_predictor(a, b, c),
    }
}

/// Filter `row` against the previous row `prev` (all zeros for the first
/// row), writing residuals to `out`.
pub fn filter_row(filter: FilterType, row: &[u8], prev: &[u8], bpp: usize, out: &mut [u8]) {
    debug_assert_eq!(row.len(), prev.len());
    debug_assert_eq!(row.len(), out.len());
    if filter == FilterType::None {
        out.copy_from_slice(row);
        return;
    }
    for i in 0..row.len() {
        let (a, c) = if i >= bpp {
            (row[i - bpp], prev[i - bpp])
        } else {
            (0, 0)
        };
        out[i] = row[i].wrapping_sub(predict(filter, a, prev[i], c));
    }
}

/// Undo `filter` in place. `prev` is the reconstructed previous row (all
/// zeros for the first row).
pub fn unfilter_row(filter: FilterType, row: &mut [u8], prev: &[u8], bpp: usize) {
    debug_assert_eq!(row.len(), prev.len());
    match filter {
        FilterType::None => {}
        FilterType::Sub => {
            for i in bpp..row.len() {
                row[i] = row[i].wrapping_add(row[i - bpp]);
            }
        }
        FilterType::Up => {
            for (x, &b) in row.iter_mut().zip(prev) {
                *x = x.wrapping_add(b);
            }
        }
        FilterType::Average | FilterType::Paeth => {
            let lead = bpp.min(row.len());
            for i in 0..lead {
                row[i] = row[i].wrapping_add(predict(filter, 0, prev[i], 0));
            }
            for i in lead..row.len() {
                let pred = predict(filter, row[i - bpp], prev[i], prev[i - bpp]);
                row[i] = row[i].wrapping_add(pred);
            }
        }
    }
}

fn residual_cost(filter: FilterType, row: &[u8], prev: &[u8], bpp: usize) -> u64 {
    let mut sum = 0u64;
    for i in 0..row.len() {
        let (a, c) = if i >= bpp {
            (row[i - bpp], prev[i - bpp])
        } else {
            (0, 0)
        };
        let r = row[i].wrapping_sub(predict(filter, a, prev[i], c));
        sum += (r as i8).unsigned_abs() as u64;
    }
    sum
}

fn choose_filter(strategy: FilterStrategy, row: &[u8], prev: &[u8], bpp: usize) -> FilterType {
    match strategy {
        FilterStrategy::None => FilterType::None,
        FilterStrategy::Sub => FilterType::Sub,
        FilterStrategy::Up => FilterType::Up,
        FilterStrategy::Average => FilterType::Average,
        FilterStrategy::Paeth => FilterType::Paeth,
        FilterStrategy::Adaptive => {
            let mut best = FilterType::None;
            let mut best_cost = u64::MAX;
            for filter in FilterType::ALL {
                let cost = residual_cost(filter, row, prev, bpp);
                if cost < best_cost {
                    best = filter;
                    best_cost = cost;
                }
            }
            best
        }
    }
}

fn filter_one(
    y: usize,
    dst: &mut [u8],
    pixels: &[u8],
    stride: usize,
    bpp: usize,
    zero: &[u8],
    strategy: FilterStrategy,
) {
    let row = &pixels[y * stride..(y + 1) * stride];
    let prev = if y == 0 {
        zero
    } else {
        &pixels[(y - 1) * stride..y * stride]
    };
    let filter = choose_filter(strategy, row, prev, bpp);
    dst[0] = filter as u8;
    filter_row(filter, row, prev, bpp, &mut dst[1..]);
}

/// Filter a whole image of `stride`-byte rows into the tagged scanline
/// stream that gets compressed.
pub fn filter_image(
    pixels: &[u8],
    stride: usize,
    bpp: usize,
    strategy: FilterStrategy,
) -> Result<Vec<u8>> {
    debug_assert!(stride > 0 && pixels.len() % stride == 0);
    let height = pixels.len() / stride;
    let mut out = alloc_zeroed((stride + 1) * height)?;
    let zero = alloc_zeroed(stride)?;

    #[cfg(feature = "parallel")]
    out.par_chunks_mut(stride + 1)
        .enumerate()
        .for_each(|(y, dst)| filter_one(y, dst, pixels, stride, bpp, &zero, strategy));

    #[cfg(not(feature = "parallel"))]
    for (y, dst) in out.chunks_mut(stride + 1).enumerate() {
        filter_one(y, dst, pixels, stride, bpp, &zero, strategy);
    }

    Ok(out)
}
