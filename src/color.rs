//! Pixel layouts and color space conversion.

/// Pixel layout of an 8-bit-per-channel image buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorType {
    /// Single luminance channel.
    Gray,
    /// Luminance followed by alpha.
    GrayAlpha,
    /// Red, green, blue.
    Rgb,
    /// Red, green, blue, alpha.
    Rgba,
}

impl ColorType {
    /// Bytes per pixel for this layout.
    #[inline]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            ColorType::Gray => 1,
            ColorType::GrayAlpha => 2,
            ColorType::Rgb => 3,
            ColorType::Rgba => 4,
        }
    }

    /// Whether the layout carries an alpha channel.
    #[inline]
    pub const fn has_alpha(self) -> bool {
        matches!(self, ColorType::GrayAlpha | ColorType::Rgba)
    }

    /// Whether the layout carries color (as opposed to luminance only).
    #[inline]
    pub const fn is_color(self) -> bool {
        matches!(self, ColorType::Rgb | ColorType::Rgba)
    }
}

// 16.16 fixed-point BT.601 coefficients.
const FIX_0_299: i32 = 19595;
const FIX_0_587: i32 = 38470;
const FIX_0_114: i32 = 7471;
const FIX_0_168736: i32 = 11059;
const FIX_0_331264: i32 = 21709;
const FIX_0_418688: i32 = 27439;
const FIX_0_081312: i32 = 5329;
const FIX_1_402: i32 = 91881;
const FIX_0_34414: i32 = 22554;
const FIX_0_71414: i32 = 46802;
const FIX_1_772: i32 = 116130;
const HALF: i32 = 1 << 15;

#[inline]
fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// Convert an RGB pixel to JFIF YCbCr.
#[inline]
pub fn rgb_to_ycbcr(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let y = (FIX_0_299 * r + FIX_0_587 * g + FIX_0_114 * b + HALF) >> 16;
    let cb = (-FIX_0_168736 * r - FIX_0_331264 * g + (b << 15) + (128 << 16) + HALF) >> 16;
    let cr = ((r << 15) - FIX_0_418688 * g - FIX_0_081312 * b + (128 << 16) + HALF) >> 16;
    (clamp_u8(y), clamp_u8(cb), clamp_u8(cr))
}

/// Convert a JFIF YCbCr sample triple to RGB, clamping each channel.
#[inline]
pub fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
    let y = y as i32;
    let cb = cb as i32 - 128;
    let cr = cr as i32 - 128;
    let r = y + ((FIX_1_402 * cr + HALF) >> 16);
    let g = y - ((FIX_0_34414 * cb + FIX_0_71414 * cr + HALF) >> 16);
    let b = y + ((FIX_1_772 * cb + HALF) >> 16);
    (clamp_u8(r), clamp_u8(g), clamp_u8(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_pixel() {
        assert_eq!(ColorType::Gray.bytes_per_pixel(), 1);
        assert_eq!(ColorType::GrayAlpha.bytes_per_pixel(), 2);
        assert_eq!(ColorType::Rgb.bytes_per_pixel(), 3);
        assert_eq!(ColorType::Rgba.bytes_per_pixel(), 4);
        assert!(ColorType::Rgba.has_alpha());
        assert!(!ColorType::Rgb.has_alpha());
        assert!(!ColorType::GrayAlpha.is_color());
    }

    #[test]
    fn test_neutral_chroma_is_gray() {
        for v in [0u8, 1, 77, 128, 200, 255] {
            assert_eq!(ycbcr_to_rgb(v, 128, 128), (v, v, v));
            let (y, cb, cr) = rgb_to_ycbcr(v, v, v);
            assert_eq!(y, v);
            assert!((cb as i32 - 128).abs() <= 1);
            assert!((cr as i32 - 128).abs() <= 1);
        }
    }

    #[test]
    fn test_primaries() {
        assert_eq!(rgb_to_ycbcr(255, 0, 0), (76, 85, 255));
        assert_eq!(rgb_to_ycbcr(0, 0, 255), (29, 255, 107));
    }

    #[test]
    fn test_color_roundtrip_close() {
        for r in (0..=255).step_by(17) {
            for g in (0..=255).step_by(51) {
                for b in (0..=255).step_by(85) {
                    let (y, cb, cr) = rgb_to_ycbcr(r as u8, g as u8, b as u8);
                    let (r2, g2, b2) = ycbcr_to_rgb(y, cb, cr);
                    assert!((r2 as i32 - r).abs() <= 3, "r {} -> {}", r, r2);
                    assert!((g2 as i32 - g).abs() <= 3, "g {} -> {}", g, g2);
                    assert!((b2 as i32 - b).abs() <= 3, "b {} -> {}", b, b2);
                }
            }
        }
    }
}
