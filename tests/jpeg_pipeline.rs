//! Baseline JPEG encode/decode, checked against `jpeg-decoder` and the
//! `image` crate's encoder.

use std::io::Cursor;

use imgcodec::color::rgb_to_ycbcr;
use imgcodec::jpeg::{self, JpegOptions, Subsampling};
use imgcodec::{ColorType, Error};

mod support;
use support::synthetic;

fn encode(
    pixels: &[u8],
    width: u32,
    height: u32,
    color_type: ColorType,
    quality: u8,
    subsampling: Subsampling,
) -> Vec<u8> {
    let options = JpegOptions::builder(width, height)
        .color_type(color_type)
        .quality(quality)
        .subsampling(subsampling)
        .build();
    jpeg::encode(pixels, &options).unwrap()
}

fn reference_decode(bytes: &[u8]) -> (u16, u16, Vec<u8>) {
    let mut decoder = jpeg_decoder::Decoder::new(bytes);
    let pixels = decoder.decode().expect("jpeg-decoder");
    let info = decoder.info().expect("info after decode");
    (info.width, info.height, pixels)
}

#[test]
fn subsampled_420_upsamples_by_replication() {
    // Strong horizontal chroma ramp; luma shifts within a pixel pair do not
    // move Cb, so each 2x2 cell must share one chroma sample.
    let (w, h) = (16u32, 16u32);
    let mut pixels = Vec::new();
    for _ in 0..h {
        for x in 0..w {
            pixels.extend_from_slice(&[(x * 16) as u8, 128, (255 - x * 16) as u8]);
        }
    }
    let bytes = encode(&pixels, w, h, ColorType::Rgb, 100, Subsampling::S420);
    let image = jpeg::decode(&bytes[..]).unwrap();
    assert_eq!(image.color_type, ColorType::Rgb);
    assert_eq!((image.width, image.height), (w, h));
    assert_eq!(image.pixels.len(), (w * h * 3) as usize);

    let cb: Vec<i32> = image
        .pixels
        .chunks_exact(3)
        .map(|p| rgb_to_ycbcr(p[0], p[1], p[2]).1 as i32)
        .collect();
    let at = |x: u32, y: u32| cb[(y * w + x) as usize];

    let mut between_cells = 0;
    for cy in 0..h / 2 {
        for cx in 0..w / 2 {
            let cell = [
                at(2 * cx, 2 * cy),
                at(2 * cx + 1, 2 * cy),
                at(2 * cx, 2 * cy + 1),
                at(2 * cx + 1, 2 * cy + 1),
            ];
            let spread = cell.iter().max().unwrap() - cell.iter().min().unwrap();
            assert!(spread <= 4, "cell ({cx},{cy}) spread {spread}: {cell:?}");
            if cx > 0 {
                between_cells += (at(2 * cx - 1, 2 * cy) - at(2 * cx, 2 * cy)).abs();
            }
        }
    }
    let mean_step = between_cells as f64 / ((w / 2 - 1) * (h / 2)) as f64;
    assert!(mean_step > 12.0, "chroma steps between cells average {mean_step}");
}

#[test]
fn matches_reference_decoder() {
    let (w, h) = (61, 35);
    let pixels = synthetic::gradient_rgb(w, h);
    for subsampling in [Subsampling::S444, Subsampling::S420] {
        let bytes = encode(&pixels, w, h, ColorType::Rgb, 90, subsampling);
        let ours = jpeg::decode(&bytes[..]).unwrap();
        let (rw, rh, theirs) = reference_decode(&bytes);
        assert_eq!((rw as u32, rh as u32), (w, h));
        assert_eq!(ours.pixels.len(), theirs.len());

        // The reference smooths chroma when upsampling; replication differs
        // most at sharp edges.
        let mean = synthetic::mean_abs_diff(&ours.pixels, &theirs);
        if subsampling == Subsampling::S444 {
            assert!(mean < 1.5, "mean difference {mean}");
            let max = synthetic::max_abs_diff(&ours.pixels, &theirs);
            assert!(max <= 8, "max difference {max}");
        } else {
            assert!(mean < 3.0, "mean difference {mean}");
        }
    }
}

#[test]
fn grayscale_matches_reference_decoder() {
    let (w, h) = (40, 27);
    let pixels = synthetic::gradient_gray(w, h);
    let bytes = encode(&pixels, w, h, ColorType::Gray, 85, Subsampling::S444);
    let ours = jpeg::decode(&bytes[..]).unwrap();
    assert_eq!(ours.color_type, ColorType::Gray);
    let (_, _, theirs) = reference_decode(&bytes);
    assert!(synthetic::max_abs_diff(&ours.pixels, &theirs) <= 4);
    assert!(synthetic::psnr(&ours.pixels, &pixels) > 30.0);
}

#[test]
fn decodes_image_crate_jpeg() {
    let (w, h) = (48, 32);
    let pixels = synthetic::gradient_rgb(w, h);
    let mut bytes = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, 90)
        .encode(&pixels, w, h, image::ColorType::Rgb8)
        .unwrap();

    let ours = jpeg::decode(&bytes[..]).unwrap();
    assert_eq!((ours.width, ours.height), (w, h));
    let (_, _, theirs) = reference_decode(&bytes);
    let mean = synthetic::mean_abs_diff(&ours.pixels, &theirs);
    assert!(mean < 3.0, "mean difference {mean}");
    assert!(synthetic::psnr(&ours.pixels, &pixels) > 25.0);
}

#[test]
fn restart_intervals_reset_prediction() {
    let (w, h) = (64, 48);
    let pixels = synthetic::gradient_rgb(w, h);
    let plain = encode(&pixels, w, h, ColorType::Rgb, 75, Subsampling::S420);
    let reference = jpeg::decode(&plain[..]).unwrap();

    for interval in [1u16, 2, 5, 100] {
        let options = JpegOptions::builder(w, h)
            .color_type(ColorType::Rgb)
            .quality(75)
            .subsampling(Subsampling::S420)
            .restart_interval(Some(interval))
            .build();
        let bytes = jpeg::encode(&pixels, &options).unwrap();
        let ours = jpeg::decode(&bytes[..]).unwrap();
        assert_eq!(ours, reference, "interval {interval}");
        let (_, _, theirs) = reference_decode(&bytes);
        assert!(synthetic::mean_abs_diff(&ours.pixels, &theirs) < 3.0);
    }
}

#[test]
fn edge_case_dimensions_decode_to_full_size() {
    for &(w, h) in synthetic::EDGE_CASE_DIMENSIONS {
        for subsampling in [Subsampling::S444, Subsampling::S420] {
            let pixels = synthetic::gradient_rgb(w, h);
            let bytes = encode(&pixels, w, h, ColorType::Rgb, 90, subsampling);
            let mut cursor = Cursor::new(&bytes);
            let info = jpeg::probe(&mut cursor).unwrap();
            assert_eq!((info.width, info.height, info.color_type), (w, h, ColorType::Rgb));
            let mut out = vec![0u8; info.buffer_len().unwrap()];
            jpeg::decode_into(&mut cursor, &mut out).unwrap();
            let (_, _, theirs) = reference_decode(&bytes);
            assert_eq!(out.len(), theirs.len(), "{w}x{h} {subsampling:?}");
        }
    }
}

#[test]
fn truncated_and_damaged_streams_fail() {
    let pixels = synthetic::gradient_rgb(32, 32);
    let bytes = encode(&pixels, 32, 32, ColorType::Rgb, 80, Subsampling::S444);

    assert!(jpeg::decode(&bytes[..bytes.len() / 3]).is_err());
    assert!(matches!(
        jpeg::decode(&[0xFF, 0xD8, 0xFF, 0xC2, 0x00, 0x02][..]),
        Err(Error::UnsupportedDecode(_))
    ));
    assert!(matches!(
        jpeg::decode(&b"not a jpeg"[..]),
        Err(Error::InvalidDecode(_))
    ));
}
