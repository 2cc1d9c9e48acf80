//! Conversions between containers and interoperability of the simple
//! formats.

use std::io::Cursor;

use image::ImageEncoder;
use imgcodec::{bmp, format, ppm, tga, ColorType, Image, ImageFormat};

mod support;
use support::synthetic;

fn image(color_type: ColorType, width: u32, height: u32) -> Image {
    Image {
        width,
        height,
        color_type,
        pixels: synthetic::pixels_for(color_type, width, height),
    }
}

#[test]
fn lossless_chain_through_every_container() {
    let original = image(ColorType::Rgb, 19, 11);
    let mut current = original.clone();
    for target in [
        ImageFormat::Bmp,
        ImageFormat::Tga,
        ImageFormat::Ppm,
        ImageFormat::Png,
        ImageFormat::Bmp,
    ] {
        let bytes = target.encode(&current).unwrap();
        let (detected, decoded) = if target == ImageFormat::Tga {
            (target, target.decode(&bytes[..]).unwrap())
        } else {
            format::decode(Cursor::new(bytes)).unwrap()
        };
        assert_eq!(detected, target);
        current = decoded;
    }
    assert_eq!(current, original);
}

#[test]
fn alpha_survives_where_the_format_carries_it() {
    let original = image(ColorType::Rgba, 13, 7);
    for target in [ImageFormat::Png, ImageFormat::Bmp, ImageFormat::Tga] {
        let bytes = target.encode(&original).unwrap();
        let decoded = target.decode(&bytes[..]).unwrap();
        assert_eq!(decoded, original, "{target:?}");
    }

    let bytes = ImageFormat::Ppm.encode(&original).unwrap();
    let decoded = ImageFormat::Ppm.decode(&bytes[..]).unwrap();
    assert_eq!(decoded.color_type, ColorType::Rgb);
    let opaque: Vec<u8> = original
        .pixels
        .chunks_exact(4)
        .flat_map(|p| [p[0], p[1], p[2]])
        .collect();
    assert_eq!(decoded.pixels, opaque);
}

#[test]
fn gray_layouts_per_format() {
    let gray = image(ColorType::Gray, 9, 5);
    let expanded: Vec<u8> = gray.pixels.iter().flat_map(|&v| [v, v, v]).collect();

    for (format, color_type) in [
        (ImageFormat::Png, ColorType::Gray),
        (ImageFormat::Ppm, ColorType::Gray),
        (ImageFormat::Bmp, ColorType::Rgb),
        (ImageFormat::Tga, ColorType::Rgb),
    ] {
        let bytes = format.encode(&gray).unwrap();
        let decoded = format.decode(&bytes[..]).unwrap();
        assert_eq!(decoded.color_type, color_type, "{format:?}");
        let expected = if color_type == ColorType::Gray {
            &gray.pixels
        } else {
            &expanded
        };
        assert_eq!(&decoded.pixels, expected, "{format:?}");
    }
}

#[test]
fn image_crate_reads_our_bmp() {
    for (color_type, width, height) in [(ColorType::Rgb, 17, 9), (ColorType::Rgba, 6, 13)] {
        let source = image(color_type, width, height);
        let bytes = bmp::encode(&source.pixels, width, height, color_type).unwrap();
        let decoded =
            image::load_from_memory_with_format(&bytes, image::ImageFormat::Bmp).unwrap();
        let raw = match color_type {
            ColorType::Rgba => decoded.to_rgba8().into_raw(),
            _ => decoded.to_rgb8().into_raw(),
        };
        assert_eq!(raw, source.pixels, "{color_type:?}");
    }
}

#[test]
fn we_read_image_crate_bmp() {
    use image::codecs::bmp::BmpEncoder;

    for (ours, theirs) in [
        (ColorType::Rgb, image::ColorType::Rgb8),
        (ColorType::Rgba, image::ColorType::Rgba8),
    ] {
        let source = image(ours, 21, 4);
        let mut bytes = Vec::new();
        BmpEncoder::new(&mut bytes)
            .write_image(&source.pixels, 21, 4, theirs)
            .unwrap();
        let decoded = bmp::decode(&bytes[..]).unwrap();
        assert_eq!(decoded, source, "{ours:?}");
    }
}

#[test]
fn edge_case_dimensions_for_simple_formats() {
    for &(w, h) in synthetic::EDGE_CASE_DIMENSIONS {
        let rgb = image(ColorType::Rgb, w, h);
        let bmp_bytes = bmp::encode(&rgb.pixels, w, h, ColorType::Rgb).unwrap();
        assert_eq!(bmp::decode(&bmp_bytes[..]).unwrap(), rgb);

        let tga_bytes = tga::encode(&rgb.pixels, w, h, ColorType::Rgb).unwrap();
        assert_eq!(tga::decode(&tga_bytes[..]).unwrap(), rgb);

        let ppm_bytes = ppm::encode(&rgb.pixels, w, h, ColorType::Rgb).unwrap();
        assert_eq!(ppm::decode(&ppm_bytes[..]).unwrap(), rgb);
    }
}

#[test]
fn tga_rle_shrinks_flat_images() {
    let (w, h) = (64, 64);
    let flat = synthetic::checkerboard(w, h, 16, 3);
    let bytes = tga::encode(&flat, w, h, ColorType::Rgb).unwrap();
    assert!(bytes.len() < flat.len() / 4);
    assert_eq!(tga::decode(&bytes[..]).unwrap().pixels, flat);
}

#[test]
fn jpeg_accepts_only_gray_and_rgb() {
    let rgba = image(ColorType::Rgba, 4, 4);
    assert!(ImageFormat::Jpeg.encode(&rgba).is_err());
    let gray = image(ColorType::Gray, 4, 4);
    let bytes = ImageFormat::Jpeg.encode(&gray).unwrap();
    let mut cursor = Cursor::new(bytes);
    assert_eq!(ImageFormat::detect(&mut cursor).unwrap(), ImageFormat::Jpeg);
    let info = ImageFormat::Jpeg.probe(&mut cursor).unwrap();
    assert_eq!(info.color_type, ColorType::Gray);
}
