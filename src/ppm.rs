//! Netpbm PGM/PPM reader and writer.
//!
//! Reads plain (P2, P3) and raw (P5, P6) gray and color maps with a maxval of
//! 255. Writes the plain ASCII forms: P2 for gray input, P3 for color; alpha
//! channels are dropped.

use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};

use crate::color::ColorType;
use crate::error::{alloc_zeroed, Error, Result};
use crate::image::{check_pixel_buffer, Image, ImageInfo};

/// Plain-format lines are kept at or under this many characters.
const MAX_LINE: usize = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Plain,
    Raw,
}

#[derive(Debug)]
struct Header {
    info: ImageInfo,
    encoding: Encoding,
}

/// Next whitespace-delimited header token, skipping `#` comments.
///
/// Consumes the single whitespace byte that ends the token, which is exactly
/// the separator raw formats put between maxval and the samples.
fn read_token<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut token = String::new();
    let mut in_comment = false;
    loop {
        let mut byte = [0u8; 1];
        if reader.read(&mut byte)? == 0 {
            if token.is_empty() {
                return Err(Error::invalid("unexpected end of PPM header"));
            }
            return Ok(token);
        }
        let ch = byte[0] as char;
        if in_comment {
            in_comment = ch != '\n' && ch != '\r';
            continue;
        }
        if ch == '#' {
            in_comment = true;
            continue;
        }
        if ch.is_ascii_whitespace() {
            if !token.is_empty() {
                return Ok(token);
            }
            continue;
        }
        if token.len() >= 16 {
            return Err(Error::invalid("PPM header token too long"));
        }
        token.push(ch);
    }
}

fn read_number<R: BufRead>(reader: &mut R, what: &str) -> Result<u32> {
    let token = read_token(reader)?;
    token
        .parse()
        .map_err(|_| Error::invalid(format!("invalid PPM {what} {token:?}")))
}

fn read_header<R: BufRead>(reader: &mut R) -> Result<Header> {
    let mut magic = [0u8; 2];
    reader.read_exact(&mut magic)?;
    let (color_type, encoding) = match &magic {
        b"P2" => (ColorType::Gray, Encoding::Plain),
        b"P3" => (ColorType::Rgb, Encoding::Plain),
        b"P5" => (ColorType::Gray, Encoding::Raw),
        b"P6" => (ColorType::Rgb, Encoding::Raw),
        [b'P', b'1' | b'4'] => return Err(Error::unsupported("PBM bitmaps")),
        [b'P', b'7'] => return Err(Error::unsupported("PAM files")),
        _ => return Err(Error::invalid("not a PPM file (bad magic)")),
    };
    let width = read_number(reader, "width")?;
    let height = read_number(reader, "height")?;
    let maxval = read_number(reader, "maxval")?;
    if width == 0 || height == 0 {
        return Err(Error::invalid(format!("invalid PPM dimensions {width}x{height}")));
    }
    match maxval {
        255 => {}
        1..=65535 => return Err(Error::unsupported(format!("PPM maxval {maxval}"))),
        _ => return Err(Error::invalid(format!("invalid PPM maxval {maxval}"))),
    }
    log::debug!(
        "ppm: {}{} {}x{} maxval {}",
        magic[0] as char,
        magic[1] as char,
        width,
        height,
        maxval
    );
    Ok(Header {
        info: ImageInfo {
            width,
            height,
            color_type,
        },
        encoding,
    })
}

fn read_samples<R: BufRead>(reader: &mut R, header: &Header, pixels: &mut [u8]) -> Result<()> {
    match header.encoding {
        Encoding::Raw => reader.read_exact(pixels)?,
        Encoding::Plain => {
            for sample in pixels.iter_mut() {
                let v = read_number(reader, "sample")?;
                *sample = u8::try_from(v)
                    .map_err(|_| Error::invalid(format!("PPM sample {v} exceeds maxval")))?;
            }
        }
    }
    Ok(())
}

/// Read the header and report the geometry, leaving the stream where it was.
pub fn probe<R: Read + Seek>(reader: &mut R) -> Result<ImageInfo> {
    let start = reader.stream_position()?;
    let result = read_header(&mut BufReader::new(&mut *reader)).map(|h| h.info);
    reader.seek(SeekFrom::Start(start))?;
    result
}

/// Decode into a buffer of exactly `width * height * bytes_per_pixel` bytes.
pub fn decode_into<R: Read>(reader: R, pixels: &mut [u8]) -> Result<ImageInfo> {
    let mut reader = BufReader::new(reader);
    let header = read_header(&mut reader)?;
    let expected = header.info.buffer_len()?;
    if pixels.len() != expected {
        return Err(Error::InvalidDataLength {
            expected,
            actual: pixels.len(),
        });
    }
    read_samples(&mut reader, &header, pixels)?;
    Ok(header.info)
}

/// Decode into a newly allocated [`Image`].
pub fn decode<R: Read>(reader: R) -> Result<Image> {
    let mut reader = BufReader::new(reader);
    let header = read_header(&mut reader)?;
    let info = header.info;
    let mut pixels = alloc_zeroed(info.buffer_len()?)?;
    read_samples(&mut reader, &header, &mut pixels)?;
    Ok(Image {
        width: info.width,
        height: info.height,
        color_type: info.color_type,
        pixels,
    })
}

/// Encode as plain PGM (P2) or PPM (P3).
pub fn encode(data: &[u8], width: u32, height: u32, color_type: ColorType) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    encode_into(&mut output, data, width, height, color_type)?;
    Ok(output)
}

/// Encode into a caller-provided buffer, which is cleared first.
pub fn encode_into(
    output: &mut Vec<u8>,
    data: &[u8],
    width: u32,
    height: u32,
    color_type: ColorType,
) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions { width, height });
    }
    check_pixel_buffer(data.len(), width, height, color_type)?;

    let (magic, kept) = if color_type.is_color() {
        ("P3", 3)
    } else {
        ("P2", 1)
    };
    let channels = color_type.bytes_per_pixel();
    output.clear();
    write!(output, "{magic}\n{width} {height}\n255\n")?;

    for row in data.chunks_exact(width as usize * channels) {
        let mut line = 0;
        for px in row.chunks_exact(channels) {
            for &v in &px[..kept] {
                // At most three digits and a separator.
                if line + 4 > MAX_LINE {
                    output.push(b'\n');
                    line = 0;
                } else if line > 0 {
                    output.push(b' ');
                    line += 1;
                }
                let before = output.len();
                write!(output, "{v}")?;
                line += output.len() - before;
            }
        }
        output.push(b'\n');
    }

    log::debug!(
        "ppm encode: {}x{} {:?} as {}, {} bytes",
        width,
        height,
        color_type,
        magic,
        output.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_raw_with_comments() {
        let mut file = b"P6\n# made by hand\n2 1 # trailing\n255\n".to_vec();
        file.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
        let image = decode(&file[..]).unwrap();
        assert_eq!(image.color_type, ColorType::Rgb);
        assert_eq!((image.width, image.height), (2, 1));
        assert_eq!(image.pixels, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_raw_sample_that_looks_like_whitespace() {
        // First sample is '\n'; only one separator byte follows maxval.
        let mut file = b"P5 1 2 255\n".to_vec();
        file.extend_from_slice(&[b'\n', b' ']);
        assert_eq!(decode(&file[..]).unwrap().pixels, vec![10, 32]);
    }

    #[test]
    fn test_plain_gray_and_color() {
        let image = decode(&b"P2\n2 2\n255\n0 64\n128 255\n"[..]).unwrap();
        assert_eq!(image.color_type, ColorType::Gray);
        assert_eq!(image.pixels, vec![0, 64, 128, 255]);

        let image = decode(&b"P3 1 1 255 9 8 7"[..]).unwrap();
        assert_eq!(image.pixels, vec![9, 8, 7]);
    }

    #[test]
    fn test_rejects_bad_headers() {
        assert!(matches!(
            decode(&b"P3 1 1 65535 0 0 0"[..]),
            Err(Error::UnsupportedDecode(_))
        ));
        assert!(matches!(
            decode(&b"P3 1 1 0 0 0 0"[..]),
            Err(Error::InvalidDecode(_))
        ));
        assert!(matches!(
            decode(&b"P2 x 1 255 0"[..]),
            Err(Error::InvalidDecode(_))
        ));
        assert!(matches!(
            decode(&b"P2 2 1 255 0 256"[..]),
            Err(Error::InvalidDecode(_))
        ));
        assert!(matches!(decode(&b"P4 1 1"[..]), Err(Error::UnsupportedDecode(_))));
        assert!(matches!(decode(&b"Q6"[..]), Err(Error::InvalidDecode(_))));
        assert!(matches!(decode(&b"P2 1 1"[..]), Err(Error::InvalidDecode(_))));
    }

    #[test]
    fn test_truncated_raw_samples() {
        let err = decode(&b"P6 2 2 255\n\x01\x02"[..]).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_encode_plain_formats() {
        let ppm = encode(&[1, 2, 3, 4, 5, 6], 2, 1, ColorType::Rgb).unwrap();
        assert_eq!(ppm, b"P3\n2 1\n255\n1 2 3 4 5 6\n");

        let pgm = encode(&[0, 255, 7, 8], 2, 2, ColorType::Gray).unwrap();
        assert_eq!(pgm, b"P2\n2 2\n255\n0 255\n7 8\n");

        // Alpha is dropped.
        let ppm = encode(&[1, 2, 3, 99], 1, 1, ColorType::Rgba).unwrap();
        assert_eq!(decode(&ppm[..]).unwrap().pixels, vec![1, 2, 3]);
        let pgm = encode(&[42, 99], 1, 1, ColorType::GrayAlpha).unwrap();
        assert_eq!(decode(&pgm[..]).unwrap().pixels, vec![42]);
    }

    #[test]
    fn test_encode_wraps_long_rows() {
        let pixels = vec![255u8; 40 * 3];
        let ppm = encode(&pixels, 40, 1, ColorType::Rgb).unwrap();
        let text = String::from_utf8(ppm.clone()).unwrap();
        assert!(text.lines().all(|l| l.len() <= MAX_LINE));
        assert_eq!(decode(&ppm[..]).unwrap().pixels, pixels);
    }

    #[test]
    fn test_probe_restores_position() {
        let mut cursor = Cursor::new(b"P5 3 2 255\n\0\0\0\0\0\0".to_vec());
        let info = probe(&mut cursor).unwrap();
        assert_eq!((info.width, info.height, info.color_type), (3, 2, ColorType::Gray));
        assert_eq!(cursor.position(), 0);
        let mut buf = [1u8; 6];
        decode_into(&mut cursor, &mut buf).unwrap();
        assert_eq!(buf, [0; 6]);
    }
}
