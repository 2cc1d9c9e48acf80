//! imgcodec CLI - image format converter
//!
//! Converts between PNG, JPEG, BMP, TGA and PGM/PPM, or prints what a file
//! contains with `--info`.

use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{ArgAction, Parser, ValueEnum};
use log::LevelFilter;

use imgcodec::jpeg::{JpegOptions, Subsampling};
use imgcodec::png::{FilterStrategy, PngOptions};
use imgcodec::{ColorType, Image, ImageFormat};

/// Convert images between PNG, JPEG, BMP, TGA and PGM/PPM.
#[derive(Parser, Debug)]
#[command(name = "imgcodec")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
EXAMPLES:
    imgcodec photo.png -o photo.jpg            Convert PNG to JPEG
    imgcodec photo.png -o photo.jpg -q 90      JPEG with higher quality
    imgcodec scan.bmp -o scan.png -c 9         Maximum PNG compression
    imgcodec shot.tga --info                   Print dimensions and color type
    imgcodec photo.jpg -o gray.pgm --grayscale Convert to grayscale
    imgcodec photo.png -o out.jpg -vv          Log codec structure to stderr")]
struct Args {
    /// Input image file, or - for stdin
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file path, or - for stdout (format detected from extension)
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Output format (overrides extension detection)
    #[arg(short, long, value_enum)]
    format: Option<FormatArg>,

    /// Print format, dimensions and color type of the input and exit
    #[arg(long)]
    info: bool,

    /// JPEG quality (1-100, higher = better quality)
    #[arg(short, long, default_value = "85", value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// JPEG chroma subsampling
    #[arg(long, value_enum, default_value = "s444")]
    subsampling: SubsamplingArg,

    /// JPEG restart interval in MCUs (0 to disable)
    #[arg(long, default_value = "0")]
    restart_interval: u16,

    /// PNG compression level (0-9, higher = smaller file)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(0..=9))]
    compression: Option<u8>,

    /// PNG filter strategy
    #[arg(long, value_enum)]
    filter: Option<FilterArg>,

    /// PNG preset (explicit --compression/--filter still apply on top)
    #[arg(long, value_enum, default_value = "balanced")]
    png_preset: PngPresetArg,

    /// Convert to grayscale
    #[arg(long)]
    grayscale: bool,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Png,
    Jpeg,
    /// Alias for jpeg
    Jpg,
    Bmp,
    Tga,
    /// Plain PGM/PPM
    Ppm,
}

impl From<FormatArg> for ImageFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Png => ImageFormat::Png,
            FormatArg::Jpeg | FormatArg::Jpg => ImageFormat::Jpeg,
            FormatArg::Bmp => ImageFormat::Bmp,
            FormatArg::Tga => ImageFormat::Tga,
            FormatArg::Ppm => ImageFormat::Ppm,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SubsamplingArg {
    /// 4:4:4 - No subsampling (best quality)
    S444,
    /// 4:2:0 - 2x2 chroma downsample (smaller file)
    S420,
}

impl From<SubsamplingArg> for Subsampling {
    fn from(arg: SubsamplingArg) -> Self {
        match arg {
            SubsamplingArg::S444 => Subsampling::S444,
            SubsamplingArg::S420 => Subsampling::S420,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FilterArg {
    /// No filter (fastest)
    None,
    Sub,
    Up,
    Average,
    Paeth,
    /// Per-row choice by smallest residual sum
    Adaptive,
}

impl From<FilterArg> for FilterStrategy {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::None => FilterStrategy::None,
            FilterArg::Sub => FilterStrategy::Sub,
            FilterArg::Up => FilterStrategy::Up,
            FilterArg::Average => FilterStrategy::Average,
            FilterArg::Paeth => FilterStrategy::Paeth,
            FilterArg::Adaptive => FilterStrategy::Adaptive,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PngPresetArg {
    /// Level 2, Up filter
    Fast,
    /// Level 6, adaptive filters
    Balanced,
    /// Level 9, adaptive filters, filtered match strategy
    Max,
}

fn log_level(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Warn,
        (false, 1) => LevelFilter::Info,
        (false, 2) => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn main() {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(log_level(args.verbose, args.quiet))
        .format_timestamp(None)
        .init();
    if let Err(e) = run(&args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn read_input(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if is_stdio(path) {
        let mut buffer = Vec::new();
        io::stdin()
            .read_to_end(&mut buffer)
            .map_err(|e| format!("Can't read from stdin: {e}"))?;
        return Ok(buffer);
    }
    fs::read(path).map_err(|e| {
        if path.exists() {
            format!("Can't read '{}': {e}", path.display()).into()
        } else {
            format!("File not found: '{}'", path.display()).into()
        }
    })
}

/// Signature first; TGA has none, so fall back to the extension.
fn input_format(data: &[u8], path: &Path) -> Result<ImageFormat, Box<dyn std::error::Error>> {
    ImageFormat::from_signature(data)
        .or_else(|| ImageFormat::from_path(path))
        .ok_or_else(|| "Unknown image format. Supported: PNG, JPEG, BMP, TGA, PGM/PPM".into())
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let data = read_input(&args.input)?;
    let input_size = data.len() as u64;
    let in_format = input_format(&data, &args.input)?;
    let mut reader = Cursor::new(data);

    if args.info {
        let info = in_format.probe(&mut reader)?;
        println!(
            "{}: {:?} {}x{} {:?}",
            args.input.display(),
            in_format,
            info.width,
            info.height,
            info.color_type
        );
        return Ok(());
    }

    let start = Instant::now();
    let image = in_format.decode(reader)?;
    log::info!(
        "decoded {:?} {}x{} {:?} in {:.2?}",
        in_format,
        image.width,
        image.height,
        image.color_type,
        start.elapsed()
    );

    let is_stdout = args.output.as_deref().is_some_and(is_stdio);
    let out_format = match (args.format, &args.output) {
        (Some(f), _) => ImageFormat::from(f),
        (None, Some(path)) if !is_stdio(path) => ImageFormat::from_path(path)
            .ok_or_else(|| format!("Can't tell output format from '{}'", path.display()))?,
        _ => ImageFormat::Png,
    };
    let output_path = match &args.output {
        Some(path) => path.clone(),
        None if is_stdio(&args.input) => {
            return Err("When reading from stdin (-), specify an output with -o/--output".into())
        }
        None => {
            let mut path = args.input.clone();
            path.set_extension(format!("converted.{}", out_format.extensions()[0]));
            path
        }
    };

    let image = prepare(image, out_format, args.grayscale);
    let start = Instant::now();
    let output_data = encode(&image, out_format, args)?;
    log::info!(
        "encoded {:?} {:?} in {:.2?}",
        out_format,
        image.color_type,
        start.elapsed()
    );

    if is_stdout {
        io::stdout()
            .write_all(&output_data)
            .map_err(|e| format!("Can't write to stdout: {e}"))?;
    } else {
        fs::write(&output_path, &output_data)
            .map_err(|e| format!("Can't write to '{}': {e}", output_path.display()))?;
    }

    if !args.quiet {
        let output_size = output_data.len() as u64;
        let ratio = if input_size > 0 {
            output_size as f64 / input_size as f64 * 100.0
        } else {
            0.0
        };
        let msg = format!(
            "{} -> {} ({:.1}%)",
            format_size(input_size),
            format_size(output_size),
            ratio
        );
        // Keep stdout clean when it carries the image.
        if is_stdout {
            eprintln!("{msg}");
        } else {
            println!("{msg}");
        }
    }
    Ok(())
}

/// Apply `--grayscale` and drop alpha where the target format can't hold it.
fn prepare(image: Image, format: ImageFormat, grayscale: bool) -> Image {
    let Image {
        width,
        height,
        color_type,
        pixels,
    } = image;
    let (pixels, color_type) = if grayscale {
        (to_grayscale(&pixels, color_type), ColorType::Gray)
    } else if format == ImageFormat::Jpeg {
        match color_type {
            ColorType::GrayAlpha => (drop_alpha(&pixels, 2), ColorType::Gray),
            ColorType::Rgba => (drop_alpha(&pixels, 4), ColorType::Rgb),
            _ => (pixels, color_type),
        }
    } else {
        (pixels, color_type)
    };
    Image {
        width,
        height,
        color_type,
        pixels,
    }
}

fn encode(
    image: &Image,
    format: ImageFormat,
    args: &Args,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut output = Vec::new();
    match format {
        ImageFormat::Png => {
            let preset = match args.png_preset {
                PngPresetArg::Fast => 0,
                PngPresetArg::Balanced => 1,
                PngPresetArg::Max => 2,
            };
            let mut builder = PngOptions::builder(image.width, image.height)
                .color_type(image.color_type)
                .preset(preset);
            if let Some(level) = args.compression {
                builder = builder.compression_level(level);
            }
            if let Some(filter) = args.filter {
                builder = builder.filter_strategy(filter.into());
            }
            let options = builder.build();
            log::info!(
                "PNG options: level={}, strategy={:?}, filter={:?}",
                options.compression_level,
                options.strategy,
                options.filter_strategy
            );
            imgcodec::png::encode_into(&mut output, &image.pixels, &options)?;
        }
        ImageFormat::Jpeg => {
            let options = JpegOptions::builder(image.width, image.height)
                .color_type(image.color_type)
                .quality(args.quality)
                .subsampling(args.subsampling.into())
                .restart_interval(match args.restart_interval {
                    0 => None,
                    n => Some(n),
                })
                .build();
            log::info!(
                "JPEG options: quality={}, subsampling={:?}, restart_interval={:?}",
                options.quality,
                options.subsampling,
                options.restart_interval
            );
            imgcodec::jpeg::encode_into(&mut output, &image.pixels, &options)?;
        }
        other => output = other.encode(image)?,
    }
    Ok(output)
}

fn to_grayscale(pixels: &[u8], color_type: ColorType) -> Vec<u8> {
    // ITU-R BT.601 luma coefficients
    let luma = |p: &[u8]| {
        let (r, g, b) = (p[0] as u32, p[1] as u32, p[2] as u32);
        ((77 * r + 150 * g + 29 * b + 128) >> 8) as u8
    };
    match color_type {
        ColorType::Gray => pixels.to_vec(),
        ColorType::GrayAlpha => pixels.iter().step_by(2).copied().collect(),
        ColorType::Rgb => pixels.chunks_exact(3).map(luma).collect(),
        ColorType::Rgba => pixels.chunks_exact(4).map(luma).collect(),
    }
}

fn drop_alpha(pixels: &[u8], channels: usize) -> Vec<u8> {
    pixels
        .chunks_exact(channels)
        .flat_map(|p| p[..channels - 1].iter().copied())
        .collect()
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
