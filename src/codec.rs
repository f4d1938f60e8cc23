//! Image decoding and encoding at 16 bits per channel.
//!
//! Standard formats go through the `image` crate. Camera RAW files (ARW, CR2,
//! NEF, DNG) go through `rawloader` with a half-size demosaic that maps every
//! 2x2 Bayer cell straight to one RGB pixel. Sensors without a 2x2 Bayer
//! filter (X-Trans, four-color) are rejected.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageError, ImageFormat};
use rayon::prelude::*;

use crate::config::OutputFormat;
use crate::error::{DeflickerError, Result};
use crate::Rgba16Image;

const RAW_EXTENSIONS: &[&str] = &["arw", "cr2", "nef", "dng"];

pub fn is_raw(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|ext| RAW_EXTENSIONS.contains(&ext.as_str()))
}

/// Reads the image at `path` and widens it to 16-bit RGBA.
///
/// 8-bit sources are scaled to the full 16-bit range (`v * 257`), images
/// without alpha get an opaque alpha channel.
pub fn decode(path: &Path) -> Result<Rgba16Image> {
    if is_raw(path) {
        return decode_raw(path);
    }
    let img = image::open(path).map_err(|source| DeflickerError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.into_rgba16())
}

/// Positions of the red, the two green and the blue photosites inside one
/// 2x2 Bayer cell, as (row, column).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BayerCell {
    red: (usize, usize),
    green: [(usize, usize); 2],
    blue: (usize, usize),
}

/// Reads the Bayer cell from a color lookup (0 red, 1 green, 2 blue).
///
/// Returns `None` unless the pattern repeats every two photosites and each
/// cell holds exactly one red, two green and one blue site. That rules out
/// X-Trans and four-color sensors.
fn bayer_cell(color_at: impl Fn(usize, usize) -> usize) -> Option<BayerCell> {
    for row in 0..6 {
        for col in 0..6 {
            if color_at(row, col) != color_at(row % 2, col % 2) {
                return None;
            }
        }
    }

    let (mut red, mut blue) = (None, None);
    let mut green = Vec::with_capacity(2);
    for site in [(0, 0), (0, 1), (1, 0), (1, 1)] {
        match color_at(site.0, site.1) {
            0 if red.is_none() => red = Some(site),
            1 => green.push(site),
            2 if blue.is_none() => blue = Some(site),
            _ => return None,
        }
    }
    Some(BayerCell {
        red: red?,
        green: green.try_into().ok()?,
        blue: blue?,
    })
}

/// Decodes a camera RAW file by sub-sampling its Bayer pattern.
///
/// Any 2x2 Bayer layout (RGGB, BGGR, GRBG, GBRG) is supported; other color
/// filter arrays are rejected. Sensor values are normalized between the
/// per-color black and white levels reported by the file, then stretched to
/// 16 bits. The output is half the sensor size in each direction.
fn decode_raw(path: &Path) -> Result<Rgba16Image> {
    let raw_error = |message: String| DeflickerError::RawDecode {
        path: path.to_path_buf(),
        message,
    };

    let raw = rawloader::decode_file(path).map_err(|e| raw_error(e.to_string()))?;
    if raw.cpp != 1 {
        return Err(raw_error(format!("unsupported layout with {} components per pixel", raw.cpp)));
    }
    let cell = bayer_cell(|row, col| raw.cfa.color_at(row, col))
        .ok_or_else(|| raw_error(format!("unsupported color filter array {}", raw.cfa.name)))?;

    let width = raw.width;
    let out_w = raw.width / 2;
    let out_h = raw.height / 2;
    if out_w == 0 || out_h == 0 {
        return Err(raw_error(format!("sensor too small ({}x{})", raw.width, raw.height)));
    }

    let black: [f32; 3] = std::array::from_fn(|c| raw.blacklevels[c] as f32);
    let range: [f32; 3] = std::array::from_fn(|c| (raw.whitelevels[c] as f32 - black[c]).max(1.0));
    let offset = |(row, col): (usize, usize)| row * width + col;
    let (r, g1, g2, b) = (offset(cell.red), offset(cell.green[0]), offset(cell.green[1]), offset(cell.blue));
    let mut buf = vec![0u16; out_w * out_h * 4];

    match raw.data {
        rawloader::RawImageData::Integer(ref data) => {
            let scale =
                |v: f32, c: usize| (((v - black[c]) / range[c]).clamp(0.0, 1.0) * 65535.0 + 0.5) as u16;
            buf.par_chunks_exact_mut(out_w * 4)
                .enumerate()
                .for_each(|(y, row)| {
                    for x in 0..out_w {
                        let idx = (y * 2) * width + (x * 2);
                        row[x * 4] = scale(data[idx + r] as f32, 0);
                        row[x * 4 + 1] = scale((data[idx + g1] as f32 + data[idx + g2] as f32) / 2.0, 1);
                        row[x * 4 + 2] = scale(data[idx + b] as f32, 2);
                        row[x * 4 + 3] = u16::MAX;
                    }
                });
        }
        rawloader::RawImageData::Float(ref data) => {
            let scale = |v: f32| (v.clamp(0.0, 1.0) * 65535.0 + 0.5) as u16;
            buf.par_chunks_exact_mut(out_w * 4)
                .enumerate()
                .for_each(|(y, row)| {
                    for x in 0..out_w {
                        let idx = (y * 2) * width + (x * 2);
                        row[x * 4] = scale(data[idx + r]);
                        row[x * 4 + 1] = scale((data[idx + g1] + data[idx + g2]) / 2.0);
                        row[x * 4 + 2] = scale(data[idx + b]);
                        row[x * 4 + 3] = u16::MAX;
                    }
                });
        }
    }

    Rgba16Image::from_raw(out_w as u32, out_h as u32, buf)
        .ok_or_else(|| raw_error("failed to create image buffer".to_string()))
}

/// Writes `image` to `path` in the given format.
///
/// PNG and TIFF keep all 16 bits. JPEG is limited to 8 bits per channel and
/// drops alpha; `jpeg_quality` (1-100) only applies there.
pub fn encode(image: &Rgba16Image, path: &Path, format: OutputFormat, jpeg_quality: u32) -> Result<()> {
    let result = match format {
        OutputFormat::Png => image.save_with_format(path, ImageFormat::Png),
        OutputFormat::Tiff => image.save_with_format(path, ImageFormat::Tiff),
        OutputFormat::Jpeg => write_jpeg(image, path, jpeg_quality.clamp(1, 100) as u8),
    };
    result.map_err(|source| DeflickerError::Encode {
        path: path.to_path_buf(),
        source,
    })
}

fn write_jpeg(image: &Rgba16Image, path: &Path, quality: u8) -> std::result::Result<(), ImageError> {
    let rgb = DynamicImage::ImageRgba16(image.clone()).into_rgb8();
    let mut writer = BufWriter::new(File::create(path)?);
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, quality))
}
