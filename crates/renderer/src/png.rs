//! PNG encoding for rendered figures.
//!
//! Supports two encoding modes:
//! - **Indexed PNG (color type 3)**: used when the figure has ≤256 unique
//!   colors. Most figures qualify (grayscale panels, histograms).
//! - **RGBA PNG (color type 6)**: fallback for images with >256 colors
//!   such as RGB composites.
//!
//! Text metadata (the figure title, panel descriptions) is written as
//! UTF-8 `iTXt` chunks ahead of the image data.

use std::collections::HashMap;
use std::io::Write;

/// Maximum colors for indexed PNG (PNG8)
const MAX_PALETTE_SIZE: usize = 256;

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// A keyword / text pair stored in an `iTXt` chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PngText {
    pub keyword: String,
    pub text: String,
}

impl PngText {
    pub fn new(keyword: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            text: text.into(),
        }
    }
}

/// Encode RGBA pixels, choosing indexed or RGBA encoding automatically.
///
/// # Arguments
/// - `pixels`: RGBA pixel data (4 bytes per pixel)
/// - `width`: Image width in pixels
/// - `height`: Image height in pixels
/// - `text`: metadata chunks, in order
pub fn create_png_auto(
    pixels: &[u8],
    width: usize,
    height: usize,
    text: &[PngText],
) -> Result<Vec<u8>, String> {
    check_dimensions(pixels, width, height)?;

    match extract_palette(pixels) {
        Some((palette, indices)) => create_png_indexed(width, height, &palette, &indices, text),
        None => create_png(pixels, width, height, text),
    }
}

fn check_dimensions(pixels: &[u8], width: usize, height: usize) -> Result<(), String> {
    if width == 0 || height == 0 {
        return Err(format!("Cannot encode an empty {}x{} image", width, height));
    }
    if pixels.len() != width * height * 4 {
        return Err(format!(
            "Expected {} RGBA bytes for {}x{}, got {}",
            width * height * 4,
            width,
            height,
            pixels.len()
        ));
    }
    Ok(())
}

/// Pack RGBA bytes into a u32 for faster hashing and comparison
#[inline(always)]
fn pack_color(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (r as u32) | ((g as u32) << 8) | ((b as u32) << 16) | ((a as u32) << 24)
}

/// Build a palette and per-pixel indices, or `None` past 256 colours.
fn extract_palette(pixels: &[u8]) -> Option<(Vec<(u8, u8, u8, u8)>, Vec<u8>)> {
    let mut color_to_index: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette: Vec<(u8, u8, u8, u8)> = Vec::with_capacity(MAX_PALETTE_SIZE);
    let mut indices: Vec<u8> = Vec::with_capacity(pixels.len() / 4);

    for chunk in pixels.chunks_exact(4) {
        let packed = pack_color(chunk[0], chunk[1], chunk[2], chunk[3]);

        let index = match color_to_index.get(&packed) {
            Some(&idx) => idx,
            None => {
                if palette.len() >= MAX_PALETTE_SIZE {
                    return None;
                }
                let idx = palette.len() as u8;
                palette.push((chunk[0], chunk[1], chunk[2], chunk[3]));
                color_to_index.insert(packed, idx);
                idx
            }
        };
        indices.push(index);
    }

    Some((palette, indices))
}

/// Create an indexed PNG (color type 3) from palette and indices.
pub fn create_png_indexed(
    width: usize,
    height: usize,
    palette: &[(u8, u8, u8, u8)],
    indices: &[u8],
    text: &[PngText],
) -> Result<Vec<u8>, String> {
    if indices.len() != width * height {
        return Err(format!(
            "Expected {} palette indices, got {}",
            width * height,
            indices.len()
        ));
    }

    let mut png = start_png(width, height, 3);

    // PLTE chunk (palette)
    let plte_data: Vec<u8> = palette.iter().flat_map(|(r, g, b, _)| [*r, *g, *b]).collect();
    write_chunk(&mut png, b"PLTE", &plte_data);

    // tRNS chunk, only if any entry is not fully opaque
    if palette.iter().any(|(_, _, _, a)| *a < 255) {
        let trns_data: Vec<u8> = palette.iter().map(|(_, _, _, a)| *a).collect();
        write_chunk(&mut png, b"tRNS", &trns_data);
    }

    write_text_chunks(&mut png, text)?;

    let idat_data = deflate_scanlines(indices, width, height)
        .map_err(|e| format!("IDAT compression failed: {}", e))?;
    write_chunk(&mut png, b"IDAT", &idat_data);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Create a PNG image from RGBA pixel data (color type 6).
pub fn create_png(
    pixels: &[u8],
    width: usize,
    height: usize,
    text: &[PngText],
) -> Result<Vec<u8>, String> {
    check_dimensions(pixels, width, height)?;

    let mut png = start_png(width, height, 6);
    write_text_chunks(&mut png, text)?;

    let idat_data = deflate_scanlines(pixels, width * 4, height)
        .map_err(|e| format!("IDAT compression failed: {}", e))?;
    write_chunk(&mut png, b"IDAT", &idat_data);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Signature plus IHDR for an 8-bit image of the given color type.
fn start_png(width: usize, height: usize, color_type: u8) -> Vec<u8> {
    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);

    let mut ihdr_data = Vec::with_capacity(13);
    ihdr_data.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr_data.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr_data.push(8); // bit depth
    ihdr_data.push(color_type);
    ihdr_data.push(0); // compression method
    ihdr_data.push(0); // filter method
    ihdr_data.push(0); // interlace method
    write_chunk(&mut png, b"IHDR", &ihdr_data);

    png
}

/// Uncompressed international text: keyword, NUL, flag, method, empty
/// language tag and translated keyword, then UTF-8 text.
fn write_text_chunks(png: &mut Vec<u8>, text: &[PngText]) -> Result<(), String> {
    for entry in text {
        let keyword = entry.keyword.as_bytes();
        if keyword.is_empty() || keyword.len() > 79 || !entry.keyword.is_ascii() || keyword.contains(&0) {
            return Err(format!("Invalid PNG text keyword '{}'", entry.keyword));
        }

        let mut data = Vec::with_capacity(keyword.len() + 5 + entry.text.len());
        data.extend_from_slice(keyword);
        data.extend_from_slice(&[0, 0, 0, 0, 0]);
        data.extend_from_slice(entry.text.as_bytes());
        write_chunk(png, b"iTXt", &data);
    }
    Ok(())
}

/// Write a PNG chunk
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Prefix each `row_bytes` scanline with filter type 0 and deflate.
fn deflate_scanlines(
    data: &[u8],
    row_bytes: usize,
    height: usize,
) -> Result<Vec<u8>, std::io::Error> {
    let mut uncompressed = Vec::with_capacity(height * (1 + row_bytes));
    for row in data.chunks_exact(row_bytes).take(height) {
        uncompressed.push(0);
        uncompressed.extend_from_slice(row);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&uncompressed)?;
    encoder.finish()
}

/// Read back the `iTXt` entries of an encoded PNG.
pub fn read_text_chunks(png: &[u8]) -> Vec<PngText> {
    let mut out = Vec::new();
    if png.len() < 8 || png[..8] != PNG_SIGNATURE {
        return out;
    }

    let mut pos = 8;
    while pos + 8 <= png.len() {
        let len = u32::from_be_bytes([png[pos], png[pos + 1], png[pos + 2], png[pos + 3]]) as usize;
        let kind = &png[pos + 4..pos + 8];
        let start = pos + 8;
        let end = start + len;
        if end + 4 > png.len() {
            break;
        }
        if kind == b"iTXt" {
            let data = &png[start..end];
            if let Some(nul) = data.iter().position(|b| *b == 0) {
                let keyword = String::from_utf8_lossy(&data[..nul]).into_owned();
                // flag, method, then two NUL-terminated strings
                let mut rest = &data[(nul + 3).min(data.len())..];
                for _ in 0..2 {
                    let skip = rest.iter().position(|b| *b == 0).map(|p| p + 1).unwrap_or(rest.len());
                    rest = &rest[skip..];
                }
                out.push(PngText::new(keyword, String::from_utf8_lossy(rest).into_owned()));
            }
        }
        pos = end + 4;
    }
    out
}
