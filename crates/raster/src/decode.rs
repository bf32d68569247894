//! Decoding of single-band raster files into `f64` arrays.
//!
//! GeoTIFF is the primary upload format and is read with the `tiff` crate
//! so every integer and float sample format survives unscaled. Anything
//! else goes through `image`, limited to 8/16-bit grayscale.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::GenericImageView;
use ndarray::Array2;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::ColorType;
use tracing::debug;

use openrs_common::{OpenRsError, OpenRsResult};

use crate::Band;

/// Load a single-band raster from disk.
///
/// Fails with `SourceNotFound` when the path does not exist and with
/// `DecodeError` when the file cannot be decoded into one 2-D band.
pub fn load_band(path: &Path) -> OpenRsResult<Band> {
    if !path.exists() {
        return Err(OpenRsError::SourceNotFound(path.to_path_buf()));
    }

    let band = if is_tiff(path) {
        decode_tiff(path)?
    } else {
        decode_image(path)?
    };

    let (height, width) = band.dim();
    if height == 0 || width == 0 {
        return Err(OpenRsError::decode(path, "raster has no pixels"));
    }

    debug!(path = %path.display(), height, width, "Decoded band");
    Ok(band)
}

fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_lowercase().as_str(), "tif" | "tiff"))
        .unwrap_or(false)
}

fn decode_tiff(path: &Path) -> OpenRsResult<Band> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(|e| OpenRsError::decode(path, e.to_string()))?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| OpenRsError::decode(path, e.to_string()))?;

    match decoder
        .colortype()
        .map_err(|e| OpenRsError::decode(path, e.to_string()))?
    {
        ColorType::Gray(_) => {}
        other => {
            return Err(OpenRsError::decode(
                path,
                format!("expected a single-band raster, found {:?}", other),
            ))
        }
    }

    let samples: Vec<f64> = match decoder
        .read_image()
        .map_err(|e| OpenRsError::decode(path, e.to_string()))?
    {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        #[allow(unreachable_patterns)]
        _ => return Err(OpenRsError::decode(path, "unsupported TIFF sample format")),
    };

    to_array(path, height as usize, width as usize, samples)
}

fn decode_image(path: &Path) -> OpenRsResult<Band> {
    let img = image::open(path).map_err(|e| OpenRsError::decode(path, e.to_string()))?;
    let (width, height) = img.dimensions();
    let (width, height) = (width as usize, height as usize);

    let samples: Vec<f64> = match img {
        image::DynamicImage::ImageLuma8(buf) => buf.into_raw().into_iter().map(f64::from).collect(),
        image::DynamicImage::ImageLuma16(buf) => {
            buf.into_raw().into_iter().map(f64::from).collect()
        }
        other => {
            return Err(OpenRsError::decode(
                path,
                format!("expected a single-band raster, found {:?}", other.color()),
            ))
        }
    };

    to_array(path, height, width, samples)
}

fn to_array(path: &Path, height: usize, width: usize, samples: Vec<f64>) -> OpenRsResult<Band> {
    let expected = height * width;
    if samples.len() != expected {
        return Err(OpenRsError::decode(
            path,
            format!("expected {} samples, decoded {}", expected, samples.len()),
        ));
    }
    Array2::from_shape_vec((height, width), samples)
        .map_err(|e| OpenRsError::decode(path, e.to_string()))
}
