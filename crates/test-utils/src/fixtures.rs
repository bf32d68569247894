//! On-disk fixtures: single-band GeoTIFFs written into a temporary directory.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use openrs_common::BandRole;
use tempfile::TempDir;
use tiff::encoder::{colortype, TiffEncoder};

use crate::generators::scene_bands;

/// Write a band as a 32-bit float grayscale TIFF.
pub fn write_f32_tiff(path: &Path, band: &Array2<f64>) {
    let (height, width) = band.dim();
    let data: Vec<f32> = band.iter().map(|v| *v as f32).collect();
    let file = BufWriter::new(File::create(path).expect("create tiff"));
    let mut encoder = TiffEncoder::new(file).expect("tiff encoder");
    encoder
        .write_image::<colortype::Gray32Float>(width as u32, height as u32, &data)
        .expect("write tiff");
}

/// Write a band as a 16-bit unsigned grayscale TIFF. Values are rounded and clamped.
pub fn write_u16_tiff(path: &Path, band: &Array2<f64>) {
    let (height, width) = band.dim();
    let data: Vec<u16> = band
        .iter()
        .map(|v| v.round().clamp(0.0, u16::MAX as f64) as u16)
        .collect();
    let file = BufWriter::new(File::create(path).expect("create tiff"));
    let mut encoder = TiffEncoder::new(file).expect("tiff encoder");
    encoder
        .write_image::<colortype::Gray16>(width as u32, height as u32, &data)
        .expect("write tiff");
}

/// Write an RGB TIFF, used to exercise the multi-channel rejection path.
pub fn write_rgb_tiff(path: &Path, height: usize, width: usize) {
    let data: Vec<u8> = (0..height * width * 3).map(|i| (i % 251) as u8).collect();
    let file = BufWriter::new(File::create(path).expect("create tiff"));
    let mut encoder = TiffEncoder::new(file).expect("tiff encoder");
    encoder
        .write_image::<colortype::RGB8>(width as u32, height as u32, &data)
        .expect("write tiff");
}

/// A synthetic scene on disk. The directory is removed on drop.
pub struct SceneFiles {
    pub dir: TempDir,
    pub bands: Vec<(BandRole, PathBuf, Array2<f64>)>,
}

impl SceneFiles {
    pub fn path(&self, role: BandRole) -> Option<&Path> {
        self.bands
            .iter()
            .find(|(r, _, _)| *r == role)
            .map(|(_, p, _)| p.as_path())
    }

    pub fn data(&self, role: BandRole) -> Option<&Array2<f64>> {
        self.bands.iter().find(|(r, _, _)| *r == role).map(|(_, _, d)| d)
    }
}

/// Write every band of [`scene_bands`] as `{ROLE}.tif` into a fresh temp dir.
pub fn write_scene(height: usize, width: usize) -> SceneFiles {
    write_bands(scene_bands(height, width))
}

/// Write arbitrary bands as `{role}.tif` into a fresh temp dir.
pub fn write_bands(bands: Vec<(BandRole, Array2<f64>)>) -> SceneFiles {
    let dir = tempfile::tempdir().expect("tempdir");
    let bands = bands
        .into_iter()
        .map(|(role, data)| {
            let path = dir.path().join(format!("{}.tif", role.as_str().to_uppercase()));
            write_f32_tiff(&path, &data);
            (role, path, data)
        })
        .collect();
    SceneFiles { dir, bands }
}
