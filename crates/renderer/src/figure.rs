//! Figure composition: a grid of panels rendered onto one RGBA canvas.
//!
//! Panels are laid out row-major in fixed-size cells below a title band.
//! Each cell has a caption strip underneath it. Rasters keep their aspect
//! ratio inside the cell and are sampled nearest-neighbour. Non-finite
//! raster values are left as background.

use std::path::Path;

use image::RgbaImage;
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
    draw_text_mut, text_size,
};
use imageproc::rect::Rect;
use ndarray::Array2;
use rusttype::{Font, Scale};
use tracing::debug;

use openrs_common::{OpenRsError, OpenRsResult};

use crate::colormap::{finite_range, Color, Colormap, WHITE};
use crate::png::{create_png_auto, PngText};

/// Edge length of one panel cell in pixels.
pub const CELL_SIZE: u32 = 400;
/// Height of the band above the grid that carries the figure title.
pub const TITLE_HEIGHT: u32 = 32;
const CAPTION_HEIGHT: u32 = 18;
const MARGIN: u32 = 16;
const COLORBAR_WIDTH: u32 = 16;
const COLORBAR_GAP: u32 = 10;
const PLOT_PADDING: u32 = 12;

const BACKGROUND: Color = WHITE;
const AXIS_COLOR: Color = Color::opaque(40, 40, 40);
const SERIES_COLOR: Color = Color::opaque(31, 119, 180);
const TEXT_COLOR: Color = Color::opaque(0, 0, 0);

const TITLE_FONT_SIZE: f32 = 22.0;
const CAPTION_FONT_SIZE: f32 = 14.0;

/// Embedded monospace font (Hack Regular) used for titles and captions.
const FONT_DATA: &[u8] = epaint_default_fonts::HACK_REGULAR;

/// Density histogram over the finite values of a sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub density: Vec<f64>,
}

impl Histogram {
    /// Equal-width bins over `[min, max]` of the finite values, last bin closed.
    ///
    /// A constant sample is binned over `[v - 0.5, v + 0.5]`. Densities
    /// integrate to one when at least one value is finite.
    pub fn compute<'a>(values: impl IntoIterator<Item = &'a f64>, bins: usize) -> Self {
        let bins = bins.max(1);
        let finite: Vec<f64> = values.into_iter().copied().filter(|v| v.is_finite()).collect();

        let (lo, hi) = match finite_range(finite.iter()) {
            Some((lo, hi)) if hi > lo => (lo, hi),
            Some((v, _)) => (v - 0.5, v + 0.5),
            None => (0.0, 1.0),
        };
        let width = (hi - lo) / bins as f64;
        let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();

        let mut counts = vec![0usize; bins];
        for v in &finite {
            let idx = (((v - lo) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }

        let total = finite.len().max(1) as f64;
        let density = counts.iter().map(|c| *c as f64 / (total * width)).collect();
        Self { edges, density }
    }

    pub fn bins(&self) -> usize {
        self.density.len()
    }
}

/// One cell of a figure.
#[derive(Debug, Clone)]
pub enum Panel {
    /// Scalar raster through a colour map, scaled to its own finite range.
    Raster {
        data: Array2<f64>,
        colormap: Colormap,
        colorbar: bool,
    },
    /// Three channels already in `[0, 1]`.
    Rgb {
        red: Array2<f64>,
        green: Array2<f64>,
        blue: Array2<f64>,
    },
    Histogram(Histogram),
    /// Labelled series, drawn as a polyline with markers.
    Line { points: Vec<(String, f64)> },
    Empty,
}

impl Panel {
    pub fn raster(data: Array2<f64>, colormap: Colormap) -> Self {
        Panel::Raster {
            data,
            colormap,
            colorbar: false,
        }
    }

    pub fn raster_with_colorbar(data: Array2<f64>, colormap: Colormap) -> Self {
        Panel::Raster {
            data,
            colormap,
            colorbar: true,
        }
    }

    pub fn rgb(red: Array2<f64>, green: Array2<f64>, blue: Array2<f64>) -> Self {
        Panel::Rgb { red, green, blue }
    }

    pub fn histogram<'a>(values: impl IntoIterator<Item = &'a f64>, bins: usize) -> Self {
        Panel::Histogram(Histogram::compute(values, bins))
    }

    pub fn line(points: Vec<(String, f64)>) -> Self {
        Panel::Line { points }
    }

    /// Caption drawn under the cell and stored as a text chunk.
    fn describe(&self) -> Option<String> {
        match self {
            Panel::Raster { data, .. } => {
                finite_range(data.iter()).map(|(lo, hi)| format!("range {:.6} .. {:.6}", lo, hi))
            }
            Panel::Line { points } => Some(
                points
                    .iter()
                    .map(|(label, value)| format!("{}={:.6}", label, value))
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            _ => None,
        }
    }

    fn draw(&self, img: &mut RgbaImage, cell: Rect) {
        match self {
            Panel::Raster {
                data,
                colormap,
                colorbar,
            } => draw_raster(img, cell, data, *colormap, *colorbar),
            Panel::Rgb { red, green, blue } => draw_rgb(img, cell, red, green, blue),
            Panel::Histogram(hist) => draw_histogram(img, cell, hist),
            Panel::Line { points } => draw_line_plot(img, cell, points),
            Panel::Empty => {}
        }
    }
}

/// A titled grid of panels.
#[derive(Debug, Clone)]
pub struct Figure {
    title: String,
    rows: usize,
    cols: usize,
    panels: Vec<Panel>,
}

impl Figure {
    pub fn new(title: impl Into<String>, rows: usize, cols: usize) -> Self {
        Self {
            title: title.into(),
            rows: rows.max(1),
            cols: cols.max(1),
            panels: Vec::with_capacity(rows * cols),
        }
    }

    /// A one-panel figure.
    pub fn single(title: impl Into<String>, panel: Panel) -> Self {
        Self::new(title, 1, 1).with_panel(panel)
    }

    pub fn with_panel(mut self, panel: Panel) -> Self {
        self.panels.push(panel);
        self
    }

    pub fn push(&mut self, panel: Panel) {
        self.panels.push(panel);
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn grid(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Canvas size in pixels as `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        let width = self.cols as u32 * CELL_SIZE + (self.cols as u32 + 1) * MARGIN;
        let height =
            TITLE_HEIGHT + self.rows as u32 * (CELL_SIZE + CAPTION_HEIGHT) + (self.rows as u32 + 1) * MARGIN;
        (width, height)
    }

    /// Top-left corner of cell `index` in row-major order.
    fn cell_origin(&self, index: usize) -> (u32, u32) {
        let (row, col) = ((index / self.cols) as u32, (index % self.cols) as u32);
        let x = MARGIN + col * (CELL_SIZE + MARGIN);
        let y = TITLE_HEIGHT + MARGIN + row * (CELL_SIZE + CAPTION_HEIGHT + MARGIN);
        (x, y)
    }

    /// Rasterize every panel onto a fresh canvas.
    pub fn render(&self) -> OpenRsResult<RgbaImage> {
        if self.panels.len() > self.rows * self.cols {
            return Err(OpenRsError::RenderError(format!(
                "{} panels do not fit a {}x{} grid",
                self.panels.len(),
                self.rows,
                self.cols
            )));
        }

        let font = Font::try_from_bytes(FONT_DATA)
            .ok_or_else(|| OpenRsError::RenderError("failed to load embedded font".to_string()))?;

        let (width, height) = self.dimensions();
        let mut img = RgbaImage::from_pixel(width, height, BACKGROUND.to_rgba());

        draw_title(&mut img, &font, &self.title);

        for (i, panel) in self.panels.iter().enumerate() {
            let (x, y) = self.cell_origin(i);
            panel.draw(&mut img, Rect::at(x as i32, y as i32).of_size(CELL_SIZE, CELL_SIZE));
            if let Some(caption) = panel.describe() {
                draw_caption(&mut img, &font, x, y + CELL_SIZE + 2, &caption);
            }
        }

        Ok(img)
    }

    /// Metadata chunks: the title first, then one description per panel that has one.
    pub fn text_chunks(&self) -> Vec<PngText> {
        let mut text = vec![PngText::new("Title", self.title.clone())];
        for (i, panel) in self.panels.iter().enumerate() {
            if let Some(description) = panel.describe() {
                text.push(PngText::new(format!("Panel{}", i + 1), description));
            }
        }
        text
    }

    pub fn to_png(&self) -> OpenRsResult<Vec<u8>> {
        let img = self.render()?;
        let (width, height) = img.dimensions();
        create_png_auto(img.as_raw(), width as usize, height as usize, &self.text_chunks())
            .map_err(OpenRsError::RenderError)
    }

    /// Encode and write to `path`. Nothing is written if encoding fails.
    pub fn save(&self, path: &Path) -> OpenRsResult<()> {
        let png = self.to_png()?;
        std::fs::write(path, &png)?;
        debug!(path = %path.display(), bytes = png.len(), "Figure written");
        Ok(())
    }
}

/// Title centred horizontally in the band above the grid.
fn draw_title(img: &mut RgbaImage, font: &Font<'_>, title: &str) {
    if title.is_empty() {
        return;
    }
    let scale = Scale::uniform(TITLE_FONT_SIZE);
    let text = fit_text(font, scale, title, img.width().saturating_sub(2 * MARGIN));
    let (text_w, text_h) = text_size(scale, font, &text);
    let x = ((img.width() as i32 - text_w) / 2).max(MARGIN as i32);
    let y = MARGIN as i32 / 2 + (TITLE_HEIGHT as i32 - text_h) / 2;
    draw_text_mut(img, TEXT_COLOR.to_rgba(), x, y.max(0), scale, font, &text);
}

fn draw_caption(img: &mut RgbaImage, font: &Font<'_>, x: u32, y: u32, caption: &str) {
    let scale = Scale::uniform(CAPTION_FONT_SIZE);
    let text = fit_text(font, scale, caption, CELL_SIZE);
    draw_text_mut(img, AXIS_COLOR.to_rgba(), x as i32, y as i32, scale, font, &text);
}

/// Longest prefix of `text` that renders within `max_width`, with an
/// ellipsis when anything was cut.
fn fit_text(font: &Font<'_>, scale: Scale, text: &str, max_width: u32) -> String {
    if text_size(scale, font, text).0 <= max_width as i32 {
        return text.to_string();
    }
    let mut chars: Vec<char> = text.chars().collect();
    while !chars.is_empty() {
        chars.pop();
        let candidate: String = chars.iter().collect::<String>() + "...";
        if text_size(scale, font, &candidate).0 <= max_width as i32 {
            return candidate;
        }
    }
    String::new()
}

/// Largest `(w, h)` with the raster's aspect ratio fitting in `max_w x max_h`.
fn fit(rows: usize, cols: usize, max_w: u32, max_h: u32) -> (u32, u32, f64) {
    let scale = (max_w as f64 / cols as f64).min(max_h as f64 / rows as f64);
    let w = ((cols as f64 * scale).round() as u32).clamp(1, max_w);
    let h = ((rows as f64 * scale).round() as u32).clamp(1, max_h);
    (w, h, scale)
}

/// Fill an area by sampling `pixel(row, col)` nearest-neighbour from a raster.
fn blit<F>(img: &mut RgbaImage, x0: u32, y0: u32, shape: (usize, usize), size: (u32, u32, f64), pixel: F)
where
    F: Fn(usize, usize) -> Option<Color>,
{
    let (rows, cols) = shape;
    let (w, h, scale) = size;
    for oy in 0..h {
        let r = ((oy as f64 / scale) as usize).min(rows - 1);
        for ox in 0..w {
            let c = ((ox as f64 / scale) as usize).min(cols - 1);
            if let Some(color) = pixel(r, c) {
                let (px, py) = (x0 + ox, y0 + oy);
                if px < img.width() && py < img.height() {
                    img.put_pixel(px, py, color.to_rgba());
                }
            }
        }
    }
}

fn frame(img: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32) {
    draw_hollow_rect_mut(
        img,
        Rect::at(x as i32 - 1, y as i32 - 1).of_size(w + 2, h + 2),
        AXIS_COLOR.to_rgba(),
    );
}

fn draw_raster(img: &mut RgbaImage, cell: Rect, data: &Array2<f64>, colormap: Colormap, colorbar: bool) {
    let (rows, cols) = data.dim();
    if rows == 0 || cols == 0 {
        return;
    }
    let reserved = if colorbar { COLORBAR_WIDTH + COLORBAR_GAP } else { 0 };
    let size = fit(rows, cols, cell.width() - reserved - 2, cell.height() - 2);
    let (x0, y0) = (cell.left() as u32 + 1, cell.top() as u32 + 1);

    let (lo, hi) = finite_range(data.iter()).unwrap_or((0.0, 1.0));
    let span = hi - lo;
    blit(img, x0, y0, (rows, cols), size, |r, c| {
        let v = data[[r, c]];
        if !v.is_finite() {
            return None;
        }
        let t = if span > 0.0 { (v - lo) / span } else { 0.5 };
        Some(colormap.color(t))
    });
    frame(img, x0, y0, size.0, size.1);

    if colorbar {
        let bx = x0 + size.0 + COLORBAR_GAP;
        let bar_h = size.1;
        for i in 0..bar_h {
            let t = if bar_h > 1 {
                1.0 - i as f64 / (bar_h - 1) as f64
            } else {
                1.0
            };
            draw_filled_rect_mut(
                img,
                Rect::at(bx as i32, (y0 + i) as i32).of_size(COLORBAR_WIDTH, 1),
                colormap.color(t).to_rgba(),
            );
        }
        frame(img, bx, y0, COLORBAR_WIDTH, bar_h);
    }
}

fn draw_rgb(img: &mut RgbaImage, cell: Rect, red: &Array2<f64>, green: &Array2<f64>, blue: &Array2<f64>) {
    let (rows, cols) = red.dim();
    if rows == 0 || cols == 0 || green.dim() != red.dim() || blue.dim() != red.dim() {
        return;
    }
    let size = fit(rows, cols, cell.width() - 2, cell.height() - 2);
    let (x0, y0) = (cell.left() as u32 + 1, cell.top() as u32 + 1);

    let channel = |v: f64| -> u8 {
        if v.is_finite() {
            (v.clamp(0.0, 1.0) * 255.0).round() as u8
        } else {
            0
        }
    };
    blit(img, x0, y0, (rows, cols), size, |r, c| {
        Some(Color::opaque(
            channel(red[[r, c]]),
            channel(green[[r, c]]),
            channel(blue[[r, c]]),
        ))
    });
    frame(img, x0, y0, size.0, size.1);
}

/// Plot area inside a cell, leaving padding for the axes.
fn plot_area(cell: Rect) -> (i32, i32, u32, u32) {
    let x = cell.left() + PLOT_PADDING as i32;
    let y = cell.top() + PLOT_PADDING as i32;
    (x, y, cell.width() - 2 * PLOT_PADDING, cell.height() - 2 * PLOT_PADDING)
}

fn draw_axes(img: &mut RgbaImage, x: i32, y: i32, w: u32, h: u32) {
    let color = AXIS_COLOR.to_rgba();
    let bottom = (y + h as i32) as f32;
    draw_line_segment_mut(img, (x as f32, y as f32), (x as f32, bottom), color);
    draw_line_segment_mut(img, (x as f32, bottom), ((x + w as i32) as f32, bottom), color);
}

fn draw_histogram(img: &mut RgbaImage, cell: Rect, hist: &Histogram) {
    let (x, y, w, h) = plot_area(cell);
    let max_density = hist.density.iter().cloned().fold(0.0, f64::max);
    let bins = hist.bins() as u32;

    if max_density > 0.0 {
        for (i, density) in hist.density.iter().enumerate() {
            let bar_h = ((density / max_density) * h as f64).round() as u32;
            if bar_h == 0 {
                continue;
            }
            let left = x + (i as u32 * w / bins) as i32;
            let right = x + ((i as u32 + 1) * w / bins) as i32;
            let bar_w = (right - left).max(1) as u32;
            draw_filled_rect_mut(
                img,
                Rect::at(left, y + (h - bar_h) as i32).of_size(bar_w, bar_h),
                SERIES_COLOR.to_rgba(),
            );
        }
    }
    draw_axes(img, x, y, w, h);
}

fn draw_line_plot(img: &mut RgbaImage, cell: Rect, points: &[(String, f64)]) {
    let (x, y, w, h) = plot_area(cell);
    draw_axes(img, x, y, w, h);
    if points.is_empty() {
        return;
    }

    let (lo, hi) = finite_range(points.iter().map(|(_, v)| v)).unwrap_or((0.0, 1.0));
    let pad = if hi > lo { (hi - lo) * 0.05 } else { 0.5 };
    let (lo, hi) = (lo - pad, hi + pad);

    let n = points.len();
    let to_px = |i: usize, v: f64| -> (f32, f32) {
        let fx = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.5 };
        let fy = (v - lo) / (hi - lo);
        (
            x as f32 + (fx * w as f64) as f32,
            y as f32 + ((1.0 - fy) * h as f64) as f32,
        )
    };

    let color = SERIES_COLOR.to_rgba();
    let mut previous: Option<(f32, f32)> = None;
    for (i, (_, v)) in points.iter().enumerate() {
        if !v.is_finite() {
            previous = None;
            continue;
        }
        let p = to_px(i, *v);
        if let Some(prev) = previous {
            draw_line_segment_mut(img, prev, p, color);
        }
        draw_filled_circle_mut(img, (p.0.round() as i32, p.1.round() as i32), 4, color);
        previous = Some(p);
    }
}
