use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use anyhow::{anyhow, Context};
use image::codecs::png::PngEncoder;
use image::{imageops, ExtendedColorType, ImageEncoder, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::info;

use crate::config::dashboard_config::{Color, TextStyle};
use crate::render::unit_interval::NumUnitIntervalExt;

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressBar {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub min: f64,
    pub max: f64,
    pub value: f64,
    pub color: Color,
    pub outline: bool,
    pub background: Color,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// Rasterizes text and bars into small RGB bitmaps that panels can blit.
#[derive(Default)]
pub struct Canvas {
    fonts: HashMap<String, FontVec>,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_fonts(paths: &HashMap<String, PathBuf>) -> anyhow::Result<Self> {
        let mut canvas = Canvas::new();
        for (name, path) in paths {
            let data = std::fs::read(path)
                .with_context(|| format!("Failed to read font {name:?} from {}", path.display()))?;
            let font = FontVec::try_from_vec(data)
                .map_err(|err| anyhow!("Invalid font {name:?} ({}): {err}", path.display()))?;
            info!(font = %name, path = %path.display(), "Loaded font");
            canvas.add_font(name.clone(), font);
        }
        Ok(canvas)
    }

    pub fn add_font(&mut self, name: String, font: FontVec) {
        self.fonts.insert(name, font);
    }

    pub fn render_text(&self, text: &str, style: &TextStyle) -> anyhow::Result<RgbImage> {
        let font = self
            .fonts
            .get(&style.font)
            .ok_or_else(|| anyhow!("Font {:?} is not loaded", style.font))?;
        let scale = PxScale::from(style.size);

        let (width, height) = text_size(scale, font, text);
        let line_height = font.as_scaled(scale).height().ceil() as u32;

        let mut image = RgbImage::from_pixel(
            width.max(1),
            height.max(line_height).max(1),
            style.background.into(),
        );
        draw_text_mut(&mut image, style.color.into(), 0, 0, scale, font, text);

        Ok(image)
    }

    pub fn render_progress_bar(bar: &ProgressBar) -> RgbImage {
        let mut image = RgbImage::from_pixel(bar.width, bar.height, bar.background.into());
        let color: Rgb<u8> = bar.color.into();

        let filled: u32 = bar.value.to_unit_in(bar.min, bar.max).scale(bar.width);
        if filled > 0 {
            draw_filled_rect_mut(&mut image, Rect::at(0, 0).of_size(filled, bar.height), color);
        }
        if bar.outline {
            draw_hollow_rect_mut(
                &mut image,
                Rect::at(0, 0).of_size(bar.width, bar.height),
                color,
            );
        }

        image
    }
}

/// Crops `image` placed at `(x, y)` to a `width`×`height` screen.
///
/// Returns `None` when nothing of it is visible.
pub fn clip(image: RgbImage, x: u32, y: u32, width: u32, height: u32) -> Option<RgbImage> {
    if x >= width || y >= height || image.width() == 0 || image.height() == 0 {
        return None;
    }

    let visible_width = image.width().min(width - x);
    let visible_height = image.height().min(height - y);
    if visible_width == image.width() && visible_height == image.height() {
        return Some(image);
    }

    Some(imageops::crop_imm(&image, 0, 0, visible_width, visible_height).to_image())
}

pub fn to_rgb565(image: &RgbImage, order: ByteOrder) -> Vec<u8> {
    let mut buf = Vec::with_capacity((image.width() * image.height() * 2) as usize);
    for Rgb([r, g, b]) in image.pixels() {
        let pixel = (u16::from(*r >> 3) << 11) | (u16::from(*g >> 2) << 5) | u16::from(*b >> 3);
        match order {
            ByteOrder::Little => buf.extend_from_slice(&pixel.to_le_bytes()),
            ByteOrder::Big => buf.extend_from_slice(&pixel.to_be_bytes()),
        }
    }
    buf
}

/// Full-screen image kept in memory by the simulated panel.
pub struct Framebuffer {
    buf: RgbImage,
}

impl Framebuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Framebuffer {
            buf: RgbImage::from_pixel(width, height, Color::BLACK.into()),
        }
    }

    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    pub fn fill(&mut self, color: Color) {
        let color: Rgb<u8> = color.into();
        self.buf.pixels_mut().for_each(|pixel| *pixel = color);
    }

    pub fn blit(&mut self, x: u32, y: u32, image: &RgbImage) {
        imageops::replace(&mut self.buf, image, i64::from(x), i64::from(y));
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb<u8>> {
        self.buf.get_pixel_checked(x, y).copied()
    }

    pub fn save_to_in_memory_png(&self) -> anyhow::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let cursor = Cursor::new(&mut buffer);
        let encoder = PngEncoder::new(cursor);
        encoder.write_image(
            &self.buf,
            self.buf.width(),
            self.buf.height(),
            ExtendedColorType::Rgb8,
        )?;
        Ok(buffer)
    }

    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let buf = self.save_to_in_memory_png()?;
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        file.write_all(&buf)?;
        Ok(())
    }
}
