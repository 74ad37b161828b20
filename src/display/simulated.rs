use std::path::PathBuf;

use image::RgbImage;
use tracing::debug;

use crate::config::dashboard_config::{Color, Orientation};
use crate::display::Panel;
use crate::render::canvas::Framebuffer;

/// A panel that only exists as a PNG screen capture on disk.
pub struct Simulated {
    framebuffer: Framebuffer,
    screencap: PathBuf,
}

impl Simulated {
    pub fn new(screencap: PathBuf) -> Self {
        let (width, height) = Orientation::default().dimensions();
        Self {
            framebuffer: Framebuffer::new(width, height),
            screencap,
        }
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }
}

impl Panel for Simulated {
    fn reset(&mut self) -> anyhow::Result<()> {
        self.framebuffer.fill(Color::BLACK);
        Ok(())
    }

    fn initialize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn set_brightness(&mut self, percent: u8) -> anyhow::Result<()> {
        debug!(percent, "Simulated panel ignores brightness");
        Ok(())
    }

    fn set_orientation(&mut self, orientation: Orientation) -> anyhow::Result<()> {
        let (width, height) = orientation.dimensions();
        if (self.framebuffer.width(), self.framebuffer.height()) != (width, height) {
            self.framebuffer = Framebuffer::new(width, height);
        }
        Ok(())
    }

    fn blit(&mut self, x: u32, y: u32, image: &RgbImage) -> anyhow::Result<()> {
        self.framebuffer.blit(x, y, image);
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.framebuffer.save_to_file(&self.screencap)
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.framebuffer.save_to_file(&self.screencap)
    }
}
