//! XuanFang 3.5" (hardware revision B / flagship).
//!
//! Commands are 10-byte frames: the command byte, eight payload bytes and the
//! command byte again. Bitmaps are big-endian RGB565.

use image::{imageops, RgbImage};
use tracing::{info, warn};

use crate::config::dashboard_config::{Color, Orientation};
use crate::display::serial::{read_available, Link};
use crate::display::Panel;
use crate::render::canvas::{to_rgb565, ByteOrder};
use crate::render::unit_interval::NumUnitIntervalExt;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum Command {
    Hello = 0xCA,
    SetOrientation = 0xCB,
    DisplayBitmap = 0xCC,
    SetBrightness = 0xCE,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SubRevision {
    Unknown,
    /// Backlight can only be switched on or off.
    A01,
    /// Backlight accepts 0..=255.
    A02,
}

pub fn frame(command: Command, payload: &[u8]) -> [u8; 10] {
    let mut frame = [0u8; 10];
    frame[0] = command as u8;
    for (slot, byte) in frame[1..9].iter_mut().zip(payload) {
        *slot = *byte;
    }
    frame[9] = command as u8;
    frame
}

pub struct RevB<L> {
    link: L,
    orientation: Orientation,
    sub_revision: SubRevision,
}

impl<L: Link> RevB<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            orientation: Orientation::default(),
            sub_revision: SubRevision::Unknown,
        }
    }

    pub fn sub_revision(&self) -> SubRevision {
        self.sub_revision
    }

    fn send(&mut self, command: Command, payload: &[u8]) -> anyhow::Result<()> {
        self.link.write_all(&frame(command, payload))?;
        Ok(())
    }

    fn hello(&mut self) -> anyhow::Result<()> {
        self.send(Command::Hello, b"HELLO")?;

        let mut response = [0u8; 10];
        let read = read_available(&mut self.link, &mut response)?;
        if read != response.len()
            || response[0] != Command::Hello as u8
            || response[9] != Command::Hello as u8
        {
            warn!(?response, read, "Unexpected HELLO answer, assuming on/off backlight");
            self.sub_revision = SubRevision::Unknown;
            return Ok(());
        }

        self.sub_revision = match response[6] {
            0x0A => SubRevision::A01,
            0x0B => SubRevision::A02,
            other => {
                warn!(sub_revision = other, "Unknown panel sub-revision");
                SubRevision::Unknown
            }
        };
        info!(sub_revision = ?self.sub_revision, "Revision B panel answered HELLO");
        Ok(())
    }
}

impl<L: Link> Panel for RevB<L> {
    /// This revision has no hardware reset, so the screen is cleared instead.
    fn reset(&mut self) -> anyhow::Result<()> {
        let (width, height) = self.orientation.dimensions();
        let blank = RgbImage::from_pixel(width, height, Color::BLACK.into());
        self.blit(0, 0, &blank)
    }

    fn initialize(&mut self) -> anyhow::Result<()> {
        self.hello()
    }

    fn set_brightness(&mut self, percent: u8) -> anyhow::Result<()> {
        let level = match self.sub_revision {
            SubRevision::A02 => percent.to_unit(100u8).scale(255u8),
            // 0 is full brightness and 1 switches the backlight off.
            _ => u8::from(percent == 0),
        };
        self.send(Command::SetBrightness, &[level])
    }

    fn set_orientation(&mut self, orientation: Orientation) -> anyhow::Result<()> {
        self.orientation = orientation;
        // Reverse orientations are produced by rotating bitmaps in `blit`.
        let value = u8::from(orientation.is_landscape());
        self.send(Command::SetOrientation, &[value])
    }

    fn blit(&mut self, x: u32, y: u32, image: &RgbImage) -> anyhow::Result<()> {
        let (width, height) = self.orientation.dimensions();
        let (w, h) = image.dimensions();

        let rotated;
        let (image, x0, y0, x1, y1) = if self.orientation.is_reverse() {
            rotated = imageops::rotate180(image);
            (&rotated, width - x - w, height - y - h, width - x - 1, height - y - 1)
        } else {
            (image, x, y, x + w - 1, y + h - 1)
        };

        let mut payload = [0u8; 8];
        for (slot, coordinate) in payload.chunks_exact_mut(2).zip([x0, y0, x1, y1]) {
            slot.copy_from_slice(&(coordinate as u16).to_be_bytes());
        }
        self.send(Command::DisplayBitmap, &payload)?;

        for chunk in to_rgb565(image, ByteOrder::Big).chunks((width * 8) as usize) {
            self.link.write_all(chunk)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.link.flush()?;
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.link.flush()?;
        Ok(())
    }
}
