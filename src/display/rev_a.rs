//! Turing Smart Screen 3.5" (hardware revision A).
//!
//! Every command starts with a 6-byte header packing four 10-bit coordinates
//! followed by the command byte. Bitmaps follow a `DisplayBitmap` header as
//! little-endian RGB565.

use std::time::Duration;

use image::RgbImage;
use tracing::debug;

use crate::config::dashboard_config::Orientation;
use crate::display::serial::Link;
use crate::display::Panel;
use crate::render::canvas::{to_rgb565, ByteOrder};
use crate::render::unit_interval::NumUnitIntervalExt;

/// Time the panel needs to come back after a reset.
const RESET_SETTLE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum Command {
    Reset = 101,
    SetBrightness = 110,
    SetOrientation = 121,
    DisplayBitmap = 197,
}

pub fn header(command: Command, x: u32, y: u32, ex: u32, ey: u32) -> [u8; 6] {
    [
        (x >> 2) as u8,
        (((x & 3) << 6) + (y >> 4)) as u8,
        (((y & 15) << 4) + (ex >> 6)) as u8,
        (((ex & 63) << 2) + (ey >> 8)) as u8,
        (ey & 255) as u8,
        command as u8,
    ]
}

pub struct RevA<L> {
    link: L,
    orientation: Orientation,
    reset_settle: Duration,
}

impl<L: Link> RevA<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            orientation: Orientation::default(),
            reset_settle: RESET_SETTLE,
        }
    }

    fn send(&mut self, command: Command, x: u32, y: u32, ex: u32, ey: u32) -> anyhow::Result<()> {
        self.link.write_all(&header(command, x, y, ex, ey))?;
        Ok(())
    }
}

impl<L: Link> Panel for RevA<L> {
    fn reset(&mut self) -> anyhow::Result<()> {
        debug!("Resetting revision A panel");
        self.send(Command::Reset, 0, 0, 0, 0)?;
        std::thread::sleep(self.reset_settle);
        self.link.reconnect()?;
        Ok(())
    }

    fn initialize(&mut self) -> anyhow::Result<()> {
        // Revision A needs no handshake.
        Ok(())
    }

    fn set_brightness(&mut self, percent: u8) -> anyhow::Result<()> {
        // 0 is the brightest level on this panel.
        let level: u32 = (100 - percent.min(100)).to_unit(100u8).scale(255u8);
        self.send(Command::SetBrightness, level, 0, 0, 0)
    }

    fn set_orientation(&mut self, orientation: Orientation) -> anyhow::Result<()> {
        self.orientation = orientation;
        let (width, height) = orientation.dimensions();

        let mut packet = [0u8; 16];
        packet[..6].copy_from_slice(&header(Command::SetOrientation, 0, 0, 0, 0));
        packet[6] = orientation as u8 + 100;
        packet[7..9].copy_from_slice(&(width as u16).to_be_bytes());
        packet[9..11].copy_from_slice(&(height as u16).to_be_bytes());
        self.link.write_all(&packet)?;
        Ok(())
    }

    fn blit(&mut self, x: u32, y: u32, image: &RgbImage) -> anyhow::Result<()> {
        let (ex, ey) = (x + image.width() - 1, y + image.height() - 1);
        self.send(Command::DisplayBitmap, x, y, ex, ey)?;

        let (width, _) = self.orientation.dimensions();
        for chunk in to_rgb565(image, ByteOrder::Little).chunks((width * 8) as usize) {
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
