//! Panels the dashboard can draw on.
//!
//! [`DisplaySink`] is what the refresh loop talks to. [`LcdDisplay`] implements
//! it once for every [`Panel`]: text and bars are rasterized by the [`Canvas`]
//! and the resulting bitmaps are handed to the panel, which only has to know
//! how to push pixels to its hardware.

use image::RgbImage;
use tracing::{debug, info};

use crate::config::dashboard_config::{DisplayConfig, Orientation, PortSelector, Revision, TextStyle};
use crate::constants::{REV_A_SERIAL_NUMBER, REV_B_SERIAL_NUMBER};
use crate::render::canvas::{clip, Canvas};

pub use crate::render::canvas::ProgressBar;

pub mod rev_a;
pub mod rev_b;
pub mod serial;
pub mod simulated;

pub trait DisplaySink {
    fn reset(&mut self) -> anyhow::Result<()>;
    fn initialize(&mut self) -> anyhow::Result<()>;
    fn set_brightness(&mut self, percent: u8) -> anyhow::Result<()>;
    fn set_orientation(&mut self, orientation: Orientation) -> anyhow::Result<()>;
    fn draw_text(&mut self, text: &str, x: u32, y: u32, style: &TextStyle) -> anyhow::Result<()>;
    fn draw_progress_bar(&mut self, bar: &ProgressBar) -> anyhow::Result<()>;
    /// Called once per refresh, after every field has been drawn.
    fn flush(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
    fn close(&mut self) -> anyhow::Result<()>;
}

/// Hardware-specific half of a display: commands and raw bitmaps.
pub trait Panel {
    fn reset(&mut self) -> anyhow::Result<()>;
    fn initialize(&mut self) -> anyhow::Result<()>;
    fn set_brightness(&mut self, percent: u8) -> anyhow::Result<()>;
    fn set_orientation(&mut self, orientation: Orientation) -> anyhow::Result<()>;
    /// Draws `image` with its top-left corner at logical `(x, y)`.
    fn blit(&mut self, x: u32, y: u32, image: &RgbImage) -> anyhow::Result<()>;
    fn flush(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
    fn close(&mut self) -> anyhow::Result<()>;
}

pub struct LcdDisplay<P> {
    panel: P,
    canvas: Canvas,
    orientation: Orientation,
}

impl<P: Panel> LcdDisplay<P> {
    pub fn new(panel: P, canvas: Canvas) -> Self {
        Self {
            panel,
            canvas,
            orientation: Orientation::default(),
        }
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    fn blit_clipped(&mut self, x: u32, y: u32, image: RgbImage) -> anyhow::Result<()> {
        let (width, height) = self.orientation.dimensions();
        match clip(image, x, y, width, height) {
            Some(image) => self.panel.blit(x, y, &image),
            None => {
                debug!(x, y, "Skipping bitmap outside the screen");
                Ok(())
            }
        }
    }
}

impl<P: Panel> DisplaySink for LcdDisplay<P> {
    fn reset(&mut self) -> anyhow::Result<()> {
        self.panel.reset()
    }

    fn initialize(&mut self) -> anyhow::Result<()> {
        self.panel.initialize()
    }

    fn set_brightness(&mut self, percent: u8) -> anyhow::Result<()> {
        self.panel.set_brightness(percent.min(100))
    }

    fn set_orientation(&mut self, orientation: Orientation) -> anyhow::Result<()> {
        self.orientation = orientation;
        self.panel.set_orientation(orientation)
    }

    fn draw_text(&mut self, text: &str, x: u32, y: u32, style: &TextStyle) -> anyhow::Result<()> {
        let image = self.canvas.render_text(text, style)?;
        self.blit_clipped(x, y, image)
    }

    fn draw_progress_bar(&mut self, bar: &ProgressBar) -> anyhow::Result<()> {
        let image = Canvas::render_progress_bar(bar);
        self.blit_clipped(bar.x, bar.y, image)
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.panel.flush()
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.panel.close()
    }
}

/// Builds the display for the configured hardware revision.
pub fn open(config: &DisplayConfig, canvas: Canvas) -> anyhow::Result<Box<dyn DisplaySink>> {
    let sink: Box<dyn DisplaySink> = match config.revision {
        Revision::A => {
            info!("Selected Hardware Revision A (Turing Smart Screen)");
            let port = serial::SerialPort::open(&port_path(&config.port, REV_A_SERIAL_NUMBER)?)?;
            Box::new(LcdDisplay::new(rev_a::RevA::new(port), canvas))
        }
        Revision::B => {
            info!("Selected Hardware Revision B (XuanFang screen version B / flagship)");
            let port = serial::SerialPort::open(&port_path(&config.port, REV_B_SERIAL_NUMBER)?)?;
            Box::new(LcdDisplay::new(rev_b::RevB::new(port), canvas))
        }
        Revision::Simulated => {
            info!(screencap = %config.screencap.display(), "Selected Simulated LCD");
            Box::new(LcdDisplay::new(
                simulated::Simulated::new(config.screencap.clone()),
                canvas,
            ))
        }
    };
    Ok(sink)
}

fn port_path(selector: &PortSelector, serial_number: &str) -> anyhow::Result<std::path::PathBuf> {
    match selector {
        PortSelector::Path(path) => Ok(path.clone()),
        PortSelector::Auto => serial::find_port(serial_number),
    }
}
