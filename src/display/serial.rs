use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use nix::sys::termios::{self, BaudRate, SetArg, SpecialCharacterIndices};
use tracing::{debug, info};

/// Byte stream to a panel. Tests substitute an in-memory implementation.
pub trait Link: Read + Write {
    /// Drops and re-establishes the connection, e.g. after a hardware reset.
    fn reconnect(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A USB CDC tty in raw mode.
pub struct SerialPort {
    path: PathBuf,
    file: File,
}

impl SerialPort {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = open_raw(path)?;
        info!(path = %path.display(), "Opened serial port");
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }
}

fn open_raw(path: &Path) -> anyhow::Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("Failed to open serial port {}", path.display()))?;

    let mut settings = termios::tcgetattr(&file)?;
    termios::cfmakeraw(&mut settings);
    termios::cfsetspeed(&mut settings, BaudRate::B115200)?;
    // Reads return whatever arrived within one second.
    settings.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
    settings.control_chars[SpecialCharacterIndices::VTIME as usize] = 10;
    termios::tcsetattr(&file, SetArg::TCSANOW, &settings)?;

    Ok(file)
}

impl Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Link for SerialPort {
    fn reconnect(&mut self) -> io::Result<()> {
        debug!(path = %self.path.display(), "Reopening serial port");
        self.file = open_raw(&self.path).map_err(io::Error::other)?;
        Ok(())
    }
}

/// Reads up to `buf.len()` bytes, stopping early when the link times out.
pub fn read_available(link: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match link.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Finds the tty whose USB device reports `serial_number`.
pub fn find_port(serial_number: &str) -> anyhow::Result<PathBuf> {
    find_port_in(Path::new("/sys/class/tty"), Path::new("/dev"), serial_number)
}

fn find_port_in(sys_tty: &Path, dev: &Path, serial_number: &str) -> anyhow::Result<PathBuf> {
    let entries = std::fs::read_dir(sys_tty)
        .with_context(|| format!("Failed to list {}", sys_tty.display()))?;

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("ttyACM") || name.starts_with("ttyUSB"))
        .collect();
    names.sort();

    for name in names {
        // `device` points at the USB interface; its parent is the USB device.
        let serial_path = sys_tty.join(&name).join("device").join("..").join("serial");
        let Ok(serial) = std::fs::read_to_string(&serial_path) else {
            continue;
        };
        if serial.trim() == serial_number {
            let port = dev.join(&name);
            info!(port = %port.display(), serial_number, "Auto-detected panel");
            return Ok(port);
        }
    }

    Err(anyhow!(
        "No serial port with serial number {serial_number:?} found; set display.port explicitly"
    ))
}
