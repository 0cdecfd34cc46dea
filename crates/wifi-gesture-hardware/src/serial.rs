//! Serial-port line source.
//!
//! The sensor streams newline-terminated text over UART. Bytes are read with
//! a bounded timeout and assembled into lines by [`LineAssembler`]; partial
//! lines stay buffered until their terminator arrives.

use std::io::{self, Read};
use std::time::{Duration, Instant};

use serialport::{ClearBuffer, SerialPort};
use tracing::{debug, info, warn};
use wifi_gesture_core::{LineRead, LineSource, TransportError};

use crate::error::HardwareError;

/// Default UART speed of the sensor firmware.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default delay after opening the port, while the board resets.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(2000);

/// Lines longer than this are discarded.
pub const MAX_LINE_BYTES: usize = 8 * 1024;

const READ_CHUNK: usize = 1024;

/// Serial port settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Delay after open before reading
    pub settle: Duration,
}

impl SerialConfig {
    /// Settings for `port` with the default baud rate and settle delay.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            settle: DEFAULT_SETTLE,
        }
    }
}

/// Splits a byte stream into text lines.
///
/// Bytes are decoded as UTF-8 lossily; `\r\n` and `\n` terminators are both
/// accepted. A line that grows beyond the size limit is dropped up to and
/// including its terminator.
#[derive(Debug)]
pub struct LineAssembler {
    buffer: Vec<u8>,
    max_line: usize,
    discarding: bool,
    overlong_dropped: u64,
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new(MAX_LINE_BYTES)
    }
}

impl LineAssembler {
    /// Create an assembler with the given line size limit.
    pub fn new(max_line: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(max_line.min(READ_CHUNK * 4)),
            max_line,
            discarding: false,
            overlong_dropped: 0,
        }
    }

    /// Append received bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pop the next complete line, if any.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') else {
                if self.buffer.len() > self.max_line {
                    if !self.discarding {
                        self.overlong_dropped += 1;
                    }
                    self.buffer.clear();
                    self.discarding = true;
                }
                return None;
            };

            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            if self.discarding {
                self.discarding = false;
                continue;
            }
            if raw.len() - 1 > self.max_line {
                self.overlong_dropped += 1;
                continue;
            }

            let text = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            return Some(text.trim_end_matches('\r').to_string());
        }
    }

    /// Number of lines dropped for exceeding the size limit.
    pub fn overlong_dropped(&self) -> u64 {
        self.overlong_dropped
    }

    /// Bytes buffered without a terminator.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Line source backed by a serial port.
pub struct SerialLineSource {
    port: Option<Box<dyn SerialPort>>,
    name: String,
    assembler: LineAssembler,
}

impl SerialLineSource {
    /// Open the port and wait out the settle delay.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::SerialOpen`] if the device cannot be opened.
    pub fn open(config: &SerialConfig) -> Result<Self, HardwareError> {
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(Duration::from_secs(1))
            .open()
            .map_err(|source| HardwareError::SerialOpen {
                port: config.port.clone(),
                baud_rate: config.baud_rate,
                source,
            })?;

        info!(
            port = %config.port,
            baud_rate = config.baud_rate,
            "Serial port opened"
        );

        if !config.settle.is_zero() {
            debug!(settle_ms = config.settle.as_millis() as u64, "Waiting for device to settle");
            std::thread::sleep(config.settle);
        }
        if let Err(e) = port.clear(ClearBuffer::Input) {
            warn!(error = %e, "Could not clear serial input buffer");
        }

        Ok(Self {
            port: Some(port),
            name: format!("serial:{}@{}", config.port, config.baud_rate),
            assembler: LineAssembler::default(),
        })
    }

    /// Lines dropped for exceeding the size limit.
    pub fn overlong_dropped(&self) -> u64 {
        self.assembler.overlong_dropped()
    }
}

impl LineSource for SerialLineSource {
    fn read_line(&mut self, timeout: Duration) -> Result<LineRead, TransportError> {
        if let Some(line) = self.assembler.next_line() {
            return Ok(LineRead::Line(line));
        }

        let port = self.port.as_mut().ok_or(TransportError::Closed)?;
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(LineRead::Idle);
            }
            port.set_timeout(remaining)
                .map_err(|e| TransportError::disconnected(e.to_string()))?;

            match port.read(&mut chunk) {
                Ok(0) => continue,
                Ok(n) => {
                    self.assembler.feed(&chunk[..n]);
                    if let Some(line) = self.assembler.next_line() {
                        return Ok(LineRead::Line(line));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(LineRead::Idle),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(TransportError::disconnected(format!(
                        "{}: {e}",
                        self.name
                    )))
                }
            }
        }
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if self.port.take().is_some() {
            info!(source = %self.name, "Serial port closed");
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}
