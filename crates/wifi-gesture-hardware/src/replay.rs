//! Replay of recorded sensor output.
//!
//! Feeds a text capture through the same [`LineSource`] seam as the serial
//! port, optionally paced at a fixed line rate to mimic the live device.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::info;
use wifi_gesture_core::{LineRead, LineSource, TransportError};

use crate::error::HardwareError;

/// Line source reading from any buffered reader.
pub struct ReplayLineSource<R> {
    reader: Option<R>,
    name: String,
    interval: Option<Duration>,
    next_due: Option<Instant>,
    lines_read: u64,
}

impl ReplayLineSource<BufReader<File>> {
    /// Open a capture file.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::ReplayOpen`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HardwareError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| HardwareError::ReplayOpen {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Replay file opened");
        Ok(Self::from_reader(
            BufReader::new(file),
            format!("replay:{}", path.display()),
        ))
    }
}

impl<R: BufRead + Send> ReplayLineSource<R> {
    /// Wrap an existing reader.
    pub fn from_reader(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader: Some(reader),
            name: name.into(),
            interval: None,
            next_due: None,
            lines_read: 0,
        }
    }

    /// Deliver at most `rate_hz` lines per second.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::InvalidSource`] if the rate is not a positive
    /// finite number.
    pub fn with_rate(mut self, rate_hz: f64) -> Result<Self, HardwareError> {
        if !(rate_hz.is_finite() && rate_hz > 0.0) {
            return Err(HardwareError::InvalidSource(format!(
                "replay rate must be positive, got {rate_hz}"
            )));
        }
        self.interval = Some(Duration::from_secs_f64(1.0 / rate_hz));
        Ok(self)
    }

    /// Lines delivered so far.
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }
}

impl<R: BufRead + Send> LineSource for ReplayLineSource<R> {
    fn read_line(&mut self, timeout: Duration) -> Result<LineRead, TransportError> {
        let reader = self.reader.as_mut().ok_or(TransportError::Closed)?;

        if let (Some(interval), Some(due)) = (self.interval, self.next_due) {
            let wait = due.saturating_duration_since(Instant::now());
            if wait > timeout {
                std::thread::sleep(timeout);
                return Ok(LineRead::Idle);
            }
            std::thread::sleep(wait);
            self.next_due = Some(due + interval);
        } else if let Some(interval) = self.interval {
            self.next_due = Some(Instant::now() + interval);
        }

        let mut raw = Vec::new();
        if reader.read_until(b'\n', &mut raw)? == 0 {
            return Ok(LineRead::EndOfStream);
        }
        self.lines_read += 1;

        let text = String::from_utf8_lossy(&raw);
        Ok(LineRead::Line(
            text.trim_end_matches(['\r', '\n']).to_string(),
        ))
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if self.reader.take().is_some() {
            info!(source = %self.name, lines = self.lines_read, "Replay closed");
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}
