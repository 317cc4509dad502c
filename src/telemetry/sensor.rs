//! 1-Wire temperature sensor
//!
//! The kernel's w1_therm driver exposes each slave as a two-line text file;
//! the second line carries the reading as `t=<millidegrees>`.

use std::path::{Path, PathBuf};

use crate::error::TelemetryError;

pub struct W1TempSensor {
    path: PathBuf,
}

impl W1TempSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current temperature in degrees Celsius.
    pub fn read(&self) -> Result<f32, TelemetryError> {
        let raw = std::fs::read_to_string(&self.path)?;
        parse_reading(&raw)
            .ok_or_else(|| TelemetryError::Sensor(format!("malformed sensor data in {}", self.path.display())))
    }
}

fn parse_reading(raw: &str) -> Option<f32> {
    let line = raw.lines().nth(1)?;
    let (_, milli) = line.split_once("t=")?;
    let milli: f32 = milli.trim().parse().ok()?;
    Some(milli / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "6e 01 4b 46 7f ff 02 10 71 : crc=71 YES\n6e 01 4b 46 7f ff 02 10 71 t=22875\n";

    #[test]
    fn parses_w1_slave_output() {
        assert_eq!(parse_reading(SAMPLE), Some(22.875));
    }

    #[test]
    fn rejects_missing_marker() {
        assert_eq!(parse_reading("one line only\n"), None);
        assert_eq!(parse_reading("a\nno marker here\n"), None);
    }

    #[test]
    fn reads_from_file() {
        let path = std::env::temp_dir().join("w1-sensor-test");
        std::fs::write(&path, SAMPLE).unwrap();

        let sensor = W1TempSensor::new(&path);
        assert_eq!(sensor.read().unwrap(), 22.875);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_an_error() {
        let sensor = W1TempSensor::new("/nonexistent/w1_slave");
        assert!(sensor.read().is_err());
    }
}
