use crate::errors::SensorError;
use log::trace;
use std::path::{Path, PathBuf};

/// Thermal zone the Pi's SoC temperature is exposed on
pub const DEFAULT_SENSOR_PATH: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Source of CPU temperature samples
#[allow(async_fn_in_trait)]
pub trait TemperatureSource {
    /// Current temperature in degrees Celsius.
    async fn read(&mut self) -> Result<f64, SensorError>;
}

/// Temperature read from a sysfs file holding integer millidegrees Celsius
#[derive(Debug, Clone)]
pub struct SysfsTemperature {
    path: PathBuf,
}

impl SysfsTemperature {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for SysfsTemperature {
    fn default() -> Self {
        Self::new(DEFAULT_SENSOR_PATH)
    }
}

impl TemperatureSource for SysfsTemperature {
    async fn read(&mut self) -> Result<f64, SensorError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SensorError::Read {
                path: self.path.clone(),
                source,
            })?;

        let temp = parse_millidegrees(&contents).ok_or_else(|| SensorError::Parse {
            path: self.path.clone(),
            contents: contents.clone(),
        })?;
        trace!("{} -> {:.2}°C", self.path.display(), temp);
        Ok(temp)
    }
}

/// Parse millidegrees into degrees Celsius rounded to two decimals, halves
/// away from zero.
pub fn parse_millidegrees(contents: &str) -> Option<f64> {
    let millidegrees: i64 = contents.trim().parse().ok()?;
    Some((millidegrees as f64 / 10.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_millidegrees() {
        assert_eq!(parse_millidegrees("45000\n"), Some(45.0));
        assert_eq!(parse_millidegrees("70125"), Some(70.13));
        assert_eq!(parse_millidegrees("29994"), Some(29.99));
        assert_eq!(parse_millidegrees("-1235"), Some(-1.24));
        assert_eq!(parse_millidegrees(""), None);
        assert_eq!(parse_millidegrees("warm"), None);
        assert_eq!(parse_millidegrees("45.5"), None);
    }

    #[tokio::test]
    async fn test_reads_sensor_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "45000").unwrap();

        let mut sensor = SysfsTemperature::new(file.path());
        assert_eq!(sensor.read().await.unwrap(), 45.0);
    }

    #[tokio::test]
    async fn test_missing_sensor_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut sensor = SysfsTemperature::new(dir.path().join("temp"));

        assert!(matches!(sensor.read().await, Err(SensorError::Read { .. })));
    }

    #[tokio::test]
    async fn test_garbage_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not a number").unwrap();

        let mut sensor = SysfsTemperature::new(file.path());
        match sensor.read().await {
            Err(SensorError::Parse { contents, .. }) => assert_eq!(contents, "not a number"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
