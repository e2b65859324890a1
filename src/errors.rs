//! Error types for the fan controller

use crate::gpio::driver::Status;
use crate::gpio::LineMode;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the fan controller
pub type Result<T> = std::result::Result<T, Error>;

/// Chip or line acquisition/release failed
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("GPIO chip {chip} not opened: {status}")]
    ChipOpen { chip: u32, status: Status },

    #[error("GPIO chip {chip} not closed: {status}")]
    ChipClose { chip: u32, status: Status },

    #[error("GPIO {mode} not claimed: line {line}: {status}")]
    Claim {
        line: u32,
        mode: LineMode,
        status: Status,
    },

    #[error("GPIO {mode} not freed: line {line}: {status}")]
    Free {
        line: u32,
        mode: LineMode,
        status: Status,
    },

    #[error("GPIO callback not registered: line {line}: {status}")]
    Callback { line: u32, status: Status },

    #[error("GPIO callback not cancelled: line {line}: {status}")]
    CallbackCancel { line: u32, status: Status },

    #[error("GPIO line {line} is claimed as {mode}, not as an alert")]
    NotAlert { line: u32, mode: LineMode },
}

/// Temperature sensor unreadable or unparsable
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("Temperature sensor {} unreadable: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Temperature sensor {} returned {contents:?}, expected millidegrees", .path.display())]
    Parse { path: PathBuf, contents: String },
}

/// Why a PWM write was refused
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmRejection {
    #[error("{0}")]
    Driver(Status),

    #[error("duty above 100%")]
    DutyOutOfRange,
}

/// PWM write rejected
#[derive(Error, Debug)]
#[error("GPIO unable to set PWM on line {line} ({frequency_hz} Hz, {duty_percent}%): {cause}")]
pub struct ActuatorError {
    pub line: u32,
    pub frequency_hz: u32,
    pub duty_percent: u8,
    pub cause: PwmRejection,
}

/// Invalid or unreadable configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid fan curve: {0}")]
    Curve(String),

    #[error("Invalid setting: {0}")]
    Setting(String),
}

/// Main error type for the fan controller
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Sensor(#[from] SensorError),

    #[error(transparent)]
    Actuator(#[from] ActuatorError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Cancellation was requested. `park` holds the failure of the final
    /// zero-duty write, if it failed.
    #[error("Cancelled{}", .park.as_ref().map(|e| format!(" (fan not parked: {e})")).unwrap_or_default())]
    Cancelled { park: Option<ActuatorError> },

    /// Releasing a resource failed while `primary` was already propagating.
    #[error("{primary}; release also failed: {release}")]
    Release {
        primary: Box<Error>,
        #[source]
        release: ResourceError,
    },
}

impl Error {
    /// Cancellation marker carrying no park failure
    pub fn cancelled() -> Self {
        Error::Cancelled { park: None }
    }

    /// True if the run ended because it was cancelled, even if cleanup failed.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled { .. } => true,
            Error::Release { primary, .. } => primary.is_cancelled(),
            _ => false,
        }
    }

    /// True if the run was cancelled and every cleanup step succeeded.
    pub fn is_clean_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled { park: None })
    }

    /// Process exit status for a run that ended with this outcome.
    pub fn exit_code(&self) -> u8 {
        match self {
            e if e.is_clean_cancellation() => 0,
            Error::Config(_) => 2,
            _ => 1,
        }
    }
}

/// Combine the outcome of a scope's body with the outcome of releasing its
/// resource. A release failure never hides a body failure.
pub fn settle<T>(
    body: Result<T>,
    release: std::result::Result<(), ResourceError>,
) -> Result<T> {
    match (body, release) {
        (body, Ok(())) => body,
        (Ok(_), Err(release)) => Err(Error::Resource(release)),
        (Err(primary), Err(release)) => Err(Error::Release {
            primary: Box::new(primary),
            release,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free_failure() -> ResourceError {
        ResourceError::Free {
            line: 13,
            mode: LineMode::Output,
            status: Status::NOT_CLAIMED,
        }
    }

    #[test]
    fn test_settle_passes_body_through_on_clean_release() {
        assert_eq!(settle(Ok(5), Ok(())).unwrap(), 5);
        assert!(settle::<()>(Err(Error::cancelled()), Ok(())).unwrap_err().is_clean_cancellation());
    }

    #[test]
    fn test_settle_surfaces_release_failure() {
        let err = settle(Ok(()), Err(free_failure())).unwrap_err();
        assert!(matches!(err, Error::Resource(ResourceError::Free { .. })));
    }

    #[test]
    fn test_release_failure_during_cancellation_is_still_a_cancellation() {
        let err = settle::<()>(Err(Error::cancelled()), Err(free_failure())).unwrap_err();
        assert!(err.is_cancelled());
        assert!(!err.is_clean_cancellation());
        assert_eq!(err.exit_code(), 1);
        assert_eq!(
            err.to_string(),
            "Cancelled; release also failed: GPIO output not freed: line 13: line not claimed (-10)"
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::cancelled().exit_code(), 0);
        let park = ActuatorError {
            line: 13,
            frequency_hz: 20,
            duty_percent: 0,
            cause: PwmRejection::Driver(Status::BAD_PWM),
        };
        assert_eq!(Error::Cancelled { park: Some(park) }.exit_code(), 1);
        assert_eq!(Error::Config(ConfigError::Curve("empty".into())).exit_code(), 2);
    }
}
