use std::{io, path::PathBuf};

use thiserror::Error;

/// A temperature or contact read that produced no usable value. Callers treat
/// this as "unknown this cycle", never as a fatal condition.
#[derive(Debug, Error)]
pub enum SensorReadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed sensor payload: {0}")]
    Malformed(String),
    #[error("sensor read timed out")]
    Timeout,
    #[error("unknown sensor '{0}'")]
    UnknownSensor(String),
}

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("pin {0} is not a configured output")]
    UnknownPin(u32),
    #[error("failed to drive pin {pin}: {source}")]
    Io {
        pin: u32,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidCommand {
    #[error("unknown room '{0}'")]
    UnknownRoom(String),
    #[error("room '{0}' has no cooling output")]
    NoCooling(String),
    #[error("pin {0} is not a known output")]
    UnknownPin(u32),
    #[error("unknown light '{0}'")]
    UnknownLight(String),
    #[error("target {value} is outside {min}..={max}")]
    TargetOutOfRange { value: f32, min: f32, max: f32 },
}

/// Errors surfaced synchronously to the operator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControlError {
    #[error(
        "heating target {heating} must stay below cooling target {cooling} in '{room}'"
    )]
    ConfigurationConflict {
        room: String,
        heating: f32,
        cooling: f32,
    },
    #[error("cannot arm, open zones: {}", .open_zones.join(", "))]
    SecurityPreconditionFailed { open_zones: Vec<String> },
    #[error(transparent)]
    InvalidCommand(#[from] InvalidCommand),
    #[error("output {pin} could not be driven: {reason}")]
    ActuatorFailed { pin: u32, reason: String },
}

impl From<ActuatorError> for ControlError {
    fn from(err: ActuatorError) -> Self {
        match err {
            ActuatorError::UnknownPin(pin) => InvalidCommand::UnknownPin(pin).into(),
            ActuatorError::Io { pin, source } => Self::ActuatorFailed {
                pin,
                reason: source.to_string(),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid site config json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },
    #[error("pin {0} is assigned more than once")]
    DuplicatePin(u32),
    #[error("room '{room}': {reason}")]
    Room { room: String, reason: String },
    #[error("{0}")]
    Control(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actuator_faults_reach_the_operator() {
        assert_eq!(
            ControlError::from(ActuatorError::UnknownPin(3)),
            ControlError::InvalidCommand(InvalidCommand::UnknownPin(3))
        );

        let err = ControlError::from(ActuatorError::Io {
            pin: 16,
            source: io::Error::other("gpio busy"),
        });
        assert_eq!(
            err,
            ControlError::ActuatorFailed {
                pin: 16,
                reason: "gpio busy".to_string(),
            }
        );
    }
}
