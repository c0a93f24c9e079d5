pub mod config;
pub mod error;
pub mod lock;
pub mod security;
pub mod thermostat;
pub mod types;
pub mod w1;

pub use config::{ControlConfig, CoolingConfig, LightConfig, RoomConfig, SiteConfig, ZoneConfig};
pub use error::{ActuatorError, ConfigError, ControlError, InvalidCommand, SensorReadError};
pub use lock::{LockMachine, LockTransition};
pub use security::{ArmOutcome, SecurityMachine};
pub use thermostat::{decide, validate_targets, OutputCommand};
pub use types::{
    ClimateMode, ContactState, LightStatus, LockState, LockStatus, RoomStatus, SecurityState,
    SecurityStatus, SiteStatus, ZoneStatus,
};
pub use w1::parse_w1_payload;
