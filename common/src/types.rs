use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClimateMode {
    Heating,
    Cooling,
}

impl ClimateMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heating => "HEATING",
            Self::Cooling => "COOLING",
        }
    }
}

/// Logical state of a door/window contact. Pull-up wiring reads `0` when the
/// reed switch is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContactState {
    Closed,
    Open,
}

impl ContactState {
    pub fn from_level(level: u8) -> Self {
        if level == 0 {
            Self::Closed
        } else {
            Self::Open
        }
    }

    pub fn is_open(self) -> bool {
        self == Self::Open
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SecurityState {
    Disarmed,
    Armed,
    Alarming,
}

impl SecurityState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disarmed => "DISARMED",
            Self::Armed => "ARMED",
            Self::Alarming => "ALARMING",
        }
    }

    /// Armed or alarming: the monitor loop is expected to be live.
    pub fn is_armed(self) -> bool {
        matches!(self, Self::Armed | Self::Alarming)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LockState {
    Locked,
    Unlocked,
}

impl LockState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Locked => "LOCKED",
            Self::Unlocked => "UNLOCKED",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RoomStatus {
    pub room: String,
    #[serde(rename = "currentTemp")]
    pub current_temp: Option<f32>,
    #[serde(rename = "heatingTarget")]
    pub heating_target: f32,
    #[serde(rename = "coolingTarget")]
    pub cooling_target: Option<f32>,
    #[serde(rename = "heatingOn")]
    pub heating_on: bool,
    #[serde(rename = "coolingOn")]
    pub cooling_on: Option<bool>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ZoneStatus {
    pub zone: String,
    pub contact: ContactState,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SecurityStatus {
    pub state: SecurityState,
    #[serde(rename = "sirenOn")]
    pub siren_on: bool,
    #[serde(rename = "changedAtEpoch")]
    pub changed_at_epoch: i64,
    pub zones: Vec<ZoneStatus>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LockStatus {
    pub state: LockState,
    #[serde(rename = "relockInMs")]
    pub relock_in_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LightStatus {
    pub name: String,
    pub on: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteStatus {
    pub rooms: Vec<RoomStatus>,
    pub security: SecurityStatus,
    pub lock: LockStatus,
    pub lights: Vec<LightStatus>,
}
