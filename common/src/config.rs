use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, thermostat::validate_targets};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    pub tick_ms: u64,
    pub deadband_c: f32,
    pub monitor_poll_ms: u64,
    pub siren_on_ms: u64,
    pub siren_off_ms: u64,
    pub relock_ms: u64,
    pub sensor_timeout_ms: u64,
    pub min_target_c: f32,
    pub max_target_c: f32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1_000,
            deadband_c: 0.5,
            monitor_poll_ms: 1_000,
            siren_on_ms: 500,
            siren_off_ms: 500,
            relock_ms: 15_000,
            sensor_timeout_ms: 2_000,
            min_target_c: 5.0,
            max_target_c: 35.0,
        }
    }
}

impl ControlConfig {
    pub fn sanitize(&mut self) {
        self.tick_ms = self.tick_ms.clamp(100, 60_000);
        self.monitor_poll_ms = self.monitor_poll_ms.clamp(100, 10_000);
        self.siren_on_ms = self.siren_on_ms.clamp(50, 5_000);
        self.siren_off_ms = self.siren_off_ms.clamp(50, 5_000);
        self.relock_ms = self.relock_ms.clamp(1_000, 600_000);
        // A DS18B20 conversion alone takes 750 ms at 12-bit resolution.
        self.sensor_timeout_ms = self.sensor_timeout_ms.clamp(1_000, 30_000);
        if !self.deadband_c.is_finite() || self.deadband_c < 0.0 {
            self.deadband_c = 0.5;
        }
        self.deadband_c = self.deadband_c.min(5.0);
    }

    pub fn target_in_range(&self, value: f32) -> bool {
        value.is_finite() && (self.min_target_c..=self.max_target_c).contains(&value)
    }
}

/// Cooling hardware for a room: the compressor output plus an optional
/// indicator lamp driven alongside it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoolingConfig {
    pub pin: u32,
    #[serde(default)]
    pub indicator_pin: Option<u32>,
    pub target_c: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomConfig {
    pub name: String,
    pub sensor: String,
    pub heating_pin: u32,
    pub heating_target_c: f32,
    #[serde(default)]
    pub cooling: Option<CoolingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ZoneConfig {
    pub name: String,
    pub pin: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LightConfig {
    pub name: String,
    pub pin: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub control: ControlConfig,
    pub rooms: Vec<RoomConfig>,
    pub zones: Vec<ZoneConfig>,
    pub siren_pin: u32,
    pub lock_pin: u32,
    #[serde(default)]
    pub lights: Vec<LightConfig>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        let room = |name: &str, sensor: &str, heating_pin: u32, cooling: Option<(u32, u32)>| {
            RoomConfig {
                name: name.to_string(),
                sensor: sensor.to_string(),
                heating_pin,
                heating_target_c: 20.0,
                cooling: cooling.map(|(pin, indicator)| CoolingConfig {
                    pin,
                    indicator_pin: Some(indicator),
                    target_c: 24.0,
                }),
            }
        };
        let zone = |name: &str, pin: u32| ZoneConfig {
            name: name.to_string(),
            pin,
        };
        let light = |name: &str, pin: u32| LightConfig {
            name: name.to_string(),
            pin,
        };

        Self {
            control: ControlConfig::default(),
            rooms: vec![
                room("living-room", "28-00000012d3ab", 7, Some((10, 25))),
                room("bedroom", "28-0b239a7f8c8a", 0, Some((24, 9))),
                room("bathroom", "28-0b239ac450f4", 1, None),
                room("office", "28-0b235770ad6e", 8, None),
                room("kids-room", "28-000000123315", 5, None),
            ],
            zones: vec![
                zone("kitchen-1", 23),
                zone("kitchen-2", 27),
                zone("bathroom", 18),
                zone("bedroom", 22),
                zone("office", 15),
                zone("kids-room", 17),
            ],
            siren_pin: 14,
            lock_pin: 11,
            lights: vec![
                light("living-room", 20),
                light("kitchen", 16),
                light("entry", 6),
                light("bathroom", 12),
                light("bedroom", 26),
                light("office", 13),
                light("kids-room", 21),
                light("vestibule", 19),
            ],
        }
    }
}

impl SiteConfig {
    /// Parse, sanitize and validate a site description.
    pub fn from_json_slice(raw: &[u8]) -> Result<Self, ConfigError> {
        let mut config: SiteConfig = serde_json::from_slice(raw)?;
        config.control.sanitize();
        config.validate()?;
        Ok(config)
    }

    pub fn room(&self, name: &str) -> Option<&RoomConfig> {
        self.rooms.iter().find(|room| room.name == name)
    }

    /// Every actuator pin the controller drives, in a stable order.
    pub fn output_pins(&self) -> Vec<u32> {
        let mut pins = Vec::new();
        for room in &self.rooms {
            pins.push(room.heating_pin);
            if let Some(cooling) = &room.cooling {
                pins.push(cooling.pin);
                pins.extend(cooling.indicator_pin);
            }
        }
        pins.push(self.siren_pin);
        pins.push(self.lock_pin);
        pins.extend(self.lights.iter().map(|light| light.pin));
        pins
    }

    pub fn input_pins(&self) -> Vec<u32> {
        self.zones.iter().map(|zone| zone.pin).collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control.tick_ms == 0 || self.control.monitor_poll_ms == 0 {
            return Err(ConfigError::Control("tick durations must be non-zero"));
        }

        unique_names("room", self.rooms.iter().map(|room| room.name.as_str()))?;
        unique_names("zone", self.zones.iter().map(|zone| zone.name.as_str()))?;
        unique_names("light", self.lights.iter().map(|light| light.name.as_str()))?;

        let mut seen = HashSet::new();
        for pin in self.output_pins().into_iter().chain(self.input_pins()) {
            if !seen.insert(pin) {
                return Err(ConfigError::DuplicatePin(pin));
            }
        }

        for room in &self.rooms {
            let room_error = |reason: String| ConfigError::Room {
                room: room.name.clone(),
                reason,
            };
            if room.sensor.trim().is_empty() {
                return Err(room_error("sensor address is empty".to_string()));
            }
            if !self.control.target_in_range(room.heating_target_c) {
                return Err(room_error(format!(
                    "heating target {} is out of range",
                    room.heating_target_c
                )));
            }
            if let Some(cooling) = &room.cooling {
                if !self.control.target_in_range(cooling.target_c) {
                    return Err(room_error(format!(
                        "cooling target {} is out of range",
                        cooling.target_c
                    )));
                }
                if !validate_targets(room.heating_target_c, cooling.target_c) {
                    return Err(room_error(format!(
                        "heating target {} must be below cooling target {}",
                        room.heating_target_c, cooling.target_c
                    )));
                }
            }
        }

        Ok(())
    }
}

fn unique_names<'a>(
    kind: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateName {
                kind,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_site_is_valid() {
        let config = SiteConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rooms.len(), 5);
        assert_eq!(config.zones.len(), 6);
        assert_eq!(
            config.room("bedroom").and_then(|room| room.cooling.clone()),
            Some(CoolingConfig {
                pin: 24,
                indicator_pin: Some(9),
                target_c: 24.0,
            })
        );
    }

    #[test]
    fn output_pins_cover_every_actuator() {
        let config = SiteConfig::default();
        let pins = config.output_pins();

        assert!(pins.contains(&config.siren_pin));
        assert!(pins.contains(&config.lock_pin));
        assert!(pins.contains(&25));
        assert_eq!(pins.len(), 5 + 2 * 2 + 2 + 8);
    }

    #[test]
    fn rejects_pin_shared_between_input_and_output() {
        let mut config = SiteConfig::default();
        config.zones[0].pin = config.siren_pin;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicatePin(14))
        ));
    }

    #[test]
    fn rejects_inverted_initial_targets() {
        let mut config = SiteConfig::default();
        config.rooms[0].heating_target_c = 24.0;

        assert!(matches!(config.validate(), Err(ConfigError::Room { .. })));
    }

    #[test]
    fn rejects_duplicate_zone_names() {
        let mut config = SiteConfig::default();
        config.zones[1].name = config.zones[0].name.clone();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateName { kind: "zone", .. })
        ));
    }

    #[test]
    fn parses_minimal_json_with_default_control() {
        let raw = br#"{
            "rooms": [
                {"name": "hall", "sensor": "28-abc", "heating_pin": 3, "heating_target_c": 19.0}
            ],
            "zones": [{"name": "front", "pin": 4}],
            "siren_pin": 5,
            "lock_pin": 6
        }"#;

        let config = SiteConfig::from_json_slice(raw).unwrap();
        assert_eq!(config.control.tick_ms, 1_000);
        assert_eq!(config.control.relock_ms, 15_000);
        assert!(config.lights.is_empty());
        assert_eq!(config.output_pins(), vec![3, 5, 6]);
    }

    #[test]
    fn default_sensor_timeout_outlasts_a_conversion() {
        let control = ControlConfig::default();
        assert!(control.sensor_timeout_ms > 750);
    }

    #[test]
    fn sanitize_bounds_sensor_timeout_independently_of_tick() {
        let mut control = ControlConfig {
            tick_ms: 500,
            sensor_timeout_ms: 5_000,
            deadband_c: f32::NAN,
            ..ControlConfig::default()
        };
        control.sanitize();

        assert_eq!(control.sensor_timeout_ms, 5_000);
        assert_eq!(control.deadband_c, 0.5);

        control.sensor_timeout_ms = 200;
        control.sanitize();
        assert_eq!(control.sensor_timeout_ms, 1_000);
    }
}
