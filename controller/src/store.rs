use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};

use homectl_common::{validate_targets, ClimateMode, ControlError, InvalidCommand, SiteConfig};

/// Mutable per-room targets shared by the thermostat loops and operator
/// commands.
///
/// Each mode has its own map so the heating loop never waits on a cooling
/// update. Writers additionally serialise on `write_gate`, which makes the
/// heating < cooling check and the write a single step.
pub struct ConfigStore {
    heating: RwLock<HashMap<String, f32>>,
    cooling: RwLock<HashMap<String, f32>>,
    write_gate: Mutex<()>,
    min_target: f32,
    max_target: f32,
}

impl ConfigStore {
    pub fn new(site: &SiteConfig) -> Self {
        let heating = site
            .rooms
            .iter()
            .map(|room| (room.name.clone(), room.heating_target_c))
            .collect();
        let cooling = site
            .rooms
            .iter()
            .filter_map(|room| {
                room.cooling
                    .as_ref()
                    .map(|cooling| (room.name.clone(), cooling.target_c))
            })
            .collect();

        Self {
            heating: RwLock::new(heating),
            cooling: RwLock::new(cooling),
            write_gate: Mutex::new(()),
            min_target: site.control.min_target_c,
            max_target: site.control.max_target_c,
        }
    }

    pub fn target(&self, mode: ClimateMode, room: &str) -> Option<f32> {
        self.targets(mode).read().get(room).copied()
    }

    pub fn heating_target(&self, room: &str) -> Option<f32> {
        self.target(ClimateMode::Heating, room)
    }

    pub fn cooling_target(&self, room: &str) -> Option<f32> {
        self.target(ClimateMode::Cooling, room)
    }

    pub fn set_heating_target(&self, room: &str, value: f32) -> Result<(), ControlError> {
        self.set_target(ClimateMode::Heating, room, value)
    }

    pub fn set_cooling_target(&self, room: &str, value: f32) -> Result<(), ControlError> {
        self.set_target(ClimateMode::Cooling, room, value)
    }

    /// Rejects, never clamps: on any error the previous target stays in place.
    pub fn set_target(
        &self,
        mode: ClimateMode,
        room: &str,
        value: f32,
    ) -> Result<(), ControlError> {
        if !value.is_finite() || !(self.min_target..=self.max_target).contains(&value) {
            return Err(InvalidCommand::TargetOutOfRange {
                value,
                min: self.min_target,
                max: self.max_target,
            }
            .into());
        }

        let _gate = self.write_gate.lock();

        if !self.heating.read().contains_key(room) {
            return Err(InvalidCommand::UnknownRoom(room.to_string()).into());
        }

        let (heating, cooling) = match mode {
            ClimateMode::Heating => (value, self.cooling_target(room)),
            ClimateMode::Cooling => {
                if !self.cooling.read().contains_key(room) {
                    return Err(InvalidCommand::NoCooling(room.to_string()).into());
                }
                (
                    self.heating_target(room).unwrap_or(f32::NEG_INFINITY),
                    Some(value),
                )
            }
        };

        if let Some(cooling) = cooling {
            if !validate_targets(heating, cooling) {
                return Err(ControlError::ConfigurationConflict {
                    room: room.to_string(),
                    heating,
                    cooling,
                });
            }
        }

        self.targets(mode).write().insert(room.to_string(), value);
        Ok(())
    }

    fn targets(&self, mode: ClimateMode) -> &RwLock<HashMap<String, f32>> {
        match mode {
            ClimateMode::Heating => &self.heating,
            ClimateMode::Cooling => &self.cooling,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    fn store() -> ConfigStore {
        ConfigStore::new(&SiteConfig::default())
    }

    #[test]
    fn starts_from_configured_targets() {
        let store = store();

        assert_eq!(store.heating_target("living-room"), Some(20.0));
        assert_eq!(store.cooling_target("living-room"), Some(24.0));
        assert_eq!(store.cooling_target("office"), None);
    }

    #[test]
    fn heating_at_or_above_cooling_is_rejected() {
        let store = store();

        let err = store.set_heating_target("bedroom", 24.0).unwrap_err();
        assert_eq!(
            err,
            ControlError::ConfigurationConflict {
                room: "bedroom".to_string(),
                heating: 24.0,
                cooling: 24.0,
            }
        );
        assert_eq!(store.heating_target("bedroom"), Some(20.0));

        assert!(store.set_heating_target("bedroom", 23.5).is_ok());
        assert_eq!(store.heating_target("bedroom"), Some(23.5));
    }

    #[test]
    fn cooling_at_or_below_heating_is_rejected() {
        let store = store();

        assert!(matches!(
            store.set_cooling_target("living-room", 20.0),
            Err(ControlError::ConfigurationConflict { .. })
        ));
        assert_eq!(store.cooling_target("living-room"), Some(24.0));

        assert!(store.set_cooling_target("living-room", 21.0).is_ok());
        assert_eq!(store.cooling_target("living-room"), Some(21.0));
    }

    #[test]
    fn heating_only_room_accepts_any_in_range_target() {
        let store = store();

        assert!(store.set_heating_target("office", 30.0).is_ok());
        assert_eq!(store.heating_target("office"), Some(30.0));
    }

    #[test]
    fn unknown_room_and_missing_cooling_are_invalid() {
        let store = store();

        assert_eq!(
            store.set_heating_target("garage", 18.0),
            Err(InvalidCommand::UnknownRoom("garage".to_string()).into())
        );
        assert_eq!(
            store.set_cooling_target("office", 26.0),
            Err(InvalidCommand::NoCooling("office".to_string()).into())
        );
    }

    #[test]
    fn out_of_range_targets_are_rejected_not_clamped() {
        let store = store();

        assert!(matches!(
            store.set_heating_target("office", 80.0),
            Err(ControlError::InvalidCommand(
                InvalidCommand::TargetOutOfRange { .. }
            ))
        ));
        assert!(store.set_heating_target("office", f32::NAN).is_err());
        assert_eq!(store.heating_target("office"), Some(20.0));
    }

    #[test]
    fn concurrent_writers_never_invert_targets() {
        let store = Arc::new(store());

        let heaters: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for step in 0..200 {
                        let _ = store.set_heating_target("bedroom", 18.0 + (step % 12) as f32);
                    }
                })
            })
            .collect();
        let coolers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for step in 0..200 {
                        let _ = store.set_cooling_target("bedroom", 19.0 + (step % 12) as f32);
                    }
                })
            })
            .collect();

        for handle in heaters.into_iter().chain(coolers) {
            handle.join().unwrap();
        }

        let heating = store.heating_target("bedroom").unwrap();
        let cooling = store.cooling_target("bedroom").unwrap();
        assert!(heating < cooling, "{heating} >= {cooling}");
    }
}
