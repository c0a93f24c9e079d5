use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use homectl_common::{
    ArmOutcome, ClimateMode, ControlError, InvalidCommand, LightStatus, LockState, LockStatus,
    RoomStatus, SecurityStatus, SensorReadError, SiteConfig, SiteStatus,
};

use crate::{
    alarm::IntrusionMonitor,
    climate::{self, ThermostatLoop},
    door::AccessLock,
    hardware::{ActuatorDriver, SensorReader},
    store::ConfigStore,
};

/// The running controller for one site: owns every actuator, the periodic
/// loops, and the command surface used by the operator front end.
pub struct Site {
    config: SiteConfig,
    store: Arc<ConfigStore>,
    sensors: Arc<dyn SensorReader>,
    actuators: Arc<dyn ActuatorDriver>,
    alarm: Arc<IntrusionMonitor>,
    door: Arc<AccessLock>,
    shutdown: CancellationToken,
    loops: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

impl Site {
    /// Drives every output to its safe default, then starts the heating and
    /// cooling loops. Must be called inside a tokio runtime.
    pub fn start(
        config: SiteConfig,
        sensors: Arc<dyn SensorReader>,
        actuators: Arc<dyn ActuatorDriver>,
    ) -> Arc<Self> {
        for pin in config.output_pins() {
            if let Err(err) = actuators.set_output(pin, false) {
                warn!("failed to reset output {pin}: {err}");
            }
        }

        let store = Arc::new(ConfigStore::new(&config));
        let alarm = Arc::new(IntrusionMonitor::new(
            &config,
            sensors.clone(),
            actuators.clone(),
        ));
        let door = Arc::new(AccessLock::new(&config, actuators.clone()));
        let shutdown = CancellationToken::new();

        let loops = [ClimateMode::Heating, ClimateMode::Cooling]
            .into_iter()
            .map(|mode| {
                ThermostatLoop::new(
                    mode,
                    &config,
                    store.clone(),
                    sensors.clone(),
                    actuators.clone(),
                )
                .spawn(shutdown.child_token())
            })
            .collect();

        info!(
            "site started: {} room(s), {} zone(s), {} light(s)",
            config.rooms.len(),
            config.zones.len(),
            config.lights.len()
        );

        Arc::new(Self {
            config,
            store,
            sensors,
            actuators,
            alarm,
            door,
            shutdown,
            loops: parking_lot::Mutex::new(loops),
        })
    }

    #[cfg(test)]
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Unknown rooms are an error; an unreadable sensor is a normal result.
    pub async fn temperature(
        &self,
        room: &str,
    ) -> Result<Result<f32, SensorReadError>, ControlError> {
        let room = self
            .config
            .room(room)
            .ok_or_else(|| InvalidCommand::UnknownRoom(room.to_string()))?;
        Ok(climate::read_temperature(&self.sensors, &room.sensor, self.sensor_timeout()).await)
    }

    pub fn set_heating_target(&self, room: &str, degrees: f32) -> Result<(), ControlError> {
        self.store.set_heating_target(room, degrees)?;
        info!("{room} heating target -> {degrees}");
        Ok(())
    }

    pub fn set_cooling_target(&self, room: &str, degrees: f32) -> Result<(), ControlError> {
        self.store.set_cooling_target(room, degrees)?;
        info!("{room} cooling target -> {degrees}");
        Ok(())
    }

    pub fn output_state(&self, pin: u32) -> Result<bool, ControlError> {
        if !self.config.output_pins().contains(&pin) {
            return Err(InvalidCommand::UnknownPin(pin).into());
        }
        Ok(self.actuators.get_output(pin))
    }

    pub async fn request_arm(&self) -> Result<ArmOutcome, ControlError> {
        self.alarm.arm().await
    }

    pub fn request_disarm(&self) {
        self.alarm.disarm();
    }

    #[cfg(test)]
    pub fn security_state(&self) -> homectl_common::SecurityState {
        self.alarm.state()
    }

    pub async fn security_status(&self) -> SecurityStatus {
        self.alarm.status().await
    }

    pub fn request_lock_toggle(&self) -> LockState {
        self.door.toggle()
    }

    #[cfg(test)]
    pub fn lock_state(&self) -> LockState {
        self.door.state()
    }

    pub fn lock_status(&self) -> LockStatus {
        self.door.status()
    }

    pub fn set_light(&self, name: &str, on: bool) -> Result<(), ControlError> {
        let light = self
            .config
            .lights
            .iter()
            .find(|light| light.name == name)
            .ok_or_else(|| InvalidCommand::UnknownLight(name.to_string()))?;

        self.actuators.set_output(light.pin, on).map_err(|err| {
            warn!("light {name}: {err}");
            ControlError::from(err)
        })
    }

    pub fn lights(&self) -> Vec<LightStatus> {
        self.config
            .lights
            .iter()
            .map(|light| LightStatus {
                name: light.name.clone(),
                on: self.actuators.get_output(light.pin),
            })
            .collect()
    }

    pub async fn rooms(&self) -> Vec<RoomStatus> {
        let readings = climate::read_temperatures(
            &self.sensors,
            self.config.rooms.iter().map(|room| room.sensor.as_str()),
            self.sensor_timeout(),
        )
        .await;

        let mut rooms = Vec::with_capacity(self.config.rooms.len());
        for (room, reading) in self.config.rooms.iter().zip(readings) {
            let current_temp = reading.ok();
            rooms.push(RoomStatus {
                room: room.name.clone(),
                current_temp,
                heating_target: self
                    .store
                    .heating_target(&room.name)
                    .unwrap_or(room.heating_target_c),
                cooling_target: self.store.cooling_target(&room.name),
                heating_on: self.actuators.get_output(room.heating_pin),
                cooling_on: room
                    .cooling
                    .as_ref()
                    .map(|cooling| self.actuators.get_output(cooling.pin)),
            });
        }
        rooms
    }

    pub async fn status(&self) -> SiteStatus {
        SiteStatus {
            rooms: self.rooms().await,
            security: self.security_status().await,
            lock: self.lock_status(),
            lights: self.lights(),
        }
    }

    /// Stops every loop and timer, then returns all outputs to their safe
    /// default.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let loops = std::mem::take(&mut *self.loops.lock());
        for handle in loops {
            let _ = handle.await;
        }

        self.alarm.stop().await;
        self.door.shutdown();

        for pin in self.config.output_pins() {
            if let Err(err) = self.actuators.set_output(pin, false) {
                warn!("failed to reset output {pin}: {err}");
            }
        }
        info!("site stopped, outputs reset");
    }

    fn sensor_timeout(&self) -> Duration {
        Duration::from_millis(self.config.control.sensor_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use homectl_common::{ContactState, SecurityState};

    use super::*;
    use crate::hardware::SimulatedHardware;

    fn site() -> (Arc<Site>, Arc<SimulatedHardware>) {
        let hardware = Arc::new(SimulatedHardware::new());
        let site = Site::start(SiteConfig::default(), hardware.clone(), hardware.clone());
        (site, hardware)
    }

    #[tokio::test(start_paused = true)]
    async fn start_resets_every_output_once_before_loops() {
        let (site, hardware) = site();

        let writes = hardware.writes();
        let pins = site.config().output_pins();
        assert_eq!(writes.len(), pins.len());
        assert!(writes.iter().all(|(_, level)| !level));
        for pin in pins {
            assert!(writes.contains(&(pin, false)), "pin {pin}");
        }

        site.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn temperature_reports_rounded_reading_or_unavailable() {
        let (site, hardware) = site();
        hardware.set_temperature("28-0b235770ad6e", 21.4);

        assert_eq!(site.temperature("office").await.unwrap().unwrap(), 21.4);
        assert!(site.temperature("bathroom").await.unwrap().is_err());
        assert_eq!(
            site.temperature("garage").await.unwrap_err(),
            InvalidCommand::UnknownRoom("garage".to_string()).into()
        );

        site.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn output_state_rejects_unknown_pin() {
        let (site, _hardware) = site();

        assert_eq!(site.output_state(14), Ok(false));
        assert_eq!(
            site.output_state(99),
            Err(InvalidCommand::UnknownPin(99).into())
        );

        site.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn heating_loop_runs_on_start() {
        let (site, hardware) = site();
        let room = site.config().room("living-room").unwrap().clone();
        hardware.set_temperature(&room.sensor, 26.0);

        tokio::time::sleep(Duration::from_millis(1_100)).await;

        assert_eq!(site.output_state(room.heating_pin), Ok(false));
        let cooling = room.cooling.unwrap();
        assert_eq!(site.output_state(cooling.pin), Ok(true));
        assert_eq!(site.output_state(cooling.indicator_pin.unwrap()), Ok(true));

        site.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn lights_switch_by_name() {
        let (site, _hardware) = site();

        site.set_light("kitchen", true).unwrap();
        let kitchen = site
            .lights()
            .into_iter()
            .find(|light| light.name == "kitchen")
            .unwrap();
        assert!(kitchen.on);

        assert_eq!(
            site.set_light("garage", true),
            Err(InvalidCommand::UnknownLight("garage".to_string()).into())
        );

        site.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_light_write_is_reported() {
        let (site, hardware) = site();
        hardware.fail_output(16);

        assert_eq!(
            site.set_light("kitchen", true),
            Err(ControlError::ActuatorFailed {
                pin: 16,
                reason: "simulated output fault".to_string(),
            })
        );
        assert!(site.lights().iter().all(|light| !light.on));

        site.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn status_aggregates_every_component() {
        let (site, hardware) = site();
        hardware.set_temperature("28-00000012d3ab", 22.0);
        hardware.set_contact(site.config().zones[0].pin, ContactState::Open);

        site.request_lock_toggle();
        let status = site.status().await;

        assert_eq!(status.rooms.len(), 5);
        assert_eq!(status.rooms[0].current_temp, Some(22.0));
        assert_eq!(status.rooms[0].cooling_target, Some(24.0));
        assert_eq!(status.rooms[2].cooling_on, None);
        assert_eq!(status.security.state, SecurityState::Disarmed);
        assert_eq!(status.security.zones[0].contact, ContactState::Open);
        assert_eq!(status.lock.state, LockState::Unlocked);
        assert_eq!(status.lights.len(), 8);

        site.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_returns_outputs_to_safe_state() {
        let (site, hardware) = site();
        site.set_light("office", true).unwrap();
        site.request_lock_toggle();
        site.request_arm().await.unwrap();
        hardware.set_contact(site.config().zones[0].pin, ContactState::Open);
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(site.security_state(), SecurityState::Alarming);

        site.shutdown().await;

        for pin in site.config().output_pins() {
            assert!(!hardware.get_output(pin), "pin {pin}");
        }
        assert_eq!(site.lock_state(), LockState::Locked);
    }
}
