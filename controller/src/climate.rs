use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{Instant, Interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use homectl_common::{decide, ClimateMode, OutputCommand, SensorReadError, SiteConfig};

use crate::{
    hardware::{ActuatorDriver, SensorReader},
    store::ConfigStore,
};

/// One room as seen by a single climate mode.
#[derive(Debug, Clone)]
pub struct ClimateZone {
    pub room: String,
    pub sensor: String,
    pub output: u32,
    pub indicator: Option<u32>,
}

/// Periodic hysteresis controller for one mode. Holds no per-cycle state:
/// every tick recomputes from the live reading and the current target.
pub struct ThermostatLoop {
    mode: ClimateMode,
    zones: Vec<ClimateZone>,
    store: Arc<ConfigStore>,
    sensors: Arc<dyn SensorReader>,
    actuators: Arc<dyn ActuatorDriver>,
    tick: Duration,
    deadband: f32,
    sensor_timeout: Duration,
}

impl ThermostatLoop {
    pub fn new(
        mode: ClimateMode,
        site: &SiteConfig,
        store: Arc<ConfigStore>,
        sensors: Arc<dyn SensorReader>,
        actuators: Arc<dyn ActuatorDriver>,
    ) -> Self {
        let zones = site
            .rooms
            .iter()
            .filter_map(|room| match mode {
                ClimateMode::Heating => Some(ClimateZone {
                    room: room.name.clone(),
                    sensor: room.sensor.clone(),
                    output: room.heating_pin,
                    indicator: None,
                }),
                ClimateMode::Cooling => room.cooling.as_ref().map(|cooling| ClimateZone {
                    room: room.name.clone(),
                    sensor: room.sensor.clone(),
                    output: cooling.pin,
                    indicator: cooling.indicator_pin,
                }),
            })
            .collect();

        Self {
            mode,
            zones,
            store,
            sensors,
            actuators,
            tick: Duration::from_millis(site.control.tick_ms),
            deadband: site.control.deadband_c,
            sensor_timeout: Duration::from_millis(site.control.sensor_timeout_ms),
        }
    }

    #[cfg(test)]
    pub fn zones(&self) -> &[ClimateZone] {
        &self.zones
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "{} loop started for {} room(s)",
                self.mode.as_str(),
                self.zones.len()
            );
            let mut interval = cycle_interval(self.tick);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => self.run_cycle().await,
                }
            }

            info!("{} loop stopped", self.mode.as_str());
        })
    }

    /// Evaluates every room once. All reads start together and share one
    /// deadline; a failed or late read skips that room only.
    pub async fn run_cycle(&self) {
        let readings = read_temperatures(
            &self.sensors,
            self.zones.iter().map(|zone| zone.sensor.as_str()),
            self.sensor_timeout,
        )
        .await;

        for (zone, reading) in self.zones.iter().zip(readings) {
            let current = match reading {
                Ok(current) => current,
                Err(err) => {
                    warn!(
                        "{} skip {}: sensor {} unavailable: {err}",
                        self.mode.as_str(),
                        zone.room,
                        zone.sensor
                    );
                    continue;
                }
            };

            let Some(target) = self.store.target(self.mode, &zone.room) else {
                continue;
            };

            let command = decide(self.mode, current, target, self.deadband);
            self.apply(zone, command, current, target);
        }
    }

    fn apply(&self, zone: &ClimateZone, command: OutputCommand, current: f32, target: f32) {
        let Some(level) = command.level() else {
            return;
        };

        if self.actuators.get_output(zone.output) != level {
            debug!(
                "{} {} -> {} (current {current}, target {target})",
                self.mode.as_str(),
                zone.room,
                if level { "ON" } else { "OFF" }
            );
        }

        for pin in std::iter::once(zone.output).chain(zone.indicator) {
            if let Err(err) = self.actuators.set_output(pin, level) {
                warn!("{} {}: {err}", self.mode.as_str(), zone.room);
            }
        }
    }
}

/// Runs the blocking read off the async workers and bounds it, so one hung
/// device cannot stall the caller.
pub async fn read_temperature(
    sensors: &Arc<dyn SensorReader>,
    address: &str,
    timeout: Duration,
) -> Result<f32, SensorReadError> {
    finish_read(spawn_read(sensors, address), Instant::now() + timeout).await
}

/// Starts every read at once and gives them a single shared deadline.
/// Results come back in input order.
pub async fn read_temperatures<'a>(
    sensors: &Arc<dyn SensorReader>,
    addresses: impl IntoIterator<Item = &'a str>,
    timeout: Duration,
) -> Vec<Result<f32, SensorReadError>> {
    let deadline = Instant::now() + timeout;
    let reads: Vec<_> = addresses
        .into_iter()
        .map(|address| spawn_read(sensors, address))
        .collect();

    let mut readings = Vec::with_capacity(reads.len());
    for read in reads {
        readings.push(finish_read(read, deadline).await);
    }
    readings
}

fn spawn_read(
    sensors: &Arc<dyn SensorReader>,
    address: &str,
) -> JoinHandle<Result<f32, SensorReadError>> {
    let sensors = Arc::clone(sensors);
    let address = address.to_string();
    tokio::task::spawn_blocking(move || sensors.read_temperature(&address))
}

async fn finish_read(
    read: JoinHandle<Result<f32, SensorReadError>>,
    deadline: Instant,
) -> Result<f32, SensorReadError> {
    match tokio::time::timeout_at(deadline, read).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(SensorReadError::Malformed(format!(
            "sensor read panicked: {join_err}"
        ))),
        Err(_) => Err(SensorReadError::Timeout),
    }
}

/// A cycle that overruns its tick pushes the next one back instead of
/// queueing catch-up cycles.
fn cycle_interval(tick: Duration) -> Interval {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
