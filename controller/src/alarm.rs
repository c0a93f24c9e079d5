use std::{sync::Arc, time::Duration};

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use homectl_common::{
    ArmOutcome, ContactState, ControlError, SecurityMachine, SecurityState, SecurityStatus,
    SiteConfig, ZoneConfig, ZoneStatus,
};

use crate::hardware::{ActuatorDriver, SensorReader};

#[derive(Debug, Clone, Copy)]
struct MonitorTiming {
    poll: Duration,
    siren_on: Duration,
    siren_off: Duration,
}

struct MonitorTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    machine: SecurityMachine,
    changed_at_epoch: i64,
    task: Option<MonitorTask>,
}

/// Intrusion alarm: the security state machine plus the single monitor task
/// that polls contacts while armed.
///
/// The siren is only ever switched on under the `inner` lock after checking
/// the run's cancellation token, and `disarm` cancels that token under the same
/// lock before silencing the siren. A disarm therefore can never be followed by
/// a stray siren pulse.
pub struct IntrusionMonitor {
    zones: Vec<ZoneConfig>,
    siren_pin: u32,
    timing: MonitorTiming,
    sensors: Arc<dyn SensorReader>,
    actuators: Arc<dyn ActuatorDriver>,
    inner: Mutex<Inner>,
}

impl IntrusionMonitor {
    pub fn new(
        site: &SiteConfig,
        sensors: Arc<dyn SensorReader>,
        actuators: Arc<dyn ActuatorDriver>,
    ) -> Self {
        Self {
            zones: site.zones.clone(),
            siren_pin: site.siren_pin,
            timing: MonitorTiming {
                poll: Duration::from_millis(site.control.monitor_poll_ms),
                siren_on: Duration::from_millis(site.control.siren_on_ms),
                siren_off: Duration::from_millis(site.control.siren_off_ms),
            },
            sensors,
            actuators,
            inner: Mutex::new(Inner {
                machine: SecurityMachine::new(),
                changed_at_epoch: Utc::now().timestamp(),
                task: None,
            }),
        }
    }

    pub fn state(&self) -> SecurityState {
        self.inner.lock().machine.state()
    }

    /// Current reading of every zone, taken on the blocking pool. An
    /// unreadable contact reports open.
    pub async fn zone_states(&self) -> Vec<ZoneStatus> {
        let sensors = Arc::clone(&self.sensors);
        let zones = self.zones.clone();
        let read = tokio::task::spawn_blocking(move || {
            zones
                .iter()
                .map(|zone| ZoneStatus {
                    zone: zone.name.clone(),
                    contact: read_contact(sensors.as_ref(), zone),
                })
                .collect::<Vec<_>>()
        });

        match read.await {
            Ok(states) => states,
            Err(err) => {
                warn!("contact read task failed, treating every zone as open: {err}");
                self.zones
                    .iter()
                    .map(|zone| ZoneStatus {
                        zone: zone.name.clone(),
                        contact: ContactState::Open,
                    })
                    .collect()
            }
        }
    }

    pub async fn status(&self) -> SecurityStatus {
        let zones = self.zone_states().await;
        let inner = self.inner.lock();
        SecurityStatus {
            state: inner.machine.state(),
            siren_on: self.actuators.get_output(self.siren_pin),
            changed_at_epoch: inner.changed_at_epoch,
            zones,
        }
    }

    /// Arms only with every contact closed. Re-arming while armed or alarming
    /// is a no-op and never starts a second monitor.
    pub async fn arm(self: &Arc<Self>) -> Result<ArmOutcome, ControlError> {
        if self.state().is_armed() {
            return Ok(ArmOutcome::AlreadyArmed);
        }

        let readings = self.zone_states().await;
        let mut inner = self.inner.lock();
        let outcome = inner.machine.arm(
            readings
                .iter()
                .map(|zone| (zone.zone.as_str(), zone.contact)),
        );

        match &outcome {
            Ok(ArmOutcome::Armed) => {
                inner.changed_at_epoch = Utc::now().timestamp();
                let cancel = CancellationToken::new();
                let handle = tokio::spawn(Arc::clone(self).monitor(cancel.clone()));
                inner.task = Some(MonitorTask { cancel, handle });
                info!("alarm armed, monitoring {} zone(s)", self.zones.len());
            }
            Ok(ArmOutcome::AlreadyArmed) => {}
            Err(err) => info!("arm rejected: {err}"),
        }

        outcome
    }

    /// Always succeeds. Stops the monitor and silences the siren before
    /// returning; calling it again is harmless.
    pub fn disarm(&self) {
        let mut inner = self.inner.lock();
        if inner.machine.disarm() {
            inner.changed_at_epoch = Utc::now().timestamp();
            info!("alarm disarmed");
        }
        // The monitor exits at its next cancellation check; the handle is
        // simply detached.
        if let Some(task) = inner.task.take() {
            task.cancel.cancel();
        }
        self.siren(false);
    }

    /// Cancels the monitor and waits for it to finish. Used on shutdown.
    pub async fn stop(&self) {
        let task = {
            let mut inner = self.inner.lock();
            let task = inner.task.take();
            if let Some(task) = &task {
                task.cancel.cancel();
            }
            self.siren(false);
            task
        };

        if let Some(task) = task {
            let _ = task.handle.await;
        }
    }

    #[cfg(test)]
    pub fn monitor_running(&self) -> bool {
        self.inner
            .lock()
            .task
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    async fn monitor(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                break;
            }

            let any_open = self
                .zone_states()
                .await
                .iter()
                .any(|zone| zone.contact.is_open());
            let pulse = {
                let mut inner = self.inner.lock();
                if cancel.is_cancelled() {
                    break;
                }
                if inner.machine.observe(any_open) == Some(SecurityState::Alarming) {
                    inner.changed_at_epoch = Utc::now().timestamp();
                    warn!("intrusion detected, alarm triggered");
                }
                let pulse = inner.machine.siren_should_pulse(any_open);
                if pulse {
                    self.siren(true);
                }
                pulse
            };

            if pulse {
                if sleep_or_cancel(&cancel, self.timing.siren_on).await {
                    break;
                }
                self.siren(false);
                if sleep_or_cancel(&cancel, self.timing.siren_off).await {
                    break;
                }
            } else if sleep_or_cancel(&cancel, self.timing.poll).await {
                break;
            }
        }
    }

    fn siren(&self, on: bool) {
        if let Err(err) = self.actuators.set_output(self.siren_pin, on) {
            warn!("siren: {err}");
        }
    }
}

fn read_contact(sensors: &dyn SensorReader, zone: &ZoneConfig) -> ContactState {
    sensors.read_contact(zone.pin).unwrap_or_else(|err| {
        warn!("zone {} unreadable, treating as open: {err}", zone.name);
        ContactState::Open
    })
}

/// Sleeps for `duration`; returns true if cancelled first.
async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}
