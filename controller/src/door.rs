use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::{task::JoinHandle, time::Instant};
use tracing::{info, warn};

use homectl_common::{LockMachine, LockState, LockStatus, SiteConfig};

use crate::hardware::ActuatorDriver;

struct PendingRelock {
    deadline: Instant,
    handle: JoinHandle<()>,
}

struct Inner {
    machine: LockMachine,
    pending: Option<PendingRelock>,
}

/// Electronic door lock with a one-shot auto-relock after every unlock.
///
/// The flag, the solenoid and the pending timer only change together under
/// `inner`. A timer that lost the race to a newer toggle carries a stale
/// generation and does nothing when it finally runs.
pub struct AccessLock {
    pin: u32,
    relock_after: Duration,
    actuators: Arc<dyn ActuatorDriver>,
    inner: Mutex<Inner>,
}

impl AccessLock {
    pub fn new(site: &SiteConfig, actuators: Arc<dyn ActuatorDriver>) -> Self {
        Self {
            pin: site.lock_pin,
            relock_after: Duration::from_millis(site.control.relock_ms),
            actuators,
            inner: Mutex::new(Inner {
                machine: LockMachine::new(),
                pending: None,
            }),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> LockState {
        self.inner.lock().machine.state()
    }

    pub fn status(&self) -> LockStatus {
        let inner = self.inner.lock();
        LockStatus {
            state: inner.machine.state(),
            relock_in_ms: inner.pending.as_ref().map(|pending| {
                let remaining = pending.deadline.saturating_duration_since(Instant::now());
                u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX)
            }),
        }
    }

    /// Locked -> unlocked with a fresh relock deadline; unlocked -> locked with
    /// the pending deadline cancelled.
    pub fn toggle(self: &Arc<Self>) -> LockState {
        let mut inner = self.inner.lock();

        if let Some(pending) = inner.pending.take() {
            pending.handle.abort();
        }

        let transition = inner.machine.toggle();
        self.drive(transition.state);

        if let Some(generation) = transition.relock {
            let lock = Arc::clone(self);
            let delay = self.relock_after;
            let handle = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                lock.auto_relock(generation);
            });
            inner.pending = Some(PendingRelock {
                deadline: Instant::now() + delay,
                handle,
            });
            info!("door unlocked, relocking in {}s", delay.as_secs());
        } else {
            info!("door locked");
        }

        transition.state
    }

    /// Fires from the relock timer. A no-op unless `generation` is still the
    /// one handed out by the most recent unlock.
    pub fn auto_relock(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if !inner.machine.relock(generation) {
            return false;
        }
        inner.pending = None;
        self.drive(LockState::Locked);
        info!("door auto-relocked");
        true
    }

    /// Cancels any pending relock and leaves the door locked.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        if let Some(pending) = inner.pending.take() {
            pending.handle.abort();
        }
        let generation = inner.machine.generation();
        inner.machine.relock(generation);
        self.drive(LockState::Locked);
    }

    fn drive(&self, state: LockState) {
        // Energised solenoid releases the latch.
        let level = state == LockState::Unlocked;
        if let Err(err) = self.actuators.set_output(self.pin, level) {
            warn!("lock: {err}");
        }
    }
}
