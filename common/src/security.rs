use crate::{
    error::ControlError,
    types::{ContactState, SecurityState},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    Armed,
    /// Already armed or alarming. Nothing changed and no second monitor is
    /// wanted.
    AlreadyArmed,
}

/// Disarmed -> Armed (all contacts closed) -> Alarming (any contact opens)
/// -> Disarmed (explicit disarm only).
///
/// Alarming is sticky: contacts closing again silence the siren but do not
/// return the machine to Armed.
#[derive(Debug, Clone)]
pub struct SecurityMachine {
    state: SecurityState,
}

impl Default for SecurityMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityMachine {
    pub fn new() -> Self {
        Self {
            state: SecurityState::Disarmed,
        }
    }

    pub fn state(&self) -> SecurityState {
        self.state
    }

    /// `zones` is every contact point with its current reading, in
    /// configuration order. All open zones are reported, not just the first.
    pub fn arm<'a, I>(&mut self, zones: I) -> Result<ArmOutcome, ControlError>
    where
        I: IntoIterator<Item = (&'a str, ContactState)>,
    {
        if self.state.is_armed() {
            return Ok(ArmOutcome::AlreadyArmed);
        }

        let open_zones: Vec<String> = zones
            .into_iter()
            .filter(|(_, contact)| contact.is_open())
            .map(|(zone, _)| zone.to_string())
            .collect();

        if !open_zones.is_empty() {
            return Err(ControlError::SecurityPreconditionFailed { open_zones });
        }

        self.state = SecurityState::Armed;
        Ok(ArmOutcome::Armed)
    }

    /// Always succeeds. Returns whether the state changed.
    pub fn disarm(&mut self) -> bool {
        let changed = self.state != SecurityState::Disarmed;
        self.state = SecurityState::Disarmed;
        changed
    }

    /// Feed one monitor poll. Returns the new state when a transition happened.
    pub fn observe(&mut self, any_open: bool) -> Option<SecurityState> {
        if self.state == SecurityState::Armed && any_open {
            self.state = SecurityState::Alarming;
            return Some(self.state);
        }
        None
    }

    pub fn siren_should_pulse(&self, any_open: bool) -> bool {
        self.state == SecurityState::Alarming && any_open
    }
}
