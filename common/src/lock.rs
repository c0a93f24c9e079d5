use crate::types::LockState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTransition {
    pub state: LockState,
    /// Generation a relock timer must present, set only after an unlock.
    pub relock: Option<u64>,
}

/// Door lock flag plus a generation counter. Every toggle bumps the
/// generation, so a relock timer armed by an earlier unlock can no longer
/// match and becomes a no-op.
#[derive(Debug, Clone)]
pub struct LockMachine {
    state: LockState,
    generation: u64,
}

impl Default for LockMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl LockMachine {
    pub fn new() -> Self {
        Self {
            state: LockState::Locked,
            generation: 0,
        }
    }

    pub fn state(&self) -> LockState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn toggle(&mut self) -> LockTransition {
        self.generation = self.generation.wrapping_add(1);
        self.state = match self.state {
            LockState::Locked => LockState::Unlocked,
            LockState::Unlocked => LockState::Locked,
        };

        LockTransition {
            state: self.state,
            relock: (self.state == LockState::Unlocked).then_some(self.generation),
        }
    }

    /// Returns true when the door was relocked by this call.
    pub fn relock(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.state != LockState::Unlocked {
            return false;
        }
        self.generation = self.generation.wrapping_add(1);
        self.state = LockState::Locked;
        true
    }
}
