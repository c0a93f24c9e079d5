use crate::types::ClimateMode;

/// What a control cycle wants done with a room's actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCommand {
    On,
    Off,
    /// Inside the deadband: leave the actuator as last commanded.
    Hold,
}

impl OutputCommand {
    /// The output level to drive, or `None` when the actuator is left alone.
    pub fn level(self) -> Option<bool> {
        match self {
            Self::On => Some(true),
            Self::Off => Some(false),
            Self::Hold => None,
        }
    }
}

/// Bang-bang decision with a symmetric deadband around `target`.
///
/// Heating switches on strictly below `target - deadband` and off at or above
/// `target + deadband`. Cooling mirrors it: on strictly above
/// `target + deadband`, off at or below `target - deadband`. Anything in
/// between holds, so a reading that wanders inside the band never toggles the
/// output.
pub fn decide(mode: ClimateMode, current: f32, target: f32, deadband: f32) -> OutputCommand {
    let lower_bound = target - deadband;
    let upper_bound = target + deadband;

    match mode {
        ClimateMode::Heating => {
            if current < lower_bound {
                OutputCommand::On
            } else if current >= upper_bound {
                OutputCommand::Off
            } else {
                OutputCommand::Hold
            }
        }
        ClimateMode::Cooling => {
            if current > upper_bound {
                OutputCommand::On
            } else if current <= lower_bound {
                OutputCommand::Off
            } else {
                OutputCommand::Hold
            }
        }
    }
}

/// Heating must stay strictly below cooling for a room that has both.
pub fn validate_targets(heating: f32, cooling: f32) -> bool {
    heating < cooling
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heating_turns_on_below_band() {
        assert_eq!(
            decide(ClimateMode::Heating, 19.4, 20.0, 0.5),
            OutputCommand::On
        );
    }

    #[test]
    fn heating_turns_off_at_upper_edge() {
        assert_eq!(
            decide(ClimateMode::Heating, 20.5, 20.0, 0.5),
            OutputCommand::Off
        );
        assert_eq!(
            decide(ClimateMode::Heating, 23.0, 20.0, 0.5),
            OutputCommand::Off
        );
    }

    #[test]
    fn heating_holds_inside_band() {
        for current in [19.5, 19.8, 20.0, 20.4] {
            assert_eq!(
                decide(ClimateMode::Heating, current, 20.0, 0.5),
                OutputCommand::Hold,
                "current {current}"
            );
        }
    }

    #[test]
    fn cooling_mirrors_heating() {
        assert_eq!(
            decide(ClimateMode::Cooling, 24.6, 24.0, 0.5),
            OutputCommand::On
        );
        assert_eq!(
            decide(ClimateMode::Cooling, 24.5, 24.0, 0.5),
            OutputCommand::Hold
        );
        assert_eq!(
            decide(ClimateMode::Cooling, 23.5, 24.0, 0.5),
            OutputCommand::Off
        );
        assert_eq!(
            decide(ClimateMode::Cooling, 23.6, 24.0, 0.5),
            OutputCommand::Hold
        );
    }

    #[test]
    fn sequence_never_chatters_inside_band() {
        // Simulated actuator fed by successive decisions.
        let readings = [18.0, 19.6, 20.2, 19.7, 20.4, 20.5, 20.1, 19.5, 19.4];
        let expected = [true, true, true, true, true, false, false, false, true];

        let mut heater = false;
        for (reading, want) in readings.iter().zip(expected) {
            if let Some(level) = decide(ClimateMode::Heating, *reading, 20.0, 0.5).level() {
                heater = level;
            }
            assert_eq!(heater, want, "reading {reading}");
        }
    }

    #[test]
    fn target_ordering() {
        assert!(validate_targets(20.0, 24.0));
        assert!(!validate_targets(24.0, 24.0));
        assert!(!validate_targets(25.0, 24.0));
    }
}
