use crate::state::DeviceState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyPhase {
    Idle,
    HeatingTracked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyAction {
    ForceOff { elapsed_ms: u64 },
}

/// Auto-shutoff after a configured heating duration.
///
/// The session clock starts at the first tick that observes the unit powered
/// on. It is only cleared by [`SafetyPolicy::complete_forced_off`]; a power-off
/// made on the unit itself leaves it running, so a later session inherits the
/// earlier start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyPolicy {
    disable_after_ms: Option<u64>,
}

impl SafetyPolicy {
    pub fn new(disable_after_seconds: Option<u64>) -> Self {
        Self {
            disable_after_ms: disable_after_seconds.map(|secs| secs.saturating_mul(1_000)),
        }
    }

    pub fn phase(state: &DeviceState) -> SafetyPhase {
        match state.heating_since_ms {
            Some(_) => SafetyPhase::HeatingTracked,
            None => SafetyPhase::Idle,
        }
    }

    pub fn tick(&self, state: &mut DeviceState, now_ms: u64) -> Option<SafetyAction> {
        let limit_ms = self.disable_after_ms?;

        let Some(since) = state.heating_since_ms else {
            if state.power_on() {
                state.heating_since_ms = Some(now_ms);
            }
            return None;
        };

        let elapsed_ms = now_ms.saturating_sub(since);
        if elapsed_ms < limit_ms {
            return None;
        }

        Some(SafetyAction::ForceOff { elapsed_ms })
    }

    /// Call once the forced power-off write has been accepted.
    pub fn complete_forced_off(&self, state: &mut DeviceState) {
        state.heating_since_ms = None;
    }

    pub fn remaining_ms(&self, state: &DeviceState, now_ms: u64) -> Option<u64> {
        let limit_ms = self.disable_after_ms?;
        let since = state.heating_since_ms?;
        Some(limit_ms.saturating_sub(now_ms.saturating_sub(since)))
    }
}
