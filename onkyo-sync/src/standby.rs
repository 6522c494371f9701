//! Debounced standby
//!
//! Arming never cancels an earlier arm. Each arm carries a generation and
//! only the latest one may fire; whatever fires still re-checks playback and
//! power at fire time.

use std::time::Duration;

use crate::playback::{PlaybackStatus, PowerState};
use crate::timers::{TimerEvent, TimerQueue};

/// One armed standby check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandbyArm {
    pub generation: u64,
    pub delay: Duration,
}

#[derive(Debug, Default)]
pub struct StandbyTimer {
    generation: u64,
}

impl StandbyTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a standby check after `delay`
    pub fn arm(&mut self, delay: Duration, timers: &mut TimerQueue) -> StandbyArm {
        self.generation += 1;
        let arm = StandbyArm {
            generation: self.generation,
            delay,
        };
        timers.schedule(delay, TimerEvent::Standby(arm.clone()));
        tracing::debug!("Standby armed in {:?} (generation {})", delay, arm.generation);
        arm
    }

    /// Whether `arm` should put the receiver in standby given the state now
    pub fn should_fire(&self, arm: &StandbyArm, status: PlaybackStatus, power: PowerState) -> bool {
        if arm.generation != self.generation {
            tracing::debug!(
                "Ignoring stale standby (generation {}, latest {})",
                arm.generation,
                self.generation
            );
            return false;
        }
        !status.is_playing() && power == PowerState::On
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PlaybackStatus::Paused, PowerState::On, true)]
    #[case(PlaybackStatus::Stopped, PowerState::On, true)]
    #[case(PlaybackStatus::Playing, PowerState::On, false)]
    #[case(PlaybackStatus::Paused, PowerState::Off, false)]
    fn test_fire_time_check(
        #[case] status: PlaybackStatus,
        #[case] power: PowerState,
        #[case] expected: bool,
    ) {
        let mut timer = StandbyTimer::new();
        let mut timers = TimerQueue::new();
        let arm = timer.arm(Duration::from_secs(3), &mut timers);
        assert_eq!(timer.should_fire(&arm, status, power), expected);
    }

    #[test]
    fn test_only_latest_arm_fires() {
        let mut timer = StandbyTimer::new();
        let mut timers = TimerQueue::new();
        let first = timer.arm(Duration::from_secs(3), &mut timers);
        let second = timer.arm(Duration::from_secs(3), &mut timers);

        assert_eq!(timers.len(), 2);
        assert!(!timer.should_fire(&first, PlaybackStatus::Paused, PowerState::On));
        assert!(timer.should_fire(&second, PlaybackStatus::Paused, PowerState::On));
    }
}
