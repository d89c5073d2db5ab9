/// Badge polling cadence: a fast warm-up phase followed by a steady phase
use async_trait::async_trait;

use crate::error::Result;
use crate::storage::RefreshIntervals;

pub const WARMUP_ALARM: &str = "updateBadgeFrequent";
pub const STEADY_ALARM: &str = "updateBadge";
pub const PHASE_SWITCH_ALARM: &str = "updateBadgeSwitch";

pub const DEFAULT_WARMUP_WINDOW_MINUTES: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    WarmUp,
    Steady,
}

impl RefreshPhase {
    pub fn alarm_name(&self) -> &'static str {
        match self {
            RefreshPhase::WarmUp => WARMUP_ALARM,
            RefreshPhase::Steady => STEADY_ALARM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSchedule {
    /// Length of the warm-up phase; zero skips it
    pub warmup_window_minutes: u32,
    pub warmup_period_minutes: u32,
    pub steady_period_minutes: u32,
}

impl RefreshSchedule {
    pub fn new(intervals: RefreshIntervals, warmup_window_minutes: u32) -> Self {
        RefreshSchedule {
            warmup_window_minutes,
            warmup_period_minutes: intervals.initial_minutes.max(1),
            steady_period_minutes: intervals.regular_minutes.max(1),
        }
    }

    pub fn period_minutes(&self, phase: RefreshPhase) -> u32 {
        match phase {
            RefreshPhase::WarmUp => self.warmup_period_minutes,
            RefreshPhase::Steady => self.steady_period_minutes,
        }
    }

    /// Later phases are entered by the switch alarm, never computed from elapsed time
    pub fn initial_phase(&self) -> RefreshPhase {
        if self.warmup_window_minutes > 0 {
            RefreshPhase::WarmUp
        } else {
            RefreshPhase::Steady
        }
    }
}

/// What a fired alarm asks the background to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmEvent {
    Refresh(RefreshPhase),
    EnterSteady,
    Unknown,
}

impl AlarmEvent {
    pub fn from_name(name: &str) -> AlarmEvent {
        match name {
            WARMUP_ALARM => AlarmEvent::Refresh(RefreshPhase::WarmUp),
            STEADY_ALARM => AlarmEvent::Refresh(RefreshPhase::Steady),
            PHASE_SWITCH_ALARM => AlarmEvent::EnterSteady,
            _ => AlarmEvent::Unknown,
        }
    }
}

/// Named recurring and one-shot timers that outlive the worker
#[async_trait(?Send)]
pub trait AlarmScheduler {
    async fn create_periodic(&self, name: &str, period_minutes: f64) -> Result<()>;

    async fn create_once(&self, name: &str, delay_minutes: f64) -> Result<()>;

    async fn clear(&self, name: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_from_intervals() {
        let schedule = RefreshSchedule::new(
            RefreshIntervals { initial_minutes: 2, regular_minutes: 5 },
            60,
        );

        assert_eq!(schedule.period_minutes(RefreshPhase::WarmUp), 2);
        assert_eq!(schedule.period_minutes(RefreshPhase::Steady), 5);
    }

    #[test]
    fn test_nonzero_window_starts_in_warmup() {
        let schedule = RefreshSchedule::new(RefreshIntervals::default(), 60);
        assert_eq!(schedule.initial_phase(), RefreshPhase::WarmUp);

        let schedule = RefreshSchedule::new(RefreshIntervals::default(), 1);
        assert_eq!(schedule.initial_phase(), RefreshPhase::WarmUp);
    }

    #[test]
    fn test_zero_window_starts_steady() {
        let schedule = RefreshSchedule::new(RefreshIntervals::default(), 0);
        assert_eq!(schedule.initial_phase(), RefreshPhase::Steady);
    }

    #[test]
    fn test_alarm_names_map_to_events() {
        assert_eq!(
            AlarmEvent::from_name(RefreshPhase::WarmUp.alarm_name()),
            AlarmEvent::Refresh(RefreshPhase::WarmUp)
        );
        assert_eq!(
            AlarmEvent::from_name("updateBadge"),
            AlarmEvent::Refresh(RefreshPhase::Steady)
        );
        assert_eq!(AlarmEvent::from_name(PHASE_SWITCH_ALARM), AlarmEvent::EnterSteady);
        assert_eq!(AlarmEvent::from_name("something-else"), AlarmEvent::Unknown);
    }
}
