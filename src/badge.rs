/// Toolbar badge: renders the unread state and owns the refresh timers
use async_trait::async_trait;
use std::rc::Rc;

use crate::api::ApiClient;
use crate::error::Result;
use crate::reconcile::Reconciler;
use crate::schedule::{
    AlarmScheduler, PHASE_SWITCH_ALARM, RefreshPhase, RefreshSchedule, STEADY_ALARM, WARMUP_ALARM,
};

pub const UNREAD_GLYPH: &str = "●";
pub const ATTENTION_COLOR: &str = "#ff0000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeState {
    Cleared,
    Unread(usize),
}

impl BadgeState {
    pub fn from_count(count: usize) -> BadgeState {
        if count > 0 {
            BadgeState::Unread(count)
        } else {
            BadgeState::Cleared
        }
    }

    /// Never a number: either the dot or nothing
    pub fn text(&self) -> &'static str {
        match self {
            BadgeState::Cleared => "",
            BadgeState::Unread(_) => UNREAD_GLYPH,
        }
    }
}

/// The browser's action badge
#[async_trait(?Send)]
pub trait BadgeSurface {
    async fn set_text(&self, text: &str) -> Result<()>;

    async fn set_background_color(&self, color: &str) -> Result<()>;
}

pub struct BadgeController {
    api: Rc<ApiClient>,
    surface: Rc<dyn BadgeSurface>,
    alarms: Rc<dyn AlarmScheduler>,
    reconciler: Rc<Reconciler>,
}

impl BadgeController {
    pub fn new(
        api: Rc<ApiClient>,
        surface: Rc<dyn BadgeSurface>,
        alarms: Rc<dyn AlarmScheduler>,
        reconciler: Rc<Reconciler>,
    ) -> Self {
        BadgeController {
            api,
            surface,
            alarms,
            reconciler,
        }
    }

    /// Fetch, count and render. Failures clear the badge and are only logged.
    pub async fn refresh(&self) -> BadgeState {
        let state = match self.api.list_watches().await {
            Ok(watches) => BadgeState::from_count(self.reconciler.count_unread(&watches)),
            Err(e) => {
                log::error!("Failed to update badge: {}", e);
                BadgeState::Cleared
            }
        };

        self.render(state).await;
        state
    }

    pub async fn render(&self, state: BadgeState) {
        if let Err(e) = self.surface.set_text(state.text()).await {
            log::error!("Failed to set badge text: {}", e);
            return;
        }

        if let BadgeState::Unread(_) = state {
            if let Err(e) = self.surface.set_background_color(ATTENTION_COLOR).await {
                log::error!("Failed to set badge color: {}", e);
            }
        }
    }

    /// Drop every refresh alarm and start over from the first phase
    pub async fn start_schedule(&self, schedule: RefreshSchedule) {
        log::info!(
            "Setting up badge updates - Initial: {} min, Regular: {} min",
            schedule.warmup_period_minutes,
            schedule.steady_period_minutes
        );

        for name in [WARMUP_ALARM, STEADY_ALARM, PHASE_SWITCH_ALARM] {
            self.clear_alarm(name).await;
        }

        match schedule.initial_phase() {
            RefreshPhase::WarmUp => {
                self.arm(RefreshPhase::WarmUp, &schedule).await;
                if let Err(e) = self
                    .alarms
                    .create_once(PHASE_SWITCH_ALARM, f64::from(schedule.warmup_window_minutes))
                    .await
                {
                    log::error!("Failed to schedule switch to regular interval: {}", e);
                }
            }
            RefreshPhase::Steady => self.arm(RefreshPhase::Steady, &schedule).await,
        }
    }

    /// Leave the warm-up phase
    pub async fn enter_steady(&self, schedule: RefreshSchedule) {
        self.clear_alarm(WARMUP_ALARM).await;
        self.clear_alarm(PHASE_SWITCH_ALARM).await;
        self.arm(RefreshPhase::Steady, &schedule).await;
        log::info!(
            "Switched to regular refresh interval: {} minutes",
            schedule.steady_period_minutes
        );
    }

    async fn arm(&self, phase: RefreshPhase, schedule: &RefreshSchedule) {
        let period = f64::from(schedule.period_minutes(phase));
        if let Err(e) = self.alarms.create_periodic(phase.alarm_name(), period).await {
            log::error!("Failed to create alarm {}: {}", phase.alarm_name(), e);
        }
    }

    async fn clear_alarm(&self, name: &str) {
        if let Err(e) = self.alarms.clear(name).await {
            log::warn!("Failed to clear alarm {}: {}", name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MarkViewedContract;
    use crate::reconcile::{PolicySelection, UnreadPolicy};
    use crate::storage::RefreshIntervals;
    use crate::testing::{AlarmCall, BadgeCall, MemorySettings, RecordingAlarms, RecordingBadge, ScriptedTransport};
    use futures::executor::block_on;

    struct Fixture {
        transport: Rc<ScriptedTransport>,
        badge: Rc<RecordingBadge>,
        alarms: Rc<RecordingAlarms>,
        controller: BadgeController,
    }

    fn fixture(selection: PolicySelection) -> Fixture {
        let transport = Rc::new(ScriptedTransport::new());
        let settings = Rc::new(MemorySettings::with_credentials("http://x", "k"));
        let badge = Rc::new(RecordingBadge::default());
        let alarms = Rc::new(RecordingAlarms::default());
        let api = Rc::new(ApiClient::new(
            transport.clone(),
            settings,
            MarkViewedContract::default(),
        ));
        let controller = BadgeController::new(
            api,
            badge.clone(),
            alarms.clone(),
            Rc::new(Reconciler::new(selection)),
        );

        Fixture {
            transport,
            badge,
            alarms,
            controller,
        }
    }

    #[test]
    fn test_badge_state_text() {
        assert_eq!(BadgeState::from_count(0), BadgeState::Cleared);
        assert_eq!(BadgeState::from_count(0).text(), "");
        assert_eq!(BadgeState::from_count(3).text(), UNREAD_GLYPH);
    }

    #[test]
    fn test_render_unread_sets_glyph_and_color() {
        let f = fixture(PolicySelection::default());

        block_on(f.controller.render(BadgeState::from_count(3)));

        assert_eq!(
            f.badge.calls(),
            vec![
                BadgeCall::Text(UNREAD_GLYPH.to_string()),
                BadgeCall::Color(ATTENTION_COLOR.to_string()),
            ]
        );
    }

    #[test]
    fn test_render_zero_clears_text() {
        let f = fixture(PolicySelection::default());

        block_on(f.controller.render(BadgeState::from_count(0)));

        assert_eq!(f.badge.calls(), vec![BadgeCall::Text(String::new())]);
    }

    #[test]
    fn test_refresh_counts_unread() {
        let f = fixture(PolicySelection::Fixed(UnreadPolicy::ViewedFlag));
        f.transport.respond(
            200,
            "OK",
            r#"{"a":{"viewed":false},"b":{"viewed":true},"c":{"viewed":false}}"#,
        );

        let state = block_on(f.controller.refresh());

        assert_eq!(state, BadgeState::Unread(2));
        assert_eq!(f.badge.last_text().as_deref(), Some(UNREAD_GLYPH));
    }

    #[test]
    fn test_refresh_failure_clears_badge() {
        let f = fixture(PolicySelection::default());
        f.transport.respond(401, "Unauthorized", "");

        let state = block_on(f.controller.refresh());

        assert_eq!(state, BadgeState::Cleared);
        assert_eq!(f.badge.calls(), vec![BadgeCall::Text(String::new())]);
    }

    #[test]
    fn test_refresh_after_network_failure_clears_badge() {
        let f = fixture(PolicySelection::default());
        f.transport.fail("connection refused");

        assert_eq!(block_on(f.controller.refresh()), BadgeState::Cleared);
        assert_eq!(f.badge.last_text().as_deref(), Some(""));
    }

    #[test]
    fn test_start_schedule_arms_warmup_and_switch() {
        let f = fixture(PolicySelection::default());
        let schedule = RefreshSchedule::new(RefreshIntervals::default(), 60);

        block_on(f.controller.start_schedule(schedule));

        assert_eq!(
            f.alarms.calls(),
            vec![
                AlarmCall::Clear(WARMUP_ALARM.to_string()),
                AlarmCall::Clear(STEADY_ALARM.to_string()),
                AlarmCall::Clear(PHASE_SWITCH_ALARM.to_string()),
                AlarmCall::Periodic(WARMUP_ALARM.to_string(), 2.0),
                AlarmCall::Once(PHASE_SWITCH_ALARM.to_string(), 60.0),
            ]
        );
    }

    #[test]
    fn test_start_schedule_without_warmup() {
        let f = fixture(PolicySelection::default());
        let schedule = RefreshSchedule::new(RefreshIntervals::default(), 0);

        block_on(f.controller.start_schedule(schedule));

        assert_eq!(
            f.alarms.calls().last(),
            Some(&AlarmCall::Periodic(STEADY_ALARM.to_string(), 5.0))
        );
    }

    #[test]
    fn test_enter_steady_replaces_warmup_alarm() {
        let f = fixture(PolicySelection::default());
        let schedule = RefreshSchedule::new(
            RefreshIntervals { initial_minutes: 1, regular_minutes: 15 },
            60,
        );

        block_on(f.controller.enter_steady(schedule));

        assert_eq!(
            f.alarms.calls(),
            vec![
                AlarmCall::Clear(WARMUP_ALARM.to_string()),
                AlarmCall::Clear(PHASE_SWITCH_ALARM.to_string()),
                AlarmCall::Periodic(STEADY_ALARM.to_string(), 15.0),
            ]
        );
    }
}
