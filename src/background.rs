/// Background service worker: wires settings, API client, badge and router
use serde_json::Value;
use std::rc::Rc;

use crate::api::{ApiClient, MarkViewedContract, Transport};
use crate::badge::{BadgeController, BadgeState, BadgeSurface};
use crate::reconcile::{PolicySelection, Reconciler};
use crate::router::{Response, Router};
use crate::schedule::{AlarmEvent, AlarmScheduler, DEFAULT_WARMUP_WINDOW_MINUTES, RefreshSchedule};
use crate::storage::{SettingsChange, SettingsStore};

/// Choices fixed when the background starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundConfig {
    pub policy: PolicySelection,
    pub contract: MarkViewedContract,
    pub warmup_window_minutes: u32,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        BackgroundConfig {
            policy: PolicySelection::default(),
            contract: MarkViewedContract::default(),
            warmup_window_minutes: DEFAULT_WARMUP_WINDOW_MINUTES,
        }
    }
}

pub struct Background {
    settings: Rc<dyn SettingsStore>,
    api: Rc<ApiClient>,
    badge: Rc<BadgeController>,
    router: Router,
    config: BackgroundConfig,
}

impl Background {
    pub fn new(
        settings: Rc<dyn SettingsStore>,
        transport: Rc<dyn Transport>,
        surface: Rc<dyn BadgeSurface>,
        alarms: Rc<dyn AlarmScheduler>,
        config: BackgroundConfig,
    ) -> Self {
        let reconciler = Rc::new(Reconciler::new(config.policy));
        let api = Rc::new(ApiClient::new(transport, settings.clone(), config.contract));
        let badge = Rc::new(BadgeController::new(
            api.clone(),
            surface,
            alarms,
            reconciler.clone(),
        ));
        let router = Router::new(api.clone(), badge.clone(), reconciler);

        Background {
            settings,
            api,
            badge,
            router,
            config,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    async fn schedule(&self) -> RefreshSchedule {
        let intervals = self.settings.refresh_intervals().await;
        RefreshSchedule::new(intervals, self.config.warmup_window_minutes)
    }

    /// Browser start or extension install: arm the timers and render once
    pub async fn on_startup(&self) -> BadgeState {
        let schedule = self.schedule().await;
        self.badge.start_schedule(schedule).await;
        self.badge.refresh().await
    }

    pub async fn on_alarm(&self, name: &str) {
        match AlarmEvent::from_name(name) {
            AlarmEvent::Refresh(_) => {
                self.badge.refresh().await;
            }
            AlarmEvent::EnterSteady => {
                let schedule = self.schedule().await;
                self.badge.enter_steady(schedule).await;
            }
            AlarmEvent::Unknown => log::debug!("Ignoring alarm {}", name),
        }
    }

    pub async fn on_settings_changed(&self, change: SettingsChange) {
        if change.credentials.is_some() {
            log::info!("Credentials changed, reinitializing API client");
            self.api.invalidate();
            self.badge.refresh().await;
        }

        if let Some(intervals) = change.refresh_intervals {
            log::info!("Refresh intervals changed, restarting badge updates");
            let schedule = RefreshSchedule::new(intervals, self.config.warmup_window_minutes);
            self.badge.start_schedule(schedule).await;
        }
    }

    pub async fn handle_message(&self, raw: &Value) -> Response {
        self.router.handle(raw).await
    }
}
