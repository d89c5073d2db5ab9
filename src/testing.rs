/// In-memory stand-ins for the browser, shared by the unit tests
use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use crate::api::{HttpRequest, HttpResponse, Transport};
use crate::badge::BadgeSurface;
use crate::error::{Error, Result};
use crate::schedule::AlarmScheduler;
use crate::storage::{
    ChangedKeys, Credentials, KEY_API_KEY, KEY_BASE_URL, KEY_REFRESH_INITIAL, KEY_REFRESH_REGULAR,
    SettingsChange, SettingsListener, SettingsStore, StoredSettings,
};

#[derive(Default)]
pub struct MemorySettings {
    stored: RefCell<StoredSettings>,
    listeners: RefCell<Vec<SettingsListener>>,
    loads: Cell<usize>,
    reject_writes: Cell<bool>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(base_url: &str, api_key: &str) -> Self {
        let settings = Self::default();
        *settings.stored.borrow_mut() =
            StoredSettings::from_credentials(&Credentials::new(base_url, api_key));
        settings
    }

    pub fn load_count(&self) -> usize {
        self.loads.get()
    }

    pub fn reject_writes(&self) {
        self.reject_writes.set(true);
    }
}

#[async_trait(?Send)]
impl SettingsStore for MemorySettings {
    async fn load(&self) -> StoredSettings {
        self.loads.set(self.loads.get() + 1);
        self.stored.borrow().clone()
    }

    async fn save(&self, settings: &StoredSettings) -> Result<()> {
        if self.reject_writes.get() {
            return Err(Error::Storage("quota exceeded".to_string()));
        }

        self.stored.borrow_mut().merge(settings);

        let mut keys = Vec::new();
        if settings.base_url.is_some() {
            keys.push(KEY_BASE_URL);
        }
        if settings.api_key.is_some() {
            keys.push(KEY_API_KEY);
        }
        if settings.refresh_interval_initial.is_some() {
            keys.push(KEY_REFRESH_INITIAL);
        }
        if settings.refresh_interval_regular.is_some() {
            keys.push(KEY_REFRESH_REGULAR);
        }

        let change = SettingsChange::from_stored(ChangedKeys::from_keys(keys), &self.stored.borrow());
        let listeners = self.listeners.borrow().clone();
        for listener in listeners {
            listener(change.clone());
        }
        Ok(())
    }

    fn subscribe(&self, listener: SettingsListener) {
        self.listeners.borrow_mut().push(listener);
    }
}

/// Answers requests from a queue and records what was sent
#[derive(Default)]
pub struct ScriptedTransport {
    responses: RefCell<VecDeque<Result<HttpResponse>>>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, status: u16, status_text: &str, body: &str) {
        self.responses.borrow_mut().push_back(Ok(HttpResponse {
            status,
            status_text: status_text.to_string(),
            body: body.to_string(),
        }));
    }

    pub fn fail(&self, message: &str) {
        self.responses
            .borrow_mut()
            .push_back(Err(Error::Transport(message.to_string())));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.borrow_mut().push(request);
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Transport("no scripted response".to_string())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BadgeCall {
    Text(String),
    Color(String),
}

#[derive(Default)]
pub struct RecordingBadge {
    calls: RefCell<Vec<BadgeCall>>,
}

impl RecordingBadge {
    pub fn calls(&self) -> Vec<BadgeCall> {
        self.calls.borrow().clone()
    }

    pub fn last_text(&self) -> Option<String> {
        self.calls.borrow().iter().rev().find_map(|call| match call {
            BadgeCall::Text(text) => Some(text.clone()),
            BadgeCall::Color(_) => None,
        })
    }
}

#[async_trait(?Send)]
impl BadgeSurface for RecordingBadge {
    async fn set_text(&self, text: &str) -> Result<()> {
        self.calls.borrow_mut().push(BadgeCall::Text(text.to_string()));
        Ok(())
    }

    async fn set_background_color(&self, color: &str) -> Result<()> {
        self.calls.borrow_mut().push(BadgeCall::Color(color.to_string()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlarmCall {
    Periodic(String, f64),
    Once(String, f64),
    Clear(String),
}

#[derive(Default)]
pub struct RecordingAlarms {
    calls: RefCell<Vec<AlarmCall>>,
}

impl RecordingAlarms {
    pub fn calls(&self) -> Vec<AlarmCall> {
        self.calls.borrow().clone()
    }
}

#[async_trait(?Send)]
impl AlarmScheduler for RecordingAlarms {
    async fn create_periodic(&self, name: &str, period_minutes: f64) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(AlarmCall::Periodic(name.to_string(), period_minutes));
        Ok(())
    }

    async fn create_once(&self, name: &str, delay_minutes: f64) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(AlarmCall::Once(name.to_string(), delay_minutes));
        Ok(())
    }

    async fn clear(&self, name: &str) -> Result<()> {
        self.calls.borrow_mut().push(AlarmCall::Clear(name.to_string()));
        Ok(())
    }
}
