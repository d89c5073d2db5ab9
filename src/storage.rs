/// Settings kept in chrome.storage.sync: credentials and refresh intervals

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::rc::Rc;

use crate::error::Result;

pub const KEY_BASE_URL: &str = "baseURL";
pub const KEY_API_KEY: &str = "apiKey";
pub const KEY_REFRESH_INITIAL: &str = "refreshIntervalInitial";
pub const KEY_REFRESH_REGULAR: &str = "refreshIntervalRegular";

/// Every key this extension reads from storage
pub const ALL_KEYS: [&str; 4] = [
    KEY_BASE_URL,
    KEY_API_KEY,
    KEY_REFRESH_INITIAL,
    KEY_REFRESH_REGULAR,
];

pub const DEFAULT_INITIAL_MINUTES: u32 = 2;
pub const DEFAULT_REGULAR_MINUTES: u32 = 5;

/// Server location and API key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub base_url: String,
    pub api_key: String,
}

impl Credentials {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Credentials {
        Credentials {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Both fields must be set before any request goes out
    pub fn is_usable(&self) -> bool {
        !self.base_url.is_empty() && !self.api_key.is_empty()
    }
}

/// Polling periods in minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshIntervals {
    pub initial_minutes: u32,
    pub regular_minutes: u32,
}

impl Default for RefreshIntervals {
    fn default() -> Self {
        RefreshIntervals {
            initial_minutes: DEFAULT_INITIAL_MINUTES,
            regular_minutes: DEFAULT_REGULAR_MINUTES,
        }
    }
}

/// Raw storage record. Absent keys stay `None` so a partial write never
/// clobbers the other settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoredSettings {
    #[serde(rename = "baseURL", skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(rename = "apiKey", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(rename = "refreshIntervalInitial", skip_serializing_if = "Option::is_none")]
    pub refresh_interval_initial: Option<u32>,
    #[serde(rename = "refreshIntervalRegular", skip_serializing_if = "Option::is_none")]
    pub refresh_interval_regular: Option<u32>,
}

impl StoredSettings {
    /// Read whatever the store handed back. Wrong types are treated as missing.
    pub fn from_value(value: &Value) -> StoredSettings {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

        StoredSettings {
            base_url: text(KEY_BASE_URL),
            api_key: text(KEY_API_KEY),
            refresh_interval_initial: value.get(KEY_REFRESH_INITIAL).and_then(minutes),
            refresh_interval_regular: value.get(KEY_REFRESH_REGULAR).and_then(minutes),
        }
    }

    pub fn from_credentials(credentials: &Credentials) -> StoredSettings {
        StoredSettings {
            base_url: Some(credentials.base_url.clone()),
            api_key: Some(credentials.api_key.clone()),
            ..StoredSettings::default()
        }
    }

    pub fn from_intervals(intervals: &RefreshIntervals) -> StoredSettings {
        StoredSettings {
            refresh_interval_initial: Some(intervals.initial_minutes),
            refresh_interval_regular: Some(intervals.regular_minutes),
            ..StoredSettings::default()
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            base_url: self.base_url.clone().unwrap_or_default(),
            api_key: self.api_key.clone().unwrap_or_default(),
        }
    }

    pub fn refresh_intervals(&self) -> RefreshIntervals {
        let defaults = RefreshIntervals::default();
        RefreshIntervals {
            initial_minutes: self
                .refresh_interval_initial
                .filter(|m| *m > 0)
                .unwrap_or(defaults.initial_minutes),
            regular_minutes: self
                .refresh_interval_regular
                .filter(|m| *m > 0)
                .unwrap_or(defaults.regular_minutes),
        }
    }

    /// Overlay the keys present in `other` onto `self`
    pub fn merge(&mut self, other: &StoredSettings) {
        if other.base_url.is_some() {
            self.base_url = other.base_url.clone();
        }
        if other.api_key.is_some() {
            self.api_key = other.api_key.clone();
        }
        if other.refresh_interval_initial.is_some() {
            self.refresh_interval_initial = other.refresh_interval_initial;
        }
        if other.refresh_interval_regular.is_some() {
            self.refresh_interval_regular = other.refresh_interval_regular;
        }
    }
}

fn minutes(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|m| u32::try_from(m).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Which groups of settings a storage change touched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangedKeys {
    pub credentials: bool,
    pub refresh_intervals: bool,
}

impl ChangedKeys {
    pub fn from_keys<I, S>(keys: I) -> ChangedKeys
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        keys.into_iter()
            .fold(ChangedKeys::default(), |mut changed, key| {
                match key.as_ref() {
                    KEY_BASE_URL | KEY_API_KEY => changed.credentials = true,
                    KEY_REFRESH_INITIAL | KEY_REFRESH_REGULAR => changed.refresh_intervals = true,
                    _ => {}
                }
                changed
            })
    }

    pub fn is_empty(&self) -> bool {
        !self.credentials && !self.refresh_intervals
    }
}

/// A committed settings change, carrying the new values of each group that moved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsChange {
    pub credentials: Option<Credentials>,
    pub refresh_intervals: Option<RefreshIntervals>,
}

impl SettingsChange {
    /// Build the change from the groups that moved and the freshly read store
    pub fn from_stored(changed: ChangedKeys, stored: &StoredSettings) -> SettingsChange {
        SettingsChange {
            credentials: changed.credentials.then(|| stored.credentials()),
            refresh_intervals: changed.refresh_intervals.then(|| stored.refresh_intervals()),
        }
    }
}

pub type SettingsListener = Rc<dyn Fn(SettingsChange)>;

/// Shared asynchronous key-value store holding the settings
#[async_trait(?Send)]
pub trait SettingsStore {
    /// Always resolves; a failed read yields empty settings
    async fn load(&self) -> StoredSettings;

    /// Persist the keys present in `settings`
    async fn save(&self, settings: &StoredSettings) -> Result<()>;

    /// Register an observer called once per committed change
    fn subscribe(&self, listener: SettingsListener);

    async fn credentials(&self) -> Credentials {
        self.load().await.credentials()
    }

    async fn set_credentials(&self, credentials: &Credentials) -> Result<()> {
        self.save(&StoredSettings::from_credentials(credentials)).await
    }

    async fn refresh_intervals(&self) -> RefreshIntervals {
        self.load().await.refresh_intervals()
    }
}

/// Validation failures on the options form
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("Please fill in all required fields.")]
    MissingField,

    #[error("Please enter a valid URL (including http:// or https://).")]
    InvalidUrl,

    #[error("Refresh intervals must be whole minutes greater than zero.")]
    InvalidInterval,
}

/// Raw text entered on the options page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsForm {
    pub base_url: String,
    pub api_key: String,
    pub refresh_interval_initial: String,
    pub refresh_interval_regular: String,
}

impl SettingsForm {
    pub fn from_stored(stored: &StoredSettings) -> SettingsForm {
        let intervals = stored.refresh_intervals();
        SettingsForm {
            base_url: stored.base_url.clone().unwrap_or_default(),
            api_key: stored.api_key.clone().unwrap_or_default(),
            refresh_interval_initial: intervals.initial_minutes.to_string(),
            refresh_interval_regular: intervals.regular_minutes.to_string(),
        }
    }

    /// Credentials only, as needed by the connection test
    pub fn validate_credentials(&self) -> std::result::Result<Credentials, FormError> {
        let base_url = self.base_url.trim();
        let api_key = self.api_key.trim();

        if base_url.is_empty() || api_key.is_empty() {
            return Err(FormError::MissingField);
        }

        let parsed = url::Url::parse(base_url).map_err(|_| FormError::InvalidUrl)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FormError::InvalidUrl);
        }

        Ok(Credentials::new(base_url, api_key))
    }

    /// Full record to persist. Blank interval fields fall back to the defaults.
    pub fn validate(&self) -> std::result::Result<StoredSettings, FormError> {
        let credentials = self.validate_credentials()?;
        let defaults = RefreshIntervals::default();

        let interval = |text: &str, default: u32| -> std::result::Result<u32, FormError> {
            let text = text.trim();
            if text.is_empty() {
                return Ok(default);
            }
            match text.parse::<u32>() {
                Ok(m) if m > 0 => Ok(m),
                _ => Err(FormError::InvalidInterval),
            }
        };

        let intervals = RefreshIntervals {
            initial_minutes: interval(&self.refresh_interval_initial, defaults.initial_minutes)?,
            regular_minutes: interval(&self.refresh_interval_regular, defaults.regular_minutes)?,
        };

        let mut stored = StoredSettings::from_credentials(&credentials);
        stored.merge(&StoredSettings::from_intervals(&intervals));
        Ok(stored)
    }
}
