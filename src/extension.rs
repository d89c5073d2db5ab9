/// Browser adapters: chrome.* APIs and fetch behind the core traits
use async_trait::async_trait;
use js_sys::Promise;
use serde::Serialize;
use serde_json::Value;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, future_to_promise, spawn_local};

use crate::api::{HttpRequest, HttpResponse, Transport};
use crate::background::{Background, BackgroundConfig};
use crate::badge::BadgeSurface;
use crate::error::{Error, Result};
use crate::router::{Request, Response};
use crate::schedule::AlarmScheduler;
use crate::storage::{
    ALL_KEYS, ChangedKeys, SettingsChange, SettingsListener, SettingsStore, StoredSettings,
};

// Import JS bridge functions
#[wasm_bindgen(module = "/js/bridge.js")]
extern "C" {
    #[wasm_bindgen(catch, js_name = storageGet)]
    async fn storage_get(keys: JsValue) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_name = storageSet)]
    async fn storage_set(items: JsValue) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(js_name = onStorageChanged)]
    fn on_storage_changed(callback: &Closure<dyn FnMut(JsValue)>);

    #[wasm_bindgen(catch, js_name = setBadgeText)]
    async fn set_badge_text(text: &str) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(catch, js_name = setBadgeBackgroundColor)]
    async fn set_badge_background_color(color: &str) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(catch, js_name = createAlarm)]
    async fn create_alarm(name: &str, info: JsValue) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(catch, js_name = clearAlarm)]
    async fn clear_alarm(name: &str) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(js_name = onAlarm)]
    fn on_alarm(callback: &Closure<dyn FnMut(String)>);

    #[wasm_bindgen(js_name = onStartup)]
    fn on_startup(callback: &Closure<dyn FnMut()>);

    #[wasm_bindgen(js_name = onInstalled)]
    fn on_installed(callback: &Closure<dyn FnMut()>);

    #[wasm_bindgen(js_name = onMessage)]
    fn on_message(handler: &Closure<dyn FnMut(JsValue) -> Promise>);

    #[wasm_bindgen(catch, js_name = sendMessage)]
    async fn send_message(message: JsValue) -> std::result::Result<JsValue, JsValue>;

    #[wasm_bindgen(js_name = openOptionsPage)]
    fn open_options_page_js();

    #[wasm_bindgen(catch, js_name = openTab)]
    async fn open_tab_js(url: &str) -> std::result::Result<(), JsValue>;
}

// Global fetch works in windows and service workers alike
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = fetch)]
    fn fetch_with_request(input: &web_sys::Request) -> Promise;
}

/// Serialize into plain JS objects (not `Map`s), as the extension APIs expect
pub fn to_js<T: Serialize + ?Sized>(value: &T) -> std::result::Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
}

pub fn js_error_message(err: &JsValue) -> String {
    if let Some(message) = err.as_string() {
        return message;
    }
    if let Some(error) = err.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    format!("{:?}", err)
}

/// chrome.storage.sync
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeSettings;

#[async_trait(?Send)]
impl SettingsStore for ChromeSettings {
    async fn load(&self) -> StoredSettings {
        let keys = match to_js(&ALL_KEYS) {
            Ok(keys) => keys,
            Err(e) => {
                log::error!("Failed to build settings query: {}", e);
                return StoredSettings::default();
            }
        };

        match storage_get(keys).await {
            Ok(result) => match serde_wasm_bindgen::from_value::<Value>(result) {
                Ok(value) => StoredSettings::from_value(&value),
                Err(e) => {
                    log::warn!("Unreadable settings, using defaults: {}", e);
                    StoredSettings::default()
                }
            },
            Err(e) => {
                log::error!("Failed to read settings: {}", js_error_message(&e));
                StoredSettings::default()
            }
        }
    }

    async fn save(&self, settings: &StoredSettings) -> Result<()> {
        let items = to_js(settings).map_err(|e| Error::Storage(e.to_string()))?;
        storage_set(items)
            .await
            .map_err(|e| Error::Storage(js_error_message(&e)))
    }

    fn subscribe(&self, listener: SettingsListener) {
        let store = *self;
        let callback = Closure::<dyn FnMut(JsValue)>::new(move |keys: JsValue| {
            let keys: Vec<String> = serde_wasm_bindgen::from_value(keys).unwrap_or_default();
            let changed = ChangedKeys::from_keys(&keys);
            if changed.is_empty() {
                return;
            }

            let listener = listener.clone();
            spawn_local(async move {
                let stored = store.load().await;
                listener(SettingsChange::from_stored(changed, &stored));
            });
        });

        on_storage_changed(&callback);
        callback.forget();
    }
}

/// The global `fetch`
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchTransport;

#[async_trait(?Send)]
impl Transport for FetchTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let transport_error = |e: JsValue| Error::Transport(js_error_message(&e));

        let init = web_sys::RequestInit::new();
        init.set_method(request.method.as_str());

        let headers = web_sys::Headers::new().map_err(transport_error)?;
        for (name, value) in &request.headers {
            headers.set(name, value).map_err(transport_error)?;
        }
        init.set_headers(&headers);

        if let Some(body) = &request.body {
            init.set_body(&JsValue::from_str(body));
        }

        let js_request = web_sys::Request::new_with_str_and_init(&request.url, &init)
            .map_err(transport_error)?;
        let value = JsFuture::from(fetch_with_request(&js_request))
            .await
            .map_err(transport_error)?;
        let response: web_sys::Response = value.dyn_into().map_err(transport_error)?;

        let text = response.text().map_err(transport_error)?;
        let body = JsFuture::from(text)
            .await
            .map_err(transport_error)?
            .as_string()
            .unwrap_or_default();

        Ok(HttpResponse {
            status: response.status(),
            status_text: response.status_text(),
            body,
        })
    }
}

/// chrome.action (or browserAction)
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionBadge;

#[async_trait(?Send)]
impl BadgeSurface for ActionBadge {
    async fn set_text(&self, text: &str) -> Result<()> {
        set_badge_text(text)
            .await
            .map_err(|e| Error::Browser(js_error_message(&e)))
    }

    async fn set_background_color(&self, color: &str) -> Result<()> {
        set_badge_background_color(color)
            .await
            .map_err(|e| Error::Browser(js_error_message(&e)))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AlarmInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    period_in_minutes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    delay_in_minutes: Option<f64>,
}

/// chrome.alarms
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeAlarms;

impl ChromeAlarms {
    async fn create(&self, name: &str, info: AlarmInfo) -> Result<()> {
        let info = to_js(&info).map_err(|e| Error::Browser(e.to_string()))?;
        create_alarm(name, info)
            .await
            .map_err(|e| Error::Browser(js_error_message(&e)))
    }
}

#[async_trait(?Send)]
impl AlarmScheduler for ChromeAlarms {
    async fn create_periodic(&self, name: &str, period_minutes: f64) -> Result<()> {
        self.create(
            name,
            AlarmInfo {
                period_in_minutes: Some(period_minutes),
                delay_in_minutes: None,
            },
        )
        .await
    }

    async fn create_once(&self, name: &str, delay_minutes: f64) -> Result<()> {
        self.create(
            name,
            AlarmInfo {
                period_in_minutes: None,
                delay_in_minutes: Some(delay_minutes),
            },
        )
        .await
    }

    async fn clear(&self, name: &str) -> Result<()> {
        clear_alarm(name)
            .await
            .map_err(|e| Error::Browser(js_error_message(&e)))
    }
}

/// Register every background listener. Must run synchronously at worker start.
pub fn start_background() {
    let settings = Rc::new(ChromeSettings);
    let background = Rc::new(Background::new(
        settings.clone(),
        Rc::new(FetchTransport),
        Rc::new(ActionBadge),
        Rc::new(ChromeAlarms),
        BackgroundConfig::default(),
    ));

    let handler = {
        let background = background.clone();
        Closure::<dyn FnMut(JsValue) -> Promise>::new(move |message: JsValue| {
            let background = background.clone();
            future_to_promise(async move {
                let raw: Value = serde_wasm_bindgen::from_value(message).unwrap_or(Value::Null);
                let response = background.handle_message(&raw).await;
                to_js(&response).map_err(|e| JsValue::from_str(&e.to_string()))
            })
        })
    };
    on_message(&handler);
    handler.forget();

    let alarm = {
        let background = background.clone();
        Closure::<dyn FnMut(String)>::new(move |name: String| {
            let background = background.clone();
            spawn_local(async move {
                background.on_alarm(&name).await;
            });
        })
    };
    on_alarm(&alarm);
    alarm.forget();

    let startup = startup_callback(background.clone());
    on_startup(&startup);
    startup.forget();

    let installed = startup_callback(background.clone());
    on_installed(&installed);
    installed.forget();

    settings.subscribe(Rc::new(move |change: SettingsChange| {
        let background = background.clone();
        spawn_local(async move {
            background.on_settings_changed(change).await;
        });
    }));

    log::info!("Background listeners registered");
}

fn startup_callback(background: Rc<Background>) -> Closure<dyn FnMut()> {
    Closure::<dyn FnMut()>::new(move || {
        let background = background.clone();
        spawn_local(async move {
            background.on_startup().await;
        });
    })
}

/// Ask the background to act; never fails, errors come back in the envelope
pub async fn send_request(request: &Request) -> Response {
    let message = match to_js(request) {
        Ok(message) => message,
        Err(e) => return Response::failure(e.to_string()),
    };

    match send_message(message).await {
        Ok(value) if value.is_undefined() || value.is_null() => Response::no_response(),
        Ok(value) => serde_wasm_bindgen::from_value(value)
            .unwrap_or_else(|e| Response::failure(e.to_string())),
        Err(e) => Response::failure(js_error_message(&e)),
    }
}

pub fn open_options_page() {
    open_options_page_js();
}

pub async fn open_tab(url: &str) -> Result<()> {
    open_tab_js(url)
        .await
        .map_err(|e| Error::Browser(js_error_message(&e)))
}
