/// Client for the changedetection.io REST API
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use url::Url;

use crate::error::{Error, Result};
use crate::reconcile::normalize;
use crate::storage::{Credentials, SettingsStore};
use crate::watch::Watch;

pub const WATCH_LIST_ENDPOINT: &str = "/api/v1/watch";
// Only used to borrow `url`'s path-segment encoding
const ENDPOINT_BASE: &str = "http://localhost/api/v1/watch";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully built request handed to the transport
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// HTTP response from a request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Abstraction over the network for dependency injection
#[async_trait(?Send)]
pub trait Transport {
    /// Fails only when no response was received at all
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// How the server expects a watch to be marked as viewed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MarkViewedContract {
    /// `PATCH {last_viewed: <ISO>}`
    Patch,
    /// `GET` the watch for its url, then `PUT {url, last_viewed: <unix seconds>}`.
    /// The server overwrites the record on PUT, so `url` must be sent back.
    #[default]
    FetchThenPut,
}

#[derive(Debug, Clone)]
struct Snapshot {
    generation: u64,
    credentials: Credentials,
}

/// Credential snapshot tagged with the generation it was read in.
/// Any settings change bumps the generation, so the next request re-reads.
#[derive(Debug, Default)]
pub struct Session {
    generation: Cell<u64>,
    snapshot: RefCell<Option<Snapshot>>,
}

impl Session {
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    pub fn invalidate(&self) {
        self.generation.set(self.generation.get() + 1);
    }

    pub fn is_initialized(&self) -> bool {
        self.current().is_some()
    }

    fn current(&self) -> Option<Credentials> {
        self.snapshot
            .borrow()
            .as_ref()
            .filter(|s| s.generation == self.generation.get())
            .map(|s| s.credentials.clone())
    }

    fn remember(&self, generation: u64, credentials: Credentials) {
        *self.snapshot.borrow_mut() = Some(Snapshot {
            generation,
            credentials,
        });
    }
}

pub struct ApiClient {
    transport: Rc<dyn Transport>,
    settings: Rc<dyn SettingsStore>,
    session: Session,
    contract: MarkViewedContract,
    clock: fn() -> DateTime<Utc>,
}

impl ApiClient {
    pub fn new(
        transport: Rc<dyn Transport>,
        settings: Rc<dyn SettingsStore>,
        contract: MarkViewedContract,
    ) -> Self {
        ApiClient {
            transport,
            settings,
            session: Session::default(),
            contract,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Forget the cached credentials; the next request reloads them
    pub fn invalidate(&self) {
        self.session.invalidate();
    }

    /// Credentials for the current generation, loading them at most once
    pub async fn credentials(&self) -> Credentials {
        if let Some(credentials) = self.session.current() {
            return credentials;
        }

        let generation = self.session.generation();
        let credentials = self.settings.credentials().await;
        self.session.remember(generation, credentials.clone());
        credentials
    }

    async fn request(&self, method: Method, endpoint: &str, body: Option<Value>) -> Result<HttpResponse> {
        let credentials = self.credentials().await;
        if !credentials.is_usable() {
            return Err(Error::Config);
        }

        let base = credentials
            .base_url
            .strip_suffix('/')
            .unwrap_or(&credentials.base_url);
        let request = HttpRequest {
            method,
            url: format!("{}{}", base, endpoint),
            headers: vec![
                ("x-api-key".to_string(), credentials.api_key.clone()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body: body.map(|b| b.to_string()),
        };

        log::debug!("{} {}", method, request.url);
        let url = request.url.clone();
        let response = self.transport.send(request).await?;
        log::debug!("{} {} -> {}", method, url, response.status);

        if !response.is_success() {
            return Err(Error::Http {
                status: response.status,
                status_text: response.status_text,
                body: Some(response.body).filter(|b| !b.is_empty()),
            });
        }

        Ok(response)
    }

    async fn request_json(&self, method: Method, endpoint: &str) -> Result<Value> {
        let response = self.request(method, endpoint, None).await?;
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&response.body)?)
    }

    /// All watches, whatever shape the server answered with
    pub async fn list_watches(&self) -> Result<Vec<Watch>> {
        let raw = self.request_json(Method::Get, WATCH_LIST_ENDPOINT).await?;
        normalize(raw)
    }

    pub async fn get_watch(&self, uuid: &str) -> Result<Watch> {
        let raw = self.request_json(Method::Get, &watch_endpoint(uuid)?).await?;
        Ok(Watch::from_value(raw, Some(uuid)))
    }

    /// Tell the server the watch has been seen. The server's state is not re-read.
    pub async fn mark_viewed(&self, uuid: &str) -> Result<()> {
        let now = (self.clock)();
        let endpoint = watch_endpoint(uuid)?;

        match self.contract {
            MarkViewedContract::Patch => {
                let body = json!({
                    "last_viewed": now.to_rfc3339_opts(SecondsFormat::Millis, true)
                });
                self.request(Method::Patch, &endpoint, Some(body)).await?;
            }
            MarkViewedContract::FetchThenPut => {
                let current = self.get_watch(uuid).await?;
                let url = current
                    .url
                    .filter(|u| !u.is_empty())
                    .ok_or_else(|| Error::MissingUrl {
                        uuid: uuid.to_string(),
                    })?;
                let body = json!({
                    "url": url,
                    "last_viewed": now.timestamp()
                });
                self.request(Method::Put, &endpoint, Some(body)).await?;
            }
        }

        log::info!("Marked watch {} as viewed", uuid);
        Ok(())
    }
}

/// `/api/v1/watch/{uuid}` with the id percent-encoded as one path segment
fn watch_endpoint(uuid: &str) -> Result<String> {
    let invalid = || Error::InvalidWatchId {
        uuid: uuid.to_string(),
    };
    if uuid.is_empty() || uuid == "." || uuid == ".." {
        return Err(invalid());
    }

    let mut url = Url::parse(ENDPOINT_BASE).map_err(|_| invalid())?;
    url.path_segments_mut().map_err(|_| invalid())?.push(uuid);
    Ok(url.path().to_string())
}
