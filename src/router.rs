/// Request/response bridge between the UI pages and the background
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::rc::Rc;

use crate::api::ApiClient;
use crate::badge::BadgeController;
use crate::error::Result;
use crate::reconcile::Reconciler;

pub const ACTION_GET_WATCHES: &str = "getWatches";
pub const ACTION_UPDATE_WATCH_VIEWED: &str = "updateWatchViewed";
pub const ACTION_UPDATE_BADGE: &str = "updateBadge";
pub const ACTION_TEST_CONNECTION: &str = "testConnection";
const LEGACY_ACTION_MARK_AS_READ: &str = "markAsRead";

/// Messages the popup and options pages send
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    GetWatches,
    UpdateWatchViewed { uuid: String },
    UpdateBadge,
    TestConnection,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("Unknown action")]
    UnknownAction,

    #[error("Missing watch uuid")]
    MissingUuid,
}

impl Request {
    pub fn parse(raw: &Value) -> std::result::Result<Request, RouteError> {
        let action = raw
            .get("action")
            .and_then(Value::as_str)
            .ok_or(RouteError::UnknownAction)?;

        match action {
            ACTION_GET_WATCHES => Ok(Request::GetWatches),
            ACTION_UPDATE_WATCH_VIEWED | LEGACY_ACTION_MARK_AS_READ => {
                if action == LEGACY_ACTION_MARK_AS_READ {
                    log::warn!("'{}' is deprecated, use '{}'", action, ACTION_UPDATE_WATCH_VIEWED);
                }
                let uuid = raw
                    .get("uuid")
                    .and_then(Value::as_str)
                    .filter(|u| !u.is_empty())
                    .ok_or(RouteError::MissingUuid)?;
                Ok(Request::UpdateWatchViewed {
                    uuid: uuid.to_string(),
                })
            }
            ACTION_UPDATE_BADGE => Ok(Request::UpdateBadge),
            ACTION_TEST_CONNECTION => Ok(Request::TestConnection),
            _ => Err(RouteError::UnknownAction),
        }
    }
}

/// Envelope every request is answered with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(data: Option<Value>) -> Response {
        Response {
            success: true,
            data,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Response {
        Response {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Used when the other end never answered
    pub fn no_response() -> Response {
        Response::failure("No response from background script")
    }
}

pub struct Router {
    api: Rc<ApiClient>,
    badge: Rc<BadgeController>,
    reconciler: Rc<Reconciler>,
}

impl Router {
    pub fn new(api: Rc<ApiClient>, badge: Rc<BadgeController>, reconciler: Rc<Reconciler>) -> Self {
        Router {
            api,
            badge,
            reconciler,
        }
    }

    /// Always produces an envelope, whatever went wrong
    pub async fn handle(&self, raw: &Value) -> Response {
        let request = match Request::parse(raw) {
            Ok(request) => request,
            Err(e) => {
                log::warn!("Rejected message {}: {}", raw, e);
                return Response::failure(e.to_string());
            }
        };

        match self.dispatch(request).await {
            Ok(data) => Response::ok(data),
            Err(e) => {
                log::error!("Background script error: {}", e);
                Response::failure(e.to_string())
            }
        }
    }

    async fn dispatch(&self, request: Request) -> Result<Option<Value>> {
        match request {
            Request::GetWatches => {
                let watches = self.api.list_watches().await?;
                let classified = self.reconciler.classify(watches);
                Ok(Some(serde_json::to_value(classified)?))
            }
            Request::UpdateWatchViewed { uuid } => {
                self.api.mark_viewed(&uuid).await?;
                self.badge.refresh().await;
                Ok(None)
            }
            Request::UpdateBadge => {
                self.badge.refresh().await;
                Ok(None)
            }
            Request::TestConnection => {
                // The options page saves and tests in one go
                self.api.invalidate();
                self.api.list_watches().await?;
                Ok(None)
            }
        }
    }
}
