/// Popup: the watch list behind the toolbar button

use chrono::{DateTime, Utc};
use patternfly_yew::prelude::{Alert, AlertType};
use serde_json::Value;
use std::rc::Rc;
use wasm_bindgen_futures::spawn_local;
use yew::prelude::*;

use crate::extension::{ChromeSettings, open_options_page, open_tab, send_request};
use crate::operations::{mark_all_viewed, mark_locally, unread_uuids};
use crate::reconcile::ClassifiedWatch;
use crate::router::Request;
use crate::storage::SettingsStore;
use crate::ui::components::{Button, ButtonVariant, Spinner, StatusKind, StatusMessage};
use crate::watch::format_age;

const MARK_ALL_LABEL: &str = "✓ Mark all as watched";

#[derive(Clone, PartialEq)]
enum PopupState {
    Loading,
    NotConfigured,
    Error(String),
    Ready,
}

/// Watches shown in the popup; every update applies to the current list
#[derive(Debug, Clone, Default, PartialEq)]
struct WatchList(Vec<ClassifiedWatch>);

enum WatchAction {
    Loaded(Vec<ClassifiedWatch>),
    Viewed { uuids: Vec<String>, at: DateTime<Utc> },
}

impl Reducible for WatchList {
    type Action = WatchAction;

    fn reduce(self: Rc<Self>, action: WatchAction) -> Rc<Self> {
        match action {
            WatchAction::Loaded(list) => Rc::new(WatchList(list)),
            WatchAction::Viewed { uuids, at } => Rc::new(WatchList(mark_locally(&self.0, &uuids, at))),
        }
    }
}

async fn fetch_watches() -> Result<Vec<ClassifiedWatch>, String> {
    let response = send_request(&Request::GetWatches).await;
    if !response.success {
        return Err(response
            .error
            .unwrap_or_else(|| "Failed to load watches".to_string()));
    }

    let data = response.data.unwrap_or_else(|| Value::Array(Vec::new()));
    serde_json::from_value(data).map_err(|e| e.to_string())
}

async fn mark_viewed(uuid: String) -> Result<(), String> {
    let response = send_request(&Request::UpdateWatchViewed { uuid }).await;
    if response.success {
        Ok(())
    } else {
        Err(response.error.unwrap_or_default())
    }
}

#[function_component(App)]
pub fn app() -> Html {
    let state = use_state(|| PopupState::Loading);
    let watches = use_reducer(WatchList::default);
    let mark_all_label = use_state(|| MARK_ALL_LABEL.to_string());
    let marking_all = use_state(|| false);

    let load = {
        let state = state.clone();
        let watches = watches.dispatcher();
        Callback::from(move |_: ()| {
            let state = state.clone();
            let watches = watches.clone();
            state.set(PopupState::Loading);
            spawn_local(async move {
                if !ChromeSettings.credentials().await.is_usable() {
                    state.set(PopupState::NotConfigured);
                    return;
                }

                match fetch_watches().await {
                    Ok(list) => {
                        watches.dispatch(WatchAction::Loaded(list));
                        state.set(PopupState::Ready);
                    }
                    Err(e) => {
                        log::error!("Error loading watches: {}", e);
                        state.set(PopupState::Error(e));
                    }
                }
            });
        })
    };

    // Load on mount
    {
        let load = load.clone();
        use_effect_with((), move |_| {
            load.emit(());
            || ()
        });
    }

    let on_refresh = {
        let load = load.clone();
        Callback::from(move |_: MouseEvent| load.emit(()))
    };

    let on_settings = Callback::from(|_: MouseEvent| open_options_page());

    let on_mark_all = {
        let watches = watches.clone();
        let label = mark_all_label.clone();
        let busy = marking_all.clone();
        Callback::from(move |_: MouseEvent| {
            let uuids = unread_uuids(&watches.0);
            let dispatcher = watches.dispatcher();
            let label = label.clone();
            let busy = busy.clone();
            busy.set(true);
            label.set("...".to_string());
            spawn_local(async move {
                let summary = mark_all_viewed(&uuids, mark_viewed).await;
                if summary.succeeded() > 0 {
                    dispatcher.dispatch(WatchAction::Viewed {
                        uuids: summary.marked.clone(),
                        at: Utc::now(),
                    });
                }
                label.set(summary.label());
                busy.set(false);
            });
        })
    };

    let on_watch_click = |uuid: Option<String>, url: Option<String>| {
        let watches = watches.dispatcher();
        Callback::from(move |e: MouseEvent| {
            e.prevent_default();
            let watches = watches.clone();
            let uuid = uuid.clone();
            let url = url.clone();
            spawn_local(async move {
                if let Some(url) = url {
                    if let Err(e) = open_tab(&url).await {
                        log::error!("Error opening watch: {}", e);
                    }
                }

                let Some(uuid) = uuid else {
                    return;
                };
                match mark_viewed(uuid.clone()).await {
                    Ok(()) => watches.dispatch(WatchAction::Viewed {
                        uuids: vec![uuid],
                        at: Utc::now(),
                    }),
                    Err(e) => log::error!("Error marking watch as viewed: {}", e),
                }
            });
        })
    };

    let now = Utc::now();
    let has_unread = watches.0.iter().any(|w| w.unread);

    let body = match &*state {
        PopupState::Loading => html! {
            <Spinner message={Some("Loading watches...".to_string())} />
        },
        PopupState::NotConfigured => html! {
            <div class="no-config-state">
                <Alert
                    r#type={AlertType::Warning}
                    title={"Please configure your changedetection.io server URL and API key.".to_string()}
                    inline={true}
                ></Alert>
                <Button onclick={on_settings.clone()}>{"Configure"}</Button>
            </div>
        },
        PopupState::Error(message) => html! {
            <div class="error-state">
                <StatusMessage kind={StatusKind::Error} message={message.clone()} />
                <Button onclick={on_refresh.clone()} variant={ButtonVariant::Secondary}>{"Retry"}</Button>
            </div>
        },
        PopupState::Ready if watches.0.is_empty() => html! {
            <div class="empty-state">
                <p>{"No watches found. Create some watches on your changedetection.io server."}</p>
            </div>
        },
        PopupState::Ready => html! {
            <div class="watches-list">
                { for watches.0.iter().map(|w| {
                    let status = if w.unread { "Unread" } else { "Read" };
                    html! {
                        <a
                            class={classes!("watch-item", w.unread.then_some("unread"))}
                            href="#"
                            onclick={on_watch_click(w.watch.uuid.clone(), w.watch.url.clone())}
                        >
                            <div class="watch-title">{w.watch.display_title()}</div>
                            <div class="watch-url">{w.watch.url.clone().unwrap_or_default()}</div>
                            <div class="watch-status">
                                {format!(
                                    "{} • Last changed: {}",
                                    status,
                                    format_age(w.watch.last_changed.as_ref(), now)
                                )}
                            </div>
                        </a>
                    }
                }) }
            </div>
        },
    };

    html! {
        <div class="popup">
            <header class="popup-header">
                <h1>{"ChangeDetection.io"}</h1>
                <div class="header-actions">
                    <Button
                        onclick={on_mark_all}
                        disabled={*marking_all || !has_unread}
                        variant={ButtonVariant::Secondary}
                    >
                        {(*mark_all_label).clone()}
                    </Button>
                    <Button onclick={on_refresh} variant={ButtonVariant::Icon} title={Some("Refresh".to_string())}>
                        {"↻"}
                    </Button>
                    <Button onclick={on_settings} variant={ButtonVariant::Icon} title={Some("Settings".to_string())}>
                        {"⚙"}
                    </Button>
                </div>
            </header>
            {body}
        </div>
    }
}
