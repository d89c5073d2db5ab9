/// Options page: server credentials and refresh intervals

use wasm_bindgen_futures::spawn_local;
use web_sys::HtmlInputElement;
use yew::prelude::*;

use crate::extension::{ChromeSettings, send_request};
use crate::router::Request;
use crate::storage::{DEFAULT_INITIAL_MINUTES, DEFAULT_REGULAR_MINUTES, FormError, SettingsForm, SettingsStore};
use crate::ui::components::{Button, ButtonVariant, StatusKind, StatusMessage};

type Status = Option<(StatusKind, String)>;

#[function_component(OptionsPage)]
pub fn options_page() -> Html {
    let form = use_state(SettingsForm::default);
    let status = use_state(|| None::<(StatusKind, String)>);
    let testing = use_state(|| false);

    {
        let form = form.clone();
        use_effect_with((), move |_| {
            spawn_local(async move {
                let stored = ChromeSettings.load().await;
                form.set(SettingsForm::from_stored(&stored));
            });
            || ()
        });
    }

    let field = |update: fn(&mut SettingsForm, String)| {
        let form = form.clone();
        let status = status.clone();
        Callback::from(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            let mut next = (*form).clone();
            update(&mut next, input.value());
            form.set(next);
            status.set(None);
        })
    };

    let on_submit = {
        let form = form.clone();
        let status = status.clone();
        Callback::from(move |e: SubmitEvent| {
            e.prevent_default();
            let stored = match form.validate() {
                Ok(stored) => stored,
                Err(err) => {
                    status.set(Some((StatusKind::Error, err.to_string())));
                    return;
                }
            };

            let status = status.clone();
            spawn_local(async move {
                let outcome: Status = match ChromeSettings.save(&stored).await {
                    Ok(()) => {
                        let response = send_request(&Request::UpdateBadge).await;
                        if !response.success {
                            log::warn!("Badge refresh after save failed: {:?}", response.error);
                        }
                        Some((StatusKind::Success, "Settings saved successfully!".to_string()))
                    }
                    Err(e) => {
                        log::error!("Error saving settings: {}", e);
                        Some((
                            StatusKind::Error,
                            "Failed to save settings. Please try again.".to_string(),
                        ))
                    }
                };
                status.set(outcome);
            });
        })
    };

    let on_test = {
        let form = form.clone();
        let status = status.clone();
        let testing = testing.clone();
        Callback::from(move |_: MouseEvent| {
            let credentials = match form.validate_credentials() {
                Ok(credentials) => credentials,
                Err(FormError::MissingField) => {
                    status.set(Some((
                        StatusKind::Error,
                        "Please fill in both Server URL and API Key before testing.".to_string(),
                    )));
                    return;
                }
                Err(err) => {
                    status.set(Some((StatusKind::Error, err.to_string())));
                    return;
                }
            };

            let status = status.clone();
            let testing = testing.clone();
            testing.set(true);
            status.set(Some((StatusKind::Loading, "Testing connection...".to_string())));
            spawn_local(async move {
                let outcome = match ChromeSettings.set_credentials(&credentials).await {
                    Err(e) => (StatusKind::Error, format!("Connection failed: {}", e)),
                    Ok(()) => {
                        let response = send_request(&Request::TestConnection).await;
                        if response.success {
                            (
                                StatusKind::Success,
                                "Connection successful! API is working correctly.".to_string(),
                            )
                        } else {
                            (
                                StatusKind::Error,
                                format!("Connection failed: {}", response.error.unwrap_or_default()),
                            )
                        }
                    }
                };
                status.set(Some(outcome));
                testing.set(false);
            });
        })
    };

    html! {
        <div class="options">
            <h1>{"ChangeDetection.io Settings"}</h1>
            <form class="settings-form" onsubmit={on_submit}>
                <div class="form-group">
                    <label for="baseURL">{"Server URL"}</label>
                    <input
                        id="baseURL"
                        type="url"
                        placeholder="https://changedetection.example.com"
                        value={form.base_url.clone()}
                        oninput={field(|f, v| f.base_url = v)}
                    />
                </div>
                <div class="form-group">
                    <label for="apiKey">{"API Key"}</label>
                    <input
                        id="apiKey"
                        type="password"
                        value={form.api_key.clone()}
                        oninput={field(|f, v| f.api_key = v)}
                    />
                </div>
                <div class="form-group">
                    <label for="refreshIntervalInitial">{"Refresh interval for the first hour (minutes)"}</label>
                    <input
                        id="refreshIntervalInitial"
                        type="number"
                        min="1"
                        placeholder={DEFAULT_INITIAL_MINUTES.to_string()}
                        value={form.refresh_interval_initial.clone()}
                        oninput={field(|f, v| f.refresh_interval_initial = v)}
                    />
                </div>
                <div class="form-group">
                    <label for="refreshIntervalRegular">{"Refresh interval afterwards (minutes)"}</label>
                    <input
                        id="refreshIntervalRegular"
                        type="number"
                        min="1"
                        placeholder={DEFAULT_REGULAR_MINUTES.to_string()}
                        value={form.refresh_interval_regular.clone()}
                        oninput={field(|f, v| f.refresh_interval_regular = v)}
                    />
                </div>
                <div class="form-actions">
                    <button type="submit" class="btn btn-primary">{"Save Settings"}</button>
                    <Button onclick={on_test} disabled={*testing} variant={ButtonVariant::Secondary}>
                        {"Test Connection"}
                    </Button>
                </div>
            </form>
            if let Some((kind, message)) = (*status).clone() {
                <StatusMessage kind={kind} message={message} />
            }
        </div>
    }
}
