/// Reusable UI components

use yew::prelude::*;

#[derive(Properties, PartialEq)]
pub struct SpinnerProps {
    #[prop_or_default]
    pub message: Option<String>,
}

#[function_component(Spinner)]
pub fn spinner(props: &SpinnerProps) -> Html {
    html! {
        <div class="loading-state">
            <div class="loading-spinner"></div>
            if let Some(msg) = &props.message {
                <p class="loading-message">{msg}</p>
            }
        </div>
    }
}

#[derive(Properties, PartialEq)]
pub struct ButtonProps {
    pub onclick: Callback<MouseEvent>,
    pub children: Children,
    #[prop_or(false)]
    pub disabled: bool,
    #[prop_or_default]
    pub variant: ButtonVariant,
    #[prop_or_default]
    pub title: Option<String>,
}

#[derive(PartialEq, Clone, Default)]
pub enum ButtonVariant {
    #[default]
    Primary,
    Secondary,
    /// Small square toolbar button
    Icon,
}

#[function_component(Button)]
pub fn button(props: &ButtonProps) -> Html {
    let class = match props.variant {
        ButtonVariant::Primary => "btn btn-primary",
        ButtonVariant::Secondary => "btn btn-secondary",
        ButtonVariant::Icon => "btn btn-icon",
    };

    // type="button" so it never submits an enclosing form
    html! {
        <button
            type="button"
            class={class}
            onclick={props.onclick.clone()}
            disabled={props.disabled}
            title={props.title.clone()}
        >
            {props.children.clone()}
        </button>
    }
}

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum StatusKind {
    Loading,
    Success,
    Error,
}

impl StatusKind {
    fn class(self) -> &'static str {
        match self {
            StatusKind::Loading => "status loading",
            StatusKind::Success => "status success",
            StatusKind::Error => "status error",
        }
    }
}

#[derive(Properties, PartialEq)]
pub struct StatusMessageProps {
    pub kind: StatusKind,
    pub message: String,
}

/// Result line under a form or list
#[function_component(StatusMessage)]
pub fn status_message(props: &StatusMessageProps) -> Html {
    html! {
        <div class={props.kind.class()}>
            <p class="status-message">{&props.message}</p>
        </div>
    }
}
