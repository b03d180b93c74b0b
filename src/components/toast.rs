use crate::FormContext;
use leptos::*;

/// 画面下部の一時メッセージ
#[component]
pub fn Toast() -> impl IntoView {
    let ctx = use_context::<FormContext>().expect("FormContext not found");
    let toast = ctx.toast;

    view! {
        {move || toast.get().map(|(_, message)| view! {
            <div class="toast">{message}</div>
        })}
    }
}
