//! 送信後の結果画面

use crate::FormContext;
use leptos::*;

#[component]
pub fn ResultView() -> impl IntoView {
    let ctx = use_context::<FormContext>().expect("FormContext not found");
    let session = ctx.session;
    let result = move || session.with(|s| s.result().cloned()).unwrap_or_default();

    let on_back = move |_| {
        session.update(|s| s.back());
        crate::scroll_to_top();
    };

    view! {
        <div class="result-card">
            <pre class="res-header">{move || result().header}</pre>
            <div class="res-times">
                <div>"解錠　" {move || result().unlock}</div>
                <div>"施錠　" {move || result().lock}</div>
            </div>
            <pre class="res-lines">{move || result().lines}</pre>
            <button type="button" class="back-btn" on:click=on_back>"戻る"</button>
        </div>
    }
}
