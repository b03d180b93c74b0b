//! 解錠・施錠の打刻ボタン

use crate::models::StampKind;
use crate::FormContext;
use chrono::Utc;
use gloo::timers::future::TimeoutFuture;
use leptos::*;

/// 打刻後の文言を表示しておく時間
const NOTE_MS: u32 = 1200;

#[component]
fn StampButton(kind: StampKind) -> impl IntoView {
    let ctx = use_context::<FormContext>().expect("FormContext not found");
    let session = ctx.session;
    let (note, set_note) = create_signal(None::<String>);

    let on_click = move |_| {
        let Some(stamped) = session.try_update(|s| s.stamp(kind, Utc::now())) else {
            return;
        };
        let shown = stamped.note.clone();
        set_note.set(Some(stamped.note));
        spawn_local(async move {
            TimeoutFuture::new(NOTE_MS).await;
            // 連打されたときは新しい文言を消さない
            set_note.update(|n| {
                if n.as_deref() == Some(shown.as_str()) {
                    *n = None;
                }
            });
        });
    };

    view! {
        <div class="stamp-item">
            <button type="button" class="stamp-btn" on:click=on_click>
                {kind.label()}
            </button>
            <span class="stamp-time">
                {move || session.with(|s| s.form().time(kind).to_string())}
            </span>
            <span class="stamp-note">{move || note.get().unwrap_or_default()}</span>
        </div>
    }
}

#[component]
pub fn StampPanel() -> impl IntoView {
    let ctx = use_context::<FormContext>().expect("FormContext not found");

    view! {
        <div class="stamp-panel">
            <StampButton kind=StampKind::Unlock />
            <StampButton kind=StampKind::Lock />
            <button type="button" class="stamp-reset" on:click=move |_| {
                ctx.session.update(|s| s.reset_times(Utc::now()));
            }>"時刻クリア"</button>
        </div>
    }
}
