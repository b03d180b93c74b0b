//! 点検入力画面

use crate::components::{StampPanel, TireRow};
use crate::models::{FieldId, TirePosition};
use crate::utils::gas::{clear_gas_url, get_gas_url, post_reading, save_gas_url, SheetsConfig};
use crate::utils::log_trace::{clear_logs, download_logs, log_error, log_info};
use crate::utils::storage::WebStorage;
use crate::{FormContext, SUBMIT_BUTTON_ID};
use chrono::Utc;
use leptos::*;

/// 識別・規定空気圧などの整形しないテキスト欄
#[component]
fn TextField(field: FieldId, label: &'static str) -> impl IntoView {
    let ctx = use_context::<FormContext>().expect("FormContext not found");
    let session = ctx.session;

    let on_input = move |ev: web_sys::Event| {
        let raw = event_target_value(&ev);
        session.update(|s| {
            s.input(field, &raw, Utc::now());
        });
        // 識別の入力が落ち着いてから規定値を取りに行く
        if field.is_identity() {
            ctx.schedule_presets();
        }
    };

    view! {
        <label class="field">
            <span class="field-label">{label}</span>
            <input
                type="text"
                id=field.key()
                name=field.key()
                prop:value=move || session.with(|s| s.form().text(field))
                on:input=on_input
            />
        </label>
    }
}

/// 送信先（GAS URL）の設定
#[component]
fn GasSettings() -> impl IntoView {
    let ctx = use_context::<FormContext>().expect("FormContext not found");
    let (url, set_url) = create_signal(get_gas_url(&WebStorage::local()).unwrap_or_default());

    let on_save = move |_| {
        let value = url.get();
        if value.trim().is_empty() {
            clear_gas_url(&WebStorage::local());
            ctx.show_toast("送信先をクリアしました");
        } else {
            save_gas_url(&WebStorage::local(), &value);
            ctx.show_toast("送信先を保存しました");
        }
    };

    view! {
        <details class="gas-settings">
            <summary>"送信先"</summary>
            <div class="input-group">
                <input type="url" placeholder="https://script.google.com/macros/s/.../exec"
                    prop:value=move || url.get()
                    on:input=move |ev| set_url.set(event_target_value(&ev)) />
                <button type="button" on:click=on_save>"保存"</button>
            </div>
        </details>
    }
}

#[component]
pub fn EntryForm() -> impl IntoView {
    let ctx = use_context::<FormContext>().expect("FormContext not found");
    let session = ctx.session;

    let on_submit = move |ev: ev::SubmitEvent| {
        ev.prevent_default();
        let Some(submitted) = session.try_update(|s| s.submit(Utc::now())) else {
            return;
        };
        let payload = match submitted {
            Ok(payload) => payload,
            Err(e) => {
                ctx.show_toast(&e.to_string());
                return;
            }
        };
        crate::scroll_to_top();
        spawn_local(async move {
            let config = SheetsConfig::current();
            match post_reading(&config, &payload).await {
                Ok(()) => {
                    log_info("gas-post", &format!("送信しました: {}", payload.plate_full));
                    ctx.show_toast("送信しました");
                }
                Err(e) => {
                    log_error("gas-post", &e.to_string());
                    ctx.show_toast(e.toast_message());
                }
            }
        });
    };

    view! {
        <form class="entry-form" on:submit=on_submit autocomplete="off">
            <section class="identity-section">
                <TextField field=FieldId::Station label="店舗" />
                <TextField field=FieldId::Model label="車種" />
                <TextField field=FieldId::PlateFull label="ナンバー" />
            </section>

            <StampPanel />

            <section class="std-section">
                <TextField field=FieldId::StdFront label="規定 前" />
                <TextField field=FieldId::StdRear label="規定 後" />
                <label class="checkbox-label">
                    <input type="checkbox" name="nitrogen"
                        prop:checked=move || session.with(|s| s.form().checked(FieldId::Nitrogen))
                        on:change=move |ev| {
                            let checked = event_target_checked(&ev);
                            session.update(|s| s.set_checked(FieldId::Nitrogen, checked, Utc::now()));
                        }
                    />
                    " 窒素"
                </label>
            </section>

            <section class="tire-section">
                {TirePosition::ALL.into_iter().map(|position| view! {
                    <TireRow position=position />
                }).collect_view()}
            </section>

            <button
                type="submit"
                id=SUBMIT_BUTTON_ID
                class=move || if ctx.submit_ring.get() { "submit-btn focus-ring" } else { "submit-btn" }
            >
                "送信"
            </button>

            <footer class="form-footer">
                <GasSettings />
                <div class="log-actions">
                    <button type="button" on:click=move |_| download_logs()>"ログ保存"</button>
                    <button type="button" on:click=move |_| {
                        clear_logs();
                        ctx.show_toast("ログを消去しました");
                    }>"ログ消去"</button>
                </div>
            </footer>
        </form>
    }
}
