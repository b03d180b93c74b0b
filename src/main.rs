use leptos::*;
use chrono::Utc;
use gloo::timers::callback::Timeout;
use gloo::timers::future::TimeoutFuture;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

mod components;
mod form;
mod models;
mod session;
mod utils;
mod views;

use components::Toast;
use models::{FieldId, Screen};
use session::FormSession;
use utils::gas::{fetch_presets, init_gas_from_url_params, SheetsConfig};
use utils::log_trace::{log_info, log_info_with_data, log_warn};
use utils::page::{is_reload_navigation, QueryPrefill};
use utils::storage::WebStorage;
use views::{EntryForm, ResultView};

/// 識別入力から規定値取得までの待ち時間
const PRESET_DEBOUNCE_MS: u32 = 350;
const TOAST_MS: u32 = 1400;
const SUBMIT_RING_MS: u32 = 1200;

pub const SUBMIT_BUTTON_ID: &str = "submitBtn";

// ============================================
// 画面全体で共有する状態
// ============================================

#[derive(Clone, Copy)]
pub struct FormContext {
    pub session: RwSignal<FormSession<WebStorage, WebStorage>>,
    /// (通し番号, 文言)
    pub toast: RwSignal<Option<(u32, String)>>,
    /// 最後の項目から送信ボタンへ移ったときの強調表示
    pub submit_ring: RwSignal<bool>,
    preset_timer: StoredValue<Option<Timeout>>,
}

impl FormContext {
    fn new(session: FormSession<WebStorage, WebStorage>) -> Self {
        Self {
            session: create_rw_signal(session),
            toast: create_rw_signal(None),
            submit_ring: create_rw_signal(false),
            preset_timer: store_value(None),
        }
    }

    pub fn show_toast(&self, message: &str) {
        let seq = self
            .toast
            .with_untracked(|t| t.as_ref().map(|(n, _)| n.wrapping_add(1)).unwrap_or(0));
        self.toast.set(Some((seq, message.to_string())));
        let toast = self.toast;
        spawn_local(async move {
            TimeoutFuture::new(TOAST_MS).await;
            toast.update(|t| {
                if t.as_ref().map(|(n, _)| *n) == Some(seq) {
                    *t = None;
                }
            });
        });
    }

    /// 自動送り：次の入力欄、最後なら送信ボタンへ
    pub fn advance_from(&self, id: FieldId) {
        match id.next_in_order() {
            Some(next) => focus_element(&next.key()),
            None => {
                focus_element(SUBMIT_BUTTON_ID);
                self.submit_ring.set(true);
                let ring = self.submit_ring;
                spawn_local(async move {
                    TimeoutFuture::new(SUBMIT_RING_MS).await;
                    ring.set(false);
                });
            }
        }
    }

    /// 規定値の取得を予約（前の予約は取り消す）
    pub fn schedule_presets(&self) {
        let ctx = *self;
        let timeout = Timeout::new(PRESET_DEBOUNCE_MS, move || spawn_local(ctx.refresh_presets()));
        self.preset_timer.update_value(|t| *t = Some(timeout));
    }

    async fn refresh_presets(self) {
        let (station, model, plate_full) = self.session.with_untracked(|s| {
            let form = s.form();
            (
                form.station().trim().to_string(),
                form.model().trim().to_string(),
                form.plate_full().trim().to_string(),
            )
        });
        if station.is_empty() && model.is_empty() && plate_full.is_empty() {
            return;
        }
        let config = SheetsConfig::current();
        match fetch_presets(&config, &station, &model, &plate_full).await {
            Ok(presets) => {
                log_info("gas-fetch", &format!("規定値を取得しました: {}", plate_full));
                self.session.update(|s| s.apply_presets(&presets));
            }
            Err(e) => log_warn("gas-fetch", &e.to_string()),
        }
    }
}

fn focus_element(id: &str) {
    if let Some(el) = document()
        .get_element_by_id(id)
        .and_then(|e| e.dyn_into::<web_sys::HtmlElement>().ok())
    {
        let _ = el.focus();
    }
}

pub fn scroll_to_top() {
    if let Some(window) = web_sys::window() {
        window.scroll_to_with_x_and_y(0.0, 0.0);
    }
}

/// ページを離れる・隠れるときに下書きを保存
fn install_persist_listeners(session: RwSignal<FormSession<WebStorage, WebStorage>>) {
    let Some(window) = web_sys::window() else {
        return;
    };

    let on_pagehide = Closure::wrap(Box::new(move |_: web_sys::Event| {
        session.with_untracked(|s| s.persist(Utc::now()));
    }) as Box<dyn FnMut(_)>);
    let _ = window.add_event_listener_with_callback("pagehide", on_pagehide.as_ref().unchecked_ref());
    on_pagehide.forget();

    let Some(document) = window.document() else {
        return;
    };
    let doc = document.clone();
    let on_visibility = Closure::wrap(Box::new(move |_: web_sys::Event| {
        if doc.visibility_state() == web_sys::VisibilityState::Hidden {
            session.with_untracked(|s| s.persist(Utc::now()));
        }
    }) as Box<dyn FnMut(_)>);
    let _ = document.add_event_listener_with_callback("visibilitychange", on_visibility.as_ref().unchecked_ref());
    on_visibility.forget();
}

// ============================================
// メインアプリ
// ============================================

#[component]
fn App() -> impl IntoView {
    if let Some(url) = init_gas_from_url_params() {
        log_info_with_data("startup", "送信先を設定しました", serde_json::json!({ "gas": url }));
    }

    if !WebStorage::local().is_available() {
        log_warn("startup", "localStorageが使えないため下書きは保存されません");
    }
    let mut session = FormSession::browser();
    session.startup(&QueryPrefill::current(), is_reload_navigation(), Utc::now());

    let ctx = FormContext::new(session);
    provide_context(ctx);
    install_persist_listeners(ctx.session);
    spawn_local(ctx.refresh_presets());

    // 入力のたびに画面全体を作り直さない
    let screen = create_memo(move |_| ctx.session.with(|s| s.screen()));

    view! {
        <div class="app">
            <header class="app-header">
                <h1>"タイヤ点検"</h1>
            </header>

            <main class="container">
                {move || match screen.get() {
                    Screen::Form => view! { <EntryForm /> }.into_view(),
                    Screen::Result => view! { <ResultView /> }.into_view(),
                }}
            </main>

            <Toast />
        </div>
    }
}

fn main() {
    console_error_panic_hook::set_once();
    mount_to_body(App);
}
