//! タイヤごとの入力行（溝・空気圧・製造番号）

use crate::models::{FieldId, FieldKind, TirePosition};
use crate::FormContext;
use chrono::Utc;
use leptos::*;

fn placeholder(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Tread => "溝 mm",
        FieldKind::Pressure => "空気圧",
        FieldKind::Dot => "製造 WWYY",
        _ => "",
    }
}

/// 整形・自動送り付きの入力欄
#[component]
pub fn ReadingInput(field: FieldId) -> impl IntoView {
    let ctx = use_context::<FormContext>().expect("FormContext not found");
    let session = ctx.session;

    let on_input = move |ev: web_sys::Event| {
        let raw = event_target_value(&ev);
        let outcome = session
            .try_update(|s| s.input(field, &raw, Utc::now()))
            .unwrap_or_default();
        if outcome.advance {
            ctx.advance_from(field);
        }
    };

    view! {
        <div class="reading-cell">
            <input
                type="text"
                inputmode="numeric"
                autocomplete="off"
                id=field.key()
                name=field.key()
                placeholder=placeholder(field.kind())
                prop:value=move || session.with(|s| s.form().text(field))
                on:input=on_input
            />
            <span class="prev-caption">
                {move || session.with(|s| s.form().previous_caption(field))}
            </span>
        </div>
    }
}

#[component]
pub fn TireRow(position: TirePosition) -> impl IntoView {
    view! {
        <div class="tire-row">
            <span class="pos-label">{position.label()}</span>
            <ReadingInput field=FieldId::Tread(position) />
            <ReadingInput field=FieldId::Pressure(position) />
            <ReadingInput field=FieldId::Dot(position) />
        </div>
    }
}
