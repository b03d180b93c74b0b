//! 入力セッション
//!
//! フォームモデルと下書き・打刻の保存先をまとめて持ち、
//! 画面からの操作（起動、入力、打刻、送信、戻る）を順序どおりに処理する。

use crate::form::FormModel;
use crate::models::{
    FieldId, PresetResponse, ResultSummary, Screen, SheetPayload, StampKind, StampedTimes, TirePosition,
    VehicleIdentity, TIME_SENTINEL,
};
use crate::utils::cache::DraftStore;
use crate::utils::dot_code::{validate_all, ValidationError};
use crate::utils::jst;
use crate::utils::log_trace::{log_info_with_data, log_warn};
use crate::utils::page::QueryPrefill;
use crate::utils::stamp::{StampNote, TimeStampStore};
use crate::utils::storage::{KeyValueStore, WebStorage};
use chrono::{DateTime, Utc};

/// 起動処理の結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupReport {
    pub pruned: usize,
    pub reloaded: bool,
    pub restored: bool,
}

/// 入力1回分の結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputOutcome {
    /// 次の入力欄へ移る
    pub advance: bool,
    /// 車両識別が変わった（規定値の再取得が必要）
    pub identity_changed: bool,
}

pub struct FormSession<L, S> {
    form: FormModel,
    drafts: DraftStore<L, S>,
    times: TimeStampStore<L>,
    identity: Option<VehicleIdentity>,
    screen: Screen,
    result: Option<ResultSummary>,
}

impl FormSession<WebStorage, WebStorage> {
    pub fn browser() -> Self {
        Self::new(WebStorage::local(), WebStorage::session())
    }
}

impl<L: KeyValueStore + Clone, S: KeyValueStore> FormSession<L, S> {
    pub fn new(local: L, session: S) -> Self {
        Self {
            form: FormModel::new(),
            drafts: DraftStore::new(local.clone(), session),
            times: TimeStampStore::new(local),
            identity: None,
            screen: Screen::Form,
            result: None,
        }
    }

    pub fn form(&self) -> &FormModel {
        &self.form
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn result(&self) -> Option<&ResultSummary> {
        self.result.as_ref()
    }

    pub fn identity(&self) -> Option<&VehicleIdentity> {
        self.identity.as_ref()
    }

    /// 起動時の初期化
    ///
    /// 古いエントリの掃除 → URLの初期値 → (リロード時のみ)タブの下書き →
    /// 打刻時刻 → 車両の下書き、の順に行う。
    pub fn startup(&mut self, prefill: &QueryPrefill, is_reload: bool, now: DateTime<Utc>) -> StartupReport {
        let pruned = self.drafts.prune(now);
        prefill.apply(&mut self.form);

        let reloaded = is_reload && self.drafts.restore_after_reload(&mut self.form, now).is_some();

        self.identity = self.form.identity();
        self.times.load_times_for(self.identity.as_ref(), &mut self.form, now);

        let restored = match (&self.identity, reloaded) {
            (Some(identity), false) => self.drafts.restore(identity, &mut self.form, now).is_some(),
            _ => false,
        };

        let report = StartupReport { pruned, reloaded, restored };
        log_info_with_data(
            "startup",
            "起動しました",
            serde_json::json!({
                "pruned": pruned,
                "reload": is_reload,
                "reloaded": reloaded,
                "restored": restored,
                "prefill": !prefill.is_empty(),
            }),
        );
        report
    }

    /// ユーザー入力
    pub fn input(&mut self, id: FieldId, raw: &str, now: DateTime<Utc>) -> InputOutcome {
        let formatted = self.form.input(id, raw);
        let identity_changed = id.is_identity() && self.refresh_identity(now);
        self.save(now);
        InputOutcome {
            advance: formatted.advance,
            identity_changed,
        }
    }

    pub fn set_checked(&mut self, id: FieldId, checked: bool, now: DateTime<Utc>) {
        self.form.set_checked(id, checked);
        self.save(now);
    }

    /// 解錠・施錠の打刻
    pub fn stamp(&mut self, kind: StampKind, now: DateTime<Utc>) -> StampNote {
        let note = self.times.stamp(kind, self.identity.as_ref(), &mut self.form, now);
        self.save(now);
        note
    }

    /// 打刻時刻を取り消して記録も消す
    pub fn reset_times(&mut self, now: DateTime<Utc>) {
        if let Some(identity) = &self.identity {
            self.times.clear(identity);
        }
        self.form.set_times(StampedTimes::default());
        self.save(now);
    }

    /// ページを離れる直前の保存（pagehide / 非表示）
    pub fn persist(&self, now: DateTime<Utc>) {
        self.save(now);
    }

    pub fn apply_presets(&mut self, presets: &PresetResponse) {
        self.form.apply_presets(presets);
    }

    /// 送信：検証 → ペイロード作成 → 結果画面 → 下書き削除
    pub fn submit(&mut self, now: DateTime<Utc>) -> Result<SheetPayload, ValidationError> {
        let codes = self.form.dot_codes();
        if let Err(e) = validate_all(codes.iter().map(|(p, c)| (*p, c.as_str())), jst::today(now)) {
            log_warn("validation", &e.to_string());
            return Err(e);
        }

        let payload = self.form.payload(jst::format_rfc3339(now));
        self.result = Some(result_summary(&payload, now));
        self.screen = Screen::Result;
        if let Some(identity) = &self.identity {
            self.drafts.clear(identity);
        }
        Ok(payload)
    }

    /// 結果画面からフォームへ戻る（入力値はそのまま）
    pub fn back(&mut self) {
        self.screen = Screen::Form;
    }

    /// 識別が変わっていれば時刻と下書きを切り替える
    fn refresh_identity(&mut self, now: DateTime<Utc>) -> bool {
        let next = self.form.identity();
        if next == self.identity {
            return false;
        }
        let was_unset = self.identity.is_none();
        self.identity = next;
        self.form.clear_previous();

        let Some(identity) = self.identity.clone() else {
            self.times.load_times_for(None, &mut self.form, now);
            return true;
        };
        // 識別が決まる前に打刻していた場合はその時刻を引き継ぐ
        if !(was_unset && self.times.adopt(&identity, &self.form, now)) {
            self.times.load_times_for(Some(&identity), &mut self.form, now);
        }
        self.drafts.restore(&identity, &mut self.form, now);
        true
    }

    fn save(&self, now: DateTime<Utc>) {
        // 送信後の結果画面では保存しない（削除した下書きを書き戻さない）
        if self.screen == Screen::Result {
            return;
        }
        self.drafts.save(self.identity.as_ref(), &self.form, now);
    }
}

/// 結果画面の内容を組み立てる
pub fn result_summary(payload: &SheetPayload, now: DateTime<Utc>) -> ResultSummary {
    let mut header = String::new();
    if !payload.station.is_empty() {
        header.push_str(&payload.station);
        header.push('\n');
    }
    header.push_str(&payload.plate_full);
    header.push('\n');
    header.push_str(&payload.model);

    let mut lines: Vec<String> = TirePosition::ALL
        .into_iter()
        .map(|pos| {
            let std = if pos == TirePosition::Rf && !payload.std_f.is_empty() && !payload.std_r.is_empty() {
                format!("    {}-{}", payload.std_f, payload.std_r)
            } else {
                String::new()
            };
            format!(
                "{} {} {}{}   {}",
                payload.reading(FieldId::Tread(pos)),
                payload.reading(FieldId::Pressure(pos)),
                payload.reading(FieldId::Dot(pos)),
                std,
                pos.label(),
            )
        })
        .collect();
    lines.push(String::new());
    lines.push(jst::format_md_hm(now));

    let or_sentinel = |s: &str| if s.is_empty() { TIME_SENTINEL.to_string() } else { s.to_string() };
    ResultSummary {
        header,
        unlock: or_sentinel(&payload.unlock),
        lock: or_sentinel(&payload.lock),
        lines: lines.join("\n"),
    }
}
