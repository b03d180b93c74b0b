//! フォームの状態モデル
//!
//! DOMに直接触れず、入力項目をキー・バリューとして保持する。
//! 画面はこのモデルを描画し、下書きの保存・復元もこのモデルに対して行う。

use crate::models::{
    json_value_text, FieldId, FieldKind, FieldValue, PresetResponse, SheetPayload,
    StampKind, StampedTimes, TirePosition, VehicleIdentity,
};
use crate::utils::format::{format_for, Formatted};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct FormModel {
    values: BTreeMap<FieldId, FieldValue>,
    /// 前回値キャプション（"(前回 5.5)"）
    previous: BTreeMap<FieldId, String>,
    times: StampedTimes,
}

impl Default for FormModel {
    fn default() -> Self {
        Self::new()
    }
}

impl FormModel {
    pub fn new() -> Self {
        let values = FieldId::all()
            .into_iter()
            .map(|id| {
                let empty = match id.kind() {
                    FieldKind::Checkbox => FieldValue::Flag(false),
                    _ => FieldValue::Text(String::new()),
                };
                (id, empty)
            })
            .collect();
        Self {
            values,
            previous: BTreeMap::new(),
            times: StampedTimes::default(),
        }
    }

    // --- 読み取り ---

    pub fn value(&self, id: FieldId) -> FieldValue {
        self.values
            .get(&id)
            .cloned()
            .unwrap_or_else(|| FieldValue::Text(String::new()))
    }

    pub fn text(&self, id: FieldId) -> String {
        self.values.get(&id).map(|v| v.as_text().to_string()).unwrap_or_default()
    }

    pub fn checked(&self, id: FieldId) -> bool {
        self.values.get(&id).map(FieldValue::as_flag).unwrap_or(false)
    }

    pub fn station(&self) -> String {
        self.text(FieldId::Station)
    }

    pub fn model(&self) -> String {
        self.text(FieldId::Model)
    }

    pub fn plate_full(&self) -> String {
        self.text(FieldId::PlateFull)
    }

    pub fn times(&self) -> &StampedTimes {
        &self.times
    }

    pub fn time(&self, kind: StampKind) -> &str {
        self.times.get(kind)
    }

    pub fn previous_caption(&self, id: FieldId) -> Option<String> {
        self.previous.get(&id).cloned()
    }

    /// 現在の車両識別（店舗・ナンバーが空なら None）
    pub fn identity(&self) -> Option<VehicleIdentity> {
        VehicleIdentity::from_fields(&self.station(), &self.plate_full(), &self.model())
    }

    // --- 書き込み ---

    /// 整形せずに値を設定（識別項目の復元・URLからの初期値）
    pub fn set_value(&mut self, id: FieldId, value: FieldValue) {
        let value = match (id.kind(), value) {
            (FieldKind::Checkbox, FieldValue::Text(s)) => FieldValue::Flag(!s.is_empty() && s != "false"),
            (FieldKind::Checkbox, v) => v,
            (_, FieldValue::Flag(b)) => FieldValue::Text(if b { "1".to_string() } else { String::new() }),
            (_, v) => v,
        };
        self.values.insert(id, value);
    }

    pub fn set_text(&mut self, id: FieldId, value: &str) {
        self.set_value(id, FieldValue::Text(value.to_string()));
    }

    pub fn set_checked(&mut self, id: FieldId, checked: bool) {
        self.set_value(id, FieldValue::Flag(checked));
    }

    /// ユーザー入力（整形して保存し、自動送りの要否を返す）
    pub fn input(&mut self, id: FieldId, raw: &str) -> Formatted {
        let formatted = format_for(id.kind(), raw);
        self.set_text(id, &formatted.value);
        formatted
    }

    /// 変更通知：現在値に整形を再適用する（復元後の再計算）
    pub fn notify_changed(&mut self, id: FieldId) {
        if id.kind() == FieldKind::Checkbox {
            return;
        }
        let current = self.text(id);
        let formatted = format_for(id.kind(), &current);
        if formatted.value != current {
            self.set_text(id, &formatted.value);
        }
    }

    pub fn set_time(&mut self, kind: StampKind, value: String) {
        self.times.set(kind, value);
    }

    pub fn set_times(&mut self, times: StampedTimes) {
        self.times = times;
    }

    // --- 下書き ---

    /// 全項目のスナップショット（キーは項目名）
    pub fn snapshot_fields(&self) -> BTreeMap<String, FieldValue> {
        self.values.iter().map(|(id, v)| (id.key(), v.clone())).collect()
    }

    // --- GAS ---

    /// 規定空気圧（空欄のみ）と前回値キャプションを反映
    pub fn apply_presets(&mut self, presets: &PresetResponse) {
        for (id, value) in [(FieldId::StdFront, &presets.std_f), (FieldId::StdRear, &presets.std_r)] {
            let Some(text) = value.as_ref().and_then(json_value_text) else {
                continue;
            };
            if self.text(id).is_empty() {
                self.set_text(id, &text);
            }
        }
        if let Some(prev) = &presets.prev {
            for (key, value) in prev {
                let Some(text) = json_value_text(value) else {
                    continue;
                };
                let Some(id) = FieldId::from_key(key) else {
                    continue;
                };
                if matches!(id.kind(), FieldKind::Tread | FieldKind::Pressure | FieldKind::Dot) {
                    self.previous.insert(id, format!("(前回 {})", text));
                }
            }
        }
    }

    pub fn clear_previous(&mut self) {
        self.previous.clear();
    }

    /// 送信ペイロードを組み立てる
    pub fn payload(&self, ts: String) -> SheetPayload {
        let readings = FieldId::reading_order()
            .into_iter()
            .map(|id| (id.key(), self.text(id)))
            .collect();
        SheetPayload {
            station: self.station(),
            model: self.model(),
            plate_full: self.plate_full(),
            std_f: self.text(FieldId::StdFront),
            std_r: self.text(FieldId::StdRear),
            nitrogen: self.checked(FieldId::Nitrogen),
            unlock: self.times.unlock.clone(),
            lock: self.times.lock.clone(),
            readings,
            ts,
        }
    }

    /// 各タイヤの製造番号
    pub fn dot_codes(&self) -> Vec<(TirePosition, String)> {
        TirePosition::ALL
            .into_iter()
            .map(|p| (p, self.text(FieldId::Dot(p))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_form_is_blank() {
        let form = FormModel::new();
        assert!(form.identity().is_none());
        assert_eq!(form.text(FieldId::Tread(TirePosition::Rf)), "");
        assert!(!form.checked(FieldId::Nitrogen));
        assert_eq!(form.time(StampKind::Unlock), "--:--");
    }

    #[test]
    fn test_input_formats_tread() {
        let mut form = FormModel::new();
        let f = form.input(FieldId::Tread(TirePosition::Lf), "55");
        assert!(f.advance);
        assert_eq!(form.text(FieldId::Tread(TirePosition::Lf)), "5.5");
    }

    #[test]
    fn test_notify_changed_reformats() {
        let mut form = FormModel::new();
        form.set_text(FieldId::Dot(TirePosition::Rr), "0125xx9");
        form.notify_changed(FieldId::Dot(TirePosition::Rr));
        assert_eq!(form.text(FieldId::Dot(TirePosition::Rr)), "0125");
    }

    #[test]
    fn test_checkbox_coercion() {
        let mut form = FormModel::new();
        form.set_value(FieldId::Nitrogen, FieldValue::Text("on".to_string()));
        assert!(form.checked(FieldId::Nitrogen));
        form.set_checked(FieldId::Nitrogen, false);
        assert!(!form.checked(FieldId::Nitrogen));
    }

    #[test]
    fn test_apply_presets_fills_only_empty() {
        let mut form = FormModel::new();
        form.set_text(FieldId::StdFront, "240");
        let presets: PresetResponse = serde_json::from_value(serde_json::json!({
            "std_f": 230,
            "std_r": "220",
            "prev": { "tread_rf": "6.0", "pre_lr": 235, "dot_xx": "0123", "unlock_time": "10:00", "tread_lf": "" }
        }))
        .unwrap();
        form.apply_presets(&presets);
        assert_eq!(form.text(FieldId::StdFront), "240");
        assert_eq!(form.text(FieldId::StdRear), "220");
        assert_eq!(
            form.previous_caption(FieldId::Tread(TirePosition::Rf)).as_deref(),
            Some("(前回 6.0)")
        );
        assert_eq!(
            form.previous_caption(FieldId::Pressure(TirePosition::Lr)).as_deref(),
            Some("(前回 235)")
        );
        assert!(form.previous_caption(FieldId::Tread(TirePosition::Lf)).is_none());
    }

    #[test]
    fn test_payload_contains_readings_and_times() {
        let mut form = FormModel::new();
        form.set_text(FieldId::Station, "渋谷店");
        form.set_text(FieldId::PlateFull, "12-34");
        form.input(FieldId::Tread(TirePosition::Rf), "55");
        form.set_time(StampKind::Unlock, "09:05".to_string());
        let payload = form.payload("2025-06-01T09:00:00+09:00".to_string());
        assert_eq!(payload.reading(FieldId::Tread(TirePosition::Rf)), "5.5");
        assert_eq!(payload.unlock, "09:05");
        assert_eq!(payload.lock, "--:--");

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["tread_rf"], "5.5");
        assert_eq!(json["station"], "渋谷店");
        assert_eq!(json["nitrogen"], false);
    }
}
