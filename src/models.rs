//! データ構造体モジュール

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================
// タイヤ位置・入力項目
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TirePosition {
    Rf,
    Lf,
    Lr,
    Rr,
}

impl TirePosition {
    /// 入力・表示順（右前 → 左前 → 左後 → 右後）
    pub const ALL: [TirePosition; 4] = [Self::Rf, Self::Lf, Self::Lr, Self::Rr];

    /// フィールドIDの接尾辞 ("rf" など)
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Rf => "rf",
            Self::Lf => "lf",
            Self::Lr => "lr",
            Self::Rr => "rr",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Rf => "RF",
            Self::Lf => "LF",
            Self::Lr => "LR",
            Self::Rr => "RR",
        }
    }

    pub fn from_suffix(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.suffix() == s)
    }
}

impl fmt::Display for TirePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// フォーム上の入力項目
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldId {
    Station,
    Model,
    PlateFull,
    StdFront,
    StdRear,
    Nitrogen,
    Tread(TirePosition),
    Pressure(TirePosition),
    Dot(TirePosition),
}

/// 入力項目の種類（整形ルールの選択に使う）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Identity,
    Text,
    Checkbox,
    Tread,
    Pressure,
    Dot,
}

impl FieldId {
    /// 全項目（フォーム表示順）
    pub fn all() -> Vec<FieldId> {
        let mut ids = vec![
            Self::Station,
            Self::Model,
            Self::PlateFull,
            Self::StdFront,
            Self::StdRear,
            Self::Nitrogen,
        ];
        ids.extend(Self::reading_order());
        ids
    }

    /// 自動送り順: tread → pre → dot を RF, LF, LR, RR の順に
    pub fn reading_order() -> Vec<FieldId> {
        TirePosition::ALL
            .into_iter()
            .flat_map(|p| [Self::Tread(p), Self::Pressure(p), Self::Dot(p)])
            .collect()
    }

    pub fn key(self) -> String {
        match self {
            Self::Station => "station".to_string(),
            Self::Model => "model".to_string(),
            Self::PlateFull => "plate_full".to_string(),
            Self::StdFront => "std_f".to_string(),
            Self::StdRear => "std_r".to_string(),
            Self::Nitrogen => "nitrogen".to_string(),
            Self::Tread(p) => format!("tread_{}", p.suffix()),
            Self::Pressure(p) => format!("pre_{}", p.suffix()),
            Self::Dot(p) => format!("dot_{}", p.suffix()),
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "station" => return Some(Self::Station),
            "model" => return Some(Self::Model),
            "plate_full" => return Some(Self::PlateFull),
            "std_f" => return Some(Self::StdFront),
            "std_r" => return Some(Self::StdRear),
            "nitrogen" => return Some(Self::Nitrogen),
            _ => {}
        }
        let (field, pos) = key.split_once('_')?;
        let pos = TirePosition::from_suffix(pos)?;
        match field {
            "tread" => Some(Self::Tread(pos)),
            "pre" => Some(Self::Pressure(pos)),
            "dot" => Some(Self::Dot(pos)),
            _ => None,
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Self::Station | Self::Model | Self::PlateFull => FieldKind::Identity,
            Self::StdFront | Self::StdRear => FieldKind::Text,
            Self::Nitrogen => FieldKind::Checkbox,
            Self::Tread(_) => FieldKind::Tread,
            Self::Pressure(_) => FieldKind::Pressure,
            Self::Dot(_) => FieldKind::Dot,
        }
    }

    pub fn is_identity(self) -> bool {
        self.kind() == FieldKind::Identity
    }

    /// 自動送りで次にフォーカスする項目（最後の項目なら None = 送信ボタン）
    pub fn next_in_order(self) -> Option<FieldId> {
        let order = Self::reading_order();
        let idx = order.iter().position(|id| *id == self)?;
        order.get(idx + 1).copied()
    }
}

/// 入力値（テキスト または チェック状態）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> &str {
        match self {
            Self::Text(s) => s,
            Self::Flag(_) => "",
        }
    }

    pub fn as_flag(&self) -> bool {
        matches!(self, Self::Flag(true))
    }
}

// ============================================
// 車両識別・下書き
// ============================================

/// 下書きの区分キー（店舗 + ナンバー + 車種）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VehicleIdentity {
    pub station: String,
    pub plate_full: String,
    #[serde(default)]
    pub model: String,
}

impl VehicleIdentity {
    /// 前後の空白を除去して生成。店舗またはナンバーが空なら None
    pub fn from_fields(station: &str, plate_full: &str, model: &str) -> Option<Self> {
        let station = station.trim();
        let plate_full = plate_full.trim();
        if station.is_empty() || plate_full.is_empty() {
            return None;
        }
        Some(Self {
            station: station.to_string(),
            plate_full: plate_full.to_string(),
            model: model.trim().to_string(),
        })
    }
}

/// 解錠・施錠の記録対象
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampKind {
    Unlock,
    Lock,
}

impl StampKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Unlock => "解錠",
            Self::Lock => "施錠",
        }
    }
}

pub const TIME_SENTINEL: &str = "--:--";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampedTimes {
    pub unlock: String,
    pub lock: String,
}

impl Default for StampedTimes {
    fn default() -> Self {
        Self {
            unlock: TIME_SENTINEL.to_string(),
            lock: TIME_SENTINEL.to_string(),
        }
    }
}

impl StampedTimes {
    pub fn get(&self, kind: StampKind) -> &str {
        match kind {
            StampKind::Unlock => &self.unlock,
            StampKind::Lock => &self.lock,
        }
    }

    pub fn set(&mut self, kind: StampKind, value: String) {
        match kind {
            StampKind::Unlock => self.unlock = value,
            StampKind::Lock => self.lock = value,
        }
    }

    pub fn is_set(&self, kind: StampKind) -> bool {
        is_stamped(self.get(kind))
    }
}

/// "--:--" や空文字でなければ記録済み
pub fn is_stamped(value: &str) -> bool {
    let v = value.trim();
    !v.is_empty() && v != TIME_SENTINEL
}

/// 保存される下書き
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSnapshot {
    #[serde(rename = "v")]
    pub version: u32,
    pub captured_at: i64,
    pub identity: VehicleIdentity,
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub stamped_times: StampedTimes,
}

// ============================================
// 画面・送信データ
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Form,
    Result,
}

/// GASへ送信するペイロード
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetPayload {
    pub station: String,
    pub model: String,
    pub plate_full: String,
    pub std_f: String,
    pub std_r: String,
    pub nitrogen: bool,
    pub unlock: String,
    pub lock: String,
    #[serde(flatten)]
    pub readings: BTreeMap<String, String>,
    /// 送信時刻（JST, RFC 3339）
    pub ts: String,
}

impl SheetPayload {
    pub fn reading(&self, id: FieldId) -> &str {
        self.readings.get(&id.key()).map(String::as_str).unwrap_or("")
    }
}

/// 結果画面の表示内容
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultSummary {
    pub header: String,
    pub unlock: String,
    pub lock: String,
    pub lines: String,
}

/// GASの規定空気圧・前回値レスポンス
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PresetResponse {
    #[serde(default)]
    pub std_f: Option<serde_json::Value>,
    #[serde(default)]
    pub std_r: Option<serde_json::Value>,
    #[serde(default)]
    pub prev: Option<BTreeMap<String, serde_json::Value>>,
}

/// JSONの値を表示用文字列に（null・空は None）
pub fn json_value_text(value: &serde_json::Value) -> Option<String> {
    let text = match value {
        serde_json::Value::Null => return None,
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Bool(false) => return None,
        other => other.to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
