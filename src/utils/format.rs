//! 入力値の整形と自動送り判定

use crate::models::FieldKind;

/// 整形結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formatted {
    pub value: String,
    /// 次の入力欄へフォーカスを送るか
    pub advance: bool,
}

impl Formatted {
    fn stay(value: String) -> Self {
        Self { value, advance: false }
    }
}

fn digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// 溝深さ: "55" → "5.5"（2桁そろったら送る）
pub fn format_tread(raw: &str) -> Formatted {
    let v = digits(raw);
    let mut chars = v.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(a), Some(b), None) => Formatted {
            value: format!("{}.{}", a, b),
            advance: true,
        },
        _ => Formatted::stay(v),
    }
}

/// 空気圧: 3桁以上で送る
pub fn format_pressure(raw: &str) -> Formatted {
    let value = digits(raw);
    let advance = value.len() >= 3;
    Formatted { value, advance }
}

/// 製造番号: 4桁固定
pub fn format_dot(raw: &str) -> Formatted {
    let value: String = digits(raw).chars().take(4).collect();
    let advance = value.len() == 4;
    Formatted { value, advance }
}

/// 項目の種類に応じて整形（整形しない項目はそのまま）
pub fn format_for(kind: FieldKind, raw: &str) -> Formatted {
    match kind {
        FieldKind::Tread => format_tread(raw),
        FieldKind::Pressure => format_pressure(raw),
        FieldKind::Dot => format_dot(raw),
        FieldKind::Identity | FieldKind::Text | FieldKind::Checkbox => Formatted::stay(raw.to_string()),
    }
}
