//! 日本時間 (JST, UTC+9) の時刻ヘルパー

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, TimeZone, Utc};

const JST_OFFSET_SECS: i32 = 9 * 3600;

pub fn jst() -> FixedOffset {
    FixedOffset::east_opt(JST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

pub fn to_jst(now: DateTime<Utc>) -> DateTime<FixedOffset> {
    now.with_timezone(&jst())
}

/// 打刻用 "HH:MM"
pub fn format_hm(now: DateTime<Utc>) -> String {
    to_jst(now).format("%H:%M").to_string()
}

/// 結果画面用 "MM/DD HH:MM"
pub fn format_md_hm(now: DateTime<Utc>) -> String {
    to_jst(now).format("%m/%d %H:%M").to_string()
}

/// 送信ペイロード用 RFC 3339（+09:00）
pub fn format_rfc3339(now: DateTime<Utc>) -> String {
    to_jst(now).to_rfc3339()
}

/// JSTでの日付（製造週チェックの基準日）
pub fn today(now: DateTime<Utc>) -> NaiveDate {
    to_jst(now).date_naive()
}

/// エポックミリ秒から（範囲外は 1970-01-01）
pub fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}
