//! DOT製造番号 (WWYY) の検証
//!
//! 先頭2桁がISO週、末尾2桁が西暦下2桁。現在のISO週より先の番号は受け付けない。

use crate::models::TirePosition;
use chrono::{Datelike, NaiveDate};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DotCodeError {
    #[error("4桁の数字で入力してください")]
    NotFourDigits,
    #[error("週 {0:02} は範囲外です（01〜53）")]
    WeekOutOfRange(u32),
    #[error("製造年 20{0:02} は未来の年です")]
    FutureYear(u32),
    #[error("製造週 {week:02}/20{year:02} はまだ来ていません")]
    FutureWeek { week: u32, year: u32 },
}

/// 送信時の検証エラー（どのタイヤか付き）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{position}の製造番号: {kind}")]
pub struct ValidationError {
    pub position: TirePosition,
    pub kind: DotCodeError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DotCode {
    pub week: u32,
    /// 西暦下2桁
    pub year: u32,
}

impl DotCode {
    pub fn full_year(&self) -> i32 {
        2000 + self.year as i32
    }
}

/// 書式のみの解析（4桁・週の範囲）
pub fn parse_dot(code: &str) -> Result<DotCode, DotCodeError> {
    let code = code.trim();
    if code.len() != 4 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DotCodeError::NotFourDigits);
    }
    let week: u32 = code[..2].parse().map_err(|_| DotCodeError::NotFourDigits)?;
    let year: u32 = code[2..].parse().map_err(|_| DotCodeError::NotFourDigits)?;
    if !(1..=53).contains(&week) {
        return Err(DotCodeError::WeekOutOfRange(week));
    }
    Ok(DotCode { week, year })
}

/// 基準日のISO週（週年, 週番号）
///
/// 木曜日を含む年に属する週として数える（ISO 8601）。
pub fn iso_week_of(date: NaiveDate) -> (i32, u32) {
    let w = date.iso_week();
    (w.year(), w.week())
}

/// 基準日に対して製造番号を検証
pub fn validate_dot(code: &str, today: NaiveDate) -> Result<DotCode, DotCodeError> {
    let dot = parse_dot(code)?;
    let (current_year, current_week) = iso_week_of(today);
    let year = dot.full_year();
    if year > current_year {
        return Err(DotCodeError::FutureYear(dot.year));
    }
    if year == current_year && dot.week > current_week {
        return Err(DotCodeError::FutureWeek {
            week: dot.week,
            year: dot.year,
        });
    }
    Ok(dot)
}

/// 全タイヤ分を検証（最初のエラーで止める）
pub fn validate_all<'a, I>(codes: I, today: NaiveDate) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = (TirePosition, &'a str)>,
{
    for (position, code) in codes {
        validate_dot(code, today).map_err(|kind| ValidationError { position, kind })?;
    }
    Ok(())
}
