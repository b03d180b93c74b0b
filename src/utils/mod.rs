//! ユーティリティモジュール

pub mod cache;
pub mod dot_code;
pub mod format;
pub mod gas;
pub mod jst;
pub mod log_trace;
pub mod page;
pub mod stamp;
pub mod storage;
