//! 時系列トレースログシステム
//! 下書きの保存・復元、打刻、GAS通信などを記録し、後から確認できるようにする

use crate::utils::storage::{KeyValueStore, WebStorage};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

const MAX_LOG_ENTRIES: usize = 1000;
const STORAGE_KEY: &str = "tireapp:v2:log_trace";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String, // "info", "warn", "error"
    pub category: String, // "draft", "stamp", "gas-fetch", "gas-post", ...
    pub message: String,
    pub data: Option<serde_json::Value>,
}

pub struct LogTrace<S: KeyValueStore> {
    logs: VecDeque<LogEntry>,
    store: S,
}

impl<S: KeyValueStore> LogTrace<S> {
    pub fn new(store: S) -> Self {
        let mut trace = LogTrace {
            logs: VecDeque::with_capacity(MAX_LOG_ENTRIES),
            store,
        };
        trace.load_from_storage();
        trace
    }

    pub fn log(&mut self, level: &str, category: &str, message: &str, data: Option<serde_json::Value>) {
        let timestamp = crate::utils::jst::format_rfc3339(chrono::Utc::now());

        let entry = LogEntry {
            timestamp,
            level: level.to_string(),
            category: category.to_string(),
            message: message.to_string(),
            data,
        };

        // コンソールにも出力
        #[cfg(target_arch = "wasm32")]
        match level {
            "error" => web_sys::console::error_1(&format!("[{}] {}", category, message).into()),
            "warn" => web_sys::console::warn_1(&format!("[{}] {}", category, message).into()),
            _ => web_sys::console::log_1(&format!("[{}] {}", category, message).into()),
        }

        if self.logs.len() >= MAX_LOG_ENTRIES {
            self.logs.pop_front();
        }
        self.logs.push_back(entry);

        self.save_to_storage();
    }

    pub fn info(&mut self, category: &str, message: &str) {
        self.log("info", category, message, None);
    }

    pub fn info_with_data(&mut self, category: &str, message: &str, data: serde_json::Value) {
        self.log("info", category, message, Some(data));
    }

    pub fn warn(&mut self, category: &str, message: &str) {
        self.log("warn", category, message, None);
    }

    pub fn error(&mut self, category: &str, message: &str) {
        self.log("error", category, message, None);
    }

    pub fn get_logs(&self) -> Vec<LogEntry> {
        self.logs.iter().cloned().collect()
    }

    pub fn get_logs_json(&self) -> String {
        let logs: Vec<&LogEntry> = self.logs.iter().collect();
        serde_json::to_string_pretty(&logs).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn clear(&mut self) {
        self.logs.clear();
        self.save_to_storage();
    }

    fn load_from_storage(&mut self) {
        if let Some(json_str) = self.store.get_item(STORAGE_KEY) {
            if let Ok(logs) = serde_json::from_str::<Vec<LogEntry>>(&json_str) {
                self.logs = logs.into_iter().collect();
            }
        }
    }

    fn save_to_storage(&self) {
        let logs: Vec<&LogEntry> = self.logs.iter().collect();
        let json_str = serde_json::to_string(&logs).unwrap_or_else(|_| "[]".to_string());
        // 容量超過時は記録を諦める（ログのためにフォームを止めない）
        let _ = self.store.set_item(STORAGE_KEY, &json_str);
    }
}

/// ログをJSONファイルとしてダウンロード
pub fn download_logs() {
    let json_str = get_logs_json();
    let timestamp = crate::utils::jst::format_rfc3339(chrono::Utc::now());
    let filename = format!("tire_log_{}.json", timestamp.replace([':', '+'], "-"));

    if let Some(window) = web_sys::window() {
        if let Some(document) = window.document() {
            let blob_parts = js_sys::Array::new();
            blob_parts.push(&JsValue::from_str(&json_str));

            let options = web_sys::BlobPropertyBag::new();
            options.set_type("application/json");

            if let Ok(blob) = web_sys::Blob::new_with_str_sequence_and_options(&blob_parts, &options) {
                if let Ok(url) = web_sys::Url::create_object_url_with_blob(&blob) {
                    if let Ok(a) = document.create_element("a") {
                        let _ = a.set_attribute("href", &url);
                        let _ = a.set_attribute("download", &filename);
                        if let Some(element) = a.dyn_ref::<web_sys::HtmlElement>() {
                            element.click();
                        }
                        let _ = web_sys::Url::revoke_object_url(&url);
                    }
                }
            }
        }
    }
}

// グローバルなログトレースインスタンス
thread_local! {
    static LOG_TRACE: std::cell::RefCell<LogTrace<WebStorage>> =
        std::cell::RefCell::new(LogTrace::new(WebStorage::local()));
}

pub fn log_info(category: &str, message: &str) {
    LOG_TRACE.with(|trace| {
        trace.borrow_mut().info(category, message);
    });
}

pub fn log_info_with_data(category: &str, message: &str, data: serde_json::Value) {
    LOG_TRACE.with(|trace| {
        trace.borrow_mut().info_with_data(category, message, data);
    });
}

pub fn log_warn(category: &str, message: &str) {
    LOG_TRACE.with(|trace| {
        trace.borrow_mut().warn(category, message);
    });
}

pub fn log_error(category: &str, message: &str) {
    LOG_TRACE.with(|trace| {
        trace.borrow_mut().error(category, message);
    });
}

pub fn clear_logs() {
    LOG_TRACE.with(|trace| {
        trace.borrow_mut().clear();
    });
}

pub fn get_logs_json() -> String {
    LOG_TRACE.with(|trace| trace.borrow().get_logs_json())
}
