//! GAS (Google Apps Script) 連携
//!
//! 規定空気圧・前回値の取得と、点検結果の送信。

use crate::models::{PresetResponse, SheetPayload};
use crate::utils::page::query_pairs;
use crate::utils::storage::{KeyValueStore, WebStorage};
use serde::Deserialize;
use thiserror::Error;
use url::form_urlencoded;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, RequestMode, Response};

const GAS_URL_KEY: &str = "tireapp:v2:config:gas_url";

/// 既定の送信先（ビルド時に TIRE_SHEETS_URL で差し替え可能）
const DEFAULT_SHEETS_URL: &str = "https://script.google.com/macros/s/AKfycbyo2U1_TBxvzhJL50GHY8S0NeT1k0kueWb4tI1q2Oaw87NuGXqwjO7PWyCDdqFNZTdz/exec";
const DEFAULT_SHEETS_KEY: &str = "tl1";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GasError {
    #[error("GAS URLが設定されていません")]
    NotConfigured,
    #[error("通信エラー: {0}")]
    Request(String),
    #[error("APIエラー: {0}")]
    Status(u16),
    #[error("送信が受け付けられませんでした")]
    Rejected,
}

impl GasError {
    /// トースト表示用の文言
    pub fn toast_message(&self) -> &'static str {
        match self {
            Self::NotConfigured => "送信先が未設定です",
            Self::Request(_) => "送信エラー",
            Self::Status(_) | Self::Rejected => "送信に失敗しました",
        }
    }
}

/// 送信先設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetsConfig {
    pub url: Option<String>,
    pub key: String,
}

impl SheetsConfig {
    /// 保存済みURL → ビルド時URL → 既定URL の順に決定
    ///
    /// ビルド時に TIRE_SHEETS_URL を空で与えると既定URLを使わない（未設定扱い）。
    pub fn resolve(saved_url: Option<String>, build_url: Option<&str>, build_key: Option<&str>) -> Self {
        let fallback = match build_url.map(str::trim) {
            None => Some(DEFAULT_SHEETS_URL.to_string()),
            Some("") => None,
            Some(u) => Some(u.to_string()),
        };
        let url = saved_url.filter(|u| !u.trim().is_empty()).or(fallback);
        let key = build_key
            .filter(|k| !k.is_empty())
            .unwrap_or(DEFAULT_SHEETS_KEY)
            .to_string();
        Self { url, key }
    }

    /// ブラウザの設定から
    pub fn current() -> Self {
        Self::resolve(
            get_gas_url(&WebStorage::local()),
            option_env!("TIRE_SHEETS_URL"),
            option_env!("TIRE_SHEETS_KEY"),
        )
    }

    fn url(&self) -> Result<&str, GasError> {
        self.url.as_deref().ok_or(GasError::NotConfigured)
    }

    /// 取得用URL（key, station, model, plate_full, mode=fetch）
    pub fn fetch_url(&self, station: &str, model: &str, plate_full: &str) -> Result<String, GasError> {
        let base = self.url()?;
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("key", &self.key);
        for (name, value) in [("station", station), ("model", model), ("plate_full", plate_full)] {
            if !value.is_empty() {
                query.append_pair(name, value);
            }
        }
        query.append_pair("mode", "fetch");
        let sep = if base.contains('?') { '&' } else { '?' };
        Ok(format!("{}{}{}", base, sep, query.finish()))
    }

    /// 送信本文（key=...&json=...）
    pub fn post_body(&self, payload: &SheetPayload) -> Result<String, GasError> {
        let json = serde_json::to_string(payload).map_err(|e| GasError::Request(e.to_string()))?;
        Ok(form_urlencoded::Serializer::new(String::new())
            .append_pair("key", &self.key)
            .append_pair("json", &json)
            .finish())
    }
}

/// GAS URLを保存
pub fn save_gas_url<S: KeyValueStore>(store: &S, url: &str) {
    let _ = store.set_item(GAS_URL_KEY, url.trim());
}

/// GAS URLを取得
pub fn get_gas_url<S: KeyValueStore>(store: &S) -> Option<String> {
    let url = store.get_item(GAS_URL_KEY)?;
    if url.trim().is_empty() { None } else { Some(url) }
}

/// GAS URLをクリア
pub fn clear_gas_url<S: KeyValueStore>(store: &S) {
    store.remove_item(GAS_URL_KEY);
}

/// クエリから gas の値を取り出し、残りのクエリ（"?..." または空）と組にする
pub fn take_gas_param(search: &str) -> Option<(String, String)> {
    let pairs = query_pairs(search);
    let gas = pairs.iter().find(|(k, _)| k == "gas").map(|(_, v)| v.clone())?;
    let mut rest = form_urlencoded::Serializer::new(String::new());
    rest.extend_pairs(pairs.iter().filter(|(k, _)| k != "gas"));
    let rest = rest.finish();
    let query = if rest.is_empty() { String::new() } else { format!("?{}", rest) };
    Some((gas, query))
}

/// URLパラメータからGAS URLを読み込む (?gas=xxx)
pub fn init_gas_from_url_params() -> Option<String> {
    let window = web_sys::window()?;
    let search = window.location().search().ok()?;
    let (gas, query) = take_gas_param(&search)?;
    let store = WebStorage::local();
    if gas.trim().is_empty() {
        clear_gas_url(&store);
        return None;
    }
    save_gas_url(&store, &gas);
    // URLからgasパラメータだけを削除
    let pathname = window.location().pathname().ok()?;
    let hash = window.location().hash().ok().unwrap_or_default();
    if let Ok(history) = window.history() {
        let _ = history.replace_state_with_url(&JsValue::NULL, "", Some(&format!("{}{}{}", pathname, query, hash)));
    }
    Some(gas.trim().to_string())
}

async fn send(request: Request) -> Result<Response, GasError> {
    let window = web_sys::window().ok_or_else(|| GasError::Request("windowがありません".to_string()))?;
    let resp_value = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(|e| GasError::Request(format!("fetch失敗: {:?}", e)))?;
    let resp: Response = resp_value
        .dyn_into()
        .map_err(|_| GasError::Request("Responseへの変換失敗".to_string()))?;
    if !resp.ok() {
        return Err(GasError::Status(resp.status()));
    }
    Ok(resp)
}

async fn read_json(resp: &Response) -> Result<JsValue, GasError> {
    let promise = resp
        .json()
        .map_err(|e| GasError::Request(format!("json()失敗: {:?}", e)))?;
    JsFuture::from(promise)
        .await
        .map_err(|e| GasError::Request(format!("JSON取得失敗: {:?}", e)))
}

/// GASから規定空気圧・前回値を取得
pub async fn fetch_presets(
    config: &SheetsConfig,
    station: &str,
    model: &str,
    plate_full: &str,
) -> Result<PresetResponse, GasError> {
    let url = config.fetch_url(station, model, plate_full)?;

    let opts = RequestInit::new();
    opts.set_method("GET");
    opts.set_mode(RequestMode::Cors);

    let request = Request::new_with_str_and_init(&url, &opts)
        .map_err(|e| GasError::Request(format!("Request作成失敗: {:?}", e)))?;

    let resp = send(request).await?;
    let json = read_json(&resp).await?;
    serde_wasm_bindgen::from_value(json).map_err(|e| GasError::Request(format!("JSONパース失敗: {:?}", e)))
}

#[derive(Debug, Deserialize)]
struct PostResponse {
    ok: Option<bool>,
}

/// 応答の ok 判定（ok が無い応答は成功扱い）
fn accepted(response: &PostResponse) -> Result<(), GasError> {
    match response.ok {
        Some(false) => Err(GasError::Rejected),
        _ => Ok(()),
    }
}

/// GASに点検結果を送信
pub async fn post_reading(config: &SheetsConfig, payload: &SheetPayload) -> Result<(), GasError> {
    let url = config.url()?;
    let body = config.post_body(payload)?;

    let opts = RequestInit::new();
    opts.set_method("POST");
    opts.set_body(&JsValue::from_str(&body));

    let request = Request::new_with_str_and_init(url, &opts)
        .map_err(|e| GasError::Request(format!("Request作成失敗: {:?}", e)))?;

    // フォーム形式ならCORSプリフライトが発生しない
    request
        .headers()
        .set("Content-Type", "application/x-www-form-urlencoded;charset=UTF-8")
        .map_err(|e| GasError::Request(format!("ヘッダー設定失敗: {:?}", e)))?;

    let resp = send(request).await?;
    let json = read_json(&resp).await?;
    let response: PostResponse = serde_wasm_bindgen::from_value(json)
        .map_err(|e| GasError::Request(format!("JSONパース失敗: {:?}", e)))?;
    accepted(&response)
}
