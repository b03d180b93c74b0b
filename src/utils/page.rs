//! ページ状態（URLパラメータ・リロード判定）

use crate::form::FormModel;
use crate::models::FieldId;
use url::form_urlencoded;
use wasm_bindgen::JsCast;

const STATION_PARAMS: &[&str] = &["station", "s"];
const MODEL_PARAMS: &[&str] = &["model", "m", "car_model"];
const PLATE_PARAMS: &[&str] = &["plate_full", "plateFull", "full_plate", "plate", "p"];

/// URLクエリから読み取った車両識別の初期値
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPrefill {
    pub station: Option<String>,
    pub model: Option<String>,
    pub plate_full: Option<String>,
}

impl QueryPrefill {
    /// "?station=..&p=.." 形式を解析（別名は先に並んだものが優先、空は無視）
    pub fn from_search(search: &str) -> Self {
        let pairs = query_pairs(search);
        let lookup = |names: &[&str]| {
            names.iter().find_map(|name| {
                pairs
                    .iter()
                    .find(|(k, v)| k == name && !v.trim().is_empty())
                    .map(|(_, v)| v.clone())
            })
        };
        Self {
            station: lookup(STATION_PARAMS),
            model: lookup(MODEL_PARAMS),
            plate_full: lookup(PLATE_PARAMS),
        }
    }

    /// 現在のURLから
    pub fn current() -> Self {
        web_sys::window()
            .and_then(|w| w.location().search().ok())
            .map(|s| Self::from_search(&s))
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.station.is_none() && self.model.is_none() && self.plate_full.is_none()
    }

    /// 識別項目へ書き込む
    pub fn apply(&self, form: &mut FormModel) {
        for (id, value) in [
            (FieldId::Station, &self.station),
            (FieldId::Model, &self.model),
            (FieldId::PlateFull, &self.plate_full),
        ] {
            if let Some(v) = value {
                form.set_text(id, v);
            }
        }
    }
}

/// クエリ文字列を (名前, 値) に分解（'+' は空白、不正な '%' はそのまま残す）
pub fn query_pairs(search: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(search.trim_start_matches('?').as_bytes())
        .into_owned()
        .collect()
}

/// リロードで開かれたページか
pub fn is_reload_navigation() -> bool {
    let Some(performance) = web_sys::window().and_then(|w| w.performance()) else {
        return false;
    };
    let entry = performance
        .get_entries_by_type("navigation")
        .get(0)
        .dyn_into::<web_sys::PerformanceNavigationTiming>()
        .ok();
    if let Some(entry) = entry {
        return entry.type_() == web_sys::NavigationType::Reload;
    }
    // 古いSafari向け
    performance.navigation().type_() == 1
}
