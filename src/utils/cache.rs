//! 車両ごとの下書きキャッシュ
//!
//! 入力途中のフォームを車両識別（店舗・ナンバー・車種）ごとに localStorage へ保存し、
//! リロードや車両の切り替え後に復元する。同じタブのリロード用に直近の下書きを
//! sessionStorage にも置く。保存に失敗してもフォームはそのまま使える。

use crate::form::FormModel;
use crate::models::{is_stamped, DraftSnapshot, FieldId, StampKind, VehicleIdentity};
use crate::utils::log_trace::{log_info, log_warn};
use crate::utils::storage::KeyValueStore;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::form_urlencoded;

/// キー名前空間（バージョン付き）
pub const NAMESPACE: &str = "tireapp:v2:";
pub const SCHEMA_VERSION: u32 = 2;
/// 下書きの有効期間
pub const TTL_MS: i64 = 24 * 60 * 60 * 1000;

const DRAFT_PREFIX: &str = "tireapp:v2:draft:";
const TAB_KEY: &str = "tireapp:v2:tab";

/// 旧形式のキー（起動時に削除）
const LEGACY_KEYS: &[&str] = &["tireapp_draft_v1", "v5f_unlockTime", "v5f_lockTime"];
const LEGACY_PREFIX: &str = "tireapp:";

/// 識別から決まるキー本体（"<店舗>|<ナンバー>|<車種>"）
pub fn identity_segment(identity: &VehicleIdentity) -> String {
    format!(
        "{}|{}|{}",
        encode_segment(&identity.station),
        encode_segment(&identity.plate_full),
        encode_segment(&identity.model)
    )
}

/// キーの区切り '|' を含めて値をエンコード
fn encode_segment(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

pub fn draft_key(identity: &VehicleIdentity) -> String {
    format!("{}{}", DRAFT_PREFIX, identity_segment(identity))
}

pub fn is_expired(captured_at: i64, now: DateTime<Utc>) -> bool {
    now.timestamp_millis() - captured_at > TTL_MS
}

/// 旧形式のキーか（新しい名前空間以外の tireapp キーを含む）
pub fn is_legacy_key(key: &str) -> bool {
    LEGACY_KEYS.contains(&key) || (key.starts_with(LEGACY_PREFIX) && !key.starts_with(NAMESPACE))
}

#[derive(Deserialize)]
struct VersionProbe {
    #[serde(rename = "v")]
    version: Option<u32>,
}

/// バージョン確認付きで読み込む（壊れている・別バージョンなら None）
pub(crate) fn decode_versioned<T: serde::de::DeserializeOwned>(raw: &str) -> Option<T> {
    let probe: VersionProbe = serde_json::from_str(raw).ok()?;
    if probe.version != Some(SCHEMA_VERSION) {
        return None;
    }
    serde_json::from_str(raw).ok()
}

pub struct DraftStore<L, S> {
    local: L,
    session: S,
}

impl<L: KeyValueStore, S: KeyValueStore> DraftStore<L, S> {
    pub fn new(local: L, session: S) -> Self {
        Self { local, session }
    }

    /// 下書きを保存（識別が無ければ何もしない。失敗はログに残して続行）
    pub fn save(&self, identity: Option<&VehicleIdentity>, form: &FormModel, now: DateTime<Utc>) {
        let Some(identity) = identity else {
            return;
        };
        let snapshot = DraftSnapshot {
            version: SCHEMA_VERSION,
            captured_at: now.timestamp_millis(),
            identity: identity.clone(),
            fields: form.snapshot_fields(),
            stamped_times: form.times().clone(),
        };
        let Ok(json) = serde_json::to_string(&snapshot) else {
            return;
        };
        // 容量超過・プライベートモードでも入力は続けられる
        if let Err(e) = self.local.set_item(&draft_key(identity), &json) {
            log_warn("draft", &format!("下書きを保存できませんでした: {}", e));
        }
        if let Err(e) = self.session.set_item(TAB_KEY, &json) {
            log_warn("draft", &format!("タブの下書きを保存できませんでした: {}", e));
        }
    }

    /// 識別が一致する有効な下書きをフォームへ復元
    pub fn restore(
        &self,
        identity: &VehicleIdentity,
        form: &mut FormModel,
        now: DateTime<Utc>,
    ) -> Option<DraftSnapshot> {
        if form.identity().as_ref() != Some(identity) {
            return None;
        }
        let key = draft_key(identity);
        let snapshot = self.read(&self.local, &key, now)?;
        if &snapshot.identity != identity {
            log_warn("draft", &format!("識別が一致しない下書きを破棄しました: {}", key));
            self.local.remove_item(&key);
            return None;
        }
        apply_snapshot(&snapshot, form, false);
        log_info("draft", &format!("下書きを復元しました: {}", identity.plate_full));
        Some(snapshot)
    }

    /// リロード時：このタブの直近の下書きを識別項目ごと復元
    pub fn restore_after_reload(&self, form: &mut FormModel, now: DateTime<Utc>) -> Option<DraftSnapshot> {
        let snapshot = self.read(&self.session, TAB_KEY, now)?;
        if let Some(current) = form.identity() {
            if current != snapshot.identity {
                log_info("draft", "URLの車両と異なるため、タブの下書きを破棄しました");
                self.session.remove_item(TAB_KEY);
                return None;
            }
        }
        apply_snapshot(&snapshot, form, true);
        log_info("draft", &format!("リロード前の下書きを復元しました: {}", snapshot.identity.plate_full));
        Some(snapshot)
    }

    /// 送信完了後に下書きを削除
    pub fn clear(&self, identity: &VehicleIdentity) {
        self.local.remove_item(&draft_key(identity));
        let same_tab = self
            .session
            .get_item(TAB_KEY)
            .and_then(|raw| decode_versioned::<DraftSnapshot>(&raw))
            .map(|s| &s.identity == identity)
            .unwrap_or(true);
        if same_tab {
            self.session.remove_item(TAB_KEY);
        }
    }

    /// 旧形式・期限切れ・壊れたエントリを削除し、削除件数を返す
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        prune_store(&self.local, now) + prune_store(&self.session, now)
    }

    fn read<T: KeyValueStore>(&self, store: &T, key: &str, now: DateTime<Utc>) -> Option<DraftSnapshot> {
        let raw = store.get_item(key)?;
        match decode_versioned::<DraftSnapshot>(&raw) {
            Some(snapshot) if !is_expired(snapshot.captured_at, now) => Some(snapshot),
            _ => {
                store.remove_item(key);
                None
            }
        }
    }
}

/// スナップショットをフォームへ書き戻す
///
/// 識別項目は `with_identity` のときだけ書き込み、整形の再適用はしない。
/// それ以外は値が変わった項目に変更通知を送る。
fn apply_snapshot(snapshot: &DraftSnapshot, form: &mut FormModel, with_identity: bool) {
    if with_identity {
        let identity = &snapshot.identity;
        form.set_text(FieldId::Station, &identity.station);
        form.set_text(FieldId::PlateFull, &identity.plate_full);
        form.set_text(FieldId::Model, &identity.model);
    }
    for (key, value) in &snapshot.fields {
        let Some(id) = FieldId::from_key(key) else {
            continue;
        };
        if id.is_identity() {
            continue;
        }
        let before = form.value(id);
        form.set_value(id, value.clone());
        if form.value(id) != before {
            form.notify_changed(id);
        }
    }
    for kind in [StampKind::Unlock, StampKind::Lock] {
        let saved = snapshot.stamped_times.get(kind);
        if is_stamped(saved) && !form.times().is_set(kind) {
            form.set_time(kind, saved.to_string());
        }
    }
}

/// 1つのストアを掃除（下書き・打刻時刻の両方）
pub(crate) fn prune_store<T: KeyValueStore>(store: &T, now: DateTime<Utc>) -> usize {
    #[derive(Deserialize)]
    struct Stamped {
        #[serde(alias = "stamped_at")]
        captured_at: i64,
    }

    let mut removed = 0;
    for key in store.keys() {
        let stale = if is_legacy_key(&key) {
            true
        } else if key.starts_with(DRAFT_PREFIX) || key.starts_with(crate::utils::stamp::TIMES_PREFIX) || key == TAB_KEY {
            store
                .get_item(&key)
                .and_then(|raw| decode_versioned::<Stamped>(&raw))
                .map(|s| is_expired(s.captured_at, now))
                .unwrap_or(true)
        } else {
            false
        };
        if stale {
            store.remove_item(&key);
            removed += 1;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldValue, TirePosition};
    use crate::utils::jst::from_millis;
    use crate::utils::storage::MemoryStorage;

    const T0: i64 = 1_750_000_000_000;

    fn form_for(station: &str, plate: &str, model: &str) -> FormModel {
        let mut form = FormModel::new();
        form.set_text(FieldId::Station, station);
        form.set_text(FieldId::PlateFull, plate);
        form.set_text(FieldId::Model, model);
        form
    }

    fn tread_rf() -> FieldId {
        FieldId::Tread(TirePosition::Rf)
    }

    #[test]
    fn test_key_is_deterministic_and_encoded() {
        let id = VehicleIdentity::from_fields("渋谷|店", "12 34", "").unwrap();
        assert_eq!(draft_key(&id), "tireapp:v2:draft:%E6%B8%8B%E8%B0%B7%7C%E5%BA%97|12+34|");
        assert_eq!(draft_key(&id), draft_key(&id.clone()));
    }

    #[test]
    fn test_save_without_identity_is_noop() {
        let local = MemoryStorage::new();
        let session = MemoryStorage::new();
        let store = DraftStore::new(&local, &session);
        let form = form_for("", "12-34", "");
        store.save(form.identity().as_ref(), &form, from_millis(T0));
        assert!(local.is_empty());
        assert!(session.is_empty());
    }

    #[test]
    fn test_save_and_restore() {
        let local = MemoryStorage::new();
        let session = MemoryStorage::new();
        let store = DraftStore::new(&local, &session);

        let mut form = form_for("渋谷店", "12-34", "プリウス");
        form.input(tread_rf(), "55");
        form.set_checked(FieldId::Nitrogen, true);
        form.set_time(StampKind::Unlock, "09:05".to_string());
        store.save(form.identity().as_ref(), &form, from_millis(T0));

        let mut fresh = form_for("渋谷店", "12-34", "プリウス");
        let id = fresh.identity().unwrap();
        let snap = store.restore(&id, &mut fresh, from_millis(T0 + 1000)).unwrap();
        assert_eq!(snap.captured_at, T0);
        assert_eq!(fresh.text(tread_rf()), "5.5");
        assert!(fresh.checked(FieldId::Nitrogen));
        assert_eq!(fresh.time(StampKind::Unlock), "09:05");
        assert_eq!(fresh.time(StampKind::Lock), "--:--");
    }

    #[test]
    fn test_restore_is_isolated_between_identities() {
        let local = MemoryStorage::new();
        let session = MemoryStorage::new();
        let store = DraftStore::new(&local, &session);

        let mut a = form_for("渋谷店", "12-34", "プリウス");
        a.input(tread_rf(), "55");
        store.save(a.identity().as_ref(), &a, from_millis(T0));
        let id_a = a.identity().unwrap();

        for (st, pl, md) in [("渋谷店", "12-35", "プリウス"), ("新宿店", "12-34", "プリウス"), ("渋谷店", "12-34", "アクア")] {
            let mut b = form_for(st, pl, md);
            let untouched = b.clone();
            assert!(store.restore(&id_a, &mut b, from_millis(T0)).is_none());
            let id_b = b.identity().unwrap();
            assert!(store.restore(&id_b, &mut b, from_millis(T0)).is_none());
            assert_eq!(b, untouched);
        }
    }

    #[test]
    fn test_expiry_boundary() {
        let local = MemoryStorage::new();
        let session = MemoryStorage::new();
        let store = DraftStore::new(&local, &session);

        let mut form = form_for("渋谷店", "12-34", "");
        form.input(tread_rf(), "55");
        store.save(form.identity().as_ref(), &form, from_millis(T0));
        let id = form.identity().unwrap();

        let mut before = form_for("渋谷店", "12-34", "");
        assert!(store.restore(&id, &mut before, from_millis(T0 + TTL_MS - 1)).is_some());
        assert_eq!(before.text(tread_rf()), "5.5");

        let mut after = form_for("渋谷店", "12-34", "");
        assert!(store.restore(&id, &mut after, from_millis(T0 + TTL_MS + 1)).is_none());
        assert_eq!(after.text(tread_rf()), "");
        // 期限切れは削除される
        assert!(local.get_item(&draft_key(&id)).is_none());
    }

    #[test]
    fn test_clear_keeps_other_identities() {
        let local = MemoryStorage::new();
        let session = MemoryStorage::new();
        let store = DraftStore::new(&local, &session);

        let mut a = form_for("渋谷店", "12-34", "");
        a.input(tread_rf(), "55");
        let mut b = form_for("渋谷店", "56-78", "");
        b.input(tread_rf(), "66");
        store.save(b.identity().as_ref(), &b, from_millis(T0));
        store.save(a.identity().as_ref(), &a, from_millis(T0));

        let id_a = a.identity().unwrap();
        let id_b = b.identity().unwrap();
        store.clear(&id_a);

        let mut again = form_for("渋谷店", "12-34", "");
        assert!(store.restore(&id_a, &mut again, from_millis(T0)).is_none());
        assert!(store.restore_after_reload(&mut FormModel::new(), from_millis(T0)).is_none());

        let mut other = form_for("渋谷店", "56-78", "");
        assert!(store.restore(&id_b, &mut other, from_millis(T0)).is_some());
        assert_eq!(other.text(tread_rf()), "6.6");
    }

    #[test]
    fn test_restore_after_reload_fills_identity() {
        let local = MemoryStorage::new();
        let session = MemoryStorage::new();
        let store = DraftStore::new(&local, &session);

        let mut form = form_for("渋谷店", "12-34", "プリウス");
        form.input(FieldId::Dot(TirePosition::Lf), "0125");
        store.save(form.identity().as_ref(), &form, from_millis(T0));

        let mut reloaded = FormModel::new();
        let snap = store.restore_after_reload(&mut reloaded, from_millis(T0 + 5000)).unwrap();
        assert_eq!(snap.identity.plate_full, "12-34");
        assert_eq!(reloaded.station(), "渋谷店");
        assert_eq!(reloaded.model(), "プリウス");
        assert_eq!(reloaded.text(FieldId::Dot(TirePosition::Lf)), "0125");
    }

    #[test]
    fn test_restore_after_reload_discards_mismatch() {
        let local = MemoryStorage::new();
        let session = MemoryStorage::new();
        let store = DraftStore::new(&local, &session);

        let mut form = form_for("渋谷店", "12-34", "");
        form.input(tread_rf(), "55");
        store.save(form.identity().as_ref(), &form, from_millis(T0));

        let mut other = form_for("渋谷店", "99-99", "");
        assert!(store.restore_after_reload(&mut other, from_millis(T0)).is_none());
        assert_eq!(other.text(tread_rf()), "");
        assert!(session.get_item(TAB_KEY).is_none());
        // 車両ごとの下書きは残る
        assert!(local.get_item(&draft_key(&form.identity().unwrap())).is_some());
    }

    #[test]
    fn test_storage_failure_is_logged_not_raised() {
        let local = MemoryStorage::rejecting();
        let session = MemoryStorage::rejecting();
        let store = DraftStore::new(&local, &session);
        let form = form_for("渋谷店", "12-34", "");
        store.save(form.identity().as_ref(), &form, from_millis(T0));
        let mut again = form_for("渋谷店", "12-34", "");
        let id = again.identity().unwrap();
        assert!(store.restore(&id, &mut again, from_millis(T0)).is_none());
        let logs = crate::utils::log_trace::get_logs_json();
        assert!(logs.contains("下書きを保存できませんでした"));
        assert!(logs.contains("タブの下書きを保存できませんでした"));
    }

    #[test]
    fn test_wrong_version_is_discarded() {
        let local = MemoryStorage::new();
        let session = MemoryStorage::new();
        let store = DraftStore::new(&local, &session);
        let mut form = form_for("渋谷店", "12-34", "");
        let id = form.identity().unwrap();
        let raw = serde_json::json!({
            "v": 1, "captured_at": T0, "identity": id, "fields": { "tread_rf": "5.5" }
        });
        local.set_item(&draft_key(&id), &raw.to_string()).unwrap();
        assert!(store.restore(&id, &mut form, from_millis(T0)).is_none());
        assert!(local.is_empty());
    }

    #[test]
    fn test_snapshot_keyed_to_other_identity_is_discarded() {
        let local = MemoryStorage::new();
        let session = MemoryStorage::new();
        let store = DraftStore::new(&local, &session);
        let mut form = form_for("渋谷店", "12-34", "");
        let id = form.identity().unwrap();
        let foreign = VehicleIdentity::from_fields("新宿店", "12-34", "").unwrap();
        let snap = DraftSnapshot {
            version: SCHEMA_VERSION,
            captured_at: T0,
            identity: foreign,
            fields: [("tread_rf".to_string(), FieldValue::Text("5.5".to_string()))].into_iter().collect(),
            stamped_times: Default::default(),
        };
        local.set_item(&draft_key(&id), &serde_json::to_string(&snap).unwrap()).unwrap();
        assert!(store.restore(&id, &mut form, from_millis(T0)).is_none());
        assert_eq!(form.text(tread_rf()), "");
        assert!(local.get_item(&draft_key(&id)).is_none());
    }

    #[test]
    fn test_prune_removes_legacy_and_expired() {
        let local = MemoryStorage::new();
        let session = MemoryStorage::new();
        let store = DraftStore::new(&local, &session);

        local.set_item("tireapp:%E6%B8%8B|12-34", "{\"t\":1,\"data\":{}}").unwrap();
        local.set_item("v5f_unlockTime", "09:00").unwrap();
        local.set_item("unrelated", "keep").unwrap();
        session.set_item("tireapp:lastKey", "tireapp:x|y").unwrap();
        session.set_item("tireapp_draft_v1", "{}").unwrap();

        let old = form_for("渋谷店", "00-01", "");
        store.save(old.identity().as_ref(), &old, from_millis(T0));
        let fresh = form_for("渋谷店", "12-34", "");
        store.save(fresh.identity().as_ref(), &fresh, from_millis(T0 + TTL_MS));

        // old の下書きのみ期限切れ（タブの下書きは fresh で上書き済み）
        let removed = store.prune(from_millis(T0 + TTL_MS + 10));
        assert_eq!(removed, 5);
        assert_eq!(local.get_item("unrelated").as_deref(), Some("keep"));
        assert!(local.get_item(&draft_key(&fresh.identity().unwrap())).is_some());
        assert!(local.get_item(&draft_key(&old.identity().unwrap())).is_none());
        assert!(session.get_item(TAB_KEY).is_some());
    }
}
