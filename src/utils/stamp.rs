//! 解錠・施錠時刻の記録
//!
//! 他の入力とは別に、車両識別ごとのキーへ打刻のたびに即時保存する。

use crate::form::FormModel;
use crate::models::{is_stamped, StampKind, StampedTimes, VehicleIdentity};
use crate::utils::cache::{decode_versioned, identity_segment, is_expired, SCHEMA_VERSION};
use crate::utils::jst::format_hm;
use crate::utils::log_trace::{log_info, log_warn};
use crate::utils::storage::KeyValueStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TIMES_PREFIX: &str = "tireapp:v2:times:";

pub fn times_key(identity: &VehicleIdentity) -> String {
    format!("{}{}", TIMES_PREFIX, identity_segment(identity))
}

#[derive(Debug, Serialize, Deserialize)]
struct TimesRecord {
    #[serde(rename = "v")]
    version: u32,
    stamped_at: i64,
    unlock: String,
    lock: String,
}

/// 打刻結果（ボタン下に一時表示する文言付き）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampNote {
    pub time: String,
    pub note: String,
}

pub struct TimeStampStore<L> {
    local: L,
}

impl<L: KeyValueStore> TimeStampStore<L> {
    pub fn new(local: L) -> Self {
        Self { local }
    }

    /// 現在時刻を打刻して表示・保存
    pub fn stamp(
        &self,
        kind: StampKind,
        identity: Option<&VehicleIdentity>,
        form: &mut FormModel,
        now: DateTime<Utc>,
    ) -> StampNote {
        let time = format_hm(now);
        let replaced = form.times().is_set(kind);
        form.set_time(kind, time.clone());
        if let Some(identity) = identity {
            self.persist(identity, form.times(), now);
        }
        log_info("stamp", &format!("{} {}", kind.label(), time));
        let note = if replaced {
            format!("更新: {}", time)
        } else {
            "記録しました".to_string()
        };
        StampNote { time, note }
    }

    /// 識別に対応する時刻を表示（無ければ "--:--"）
    pub fn load_times_for(&self, identity: Option<&VehicleIdentity>, form: &mut FormModel, now: DateTime<Utc>) {
        let times = identity
            .and_then(|id| self.read(id, now))
            .unwrap_or_default();
        form.set_times(times);
    }

    /// 識別が決まる前に打刻した時刻を、その識別の記録として引き継ぐ
    ///
    /// 既に記録がある場合は何もしない。
    pub fn adopt(&self, identity: &VehicleIdentity, form: &FormModel, now: DateTime<Utc>) -> bool {
        let times = form.times();
        if !(times.is_set(StampKind::Unlock) || times.is_set(StampKind::Lock)) {
            return false;
        }
        if self.read(identity, now).is_some() {
            return false;
        }
        self.persist(identity, times, now);
        true
    }

    pub fn clear(&self, identity: &VehicleIdentity) {
        self.local.remove_item(&times_key(identity));
    }

    fn persist(&self, identity: &VehicleIdentity, times: &StampedTimes, now: DateTime<Utc>) {
        let record = TimesRecord {
            version: SCHEMA_VERSION,
            stamped_at: now.timestamp_millis(),
            unlock: times.unlock.clone(),
            lock: times.lock.clone(),
        };
        let Ok(json) = serde_json::to_string(&record) else {
            return;
        };
        if let Err(e) = self.local.set_item(&times_key(identity), &json) {
            log_warn("stamp", &format!("時刻を保存できませんでした: {}", e));
        }
    }

    fn read(&self, identity: &VehicleIdentity, now: DateTime<Utc>) -> Option<StampedTimes> {
        let key = times_key(identity);
        let raw = self.local.get_item(&key)?;
        let Some(record) = decode_versioned::<TimesRecord>(&raw).filter(|r| !is_expired(r.stamped_at, now)) else {
            self.local.remove_item(&key);
            return None;
        };
        let mut times = StampedTimes::default();
        for (kind, value) in [(StampKind::Unlock, record.unlock), (StampKind::Lock, record.lock)] {
            if is_stamped(&value) {
                times.set(kind, value);
            }
        }
        Some(times)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldId;
    use crate::utils::cache::TTL_MS;
    use crate::utils::jst::from_millis;
    use crate::utils::storage::MemoryStorage;

    // 2025-06-01 00:05 UTC = 09:05 JST
    const T0: i64 = 1_748_736_300_000;

    fn set_identity(form: &mut FormModel, plate: &str) -> Option<VehicleIdentity> {
        form.set_text(FieldId::Station, "渋谷店");
        form.set_text(FieldId::PlateFull, plate);
        form.identity()
    }

    #[test]
    fn test_stamp_notes() {
        let local = MemoryStorage::new();
        let store = TimeStampStore::new(&local);
        let mut form = FormModel::new();
        let id = set_identity(&mut form, "12-34");

        let first = store.stamp(StampKind::Unlock, id.as_ref(), &mut form, from_millis(T0));
        assert_eq!(first.time, "09:05");
        assert_eq!(first.note, "記録しました");
        assert_eq!(form.time(StampKind::Unlock), "09:05");

        let second = store.stamp(StampKind::Unlock, id.as_ref(), &mut form, from_millis(T0 + 60_000));
        assert_eq!(second.note, "更新: 09:06");
    }

    #[test]
    fn test_stamp_persists_immediately() {
        let local = MemoryStorage::new();
        let store = TimeStampStore::new(&local);
        let mut form = FormModel::new();
        let id = set_identity(&mut form, "12-34").unwrap();
        store.stamp(StampKind::Lock, Some(&id), &mut form, from_millis(T0));
        assert!(local.get_item(&times_key(&id)).is_some());
    }

    #[test]
    fn test_switching_vehicle_resets_and_returns_times() {
        let local = MemoryStorage::new();
        let store = TimeStampStore::new(&local);
        let mut form = FormModel::new();

        let a = set_identity(&mut form, "12-34");
        store.stamp(StampKind::Unlock, a.as_ref(), &mut form, from_millis(T0));

        let b = set_identity(&mut form, "56-78");
        store.load_times_for(b.as_ref(), &mut form, from_millis(T0 + 1000));
        assert_eq!(form.time(StampKind::Unlock), "--:--");
        assert_eq!(form.time(StampKind::Lock), "--:--");

        let a_again = set_identity(&mut form, "12-34");
        store.load_times_for(a_again.as_ref(), &mut form, from_millis(T0 + 2000));
        assert_eq!(form.time(StampKind::Unlock), "09:05");
        assert_eq!(form.time(StampKind::Lock), "--:--");
    }

    #[test]
    fn test_no_identity_shows_sentinel() {
        let local = MemoryStorage::new();
        let store = TimeStampStore::new(&local);
        let mut form = FormModel::new();
        form.set_time(StampKind::Lock, "10:00".to_string());
        store.load_times_for(None, &mut form, from_millis(T0));
        assert_eq!(form.time(StampKind::Lock), "--:--");
    }

    #[test]
    fn test_stamp_without_identity_only_displays() {
        let local = MemoryStorage::new();
        let store = TimeStampStore::new(&local);
        let mut form = FormModel::new();
        store.stamp(StampKind::Unlock, None, &mut form, from_millis(T0));
        assert_eq!(form.time(StampKind::Unlock), "09:05");
        assert!(local.is_empty());
    }

    #[test]
    fn test_expired_times_are_dropped() {
        let local = MemoryStorage::new();
        let store = TimeStampStore::new(&local);
        let mut form = FormModel::new();
        let id = set_identity(&mut form, "12-34");
        store.stamp(StampKind::Unlock, id.as_ref(), &mut form, from_millis(T0));
        store.load_times_for(id.as_ref(), &mut form, from_millis(T0 + TTL_MS + 1));
        assert_eq!(form.time(StampKind::Unlock), "--:--");
        assert!(local.is_empty());
    }

    #[test]
    fn test_adopt_times_stamped_before_identity() {
        let local = MemoryStorage::new();
        let store = TimeStampStore::new(&local);
        let mut form = FormModel::new();
        store.stamp(StampKind::Unlock, None, &mut form, from_millis(T0));
        let id = set_identity(&mut form, "12-34").unwrap();
        assert!(store.adopt(&id, &form, from_millis(T0 + 1000)));
        // 2回目は既存の記録があるので引き継がない
        assert!(!store.adopt(&id, &form, from_millis(T0 + 2000)));

        let mut other = FormModel::new();
        store.load_times_for(Some(&id), &mut other, from_millis(T0 + 3000));
        assert_eq!(other.time(StampKind::Unlock), "09:05");
    }

    #[test]
    fn test_storage_failure_keeps_display() {
        let local = MemoryStorage::rejecting();
        let store = TimeStampStore::new(&local);
        let mut form = FormModel::new();
        let id = set_identity(&mut form, "12-34");
        let note = store.stamp(StampKind::Unlock, id.as_ref(), &mut form, from_millis(T0));
        assert_eq!(note.time, "09:05");
        assert_eq!(form.time(StampKind::Unlock), "09:05");
    }
}
