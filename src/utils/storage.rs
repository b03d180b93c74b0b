//! キー・バリューストレージ抽象
//!
//! ブラウザでは localStorage / sessionStorage、テストではメモリ上の実装を使う。

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("ストレージが利用できません")]
    Unavailable,
    #[error("ストレージへの書き込みに失敗しました: {0}")]
    Write(String),
}

pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str);
    fn keys(&self) -> Vec<String>;
}

/// web_sys::Storage のラッパー（取得できない環境では常に空）
#[derive(Clone, Default)]
pub struct WebStorage(Option<web_sys::Storage>);

impl WebStorage {
    /// localStorage（タブ・セッションをまたいで残る）
    #[cfg(target_arch = "wasm32")]
    pub fn local() -> Self {
        Self(web_sys::window().and_then(|w| w.local_storage().ok().flatten()))
    }

    /// sessionStorage（同一タブのリロードのみ）
    #[cfg(target_arch = "wasm32")]
    pub fn session() -> Self {
        Self(web_sys::window().and_then(|w| w.session_storage().ok().flatten()))
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn local() -> Self {
        Self(None)
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn session() -> Self {
        Self(None)
    }

    pub fn is_available(&self) -> bool {
        self.0.is_some()
    }
}

impl KeyValueStore for WebStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.0.as_ref()?.get_item(key).ok()?
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let storage = self.0.as_ref().ok_or(StorageError::Unavailable)?;
        storage
            .set_item(key, value)
            .map_err(|e| StorageError::Write(format!("{:?}", e)))
    }

    fn remove_item(&self, key: &str) {
        if let Some(storage) = &self.0 {
            let _ = storage.remove_item(key);
        }
    }

    fn keys(&self) -> Vec<String> {
        let Some(storage) = &self.0 else {
            return Vec::new();
        };
        let len = storage.length().unwrap_or(0);
        (0..len).filter_map(|i| storage.key(i).ok().flatten()).collect()
    }
}

/// メモリ上のストレージ（テスト・ストレージ無効時の代替）
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<BTreeMap<String, String>>,
    reject_writes: Cell<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 容量超過・プライベートモードを模して書き込みを拒否する
    pub fn rejecting() -> Self {
        let storage = Self::default();
        storage.reject_writes.set(true);
        storage
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.reject_writes.get() {
            return Err(StorageError::Write("QuotaExceededError".to_string()));
        }
        self.items.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) {
        self.items.borrow_mut().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.items.borrow().keys().cloned().collect()
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn get_item(&self, key: &str) -> Option<String> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) {
        (**self).remove_item(key)
    }

    fn keys(&self) -> Vec<String> {
        (**self).keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_basic() {
        let store = MemoryStorage::new();
        assert!(store.get_item("a").is_none());
        store.set_item("a", "1").unwrap();
        assert_eq!(store.get_item("a").as_deref(), Some("1"));
        store.remove_item("a");
        assert!(store.is_empty());
    }

    #[test]
    fn test_rejecting_storage_keeps_nothing() {
        let store = MemoryStorage::rejecting();
        assert!(store.set_item("a", "1").is_err());
        assert!(store.get_item("a").is_none());
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_web_storage_unavailable_off_browser() {
        let store = WebStorage::local();
        assert!(!store.is_available());
        assert_eq!(store.set_item("a", "1"), Err(StorageError::Unavailable));
        assert!(store.keys().is_empty());
    }
}
