//! 本地 JSON 缓存（相当于页面里的 localStorage）。
//!
//! 每个 key 对应缓存目录下的一个 `<key>.json` 文件，写入时先写临时文件再原子替换。

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid json in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Json { path, source })
    }

    /// 读取失败（损坏/无权限）时记录警告并当作不存在。
    pub fn get_or_warn<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.get(key) {
            Ok(v) => v,
            Err(e) => {
                warn!("读取本地缓存 {} 失败: {}", key, e);
                None
            }
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(key);
        let bytes = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;

        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(&bytes).map_err(io_err)?;
        tmp.persist(&path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    pub fn set_or_warn<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(e) = self.set(key, value) {
            warn!("写入本地缓存 {} 失败: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn missing_key_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let v: Option<BTreeMap<String, u32>> = store.get("nothing").unwrap();
        assert!(v.is_none());
    }

    #[test]
    fn set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("nested"));
        let mut map = BTreeMap::new();
        map.insert("fontSize".to_string(), 18u32);
        store.set("lf_reading_prefs", &map).unwrap();

        let back: BTreeMap<String, u32> = store.get("lf_reading_prefs").unwrap().unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn corrupted_file_is_an_error_but_warn_variant_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        fs::write(dir.path().join("broken.json"), b"{not json").unwrap();

        assert!(matches!(
            store.get::<BTreeMap<String, u32>>("broken"),
            Err(StoreError::Json { .. })
        ));
        assert!(store.get_or_warn::<BTreeMap<String, u32>>("broken").is_none());
    }

    #[test]
    fn keys_are_sanitized_into_file_names() {
        let store = LocalStore::new("/tmp/x");
        assert_eq!(
            store.path_for("../evil key"),
            PathBuf::from("/tmp/x/___evil_key.json")
        );
    }
}
