//! 阅读偏好（配色、字号、行高、字体、宽度、对齐）。
//!
//! 读取：服务器 → 本地缓存（叠加在默认值上）→ 默认值；服务器读取成功时刷新缓存。
//! 保存：合并局部修改，写缓存，再推送到服务器（失败只记日志）。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::base_system::json_extract::JsonMap;
use crate::base_system::local_store::LocalStore;
use crate::network::{ApiClient, ApiError};

pub const PREFS_CACHE_KEY: &str = "lf_reading_prefs";

pub trait PreferencesApi {
    fn fetch_preferences(&self) -> Result<Option<JsonMap>, ApiError>;
    fn push_preferences(&self, prefs: &Value) -> Result<(), ApiError>;
}

impl PreferencesApi for ApiClient {
    fn fetch_preferences(&self) -> Result<Option<JsonMap>, ApiError> {
        self.reading_preferences()
    }

    fn push_preferences(&self, prefs: &Value) -> Result<(), ApiError> {
        self.save_reading_preferences(prefs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorMode {
    #[default]
    Light,
    Dark,
    Sepia,
    HighContrast,
    #[serde(other)]
    Unknown,
}

impl ColorMode {
    pub fn css_class(self) -> Option<&'static str> {
        match self {
            ColorMode::Dark => Some("dark-mode"),
            ColorMode::Sepia => Some("sepia-mode"),
            ColorMode::HighContrast => Some("high-contrast-mode"),
            ColorMode::Light | ColorMode::Unknown => None,
        }
    }
}

/// 字段名与页面一致（camelCase）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReadingPrefs {
    pub color_mode: ColorMode,
    pub font_size: Value,
    pub line_height: Value,
    pub font_family: String,
    pub reading_width: String,
    pub text_alignment: String,
}

impl Default for ReadingPrefs {
    fn default() -> Self {
        Self {
            color_mode: ColorMode::Light,
            font_size: Value::from(16),
            line_height: Value::from("1.8"),
            font_family: "var(--font-serif)".to_string(),
            reading_width: "720px".to_string(),
            text_alignment: "left".to_string(),
        }
    }
}

/// 应用到页面上的结果：根元素的配色 class 与正文区域的样式。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedStyle {
    pub color_class: Option<&'static str>,
    pub css: String,
}

impl ReadingPrefs {
    pub fn apply(&self) -> AppliedStyle {
        AppliedStyle {
            color_class: self.color_mode.css_class(),
            css: format!(
                ".text-content, .panel-content {{ font-size: {}px; line-height: {}; font-family: {}; max-width: {}; text-align: {}; }}",
                plain(&self.font_size),
                plain(&self.line_height),
                self.font_family,
                self.reading_width,
                self.text_alignment
            ),
        }
    }

    fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn plain(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 把 `patch` 中已知的键逐个覆盖到 `base` 上。未知键丢弃；类型不对的键单独跳过，不影响其它键。
fn merge_over(base: &ReadingPrefs, patch: &JsonMap) -> ReadingPrefs {
    let mut merged = match base.to_value() {
        Value::Object(m) => m,
        _ => JsonMap::new(),
    };
    for (k, v) in patch {
        if !merged.contains_key(k) {
            debug!("忽略未知的阅读偏好键: {}", k);
            continue;
        }
        let previous = merged.insert(k.clone(), v.clone());
        if let Err(e) = serde_json::from_value::<ReadingPrefs>(Value::Object(merged.clone())) {
            warn!("阅读偏好 {} 的值不正确，已忽略: {}", k, e);
            if let Some(prev) = previous {
                merged.insert(k.clone(), prev);
            }
        }
    }
    serde_json::from_value(Value::Object(merged)).unwrap_or_else(|e| {
        warn!("阅读偏好格式不正确，已忽略修改: {}", e);
        base.clone()
    })
}

#[derive(Debug, Clone)]
pub struct PrefsStore {
    cache: LocalStore,
    current: ReadingPrefs,
}

impl PrefsStore {
    pub fn new(cache: LocalStore) -> Self {
        Self {
            cache,
            current: ReadingPrefs::default(),
        }
    }

    pub fn current(&self) -> &ReadingPrefs {
        &self.current
    }

    pub fn load(&mut self, api: &dyn PreferencesApi) -> &ReadingPrefs {
        match api.fetch_preferences() {
            Ok(Some(remote)) => {
                self.current = merge_over(&ReadingPrefs::default(), &remote);
                self.cache.set_or_warn(PREFS_CACHE_KEY, &self.current);
                return &self.current;
            }
            Ok(None) => debug!("服务器没有保存的阅读偏好"),
            Err(e) => warn!("获取阅读偏好失败，使用本地缓存或默认值: {}", e),
        }

        self.current = match self.cache.get_or_warn::<JsonMap>(PREFS_CACHE_KEY) {
            Some(cached) => merge_over(&ReadingPrefs::default(), &cached),
            None => ReadingPrefs::default(),
        };
        &self.current
    }

    pub fn save(&mut self, api: &dyn PreferencesApi, patch: &JsonMap) -> &ReadingPrefs {
        self.current = merge_over(&self.current, patch);
        self.cache.set_or_warn(PREFS_CACHE_KEY, &self.current);
        if let Err(e) = api.push_preferences(&self.current.to_value()) {
            error!("保存阅读偏好到服务器失败: {}", e);
        }
        &self.current
    }

    pub fn reset(&mut self, api: &dyn PreferencesApi) -> &ReadingPrefs {
        self.current = ReadingPrefs::default();
        let all = match self.current.to_value() {
            Value::Object(m) => m,
            _ => JsonMap::new(),
        };
        self.save(api, &all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    #[derive(Default)]
    struct FakeApi {
        remote: Option<JsonMap>,
        pushed: RefCell<Vec<Value>>,
    }

    impl PreferencesApi for FakeApi {
        fn fetch_preferences(&self) -> Result<Option<JsonMap>, ApiError> {
            self.remote
                .clone()
                .map(Some)
                .ok_or_else(|| ApiError::Server("offline".into()))
        }

        fn push_preferences(&self, prefs: &Value) -> Result<(), ApiError> {
            self.pushed.borrow_mut().push(prefs.clone());
            Ok(())
        }
    }

    fn patch(v: Value) -> JsonMap {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn defaults_apply() {
        let style = ReadingPrefs::default().apply();
        assert_eq!(style.color_class, None);
        assert_eq!(
            style.css,
            ".text-content, .panel-content { font-size: 16px; line-height: 1.8; font-family: var(--font-serif); max-width: 720px; text-align: left; }"
        );
    }

    #[test]
    fn color_classes() {
        let p: ReadingPrefs = serde_json::from_value(json!({"colorMode": "high-contrast"})).unwrap();
        assert_eq!(p.apply().color_class, Some("high-contrast-mode"));
        let p: ReadingPrefs = serde_json::from_value(json!({"colorMode": "neon"})).unwrap();
        assert_eq!(p.apply().color_class, None);
        assert_eq!(p.font_family, "var(--font-serif)");
    }

    #[test]
    fn offline_uses_cache_over_defaults_then_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::default();

        let mut store = PrefsStore::new(LocalStore::new(dir.path()));
        assert_eq!(store.load(&api), &ReadingPrefs::default());

        store.save(&api, &patch(json!({"colorMode": "dark", "fontSize": 20})));
        assert_eq!(api.pushed.borrow().len(), 1);
        assert_eq!(api.pushed.borrow()[0]["fontSize"], json!(20));

        let mut fresh = PrefsStore::new(LocalStore::new(dir.path()));
        let loaded = fresh.load(&api);
        assert_eq!(loaded.color_mode, ColorMode::Dark);
        assert_eq!(loaded.font_size, json!(20));
        assert_eq!(loaded.reading_width, "720px");
    }

    #[test]
    fn remote_wins_and_refreshes_cache() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi {
            remote: Some(patch(json!({"colorMode": "sepia", "textAlignment": "justify"}))),
            ..Default::default()
        };
        let mut store = PrefsStore::new(LocalStore::new(dir.path()));
        assert_eq!(store.load(&api).color_mode, ColorMode::Sepia);

        let cached: JsonMap = LocalStore::new(dir.path()).get(PREFS_CACHE_KEY).unwrap().unwrap();
        assert_eq!(cached["textAlignment"], json!("justify"));
    }

    #[test]
    fn bad_field_only_drops_itself() {
        let merged = merge_over(
            &ReadingPrefs::default(),
            &patch(json!({
                "colorMode": null,
                "fontFamily": "Georgia",
                "textAlignment": "justify",
                "legacyTheme": "blue"
            })),
        );
        assert_eq!(merged.color_mode, ColorMode::Light);
        assert_eq!(merged.font_family, "Georgia");
        assert_eq!(merged.text_alignment, "justify");
        let value = merged.to_value();
        assert!(value.get("legacyTheme").is_none());
    }

    #[test]
    fn reset_restores_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::default();
        let mut store = PrefsStore::new(LocalStore::new(dir.path()));
        store.save(&api, &patch(json!({"colorMode": "dark"})));
        assert_eq!(store.reset(&api), &ReadingPrefs::default());
        assert_eq!(api.pushed.borrow().len(), 2);
    }
}
