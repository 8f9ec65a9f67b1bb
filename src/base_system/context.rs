//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成 `config.yml` 的字段元信息。

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::{ConfigSpec, FieldMeta};
use super::poll::PollPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 服务器配置
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub session_cookie: String,
    #[serde(default)]
    pub csrf_token: String,

    // 网络配置
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    // 轮询配置
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_poll_max_interval_ms")]
    pub poll_max_interval_ms: u64,
    #[serde(default = "default_poll_backoff")]
    pub poll_backoff: f64,
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,

    // 显示配置
    #[serde(default = "default_true")]
    pub show_translation_cost: bool,
    #[serde(default = "default_true")]
    pub confirm_estimate: bool,
    #[serde(default = "default_wrap_width")]
    pub wrap_width: usize,

    // 本地缓存
    #[serde(default)]
    pub cache_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            session_cookie: String::new(),
            csrf_token: String::new(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_max_interval_ms: default_poll_max_interval_ms(),
            poll_backoff: default_poll_backoff(),
            poll_max_attempts: default_poll_max_attempts(),
            show_translation_cost: default_true(),
            confirm_estimate: default_true(),
            wrap_width: default_wrap_width(),
            cache_dir: String::new(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 13] = [
            FieldMeta {
                name: "base_url",
                description: "翻译服务器地址，例如 http://127.0.0.1:5000",
            },
            FieldMeta {
                name: "session_cookie",
                description: "登录后的 session Cookie（形如 session=xxx；留空表示匿名）",
            },
            FieldMeta {
                name: "csrf_token",
                description: "CSRF Token（留空时自动从页面 meta 标签或 Cookie 获取）",
            },
            FieldMeta {
                name: "request_timeout",
                description: "请求超时时间（秒），翻译请求可能较慢",
            },
            FieldMeta {
                name: "connect_timeout",
                description: "连接超时时间（秒）",
            },
            FieldMeta {
                name: "poll_interval_ms",
                description: "后台翻译状态轮询间隔, 单位ms",
            },
            FieldMeta {
                name: "poll_max_interval_ms",
                description: "轮询退避的最大间隔, 单位ms",
            },
            FieldMeta {
                name: "poll_backoff",
                description: "每次轮询后间隔的放大倍数（1.0 表示固定间隔）",
            },
            FieldMeta {
                name: "poll_max_attempts",
                description: "最大轮询次数",
            },
            FieldMeta {
                name: "show_translation_cost",
                description: "是否显示 Token 用量与费用（服务器设置为 false 时同样隐藏）",
            },
            FieldMeta {
                name: "confirm_estimate",
                description: "翻译前先估算 Token 并确认",
            },
            FieldMeta {
                name: "wrap_width",
                description: "终端输出的换行宽度",
            },
            FieldMeta {
                name: "cache_dir",
                description: "本地缓存目录（价格表、阅读偏好），留空使用数据目录下的 cache",
            },
        ];
        &FIELDS
    }
}

impl Config {
    pub fn base_url(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout.max(1))
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_interval: Duration::from_millis(
                self.poll_max_interval_ms.max(self.poll_interval_ms),
            ),
            backoff: if self.poll_backoff.is_finite() && self.poll_backoff >= 1.0 {
                self.poll_backoff
            } else {
                1.0
            },
            max_attempts: self.poll_max_attempts.max(1),
        }
    }

    pub fn cache_dir(&self, data_dir: Option<&std::path::Path>) -> PathBuf {
        if !self.cache_dir.trim().is_empty() {
            return PathBuf::from(self.cache_dir.trim());
        }
        match data_dir {
            Some(dir) => dir.join("cache"),
            None => PathBuf::from("cache"),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_request_timeout() -> u64 {
    300
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_poll_max_interval_ms() -> u64 {
    15000
}

fn default_poll_backoff() -> f64 {
    1.2
}

fn default_poll_max_attempts() -> u32 {
    100
}

fn default_wrap_width() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_meta_covers_every_serialized_key() {
        let value = serde_yaml::to_value(Config::default()).unwrap();
        let serde_yaml::Value::Mapping(map) = value else {
            panic!("config should serialize to a mapping");
        };
        assert_eq!(map.len(), Config::fields().len());
        for field in Config::fields() {
            assert!(
                map.contains_key(serde_yaml::Value::String(field.name.to_string())),
                "missing {}",
                field.name
            );
        }
    }

    #[test]
    fn base_url_is_normalized() {
        let cfg = Config {
            base_url: " http://host:5000/ ".to_string(),
            ..Config::default()
        };
        assert_eq!(cfg.base_url(), "http://host:5000");
    }

    #[test]
    fn poll_policy_clamps_bad_values() {
        let cfg = Config {
            poll_backoff: 0.5,
            poll_max_attempts: 0,
            poll_interval_ms: 4000,
            poll_max_interval_ms: 1000,
            ..Config::default()
        };
        let policy = cfg.poll_policy();
        assert_eq!(policy.backoff, 1.0);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.max_interval, Duration::from_millis(4000));
    }
}
