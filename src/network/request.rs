//! 发送前的请求描述。
//!
//! 先把请求组装成与 HTTP 库无关的 [`Outgoing`]，附加 CSRF 后再交给 reqwest，
//! 这样 token 的附加规则可以脱离网络单独测试。

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Method;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    File {
        file_name: String,
        mime: String,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: String,
    pub value: FieldValue,
}

impl FormField {
    pub fn text(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: FieldValue::Text(value.to_string()),
        }
    }

    pub fn file(name: &str, file_name: &str, mime: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            value: FieldValue::File {
                file_name: file_name.to_string(),
                mime: mime.to_string(),
                bytes,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(Value),
    Multipart(Vec<FormField>),
}

#[derive(Debug, Clone)]
pub struct Outgoing {
    pub method: Method,
    /// 以 `/` 开头的路径，可带查询串
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl Outgoing {
    pub fn new(method: Method, path: impl Into<String>, body: Body) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path, Body::Empty)
    }

    pub fn post_json(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path, Body::Json(body))
    }

    pub fn put_json(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path, Body::Json(body))
    }

    /// GET/HEAD 之外的请求都要带 CSRF token。
    pub fn is_mutating(&self) -> bool {
        !matches!(self.method, Method::GET | Method::HEAD)
    }
}

/// `encodeURIComponent` 保留不编码的字符。
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// 路径段编码（对应浏览器的 `encodeURIComponent`）。
pub fn encode_segment(raw: &str) -> String {
    utf8_percent_encode(raw, URI_COMPONENT).to_string()
}

/// 根据扩展名猜测图片 MIME；不在允许列表内返回 `None`。
pub fn image_mime(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn segments_are_percent_encoded() {
        assert_eq!(encode_segment("my novel/1"), "my%20novel%2F1");
        assert_eq!(encode_segment("소설"), "%EC%86%8C%EC%84%A4");
        assert_eq!(encode_segment("a-b_c.d~"), "a-b_c.d~");
        assert_eq!(encode_segment("it's (1)!*"), "it's%20(1)!*");
        assert_eq!(encode_segment("a?b#c&d=e"), "a%3Fb%23c%26d%3De");
    }

    #[test]
    fn only_get_is_not_mutating() {
        assert!(!Outgoing::get("/api/settings").is_mutating());
        assert!(Outgoing::post_json("/api/translate", json!({})).is_mutating());
        assert!(Outgoing::put_json("/api/webtoon/job/1/glossary", json!({})).is_mutating());
    }

    #[test]
    fn image_types() {
        assert_eq!(image_mime("cover.JPG"), Some("image/jpeg"));
        assert_eq!(image_mime("a.webp"), Some("image/webp"));
        assert_eq!(image_mime("notes.txt"), None);
        assert_eq!(image_mime("noext"), None);
    }
}
