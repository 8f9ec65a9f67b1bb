//! CSRF Token 的获取与附加。
//!
//! 获取顺序：配置里写死的 token → 首页 `<meta name="csrf-token">` → `csrf_token` Cookie。
//! 附加方式：JSON/空请求体放 `X-CSRFToken` 头；multipart 请求体追加 `csrf_token` 字段。

use percent_encoding::percent_decode_str;
use regex::Regex;
use std::sync::OnceLock;

use super::request::{Body, FormField, Outgoing};

pub const CSRF_HEADER: &str = "X-CSRFToken";
pub const CSRF_FIELD: &str = "csrf_token";
pub const CSRF_COOKIE: &str = "csrf_token";

fn re_meta_tag() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r#"(?is)<meta\b[^>]*>"#).unwrap())
}

fn re_attr() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r#"(?is)\b(name|content)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap())
}

/// 从页面 HTML 中找 `<meta name="csrf-token" content="...">`，属性顺序不限。
pub fn token_from_meta(html: &str) -> Option<String> {
    for tag in re_meta_tag().find_iter(html) {
        let mut name = None;
        let mut content = None;
        for caps in re_attr().captures_iter(tag.as_str()) {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().to_string());
            match caps[1].to_ascii_lowercase().as_str() {
                "name" => name = value,
                "content" => content = value,
                _ => {}
            }
        }
        if name.as_deref() == Some("csrf-token")
            && let Some(token) = content.filter(|c| !c.trim().is_empty())
        {
            return Some(token.trim().to_string());
        }
    }
    None
}

/// 从 `Cookie`/`Set-Cookie` 样式的字符串里取 `csrf_token`，并做百分号解码。
pub fn token_from_cookie_header(header: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == CSRF_COOKIE)
        .map(|(_, value)| percent_decode_str(value.trim()).decode_utf8_lossy().into_owned())
        .filter(|v| !v.is_empty())
}

/// 按请求体类型附加 token。
pub fn attach(out: &mut Outgoing, token: &str) {
    match &mut out.body {
        Body::Multipart(fields) => fields.push(FormField::text(CSRF_FIELD, token)),
        Body::Empty | Body::Json(_) => out
            .headers
            .push((CSRF_HEADER.to_string(), token.to_string())),
    }
}
