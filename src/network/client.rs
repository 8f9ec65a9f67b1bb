//! 翻译服务器的 HTTP 客户端（阻塞式）。

use std::path::Path;
use std::sync::{Arc, Mutex};

use reqwest::blocking::{Client, multipart};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::ApiError;
use super::csrf;
use super::models::*;
use super::request::{Body, FieldValue, FormField, Outgoing, encode_segment, image_mime};
use crate::base_system::context::Config;
use crate::base_system::json_extract::JsonMap;
use crate::glossary::model::Glossary;

const CLIENT_UA: &str = concat!("novel-reader-client/", env!("CARGO_PKG_VERSION"));

pub struct ApiClient {
    client: Client,
    base_url: String,
    jar: Arc<Jar>,
    configured_token: Option<String>,
    csrf_cache: Mutex<Option<String>>,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let base_url = config.base_url().to_string();
        let jar = Arc::new(Jar::default());
        if let Some(cookie) = session_cookie_pair(&config.session_cookie) {
            match Url::parse(&base_url) {
                Ok(url) => jar.add_cookie_str(&cookie, &url),
                Err(e) => warn!("base_url 无法解析，登录 Cookie 未设置: {}", e),
            }
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/html;q=0.9, */*;q=0.8"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_UA));

        let client = Client::builder()
            .default_headers(headers)
            .cookie_provider(jar.clone())
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;

        let configured_token = Some(config.csrf_token.trim().to_string()).filter(|t| !t.is_empty());

        Ok(Self {
            client,
            base_url,
            jar,
            configured_token,
            csrf_cache: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    // ---------------------------------------------------------------
    // 底层收发
    // ---------------------------------------------------------------

    /// 取 CSRF token：配置 → 首页 meta → Cookie；拿到后缓存。
    fn csrf_token(&self) -> Option<String> {
        if let Some(t) = &self.configured_token {
            return Some(t.clone());
        }
        if let Ok(cache) = self.csrf_cache.lock()
            && let Some(t) = cache.as_ref()
        {
            return Some(t.clone());
        }

        let from_meta = match self.fetch_text("/") {
            Ok(html) => csrf::token_from_meta(&html),
            Err(e) => {
                debug!("获取首页失败，无法从 meta 读取 CSRF token: {}", e);
                None
            }
        };
        let token = from_meta.or_else(|| self.token_from_cookies());

        match &token {
            Some(_) => {
                if let Ok(mut cache) = self.csrf_cache.lock() {
                    *cache = token.clone();
                }
            }
            None => warn!("未找到 CSRF token，请求将不带 token 发送"),
        }
        token
    }

    fn token_from_cookies(&self) -> Option<String> {
        let url = Url::parse(&self.base_url).ok()?;
        let header = self.jar.cookies(&url)?;
        csrf::token_from_cookie_header(header.to_str().ok()?)
    }

    fn send(&self, mut out: Outgoing) -> Result<(StatusCode, String), ApiError> {
        if out.is_mutating()
            && let Some(token) = self.csrf_token()
        {
            csrf::attach(&mut out, &token);
        }

        let url = self.url(&out.path);
        debug!("{} {}", out.method, url);
        let mut req = self.client.request(out.method.clone(), &url);
        for (name, value) in &out.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        req = match out.body {
            Body::Empty => req,
            Body::Json(value) => req.json(&value),
            Body::Multipart(fields) => req.multipart(build_form(fields)?),
        };

        let resp = req.send()?;
        let status = resp.status();
        let text = resp.text()?;
        Ok((status, text))
    }

    /// 发送并按 JSON 解析；非 2xx 但带 `error` 的 JSON 视为应用层失败。
    fn send_json(&self, out: Outgoing) -> Result<Value, ApiError> {
        let (status, text) = self.send(out)?;
        match serde_json::from_str::<Value>(&text) {
            Ok(value) if status.is_success() => Ok(value),
            Ok(value) => Err(match error_text(&value) {
                Some(msg) => ApiError::Server(msg),
                None => ApiError::Status {
                    status: status.as_u16(),
                    message: status.canonical_reason().unwrap_or("").to_string(),
                },
            }),
            Err(e) if status.is_success() => Err(ApiError::Decode(e.to_string())),
            Err(_) => Err(ApiError::Status {
                status: status.as_u16(),
                message: snippet(&text),
            }),
        }
    }

    /// 需要 `success: true` 的接口。
    fn call<T: DeserializeOwned>(&self, out: Outgoing, default_error: &str) -> Result<T, ApiError> {
        let value = self.send_json(out)?;
        ensure_success(&value, default_error)?;
        serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// 直接返回数据、不带 `success` 字段的接口。
    fn call_plain<T: DeserializeOwned>(&self, out: Outgoing) -> Result<T, ApiError> {
        let value = self.send_json(out)?;
        serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn fetch_text(&self, path: &str) -> Result<String, ApiError> {
        let (status, text) = self.send(Outgoing::get(path))?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: snippet(&text),
            });
        }
        Ok(text)
    }

    // ---------------------------------------------------------------
    // 章节翻译
    // ---------------------------------------------------------------

    pub fn translate(&self, req: &TranslateRequest<'_>) -> Result<TranslateResult, ApiError> {
        self.call(
            Outgoing::post_json("/api/translate", to_json(req)?),
            "Translation failed",
        )
    }

    pub fn estimate(&self, req: &TranslateRequest<'_>) -> Result<EstimateResult, ApiError> {
        let mut body = to_json(req)?;
        if let Some(obj) = body.as_object_mut() {
            obj.remove("chapter_id");
        }
        self.call(
            Outgoing::post_json("/api/translate/estimate", body),
            "Estimation failed",
        )
    }

    pub fn save_translation(&self, req: &SaveTranslationRequest<'_>) -> Result<(), ApiError> {
        let _: Value = self.call(
            Outgoing::post_json("/api/save-translation", to_json(req)?),
            "Save failed",
        )?;
        Ok(())
    }

    pub fn check_chapter_translation(
        &self,
        novel_id: &str,
        chapter_index: i64,
    ) -> Result<TranslationCheck, ApiError> {
        self.call_plain(Outgoing::get(format!(
            "/api/check-chapter-translation?novel_id={}&chapter_index={}",
            encode_segment(novel_id),
            chapter_index
        )))
    }

    pub fn chapter_token_usage(&self, chapter_id: &str) -> Result<TokenUsageHistory, ApiError> {
        self.call(
            Outgoing::get(format!(
                "/api/chapter/{}/token-usage",
                encode_segment(chapter_id)
            )),
            "Failed to load token usage",
        )
    }

    /// `/api/settings` 直接返回设置对象。
    pub fn settings(&self) -> Result<JsonMap, ApiError> {
        self.call_plain(Outgoing::get("/api/settings"))
    }

    // ---------------------------------------------------------------
    // 价格与阅读偏好
    // ---------------------------------------------------------------

    pub fn pricing(&self) -> Result<Option<JsonMap>, ApiError> {
        let env: PricingEnvelope = self.call(Outgoing::get("/api/pricing"), "Failed to load pricing")?;
        Ok(env.pricing)
    }

    pub fn save_pricing(&self, pricing: &JsonMap) -> Result<(), ApiError> {
        let _: Value = self.call(
            Outgoing::post_json("/api/pricing", Value::Object(pricing.clone())),
            "Failed to save pricing",
        )?;
        Ok(())
    }

    pub fn reading_preferences(&self) -> Result<Option<JsonMap>, ApiError> {
        let env: PreferencesEnvelope = self.call(
            Outgoing::get("/api/reading-preferences"),
            "Failed to load reading preferences",
        )?;
        Ok(env.preferences)
    }

    pub fn save_reading_preferences(&self, prefs: &Value) -> Result<(), ApiError> {
        let _: Value = self.call(
            Outgoing::post_json("/api/reading-preferences", prefs.clone()),
            "Failed to save reading preferences",
        )?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // 角色词表 / 分享 / 封面
    // ---------------------------------------------------------------

    pub fn novel_glossary(&self, novel_id: &str) -> Result<Glossary, ApiError> {
        let env: GlossaryEnvelope = self.call(
            Outgoing::get(format!("/api/novel/{}/glossary", encode_segment(novel_id))),
            "Failed to load glossary",
        )?;
        Ok(env.glossary)
    }

    pub fn save_novel_glossary(&self, novel_id: &str, glossary: &Glossary) -> Result<(), ApiError> {
        let _: Value = self.call(
            Outgoing::post_json(
                format!("/api/novel/{}/glossary", encode_segment(novel_id)),
                json!({ "glossary": glossary }),
            ),
            "Failed to save glossary",
        )?;
        Ok(())
    }

    pub fn webtoon_glossary(&self, job_id: &str) -> Result<Glossary, ApiError> {
        let env: GlossaryPayloadEnvelope = self.call(
            Outgoing::get(format!("/api/webtoon/{}/glossary", encode_segment(job_id))),
            "Failed to load glossary",
        )?;
        Ok(env.glossary.into_glossary())
    }

    pub fn save_webtoon_glossary(&self, job_id: &str, glossary: &Glossary) -> Result<(), ApiError> {
        let _: Value = self.call(
            Outgoing::put_json(
                format!("/api/webtoon/job/{}/glossary", encode_segment(job_id)),
                json!({ "glossary": glossary }),
            ),
            "Failed to save glossary",
        )?;
        Ok(())
    }

    pub fn auto_detect_characters(
        &self,
        novel_id: &str,
        chapter_number: Option<i64>,
    ) -> Result<AutoDetectResult, ApiError> {
        let body = match chapter_number {
            Some(n) => json!({ "chapter_number": n }),
            None => json!({}),
        };
        self.call(
            Outgoing::post_json(
                format!(
                    "/api/novel/{}/auto-detect-characters",
                    encode_segment(novel_id)
                ),
                body,
            ),
            "Failed to detect characters",
        )
    }

    pub fn share(&self, novel_id: &str) -> Result<ShareLink, ApiError> {
        self.call(
            Outgoing::post_json(
                format!("/api/novel/{}/share", encode_segment(novel_id)),
                json!({}),
            ),
            "Failed to generate link",
        )
    }

    pub fn unshare(&self, novel_id: &str) -> Result<(), ApiError> {
        let _: Value = self.call(
            Outgoing::post_json(
                format!("/api/novel/{}/unshare", encode_segment(novel_id)),
                json!({}),
            ),
            "Failed to revoke link",
        )?;
        Ok(())
    }

    /// 上传封面（multipart，字段 `cover_image`）。扩展名不在允许列表时不发请求。
    pub fn upload_cover(&self, novel_id: &str, file: &Path) -> Result<CoverUpload, ApiError> {
        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let Some(mime) = image_mime(&file_name) else {
            return Err(ApiError::Rejected(
                "Invalid file type. Allowed: png, jpg, jpeg, gif, webp".to_string(),
            ));
        };
        let bytes = std::fs::read(file)
            .map_err(|e| ApiError::Rejected(format!("无法读取 {}: {}", file.display(), e)))?;
        info!("上传封面 {}（{} 字节）", file_name, bytes.len());

        self.call(
            Outgoing::new(
                reqwest::Method::POST,
                format!("/api/novel/{}/cover", encode_segment(novel_id)),
                Body::Multipart(vec![FormField::file("cover_image", &file_name, mime, bytes)]),
            ),
            "Failed to upload cover",
        )
    }

    // ---------------------------------------------------------------
    // 合并
    // ---------------------------------------------------------------

    /// 首页 HTML（合并向导从中解析小说列表）。
    pub fn home_page(&self) -> Result<String, ApiError> {
        self.fetch_text("/")
    }

    pub fn merge_preview(&self, source_id: &str, target_id: &str) -> Result<MergePreview, ApiError> {
        let env: MergePreviewEnvelope = self.call(
            Outgoing::post_json(
                format!("/api/novel/{}/merge/preview", encode_segment(source_id)),
                json!({ "target_novel_id": target_id }),
            ),
            "Failed to preview merge",
        )?;
        Ok(env.preview)
    }

    pub fn merge_execute(&self, source_id: &str, body: &Value) -> Result<MergeResult, ApiError> {
        self.call(
            Outgoing::post_json(
                format!("/api/novel/{}/merge/execute", encode_segment(source_id)),
                body.clone(),
            ),
            "Failed to merge novels",
        )
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

fn build_form(fields: Vec<FormField>) -> Result<multipart::Form, ApiError> {
    let mut form = multipart::Form::new();
    for field in fields {
        form = match field.value {
            FieldValue::Text(text) => form.text(field.name, text),
            FieldValue::File {
                file_name,
                mime,
                bytes,
            } => {
                let part = multipart::Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(&mime)?;
                form.part(field.name, part)
            }
        };
    }
    Ok(form)
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// 配置里可以只写 Cookie 值（默认名 `session`），也可以写完整的 `name=value`。
fn session_cookie_pair(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.contains('=') {
        Some(raw.to_string())
    } else {
        Some(format!("session={raw}"))
    }
}

fn error_text(value: &Value) -> Option<String> {
    ["error", "message"].iter().find_map(|k| {
        value
            .get(*k)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    })
}

fn ensure_success(value: &Value, default_error: &str) -> Result<(), ApiError> {
    if value.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(());
    }
    Err(ApiError::Server(
        value
            .get("error")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(default_error)
            .to_string(),
    ))
}

fn snippet(text: &str) -> String {
    let t = text.trim();
    let mut out: String = t.chars().take(200).collect();
    if t.chars().count() > 200 {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_handles_slashes() {
        assert_eq!(join_url("http://h:5000/", "/api/x"), "http://h:5000/api/x");
        assert_eq!(join_url("http://h:5000", "api/x"), "http://h:5000/api/x");
    }

    #[test]
    fn session_cookie_forms() {
        assert_eq!(session_cookie_pair("  "), None);
        assert_eq!(session_cookie_pair("abc"), Some("session=abc".to_string()));
        assert_eq!(session_cookie_pair("sid=abc"), Some("sid=abc".to_string()));
    }

    #[test]
    fn success_flag_is_required() {
        assert!(ensure_success(&json!({"success": true}), "x").is_ok());

        let err = ensure_success(&json!({"success": false, "error": "quota"}), "x").unwrap_err();
        assert_eq!(err.user_message(), "quota");

        let err = ensure_success(&json!({}), "Save failed").unwrap_err();
        assert_eq!(err.user_message(), "Save failed");
    }

    #[test]
    fn error_text_prefers_error_field() {
        assert_eq!(
            error_text(&json!({"error": "Novel not found", "message": "m"})),
            Some("Novel not found".to_string())
        );
        assert_eq!(error_text(&json!({"message": "m"})), Some("m".to_string()));
        assert_eq!(error_text(&json!({"error": ""})), None);
    }

    #[test]
    fn cover_upload_rejects_bad_extension_without_network() {
        let client = ApiClient::new(&Config {
            base_url: "http://127.0.0.1:9".to_string(),
            csrf_token: "t".to_string(),
            ..Config::default()
        })
        .unwrap();
        let err = client
            .upload_cover("n1", Path::new("notes.txt"))
            .unwrap_err();
        assert!(matches!(err, ApiError::Rejected(_)));
    }

    #[test]
    fn snippet_truncates() {
        let long = "x".repeat(300);
        assert_eq!(snippet(&long).chars().count(), 201);
        assert_eq!(snippet(" ok "), "ok");
    }
}
