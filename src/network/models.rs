//! 服务器接口的请求/响应结构。
//!
//! token 用量、费用、统计这类字段在服务端各处的形状不完全一致，保留为 `Value`，
//! 由上层用 `json_extract` 宽松读取。

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::base_system::json_extract::JsonMap;
use crate::glossary::model::{CharacterEntry, Glossary};

#[derive(Debug, Clone, Serialize)]
pub struct TranslateRequest<'a> {
    pub text: &'a str,
    pub novel_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<&'a str>,
    pub images: Vec<Value>,
    pub use_thinking_mode: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranslateResult {
    #[serde(default)]
    pub translated_text: String,
    #[serde(default)]
    pub model_used: Option<String>,
    #[serde(default)]
    pub token_usage: Option<Value>,
    #[serde(default)]
    pub cost_info: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EstimateResult {
    #[serde(default)]
    pub estimation: Option<Value>,
    #[serde(default)]
    pub cost_info: Option<Value>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveTranslationRequest<'a> {
    pub novel_id: &'a str,
    pub chapter_index: i64,
    pub translated_text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_title: Option<&'a str>,
}

/// `/api/check-chapter-translation` 的结果。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranslationCheck {
    #[serde(default)]
    pub translated: bool,
    #[serde(default)]
    pub translation_status: Option<String>,
    #[serde(default)]
    pub translated_content: Option<String>,
    #[serde(default)]
    pub translated_text: Option<String>,
    #[serde(default)]
    pub translated_title: Option<String>,
    #[serde(default)]
    pub translation_model: Option<String>,
}

impl TranslationCheck {
    /// 译文内容：优先 `translated_content`，其次 `translated_text`，空串视为没有。
    pub fn content(&self) -> Option<&str> {
        self.translated_content
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.translated_text.as_deref().filter(|s| !s.is_empty()))
    }

    pub fn status(&self) -> &str {
        self.translation_status.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenUsageHistory {
    /// 新的在前
    #[serde(default)]
    pub token_usage: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PricingEnvelope {
    #[serde(default)]
    pub pricing: Option<JsonMap>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferencesEnvelope {
    #[serde(default)]
    pub preferences: Option<JsonMap>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlossaryEnvelope {
    #[serde(default)]
    pub glossary: Glossary,
}

/// 漫画任务的词表可能是按 id 的对象，也可能是条目数组。
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GlossaryPayload {
    Keyed(Glossary),
    Listed(Vec<CharacterEntry>),
}

impl GlossaryPayload {
    pub fn into_glossary(self) -> Glossary {
        match self {
            GlossaryPayload::Keyed(g) => g,
            GlossaryPayload::Listed(list) => list
                .into_iter()
                .enumerate()
                .map(|(i, entry)| (format!("char_{i}"), entry))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlossaryPayloadEnvelope {
    pub glossary: GlossaryPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AutoDetectResult {
    #[serde(default)]
    pub characters: Vec<String>,
    #[serde(default)]
    pub translations: JsonMap,
    #[serde(default)]
    pub genders: JsonMap,
    /// 数字（从 0 开始的章节序号）或说明文字
    #[serde(default)]
    pub chapter_scanned: Option<Value>,
    #[serde(default)]
    pub stats: Option<JsonMap>,
    #[serde(default)]
    pub debug_info: Option<JsonMap>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShareLink {
    #[serde(default)]
    pub share_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoverUpload {
    #[serde(default)]
    pub cover_url: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NovelBrief {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub chapter_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChapterSide {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub translated_title: Option<String>,
    #[serde(default)]
    pub has_translation: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl ChapterSide {
    /// 译名优先，其次原标题。
    pub fn display_title(&self) -> &str {
        self.translated_title
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.title.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChapterConflict {
    #[serde(default, deserialize_with = "chapter_number_string")]
    pub chapter_number: String,
    #[serde(default)]
    pub source: ChapterSide,
    #[serde(default)]
    pub target: ChapterSide,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MergePreview {
    #[serde(default)]
    pub source_novel: NovelBrief,
    #[serde(default)]
    pub target_novel: NovelBrief,
    /// 字段名 → `{source: {...}, target: {...}}`
    #[serde(default)]
    pub metadata_conflicts: JsonMap,
    #[serde(default)]
    pub chapter_conflicts: Vec<ChapterConflict>,
    #[serde(default)]
    pub unique_source_chapters: Vec<Value>,
    #[serde(default)]
    pub unique_target_chapters: Vec<Value>,
    #[serde(default)]
    pub total_after_merge: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MergePreviewEnvelope {
    #[serde(default)]
    pub preview: MergePreview,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MergeResult {
    #[serde(default)]
    pub merged_novel_id: String,
    #[serde(default)]
    pub total_chapters: u64,
}

/// 章节号可能是数字也可能是字符串（如 "12-1"），统一成字符串。
fn chapter_number_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    Ok(match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn translate_request_omits_missing_chapter() {
        let req = TranslateRequest {
            text: "안녕",
            novel_id: "n1",
            chapter_id: None,
            images: Vec::new(),
            use_thinking_mode: true,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"text": "안녕", "novel_id": "n1", "images": [], "use_thinking_mode": true})
        );
    }

    #[test]
    fn check_prefers_translated_content() {
        let c: TranslationCheck = serde_json::from_value(json!({
            "translated": true,
            "translation_status": "completed",
            "translated_content": "",
            "translated_text": "Hello"
        }))
        .unwrap();
        assert_eq!(c.content(), Some("Hello"));
        assert_eq!(c.status(), "completed");

        let empty: TranslationCheck = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.content(), None);
        assert!(!empty.translated);
    }

    #[test]
    fn merge_preview_accepts_numeric_and_text_chapter_numbers() {
        let env: MergePreviewEnvelope = serde_json::from_value(json!({
            "preview": {
                "source_novel": {"id": "a", "title": "A", "chapter_count": 3},
                "target_novel": {"id": "b", "title": "B", "chapter_count": 2},
                "metadata_conflicts": {},
                "chapter_conflicts": [
                    {"chapter_number": 2, "source": {"title": "S2", "has_translation": true}, "target": {"title": "T2"}},
                    {"chapter_number": "3-1", "source": {}, "target": {}}
                ],
                "unique_source_chapters": [1],
                "unique_target_chapters": [],
                "total_after_merge": 3
            }
        }))
        .unwrap();
        let p = env.preview;
        assert_eq!(p.chapter_conflicts[0].chapter_number, "2");
        assert_eq!(p.chapter_conflicts[1].chapter_number, "3-1");
        assert_eq!(p.chapter_conflicts[0].source.display_title(), "S2");
        assert_eq!(p.total_after_merge, 3);
    }

    #[test]
    fn listed_glossary_gets_positional_ids() {
        let env: GlossaryPayloadEnvelope = serde_json::from_value(json!({
            "glossary": [
                {"korean_name": "김민준", "english_name": "Kim Min-jun", "gender": "male"},
                {"korean_name": "이서", "english_name": "Lee Seo", "gender": "robot"}
            ]
        }))
        .unwrap();
        let g = env.glossary.into_glossary();
        assert_eq!(g.len(), 2);
        assert_eq!(g.get("char_1").unwrap().english_name, "Lee Seo");

        let env: GlossaryPayloadEnvelope = serde_json::from_value(json!({
            "glossary": {"hero": {"korean_name": "김", "english_name": "Kim"}}
        }))
        .unwrap();
        assert!(env.glossary.into_glossary().get("hero").is_some());
    }

    #[test]
    fn side_title_falls_back_to_original() {
        let side = ChapterSide {
            title: Some("원제".into()),
            translated_title: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(side.display_title(), "원제");
    }
}
