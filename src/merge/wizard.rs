//! 合并预览 → 选择 → 执行。冲突本身由服务器计算，这里只整理成可选项并回传选择。

use serde::Serialize;
use serde_json::{Value, json};
use time::Date;
use time::macros::format_description;
use tracing::info;

use crate::base_system::json_extract::JsonMap;
use crate::network::models::{ChapterSide, MergePreview, MergeResult};
use crate::network::{ApiClient, ApiError};

pub const CONFIRM_MESSAGE: &str = "Are you sure you want to merge these novels?\n\nThis will combine all chapters and delete the target novel. This action cannot be undone!";
pub const NO_CONFLICTS_MESSAGE: &str = "No conflicts detected! The novels can be merged automatically.";
pub const NO_NOVELS_MESSAGE: &str = "No other novels found to merge with.";

/// 这些字段由服务器自动合并，不让用户选。
const AUTO_MERGED_FIELDS: [&str; 4] = ["tags", "translated_tags", "synopsis", "translated_synopsis"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Source,
    Target,
}

impl Side {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "source" | "s" => Some(Side::Source),
            "target" | "t" => Some(Side::Target),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Side::Source => "Source",
            Side::Target => "Target",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataChoice {
    pub field: String,
    pub label: &'static str,
    pub source_lines: Vec<String>,
    pub target_lines: Vec<String>,
    pub choice: Side,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideSummary {
    pub title: String,
    pub status: &'static str,
    pub date: String,
}

impl SideSummary {
    fn from_side(side: &ChapterSide) -> Self {
        Self {
            title: side.display_title().to_string(),
            status: if side.has_translation {
                "✓ Translated"
            } else {
                "⏳ Not translated"
            },
            date: format_date(side.created_at.as_deref()),
        }
    }

    pub fn line(&self) -> String {
        format!("{} | {} • {}", self.title, self.status, self.date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterChoice {
    pub chapter_number: String,
    pub source: SideSummary,
    pub target: SideSummary,
    pub choice: Side,
}

/// 时间戳只取日期部分；解析不了时显示 "Unknown date"。
pub fn format_date(raw: Option<&str>) -> String {
    let fmt = format_description!("[year]-[month]-[day]");
    raw.map(str::trim)
        .and_then(|s| s.get(..10))
        .and_then(|d| Date::parse(d, fmt).ok())
        .and_then(|d| d.format(fmt).ok())
        .unwrap_or_else(|| "Unknown date".to_string())
}

fn metadata_lines(field: &str, side: Option<&Value>) -> Vec<String> {
    let (original_key, translated_key) = match field {
        "title" => ("original_title", "translated_title"),
        _ => ("author", "translated_author"),
    };
    let text = |key: &str| {
        side.and_then(|v| v.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let mut lines = Vec::new();
    if let Some(v) = text(original_key) {
        lines.push(format!("Original: {v}"));
    }
    if let Some(v) = text(translated_key) {
        lines.push(format!("Translated: {v}"));
    }
    lines
}

#[derive(Debug, Clone)]
pub struct MergePlan {
    pub source_id: String,
    pub target_id: String,
    pub preview: MergePreview,
    pub metadata: Vec<MetadataChoice>,
    pub chapters: Vec<ChapterChoice>,
}

impl MergePlan {
    /// 默认全部选 source。
    pub fn from_preview(source_id: &str, target_id: &str, preview: MergePreview) -> Self {
        let metadata = preview
            .metadata_conflicts
            .iter()
            .filter(|(field, _)| !AUTO_MERGED_FIELDS.contains(&field.as_str()))
            .filter_map(|(field, values)| {
                let label = match field.as_str() {
                    "title" => "Title",
                    "author" => "Author",
                    _ => return None,
                };
                Some(MetadataChoice {
                    field: field.clone(),
                    label,
                    source_lines: metadata_lines(field, values.get("source")),
                    target_lines: metadata_lines(field, values.get("target")),
                    choice: Side::Source,
                })
            })
            .collect();

        let chapters = preview
            .chapter_conflicts
            .iter()
            .map(|c| ChapterChoice {
                chapter_number: c.chapter_number.clone(),
                source: SideSummary::from_side(&c.source),
                target: SideSummary::from_side(&c.target),
                choice: Side::Source,
            })
            .collect();

        Self {
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            preview,
            metadata,
            chapters,
        }
    }

    pub fn has_conflicts(&self) -> bool {
        !self.preview.metadata_conflicts.is_empty() || !self.preview.chapter_conflicts.is_empty()
    }

    pub fn heading(&self) -> String {
        let p = &self.preview;
        format!(
            "Merging {} ({} chapters) with {} ({} chapters)",
            p.source_novel.title,
            p.source_novel.chapter_count,
            p.target_novel.title,
            p.target_novel.chapter_count
        )
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let p = &self.preview;
        vec![
            format!("Total chapters after merge: {}", p.total_after_merge),
            format!("Unique chapters from source: {}", p.unique_source_chapters.len()),
            format!("Unique chapters from target: {}", p.unique_target_chapters.len()),
            format!("Conflicting chapters: {}", p.chapter_conflicts.len()),
        ]
    }

    pub fn choose_metadata(&mut self, field: &str, side: Side) -> bool {
        match self.metadata.iter_mut().find(|m| m.field == field) {
            Some(m) => {
                m.choice = side;
                true
            }
            None => false,
        }
    }

    pub fn choose_chapter(&mut self, chapter_number: &str, side: Side) -> bool {
        match self
            .chapters
            .iter_mut()
            .find(|c| c.chapter_number == chapter_number)
        {
            Some(c) => {
                c.choice = side;
                true
            }
            None => false,
        }
    }

    pub fn execute_body(&self) -> Value {
        let metadata: JsonMap = self
            .metadata
            .iter()
            .map(|m| (m.field.clone(), json!(m.choice)))
            .collect();
        let chapters: JsonMap = self
            .chapters
            .iter()
            .map(|c| (c.chapter_number.clone(), json!(c.choice)))
            .collect();
        json!({
            "target_novel_id": self.target_id,
            "metadata_choices": metadata,
            "chapter_choices": chapters,
        })
    }
}

pub fn preview(api: &ApiClient, source_id: &str, target_id: &str) -> Result<MergePlan, ApiError> {
    let preview = api.merge_preview(source_id, target_id)?;
    info!(
        "合并预览：{} 个章节冲突，{} 个元数据冲突",
        preview.chapter_conflicts.len(),
        preview.metadata_conflicts.len()
    );
    Ok(MergePlan::from_preview(source_id, target_id, preview))
}

pub fn execute(api: &ApiClient, plan: &MergePlan) -> Result<MergeResult, ApiError> {
    let result = api.merge_execute(&plan.source_id, &plan.execute_body())?;
    info!(
        "合并完成：{} -> {}，共 {} 章",
        plan.target_id, result.merged_novel_id, result.total_chapters
    );
    Ok(result)
}

pub fn success_message(result: &MergeResult) -> String {
    format!(
        "Novels merged successfully! Total chapters: {}",
        result.total_chapters
    )
}
