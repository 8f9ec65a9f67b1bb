//! 角色词表编辑器（小说设置页 / 漫画任务设置页共用）。

use serde_json::Value;
use tracing::{debug, info};

use super::html_utils::escape_html;
use super::model::{CharacterEntry, Gender, Glossary};
use crate::base_system::json_extract::{JsonMap, as_u64_lenient};
use crate::network::models::AutoDetectResult;
use crate::network::{ApiClient, ApiError};

/// 词表保存到哪里：小说用 POST，漫画任务用 PUT。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlossaryTarget {
    Novel(String),
    WebtoonJob(String),
}

impl GlossaryTarget {
    pub fn load(&self, api: &ApiClient) -> Result<Glossary, ApiError> {
        match self {
            GlossaryTarget::Novel(id) => api.novel_glossary(id),
            GlossaryTarget::WebtoonJob(id) => api.webtoon_glossary(id),
        }
    }

    pub fn save(&self, api: &ApiClient, glossary: &Glossary) -> Result<(), ApiError> {
        match self {
            GlossaryTarget::Novel(id) => api.save_novel_glossary(id, glossary),
            GlossaryTarget::WebtoonJob(id) => api.save_webtoon_glossary(id, glossary),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorEntry {
    pub korean_name: String,
    pub english_name: String,
    pub gender: Gender,
    pub description: String,
    /// 自动识别新加入、尚未保存
    pub is_new: bool,
}

impl EditorEntry {
    pub fn summary(&self) -> EntrySummary {
        EntrySummary {
            korean: non_empty_or(self.korean_name.trim(), "(Empty)"),
            english: non_empty_or(self.english_name.trim(), "(Not set)"),
            is_new: self.is_new,
            badge_text: self.gender.badge_text(),
            badge_class: self.gender.css_class(),
        }
    }

    fn is_blank(&self) -> bool {
        self.korean_name.trim().is_empty() && self.english_name.trim().is_empty()
    }
}

/// 条目折叠时显示的一行摘要。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySummary {
    pub korean: String,
    pub english: String,
    pub is_new: bool,
    pub badge_text: &'static str,
    pub badge_class: String,
}

impl EntrySummary {
    pub fn to_html(&self) -> String {
        let mut html = format!(
            "<span class=\"korean-name\">{}</span><span class=\"arrow\">→</span><span class=\"english-name\">{}</span>",
            escape_html(&self.korean),
            escape_html(&self.english)
        );
        if self.is_new {
            html.push_str("<span class=\"new-character-badge\">NEW</span>");
        }
        html.push_str(&format!(
            "<span class=\"gender-badge {}\">{}</span>",
            self.badge_class, self.badge_text
        ));
        html
    }

    /// 终端用的纯文本形式。
    pub fn to_line(&self) -> String {
        let new = if self.is_new { " [NEW]" } else { "" };
        format!("{} → {}{} [{}]", self.korean, self.english, new, self.badge_text)
    }
}

/// 自动识别合并结果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectReport {
    pub added: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct GlossaryEditor {
    target: GlossaryTarget,
    entries: Vec<EditorEntry>,
}

impl GlossaryEditor {
    pub fn new(target: GlossaryTarget, glossary: &Glossary) -> Self {
        let entries = glossary
            .iter()
            .map(|(_, e)| EditorEntry {
                korean_name: e.korean_name.clone(),
                english_name: e.english_name.clone(),
                gender: e.gender,
                description: e.description.clone(),
                is_new: false,
            })
            .collect();
        Self { target, entries }
    }

    pub fn entries(&self) -> &[EditorEntry] {
        &self.entries
    }

    pub fn entry_mut(&mut self, index: usize) -> Option<&mut EditorEntry> {
        self.entries.get_mut(index)
    }

    pub fn add(&mut self, entry: EditorEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    pub fn remove(&mut self, index: usize) -> Option<EditorEntry> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    /// 收集为词表：键为 `char_{序号}`（序号按编辑器中的位置），两个名字都为空的条目跳过。
    pub fn collect(&self) -> Glossary {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.is_blank())
            .map(|(index, e)| {
                (
                    format!("char_{index}"),
                    CharacterEntry {
                        korean_name: e.korean_name.trim().to_string(),
                        english_name: e.english_name.trim().to_string(),
                        gender: e.gender,
                        description: e.description.trim().to_string(),
                    },
                )
            })
            .collect()
    }

    /// 合并自动识别结果：已存在的原名跳过，其余作为新条目追加。
    pub fn merge_detected(&mut self, result: &AutoDetectResult) -> DetectReport {
        let mut existing: Vec<String> = self
            .entries
            .iter()
            .map(|e| e.korean_name.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();

        let mut report = DetectReport::default();
        for korean in &result.characters {
            if existing.iter().any(|n| n == korean) {
                report.skipped += 1;
                continue;
            }
            let english = result
                .translations
                .get(korean)
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            let gender = result
                .genders
                .get(korean)
                .and_then(Value::as_str)
                .map(Gender::parse)
                .unwrap_or_default();

            self.entries.push(EditorEntry {
                korean_name: korean.clone(),
                english_name: english,
                gender,
                description: String::new(),
                is_new: true,
            });
            existing.push(korean.clone());
            report.added += 1;
        }
        debug!("自动识别合并: 新增 {}，跳过 {}", report.added, report.skipped);
        report
    }

    /// 保存到服务器，返回保存的角色数。
    pub fn save(&mut self, api: &ApiClient) -> Result<usize, ApiError> {
        let glossary = self.collect();
        self.target.save(api, &glossary)?;
        for e in &mut self.entries {
            e.is_new = false;
        }
        info!("角色词表已保存（{} 个角色）", glossary.len());
        Ok(glossary.len())
    }
}

pub fn saved_message(count: usize) -> String {
    format!("✓ Character glossary saved! ({count} characters)")
}

/// 自动识别完成后给用户看的说明。
pub fn detect_report_message(report: &DetectReport, result: &AutoDetectResult) -> String {
    let mut msg = format!("✔ Auto-detected {} new character(s)!", report.added);
    if report.skipped > 0 {
        msg.push_str(&format!(" (Skipped {} duplicate(s))", report.skipped));
    }

    match &result.chapter_scanned {
        Some(Value::Number(n)) => {
            let shown = n.as_i64().map_or_else(|| n.to_string(), |i| (i + 1).to_string());
            msg.push_str(&format!("\n\nScanned: Chapter {shown}"));
        }
        Some(Value::String(s)) => msg.push_str(&format!("\n\nScanned: {s}")),
        _ => {}
    }

    if let Some(stats) = &result.stats {
        msg.push_str("\n\nDetection stats:");
        let mode = stats.get("detection_mode").and_then(Value::as_str);
        if let Some(mode) = mode.filter(|m| !m.is_empty()) {
            msg.push_str(&format!("\n• Mode: {mode}"));
        }
        match mode {
            Some("bilingual") => {
                msg.push_str(&format!("\n• English names found: {}", count(stats, "english_names_found")));
                msg.push_str(&format!("\n• Korean mapped: {}", count(stats, "korean_mapped")));
                msg.push_str(&format!("\n• Final count: {}", count(stats, "final_count")));
            }
            Some("korean_only") => {
                msg.push_str(&format!("\n• AI detected: {}", count(stats, "ai_detected")));
                msg.push_str(&format!("\n• Pattern detected: {}", count(stats, "pattern_detected")));
                msg.push_str(&format!("\n• After deduplication: {}", count(stats, "final_count")));
            }
            _ => {
                for (key, label) in [
                    ("ai_detected", "AI detected"),
                    ("pattern_detected", "Pattern detected"),
                    ("final_count", "Final count"),
                ] {
                    if let Some(v) = stats.get(key) {
                        msg.push_str(&format!("\n• {label}: {}", plain(v)));
                    }
                }
            }
        }
    }

    if let Some(debug_info) = &result.debug_info {
        msg.push_str("\n\nDebug Info:");
        let get = |k: &str| debug_info.get(k).map(plain).unwrap_or_else(|| "undefined".to_string());
        msg.push_str(&format!("\n• Trans Length: {}", get("translated_text_length")));
        msg.push_str(&format!("\n• Has Trans: {}", get("has_translation")));
    }
    msg
}

fn count(stats: &JsonMap, key: &str) -> u64 {
    stats.get(key).and_then(as_u64_lenient).unwrap_or(0)
}

fn plain(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn non_empty_or(s: &str, placeholder: &str) -> String {
    if s.is_empty() {
        placeholder.to_string()
    } else {
        s.to_string()
    }
}
