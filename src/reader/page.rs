//! 章节页数据（页面内嵌的 `chapterData`）。

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::glossary::model::Glossary;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChapterImage {
    #[serde(default)]
    pub local_path: String,
    #[serde(default)]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterPageData {
    pub novel_id: String,
    #[serde(default)]
    pub chapter_id: String,
    #[serde(default)]
    pub chapter_index: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub translated_title: String,
    #[serde(default)]
    pub korean_text: String,
    #[serde(default)]
    pub translated_text: String,
    #[serde(default)]
    pub translation_model: String,
    #[serde(default)]
    pub glossary: Glossary,
    #[serde(default)]
    pub images: Vec<ChapterImage>,
}

impl ChapterPageData {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("无法读取章节数据 {}", path.display()))?;
        let page: Self = serde_json::from_str(&raw)
            .with_context(|| format!("章节数据格式错误 {}", path.display()))?;
        Ok(page)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw).with_context(|| format!("无法写入章节数据 {}", path.display()))?;
        Ok(())
    }

    pub fn is_translated(&self) -> bool {
        !self.translated_text.trim().is_empty()
    }

    pub fn chapter_id(&self) -> Option<&str> {
        Some(self.chapter_id.as_str()).filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_page_data() {
        let page: ChapterPageData = serde_json::from_str(
            r#"{"novelId":"n1","chapterId":"c9","chapterIndex":3,"title":"1화",
                "koreanText":"안녕","translatedText":"  ","translationModel":"gpt-4o",
                "glossary":{"x":{"english_name":"Kim","description":"d"}},
                "images":[{"local_path":"u/1.png","alt":null}]}"#,
        )
        .unwrap();
        assert_eq!(page.chapter_index, 3);
        assert!(!page.is_translated());
        assert_eq!(page.chapter_id(), Some("c9"));
        assert_eq!(page.glossary.len(), 1);
        assert_eq!(page.images[0].local_path, "u/1.png");
        assert_eq!(page.images[0].alt, None);
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.json");
        let page = ChapterPageData {
            novel_id: "n".into(),
            translated_text: "Hello".into(),
            ..Default::default()
        };
        page.save(&path).unwrap();
        let back = ChapterPageData::load(&path).unwrap();
        assert_eq!(back.translated_text, "Hello");
        assert!(back.is_translated());
        assert_eq!(back.chapter_id(), None);
    }
}
