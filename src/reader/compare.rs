//! 原文/译文对照视图。不做角色高亮，两侧都只是转义后的纯文本（前面附上章节插图）。

use super::page::{ChapterImage, ChapterPageData};
use crate::glossary::html_utils::{escape_html, push_escaped};

const DEFAULT_IMAGE_ALT: &str = "Chapter Image";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparePanels {
    pub original_html: String,
    pub translated_html: String,
}

pub fn compare_panels(page: &ChapterPageData) -> ComparePanels {
    let images = image_block(&page.images);
    ComparePanels {
        original_html: format!("{images}{}", escape_html(&page.korean_text)),
        translated_html: format!("{images}{}", escape_html(&page.translated_text)),
    }
}

fn image_block(images: &[ChapterImage]) -> String {
    if images.is_empty() {
        return String::new();
    }
    let mut html = String::from("<div class=\"chapter-images\">");
    for img in images {
        let alt = img
            .alt
            .as_deref()
            .filter(|a| !a.is_empty())
            .unwrap_or(DEFAULT_IMAGE_ALT);
        html.push_str("<div class=\"chapter-image\"><img src=\"/images/");
        push_escaped(&mut html, &img.local_path);
        html.push_str("\" alt=\"");
        push_escaped(&mut html, alt);
        html.push_str("\"></div>");
    }
    html.push_str("</div>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panels_are_escaped_and_unhighlighted() {
        let page = ChapterPageData {
            korean_text: "김민준 <원문>".into(),
            translated_text: "Kim Min-jun & co".into(),
            glossary: serde_json::from_str(r#"{"c1":{"english_name":"Kim Min-jun","description":"x"}}"#)
                .unwrap(),
            ..Default::default()
        };
        let p = compare_panels(&page);
        assert_eq!(p.original_html, "김민준 &lt;원문&gt;");
        assert_eq!(p.translated_html, "Kim Min-jun &amp; co");
    }

    #[test]
    fn images_precede_both_sides() {
        let page = ChapterPageData {
            korean_text: "a".into(),
            translated_text: "b".into(),
            images: vec![
                ChapterImage {
                    local_path: "u1/p\"1.png".into(),
                    alt: None,
                },
                ChapterImage {
                    local_path: "u1/p2.png".into(),
                    alt: Some("<map>".into()),
                },
            ],
            ..Default::default()
        };
        let p = compare_panels(&page);
        let expected_images = "<div class=\"chapter-images\">\
            <div class=\"chapter-image\"><img src=\"/images/u1/p&quot;1.png\" alt=\"Chapter Image\"></div>\
            <div class=\"chapter-image\"><img src=\"/images/u1/p2.png\" alt=\"&lt;map&gt;\"></div></div>";
        assert_eq!(p.original_html, format!("{expected_images}a"));
        assert_eq!(p.translated_html, format!("{expected_images}b"));
    }
}
