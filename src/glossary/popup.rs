//! 点击高亮角色名后弹出的角色详情。

use serde::Serialize;

use super::html_utils::escape_html;
use super::markup::render_description;
use super::model::Glossary;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenderBadge {
    pub label: &'static str,
    pub css_class: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacterPopup {
    pub char_id: String,
    pub display_name: String,
    pub korean_name: String,
    pub gender: Option<GenderBadge>,
    /// 原始描述（终端显示用）
    pub description: String,
    pub description_html: String,
}

impl CharacterPopup {
    /// 名字下方那一行：原名 + 性别徽章。
    pub fn meta_html(&self) -> String {
        let mut html = format!(
            "<span class=\"popup-korean\">{}</span>",
            escape_html(&self.korean_name)
        );
        if let Some(badge) = &self.gender {
            html.push_str(&format!(
                "<span class=\"popup-gender {}\">{}</span>",
                badge.css_class, badge.label
            ));
        }
        html
    }
}

/// 按当前词表解析点击；未知 id 或没有描述时不弹窗。
pub fn resolve_click(glossary: &Glossary, char_id: &str) -> Option<CharacterPopup> {
    let entry = glossary.get(char_id)?;
    if !entry.has_description() {
        return None;
    }

    let gender = entry.gender.popup_label().map(|label| GenderBadge {
        label,
        css_class: entry.gender.css_class(),
    });

    Some(CharacterPopup {
        char_id: char_id.to_string(),
        display_name: entry.display_name().to_string(),
        korean_name: entry.korean_name.clone(),
        gender,
        description: entry.description.clone(),
        description_html: render_description(&entry.description),
    })
}
