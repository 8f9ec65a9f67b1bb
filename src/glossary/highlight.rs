//! 译文中的角色名高亮。
//!
//! 做法：
//! 1. 选出可高亮的角色（有译名、描述去空白后非空）
//! 2. 按译名长度（字符数）从长到短稳定排序，同长度保持词表顺序
//! 3. 依次在原文上做“整词、忽略大小写、按字面”的匹配，命中区间登记到占用表；
//!    与已占用区间重叠的命中作废，并从下一个字符继续找
//! 4. 一次性输出：区间之间的文本转义，区间本身包成 `<span>`
//!
//! 因为匹配发生在转义前的原文上，角色名不可能命中 `&amp;` 之类的实体内部，
//! 去掉所有 span 后得到的正好是整段文本的转义结果。

use std::collections::BTreeMap;

use regex::Regex;
use tracing::{debug, warn};

use super::html_utils::push_escaped;
use super::model::Glossary;

pub const HIGHLIGHT_CLASS: &str = "character-highlight";
pub const DESCRIPTION_CLASS: &str = "has-description";

/// 一个高亮区间（原文字节偏移）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightSpan {
    pub char_id: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HighlightedView {
    pub html: String,
    pub spans: Vec<HighlightSpan>,
}

impl HighlightedView {
    /// 页面上“已绑定点击”的角色 id（按出现顺序，去重）。
    pub fn bound_ids(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for span in &self.spans {
            if !out.contains(&span.char_id.as_str()) {
                out.push(&span.char_id);
            }
        }
        out
    }
}

/// 已占用区间：start → (end, 角色 id)。区间互不重叠。
#[derive(Debug, Default)]
struct Claims<'g> {
    by_start: BTreeMap<usize, (usize, &'g str)>,
}

impl<'g> Claims<'g> {
    fn overlaps(&self, start: usize, end: usize) -> bool {
        self.by_start
            .range(..end)
            .next_back()
            .is_some_and(|(_, (claimed_end, _))| *claimed_end > start)
    }

    fn claim(&mut self, start: usize, end: usize, id: &'g str) {
        self.by_start.insert(start, (end, id));
    }
}

pub fn highlight(text: &str, glossary: &Glossary) -> HighlightedView {
    if text.is_empty() {
        return HighlightedView::default();
    }

    let mut candidates: Vec<(&str, &str)> = glossary
        .iter()
        .filter(|(_, entry)| entry.is_highlightable())
        .map(|(id, entry)| (id, entry.english_name.trim()))
        .collect();
    // sort_by_key 是稳定排序：同长度保持词表顺序
    candidates.sort_by_key(|(_, name)| std::cmp::Reverse(name.chars().count()));

    let mut claims = Claims::default();
    for (id, name) in candidates {
        let Some(re) = name_pattern(name) else {
            warn!("角色名无法生成匹配规则，跳过: {}", name);
            continue;
        };
        claim_matches(text, &re, id, &mut claims);
    }

    let view = materialize(text, &claims);
    debug!("高亮完成：{} 处角色名", view.spans.len());
    view
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// 名字两端是单词字符时才要求单词边界；以标点结尾的名字（如 "Dr."）照样能匹配。
fn name_pattern(name: &str) -> Option<Regex> {
    let first = name.chars().next()?;
    let last = name.chars().next_back()?;
    let lead = if is_word_char(first) { r"\b" } else { "" };
    let tail = if is_word_char(last) { r"\b" } else { "" };
    Regex::new(&format!("(?i){lead}{}{tail}", regex::escape(name))).ok()
}

fn claim_matches<'g>(text: &str, re: &Regex, id: &'g str, claims: &mut Claims<'g>) {
    let mut pos = 0;
    while pos < text.len() {
        let Some(m) = re.find_at(text, pos) else {
            break;
        };
        if m.start() == m.end() {
            break;
        }
        if claims.overlaps(m.start(), m.end()) {
            pos = next_char_boundary(text, m.start());
            continue;
        }
        claims.claim(m.start(), m.end(), id);
        pos = m.end();
    }
}

fn next_char_boundary(text: &str, at: usize) -> usize {
    text[at..]
        .chars()
        .next()
        .map_or(text.len(), |c| at + c.len_utf8())
}

fn materialize(text: &str, claims: &Claims<'_>) -> HighlightedView {
    let mut html = String::with_capacity(text.len() + claims.by_start.len() * 80);
    let mut spans = Vec::with_capacity(claims.by_start.len());
    let mut cursor = 0;

    for (&start, &(end, id)) in &claims.by_start {
        push_escaped(&mut html, &text[cursor..start]);
        html.push_str("<span class=\"");
        html.push_str(HIGHLIGHT_CLASS);
        html.push(' ');
        html.push_str(DESCRIPTION_CLASS);
        html.push_str("\" data-char-id=\"");
        push_escaped(&mut html, id);
        html.push_str("\">");
        push_escaped(&mut html, &text[start..end]);
        html.push_str("</span>");

        spans.push(HighlightSpan {
            char_id: id.to_string(),
            start,
            end,
        });
        cursor = end;
    }
    push_escaped(&mut html, &text[cursor..]);

    HighlightedView { html, spans }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glossary::html_utils::{escape_html, strip_tags};
    use crate::glossary::model::CharacterEntry;

    fn entry(name: &str, description: &str) -> CharacterEntry {
        CharacterEntry {
            english_name: name.to_string(),
            description: description.to_string(),
            ..Default::default()
        }
    }

    fn glossary(items: &[(&str, &str, &str)]) -> Glossary {
        items
            .iter()
            .map(|(id, name, desc)| (id.to_string(), entry(name, desc)))
            .collect()
    }

    fn count_spans(html: &str) -> usize {
        html.matches("<span ").count()
    }

    #[test]
    fn empty_glossary_is_plain_escape() {
        let text = "<b>Kim</b> & \"friends\"";
        let view = highlight(text, &Glossary::new());
        assert_eq!(view.html, escape_html(text));
        assert!(view.spans.is_empty());
    }

    #[test]
    fn scenario_long_and_short_names() {
        let g = glossary(&[("c1", "Kim Min-jun", "lead"), ("c2", "Kim", "side")]);
        let view = highlight("Kim Min-jun met Kim today.", &g);

        assert_eq!(
            view.html,
            "<span class=\"character-highlight has-description\" data-char-id=\"c1\">Kim Min-jun</span> met \
             <span class=\"character-highlight has-description\" data-char-id=\"c2\">Kim</span> today."
        );
        assert_eq!(view.spans.len(), 2);
        assert_eq!(view.spans[0].char_id, "c1");
        assert_eq!(view.spans[1].char_id, "c2");
    }

    #[test]
    fn prefix_name_never_truncates_longer_name() {
        // 短名字排在词表前面也一样
        let g = glossary(&[("short", "An", "x"), ("long", "An Seo-yeon", "y")]);
        let view = highlight("An Seo-yeon arrived.", &g);
        assert_eq!(view.spans.len(), 1);
        assert_eq!(view.spans[0].char_id, "long");
        assert!(view.html.contains(">An Seo-yeon</span>"));
    }

    #[test]
    fn whole_word_only() {
        let g = glossary(&[("c1", "An", "has description")]);
        let html = highlight("Andromeda and Dan", &g).html;
        assert_eq!(count_spans(&html), 0);
        assert_eq!(html, "Andromeda and Dan");
    }

    #[test]
    fn case_insensitive_and_keeps_original_case() {
        let g = glossary(&[("c1", "kim", "desc")]);
        let html = highlight("Kim and KIM", &g).html;
        assert_eq!(count_spans(&html), 2);
        assert!(html.contains(">Kim</span>"));
        assert!(html.contains(">KIM</span>"));
    }

    #[test]
    fn entries_without_description_are_ignored() {
        let g = glossary(&[("c1", "Kim", "   "), ("c2", "Lee", "")]);
        let html = highlight("Kim met Lee.", &g).html;
        assert_eq!(count_spans(&html), 0);
        assert_eq!(html, "Kim met Lee.");
    }

    #[test]
    fn stripping_spans_round_trips_to_escaped_text() {
        let g = glossary(&[
            ("c1", "Kim Min-jun", "lead"),
            ("c2", "Kim", "side"),
            ("c3", "Tom & Jerry", "duo"),
        ]);
        let text = "<p>Kim Min-jun & Kim</p> said \"Tom & Jerry\" isn't Kimchi.";
        let view = highlight(text, &g);
        assert_eq!(strip_tags(&view.html), escape_html(text));
        assert_eq!(view.spans.len(), 3);
    }

    #[test]
    fn names_are_literal_not_patterns() {
        let g = glossary(&[("c1", "J.(R)", "odd"), ("c2", "Dr.", "doctor")]);
        let view = highlight("Jx(R) met J.(R) and Dr. Who", &g);
        let ids: Vec<&str> = view.spans.iter().map(|s| s.char_id.as_str()).collect();
        assert_eq!(ids, ["c1", "c2"]);
        assert!(view.html.contains(">J.(R)</span>"));
        assert!(view.html.contains(">Dr.</span>"));
    }

    #[test]
    fn duplicate_names_first_entry_wins() {
        let g = glossary(&[("first", "Hana", "a"), ("second", "Hana", "b")]);
        let view = highlight("Hana smiled at Hana.", &g);
        assert_eq!(view.spans.len(), 2);
        assert!(view.spans.iter().all(|s| s.char_id == "first"));
        assert_eq!(view.bound_ids(), ["first"]);
    }

    #[test]
    fn rejected_overlap_does_not_hide_later_match() {
        // "Min Kim" 先占用；"Kim Lee" 第一次命中与之重叠，后面独立的 "Kim Lee" 仍应命中
        let g = glossary(&[("a", "Min Kim", "x"), ("b", "Kim Lee", "y")]);
        let view = highlight("Min Kim Lee and Kim Lee", &g);
        let ids: Vec<&str> = view.spans.iter().map(|s| s.char_id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(&"Min Kim Lee and Kim Lee"[view.spans[1].start..view.spans[1].end], "Kim Lee");
    }

    #[test]
    fn char_id_is_escaped_in_attribute() {
        let g = glossary(&[("x\"><script>", "Kim", "desc")]);
        let html = highlight("Kim", &g).html;
        assert!(html.contains("data-char-id=\"x&quot;&gt;&lt;script&gt;\""));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn unicode_names_and_text() {
        let g = glossary(&[("c1", "김민준", "주인공"), ("c2", "Élodie", "guest")]);
        let text = "김민준과 élodie, 그리고 김민준.";
        let view = highlight(text, &g);
        // "김민준과" 中 김민준 后面紧跟韩文字符，不是整词
        assert_eq!(view.spans.len(), 2);
        assert_eq!(strip_tags(&view.html), escape_html(text));
    }

    #[test]
    fn empty_text_is_empty_output() {
        let g = glossary(&[("c1", "Kim", "desc")]);
        assert_eq!(highlight("", &g).html, "");
    }
}
