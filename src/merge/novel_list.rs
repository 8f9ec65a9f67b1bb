//! 从首页 HTML 中解析可合并的小说列表。

use regex::Regex;
use std::sync::OnceLock;

use crate::glossary::html_utils::{decode_entities, strip_tags};
use crate::network::{ApiClient, ApiError};

fn re_anchor() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a\s*>").unwrap())
}

fn re_class() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r#"(?i)\bclass\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap())
}

fn re_href() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap())
}

fn re_novel_path() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"/novel/([^/?#]+)").unwrap())
}

fn re_h2() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?is)<h2\b[^>]*>(.*?)</h2\s*>").unwrap())
}

const CARD_CLASS: &str = "novel-card-link";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NovelOption {
    pub id: String,
    pub title: String,
}

fn attr<'a>(re: &Regex, attrs: &'a str) -> Option<&'a str> {
    let caps = re.captures(attrs)?;
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
}

/// 卡片链接 `/novel/{id}`，标题取 `<h2>` 文本，没有 `<h2>` 时用 id。当前小说不列出。
pub fn parse_novel_list(html: &str, source_id: &str) -> Vec<NovelOption> {
    let mut out = Vec::new();
    for caps in re_anchor().captures_iter(html) {
        let attrs = caps.get(1).map_or("", |m| m.as_str());
        let is_card = attr(re_class(), attrs)
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == CARD_CLASS));
        if !is_card {
            continue;
        }
        let Some(href) = attr(re_href(), attrs).map(decode_entities) else {
            continue;
        };
        let Some(id) = re_novel_path()
            .captures(&href)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
        else {
            continue;
        };
        if id == source_id {
            continue;
        }

        let body = caps.get(2).map_or("", |m| m.as_str());
        let title = match re_h2().captures(body).and_then(|c| c.get(1)) {
            Some(h2) => decode_entities(&strip_tags(h2.as_str())).trim().to_string(),
            None => id.clone(),
        };
        out.push(NovelOption { id, title });
    }
    out
}

/// 标题或 id 包含查询串（不区分大小写）。空查询返回全部。
pub fn search<'a>(novels: &'a [NovelOption], query: &str) -> Vec<&'a NovelOption> {
    let q = query.trim().to_lowercase();
    novels
        .iter()
        .filter(|n| {
            q.is_empty() || n.title.to_lowercase().contains(&q) || n.id.to_lowercase().contains(&q)
        })
        .collect()
}

pub fn load_novel_list(api: &ApiClient, source_id: &str) -> Result<Vec<NovelOption>, ApiError> {
    let html = api.home_page()?;
    Ok(parse_novel_list(&html, source_id))
}
