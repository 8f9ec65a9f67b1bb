//! 角色描述的轻量格式化：`**粗体**`、`*斜体*`、`- ` 列表行、换行。
//!
//! 先整体转义，再对转义后的文本做固定顺序的单趟替换，不递归、不识别其它语法。

use regex::Regex;
use std::sync::OnceLock;

use super::html_utils::escape_html;

fn re_bold() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"\*\*(.*?)\*\*").unwrap())
}

fn re_italic() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"\*(.*?)\*").unwrap())
}

fn re_list_item() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?m)^- (.*?)$").unwrap())
}

fn re_list_block() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?s)(<li>.*</li>)").unwrap())
}

pub fn render_description(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let escaped = escape_html(&text.replace("\r\n", "\n"));
    let html = re_bold().replace_all(&escaped, "<strong>$1</strong>");
    let html = re_italic().replace_all(&html, "<em>$1</em>");
    let html = re_list_item().replace_all(&html, "<li>$1</li>");
    let html = html.replace('\n', "<br>");

    if html.contains("<li>") {
        // 第一个 <li> 到最后一个 </li> 包成一个列表
        return re_list_block().replace(&html, "<ul>$1</ul>").into_owned();
    }
    html
}
