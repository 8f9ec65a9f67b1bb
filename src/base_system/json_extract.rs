//! 宽松的 JSON 取值工具：服务器返回的数字有时是字符串，字段名也可能有多种写法。

use serde_json::Value;

pub type JsonMap = serde_json::Map<String, Value>;

/// 数字或数字字符串都接受；字符串只取开头可解析的部分（"0.5/1k" → 0.5）。
pub fn as_f64_lenient(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => parse_float_prefix(s),
        _ => None,
    }
}

pub fn as_u64_lenient(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// 依次尝试多个键名，返回第一个非空的字符串（数字也转成字符串）。
pub fn pick_string(map: &JsonMap, keys: &[&str]) -> Option<String> {
    for key in keys {
        match map.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn parse_float_prefix(s: &str) -> Option<f64> {
    let t = s.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (i, ch) in t.char_indices() {
        match ch {
            '0'..='9' => {
                seen_digit = true;
                end = i + 1;
            }
            '.' if !seen_dot => {
                seen_dot = true;
                end = i + 1;
            }
            '-' | '+' if i == 0 => end = i + 1,
            _ => break,
        }
    }
    if !seen_digit {
        return None;
    }
    t[..end].parse::<f64>().ok().filter(|f| f.is_finite())
}
