//! token 用量与费用的显示。

use serde_json::Value;

use crate::base_system::json_extract::{JsonMap, as_f64_lenient, as_u64_lenient};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// 缺失或为 0 的 total 用 input + output 补上。
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let input = field_u64(map, "input_tokens");
        let output = field_u64(map, "output_tokens");
        let total = match field_u64(map, "total_tokens") {
            0 => input + output,
            t => t,
        };
        Some(Self {
            input_tokens: input,
            output_tokens: output,
            total_tokens: total,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostInfo {
    pub pricing_available: bool,
    pub total_cost: Option<f64>,
    pub input_cost: Option<f64>,
    pub output_cost: Option<f64>,
    pub model: Option<String>,
}

impl CostInfo {
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let breakdown = map.get("breakdown").and_then(Value::as_object);
        Some(Self {
            pricing_available: map
                .get("pricing_available")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            total_cost: map.get("total_cost").and_then(as_f64_lenient),
            input_cost: breakdown.and_then(|b| b.get("input_cost")).and_then(as_f64_lenient),
            output_cost: breakdown.and_then(|b| b.get("output_cost")).and_then(as_f64_lenient),
            model: map.get("model").and_then(Value::as_str).map(str::to_string),
        })
    }

    /// 可以展示的总价；价格不可用时为 `None`。
    pub fn displayable(&self) -> Option<f64> {
        if self.pricing_available {
            self.total_cost
        } else {
            None
        }
    }
}

fn field_u64(map: &JsonMap, key: &str) -> u64 {
    map.get(key).and_then(as_u64_lenient).unwrap_or(0)
}

/// 千分位逗号：`1234567` → `"1,234,567"`。
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// 金额越小保留的小数越多。
pub fn format_cost(cost: f64) -> String {
    if cost < 0.01 {
        format!("${cost:.4}")
    } else if cost < 1.0 {
        format!("${cost:.3}")
    } else {
        format!("${cost:.2}")
    }
}

/// 译完后显示的一行用量。
pub fn usage_line(usage: &TokenUsage, cost: Option<&CostInfo>) -> String {
    let mut line = format!(
        "Input: {} | Output: {} | Total: {}",
        format_number(usage.input_tokens),
        format_number(usage.output_tokens),
        format_number(usage.total_tokens)
    );
    if let Some(c) = cost.and_then(CostInfo::displayable) {
        line.push_str(&format!(" (Est. {})", format_cost(c)));
    }
    line
}

/// 翻译前的预估确认文字。
pub fn estimate_message(estimation: &TokenUsage, cost: Option<&CostInfo>) -> String {
    let mut msg = format!(
        "Estimated Token Usage:\n\nInput: ~{} tokens\nOutput: ~{} tokens\nTotal: ~{} tokens\n",
        format_number(estimation.input_tokens),
        format_number(estimation.output_tokens),
        format_number(estimation.total_tokens)
    );
    match cost.and_then(CostInfo::displayable) {
        Some(c) => msg.push_str(&format!("\nEstimated Cost: {}\n", format_cost(c))),
        None => msg.push_str(
            "\nUse these counts with your provider's pricing or set model values (Values button) to auto-calculate cost.\n",
        ),
    }
    msg.push_str("\nProceed with translation?");
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn thousands_separators() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn cost_precision_tiers() {
        assert_eq!(format_cost(0.00123), "$0.0012");
        assert_eq!(format_cost(0.5), "$0.500");
        assert_eq!(format_cost(0.0999), "$0.100");
        assert_eq!(format_cost(12.346), "$12.35");
        assert_eq!(format_cost(0.0), "$0.0000");
    }

    #[test]
    fn usage_total_falls_back_to_sum() {
        let u = TokenUsage::from_value(&json!({"input_tokens": 1200, "output_tokens": "800"})).unwrap();
        assert_eq!(u.total_tokens, 2000);
        let u = TokenUsage::from_value(&json!({"input_tokens": 1, "output_tokens": 2, "total_tokens": 10}))
            .unwrap();
        assert_eq!(u.total_tokens, 10);
        assert!(TokenUsage::from_value(&json!(null)).is_none());
    }

    #[test]
    fn cost_only_shown_when_pricing_available() {
        let usage = TokenUsage {
            input_tokens: 1500,
            output_tokens: 500,
            total_tokens: 2000,
        };
        let unavailable = CostInfo::from_value(&json!({"pricing_available": false, "total_cost": 1.0})).unwrap();
        assert_eq!(
            usage_line(&usage, Some(&unavailable)),
            "Input: 1,500 | Output: 500 | Total: 2,000"
        );

        let available = CostInfo::from_value(&json!({
            "pricing_available": true,
            "total_cost": 0.0042,
            "breakdown": {"input_cost": 0.003, "output_cost": 0.0012}
        }))
        .unwrap();
        assert_eq!(available.input_cost, Some(0.003));
        assert_eq!(
            usage_line(&usage, Some(&available)),
            "Input: 1,500 | Output: 500 | Total: 2,000 (Est. $0.0042)"
        );
    }

    #[test]
    fn estimate_text() {
        let est = TokenUsage {
            input_tokens: 12000,
            output_tokens: 9000,
            total_tokens: 21000,
        };
        let cost = CostInfo {
            pricing_available: true,
            total_cost: Some(0.25),
            ..Default::default()
        };
        assert_eq!(
            estimate_message(&est, Some(&cost)),
            "Estimated Token Usage:\n\nInput: ~12,000 tokens\nOutput: ~9,000 tokens\nTotal: ~21,000 tokens\n\
             \nEstimated Cost: $0.250\n\nProceed with translation?"
        );
        assert!(estimate_message(&est, None).contains("Values button"));
    }
}
