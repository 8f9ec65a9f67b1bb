//! 价格表与阅读偏好。

use anyhow::{Result, bail};
use clap::Subcommand;
use serde_json::Value;

use super::AppContext;
use crate::base_system::json_extract::JsonMap;
use crate::reader::pricing::{PricingStore, set_model_price};
use crate::reader::reading_prefs::{PrefsStore, ReadingPrefs};

#[derive(Debug, Subcommand)]
pub enum PricingCommand {
    /// 显示当前价格表
    Show,
    /// 设置某个模型每千 token 的价格（模型名 `default` 作为兜底）
    Set {
        model: String,
        input_per_1k: f64,
        output_per_1k: f64,
    },
    /// 删除某个模型的价格
    Remove { model: String },
}

#[derive(Debug, Subcommand)]
pub enum PrefsCommand {
    /// 显示当前阅读偏好及对应样式
    Show,
    /// 修改偏好，例如 `colorMode=dark fontSize=18`
    Set {
        #[arg(required = true)]
        pairs: Vec<String>,
    },
    /// 恢复默认
    Reset,
}

pub(super) fn pricing(ctx: &AppContext, cmd: PricingCommand) -> Result<()> {
    let api = ctx.api()?;
    let store = PricingStore::new(ctx.cache());
    let mut table = store.load(&api);
    match cmd {
        PricingCommand::Show => {
            if table.is_empty() {
                println!("尚未设置任何模型价格");
                return Ok(());
            }
            for (model, price) in &table {
                let get = |k: &str| price.get(k).map(Value::to_string).unwrap_or_default();
                ctx.print(&format!(
                    "{model}: input {} / output {} (per 1k tokens)",
                    get("input_per_1k"),
                    get("output_per_1k")
                ));
            }
        }
        PricingCommand::Set {
            model,
            input_per_1k,
            output_per_1k,
        } => {
            if input_per_1k < 0.0 || output_per_1k < 0.0 {
                bail!("价格不能为负数");
            }
            set_model_price(&mut table, &model, input_per_1k, output_per_1k);
            store.save(&api, &table);
            println!("✓ Pricing saved for {model}");
        }
        PricingCommand::Remove { model } => {
            if table.remove(&model).is_none() {
                println!("价格表中没有 {model}");
                return Ok(());
            }
            store.save(&api, &table);
            println!("✓ Pricing removed for {model}");
        }
    }
    Ok(())
}

/// `key=value`；值能按 JSON 解析就按 JSON，否则当作字符串。
fn parse_pairs(pairs: &[String]) -> Result<JsonMap> {
    let mut patch = JsonMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("格式应为 key=value: {pair}");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("缺少键名: {pair}");
        }
        let value = value.trim();
        let parsed = serde_json::from_str::<Value>(value)
            .ok()
            .filter(|v| !v.is_object() && !v.is_array())
            .unwrap_or_else(|| Value::from(value));
        patch.insert(key.to_string(), parsed);
    }
    Ok(patch)
}

fn show_prefs(ctx: &AppContext, prefs: &ReadingPrefs) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(prefs)?);
    let style = prefs.apply();
    ctx.print(&format!("class: {}", style.color_class.unwrap_or("(none)")));
    ctx.print(&style.css);
    Ok(())
}

pub(super) fn prefs(ctx: &AppContext, cmd: PrefsCommand) -> Result<()> {
    let api = ctx.api()?;
    let mut store = PrefsStore::new(ctx.cache());
    store.load(&api);
    match cmd {
        PrefsCommand::Show => show_prefs(ctx, store.current()),
        PrefsCommand::Set { pairs } => {
            let patch = parse_pairs(&pairs)?;
            let prefs = store.save(&api, &patch).clone();
            show_prefs(ctx, &prefs)
        }
        PrefsCommand::Reset => {
            let prefs = store.reset(&api).clone();
            show_prefs(ctx, &prefs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pairs_are_typed_when_possible() {
        let patch = parse_pairs(&[
            "fontSize=18".to_string(),
            "colorMode=dark".to_string(),
            "lineHeight=\"2.0\"".to_string(),
            "fontFamily=[1]".to_string(),
        ])
        .unwrap();
        assert_eq!(patch["fontSize"], json!(18));
        assert_eq!(patch["colorMode"], json!("dark"));
        assert_eq!(patch["lineHeight"], json!("2.0"));
        assert_eq!(patch["fontFamily"], json!("[1]"));
    }

    #[test]
    fn malformed_pairs_rejected() {
        assert!(parse_pairs(&["fontSize".to_string()]).is_err());
        assert!(parse_pairs(&["=1".to_string()]).is_err());
    }
}
