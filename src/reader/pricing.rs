//! 模型价格表：服务器优先，本地缓存兜底。

use serde_json::Value;
use tracing::{debug, warn};

use super::token_usage::{CostInfo, TokenUsage};
use crate::base_system::json_extract::{JsonMap, as_f64_lenient};
use crate::base_system::local_store::LocalStore;
use crate::network::{ApiClient, ApiError};

pub const PRICING_CACHE_KEY: &str = "lf_model_pricing";

pub trait PricingApi {
    fn fetch_pricing(&self) -> Result<Option<JsonMap>, ApiError>;
    fn push_pricing(&self, pricing: &JsonMap) -> Result<(), ApiError>;
}

impl PricingApi for ApiClient {
    fn fetch_pricing(&self) -> Result<Option<JsonMap>, ApiError> {
        self.pricing()
    }

    fn push_pricing(&self, pricing: &JsonMap) -> Result<(), ApiError> {
        self.save_pricing(pricing)
    }
}

#[derive(Debug, Clone)]
pub struct PricingStore {
    cache: LocalStore,
}

impl PricingStore {
    pub fn new(cache: LocalStore) -> Self {
        Self { cache }
    }

    /// 服务器 → 本地缓存 → 空表。
    pub fn load(&self, api: &dyn PricingApi) -> JsonMap {
        match api.fetch_pricing() {
            Ok(Some(pricing)) => return pricing,
            Ok(None) => debug!("服务器未返回价格表，改用本地缓存"),
            Err(e) => debug!("获取价格表失败，改用本地缓存: {}", e),
        }
        self.cache
            .get_or_warn::<JsonMap>(PRICING_CACHE_KEY)
            .unwrap_or_default()
    }

    /// 先推送到服务器，再写本地缓存；两步都失败也不报错。
    pub fn save(&self, api: &dyn PricingApi, pricing: &JsonMap) {
        if let Err(e) = api.push_pricing(pricing) {
            warn!("保存价格表到服务器失败: {}", e);
        }
        self.cache.set_or_warn(PRICING_CACHE_KEY, pricing);
    }
}

/// 按每千 token 单价算费用；模型没有单独定价时用 `default`。
pub fn compute_cost_from_pricing(
    estimation: &TokenUsage,
    model: &str,
    pricing: &JsonMap,
) -> Option<CostInfo> {
    let entry = pricing
        .get(model)
        .filter(|v| !v.is_null())
        .or_else(|| pricing.get("default").filter(|v| !v.is_null()))?;

    let price = |key: &str| entry.get(key).and_then(as_f64_lenient).unwrap_or(0.0);
    let input_cost = estimation.input_tokens as f64 / 1000.0 * price("input_per_1k");
    let output_cost = estimation.output_tokens as f64 / 1000.0 * price("output_per_1k");

    Some(CostInfo {
        pricing_available: true,
        total_cost: Some(input_cost + output_cost),
        input_cost: Some(input_cost),
        output_cost: Some(output_cost),
        model: Some(model.to_string()),
    })
}

/// 把 `model input output` 形式的用户输入合并进价格表。
pub fn set_model_price(pricing: &mut JsonMap, model: &str, input_per_1k: f64, output_per_1k: f64) {
    let mut entry = JsonMap::new();
    entry.insert("input_per_1k".to_string(), Value::from(input_per_1k));
    entry.insert("output_per_1k".to_string(), Value::from(output_per_1k));
    pricing.insert(model.to_string(), Value::Object(entry));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    struct FakeApi {
        remote: Option<JsonMap>,
        fail_push: bool,
        pushed: RefCell<Vec<JsonMap>>,
    }

    impl PricingApi for FakeApi {
        fn fetch_pricing(&self) -> Result<Option<JsonMap>, ApiError> {
            match &self.remote {
                Some(p) => Ok(Some(p.clone())),
                None => Err(ApiError::Server("offline".into())),
            }
        }

        fn push_pricing(&self, pricing: &JsonMap) -> Result<(), ApiError> {
            self.pushed.borrow_mut().push(pricing.clone());
            if self.fail_push {
                Err(ApiError::Server("denied".into()))
            } else {
                Ok(())
            }
        }
    }

    fn map(v: Value) -> JsonMap {
        v.as_object().cloned().unwrap()
    }

    fn usage(input: u64, output: u64) -> TokenUsage {
        TokenUsage {
            input_tokens: input,
            output_tokens: output,
            total_tokens: input + output,
        }
    }

    #[test]
    fn model_price_or_default() {
        let pricing = map(json!({
            "gpt-4o": {"input_per_1k": "0.005", "output_per_1k": 0.015},
            "default": {"input_per_1k": 0.001, "output_per_1k": 0.002}
        }));

        let c = compute_cost_from_pricing(&usage(2000, 1000), "gpt-4o", &pricing).unwrap();
        assert!((c.total_cost.unwrap() - 0.025).abs() < 1e-12);

        let c = compute_cost_from_pricing(&usage(1000, 1000), "other", &pricing).unwrap();
        assert!((c.total_cost.unwrap() - 0.003).abs() < 1e-12);
        assert_eq!(c.model.as_deref(), Some("other"));
    }

    #[test]
    fn no_pricing_no_cost() {
        let pricing = map(json!({"gpt-4o": {"input_per_1k": 1}}));
        assert!(compute_cost_from_pricing(&usage(1, 1), "claude", &pricing).is_none());
    }

    #[test]
    fn bad_price_strings_count_as_zero() {
        let pricing = map(json!({"m": {"input_per_1k": "n/a", "output_per_1k": "2"}}));
        let c = compute_cost_from_pricing(&usage(1000, 500), "m", &pricing).unwrap();
        assert!((c.total_cost.unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn load_falls_back_to_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = PricingStore::new(LocalStore::new(dir.path()));
        let offline = FakeApi {
            remote: None,
            fail_push: true,
            pushed: RefCell::new(Vec::new()),
        };
        assert!(store.load(&offline).is_empty());

        let mut pricing = JsonMap::new();
        set_model_price(&mut pricing, "m", 0.5, 1.5);
        store.save(&offline, &pricing);
        assert_eq!(offline.pushed.borrow().len(), 1);
        assert_eq!(store.load(&offline), pricing);

        let online = FakeApi {
            remote: Some(map(json!({"x": {}}))),
            fail_push: false,
            pushed: RefCell::new(Vec::new()),
        };
        assert!(store.load(&online).contains_key("x"));
    }
}
