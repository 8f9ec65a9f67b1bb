//! 章节会话依赖的服务器能力。HTTP 客户端实现它；测试里换成假实现。

use serde_json::Value;

use super::pricing::PricingApi;
use crate::network::models::{
    EstimateResult, SaveTranslationRequest, TokenUsageHistory, TranslateRequest, TranslateResult,
    TranslationCheck,
};
use crate::network::{ApiClient, ApiError};

pub trait ChapterBackend: PricingApi {
    fn translate(&self, req: &TranslateRequest<'_>) -> Result<TranslateResult, ApiError>;
    fn estimate(&self, req: &TranslateRequest<'_>) -> Result<EstimateResult, ApiError>;
    fn save_translation(&self, req: &SaveTranslationRequest<'_>) -> Result<(), ApiError>;
    fn token_usage_history(&self, chapter_id: &str) -> Result<TokenUsageHistory, ApiError>;
    fn check_translation(
        &self,
        novel_id: &str,
        chapter_index: i64,
    ) -> Result<TranslationCheck, ApiError>;
    /// 服务器设置里的 `show_translation_cost`（缺省为显示）。
    fn show_translation_cost(&self) -> Result<bool, ApiError>;
}

impl ChapterBackend for ApiClient {
    fn translate(&self, req: &TranslateRequest<'_>) -> Result<TranslateResult, ApiError> {
        ApiClient::translate(self, req)
    }

    fn estimate(&self, req: &TranslateRequest<'_>) -> Result<EstimateResult, ApiError> {
        ApiClient::estimate(self, req)
    }

    fn save_translation(&self, req: &SaveTranslationRequest<'_>) -> Result<(), ApiError> {
        ApiClient::save_translation(self, req)
    }

    fn token_usage_history(&self, chapter_id: &str) -> Result<TokenUsageHistory, ApiError> {
        self.chapter_token_usage(chapter_id)
    }

    fn check_translation(
        &self,
        novel_id: &str,
        chapter_index: i64,
    ) -> Result<TranslationCheck, ApiError> {
        self.check_chapter_translation(novel_id, chapter_index)
    }

    fn show_translation_cost(&self) -> Result<bool, ApiError> {
        let settings = self.settings()?;
        Ok(settings.get("show_translation_cost").and_then(Value::as_bool) != Some(false))
    }
}
