//! 单个章节的会话：页面数据、显示模式、忙碌标志，以及翻译/预估/编辑/保存流程。
//!
//! 同一时间只允许一个请求在进行（`busy`）；每次渲染完成后通过 crossbeam 通道发出
//! `RenderEvent`，供外部监听者（例如 UI 层）刷新。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender, unbounded};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::backend::ChapterBackend;
use super::compare::{ComparePanels, compare_panels};
use super::page::ChapterPageData;
use super::pricing::{PricingStore, compute_cost_from_pricing};
use super::status_watch::{UNKNOWN_STATUS, WatchOutcome, watch_translation};
use super::token_usage::{CostInfo, TokenUsage, estimate_message, usage_line};
use crate::base_system::poll::{CancelToken, PollPolicy};
use crate::glossary::highlight::HIGHLIGHT_CLASS;
use crate::glossary::html_utils::escape_html;
use crate::glossary::{HighlightedView, highlight};
use crate::network::ApiError;
use crate::network::models::{SaveTranslationRequest, TranslateRequest, TranslationCheck};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Another request is still in progress.")]
    Busy,
    #[error("Translation text cannot be empty.")]
    EmptyText,
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SessionError {
    /// 展示给用户的一行文字。
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Highlighted,
    Plain,
    Compare,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedView {
    Highlighted(HighlightedView),
    Plain(String),
    Compare(ComparePanels),
}

impl RenderedView {
    pub fn mode(&self) -> ViewMode {
        match self {
            RenderedView::Highlighted(_) => ViewMode::Highlighted,
            RenderedView::Plain(_) => ViewMode::Plain,
            RenderedView::Compare(_) => ViewMode::Compare,
        }
    }

    pub fn highlight_count(&self) -> usize {
        match self {
            RenderedView::Highlighted(view) => view.spans.len(),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    Rendered { mode: ViewMode, highlights: usize },
    /// 外部替换的内容缺少高亮，已重新渲染
    Reconciled { highlights: usize },
}

/// 忙碌标志，可以克隆给其他线程查看。
#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn try_acquire(&self) -> Option<BusyGuard> {
        self.0
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| BusyGuard(self.0.clone()))
    }
}

/// 离开作用域时清除忙碌标志，出错返回也一样。
#[derive(Debug)]
pub struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsageReport {
    pub usage: TokenUsage,
    pub cost: Option<CostInfo>,
}

impl UsageReport {
    pub fn line(&self) -> String {
        usage_line(&self.usage, self.cost.as_ref())
    }
}

#[derive(Debug, Clone)]
pub struct TranslateOutcome {
    pub view: RenderedView,
    pub model: String,
    pub thinking: bool,
    pub title_translated: bool,
    pub usage: Option<UsageReport>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EstimateSummary {
    pub estimation: TokenUsage,
    pub cost: Option<CostInfo>,
}

impl EstimateSummary {
    pub fn message(&self) -> String {
        estimate_message(&self.estimation, self.cost.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleHeader {
    pub title: String,
    pub original: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WatchReport {
    pub outcome: WatchOutcome,
    pub view: Option<RenderedView>,
}

pub fn is_thinking_model(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("o1-") || lower.contains("thinking") || lower.contains("r1")
}

pub struct ChapterSession<B: ChapterBackend> {
    backend: B,
    page: ChapterPageData,
    pricing: PricingStore,
    show_cost: bool,
    compare: bool,
    editing: bool,
    reconciling: bool,
    busy: BusyFlag,
    listeners: Vec<Sender<RenderEvent>>,
}

impl<B: ChapterBackend> ChapterSession<B> {
    /// `show_cost` 是本地配置里的开关；服务器设置关闭时同样不显示。
    pub fn new(backend: B, page: ChapterPageData, pricing: PricingStore, show_cost: bool) -> Self {
        Self {
            backend,
            page,
            pricing,
            show_cost,
            compare: false,
            editing: false,
            reconciling: false,
            busy: BusyFlag::default(),
            listeners: Vec::new(),
        }
    }

    pub fn page(&self) -> &ChapterPageData {
        &self.page
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_compare(&self) -> bool {
        self.compare
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn busy_flag(&self) -> BusyFlag {
        self.busy.clone()
    }

    pub fn subscribe(&mut self) -> Receiver<RenderEvent> {
        let (tx, rx) = unbounded();
        self.listeners.push(tx);
        rx
    }

    fn emit(&mut self, event: RenderEvent) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// 对照模式只显示转义后的原文；有译文且词汇表非空时做角色高亮。
    pub fn render(&mut self) -> RenderedView {
        let view = if self.compare {
            RenderedView::Compare(compare_panels(&self.page))
        } else if !self.page.is_translated() {
            RenderedView::Plain(escape_html(&self.page.korean_text))
        } else if self.page.glossary.is_empty() {
            RenderedView::Plain(escape_html(&self.page.translated_text))
        } else {
            RenderedView::Highlighted(highlight(&self.page.translated_text, &self.page.glossary))
        };
        self.emit(RenderEvent::Rendered {
            mode: view.mode(),
            highlights: view.highlight_count(),
        });
        view
    }

    pub fn toggle_compare(&mut self) -> RenderedView {
        self.compare = !self.compare;
        if self.compare {
            self.editing = false;
        }
        debug!("对照模式: {}", self.compare);
        self.render()
    }

    /// 进入编辑，返回当前译文作为编辑初值。
    pub fn begin_edit(&mut self) -> String {
        self.compare = false;
        self.editing = true;
        self.page.translated_text.clone()
    }

    pub fn cancel_edit(&mut self) -> RenderedView {
        self.editing = false;
        self.render()
    }

    pub fn title_header(&self) -> TitleHeader {
        let translated = self.page.translated_title.trim();
        if translated.is_empty() {
            return TitleHeader {
                title: self.page.title.clone(),
                original: None,
            };
        }
        TitleHeader {
            title: translated.to_string(),
            original: (!self.page.title.is_empty()).then(|| format!("Original: {}", self.page.title)),
        }
    }

    fn request<'a>(&'a self, text: &'a str, thinking: bool) -> TranslateRequest<'a> {
        TranslateRequest {
            text,
            novel_id: &self.page.novel_id,
            chapter_id: self.page.chapter_id(),
            images: Vec::new(),
            use_thinking_mode: thinking,
        }
    }

    /// 本地配置和服务器设置都允许时才显示费用；读取设置失败按显示处理。
    fn cost_visible(&self) -> bool {
        if !self.show_cost {
            return false;
        }
        self.backend.show_translation_cost().unwrap_or_else(|e| {
            debug!("读取服务器设置失败，按显示费用处理: {}", e);
            true
        })
    }

    fn latest_usage(&self) -> Option<UsageReport> {
        let chapter_id = self.page.chapter_id()?;
        match self.backend.token_usage_history(chapter_id) {
            Ok(history) => {
                let latest = history.token_usage.first()?;
                Some(UsageReport {
                    usage: TokenUsage::from_value(latest)?,
                    cost: latest.get("cost_info").and_then(CostInfo::from_value),
                })
            }
            Err(e) => {
                warn!("获取 token 用量记录失败: {}", e);
                None
            }
        }
    }

    /// 失败时返回错误且不改动当前译文；标题翻译失败只记日志。
    pub fn translate(&mut self, thinking: bool) -> Result<TranslateOutcome, SessionError> {
        let _guard = self.busy.try_acquire().ok_or(SessionError::Busy)?;
        self.compare = false;
        self.editing = false;

        info!("开始翻译章节 {}（思考模式: {}）", self.page.chapter_index, thinking);
        let result = self
            .backend
            .translate(&self.request(&self.page.korean_text, thinking))?;

        let title = if self.page.title.trim().is_empty() {
            None
        } else {
            match self.backend.translate(&self.request(&self.page.title, thinking)) {
                Ok(r) if !r.translated_text.trim().is_empty() => Some(r.translated_text),
                Ok(_) => {
                    warn!("标题翻译结果为空");
                    None
                }
                Err(e) => {
                    error!("标题翻译失败: {}", e);
                    None
                }
            }
        };

        let model = result
            .model_used
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "AI".to_string());
        self.page.translated_text = result.translated_text;
        self.page.translation_model = model.clone();
        let title_translated = title.is_some();
        if let Some(t) = title {
            self.page.translated_title = t;
        }

        let usage = if self.cost_visible() {
            match result.token_usage.as_ref().and_then(TokenUsage::from_value) {
                Some(usage) => Some(UsageReport {
                    usage,
                    cost: result.cost_info.as_ref().and_then(CostInfo::from_value),
                }),
                None => self.latest_usage(),
            }
        } else {
            None
        };

        info!("章节 {} 翻译完成，模型 {}", self.page.chapter_index, model);
        let view = self.render();
        Ok(TranslateOutcome {
            view,
            thinking: thinking || is_thinking_model(&model),
            model,
            title_translated,
            usage,
        })
    }

    /// 预估失败时返回 `None`，调用方直接继续翻译。
    pub fn estimate(&self, thinking: bool) -> Option<EstimateSummary> {
        let req = TranslateRequest {
            chapter_id: None,
            ..self.request(&self.page.korean_text, thinking)
        };
        let result = match self.backend.estimate(&req) {
            Ok(r) => r,
            Err(e) => {
                warn!("预估 token 用量失败，直接继续: {}", e);
                return None;
            }
        };
        let Some(estimation) = result.estimation.as_ref().and_then(TokenUsage::from_value) else {
            warn!("预估结果缺少 estimation 字段");
            return None;
        };

        let mut cost = result.cost_info.as_ref().and_then(CostInfo::from_value);
        let server_priced = cost.as_ref().is_some_and(|c| c.pricing_available);
        // 服务器告知了将使用的模型时按它计价，否则用本章上次的翻译模型
        let model = result
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.page.translation_model);
        if !server_priced && !model.is_empty() {
            let pricing = self.pricing.load(&self.backend);
            if let Some(local) = compute_cost_from_pricing(&estimation, model, &pricing) {
                cost = Some(local);
            }
        }
        Some(EstimateSummary { estimation, cost })
    }

    /// 空白文本在发出任何请求之前就被拒绝。
    pub fn save_edit(&mut self, text: &str) -> Result<RenderedView, SessionError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(SessionError::EmptyText);
        }
        let _guard = self.busy.try_acquire().ok_or(SessionError::Busy)?;
        self.page.translated_text = trimmed.to_string();
        self.editing = false;
        let view = self.render();
        self.push_translation()?;
        info!("章节 {} 的修改已保存", self.page.chapter_index);
        Ok(view)
    }

    pub fn save_translation(&mut self) -> Result<(), SessionError> {
        if !self.page.is_translated() {
            return Err(SessionError::EmptyText);
        }
        let _guard = self.busy.try_acquire().ok_or(SessionError::Busy)?;
        self.push_translation()?;
        info!("章节 {} 的译文已保存", self.page.chapter_index);
        Ok(())
    }

    fn push_translation(&self) -> Result<(), ApiError> {
        let title = self.page.translated_title.trim();
        self.backend.save_translation(&SaveTranslationRequest {
            novel_id: &self.page.novel_id,
            chapter_index: self.page.chapter_index,
            translated_text: &self.page.translated_text,
            translated_title: (!title.is_empty()).then_some(title),
        })
    }

    /// 内容被外部替换且没有高亮时重新渲染一次。重入时直接忽略。
    pub fn reconcile_external(&mut self, content_html: &str) -> Option<RenderedView> {
        if self.reconciling
            || self.compare
            || self.page.glossary.is_empty()
            || content_html.trim().is_empty()
            || content_html.contains(HIGHLIGHT_CLASS)
        {
            return None;
        }
        self.reconciling = true;
        let view = self.render();
        self.reconciling = false;
        self.emit(RenderEvent::Reconciled {
            highlights: view.highlight_count(),
        });
        Some(view)
    }

    /// 采用后台任务写入的译文。
    pub fn adopt_server_translation(&mut self, check: &TranslationCheck) -> Option<RenderedView> {
        let content = check.content()?.to_string();
        if let Some(title) = check.translated_title.as_deref().filter(|t| !t.trim().is_empty()) {
            self.page.translated_title = title.to_string();
        }
        if let Some(model) = check.translation_model.as_deref().filter(|m| !m.is_empty()) {
            self.page.translation_model = model.to_string();
        }
        let replaced = escape_html(&content);
        self.page.translated_text = content;
        Some(self.reconcile_external(&replaced).unwrap_or_else(|| self.render()))
    }

    /// 章节还没有译文时等待后台翻译；完成后采用服务器的译文。
    pub fn watch_pending(
        &mut self,
        policy: &PollPolicy,
        cancel: &CancelToken,
        on_status: &mut dyn FnMut(&str),
    ) -> WatchReport {
        if self.page.chapter_id().is_none() || self.page.is_translated() {
            return WatchReport {
                outcome: WatchOutcome::Inactive {
                    status: if self.page.is_translated() {
                        "completed".to_string()
                    } else {
                        UNKNOWN_STATUS.to_string()
                    },
                },
                view: None,
            };
        }
        let outcome = watch_translation(
            &self.backend,
            &self.page.novel_id,
            self.page.chapter_index,
            policy,
            cancel,
            on_status,
        );
        let view = match &outcome {
            WatchOutcome::Complete(check) => self.adopt_server_translation(check),
            _ => None,
        };
        WatchReport { outcome, view }
    }
}
