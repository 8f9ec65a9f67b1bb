//! 等待服务器端的后台翻译任务完成。

use tracing::{debug, info, warn};

use super::backend::ChapterBackend;
use crate::base_system::poll::{CancelToken, PollOutcome, PollPolicy, PollStep, poll_until};
use crate::network::models::TranslationCheck;

pub const ACTIVE_STATUSES: [&str; 3] = ["in_progress", "queued", "processing"];
pub const FAILED_MESSAGE: &str = "Translation failed or stopped.";
pub const TIMEOUT_MESSAGE: &str = "Translation taking longer than expected.";
pub const UNKNOWN_STATUS: &str = "unknown";

#[derive(Debug, Clone)]
pub enum WatchOutcome {
    /// 没有进行中的任务，不需要等待
    Inactive { status: String },
    Complete(TranslationCheck),
    Failed(String),
    TimedOut(String),
    Cancelled,
}

pub fn is_active(status: &str) -> bool {
    ACTIVE_STATUSES.contains(&status)
}

pub fn status_text(status: &str) -> &'static str {
    if status == "queued" {
        "Translation queued..."
    } else {
        "Chapter translating..."
    }
}

/// 先查一次状态；处于进行中才开始轮询。
///
/// 第一次查询失败只记日志，按“没有进行中的任务”处理，页面照常可用；
/// 轮询过程中的失败由 `poll_until` 记日志并计入次数。
pub fn watch_translation<B: ChapterBackend + ?Sized>(
    backend: &B,
    novel_id: &str,
    chapter_index: i64,
    policy: &PollPolicy,
    cancel: &CancelToken,
    on_status: &mut dyn FnMut(&str),
) -> WatchOutcome {
    let first = match backend.check_translation(novel_id, chapter_index) {
        Ok(check) => check,
        Err(e) => {
            warn!("查询章节 {} 的翻译状态失败: {}", chapter_index, e);
            return WatchOutcome::Inactive {
                status: UNKNOWN_STATUS.to_string(),
            };
        }
    };
    if !is_active(first.status()) {
        debug!("章节 {} 没有进行中的翻译任务（{}）", chapter_index, first.status());
        return WatchOutcome::Inactive {
            status: first.status().to_string(),
        };
    }

    info!("章节 {} 正在后台翻译（{}），开始轮询", chapter_index, first.status());
    on_status(status_text(first.status()));

    let outcome = poll_until(policy, cancel, |attempt| {
        let check = backend.check_translation(novel_id, chapter_index)?;
        if check.translated && check.content().is_some() {
            return Ok(PollStep::Ready(check));
        }
        if !is_active(check.status()) && !check.translated {
            return Ok(PollStep::Failed(FAILED_MESSAGE.to_string()));
        }
        debug!("第 {} 次查询：{}", attempt, check.status());
        Ok(PollStep::Pending)
    });

    match outcome {
        PollOutcome::Ready(check) => WatchOutcome::Complete(check),
        PollOutcome::Failed(msg) => WatchOutcome::Failed(msg),
        PollOutcome::Exhausted { attempts } => {
            info!("轮询 {} 次后仍未完成", attempts);
            WatchOutcome::TimedOut(TIMEOUT_MESSAGE.to_string())
        }
        PollOutcome::Cancelled => WatchOutcome::Cancelled,
    }
}
