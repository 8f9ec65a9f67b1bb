//! 通用轮询：固定起始间隔 + 指数退避 + 最大次数 + 取消令牌。
//!
//! 只用于“等待服务器端异步任务完成”，不用于重发失败的请求。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

/// 睡眠时的最小检查粒度，保证取消能及时生效。
const CANCEL_CHECK_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_interval: Duration,
    pub backoff: f64,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_interval: Duration::from_secs(15),
            backoff: 1.0,
            max_attempts: 100,
        }
    }
}

impl PollPolicy {
    fn next_delay(&self, current: Duration) -> Duration {
        if self.backoff <= 1.0 {
            return current;
        }
        let next_ms = (current.as_millis() as f64 * self.backoff).round() as u64;
        Duration::from_millis(next_ms).min(self.max_interval)
    }
}

/// 单次探测的结果。
#[derive(Debug, Clone, PartialEq)]
pub enum PollStep<T> {
    Ready(T),
    Pending,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    Ready(T),
    Failed(String),
    Exhausted { attempts: u32 },
    Cancelled,
}

/// 先等待一个间隔再探测（与页面上 setInterval 的行为一致），直到就绪、失败、用尽次数或被取消。
///
/// 探测返回的 `Err` 只记录日志并计为一次尝试。
pub fn poll_until<T, F>(policy: &PollPolicy, cancel: &CancelToken, mut probe: F) -> PollOutcome<T>
where
    F: FnMut(u32) -> anyhow::Result<PollStep<T>>,
{
    let mut delay = policy.interval;
    for attempt in 1..=policy.max_attempts {
        if !sleep_cancellable(delay, cancel) {
            return PollOutcome::Cancelled;
        }

        match probe(attempt) {
            Ok(PollStep::Ready(v)) => return PollOutcome::Ready(v),
            Ok(PollStep::Failed(reason)) => return PollOutcome::Failed(reason),
            Ok(PollStep::Pending) => debug!("轮询第 {} 次：尚未完成", attempt),
            Err(e) => warn!("轮询第 {} 次请求失败: {}", attempt, e),
        }

        delay = policy.next_delay(delay);
    }

    PollOutcome::Exhausted {
        attempts: policy.max_attempts,
    }
}

/// 返回 `false` 表示睡眠期间被取消。
fn sleep_cancellable(total: Duration, cancel: &CancelToken) -> bool {
    let mut left = total;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        if left.is_zero() {
            return true;
        }
        let slice = left.min(CANCEL_CHECK_SLICE);
        std::thread::sleep(slice);
        left -= slice;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn instant(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::ZERO,
            max_interval: Duration::ZERO,
            backoff: 1.0,
            max_attempts,
        }
    }

    #[test]
    fn stops_on_first_ready() {
        let mut calls = 0;
        let out = poll_until(&instant(10), &CancelToken::new(), |attempt| {
            calls += 1;
            Ok(if attempt == 3 {
                PollStep::Ready("done")
            } else {
                PollStep::Pending
            })
        });
        assert_eq!(out, PollOutcome::Ready("done"));
        assert_eq!(calls, 3);
    }

    #[test]
    fn explicit_failure_ends_polling() {
        let out: PollOutcome<()> = poll_until(&instant(10), &CancelToken::new(), |_| {
            Ok(PollStep::Failed("stopped".to_string()))
        });
        assert_eq!(out, PollOutcome::Failed("stopped".to_string()));
    }

    #[test]
    fn probe_errors_consume_attempts() {
        let mut calls = 0;
        let out: PollOutcome<()> = poll_until(&instant(4), &CancelToken::new(), |_| {
            calls += 1;
            Err(anyhow!("connection refused"))
        });
        assert_eq!(out, PollOutcome::Exhausted { attempts: 4 });
        assert_eq!(calls, 4);
    }

    #[test]
    fn cancelled_token_never_probes() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let out: PollOutcome<()> = poll_until(&instant(4), &cancel, |_| {
            panic!("probe must not run after cancellation")
        });
        assert_eq!(out, PollOutcome::Cancelled);
    }

    #[test]
    fn cancel_from_probe_stops_before_next_attempt() {
        let cancel = CancelToken::new();
        let inner = cancel.clone();
        let mut calls = 0;
        let out: PollOutcome<()> = poll_until(&instant(10), &cancel, |_| {
            calls += 1;
            inner.cancel();
            Ok(PollStep::Pending)
        });
        assert_eq!(out, PollOutcome::Cancelled);
        assert_eq!(calls, 1);
    }

    #[test]
    fn backoff_grows_until_cap() {
        let policy = PollPolicy {
            interval: Duration::from_millis(1000),
            max_interval: Duration::from_millis(1500),
            backoff: 1.2,
            max_attempts: 5,
        };
        let d1 = policy.next_delay(policy.interval);
        assert_eq!(d1, Duration::from_millis(1200));
        let d2 = policy.next_delay(d1);
        assert_eq!(d2, Duration::from_millis(1440));
        assert_eq!(policy.next_delay(d2), Duration::from_millis(1500));
    }
}
