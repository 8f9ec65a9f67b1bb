//! 小说/漫画翻译站的命令行阅读客户端。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志/本地缓存/轮询等基础设施
//! - `network`：HTTP 客户端、CSRF、接口数据结构
//! - `glossary`：角色词表、角色名高亮、角色详情、词表编辑
//! - `reader`：章节会话（翻译、预估、编辑、对照、等待后台翻译）、价格表、阅读偏好
//! - `merge`：小说合并向导
//! - `ui`：命令行交互

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, anyhow};
use clap::Parser;
use tracing::{debug, info, warn};

mod base_system;
mod glossary;
mod merge;
mod network;
mod reader;
mod ui;

use base_system::config::load_or_create;
use base_system::context::Config;
use base_system::logging::{LogExitHandle, LogOptions, LogSystem};
use base_system::poll::CancelToken;
use ui::noui::{AppContext, Command};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "novel-reader-client", version = VERSION)]
#[command(about = "Command-line reader for the novel/webtoon translation server")]
struct Cli {
    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 数据目录路径（存放 config.yml、logs 与 cache）
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// 配置文件路径（默认为数据目录下的 config.yml）
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = cli.data_dir.as_deref();
    let log = init_logging(cli.debug, data_dir)?;
    debug!("novel-reader-client v{}", VERSION);

    let config = load_or_create::<Config>(cli.config.as_deref(), data_dir)
        .map_err(|e| anyhow!(e.to_string()))?;
    info!(target: "startup", "服务器: {}", config.base_url());

    let cancel = CancelToken::new();
    install_signal_handler(cancel.clone(), log.exit_handle());

    let ctx = AppContext {
        config,
        data_dir: cli.data_dir.clone(),
        cancel,
    };
    ui::noui::run(cli.command, &ctx)
}

fn init_logging(debug: bool, base_dir: Option<&Path>) -> Result<LogSystem> {
    let opts = LogOptions {
        debug,
        use_color: true,
        archive_on_exit: true,
    };
    LogSystem::init(opts, base_dir).map_err(|e| anyhow!(e))
}

/// 第一次 Ctrl+C 只取消正在进行的等待；再按一次收尾日志并退出。
fn install_signal_handler(cancel: CancelToken, log: LogExitHandle) {
    let pressed = Arc::new(AtomicBool::new(false));
    let result = ctrlc::set_handler(move || {
        if !pressed.swap(true, Ordering::SeqCst) {
            cancel.cancel();
            eprintln!("\n正在取消，再按一次 Ctrl+C 立即退出");
            return;
        }
        log.safe_exit();
        std::process::exit(130);
    });
    if let Err(e) = result {
        warn!("注册 Ctrl+C 处理失败: {}", e);
    }
}
