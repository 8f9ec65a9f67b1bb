//! 命令行交互入口。
//!
//! 子命令在这里分发；需要用户确认或输入时走标准输入，输出按配置的宽度换行。

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::base_system::context::Config;
use crate::base_system::local_store::LocalStore;
use crate::base_system::poll::CancelToken;
use crate::network::ApiClient;

mod chapter;
mod glossary;
mod merge;
mod settings;

/// 一次运行共享的状态。
pub struct AppContext {
    pub config: Config,
    pub data_dir: Option<PathBuf>,
    pub cancel: CancelToken,
}

impl AppContext {
    pub fn api(&self) -> Result<ApiClient> {
        ApiClient::new(&self.config).context("初始化 HTTP 客户端失败")
    }

    pub fn cache(&self) -> LocalStore {
        LocalStore::new(self.config.cache_dir(self.data_dir.as_deref()))
    }

    fn print(&self, text: &str) {
        print_wrapped(text, self.config.wrap_width);
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 对文本做角色高亮，输出 HTML
    Highlight(chapter::HighlightArgs),
    /// 显示角色详情（点击高亮名字的效果）
    Popup(chapter::PopupArgs),
    /// 渲染章节（高亮或对照模式）
    Render(chapter::RenderArgs),
    /// 交互式阅读一个章节
    Read(chapter::PageArgs),
    /// 翻译章节
    Translate(chapter::TranslateArgs),
    /// 预估翻译的 token 用量与费用
    Estimate(chapter::TranslateArgs),
    /// 用新文本替换译文并保存
    Edit(chapter::EditArgs),
    /// 把当前译文保存到服务器
    Save(chapter::PageArgs),
    /// 等待后台翻译完成
    Watch(chapter::PageArgs),
    /// 查看章节的 token 用量记录
    Usage(chapter::UsageArgs),
    /// 模型价格表
    #[command(subcommand)]
    Pricing(settings::PricingCommand),
    /// 阅读偏好
    #[command(subcommand)]
    Prefs(settings::PrefsCommand),
    /// 角色词表
    Glossary(glossary::GlossaryArgs),
    /// 生成分享链接
    Share { novel_id: String },
    /// 取消分享
    Unshare { novel_id: String },
    /// 上传封面
    Cover { novel_id: String, file: PathBuf },
    /// 合并两本小说
    Merge(merge::MergeArgs),
}

pub fn run(command: Command, ctx: &AppContext) -> Result<()> {
    match command {
        Command::Highlight(args) => chapter::highlight(ctx, args),
        Command::Popup(args) => chapter::popup(ctx, args),
        Command::Render(args) => chapter::render(ctx, args),
        Command::Read(args) => chapter::read(ctx, args),
        Command::Translate(args) => chapter::translate(ctx, args),
        Command::Estimate(args) => chapter::estimate(ctx, args),
        Command::Edit(args) => chapter::edit(ctx, args),
        Command::Save(args) => chapter::save(ctx, args),
        Command::Watch(args) => chapter::watch(ctx, args),
        Command::Usage(args) => chapter::usage(ctx, args),
        Command::Pricing(cmd) => settings::pricing(ctx, cmd),
        Command::Prefs(cmd) => settings::prefs(ctx, cmd),
        Command::Glossary(args) => glossary::run(ctx, args),
        Command::Share { novel_id } => glossary::share(ctx, &novel_id),
        Command::Unshare { novel_id } => glossary::unshare(ctx, &novel_id),
        Command::Cover { novel_id, file } => glossary::cover(ctx, &novel_id, &file),
        Command::Merge(args) => merge::run(ctx, args),
    }
}

pub(crate) fn read_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let stdin = io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    Ok(line)
}

/// 读取 y/n；直接回车取 `default_yes`。
pub(crate) fn confirm(prompt: &str, default_yes: bool) -> Result<bool> {
    let hint = if default_yes { "[Y/n]" } else { "[y/N]" };
    let answer = read_line(&format!("{prompt} {hint} "))?;
    Ok(match answer.trim().to_ascii_lowercase().as_str() {
        "" => default_yes,
        "y" | "yes" => true,
        _ => false,
    })
}

pub(crate) fn print_wrapped(text: &str, width: usize) {
    if width == 0 {
        println!("{text}");
        return;
    }
    for line in text.lines() {
        if line.is_empty() {
            println!();
            continue;
        }
        for wrapped in textwrap::wrap(line, width) {
            println!("{wrapped}");
        }
    }
}
