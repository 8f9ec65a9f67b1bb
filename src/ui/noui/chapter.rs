//! 章节相关的子命令：高亮、角色详情、渲染、翻译、编辑、保存、等待后台翻译。

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use super::{AppContext, confirm, read_line};
use crate::base_system::json_extract::pick_string;
use crate::glossary::html_utils::escape_html;
use crate::glossary::{Glossary, highlight as highlight_text, resolve_click};
use crate::network::ApiClient;
use crate::reader::compare::compare_panels;
use crate::reader::pricing::PricingStore;
use crate::reader::session::{TranslateOutcome, WatchReport};
use crate::reader::status_watch::WatchOutcome;
use crate::reader::token_usage::{CostInfo, TokenUsage, usage_line};
use crate::reader::{ChapterPageData, ChapterSession, RenderedView};

#[derive(Debug, Args)]
pub struct PageArgs {
    /// 章节页面数据（JSON）
    #[arg(long)]
    pub page: PathBuf,
}

#[derive(Debug, Args)]
pub struct HighlightArgs {
    /// 从章节页面数据中取译文和词表
    #[arg(long)]
    pub page: Option<PathBuf>,
    /// 直接给出要高亮的文本（优先于页面里的译文）
    #[arg(long)]
    pub text: Option<String>,
    /// 词表 JSON（id → 角色）
    #[arg(long)]
    pub glossary: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PopupArgs {
    #[arg(long)]
    pub page: PathBuf,
    pub char_id: String,
    /// 输出 HTML 片段
    #[arg(long, default_value_t = false)]
    pub html: bool,
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    #[arg(long)]
    pub page: PathBuf,
    /// 原文/译文对照
    #[arg(long, default_value_t = false)]
    pub compare: bool,
}

#[derive(Debug, Args)]
pub struct TranslateArgs {
    #[arg(long)]
    pub page: PathBuf,
    /// 使用思考模式
    #[arg(long, default_value_t = false)]
    pub thinking: bool,
    /// 跳过预估确认
    #[arg(short, long, default_value_t = false)]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    #[arg(long)]
    pub page: PathBuf,
    /// 新译文所在的文件；不给时从标准输入读取
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct UsageArgs {
    pub chapter_id: String,
}

fn open_session(ctx: &AppContext, path: &Path) -> Result<ChapterSession<ApiClient>> {
    let page = ChapterPageData::load(path)?;
    let api = ctx.api()?;
    Ok(ChapterSession::new(
        api,
        page,
        PricingStore::new(ctx.cache()),
        ctx.config.show_translation_cost,
    ))
}

fn persist(session: &ChapterSession<ApiClient>, path: &Path) -> Result<()> {
    session.page().save(path)?;
    debug!("页面数据已写回 {}", path.display());
    Ok(())
}

fn print_view(view: &RenderedView) {
    match view {
        RenderedView::Highlighted(v) => println!("{}", v.html),
        RenderedView::Plain(html) => println!("{html}"),
        RenderedView::Compare(panels) => {
            println!("===== Original =====\n{}", panels.original_html);
            println!("\n===== Translated =====\n{}", panels.translated_html);
        }
    }
}

fn print_header(ctx: &AppContext, session: &ChapterSession<ApiClient>) {
    let header = session.title_header();
    ctx.print(&header.title);
    if let Some(original) = header.original {
        ctx.print(&original);
    }
}

pub(super) fn highlight(_ctx: &AppContext, args: HighlightArgs) -> Result<()> {
    let page = args.page.as_deref().map(ChapterPageData::load).transpose()?;
    let text = match (args.text, &page) {
        (Some(text), _) => text,
        (None, Some(page)) => page.translated_text.clone(),
        (None, None) => bail!("需要 --text 或 --page"),
    };
    let glossary = match (&args.glossary, page) {
        (Some(path), _) => load_glossary(path)?,
        (None, Some(page)) => page.glossary,
        (None, None) => Glossary::new(),
    };

    let view = highlight_text(&text, &glossary);
    debug!("高亮 {} 处，涉及角色 {:?}", view.spans.len(), view.bound_ids());
    println!("{}", view.html);
    Ok(())
}

fn load_glossary(path: &Path) -> Result<Glossary> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("读取词表失败: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("词表格式不正确: {}", path.display()))
}

pub(super) fn popup(ctx: &AppContext, args: PopupArgs) -> Result<()> {
    let page = ChapterPageData::load(&args.page)?;
    let Some(popup) = resolve_click(&page.glossary, &args.char_id) else {
        println!("没有角色 {} 的详情", args.char_id);
        return Ok(());
    };
    if args.html {
        println!("<h3>{}</h3>", escape_html(&popup.display_name));
        println!("{}", popup.meta_html());
        println!("{}", popup.description_html);
        return Ok(());
    }
    ctx.print(&popup.display_name);
    let gender = popup.gender.as_ref().map_or("", |badge| badge.label);
    let meta = [popup.korean_name.as_str(), gender]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("  ");
    if !meta.is_empty() {
        ctx.print(&meta);
    }
    println!();
    ctx.print(&popup.description);
    Ok(())
}

pub(super) fn render(_ctx: &AppContext, args: RenderArgs) -> Result<()> {
    let page = ChapterPageData::load(&args.page)?;
    let view = if args.compare {
        RenderedView::Compare(compare_panels(&page))
    } else if page.is_translated() {
        RenderedView::Highlighted(highlight_text(&page.translated_text, &page.glossary))
    } else {
        RenderedView::Plain(escape_html(&page.korean_text))
    };
    print_view(&view);
    Ok(())
}

fn report_translation(ctx: &AppContext, outcome: &TranslateOutcome) {
    let mode = if outcome.thinking { " (thinking mode)" } else { "" };
    ctx.print(&format!("✓ Translated with {}{}", outcome.model, mode));
    if let Some(usage) = &outcome.usage {
        ctx.print(&usage.line());
    }
}

/// 预估后询问是否继续；预估失败时直接继续。
fn confirm_estimate(
    ctx: &AppContext,
    session: &ChapterSession<ApiClient>,
    thinking: bool,
) -> Result<bool> {
    if !ctx.config.confirm_estimate {
        return Ok(true);
    }
    match session.estimate(thinking) {
        Some(summary) => {
            ctx.print(&summary.message());
            confirm("", true)
        }
        None => Ok(true),
    }
}

pub(super) fn translate(ctx: &AppContext, args: TranslateArgs) -> Result<()> {
    let mut session = open_session(ctx, &args.page)?;
    if !args.yes && !confirm_estimate(ctx, &session, args.thinking)? {
        println!("已取消翻译");
        return Ok(());
    }
    let outcome = session.translate(args.thinking)?;
    persist(&session, &args.page)?;
    print_header(ctx, &session);
    report_translation(ctx, &outcome);
    print_view(&outcome.view);
    Ok(())
}

pub(super) fn estimate(ctx: &AppContext, args: TranslateArgs) -> Result<()> {
    let session = open_session(ctx, &args.page)?;
    match session.estimate(args.thinking) {
        Some(summary) => ctx.print(&summary.message()),
        None => println!("暂时无法预估 token 用量"),
    }
    Ok(())
}

fn read_stdin_text() -> Result<String> {
    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .context("读取标准输入失败")?;
    Ok(text)
}

pub(super) fn edit(ctx: &AppContext, args: EditArgs) -> Result<()> {
    let text = match &args.file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("读取文件失败: {}", path.display()))?,
        None => read_stdin_text()?,
    };
    let mut session = open_session(ctx, &args.page)?;
    session.begin_edit();
    session.save_edit(&text)?;
    persist(&session, &args.page)?;
    println!("✓ Translation saved");
    Ok(())
}

pub(super) fn save(ctx: &AppContext, args: PageArgs) -> Result<()> {
    let mut session = open_session(ctx, &args.page)?;
    session.save_translation()?;
    println!("✓ Translation saved");
    Ok(())
}

fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn watch_session(ctx: &AppContext, session: &mut ChapterSession<ApiClient>) -> WatchReport {
    let pb = spinner();
    let report = session.watch_pending(&ctx.config.poll_policy(), &ctx.cancel, &mut |status: &str| {
        pb.set_message(status.to_string())
    });
    pb.finish_and_clear();
    match &report.outcome {
        WatchOutcome::Complete(_) => println!("✓ Translation complete"),
        WatchOutcome::Failed(msg) | WatchOutcome::TimedOut(msg) => println!("{msg}"),
        WatchOutcome::Cancelled => println!("已取消等待"),
        WatchOutcome::Inactive { status } => {
            info!("没有进行中的翻译任务（{}）", status);
        }
    }
    report
}

pub(super) fn watch(ctx: &AppContext, args: PageArgs) -> Result<()> {
    let mut session = open_session(ctx, &args.page)?;
    let report = watch_session(ctx, &mut session);
    if let Some(view) = &report.view {
        persist(&session, &args.page)?;
        print_header(ctx, &session);
        print_view(view);
    }
    Ok(())
}

pub(super) fn usage(ctx: &AppContext, args: UsageArgs) -> Result<()> {
    let api = ctx.api()?;
    let history = api.chapter_token_usage(&args.chapter_id)?;
    if history.token_usage.is_empty() {
        println!("没有 token 用量记录");
        return Ok(());
    }
    for record in &history.token_usage {
        let Some(usage) = TokenUsage::from_value(record) else {
            continue;
        };
        let cost = record.get("cost_info").and_then(CostInfo::from_value);
        let label = record
            .as_object()
            .map(|map| {
                [
                    pick_string(map, &["created_at", "timestamp"]),
                    pick_string(map, &["model", "model_used", "translation_model"]),
                ]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ")
            })
            .unwrap_or_default();
        let line = usage_line(&usage, cost.as_ref());
        if label.is_empty() {
            ctx.print(&line);
        } else {
            ctx.print(&format!("{label}: {line}"));
        }
    }
    Ok(())
}

/// 多行输入，单独一行 `.` 结束。
fn read_block(prompt: &str) -> Result<String> {
    println!("{prompt}");
    let mut lines = Vec::new();
    loop {
        let line = read_line("")?;
        if line.is_empty() || line.trim_end_matches(['\r', '\n']) == "." {
            break;
        }
        lines.push(line.trim_end_matches(['\r', '\n']).to_string());
    }
    Ok(lines.join("\n"))
}

pub(super) fn read(ctx: &AppContext, args: PageArgs) -> Result<()> {
    let mut session = open_session(ctx, &args.page)?;
    print_header(ctx, &session);
    print_view(&session.render());

    if !session.page().is_translated() && session.page().chapter_id().is_some() {
        let report = watch_session(ctx, &mut session);
        if let Some(view) = &report.view {
            persist(&session, &args.page)?;
            print_view(view);
        }
    }

    loop {
        let input = read_line(
            "\n命令（t 翻译 / tt 思考模式翻译 / c 对照 / e 编辑 / s 保存 / p <id> 角色 / q 退出）：",
        )?;
        let input = input.trim();
        let (cmd, rest) = input.split_once(' ').unwrap_or((input, ""));
        match cmd {
            "" => continue,
            "q" | "Q" => break,
            "t" | "tt" => {
                let thinking = cmd == "tt";
                if !confirm_estimate(ctx, &session, thinking)? {
                    continue;
                }
                match session.translate(thinking) {
                    Ok(outcome) => {
                        persist(&session, &args.page)?;
                        print_header(ctx, &session);
                        report_translation(ctx, &outcome);
                        print_view(&outcome.view);
                    }
                    Err(e) => println!("Translation failed: {}", e.user_message()),
                }
            }
            "c" => {
                let view = session.toggle_compare();
                println!("{}", if session.is_compare() { "[对照模式]" } else { "[阅读模式]" });
                print_view(&view);
            }
            "e" => {
                let current = session.begin_edit();
                ctx.print(&current);
                let text = read_block("输入新译文，单独一行 . 结束：")?;
                match session.save_edit(&text) {
                    Ok(view) => {
                        persist(&session, &args.page)?;
                        println!("✓ Translation saved");
                        print_view(&view);
                    }
                    Err(e) => {
                        println!("{}", e.user_message());
                        print_view(&session.cancel_edit());
                    }
                }
            }
            "s" => match session.save_translation() {
                Ok(()) => println!("✓ Translation saved"),
                Err(e) => println!("{}", e.user_message()),
            },
            "p" => match resolve_click(&session.page().glossary, rest.trim()) {
                Some(popup) => {
                    ctx.print(&popup.display_name);
                    match &popup.gender {
                        Some(badge) => ctx.print(&format!("{}  {}", popup.korean_name, badge.label)),
                        None => ctx.print(&popup.korean_name),
                    }
                    ctx.print(&popup.description);
                }
                None => println!("没有角色 {} 的详情", rest.trim()),
            },
            _ => println!("未知命令: {cmd}"),
        }
    }
    Ok(())
}
