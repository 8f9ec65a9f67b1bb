//! 合并向导的命令行交互。

use anyhow::Result;
use clap::Args;

use super::{AppContext, confirm, read_line};
use crate::merge::wizard::{
    self, CONFIRM_MESSAGE, NO_CONFLICTS_MESSAGE, NO_NOVELS_MESSAGE, success_message,
};
use crate::merge::{MergePlan, NovelOption, Side, load_novel_list, search};
use crate::network::ApiClient;

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// 当前（保留的）小说 id
    pub source: String,
    /// 要并入的小说 id；不给时从列表中选择
    #[arg(long)]
    pub target: Option<String>,
    /// 列表过滤关键字
    #[arg(long)]
    pub query: Option<String>,
    /// 全部使用默认选择（source）并跳过确认
    #[arg(short, long, default_value_t = false)]
    pub yes: bool,
}

fn pick_target(ctx: &AppContext, api: &ApiClient, args: &MergeArgs) -> Result<Option<String>> {
    let novels = load_novel_list(api, &args.source)?;
    if novels.is_empty() {
        println!("{NO_NOVELS_MESSAGE}");
        return Ok(None);
    }

    let mut query = args.query.clone().unwrap_or_default();
    loop {
        let hits: Vec<&NovelOption> = search(&novels, &query);
        println!("\n===== Select Novel to Merge =====");
        if hits.is_empty() {
            println!("没有匹配 \"{}\" 的小说", query.trim());
        }
        for (idx, n) in hits.iter().enumerate() {
            ctx.print(&format!("{}. {} | ID: {}", idx + 1, n.title, n.id));
        }
        println!("0. 取消\n");

        let choice = read_line("请输入编号，或输入关键字搜索：")?;
        let choice = choice.trim();
        if choice == "0" || choice.eq_ignore_ascii_case("q") {
            return Ok(None);
        }
        match choice.parse::<usize>() {
            Ok(idx) if idx >= 1 && idx <= hits.len() => return Ok(Some(hits[idx - 1].id.clone())),
            Ok(_) => println!("编号无效"),
            Err(_) => query = choice.to_string(),
        }
    }
}

fn ask_side(prompt: &str) -> Result<Side> {
    loop {
        let answer = read_line(&format!("{prompt} [S]ource / [T]arget（默认 Source）："))?;
        if answer.trim().is_empty() {
            return Ok(Side::Source);
        }
        match Side::parse(&answer) {
            Some(side) => return Ok(side),
            None => println!("请输入 s 或 t"),
        }
    }
}

fn show_preview(ctx: &AppContext, plan: &MergePlan) {
    println!("\n===== Merge Preview =====");
    ctx.print(&plan.heading());
    for line in plan.summary_lines() {
        ctx.print(&format!("• {line}"));
    }
    if !plan.has_conflicts() {
        ctx.print(NO_CONFLICTS_MESSAGE);
    }
}

fn collect_choices(ctx: &AppContext, plan: &mut MergePlan) -> Result<()> {
    let metadata = plan.metadata.clone();
    if !metadata.is_empty() {
        println!("\n===== Metadata Conflicts =====");
    }
    for m in &metadata {
        println!("{}:", m.label);
        for (side, lines) in [(Side::Source, &m.source_lines), (Side::Target, &m.target_lines)] {
            ctx.print(&format!("  {}: {}", side.label(), lines.join(" / ")));
        }
        let side = ask_side(m.label)?;
        plan.choose_metadata(&m.field, side);
    }

    let chapters = plan.chapters.clone();
    if !chapters.is_empty() {
        println!("\n===== Chapter Conflicts =====");
    }
    for c in &chapters {
        println!("Chapter {}:", c.chapter_number);
        ctx.print(&format!("  Source: {}", c.source.line()));
        ctx.print(&format!("  Target: {}", c.target.line()));
        let side = ask_side(&format!("Chapter {}", c.chapter_number))?;
        plan.choose_chapter(&c.chapter_number, side);
    }
    Ok(())
}

pub(super) fn run(ctx: &AppContext, args: MergeArgs) -> Result<()> {
    let api = ctx.api()?;
    let target = match &args.target {
        Some(t) => t.clone(),
        None => match pick_target(ctx, &api, &args)? {
            Some(t) => t,
            None => {
                println!("已取消合并");
                return Ok(());
            }
        },
    };

    println!("Analyzing novels...");
    let mut plan = wizard::preview(&api, &args.source, &target)?;
    show_preview(ctx, &plan);

    if !args.yes {
        collect_choices(ctx, &mut plan)?;
        println!();
        if !confirm(CONFIRM_MESSAGE, false)? {
            println!("已取消合并");
            return Ok(());
        }
    }

    println!("Merging novels...");
    let result = wizard::execute(&api, &plan)?;
    ctx.print(&success_message(&result));
    println!("{}/novel/{}", api.base_url(), result.merged_novel_id);
    Ok(())
}
