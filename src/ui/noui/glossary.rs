//! 角色词表编辑、分享链接与封面上传。

use std::path::Path;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};

use super::{AppContext, confirm};
use crate::glossary::Gender;
use crate::glossary::editor::{
    EditorEntry, GlossaryEditor, GlossaryTarget, detect_report_message, saved_message,
};
use crate::network::ApiClient;

const REVOKE_CONFIRM: &str = "Are you sure you want to revoke this link? Anyone with the link will no longer be able to access the novel.";

#[derive(Debug, Args)]
pub struct GlossaryArgs {
    /// 小说 id
    #[arg(long, conflicts_with = "webtoon_job", required_unless_present = "webtoon_job")]
    pub novel: Option<String>,
    /// 漫画翻译任务 id
    #[arg(long)]
    pub webtoon_job: Option<String>,
    #[command(subcommand)]
    pub action: GlossaryAction,
}

#[derive(Debug, Subcommand)]
pub enum GlossaryAction {
    /// 列出词表
    List {
        /// 输出 HTML 摘要
        #[arg(long, default_value_t = false)]
        html: bool,
    },
    /// 自动识别章节中的角色并合并进词表（仅小说）
    Detect {
        /// 扫描的章节号；不给时由服务器决定
        #[arg(long)]
        chapter: Option<i64>,
        /// 不询问直接保存
        #[arg(short, long, default_value_t = false)]
        yes: bool,
    },
    /// 新增或修改一个角色（按原名匹配）
    Set {
        korean: String,
        english: String,
        /// auto / male / female / other
        #[arg(long)]
        gender: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// 按序号（从 1 开始）删除一个角色
    Remove { index: usize },
}

impl GlossaryArgs {
    fn target(&self) -> Result<GlossaryTarget> {
        match (&self.novel, &self.webtoon_job) {
            (Some(id), _) => Ok(GlossaryTarget::Novel(id.clone())),
            (None, Some(id)) => Ok(GlossaryTarget::WebtoonJob(id.clone())),
            (None, None) => bail!("需要 --novel 或 --webtoon-job"),
        }
    }
}

fn print_entries(ctx: &AppContext, editor: &GlossaryEditor) {
    if editor.entries().is_empty() {
        println!("词表为空");
        return;
    }
    for (i, entry) in editor.entries().iter().enumerate() {
        ctx.print(&format!("{:>3}. {}", i + 1, entry.summary().to_line()));
        let desc = entry.description.trim();
        if !desc.is_empty() {
            ctx.print(&format!("     {desc}"));
        }
    }
}

fn save_editor(editor: &mut GlossaryEditor, api: &ApiClient) -> Result<()> {
    let count = editor.save(api)?;
    println!("{}", saved_message(count));
    Ok(())
}

pub(super) fn run(ctx: &AppContext, args: GlossaryArgs) -> Result<()> {
    let target = args.target()?;
    let api = ctx.api()?;
    let glossary = target.load(&api)?;
    let mut editor = GlossaryEditor::new(target.clone(), &glossary);

    match args.action {
        GlossaryAction::List { html: true } => {
            for entry in editor.entries() {
                println!("<div class=\"character-summary\">{}</div>", entry.summary().to_html());
            }
        }
        GlossaryAction::List { html: false } => print_entries(ctx, &editor),
        GlossaryAction::Detect { chapter, yes } => {
            let GlossaryTarget::Novel(novel_id) = &target else {
                bail!("自动识别只支持小说词表");
            };
            println!("Detecting characters...");
            let result = api.auto_detect_characters(novel_id, chapter)?;
            let report = editor.merge_detected(&result);
            ctx.print(&detect_report_message(&report, &result));
            if report.added == 0 {
                return Ok(());
            }
            print_entries(ctx, &editor);
            if yes || confirm("保存词表？", true)? {
                save_editor(&mut editor, &api)?;
            }
        }
        GlossaryAction::Set {
            korean,
            english,
            gender,
            description,
        } => {
            let korean = korean.trim().to_string();
            let existing = editor
                .entries()
                .iter()
                .position(|e| e.korean_name.trim() == korean);
            let index = match existing {
                Some(i) => i,
                None => editor.add(EditorEntry {
                    korean_name: korean,
                    ..Default::default()
                }),
            };
            if let Some(entry) = editor.entry_mut(index) {
                entry.english_name = english;
                if let Some(g) = gender.as_deref() {
                    entry.gender = Gender::parse(g);
                }
                if let Some(d) = description {
                    entry.description = d;
                }
            }
            save_editor(&mut editor, &api)?;
        }
        GlossaryAction::Remove { index } => {
            let Some(removed) = index.checked_sub(1).and_then(|i| editor.remove(i)) else {
                bail!("没有第 {index} 个角色");
            };
            println!("已删除 {}", removed.summary().to_line());
            save_editor(&mut editor, &api)?;
        }
    }
    Ok(())
}

pub(super) fn share(ctx: &AppContext, novel_id: &str) -> Result<()> {
    let api = ctx.api()?;
    let link = api.share(novel_id)?;
    println!("Link generated successfully!");
    let url = if link.share_url.starts_with('/') {
        format!("{}{}", api.base_url(), link.share_url)
    } else {
        link.share_url
    };
    println!("{url}");
    Ok(())
}

pub(super) fn unshare(ctx: &AppContext, novel_id: &str) -> Result<()> {
    if !confirm(REVOKE_CONFIRM, false)? {
        return Ok(());
    }
    ctx.api()?.unshare(novel_id)?;
    println!("Link revoked successfully!");
    Ok(())
}

pub(super) fn cover(ctx: &AppContext, novel_id: &str, file: &Path) -> Result<()> {
    let uploaded = ctx.api()?.upload_cover(novel_id, file)?;
    println!(
        "{}",
        uploaded
            .message
            .as_deref()
            .unwrap_or("Cover uploaded successfully!")
    );
    if !uploaded.cover_url.is_empty() {
        println!("{}", uploaded.cover_url);
    }
    Ok(())
}
