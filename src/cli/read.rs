//! Read-only commands against the mainline: cat, ls, files, log.

use std::io::Write;

use super::Context;
use crate::catalog::FileRevision;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};

#[derive(serde::Serialize)]
struct CatReport<'a> {
    path: &'a str,
    size: usize,
    content: String,
}

#[derive(serde::Serialize)]
struct ListReport<'a> {
    path: &'a str,
    entries: Vec<String>,
}

#[derive(serde::Serialize)]
struct LogReport<'a> {
    path: &'a str,
    last_change: Option<FileRevision>,
}

pub(crate) fn run_cat(ctx: &Context, path: &str) -> Result<()> {
    let ws = ctx.open()?;
    let content = ws.read(path)?;

    if ctx.json {
        let report = CatReport {
            path,
            size: content.len(),
            content: String::from_utf8_lossy(&content).into_owned(),
        };
        return emit_success(ctx.output(), "cat", &report, None);
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&content)?;
    stdout.flush()?;
    Ok(())
}

pub(crate) fn run_ls(ctx: &Context, dir: &str) -> Result<()> {
    let ws = ctx.open()?;
    let entries = ws.list(dir)?;
    emit_listing(ctx, "ls", dir, entries)
}

pub(crate) fn run_files(ctx: &Context, pattern: Option<&str>) -> Result<()> {
    let ws = ctx.open()?;
    let entries = ws.file_list(pattern)?;
    emit_listing(ctx, "files", pattern.unwrap_or(""), entries)
}

fn emit_listing(ctx: &Context, command: &str, path: &str, entries: Vec<String>) -> Result<()> {
    if !ctx.json {
        if !ctx.quiet {
            for entry in &entries {
                println!("{entry}");
            }
        }
        return Ok(());
    }
    let report = ListReport { path, entries };
    emit_success(ctx.output(), command, &report, None)
}

pub(crate) fn run_log(ctx: &Context, path: &str) -> Result<()> {
    let ws = ctx.open()?;
    let last_change = ws.history(path)?;

    let mut human = match &last_change {
        Some(revision) => {
            let mut human = HumanOutput::new(format!("gitsave log: {path}"));
            human.push_summary("commit", revision.commit.clone());
            human.push_summary("author", format!("{} <{}>", revision.author, revision.email));
            human.push_summary("date", revision.time.to_rfc3339());
            human.push_summary("summary", revision.summary.clone());
            human
        }
        None => HumanOutput::new(format!("gitsave log: no commit touches {path}")),
    };
    if last_change.is_none() {
        human.push_next_step("gitsave files");
    }

    let report = LogReport { path, last_change };
    emit_success(ctx.output(), "log", &report, Some(&human))
}
