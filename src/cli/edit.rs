//! Mutating commands: put, rm, rmdir, mv, mvdir.
//!
//! Each command is one session: request a staging index seeded from the
//! mainline, apply the edit, and save it locally or to the remote.

use std::io::Read;
use std::path::Path;

use super::Context;
use crate::entry::EntryMetadata;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::push::SaveReport;
use crate::refs;
use crate::staging::StagingIndex;
use crate::workspace::Workspace;

#[derive(serde::Serialize)]
struct EditReport<'a> {
    action: &'static str,
    paths: Vec<&'a str>,
    changed: usize,
    remote: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    save: Option<SaveReport>,
}

pub(crate) fn run_put(
    ctx: &Context,
    path: &str,
    source: &Path,
    message: Option<String>,
    mode: Option<u32>,
) -> Result<()> {
    let content = if source == Path::new("-") {
        let mut buffer = Vec::new();
        std::io::stdin().read_to_end(&mut buffer)?;
        buffer
    } else {
        std::fs::read(source)?
    };

    let mut metadata = EntryMetadata::default();
    if let Some(mode) = mode {
        metadata = metadata.with_mode(mode);
    }

    let ws = ctx.open()?;
    let mut staging = ws.staging(None)?;
    staging.add(path, &content, metadata)?;
    let message = message.unwrap_or_else(|| format!("put {path}"));
    let save = save(ctx, &ws, staging, &message)?;
    report(ctx, "put", vec![path], 1, Some(save))
}

pub(crate) fn run_rm(ctx: &Context, path: &str, message: Option<String>) -> Result<()> {
    let ws = ctx.open()?;
    let mut staging = ws.staging(None)?;
    let changed = usize::from(staging.exists(path));
    staging.remove(path)?;
    let message = message.unwrap_or_else(|| format!("rm {path}"));
    let save = save_if_changed(ctx, &ws, staging, changed, &message)?;
    report(ctx, "rm", vec![path], changed, save)
}

pub(crate) fn run_rmdir(ctx: &Context, prefix: &str, message: Option<String>) -> Result<()> {
    let ws = ctx.open()?;
    let mut staging = ws.staging(None)?;
    let changed = staging.remove_subtree(prefix)?;
    let message = message.unwrap_or_else(|| format!("rmdir {prefix}"));
    let save = save_if_changed(ctx, &ws, staging, changed, &message)?;
    report(ctx, "rmdir", vec![prefix], changed, save)
}

pub(crate) fn run_mv(ctx: &Context, old: &str, new: &str, message: Option<String>) -> Result<()> {
    let ws = ctx.open()?;
    let mut staging = ws.staging(None)?;
    let changed = usize::from(staging.exists(old));
    staging.move_file(old, new)?;
    let message = message.unwrap_or_else(|| format!("mv {old} {new}"));
    let save = save_if_changed(ctx, &ws, staging, changed, &message)?;
    report(ctx, "mv", vec![old, new], changed, save)
}

pub(crate) fn run_mvdir(ctx: &Context, old: &str, new: &str, message: Option<String>) -> Result<()> {
    let ws = ctx.open()?;
    let mut staging = ws.staging(None)?;
    let changed = staging.move_subtree(old, new)?;
    let message = message.unwrap_or_else(|| format!("mvdir {old} {new}"));
    let save = save_if_changed(ctx, &ws, staging, changed, &message)?;
    report(ctx, "mvdir", vec![old, new], changed, save)
}

fn save(ctx: &Context, ws: &Workspace, staging: StagingIndex<'_>, message: &str) -> Result<SaveReport> {
    if ctx.remote {
        ws.save_remote(staging, message)
    } else {
        ws.save_local(staging, message)
    }
}

/// Skip the save entirely when the edit matched nothing.
fn save_if_changed(
    ctx: &Context,
    ws: &Workspace,
    staging: StagingIndex<'_>,
    changed: usize,
    message: &str,
) -> Result<Option<SaveReport>> {
    if changed == 0 {
        return Ok(None);
    }
    save(ctx, ws, staging, message).map(Some)
}

fn report(
    ctx: &Context,
    action: &'static str,
    paths: Vec<&str>,
    changed: usize,
    save: Option<SaveReport>,
) -> Result<()> {
    let mut human = HumanOutput::new(format!("gitsave {action}: {}", paths.join(" -> ")));
    human.push_summary("changed", changed.to_string());
    match &save {
        Some(save) => {
            human.push_summary("commit", refs::short(save.commit));
            human.push_summary("mainline", refs::short(save.tip));
            if ctx.remote {
                human.push_summary("push attempts", save.attempts.to_string());
            }
        }
        None => human.push_warning("nothing matched; nothing was saved"),
    }

    let data = EditReport {
        action,
        paths,
        changed,
        remote: ctx.remote,
        save,
    };
    emit_success(ctx.output(), action, &data, Some(&human))
}
