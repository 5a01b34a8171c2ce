//! gitsave init command implementation
//!
//! Creates the repository when missing and writes a default `gitsave.toml`
//! into its git directory.

use std::path::PathBuf;

use git2::{ErrorCode, Repository};

use super::Context;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::workspace::Workspace;

#[derive(serde::Serialize)]
struct InitReport {
    git_dir: PathBuf,
    mainline: String,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    repository: bool,
    config: bool,
}

pub(crate) fn run(ctx: &Context, bare: bool) -> Result<()> {
    let path = ctx.start_path()?;
    let created_repository = match Repository::open(&path) {
        Ok(_) => false,
        Err(err) if err.code() == ErrorCode::NotFound => true,
        Err(err) => return Err(Error::Git(err)),
    };

    let ws = Workspace::init(&path, bare, ctx.author.as_deref())?;
    let config_path = ws.config_path();
    let created_config = !config_path.exists();
    if created_config {
        Config::default().save(&config_path)?;
    }

    let report = InitReport {
        git_dir: ws.repo().path().to_path_buf(),
        mainline: ws.mainline_ref(),
        created: InitCreated {
            repository: created_repository,
            config: created_config,
        },
    };

    let mut created_items = Vec::new();
    if created_repository {
        created_items.push(if bare { "bare repository" } else { "repository" });
    }
    if created_config {
        created_items.push("gitsave.toml");
    }

    let header = if created_items.is_empty() {
        "gitsave init: nothing to do".to_string()
    } else {
        "gitsave init: initialized store".to_string()
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("git dir", report.git_dir.display().to_string());
    human.push_summary("mainline", report.mainline.clone());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    human.push_next_step("gitsave put <path> <file>");

    emit_success(ctx.output(), "init", &report, Some(&human))
}
