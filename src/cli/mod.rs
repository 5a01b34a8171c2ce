//! Command-line interface for gitsave
//!
//! This module defines the CLI structure using clap derive macros.
//! Each group of subcommands is implemented in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::output::OutputOptions;
use crate::workspace::Workspace;

mod edit;
mod init;
mod read;
mod unlock;

/// gitsave - path-addressed working tree over git
///
/// Edit files in a git-backed store and save each edit to a shared mainline
/// branch, serialized across writers by a lock reference.
#[derive(Parser, Debug)]
#[command(name = "gitsave")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the repository (defaults to current directory)
    #[arg(long, global = true, env = "GITSAVE_REPO")]
    pub repo: Option<PathBuf>,

    /// Author for commits, as `Name <email>`
    #[arg(long, global = true)]
    pub author: Option<String>,

    /// Publish saves to the configured remote instead of only the local mainline
    #[arg(long, global = true)]
    pub remote: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the repository if needed and write a default gitsave.toml
    Init {
        /// Create a bare repository
        #[arg(long)]
        bare: bool,
    },

    /// Store a file (read from a local file, or stdin with `-`)
    Put {
        /// Destination path in the store
        path: String,
        /// Local file to read, or `-` for stdin
        source: PathBuf,
        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
        /// File mode (octal), e.g. 100755
        #[arg(long, value_parser = parse_mode)]
        mode: Option<u32>,
    },

    /// Remove a file
    Rm {
        path: String,
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Remove every file under a directory
    Rmdir {
        prefix: String,
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Move a file
    Mv {
        old: String,
        new: String,
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Move a directory
    Mvdir {
        old: String,
        new: String,
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Print a file from the mainline
    Cat { path: String },

    /// List a directory on the mainline
    Ls {
        /// Directory to list (defaults to the root)
        dir: Option<String>,
    },

    /// List every file on the mainline
    Files {
        /// Glob filter, e.g. `docs/**/*.md`
        #[arg(long)]
        pattern: Option<String>,
    },

    /// Show the last commit that touched a path
    Log { path: String },

    /// Delete a lock token left behind by a crashed writer
    Unlock,
}

fn parse_mode(raw: &str) -> std::result::Result<u32, String> {
    u32::from_str_radix(raw, 8).map_err(|err| format!("invalid octal mode '{raw}': {err}"))
}

/// Global flags every command sees.
#[derive(Debug, Clone)]
pub(crate) struct Context {
    pub repo: Option<PathBuf>,
    pub author: Option<String>,
    pub remote: bool,
    pub json: bool,
    pub quiet: bool,
}

impl Context {
    fn start_path(&self) -> Result<PathBuf> {
        match &self.repo {
            Some(path) => Ok(path.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    fn open(&self) -> Result<Workspace> {
        Workspace::open(&self.start_path()?, self.author.as_deref())
    }

    fn output(&self) -> OutputOptions {
        OutputOptions {
            json: self.json,
            quiet: self.quiet,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let ctx = Context {
            repo: self.repo,
            author: self.author,
            remote: self.remote,
            json: self.json,
            quiet: self.quiet,
        };

        match self.command {
            Commands::Init { bare } => init::run(&ctx, bare),
            Commands::Put {
                path,
                source,
                message,
                mode,
            } => edit::run_put(&ctx, &path, &source, message, mode),
            Commands::Rm { path, message } => edit::run_rm(&ctx, &path, message),
            Commands::Rmdir { prefix, message } => edit::run_rmdir(&ctx, &prefix, message),
            Commands::Mv { old, new, message } => edit::run_mv(&ctx, &old, &new, message),
            Commands::Mvdir { old, new, message } => edit::run_mvdir(&ctx, &old, &new, message),
            Commands::Cat { path } => read::run_cat(&ctx, &path),
            Commands::Ls { dir } => read::run_ls(&ctx, dir.as_deref().unwrap_or("")),
            Commands::Files { pattern } => read::run_files(&ctx, pattern.as_deref()),
            Commands::Log { path } => read::run_log(&ctx, &path),
            Commands::Unlock => unlock::run(&ctx),
        }
    }
}
