//! Shared output formatting for gitsave CLI commands.
//!
//! JSON mode wraps every result in an envelope carrying the schema version,
//! the command name, and a status; human mode prints a header with summary
//! and detail sections.

use serde::Serialize;

use crate::error::Result;

pub const SCHEMA_VERSION: &str = "gitsave.v1";

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct HumanOutput {
    header: String,
    summary: Vec<(String, String)>,
    details: Vec<String>,
    warnings: Vec<String>,
    next_steps: Vec<String>,
}

impl HumanOutput {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            summary: Vec::new(),
            details: Vec::new(),
            warnings: Vec::new(),
            next_steps: Vec::new(),
        }
    }

    pub fn push_summary(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.summary.push((key.into(), value.into()));
    }

    pub fn push_detail(&mut self, value: impl Into<String>) {
        self.details.push(value.into());
    }

    pub fn push_warning(&mut self, value: impl Into<String>) {
        self.warnings.push(value.into());
    }

    pub fn push_next_step(&mut self, value: impl Into<String>) {
        self.next_steps.push(value.into());
    }
}

/// JSON envelope shared by success and error output.
#[derive(Serialize)]
struct Envelope<'a, B: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    #[serde(flatten)]
    body: B,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    warnings: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    next_steps: &'a [String],
}

#[derive(Serialize)]
struct DataBody<'a, T: Serialize> {
    data: &'a T,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorFields<'a>,
}

#[derive(Serialize)]
struct ErrorFields<'a> {
    message: &'a str,
    code: i32,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

fn print_envelope<B: Serialize>(envelope: &Envelope<'_, B>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(envelope)?);
    Ok(())
}

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        let (warnings, next_steps) = match human {
            Some(human) => (human.warnings.as_slice(), human.next_steps.as_slice()),
            None => (&[][..], &[][..]),
        };
        return print_envelope(&Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            body: DataBody { data },
            warnings,
            next_steps,
        });
    }

    match human {
        Some(human) if !options.quiet => println!("{}", format_human(human)),
        _ => {}
    }
    Ok(())
}

pub fn emit_error(command: &str, err: &crate::error::Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);

    if json {
        let message = err.to_string();
        return print_envelope(&Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            body: ErrorBody {
                error: ErrorFields {
                    message: &message,
                    code: err.exit_code(),
                    kind: error_kind(err),
                    details: err.details(),
                },
            },
            warnings: &[],
            next_steps: &next_steps,
        });
    }

    eprintln!("error: {err}");
    if let Some(hint) = next_steps.first() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

/// Render a header followed by the non-empty sections.
pub fn format_human(output: &HumanOutput) -> String {
    let summary: Vec<String> = output
        .summary
        .iter()
        .map(|(key, value)| {
            if value.is_empty() {
                key.clone()
            } else {
                format!("{key}: {value}")
            }
        })
        .collect();

    let mut text = output.header.clone();
    for (title, items) in [
        ("Summary", summary.as_slice()),
        ("Details", output.details.as_slice()),
        ("Warnings", output.warnings.as_slice()),
        ("Next steps", output.next_steps.as_slice()),
    ] {
        if items.is_empty() {
            continue;
        }
        text.push_str("\n\n");
        text.push_str(title);
        text.push(':');
        for item in items {
            text.push_str("\n- ");
            text.push_str(item);
        }
    }
    text
}

pub fn infer_command_name_from_args() -> String {
    infer_command_name(std::env::args().skip(1))
}

/// First positional argument, skipping global flags and their values.
pub fn infer_command_name<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let arg = arg.as_ref();
        if arg == "--repo" || arg == "--author" {
            args.next();
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        return arg.to_string();
    }
    "gitsave".to_string()
}

fn error_kind(err: &crate::error::Error) -> &'static str {
    use crate::error::exit_codes;

    match err.exit_code() {
        exit_codes::USER_ERROR => "user_error",
        exit_codes::CONFLICT => "conflict",
        _ => "operation_failed",
    }
}

fn error_next_steps(err: &crate::error::Error) -> Vec<String> {
    use crate::error::Error;

    match err {
        Error::RepoNotFound(_) => vec!["gitsave init".to_string()],
        Error::InvalidConfig(_) => vec!["fix .git/gitsave.toml then retry".to_string()],
        Error::EntryNotADirectory(path) => vec![format!("gitsave cat {path}")],
        Error::EntryMissing(_) => vec!["gitsave files".to_string()],
        Error::GitConflicts(report) => report
            .paths()
            .into_iter()
            .map(|path| format!("gitsave cat {path}"))
            .collect(),
        Error::LockTimeout(_) => vec!["gitsave unlock (only if no writer is running)".to_string()],
        Error::PushRetriesExhausted(_) => vec!["retry the save".to_string()],
        _ => Vec::new(),
    }
}
