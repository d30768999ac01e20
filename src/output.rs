//! Shared output formatting for taskmirror CLI commands.
//!
//! Results go through one JSON envelope in `--json` mode, or a
//! header/summary/sections layout for humans.

use serde::Serialize;

use crate::error::Result;

pub const SCHEMA_VERSION: &str = "taskmirror.v1";

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

pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    human: Option<&HumanOutput>,
) -> Result<()> {
    if options.json {
        let warnings = human.map(|h| h.warnings.clone()).unwrap_or_default();
        let next_steps = human.map(|h| h.next_steps.clone()).unwrap_or_default();

        #[derive(Serialize)]
        struct Envelope<'a, T: Serialize> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            data: &'a T,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            warnings: Vec<String>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            next_steps: Vec<String>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data,
            warnings,
            next_steps,
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if options.quiet {
        return Ok(());
    }

    if let Some(human) = human {
        println!("{}", format_human(human));
    }

    Ok(())
}

pub fn emit_error(command: &str, err: &crate::error::Error, json: bool) -> Result<()> {
    let next_steps = error_next_steps(err);
    if json {
        #[derive(Serialize)]
        struct ErrorBody<'a> {
            message: &'a str,
            code: i32,
            kind: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<serde_json::Value>,
        }

        #[derive(Serialize)]
        struct Envelope<'a> {
            schema_version: &'static str,
            command: &'a str,
            status: &'static str,
            error: ErrorBody<'a>,
            #[serde(skip_serializing_if = "Vec::is_empty")]
            next_steps: Vec<String>,
        }

        let payload = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            error: ErrorBody {
                message: &err.to_string(),
                code: err.exit_code(),
                kind: error_kind(err),
                details: err.details(),
            },
            next_steps,
        };

        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Some(hint) = next_steps.first() {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

pub fn format_human(output: &HumanOutput) -> String {
    let mut lines = Vec::new();
    lines.push(output.header.clone());

    push_summary(&mut lines, &output.summary);
    push_section(&mut lines, "Details", &output.details);
    push_section(&mut lines, "Warnings", &output.warnings);
    push_section(&mut lines, "Next steps", &output.next_steps);

    lines.join("\n")
}

/// Global flags whose value is a separate argument.
const VALUE_FLAGS: [&str; 3] = ["--store", "--owner", "--events"];

pub fn infer_command_name_from_args() -> String {
    infer_command_name(std::env::args().skip(1))
}

fn infer_command_name(args: impl IntoIterator<Item = String>) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut skip_value = false;
    for arg in args {
        if skip_value {
            skip_value = false;
            continue;
        }
        if arg.starts_with('-') {
            skip_value = VALUE_FLAGS.contains(&arg.as_str());
            continue;
        }
        words.push(arg);
        if words[0] != "category" || words.len() == 2 {
            break;
        }
    }

    if words.is_empty() {
        "taskmirror".to_string()
    } else {
        words.join(" ")
    }
}

fn error_kind(err: &crate::error::Error) -> &'static str {
    match err.exit_code() {
        2 => "user_error",
        3 => "permission_denied",
        _ => "operation_failed",
    }
}

fn error_next_steps(err: &crate::error::Error) -> Vec<String> {
    use crate::error::{Error, RemoteError};

    match err {
        Error::NotBound => {
            vec!["pass --owner <id> or set owner.default in .taskmirror.toml".to_string()]
        }
        Error::InvalidConfig(_) => vec!["fix .taskmirror.toml then retry".to_string()],
        Error::SyncTimeout(_) => vec!["raise sync.timeout_ms in .taskmirror.toml".to_string()],
        Error::Write {
            source: RemoteError::NotFound(_),
            ..
        } => vec!["taskmirror list".to_string()],
        Error::Write {
            source: RemoteError::PermissionDenied(_),
            ..
        }
        | Error::Subscription(RemoteError::PermissionDenied(_)) => {
            vec!["check permissions on the store directory".to_string()]
        }
        _ => Vec::new(),
    }
}

fn push_summary(lines: &mut Vec<String>, summary: &[(String, String)]) {
    if summary.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push("Summary:".to_string());
    for (key, value) in summary {
        if value.is_empty() {
            lines.push(format!("- {key}"));
        } else {
            lines.push(format!("- {key}: {value}"));
        }
    }
}

fn push_section(lines: &mut Vec<String>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }

    lines.push(String::new());
    lines.push(format!("{title}:"));
    for item in items {
        lines.push(format!("- {item}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, RemoteError, WriteOp};

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn human_output_lists_sections_in_order() {
        let mut human = HumanOutput::new("Created task t1");
        human.push_summary("title", "Buy milk");
        human.push_summary("completed", "");
        human.push_warning("reminder is in the past");
        human.push_next_step("taskmirror list");

        assert_eq!(
            format_human(&human),
            "Created task t1\n\nSummary:\n- title: Buy milk\n- completed\n\nWarnings:\n- reminder is in the past\n\nNext steps:\n- taskmirror list"
        );
    }

    #[test]
    fn error_kind_follows_exit_code() {
        let denied = Error::write(
            WriteOp::Delete,
            RemoteError::PermissionDenied("tasks".to_string()),
        );
        assert_eq!(error_kind(&denied), "permission_denied");
        assert_eq!(error_kind(&Error::NotBound), "user_error");
        assert_eq!(error_next_steps(&Error::NotBound).len(), 1);
        assert!(error_next_steps(&Error::OperationFailed("x".to_string())).is_empty());
    }

    #[test]
    fn command_name_skips_global_flag_values() {
        assert_eq!(
            infer_command_name(args(&["--store", "data", "--json", "add", "x"])),
            "add"
        );
        assert_eq!(
            infer_command_name(args(&["--owner", "u1", "category", "ls"])),
            "category ls"
        );
        assert_eq!(infer_command_name(args(&["--json"])), "taskmirror");
    }
}
