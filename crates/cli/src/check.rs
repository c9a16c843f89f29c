use clap::Args;
use similar::{ChangeTag, TextDiff};
use std::fmt::Write as _;
use std::fs;
use std::io::ErrorKind;

use crate::common::{InputArgs, generate_code};

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Print a diff of the stale declarations
    #[arg(long)]
    pub diff: bool,
}

pub fn run(args: CheckArgs) -> i32 {
    crate::exit_code(run_inner(&args))
}

fn run_inner(args: &CheckArgs) -> Result<(), String> {
    let config = args.input.resolve_config()?;
    let generated = generate_code(&config)?;
    if let Some(message) = generated.failure_message() {
        return Err(message);
    }

    let path = config.output.display().to_string();
    let existing = match fs::read_to_string(&config.output) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(format!("{path} does not exist; run `typegen generate`"));
        }
        Err(err) => return Err(format!("Failed to read {path}: {err}")),
    };

    match unified_diff(&path, &existing, &generated.code) {
        None => {
            println!("{path} is up to date");
            Ok(())
        }
        Some(diff) => {
            if args.diff {
                print!("{diff}");
            }
            Err(format!("{path} is out of date; run `typegen generate`"))
        }
    }
}

/// Colored unified diff from `existing` to `new`, `None` when equal.
fn unified_diff(path: &str, existing: &str, new: &str) -> Option<String> {
    if existing == new {
        return None;
    }

    let diff = TextDiff::from_lines(existing, new);
    let mut output = String::new();
    let _ = writeln!(output, "\x1b[1m--- {path} (current)\x1b[0m");
    let _ = writeln!(output, "\x1b[1m+++ {path} (generated)\x1b[0m");

    for (idx, group) in diff.grouped_ops(3).iter().enumerate() {
        if idx > 0 {
            output.push_str("...\n");
        }
        for op in group {
            for change in diff.iter_changes(op) {
                let (sign, color) = match change.tag() {
                    ChangeTag::Delete => ("-", "\x1b[31m"),
                    ChangeTag::Insert => ("+", "\x1b[32m"),
                    ChangeTag::Equal => (" ", ""),
                };
                output.push_str(color);
                output.push_str(sign);
                output.push_str(change.value());
                if change.missing_newline() {
                    output.push('\n');
                }
                if !color.is_empty() {
                    output.push_str("\x1b[0m");
                }
            }
        }
    }

    Some(output)
}
