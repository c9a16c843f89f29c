//! Command-line front end: reads the schema and query files, runs the
//! pipeline and writes or checks the generated TypeScript.
//!
//! ## Module Structure
//!
//! - `common`: input flags, config resolution, query collection
//! - `generate`: `typegen generate`
//! - `check`: `typegen check`

use clap::{CommandFactory, Parser, Subcommand};

pub mod check;
pub mod common;
pub mod generate;

#[derive(Parser, Debug)]
#[command(
    name = "typegen",
    version,
    about = "TypeScript types for GROQ query results"
)]
struct Cli {
    /// Log progress at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate the TypeScript declarations file
    Generate(generate::GenerateArgs),
    /// Fail if the declarations file is out of date
    Check(check::CheckArgs),
}

/// Parse `args` (program name first) and run the command; returns the
/// process exit code.
pub fn run_cli(args: Vec<String>) -> i32 {
    match Cli::try_parse_from(args) {
        Ok(cli) => {
            typegen_common::init_tracing(cli.verbose);
            match cli.command {
                Some(Commands::Generate(args)) => generate::run(args),
                Some(Commands::Check(args)) => check::run(args),
                None => {
                    let mut cmd = Cli::command();
                    let _ = cmd.print_help();
                    println!();
                    0
                }
            }
        }
        Err(e) => {
            let code = e.exit_code();
            let _ = e.print();
            code
        }
    }
}

pub(crate) fn exit_code(result: Result<(), String>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{err}");
            1
        }
    }
}
