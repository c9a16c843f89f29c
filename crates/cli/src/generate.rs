use clap::Args;
use std::fs;
use tracing::debug;

use crate::common::{InputArgs, generate_code};

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

pub fn run(args: GenerateArgs) -> i32 {
    crate::exit_code(run_inner(&args))
}

fn run_inner(args: &GenerateArgs) -> Result<(), String> {
    let config = args.input.resolve_config()?;
    let generated = generate_code(&config)?;

    if let Some(parent) = config.output.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| format!("Failed to create output directory: {err}"))?;
    }
    fs::write(&config.output, &generated.code)
        .map_err(|err| format!("Failed to write {}: {err}", config.output.display()))?;
    debug!(
        output = %config.output.display(),
        bytes = generated.code.len(),
        "Wrote declarations"
    );
    println!(
        "Generated types for {} queries in {}",
        generated.queries - generated.failed,
        config.output.display()
    );

    generated.failure_message().map_or(Ok(()), Err)
}
