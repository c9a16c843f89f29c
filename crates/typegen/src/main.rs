//! `typegen` binary: TypeScript types for GROQ query results.

fn main() {
    let args: Vec<String> = std::env::args().collect();
    std::process::exit(typegen_cli::run_cli(args));
}
