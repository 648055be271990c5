//! Command-line entry point for the Rye compiler.

use std::path::PathBuf;

use clap::Parser;

/// Compile a Rye parse-tree document to textual LLVM-style IR.
#[derive(Parser, Debug)]
#[command(name = "ryec", version, about)]
struct Cli {
    /// Parse-tree document (`.ast.json`) of the root module.
    input: PathBuf,

    /// Output path for the IR document.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut options = ryec::CompileOptions::new(cli.input);
    options.out_path = cli.output;
    let out = ryec::compile(options)?;
    eprintln!("wrote {}", out.display());
    Ok(())
}
