//! jackc - Jack language compiler CLI
//!
//! Compiles a single `.jack` file, or every `.jack` file in a directory, to
//! VM command listings.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::{Path, PathBuf};
use std::process;

#[derive(ClapParser)]
#[command(name = "jackc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Jack compiler - compile .jack sources to VM code", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input .jack file or directory of .jack files
    input: Option<PathBuf>,

    /// Write the raw token stream next to each .vm output, for debugging
    #[arg(long)]
    keep_tokens: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = cli.command {
        run_completions(shell);
        return;
    }

    let Some(input) = cli.input else {
        eprintln!("Error: no input file or directory given");
        process::exit(1);
    };

    if let Err(e) = run(&input, cli.keep_tokens) {
        tracing::error!("{e}");
        process::exit(1);
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "jackc", &mut io::stdout());
}

fn run(input: &Path, keep_tokens: bool) -> n2t_diagnostics::Result<()> {
    if input.is_dir() {
        for file in collect_jack_files(input)? {
            compile_one(&file, keep_tokens)?;
        }
    } else {
        compile_one(input, keep_tokens)?;
    }
    Ok(())
}

fn collect_jack_files(dir: &Path) -> n2t_diagnostics::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "jack"))
        .collect();
    files.sort();
    Ok(files)
}

fn compile_one(path: &Path, keep_tokens: bool) -> n2t_diagnostics::Result<()> {
    tracing::debug!("compiling {}", path.display());
    let source = std::fs::read_to_string(path)?;

    if keep_tokens {
        let tokens = jackc::token::tokenize(&source, path)?;
        let tokens_path = path.with_extension("tokens");
        std::fs::write(&tokens_path, format!("{tokens:#?}"))?;
    }

    let vm = jackc::compile(&source, path)?;
    let out_path = path.with_extension("vm");
    std::fs::write(&out_path, vm)?;
    println!("{} -> {}", path.display(), out_path.display());
    Ok(())
}
