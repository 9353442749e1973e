//! vmc - VM command translator CLI
//!
//! Translates a single `.vm` file, or every `.vm` file in a directory, into
//! Hack assembly. Directory mode combines all files into one
//! `<dirname>.asm`.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::{Path, PathBuf};
use std::process;

#[derive(ClapParser)]
#[command(name = "vmc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "VM translator - translate .vm files to Hack assembly", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input .vm file or directory of .vm files
    input: Option<PathBuf>,
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

    if let Err(e) = run(&input) {
        tracing::error!("{e}");
        process::exit(1);
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "vmc", &mut io::stdout());
}

fn run(input: &Path) -> n2t_diagnostics::Result<()> {
    if input.is_dir() {
        let files = collect_vm_files(input)?;
        let sources: Vec<(PathBuf, String)> = files
            .into_iter()
            .map(|path| {
                let source = std::fs::read_to_string(&path)?;
                Ok::<_, n2t_diagnostics::Error>((path, source))
            })
            .collect::<n2t_diagnostics::Result<Vec<_>>>()?;
        let refs: Vec<(&Path, &str)> = sources
            .iter()
            .map(|(path, source)| (path.as_path(), source.as_str()))
            .collect();

        tracing::debug!("translating directory {}", input.display());
        let asm = vmc::translate_program(&refs)?;

        let dir_name = input
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("output");
        let out_path = input.join(format!("{dir_name}.asm"));
        std::fs::write(&out_path, asm)?;
        println!("{} -> {}", input.display(), out_path.display());
    } else {
        tracing::debug!("translating {}", input.display());
        let source = std::fs::read_to_string(input)?;
        let asm = vmc::translate_program(&[(input, &source)])?;
        let out_path = input.with_extension("asm");
        std::fs::write(&out_path, asm)?;
        println!("{} -> {}", input.display(), out_path.display());
    }
    Ok(())
}

fn collect_vm_files(dir: &Path) -> n2t_diagnostics::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "vm"))
        .collect();
    files.sort();
    Ok(files)
}
