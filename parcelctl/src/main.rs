mod catalog;
mod command;
mod config;
mod session;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::bail;
use clap::{Parser, Subcommand};
use rustyline::{error::ReadlineError, DefaultEditor};

use crate::catalog::Catalog;
use crate::command::Command;
use crate::config::Config;
use crate::session::{Flow, Session};

/// Explore a parcel record file through a quadtree, a red-black tree and a B+ tree.
#[derive(Parser)]
#[command(name = "parcelctl", author, version, about = "Parcel index CLI", long_about = None)]
struct Cli {
    /// Path to configuration file (default: $HOME/.parcelrc).
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// B+ tree order, overriding the config file.
    #[arg(long = "order")]
    order: Option<usize>,

    /// Record file to load before running commands.
    #[arg(short = 'f', long = "file")]
    file: Option<PathBuf>,

    /// Execute shell commands and exit. Commands are split on every `;`
    /// before parsing, so paths given here cannot contain `;`.
    #[arg(short = 'e', long = "exec")]
    exec: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a record file and check the structure of every index.
    Validate {
        /// Record file path.
        records: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().or_else(Config::default_path);
    let mut config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(order) = cli.order {
        config.bplus_order = order;
    }

    let log = parcel_log::init(config.log_dir.as_deref(), config.level()?)?;
    if let Some(path) = config_path.filter(|p| p.exists()) {
        tracing::info!(path = %path.display(), "loaded config");
    }

    if let Some(Commands::Validate { records }) = cli.command {
        return validate(&config, &records);
    }

    let mut session = Session::new(&config, Some(log))?;
    let mut stdout = io::stdout().lock();
    if let Some(file) = cli.file {
        session.execute(Command::Load(file), &mut stdout)?;
    }

    if let Some(script) = cli.exec {
        for line in script.split(';').filter(|l| !l.trim().is_empty()) {
            if session.execute(Command::parse(line)?, &mut stdout)? == Flow::Exit {
                break;
            }
        }
        return Ok(());
    }

    interactive_shell(&mut session, &mut stdout)
}

fn validate(config: &Config, records: &Path) -> anyhow::Result<()> {
    let catalog = Catalog::open(config.bplus_order, config.spatial_bounds, records)?;
    println!("{} records", catalog.len());
    let mut failed = 0;
    for (name, result) in catalog.validate() {
        match result {
            Ok(()) => println!("{name}: ok"),
            Err(e) => {
                failed += 1;
                println!("{name}: {e}");
            }
        }
    }
    if failed > 0 {
        bail!("{failed} index(es) failed validation");
    }
    Ok(())
}

/// Interactive readline shell.
fn interactive_shell<W: Write>(session: &mut Session, out: &mut W) -> anyhow::Result<()> {
    let mut rl = DefaultEditor::new()?;
    let prompt = "parcelctl> ";

    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(trimmed)?;
                let command = match Command::parse(trimmed) {
                    Ok(command) => command,
                    Err(e) => {
                        eprintln!("Error: {e}");
                        continue;
                    }
                };
                match session.execute(command, out) {
                    Ok(Flow::Exit) => break,
                    Ok(Flow::Continue) => out.flush()?,
                    Err(e) => eprintln!("Error: {e:#}"),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Readline error: {err}");
                break;
            }
        }
    }
    Ok(())
}
