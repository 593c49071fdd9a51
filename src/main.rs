//! cdo - Command-driven task tracking CLI
//!
//! A task tracker driven by free-text commands: one-shot and recurring
//! tasks, LIFO undo, flat-file persistence. Runs a read-eval loop over
//! stdin, or executes a single command with `-c`.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cdo::error::exit_codes;
use cdo::{Engine, Error};

const SCHEMA_VERSION: &str = "cdo.v1";

#[derive(Parser, Debug)]
#[command(name = "cdo", version, about = "Command-driven task tracker")]
struct Cli {
    /// Directory holding the task store (defaults to the current directory)
    #[arg(long, value_name = "PATH")]
    dir: Option<PathBuf>,

    /// Execute one command and exit instead of reading from stdin
    #[arg(short = 'c', long = "command", value_name = "COMMAND")]
    command: Option<String>,

    /// Wrap responses in a JSON envelope
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Envelope<'a> {
    schema_version: &'static str,
    command: &'a str,
    response: &'a str,
}

fn main() -> ExitCode {
    // Tracing is opt-in via RUST_LOG.
    // Keep startup robust: ignore invalid/huge filters.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() || raw.len() > 4096 {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new("off"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    let dir = match cli.dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let mut engine = Engine::open(&dir)?;

    if let Some(command) = cli.command {
        let response = engine.execute_command(&command)?;
        emit(&command, &response, cli.json)?;
        return Ok(());
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let response = engine.execute_command(&line)?;
        emit(&line, &response, cli.json)?;
        if engine.exit_requested() {
            break;
        }
    }
    Ok(())
}

fn emit(command: &str, response: &str, json: bool) -> Result<(), Error> {
    let mut stdout = io::stdout().lock();
    if json {
        let envelope = Envelope {
            schema_version: SCHEMA_VERSION,
            command,
            response,
        };
        serde_json::to_writer(&mut stdout, &envelope)?;
        writeln!(stdout)?;
    } else {
        writeln!(stdout, "{response}")?;
    }
    Ok(())
}
