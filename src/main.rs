//! LS-8 Emulator - CLI Entry Point
//!
//! Commands:
//! - `ls8-emu run <program>` - Run a program until it halts
//! - `ls8-emu debug <program>` - Interactive debugger
//! - `ls8-emu asm <source>` - Assemble to a binary-literal program
//! - `ls8-emu disasm <program>` - Disassemble a program

use std::path::{Path, PathBuf};
use std::process::exit;

use clap::{ArgAction, Parser, Subcommand};
use ls8::cpu::output::Stdout;
use ls8::{AssemblerError, Cpu, CpuError, ProgramError};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "ls8-emu")]
#[command(version)]
#[command(about = "An emulator for the LS-8 8-bit computer")]
struct Cli {
    /// Increase the level of verbosity. Can be used multiple times.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the program (`.asm` files are assembled first)
        program: PathBuf,
        /// Stop after this many instructions
        #[arg(short, long)]
        max_cycles: Option<u64>,
        /// Print a trace line to stderr before every instruction
        #[arg(short, long)]
        trace: bool,
        /// Print the final CPU state as JSON
        #[arg(long)]
        dump_state: bool,
    },
    /// Interactive debugger
    Debug {
        /// Path to the program to debug
        program: PathBuf,
    },
    /// Assemble source to a binary-literal program
    Asm {
        /// Path to the source file
        source: PathBuf,
        /// Output file (defaults to the source with an `.ls8` extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Disassemble a program to readable text
    Disasm {
        /// Path to the program
        program: PathBuf,
    },
}

impl Cli {
    const fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "ls8=info,ls8_emu=info,warn",
            2 => "ls8=debug,ls8_emu=debug,info",
            3..=u8::MAX => "trace",
        }
    }

    fn filter_layer(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.log_filter()))
    }
}

/// Errors surfaced by the CLI.
#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Program(#[from] ProgramError),

    #[error("{path}: {source}")]
    Assembler { path: String, source: AssemblerError },

    #[error("{0}")]
    Memory(#[from] ls8::cpu::memory::MemoryError),

    #[error("CPU error at PC={pc:02X}: {source}")]
    Cpu { pc: usize, source: CpuError },

    #[error("failed to serialize CPU state: {0}")]
    Json(#[from] serde_json::Error),

    #[error("debugger error: {0}")]
    Io(#[from] std::io::Error),

    #[error("this build has no debugger; rebuild with the `tui` feature")]
    NoDebugger,
}

fn main() {
    let cli = Cli::parse();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(cli.filter_layer())
        .with(fmt_layer)
        .init();

    let result = match cli.command {
        Commands::Run { program, max_cycles, trace, dump_state } => {
            run_program(&program, max_cycles, trace, dump_state)
        }
        Commands::Debug { program } => debug_program(&program),
        Commands::Asm { source, output } => assemble_file(&source, output),
        Commands::Disasm { program } => disassemble_file(&program),
    };

    if let Err(e) = result {
        error!("{}", e);
        exit(1);
    }
}

/// Load a program image, assembling `.asm` sources on the way.
fn load_image(path: &Path) -> Result<Vec<u8>, CliError> {
    info!(path = %path.display(), "Reading program");

    let image = if path.extension().is_some_and(|ext| ext == "asm") {
        let source = std::fs::read_to_string(path)
            .map_err(|e| ProgramError::IoError(format!("{}: {}", path.display(), e)))?;
        ls8::assemble(&source).map_err(|source| CliError::Assembler {
            path: path.display().to_string(),
            source,
        })?
    } else {
        ls8::load_program(path)?
    };

    debug!(bytes = image.len(), "Program loaded");
    Ok(image)
}

fn run_program(path: &Path, max_cycles: Option<u64>, trace: bool, dump_state: bool) -> Result<(), CliError> {
    let image = load_image(path)?;

    let mut cpu = Cpu::new();
    cpu.load_program(&image)?;

    info!("Running program");
    let mut out = Stdout;
    while cpu.is_running() {
        if max_cycles.is_some_and(|max| cpu.cycles >= max) {
            warn!(max_cycles = cpu.cycles, "Reached max cycles limit, stopping");
            break;
        }

        if trace {
            eprintln!("{}", cpu.trace_line());
        }

        let pc = cpu.pc;
        cpu.step(&mut out).map_err(|source| CliError::Cpu { pc, source })?;
    }

    info!(cycles = cpu.cycles, state = ?cpu.state, "Program finished");

    if dump_state {
        println!("{}", serde_json::to_string_pretty(&cpu)?);
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn debug_program(path: &Path) -> Result<(), CliError> {
    let image = load_image(path)?;
    ls8::run_debugger(image)?;
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &Path) -> Result<(), CliError> {
    Err(CliError::NoDebugger)
}

fn assemble_file(source_path: &Path, output: Option<PathBuf>) -> Result<(), CliError> {
    let out_path = output.unwrap_or_else(|| source_path.with_extension("ls8"));

    let source = std::fs::read_to_string(source_path)
        .map_err(|e| ProgramError::IoError(format!("{}: {}", source_path.display(), e)))?;
    let image = ls8::assemble(&source).map_err(|source| CliError::Assembler {
        path: source_path.display().to_string(),
        source,
    })?;

    ls8::save_program(&out_path, &image)?;
    info!(bytes = image.len(), output = %out_path.display(), "Assembled program");

    Ok(())
}

fn disassemble_file(path: &Path) -> Result<(), CliError> {
    let image = load_image(path)?;
    print!("{}", ls8::disassemble(&image));
    Ok(())
}
