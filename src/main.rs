use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use fel::bytecode::CompiledCode;
use fel::bytecode::disasm::{print_bc, print_bc_stats};
use fel::frontend::lexer::{LexerReader, get_all_tokens_in_file};
use fel::frontend::parser::parse;
use fel::frontend::token_dumper::TokenDumper;
use fel::lang::printer::print_program;
use fel::{Fel, Log, State, VmConfig};

/// Fel scripting language
#[derive(Parser)]
#[command(name = "fel", version, about = "Fel scripting language", long_about = None)]
struct Cli {
    /// Script to run: `.fel` source or `.felb` compiled bytecode
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Show tokens only
    #[arg(long)]
    tokens: bool,

    /// Disable colors in the token dump
    #[arg(long)]
    no_color: bool,

    /// Include the debug representation of each token
    #[arg(long)]
    pretty: bool,

    /// Print the parsed program instead of running it
    #[arg(long)]
    ast: bool,

    /// Disassemble the bytecode before running
    #[arg(long, visible_alias = "bytecode")]
    bc: bool,

    /// Print instruction statistics before running
    #[arg(long)]
    stats: bool,

    /// Write the compiled bytecode to PATH instead of running it
    #[arg(long, value_name = "PATH")]
    emit: Option<PathBuf>,

    /// Stop after this many executed instructions
    #[arg(long, value_name = "N")]
    max_steps: Option<usize>,
}

fn main() -> ExitCode {
    // Initialize tracing if FEL_LOG is set
    if let Ok(filter) = EnvFilter::try_from_env("FEL_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr)
            .init();
        tracing::debug!("tracing initialized");
    }

    let cli = Cli::parse();

    let mut fel = Fel::with_config(VmConfig {
        max_steps: cli.max_steps,
        ..VmConfig::default()
    });
    fel.set_function("print", print);

    let code = if is_bytecode(&cli.file) {
        match load_bytecode(&cli.file) {
            Some(code) => code,
            None => return ExitCode::FAILURE,
        }
    } else {
        let source = match std::fs::read_to_string(&cli.file) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("Failed to read '{}': {}", cli.file.display(), e);
                return ExitCode::FAILURE;
            }
        };
        let filename = cli.file.display().to_string();

        if cli.tokens {
            return dump_tokens(&source, &filename, cli.no_color, cli.pretty);
        }
        if cli.ast {
            return dump_ast(&source, &filename);
        }

        let mut log = Log::new();
        match fel.compile_string(&source, &filename, &mut log) {
            Some(code) => code,
            None => return report(&log),
        }
    };

    if cli.bc {
        print_bc(&code);
    }
    if cli.stats {
        print_bc_stats(&code);
    }
    if let Some(path) = &cli.emit {
        return emit(&code, path);
    }

    let mut log = Log::new();
    fel.run_compiled(&code, &mut log);
    report(&log)
}

/// Host `print`: writes its arguments back to back, then a newline.
fn print(state: &mut State<'_>) -> usize {
    let line: String = state.args().iter().map(|v| v.to_string()).collect();
    println!("{}", line);
    0
}

fn is_bytecode(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "felb")
}

fn load_bytecode(path: &Path) -> Option<CompiledCode> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to read '{}': {}", path.display(), e);
            return None;
        }
    };
    match CompiledCode::from_bytes(&bytes) {
        Ok(code) => Some(code),
        Err(e) => {
            eprintln!("{}: {}", path.display(), e);
            None
        }
    }
}

fn emit(code: &CompiledCode, path: &Path) -> ExitCode {
    let written = code
        .to_bytes()
        .map_err(|e| e.to_string())
        .and_then(|bytes| std::fs::write(path, bytes).map_err(|e| e.to_string()));
    match written {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Failed to write '{}': {}", path.display(), e);
            ExitCode::FAILURE
        }
    }
}

fn dump_tokens(source: &str, filename: &str, no_color: bool, pretty: bool) -> ExitCode {
    let mut reader = LexerReader::new(source, filename);
    let tokens = get_all_tokens_in_file(&mut reader);

    let mut dumper = TokenDumper::new();
    if no_color {
        dumper = dumper.no_color();
    }
    if pretty {
        dumper = dumper.pretty();
    }
    dumper.dump(&tokens);

    report(&reader.take_log())
}

fn dump_ast(source: &str, filename: &str) -> ExitCode {
    let mut log = Log::new();
    let mut reader = LexerReader::new(source, filename);
    match parse(&mut reader, &mut log) {
        Some(program) => {
            print!("{}", print_program(&program));
            report(&log)
        }
        None => report(&log),
    }
}

/// Prints the log to stderr; failure if it has any entries.
fn report(log: &Log) -> ExitCode {
    if log.is_empty() {
        ExitCode::SUCCESS
    } else {
        eprint!("{}", log);
        ExitCode::FAILURE
    }
}
