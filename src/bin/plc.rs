//! `plc`: compiles a source file down to the plain-text instruction format,
//! stopping short of execution (lex -> parse -> codegen).

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::error;

use pl0c::codegen::codegen;
use pl0c::io::dump_instructions;
use pl0c::lexer::lex;

#[derive(Parser, Debug)]
#[command(author, version, about = "Compile a PL/0 source file to its instruction image")]
struct Cli {
    /// Path to the PL/0 source file.
    file: PathBuf,

    /// Path to write the instruction image to. Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Specify the log level of the compiler.
    #[arg(value_enum, short, long, default_value_t = LogLevel::default())]
    verbosity: LogLevel,
}

#[derive(ValueEnum, Clone, Default, Debug)]
enum LogLevel {
    #[default]
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<&LogLevel> for log::Level {
    fn from(value: &LogLevel) -> Self {
        match value {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

fn main() -> ExitCode {
    let args = Cli::parse();
    simple_logger::init_with_level((&args.verbosity).into()).unwrap();

    let source = match fs::read_to_string(&args.file) {
        Ok(source) => source,
        Err(err) => {
            error!("could not read {}: {}", args.file.display(), err);
            return ExitCode::FAILURE;
        }
    };

    let tokens = match lex(&source) {
        Ok(tokens) => tokens,
        Err(failure) => {
            error!("{}", failure.error);
            return ExitCode::FAILURE;
        }
    };

    let code = match codegen(&tokens) {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    let text = dump_instructions(&code);
    match args.output {
        Some(path) => {
            if let Err(err) = fs::write(&path, text) {
                error!("could not write {}: {}", path.display(), err);
                return ExitCode::FAILURE;
            }
        }
        None => print!("{text}"),
    }

    ExitCode::SUCCESS
}
