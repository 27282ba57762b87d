//! `pl0`: runs a PL/0 source file directly, chaining lex -> codegen -> run
//! without ever materializing an instruction file on disk.

use std::fs;
use std::io::{stdin, stdout};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::error;

use pl0c::codegen::codegen;
use pl0c::lexer::lex;
use pl0c::vm::{run, Config};

#[derive(Parser, Debug)]
#[command(author, version, about = "Compile and run a PL/0 source file in one step")]
struct Cli {
    /// Path to the PL/0 source file.
    file: PathBuf,

    /// Maximum instruction count accepted before execution is refused.
    #[arg(long, default_value_t = Config::default().max_code_length)]
    max_code_length: usize,

    /// Maximum stack height the interpreter will grow to.
    #[arg(long, default_value_t = Config::default().max_stack_height)]
    max_stack_height: usize,

    /// Specify the log level of the toolchain.
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

    let config = Config {
        max_code_length: args.max_code_length,
        max_stack_height: args.max_stack_height,
    };

    let mut input = std::io::BufReader::new(stdin());
    let mut output = stdout();
    if let Err(err) = run(&code, &mut input, &mut output, &config) {
        error!("{}", err);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
