//! `plvm`: executes a previously compiled instruction image, reading
//! `SIO_READ` input from stdin and writing `SIO_WRITE` output to stdout.

use std::fs;
use std::io::{stdin, stdout};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use log::error;

use pl0c::io::read_instructions;
use pl0c::vm::{run, Config};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run a PL/0 instruction image")]
struct Cli {
    /// Path to the instruction image.
    file: PathBuf,

    /// Maximum instruction count accepted before execution is refused.
    #[arg(long, default_value_t = Config::default().max_code_length)]
    max_code_length: usize,

    /// Maximum stack height the interpreter will grow to.
    #[arg(long, default_value_t = Config::default().max_stack_height)]
    max_stack_height: usize,

    /// Specify the log level of the interpreter.
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

    let text = match fs::read_to_string(&args.file) {
        Ok(text) => text,
        Err(err) => {
            error!("could not read {}: {}", args.file.display(), err);
            return ExitCode::FAILURE;
        }
    };

    let code = match read_instructions(&text) {
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
