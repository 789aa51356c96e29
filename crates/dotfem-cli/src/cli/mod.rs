mod commands;
mod helpers;

use clap::Parser;
use dotfem_core::domain::DotError;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let error = error.as_dot_error();
            eprintln!("{}", error.diagnostic_line());
            eprintln!("{}", error.fatal_exit_line());
            error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("dotfem".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => dispatch_parsed(cli.command),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

#[derive(Parser)]
#[command(name = "dotfem", version, about = "Spectral diffuse-optical forward solver")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Solve the forward problem for a spectral mesh and write a JSON report
    Forward(commands::ForwardArgs),
    /// List recognized solver identifiers
    Solvers,
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Forward(args) => commands::run_forward_command(args),
        CliCommand::Solvers => commands::run_solvers_command(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(DotError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<DotError> for CliError {
    fn from(error: DotError) -> Self {
        Self::Compute(error)
    }
}

impl CliError {
    fn as_dot_error(&self) -> DotError {
        match self {
            Self::Usage(message) => DotError::invalid_argument("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => DotError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
