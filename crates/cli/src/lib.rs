pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use grocer_handlers::catalog_population::CatalogOperation;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "grocer",
    about = "Grocer operator CLI",
    long_about = "Inspect configuration, check readiness, manage the product catalog, and run payloads through the ordering assistant.",
    after_help = "Examples:\n  grocer doctor --json\n  grocer catalog insert --clear-existing\n  grocer invoke '{\"grocery_items\": [\"2 litres milk\"]}'"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, gateway file, prompts, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Populate or list the product catalog")]
    Catalog {
        #[arg(value_enum)]
        operation: CatalogArg,
        #[arg(long, help = "Delete existing products before inserting the seed catalog")]
        clear_existing: bool,
    },
    #[command(about = "Run one invocation payload through the orchestrator")]
    Invoke {
        #[arg(help = "JSON payload or plain-text instruction")]
        payload: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CatalogArg {
    Insert,
    Select,
}

impl From<CatalogArg> for CatalogOperation {
    fn from(value: CatalogArg) -> Self {
        match value {
            CatalogArg::Insert => Self::Insert,
            CatalogArg::Select => Self::Select,
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Catalog { operation, clear_existing } => {
            commands::catalog::run(operation.into(), clear_existing)
        }
        Command::Invoke { payload } => commands::invoke::run(&payload),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
