pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "courtier",
    about = "Courtier operator CLI",
    long_about = "Operate the demand-check and sales-performance core: config inspection, \
                  matrix computation, historical backfill and demo seeding.",
    after_help = "Examples:\n  courtier config\n  courtier matrix --month 2025-05\n  courtier backfill"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with secrets redacted")]
    Config,
    #[command(about = "Compute one month's consultant performance matrices on the demo dataset")]
    Matrix {
        #[arg(long, help = "Month to compute, YYYY-MM (defaults to the current month)")]
        month: Option<String>,
    },
    #[command(about = "Run the historical monthly performance backfill on the demo dataset")]
    Backfill,
    #[command(about = "Build the consultant allocation for a synthetic BU opportunity")]
    Allocate {
        #[arg(long, default_value_t = 1, help = "Opportunity id used for the cohort split")]
        opportunity_id: i64,
    },
    #[command(about = "Apply pending migrations and load deterministic demo fixtures")]
    Seed,
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Matrix { month } => commands::matrix::run(month.as_deref()).await,
        Command::Backfill => commands::backfill::run().await,
        Command::Allocate { opportunity_id } => commands::allocate::run(opportunity_id).await,
        Command::Seed => commands::seed::run().await,
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn parses_matrix_month_argument() {
        let cli = Cli::parse_from(["courtier", "matrix", "--month", "2025-05"]);
        match cli.command {
            Command::Matrix { month } => assert_eq!(month.as_deref(), Some("2025-05")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_bare_subcommands() {
        assert!(matches!(
            Cli::parse_from(["courtier", "backfill"]).command,
            Command::Backfill
        ));
        assert!(matches!(Cli::parse_from(["courtier", "seed"]).command, Command::Seed));
        assert!(matches!(Cli::parse_from(["courtier", "config"]).command, Command::Config));
    }

    #[test]
    fn allocate_defaults_its_opportunity_id() {
        match Cli::parse_from(["courtier", "allocate"]).command {
            Command::Allocate { opportunity_id } => assert_eq!(opportunity_id, 1),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
