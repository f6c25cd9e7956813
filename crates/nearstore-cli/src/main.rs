use std::path::PathBuf;

use clap::{Parser, Subcommand};

use nearstore_core::{ScoreFormula, StrategyKind};

mod commands;
mod scenario;

#[derive(Parser)]
#[command(
    name = "nearstore",
    about = "nearstore — place data items on storage nodes close to the clients that want them",
    version,
    propagate_version = true
)]
struct Cli {
    /// Log at debug level (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the topology from a scenario file and run one placement
    /// strategy over it.
    ///
    /// Strategies: nearest_fit, best_score, knapsack. Flags override the
    /// [placement] section of the scenario.
    Place {
        /// Scenario file (TOML)
        #[arg(short, long)]
        scenario: PathBuf,
        /// Override the placement strategy
        #[arg(long)]
        strategy: Option<StrategyKind>,
        /// Client whose interests nearest_fit places
        #[arg(long)]
        client: Option<String>,
        /// Override the affinity formula (inverse_square, inverse, squared_distance)
        #[arg(long)]
        formula: Option<ScoreFormula>,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Build the topology from a scenario file and report its size
    Validate {
        /// Scenario file (TOML)
        #[arg(short, long)]
        scenario: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "nearstore=debug" } else { "nearstore=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Place {
            scenario,
            strategy,
            client,
            formula,
            format,
        } => commands::place::place(&commands::place::PlaceArgs {
            scenario,
            strategy,
            client,
            formula,
            format,
        }),
        Commands::Validate { scenario } => commands::validate::validate(&scenario),
    }
}
