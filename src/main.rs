use clap::{Parser, Subcommand};
use logrelay::record::RoutingMetadata;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logrelay")]
#[command(about = "Reliable log delivery with durable fallback", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the monitoring and ingest API
    Run,
    /// Deliver newline-delimited JSON records from a file
    Ship {
        file: PathBuf,
        #[arg(long, default_value = "default")]
        tenant: String,
        #[arg(long, default_value = "api_upload")]
        source: String,
        #[arg(long)]
        environment: Option<String>,
    },
    /// Check that the aggregator accepts a connection and a frame
    Probe,
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logrelay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = logrelay::config::resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run) | None => {
            logrelay::cli::run::run(config_path).await?;
        }
        Some(Commands::Ship {
            file,
            tenant,
            source,
            environment,
        }) => {
            let metadata = RoutingMetadata {
                tenant_id: tenant,
                source,
                environment,
                task_id: None,
            };
            logrelay::cli::ship::ship(config_path, &file, metadata).await?;
        }
        Some(Commands::Probe) => {
            logrelay::cli::probe::probe(config_path).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                logrelay::cli::config::init(stdout)?;
            }
            ConfigAction::Validate => {
                logrelay::cli::config::validate(config_path)?;
            }
        },
    }

    Ok(())
}
