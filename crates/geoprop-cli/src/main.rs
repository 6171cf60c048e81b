mod geocode;
mod index;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "geoprop-cli")]
#[command(about = "Property discovery operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create the search index (if missing) and apply its settings
    InitIndex,
    /// Upsert every property in a JSON array file into the search index
    Reindex {
        /// Path to a JSON file holding an array of property documents
        file: std::path::PathBuf,
        /// Documents sent per index write
        #[arg(long, default_value = "500")]
        batch_size: usize,
        /// Validate the file without writing to the index
        #[arg(long)]
        dry_run: bool,
    },
    /// Geocode an address with the configured provider
    Geocode {
        address: String,
        /// ISO country code restricting the match (e.g., FR)
        #[arg(long)]
        country: Option<String>,
    },
    /// Look up the address at a coordinate
    Reverse {
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(allow_negative_numbers = true)]
        lon: f64,
    },
    /// Great-circle distance in kilometres between two coordinates
    Distance {
        #[arg(allow_negative_numbers = true)]
        lat1: f64,
        #[arg(allow_negative_numbers = true)]
        lon1: f64,
        #[arg(allow_negative_numbers = true)]
        lat2: f64,
        #[arg(allow_negative_numbers = true)]
        lon2: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    let config = geoprop_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::InitIndex => index::run_init_index(&config).await,
        Commands::Reindex {
            file,
            batch_size,
            dry_run,
        } => index::run_reindex(&config, &file, batch_size, dry_run).await,
        Commands::Geocode { address, country } => {
            geocode::run_geocode(&config, &address, country.as_deref()).await
        }
        Commands::Reverse { lat, lon } => geocode::run_reverse(&config, lat, lon).await,
        Commands::Distance {
            lat1,
            lon1,
            lat2,
            lon2,
        } => geocode::run_distance(lat1, lon1, lat2, lon2),
    }
}

#[cfg(test)]
mod tests;
