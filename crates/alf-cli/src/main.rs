use std::path::PathBuf;

use anyhow::{Context, Result};
use alf_pipeline::{AppConfig, ListingService};
use alf_storage::PgAgencyStore;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "alf-cli")]
#[command(about = "Agency Listing Finder command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the resolved listings for a (service, city) page as JSON.
    Resolve {
        #[arg(long)]
        service: String,
        #[arg(long)]
        city: String,
    },
    /// Copy the current bulk page for a (service, city) into the curated store.
    Import {
        #[arg(long)]
        service: String,
        #[arg(long)]
        city: String,
    },
    /// Apply database migrations. Requires DATABASE_URL.
    Migrate,
    /// Load a JSON array of raw agency documents into the bulk table. Requires DATABASE_URL.
    Seed {
        #[arg(long, default_value = "fixtures/agencies.json")]
        file: PathBuf,
    },
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt = fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr);
    if std::env::var("ALF_LOG_JSON").ok().as_deref() == Some("1") {
        fmt.json().init();
    } else {
        fmt.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = AppConfig::from_env();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Resolve { service, city } => {
            let listings = ListingService::from_config(&config).await?;
            let resolved = listings.resolve(&service, &city).await?;
            println!("{}", serde_json::to_string_pretty(&resolved)?);
        }
        Commands::Import { service, city } => {
            let listings = ListingService::from_config(&config).await?;
            let summary = listings.import(&service, &city).await?;
            println!(
                "import complete: service={} city={} imported={}",
                summary.service_slug, summary.city_slug, summary.imported
            );
        }
        Commands::Migrate => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set to run migrations")?;
            let pool = alf_storage::connect(url, config.db_max_connections).await?;
            alf_storage::MIGRATOR.run(&pool).await.context("running migrations")?;
            info!("migrations applied");
        }
        Commands::Seed { file } => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set to seed the bulk store")?;
            let text = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let docs: Vec<serde_json::Value> =
                serde_json::from_str(&text).with_context(|| format!("parsing {}", file.display()))?;
            let pool = alf_storage::connect(url, config.db_max_connections).await?;
            let inserted = PgAgencyStore::new(pool).insert_documents(&docs).await?;
            println!("seed complete: file={} documents={}", file.display(), inserted);
        }
        Commands::Serve => {
            alf_web::serve(&config).await?;
        }
    }

    Ok(())
}
