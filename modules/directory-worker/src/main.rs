use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use directory_core::{AppConfig, DirectoryDeps, Scope, ScopeType};
use directory_domains::Directory;
use serde_json::json;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "directory-worker", about = "Operational jobs for the location directory")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,

    /// Renumber ranks for one scope, or every scope with --all
    Recompute {
        /// `regional` or `sub-regional`
        #[arg(long, requires = "scope_id", conflicts_with = "all")]
        scope_type: Option<ScopeType>,

        #[arg(long, requires = "scope_type")]
        scope_id: Option<i64>,

        #[arg(long)]
        all: bool,
    },

    /// Recompute cached brand aggregates, for one brand or all of them
    RefreshBrands {
        #[arg(long)]
        brand_id: Option<Uuid>,
    },

    /// Soft-delete a location and renumber the scopes it leaves
    Deactivate {
        location_id: Uuid,
    },

    /// Print active locations near a point
    Nearby {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lng: f64,

        /// Defaults to `proximity.default_radius_miles`
        #[arg(long)]
        radius: Option<f64>,

        /// Defaults to `proximity.default_limit`
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Print the ranked locations of a scope
    Leaderboard {
        #[arg(long)]
        scope_type: ScopeType,

        #[arg(long)]
        scope_id: i64,

        /// Defaults to `ranking.default_limit`
        #[arg(long)]
        limit: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let config = AppConfig::from_env()?;
    let deps = DirectoryDeps::connect(&config)
        .await
        .context("Failed to connect to database")?;

    if let Commands::Migrate = cli.command {
        directory_domains::migrate(deps.pool())
            .await
            .context("Failed to run migrations")?;
        return Ok(());
    }

    let directory = Directory::new(&deps);

    match cli.command {
        Commands::Migrate => {}
        Commands::Recompute {
            scope_type,
            scope_id,
            all,
        } => {
            let summaries = match (scope_type, scope_id, all) {
                (_, _, true) => directory.recompute_all_scopes().await?,
                (Some(scope_type), Some(scope_id), false) => {
                    vec![directory.recompute_ranks(Scope::new(scope_type, scope_id)).await?]
                }
                _ => bail!("pass --scope-type and --scope-id, or --all"),
            };

            let ranked: u64 = summaries.iter().map(|s| s.ranked).sum();
            tracing::info!(scopes = summaries.len(), ranked, "Recompute finished");
            print_json(&summaries)?;
        }
        Commands::RefreshBrands { brand_id } => match brand_id {
            Some(brand_id) => {
                let stats = directory.refresh_brand_stats(brand_id).await?;
                print_json(&json!({ "brand_id": brand_id, "stats": stats }))?;
            }
            None => {
                let refreshed = directory.refresh_all_brand_stats().await?;
                print_json(&json!({ "refreshed": refreshed }))?;
            }
        },
        Commands::Deactivate { location_id } => {
            match directory.deactivate_location(location_id).await? {
                Some(location) => print_json(&location)?,
                None => bail!("no location with id {location_id}"),
            }
        }
        Commands::Nearby {
            lat,
            lng,
            radius,
            limit,
        } => {
            let defaults = &deps.config.proximity;
            let results = directory
                .find_nearby(
                    lat,
                    lng,
                    radius.unwrap_or(defaults.default_radius_miles),
                    limit.unwrap_or(defaults.default_limit),
                )
                .await?;
            print_json(&results)?;
        }
        Commands::Leaderboard {
            scope_type,
            scope_id,
            limit,
        } => {
            let scope = Scope::new(scope_type, scope_id);
            let board = match limit {
                Some(limit) => directory.get_by_scope(scope, limit).await?,
                None => directory.leaderboard(scope).await?,
            };
            print_json(&board)?;
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
