use crate::config::AppConfig;
use crate::file_config::{load_config, FileConfig};
use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use typed_builder::TypedBuilder;

/// Long-lived handles shared by every directory operation.
#[derive(Clone, TypedBuilder)]
pub struct DirectoryDeps {
    pub db_pool: PgPool,
    #[builder(default)]
    pub config: Arc<FileConfig>,
}

impl DirectoryDeps {
    /// Resolve the TOML config (if any) and open a pool sized from it.
    pub async fn connect(app: &AppConfig) -> Result<Self> {
        let config = match &app.config_path {
            Some(path) => load_config(path)?,
            None => FileConfig::default(),
        };

        let db_pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect(&app.database_url)
            .await?;

        tracing::info!(
            max_connections = config.database.max_connections,
            "Connected to database"
        );

        Ok(Self::builder()
            .db_pool(db_pool)
            .config(Arc::new(config))
            .build())
    }

    pub fn pool(&self) -> &PgPool {
        &self.db_pool
    }
}
