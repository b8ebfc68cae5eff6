//! Postgres connection pool.
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::Postgres;

pub const DEFAULT_CREDENTIALS: &str = "postgres";
pub const DEFAULT_DATABASE_NAME: &str = "rally";
pub const DEFAULT_POOL_SIZE: u32 = 10;

#[derive(Clone)]
pub struct Database {
    pub postgres: PgPool,
}

impl Database {
    /// Connect and apply pending migrations.
    pub async fn connect(config: &Postgres) -> Result<Self, Box<dyn std::error::Error>> {
        let username = config.username.as_deref().unwrap_or(DEFAULT_CREDENTIALS);
        let password = config.password.as_deref().unwrap_or(DEFAULT_CREDENTIALS);
        let db = config.database.as_deref().unwrap_or(DEFAULT_DATABASE_NAME);
        let hostname = &config.address;

        let addr = format!("postgres://{username}:{password}@{hostname}/{db}");
        let postgres = PgPoolOptions::new()
            .max_connections(config.pool_size.unwrap_or(DEFAULT_POOL_SIZE))
            .connect(&addr)
            .await?;

        tracing::info!(%hostname, %db, "postgres connected");

        sqlx::migrate!().run(&postgres).await?;

        Ok(Self { postgres })
    }
}
