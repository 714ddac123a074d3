pub mod dto;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;
pub mod traits;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::error::Result;

/// Shared connection pool handed to handlers and repositories.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn with_max_connections(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}
