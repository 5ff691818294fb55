//! Vigil Store - PostgreSQL persistence
//!
//! Implements the `ProfileStore` seam plus the CRUD accessors behind the
//! HTTP API. Queries are runtime-checked with explicit row mapping; the
//! schema lives in `migrations/`.

pub mod credentials;
pub mod profiles;
pub mod telemetry;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::net::IpAddr;
use tracing::info;
use vigil_core::{Error, Result};

/// Shared handle to the profile database.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a pool to the given database URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| Error::Persistence(format!("failed to connect to database: {e}")))?;

        info!("Database pool connected");

        Ok(Self { pool })
    }

    /// Apply pending schema migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Persistence(format!("migration failed: {e}")))?;
        info!("Database migrations applied");
        Ok(())
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Wrap a database failure as a persistence error.
pub(crate) fn persistence(e: sqlx::Error) -> Error {
    Error::Persistence(e.to_string())
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db) if db.kind() == sqlx::error::ErrorKind::UniqueViolation
    )
}

pub(crate) fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db) if db.kind() == sqlx::error::ErrorKind::ForeignKeyViolation
    )
}

/// Parse an address column. Addresses are validated before insertion, so a
/// bad value here means the row was tampered with outside the API.
pub(crate) fn parse_ip(raw: &str) -> Result<IpAddr> {
    raw.parse()
        .map_err(|_| Error::Persistence(format!("stored address is not a valid IP: {raw}")))
}
