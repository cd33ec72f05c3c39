//! Errors raised outside the repository port: pool setup and migrations.

use thiserror::Error;

/// Errors raised while connecting to or migrating the database.
///
/// Query failures during normal operation are reported as
/// [`orders::RepositoryError`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("invalid postgres pool settings: {0}")]
    PoolBuild(#[from] deadpool_postgres::BuildError),

    #[error("no postgres connection available: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("migration {version} failed: {source}")]
    Migration {
        version: &'static str,
        #[source]
        source: tokio_postgres::Error,
    },
}
