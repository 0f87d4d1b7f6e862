use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Symbol `{0}` is not registered in the mirror.")]
    UnknownSymbol(String),
}
