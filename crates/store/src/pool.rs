use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use vexa_domain::error::Result;

/// Connects a pooled Postgres client and runs embedded migrations.
///
/// Mirrors `examples/original_source/services/transcription-collector/database.py`:
/// connect, then leave table creation to migrations rather than ad hoc DDL
/// at request time.
pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}
