use anyhow::Result;
use sqlx::SqlitePool;

/// Create the schema. Idempotent; `init` may be run any number of times.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Chunks are content-addressed: the primary key on id is what makes
    // insert-if-absent atomic under concurrent ingestion.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            chunk_type TEXT NOT NULL CHECK (chunk_type IN ('parent', 'child')),
            file_path TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            parent_id TEXT,
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_chunk_type ON chunks(chunk_type)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_file_path ON chunks(file_path)")
        .execute(pool)
        .await?;

    Ok(())
}
