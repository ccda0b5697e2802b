use anyhow::Result;
use rusqlite::Connection;
use tracing::debug;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS local_storage (
            key         TEXT PRIMARY KEY,
            value       TEXT NOT NULL,
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- expires_at is a unix timestamp; NULL means session-scoped (no Max-Age)
        CREATE TABLE IF NOT EXISTS cookies (
            name        TEXT PRIMARY KEY,
            value       TEXT NOT NULL,
            expires_at  INTEGER,
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    debug!("Store migrations complete");
    Ok(())
}
