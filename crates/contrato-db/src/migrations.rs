use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Tables every healthy database must have.
pub const REQUIRED_TABLES: &[&str] = &["contracts", "notifications", "users"];

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        // Notifications reference contracts without ON DELETE CASCADE: callers
        // must delete a contract's ledger rows first, inside one transaction.
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                full_name   TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE contracts (
                id          TEXT PRIMARY KEY,
                owner_id    TEXT NOT NULL REFERENCES users(id),
                name        TEXT NOT NULL,
                description TEXT,
                starts_at   TEXT NOT NULL,
                ends_at     TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'ativo',
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_contracts_owner_end
                ON contracts(owner_id, ends_at);

            CREATE TABLE notifications (
                id          TEXT PRIMARY KEY,
                contract_id TEXT NOT NULL REFERENCES contracts(id),
                kind        TEXT NOT NULL,
                subject     TEXT NOT NULL,
                message     TEXT,
                recipients  TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'pendente'
                            CHECK (status IN ('pendente', 'enviado', 'erro')),
                sent_at     TEXT,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_notifications_contract
                ON notifications(contract_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
