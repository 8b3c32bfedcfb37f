use rusqlite::Connection;

/// DDL for the audit_log, quarantine, and revoked_keys tables, plus the
/// covering index `(timestamp DESC, from_agent, status)`.
pub fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS audit_log (
            id TEXT PRIMARY KEY,
            timestamp TEXT NOT NULL,
            from_agent TEXT NOT NULL,
            to_agent TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            signature_verified INTEGER NOT NULL,
            pubkey_fingerprint TEXT,
            status TEXT NOT NULL,
            rules_triggered TEXT NOT NULL,
            policy_decision TEXT NOT NULL,
            latency_ms INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_audit_log_covering
            ON audit_log (timestamp DESC, from_agent, status);

        CREATE TABLE IF NOT EXISTS quarantine (
            id TEXT PRIMARY KEY,
            audit_entry_id TEXT NOT NULL,
            content TEXT NOT NULL,
            from_agent TEXT NOT NULL,
            to_agent TEXT NOT NULL,
            rules_triggered TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            reviewed_by TEXT,
            reviewed_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_quarantine_status ON quarantine (status);

        CREATE TABLE IF NOT EXISTS revoked_keys (
            fingerprint TEXT PRIMARY KEY,
            agent_name TEXT NOT NULL,
            reason TEXT NOT NULL,
            revoked_at TEXT NOT NULL
        );
        "#,
    )?;
    conn.execute_batch("ANALYZE;")?;
    Ok(())
}
