use crate::error::AuditError;
use chrono::{DateTime, Utc};
use oktsec_types::{AuditStatus, QuarantineItem, QuarantineStatus, TriggeredRule};
use rusqlite::{params, Connection, Row};
use std::path::PathBuf;

/// A view over the `quarantine` table of the same database `AuditStore` owns.
pub struct QuarantineQueue {
    db_path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct QuarantineStats {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub expired: i64,
}

impl QuarantineQueue {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    fn conn(&self) -> Result<Connection, AuditError> {
        Ok(Connection::open(&self.db_path)?)
    }

    pub fn enqueue(&self, item: &QuarantineItem) -> Result<(), AuditError> {
        let conn = self.conn()?;
        let rules_json = serde_json::to_string(&item.rules_triggered).unwrap_or_default();
        conn.execute(
            "INSERT INTO quarantine
             (id, audit_entry_id, content, from_agent, to_agent, rules_triggered, status,
              created_at, expires_at, reviewed_by, reviewed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                item.id,
                item.audit_entry_id,
                item.content,
                item.from,
                item.to,
                rules_json,
                item.status.as_str(),
                item.created_at.to_rfc3339(),
                item.expires_at.to_rfc3339(),
                item.reviewed_by,
                item.reviewed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn by_id(&self, id: &str) -> Result<Option<QuarantineItem>, AuditError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(select_sql("WHERE id = ?1"))?;
        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row_to_item(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn query(
        &self,
        status: Option<QuarantineStatus>,
        agent: Option<&str>,
        limit: usize,
    ) -> Result<Vec<QuarantineItem>, AuditError> {
        let conn = self.conn()?;
        let mut sql = String::from(
            "SELECT id, audit_entry_id, content, from_agent, to_agent, rules_triggered, status,
                    created_at, expires_at, reviewed_by, reviewed_at
             FROM quarantine WHERE 1=1",
        );
        let mut binds: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(status) = status {
            sql.push_str(" AND status = ?");
            binds.push(Box::new(status.as_str().to_string()));
        }
        if let Some(agent) = agent {
            sql.push_str(" AND (from_agent = ? OR to_agent = ?)");
            binds.push(Box::new(agent.to_string()));
            binds.push(Box::new(agent.to_string()));
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ?");
        binds.push(Box::new(limit as i64));

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = binds.iter().map(|b| b.as_ref()).collect();
        let mut rows = stmt.query(param_refs.as_slice())?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row_to_item(row)?);
        }
        Ok(out)
    }

    pub fn stats(&self) -> Result<QuarantineStats, AuditError> {
        let conn = self.conn()?;
        let mut stats = QuarantineStats::default();
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM quarantine GROUP BY status")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let status: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            match status.as_str() {
                "pending" => stats.pending = count,
                "approved" => stats.approved = count,
                "rejected" => stats.rejected = count,
                "expired" => stats.expired = count,
                _ => {}
            }
        }
        Ok(stats)
    }

    /// Approves a pending item: sets it `approved` and flips the linked
    /// audit entry's status to `delivered`.
    pub fn approve(&self, id: &str, reviewer: &str) -> Result<(), AuditError> {
        self.transition(id, QuarantineStatus::Approved, reviewer, AuditStatus::Delivered)
    }

    /// Rejects a pending item: sets it `rejected` and flips the linked audit
    /// entry's status to `blocked`.
    pub fn reject(&self, id: &str, reviewer: &str) -> Result<(), AuditError> {
        self.transition(id, QuarantineStatus::Rejected, reviewer, AuditStatus::Blocked)
    }

    fn transition(
        &self,
        id: &str,
        new_status: QuarantineStatus,
        reviewer: &str,
        audit_status: AuditStatus,
    ) -> Result<(), AuditError> {
        let item = self
            .by_id(id)?
            .ok_or_else(|| AuditError::NotFound(id.to_string()))?;
        if item.status.is_terminal() {
            return Err(AuditError::AlreadyTerminal(id.to_string(), item.status.as_str()));
        }
        let now = Utc::now();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE quarantine SET status = ?1, reviewed_by = ?2, reviewed_at = ?3 WHERE id = ?4",
            params![new_status.as_str(), reviewer, now.to_rfc3339(), id],
        )?;
        tx.execute(
            "UPDATE audit_log SET status = ?1 WHERE id = ?2",
            params![audit_status.as_str(), item.audit_entry_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Reaps `pending` items whose `expires_at` has passed, setting them
    /// `expired` with `reviewed_by = "system"`. Runs on a recurring sweep.
    /// A row retention already deleted from `audit_log` has no bearing
    /// here — this sweep only touches `quarantine` rows, which retention
    /// does not purge.
    pub fn expire(&self) -> Result<usize, AuditError> {
        let conn = self.conn()?;
        let now = Utc::now().to_rfc3339();
        let affected = conn.execute(
            "UPDATE quarantine SET status = 'expired', reviewed_by = 'system', reviewed_at = ?1
             WHERE status = 'pending' AND expires_at < ?1",
            params![now],
        )?;
        Ok(affected)
    }
}

fn select_sql(predicate: &str) -> String {
    format!(
        "SELECT id, audit_entry_id, content, from_agent, to_agent, rules_triggered, status,
                created_at, expires_at, reviewed_by, reviewed_at
         FROM quarantine {predicate}"
    )
}

fn row_to_item(row: &Row) -> rusqlite::Result<QuarantineItem> {
    let rules_triggered: String = row.get(5)?;
    let status: String = row.get(6)?;
    let created_at: String = row.get(7)?;
    let expires_at: String = row.get(8)?;
    let reviewed_at: Option<String> = row.get(10)?;
    Ok(QuarantineItem {
        id: row.get(0)?,
        audit_entry_id: row.get(1)?,
        content: row.get(2)?,
        from: row.get(3)?,
        to: row.get(4)?,
        rules_triggered: serde_json::from_str::<Vec<TriggeredRule>>(&rules_triggered)
            .unwrap_or_default(),
        status: parse_status(&status),
        created_at: parse_time(&created_at),
        expires_at: parse_time(&expires_at),
        reviewed_by: row.get(9)?,
        reviewed_at: reviewed_at.map(|t| parse_time(&t)),
    })
}

fn parse_status(s: &str) -> QuarantineStatus {
    match s {
        "pending" => QuarantineStatus::Pending,
        "approved" => QuarantineStatus::Approved,
        "rejected" => QuarantineStatus::Rejected,
        _ => QuarantineStatus::Expired,
    }
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    fn sample_item(id: &str, audit_entry_id: &str) -> QuarantineItem {
        let now = Utc::now();
        QuarantineItem {
            id: id.to_string(),
            audit_entry_id: audit_entry_id.to_string(),
            content: "hello".into(),
            from: "a".into(),
            to: "b".into(),
            rules_triggered: vec![],
            status: QuarantineStatus::Pending,
            created_at: now,
            expires_at: now + chrono::Duration::hours(24),
            reviewed_by: None,
            reviewed_at: None,
        }
    }

    fn setup() -> (tempfile::TempDir, QuarantineQueue) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.db");
        let conn = Connection::open(&path).unwrap();
        schema::init(&conn).unwrap();
        conn.execute(
            "INSERT INTO audit_log (id, timestamp, from_agent, to_agent, content_hash,
             signature_verified, pubkey_fingerprint, status, rules_triggered, policy_decision, latency_ms)
             VALUES ('audit-1', ?1, 'a', 'b', 'hash', 0, NULL, 'quarantined', '[]', 'quarantine', 1)",
            params![Utc::now().to_rfc3339()],
        )
        .unwrap();
        (dir, QuarantineQueue::new(path))
    }

    #[test]
    fn approve_transitions_and_updates_audit() {
        let (_dir, queue) = setup();
        queue.enqueue(&sample_item("q-1", "audit-1")).unwrap();
        queue.approve("q-1", "reviewer").unwrap();
        let item = queue.by_id("q-1").unwrap().unwrap();
        assert_eq!(item.status, QuarantineStatus::Approved);
        assert_eq!(item.reviewed_by.as_deref(), Some("reviewer"));
    }

    #[test]
    fn terminal_state_rejects_further_transitions() {
        let (_dir, queue) = setup();
        queue.enqueue(&sample_item("q-1", "audit-1")).unwrap();
        queue.approve("q-1", "reviewer").unwrap();
        assert!(queue.reject("q-1", "reviewer2").is_err());
    }

    #[test]
    fn expire_reaps_past_due_pending_items() {
        let (_dir, queue) = setup();
        let mut item = sample_item("q-1", "audit-1");
        item.expires_at = Utc::now() - chrono::Duration::hours(1);
        queue.enqueue(&item).unwrap();
        let affected = queue.expire().unwrap();
        assert_eq!(affected, 1);
        let item = queue.by_id("q-1").unwrap().unwrap();
        assert_eq!(item.status, QuarantineStatus::Expired);
        assert_eq!(item.reviewed_by.as_deref(), Some("system"));
    }
}
