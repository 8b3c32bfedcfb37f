use crate::error::AuditError;
use crate::schema;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use oktsec_types::{AuditEntry, AuditStatus, TriggeredRule};
use rusqlite::{params, Connection, OpenFlags, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

const WRITE_CHANNEL_CAPACITY: usize = 1024;
const BATCH_SIZE: usize = 500;
const BATCH_INTERVAL: Duration = Duration::from_millis(100);

enum WriterMsg {
    Entry(Box<AuditEntry>),
    Flush(oneshot::Sender<()>),
}

/// Durable append-only audit log with write-behind batching, covering-index
/// analytic queries, and a background retention sweeper.
///
/// One writable connection, typed row structs, `OpenFlags` for read-only
/// reader connections.
pub struct AuditStore {
    db_path: PathBuf,
    tx: mpsc::Sender<WriterMsg>,
    writer_handle: tokio::task::JoinHandle<()>,
}

impl AuditStore {
    /// Opens (creating if needed) the SQLite file at `db_path`, runs schema
    /// init + `ANALYZE`, and spawns the write-behind writer task.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        {
            let conn = Connection::open(&db_path)?;
            schema::init(&conn)?;
        }

        let (tx, rx) = mpsc::channel(WRITE_CHANNEL_CAPACITY);
        let writer_path = db_path.clone();
        let writer_handle = tokio::spawn(writer_loop(writer_path, rx));

        Ok(Self {
            db_path,
            tx,
            writer_handle,
        })
    }

    fn read_conn(&self) -> Result<Connection, AuditError> {
        Ok(Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY,
        )?)
    }

    /// Enqueues `entry` onto the write-behind channel and returns immediately.
    /// Never returns an error to the caller that would abort message
    /// evaluation; backpressure (a full bounded channel) is the only
    /// suspension point.
    pub async fn log(&self, entry: AuditEntry) {
        if self
            .tx
            .send(WriterMsg::Entry(Box::new(entry)))
            .await
            .is_err()
        {
            error!("audit writer task is gone; entry dropped");
        }
    }

    /// Drains the channel and awaits commit. Used by tests and graceful
    /// shutdown only.
    pub async fn flush(&self) -> Result<(), AuditError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(WriterMsg::Flush(done_tx))
            .await
            .map_err(|_| AuditError::WriterClosed)?;
        done_rx.await.map_err(|_| AuditError::WriterClosed)
    }

    pub async fn close(self) -> Result<(), AuditError> {
        self.flush().await?;
        drop(self.tx);
        let _ = self.writer_handle.await;
        Ok(())
    }

    pub fn query_by_id(&self, id: &str) -> Result<Option<AuditEntry>, AuditError> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, from_agent, to_agent, content_hash, signature_verified,
                    pubkey_fingerprint, status, rules_triggered, policy_decision, latency_ms
             FROM audit_log WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row_to_entry(row)?))
        } else {
            Ok(None)
        }
    }

    /// General-purpose query used by the gateway/tests. Filters are ANDed.
    pub fn query(&self, opts: &QueryOpts) -> Result<Vec<AuditEntry>, AuditError> {
        let conn = self.read_conn()?;
        let mut sql = String::from(
            "SELECT id, timestamp, from_agent, to_agent, content_hash, signature_verified,
                    pubkey_fingerprint, status, rules_triggered, policy_decision, latency_ms
             FROM audit_log WHERE 1=1",
        );
        let mut binds: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(from) = &opts.from {
            sql.push_str(" AND from_agent = ?");
            binds.push(Box::new(from.clone()));
        }
        if let Some(to) = &opts.to {
            sql.push_str(" AND to_agent = ?");
            binds.push(Box::new(to.clone()));
        }
        if let Some(status) = &opts.status {
            sql.push_str(" AND status = ?");
            binds.push(Box::new(status.as_str().to_string()));
        }
        if let Some(since) = &opts.since {
            sql.push_str(" AND timestamp >= ?");
            binds.push(Box::new(since.to_rfc3339()));
        }
        sql.push_str(" ORDER BY timestamp DESC LIMIT ?");
        binds.push(Box::new(opts.limit as i64));

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = binds.iter().map(|b| b.as_ref()).collect();
        let mut rows = stmt.query(param_refs.as_slice())?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row_to_entry(row)?);
        }
        Ok(out)
    }

    /// Count of `status` rows for `from_agent` since `since`. Used by the
    /// history-escalation stage; the WHERE clause is ordered to ride the
    /// `(timestamp DESC, from_agent, status)` covering index as an
    /// index-only scan.
    pub fn count_recent_status(
        &self,
        from_agent: &str,
        status: AuditStatus,
        since: DateTime<Utc>,
    ) -> Result<i64, AuditError> {
        let conn = self.read_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM audit_log
             WHERE timestamp >= ?1 AND from_agent = ?2 AND status = ?3",
            params![since.to_rfc3339(), from_agent, status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Rows from the last 24h, scoped via an RFC3339 cutoff computed here in
    /// Rust (never the database's own datetime function).
    fn rows_last_24h(&self) -> Result<Vec<AuditEntry>, AuditError> {
        let cutoff = Utc::now() - ChronoDuration::hours(24);
        self.query(&QueryOpts {
            since: Some(cutoff),
            limit: i64::MAX as usize,
            ..Default::default()
        })
    }

    pub fn query_stats(&self) -> Result<AuditStats, AuditError> {
        let rows = self.rows_last_24h()?;
        let mut stats = AuditStats::default();
        for row in &rows {
            stats.total += 1;
            match row.status {
                AuditStatus::Delivered => stats.delivered += 1,
                AuditStatus::Blocked => stats.blocked += 1,
                AuditStatus::Quarantined => stats.quarantined += 1,
                AuditStatus::Rejected => stats.rejected += 1,
            }
        }
        Ok(stats)
    }

    pub fn query_hourly_stats(&self) -> Result<Vec<HourlyBucket>, AuditError> {
        use std::collections::BTreeMap;
        let rows = self.rows_last_24h()?;
        let mut buckets: BTreeMap<String, i64> = BTreeMap::new();
        for row in &rows {
            let key = row.timestamp.format("%Y-%m-%dT%H:00:00Z").to_string();
            *buckets.entry(key).or_insert(0) += 1;
        }
        Ok(buckets
            .into_iter()
            .map(|(hour, count)| HourlyBucket { hour, count })
            .collect())
    }

    pub fn query_top_rules(&self, n: usize) -> Result<Vec<TopRule>, AuditError> {
        use std::collections::HashMap;
        let rows = self.rows_last_24h()?;
        let mut counts: HashMap<String, i64> = HashMap::new();
        for row in &rows {
            for rule in &row.rules_triggered {
                *counts.entry(rule.rule_id.clone()).or_insert(0) += 1;
            }
        }
        let mut top: Vec<TopRule> = counts
            .into_iter()
            .map(|(rule_id, count)| TopRule { rule_id, count })
            .collect();
        top.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.rule_id.cmp(&b.rule_id)));
        top.truncate(n);
        Ok(top)
    }

    pub fn query_agent_risk(&self) -> Result<Vec<AgentRisk>, AuditError> {
        use std::collections::HashMap;
        let rows = self.rows_last_24h()?;
        let mut per_agent: HashMap<String, AgentRisk> = HashMap::new();
        for row in &rows {
            let entry = per_agent
                .entry(row.from.clone())
                .or_insert_with(|| AgentRisk::new(row.from.clone()));
            entry.total += 1;
            let severity_weight = row
                .rules_triggered
                .iter()
                .map(|r| match r.severity {
                    oktsec_types::Severity::Critical => 1.3,
                    oktsec_types::Severity::High => 1.15,
                    oktsec_types::Severity::Medium => 1.0,
                    oktsec_types::Severity::Low => 0.9,
                })
                .fold(1.0_f64, f64::max);
            match row.status {
                AuditStatus::Blocked => entry.blocked += 1,
                AuditStatus::Rejected => entry.rejected += 1,
                AuditStatus::Quarantined => entry.quarantined += 1,
                AuditStatus::Delivered => {}
            }
            if matches!(row.status, AuditStatus::Blocked | AuditStatus::Rejected) {
                entry.weighted_risk_sum += severity_weight;
            }
        }
        let mut out: Vec<AgentRisk> = per_agent.into_values().collect();
        for risk in &mut out {
            risk.risk_score = if risk.total > 0 {
                (risk.weighted_risk_sum / risk.total as f64).min(1.0)
            } else {
                0.0
            };
        }
        out.sort_by(|a, b| a.agent.cmp(&b.agent));
        Ok(out)
    }

    /// Background sweeper: deletes `audit_log` rows older than `retention_days`.
    /// `retention_days == 0` means unbounded (no-op). Retention takes
    /// priority over quarantine expiry on a tie.
    pub fn purge_older_than(&self, retention_days: u32) -> Result<usize, AuditError> {
        if retention_days == 0 {
            return Ok(0);
        }
        let cutoff = Utc::now() - ChronoDuration::days(retention_days as i64);
        let conn = Connection::open(&self.db_path)?;
        let deleted = conn.execute(
            "DELETE FROM audit_log WHERE timestamp < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(deleted)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryOpts {
    pub from: Option<String>,
    pub to: Option<String>,
    pub status: Option<AuditStatus>,
    pub since: Option<DateTime<Utc>>,
    pub limit: usize,
}

impl QueryOpts {
    pub fn recent(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuditStats {
    pub total: i64,
    pub delivered: i64,
    pub blocked: i64,
    pub quarantined: i64,
    pub rejected: i64,
}

#[derive(Debug, Clone)]
pub struct HourlyBucket {
    pub hour: String,
    pub count: i64,
}

#[derive(Debug, Clone)]
pub struct TopRule {
    pub rule_id: String,
    pub count: i64,
}

#[derive(Debug, Clone)]
pub struct AgentRisk {
    pub agent: String,
    pub total: i64,
    pub blocked: i64,
    pub rejected: i64,
    pub quarantined: i64,
    pub risk_score: f64,
    weighted_risk_sum: f64,
}

impl AgentRisk {
    fn new(agent: String) -> Self {
        Self {
            agent,
            total: 0,
            blocked: 0,
            rejected: 0,
            quarantined: 0,
            risk_score: 0.0,
            weighted_risk_sum: 0.0,
        }
    }
}

fn row_to_entry(row: &Row) -> rusqlite::Result<AuditEntry> {
    let timestamp: String = row.get(1)?;
    let rules_triggered: String = row.get(8)?;
    let status: String = row.get(7)?;
    Ok(AuditEntry {
        id: row.get(0)?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        from: row.get(2)?,
        to: row.get(3)?,
        content_hash: row.get(4)?,
        signature_verified: row.get(5)?,
        pubkey_fingerprint: row.get(6)?,
        status: parse_status(&status),
        rules_triggered: serde_json::from_str::<Vec<TriggeredRule>>(&rules_triggered)
            .unwrap_or_default(),
        policy_decision: row.get(9)?,
        latency_ms: row.get(10)?,
    })
}

fn parse_status(s: &str) -> AuditStatus {
    match s {
        "delivered" => AuditStatus::Delivered,
        "blocked" => AuditStatus::Blocked,
        "quarantined" => AuditStatus::Quarantined,
        _ => AuditStatus::Rejected,
    }
}

async fn writer_loop(db_path: PathBuf, mut rx: mpsc::Receiver<WriterMsg>) {
    let conn = match Connection::open(&db_path) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "audit writer failed to open database; writer exiting");
            return;
        }
    };

    let mut pending: Vec<AuditEntry> = Vec::with_capacity(BATCH_SIZE);
    let mut ticker = tokio::time::interval(BATCH_INTERVAL);

    loop {
        tokio::select! {
            msg = rx.recv() => {
                match msg {
                    Some(WriterMsg::Entry(entry)) => {
                        pending.push(*entry);
                        if pending.len() >= BATCH_SIZE {
                            commit_batch(&conn, &mut pending);
                        }
                    }
                    Some(WriterMsg::Flush(ack)) => {
                        while let Ok(msg) = rx.try_recv() {
                            match msg {
                                WriterMsg::Entry(entry) => pending.push(*entry),
                                WriterMsg::Flush(other_ack) => {
                                    commit_batch(&conn, &mut pending);
                                    let _ = other_ack.send(());
                                }
                            }
                        }
                        commit_batch(&conn, &mut pending);
                        let _ = ack.send(());
                    }
                    None => {
                        commit_batch(&conn, &mut pending);
                        debug!("audit writer channel closed, exiting");
                        return;
                    }
                }
            }
            _ = ticker.tick() => {
                if !pending.is_empty() {
                    commit_batch(&conn, &mut pending);
                }
            }
        }
    }
}

fn commit_batch(conn: &Connection, pending: &mut Vec<AuditEntry>) {
    if pending.is_empty() {
        return;
    }
    let result: rusqlite::Result<()> = (|| {
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR REPLACE INTO audit_log
                 (id, timestamp, from_agent, to_agent, content_hash, signature_verified,
                  pubkey_fingerprint, status, rules_triggered, policy_decision, latency_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for entry in pending.iter() {
                let rules_json = serde_json::to_string(&entry.rules_triggered).unwrap_or_default();
                stmt.execute(params![
                    entry.id,
                    entry.timestamp.to_rfc3339(),
                    entry.from,
                    entry.to,
                    entry.content_hash,
                    entry.signature_verified,
                    entry.pubkey_fingerprint,
                    entry.status.as_str(),
                    rules_json,
                    entry.policy_decision,
                    entry.latency_ms,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    })();
    if let Err(e) = result {
        warn!(error = %e, "audit batch commit failed; entries dropped (observability must not become a DoS vector)");
    }
    pending.clear();
}
