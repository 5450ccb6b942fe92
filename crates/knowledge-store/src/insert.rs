use crate::error::{Result, StoreError};
use crate::models::{ScanResult, TargetId, TargetStatus, VulnId, VulnStatus};
use crate::open::Db;
use rusqlite::params;
use tracing::{debug, info};

impl Db {
    /// Insert-or-return-existing on the hostname natural key. Re-adding a
    /// known hostname never creates a duplicate row and never mutates it.
    pub fn upsert_target(
        &self,
        hostname: &str,
        ip_address: Option<&str>,
        status: TargetStatus,
    ) -> Result<TargetId> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO targets(hostname, ip_address, status) VALUES (?,?,?)",
                params![hostname, ip_address, status.as_str()],
            )?;
            if inserted > 0 {
                info!(hostname, "added new target to knowledge base");
            } else {
                debug!(hostname, "target already known");
            }
            let id: TargetId = conn.query_row(
                "SELECT id FROM targets WHERE hostname = ?",
                params![hostname],
                |r| r.get(0),
            )?;
            Ok(id)
        })
    }

    /// Validated status overwrite. An illegal move per
    /// `TargetStatus::can_transition` is refused and reported; the row is
    /// untouched. `updated_at` is refreshed by the schema trigger.
    pub fn set_target_status(&self, target_id: TargetId, status: TargetStatus) -> Result<()> {
        self.with_conn(|conn| {
            let current: String = conn
                .query_row(
                    "SELECT status FROM targets WHERE id = ?",
                    params![target_id],
                    |r| r.get(0),
                )
                .map_err(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => StoreError::UnknownTarget(target_id),
                    other => StoreError::Sqlite(other),
                })?;
            let from = TargetStatus::parse(&current).unwrap_or(TargetStatus::New);
            if !from.can_transition(status) {
                return Err(StoreError::IllegalTransition { from, to: status });
            }
            conn.execute(
                "UPDATE targets SET status = ? WHERE id = ?",
                params![status.as_str(), target_id],
            )?;
            Ok(())
        })
    }

    /// Persist a recon result in one transaction: target address/liveness,
    /// then INSERT OR IGNORE for every open port on the
    /// (target, port, protocol) key. A result with no protocol data is a
    /// complete no-op.
    pub fn record_scan_result(&self, target_id: TargetId, scan: &ScanResult) -> Result<()> {
        if scan.protocols.is_empty() {
            debug!(target_id, "scan result carries no protocol data; nothing to record");
            return Ok(());
        }
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE targets SET ip_address = ?, state = ? WHERE id = ?",
                params![scan.address, scan.state.as_str(), target_id],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO ports(target_id, port_number, protocol, service_name, product, version, state)
                     VALUES (?,?,?,?,?,?,?)",
                )?;
                for (proto, ports) in &scan.protocols {
                    for (port, obs) in ports {
                        if obs.state != "open" {
                            continue;
                        }
                        stmt.execute(params![
                            target_id,
                            *port as i64,
                            proto,
                            obs.service,
                            obs.product,
                            obs.version,
                            obs.state,
                        ])?;
                    }
                }
            }
            tx.commit()?;
            info!(target_id, ports = scan.open_port_count(), "recorded scan result");
            Ok(())
        })
    }

    /// Always inserts; vulnerabilities are not deduplicated. Status starts
    /// as `potential`.
    pub fn add_vulnerability(
        &self,
        target_id: TargetId,
        vuln_type: &str,
        tool: &str,
        command: Option<&str>,
        port_id: Option<i64>,
        description: Option<&str>,
    ) -> Result<VulnId> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO vulnerabilities(target_id, port_id, type, description, tool, command)
                 VALUES (?,?,?,?,?,?)",
                params![target_id, port_id, vuln_type, description, tool, command],
            )?;
            info!(target_id, vuln_type, "recorded potential vulnerability");
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn set_vulnerability_status(&self, vuln_id: VulnId, status: VulnStatus) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE vulnerabilities SET status = ? WHERE id = ?",
                params![status.as_str(), vuln_id],
            )?;
            Ok(())
        })
    }

    /// Append-only; every capture is recorded even if it duplicates an
    /// earlier one.
    pub fn add_credential(
        &self,
        password: &str,
        target_id: Option<TargetId>,
        service: Option<&str>,
        username: Option<&str>,
        cred_type: &str,
        source: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO credentials(target_id, service, username, password, type, source)
                 VALUES (?,?,?,?,?,?)",
                params![target_id, service, username, password, cred_type, source],
            )?;
            info!(service, "credentials captured and stored");
            Ok(())
        })
    }

    /// Deduplicated on the (content, type) pair; an exact repeat is a no-op.
    pub fn add_intelligence(
        &self,
        content: &str,
        intel_type: &str,
        source: &str,
        target_id: Option<TargetId>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let known: i64 = conn.query_row(
                "SELECT COUNT(1) FROM intelligence WHERE content = ? AND type = ?",
                params![content, intel_type],
                |r| r.get(0),
            )?;
            if known > 0 {
                debug!(intel_type, "intelligence already present, skipping");
                return Ok(());
            }
            conn.execute(
                "INSERT INTO intelligence(target_id, type, source, content) VALUES (?,?,?,?)",
                params![target_id, intel_type, source, content],
            )?;
            info!(intel_type, source, "new intelligence stored");
            Ok(())
        })
    }
}
