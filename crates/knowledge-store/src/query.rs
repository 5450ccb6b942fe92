use crate::error::Result;
use crate::models::{Port, Target, TargetId, TargetStatus, Vulnerability, VulnStatus};
use crate::open::Db;
use rusqlite::{params, Row};

fn target_from_row(row: &Row<'_>) -> rusqlite::Result<Target> {
    let status: String = row.get("status")?;
    Ok(Target {
        id: row.get("id")?,
        hostname: row.get("hostname")?,
        ip_address: row.get("ip_address")?,
        status: TargetStatus::parse(&status).unwrap_or(TargetStatus::New),
        os: row.get("os")?,
        state: row.get("state")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn vuln_from_row(row: &Row<'_>) -> rusqlite::Result<Vulnerability> {
    let status: String = row.get("status")?;
    Ok(Vulnerability {
        id: row.get("id")?,
        target_id: row.get("target_id")?,
        port_id: row.get("port_id")?,
        vuln_type: row.get("type")?,
        description: row.get("description")?,
        tool: row.get("tool")?,
        command: row.get("command")?,
        status: VulnStatus::parse(&status).unwrap_or(VulnStatus::Potential),
    })
}

impl Db {
    pub fn get_target(&self, hostname: &str) -> Result<Option<Target>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM targets WHERE hostname = ?")?;
            let mut rows = stmt.query_map(params![hostname], target_from_row)?;
            Ok(rows.next().transpose()?)
        })
    }

    pub fn get_target_by_id(&self, target_id: TargetId) -> Result<Option<Target>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM targets WHERE id = ?")?;
            let mut rows = stmt.query_map(params![target_id], target_from_row)?;
            Ok(rows.next().transpose()?)
        })
    }

    /// Targets whose status is in the given set, in rowid (insertion) order.
    /// This is not a priority queue.
    pub fn get_targets_by_status(&self, statuses: &[TargetStatus]) -> Result<Vec<Target>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(|conn| {
            let placeholders = vec!["?"; statuses.len()].join(",");
            let sql = format!(
                "SELECT * FROM targets WHERE status IN ({placeholders}) ORDER BY id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let values: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
            let rows = stmt.query_map(rusqlite::params_from_iter(values), target_from_row)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn get_open_ports(&self, target_id: TargetId) -> Result<Vec<Port>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, target_id, port_number, protocol, service_name, product, version, state
                 FROM ports WHERE target_id = ? AND state = 'open' ORDER BY port_number",
            )?;
            let rows = stmt.query_map(params![target_id], |row| {
                let port_number: i64 = row.get("port_number")?;
                Ok(Port {
                    id: row.get("id")?,
                    target_id: row.get("target_id")?,
                    port_number: port_number as u16,
                    protocol: row.get("protocol")?,
                    service_name: row.get("service_name")?,
                    product: row.get("product")?,
                    version: row.get("version")?,
                    state: row.get("state")?,
                })
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn get_potential_vulnerabilities(&self, target_id: TargetId) -> Result<Vec<Vulnerability>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM vulnerabilities WHERE target_id = ? AND status = 'potential' ORDER BY id",
            )?;
            let rows = stmt.query_map(params![target_id], vuln_from_row)?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }
}
