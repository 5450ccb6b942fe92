//! Analysis capability: inspects a target's recorded open ports and flags
//! exploitable conditions as potential vulnerabilities. `SshAudit` marks
//! exposed SSH services for credential attacks; `SqlmapPrep` crafts a ready
//! sqlmap command for suspected web services.

use anyhow::Result;
use async_trait::async_trait;
use cortex_core::AnalysisModule;
use knowledge_store::{Db, Port, Target, TargetId};
use tracing::{info, warn};

const SSH_PORT: u16 = 22;
const WEB_PORTS: &[u16] = &[80, 443, 8000, 8080];

async fn target_and_ports(db: &Db, target_id: TargetId) -> Result<Option<(Target, Vec<Port>)>> {
    let Some(target) = db.get_target_by_id(target_id)? else {
        warn!(target_id, "analysis requested for unknown target");
        return Ok(None);
    };
    let ports = db.get_open_ports(target_id)?;
    if ports.is_empty() {
        info!(hostname = %target.hostname, "no open ports on record; nothing to analyze");
        return Ok(None);
    }
    Ok(Some((target, ports)))
}

/// Flags open SSH for the credential-attack stage. The vulnerability is a
/// marker for the exploitation modules and carries no command.
pub struct SshAudit;

#[async_trait]
impl AnalysisModule for SshAudit {
    fn name(&self) -> &str {
        "ssh_audit"
    }

    async fn run(&self, db: &Db, target_id: TargetId) -> Result<()> {
        let Some((target, ports)) = target_and_ports(db, target_id).await? else {
            return Ok(());
        };
        let Some(ssh) = ports.iter().find(|p| p.port_number == SSH_PORT) else {
            info!(hostname = %target.hostname, "ssh port not open; skipping");
            return Ok(());
        };
        warn!(hostname = %target.hostname, port = SSH_PORT, "open SSH service; flagging for credential attack");
        db.add_vulnerability(
            target_id,
            "WEAK_SSH_CREDENTIALS",
            "ssh_bruteforcer",
            None,
            Some(ssh.id),
            Some(&format!(
                "Port {SSH_PORT} is open, making it a potential target for SSH credential stuffing."
            )),
        )?;
        Ok(())
    }
}

/// Prepares a sqlmap probe command when a common web port is open.
pub struct SqlmapPrep;

#[async_trait]
impl AnalysisModule for SqlmapPrep {
    fn name(&self) -> &str {
        "sqlmap_prep"
    }

    async fn run(&self, db: &Db, target_id: TargetId) -> Result<()> {
        let Some((target, ports)) = target_and_ports(db, target_id).await? else {
            return Ok(());
        };
        let Some(web) = ports.iter().find(|p| WEB_PORTS.contains(&p.port_number)) else {
            info!(hostname = %target.hostname, "no common web ports open; skipping");
            return Ok(());
        };
        let url = probe_url(&target.hostname, web.port_number);
        let command = sqlmap_command(&url);
        info!(hostname = %target.hostname, port = web.port_number, "web service detected; crafting sqlmap command");
        db.add_vulnerability(
            target_id,
            "SQL_INJECTION_COMMAND",
            "sqlmap",
            Some(&command),
            Some(web.id),
            Some(&format!("Potential SQL injection vulnerability at {url}")),
        )?;
        Ok(())
    }
}

fn probe_url(hostname: &str, port: u16) -> String {
    let scheme = if port == 443 { "https" } else { "http" };
    // Simplistic entry point; good enough for a first automated probe.
    format!("{scheme}://{hostname}/index.php?id=1")
}

pub fn sqlmap_command(url: &str) -> String {
    format!("sqlmap -u '{url}' --batch --risk=1 --level=2 --random-agent")
}
