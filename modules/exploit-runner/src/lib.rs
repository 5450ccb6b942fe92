//! Exploitation capability: executes the reproduction commands that analysis
//! modules attached to potential vulnerabilities, in order, stopping at the
//! first one that lands. Each attempt updates the vulnerability's status so
//! later cycles skip commands that already failed.

use anyhow::Result;
use async_trait::async_trait;
use cortex_core::{ExploitOutcome, ExploitationModule};
use knowledge_store::{Db, TargetId, VulnStatus};
use std::process::ExitStatus;
use tokio::process::Command;
use tracing::{error, info, warn};

pub struct CommandExploit;

#[async_trait]
impl ExploitationModule for CommandExploit {
    fn name(&self) -> &str {
        "command_exploit"
    }

    async fn run(&self, db: &Db, target_id: TargetId) -> Result<ExploitOutcome> {
        let vulns = db.get_potential_vulnerabilities(target_id)?;
        let runnable: Vec<_> = vulns.iter().filter(|v| v.command.is_some()).collect();
        if runnable.is_empty() {
            info!(target_id, "no runnable exploitation commands on record");
            return Ok(ExploitOutcome::failure(self.name()));
        }

        for vuln in runnable {
            let command = vuln.command.as_deref().unwrap_or_default();
            let tool = vuln.tool.as_deref().unwrap_or("unknown");
            info!(target_id, tool, vuln = %vuln.vuln_type, "executing recorded command");
            let output = match Command::new("sh").arg("-c").arg(command).output().await {
                Ok(out) => out,
                Err(e) => {
                    error!(tool, error = %e, "could not execute command");
                    db.set_vulnerability_status(vuln.id, VulnStatus::Failed)?;
                    continue;
                }
            };
            let stdout = String::from_utf8_lossy(&output.stdout);
            if command_succeeded(tool, output.status, &stdout) {
                warn!(target_id, tool, vuln = %vuln.vuln_type, "exploitation command SUCCEEDED");
                db.set_vulnerability_status(vuln.id, VulnStatus::Confirmed)?;
                return Ok(ExploitOutcome::success(
                    self.name(),
                    format!("{} confirmed via {}", vuln.vuln_type, tool),
                ));
            }
            warn!(target_id, tool, status = %output.status, "exploitation command failed");
            db.set_vulnerability_status(vuln.id, VulnStatus::Failed)?;
        }
        Ok(ExploitOutcome::failure(self.name()))
    }
}

/// A clean exit is necessary but not sufficient: tools like sqlmap exit 0
/// even when nothing was found, so their output must carry a finding marker.
pub fn command_succeeded(tool: &str, status: ExitStatus, stdout: &str) -> bool {
    if !status.success() {
        return false;
    }
    match tool {
        "sqlmap" => stdout.contains("is vulnerable") || stdout.contains("Parameter:"),
        _ => true,
    }
}
