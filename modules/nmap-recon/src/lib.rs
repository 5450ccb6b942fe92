//! Recon capability backed by the nmap binary. The scan is run with the
//! evasive profile (SYN scan, slow timing, decoys) and grepable output,
//! which is parsed into the store's scan-result record. A missing nmap
//! binary or an unresponsive host yields no result, not an error.

use anyhow::Result;
use async_trait::async_trait;
use cortex_core::ReconModule;
use knowledge_store::{HostState, PortObservation, ScanResult};
use std::collections::BTreeMap;
use std::net::{SocketAddr, ToSocketAddrs};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// Stealth over speed: slow timing and decoys keep load on the target
/// network bounded.
pub const EVASIVE_ARGS: &str = "-sS -T2 --scan-delay 1s -D RND:10 -Pn";

#[derive(Debug, Clone)]
pub struct NmapOptions {
    pub binary: String,
    pub args: String,
}

impl Default for NmapOptions {
    fn default() -> Self {
        NmapOptions {
            binary: "nmap".to_string(),
            args: EVASIVE_ARGS.to_string(),
        }
    }
}

pub struct NmapScanner {
    opts: NmapOptions,
}

impl NmapScanner {
    pub fn new(opts: NmapOptions) -> Self {
        NmapScanner { opts }
    }
}

#[async_trait]
impl ReconModule for NmapScanner {
    fn name(&self) -> &str {
        "nmap_scanner"
    }

    async fn run(&self, hostname: &str) -> Result<Option<ScanResult>> {
        let Some(ip) = resolve_best_effort(hostname) else {
            error!(hostname, "could not resolve hostname; skipping scan");
            return Ok(None);
        };
        info!(hostname, %ip, args = %self.opts.args, "starting evasive nmap scan");

        let mut cmd = Command::new(&self.opts.binary);
        for tok in self.opts.args.split_whitespace() {
            cmd.arg(tok);
        }
        cmd.arg("-oG").arg("-").arg(ip.to_string());

        let output = match cmd.output().await {
            Ok(out) => out,
            Err(e) => {
                // nmap not installed or not executable; recon proceeds
                // without this capability.
                warn!(hostname, error = %e, "nmap unavailable; skipping scan");
                return Ok(None);
            }
        };
        if !output.status.success() {
            warn!(hostname, status = %output.status, "nmap exited with an error");
            return Ok(None);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let Some((state, protocols)) = parse_grepable(&stdout) else {
            warn!(hostname, "host appears down or did not respond");
            return Ok(None);
        };
        info!(hostname, state = state.as_str(), "nmap scan completed");
        Ok(Some(ScanResult {
            host: hostname.to_string(),
            address: Some(ip.to_string()),
            state,
            protocols,
        }))
    }
}

fn resolve_best_effort(hostname: &str) -> Option<std::net::IpAddr> {
    let addrs = (hostname, 0u16).to_socket_addrs().ok()?;
    let mut fallback = None;
    for addr in addrs {
        match addr {
            SocketAddr::V4(v4) => return Some((*v4.ip()).into()),
            SocketAddr::V6(v6) => fallback = Some((*v6.ip()).into()),
        }
    }
    fallback
}

/// Parse `-oG -` output for a single host. Returns the host state and a
/// protocol -> port -> observation map of open ports, or `None` when no host
/// line reports the target as up.
pub fn parse_grepable(
    output: &str,
) -> Option<(HostState, BTreeMap<String, BTreeMap<u16, PortObservation>>)> {
    let mut state = None;
    let mut protocols: BTreeMap<String, BTreeMap<u16, PortObservation>> = BTreeMap::new();

    for line in output.lines() {
        if line.starts_with('#') || !line.starts_with("Host:") {
            continue;
        }
        for field in line.split('\t') {
            if let Some(status) = field.strip_prefix("Status: ") {
                state = Some(match status.trim() {
                    "Up" => HostState::Up,
                    _ => HostState::Down,
                });
            } else if let Some(ports) = field.strip_prefix("Ports: ") {
                for entry in ports.split(", ") {
                    if let Some((proto, port, obs)) = parse_port_entry(entry) {
                        protocols.entry(proto).or_default().insert(port, obs);
                    }
                }
            }
        }
    }

    match state? {
        HostState::Down => None,
        HostState::Up => Some((HostState::Up, protocols)),
    }
}

/// One grepable port entry: `port/state/protocol/owner/service/rpc/version/`.
fn parse_port_entry(entry: &str) -> Option<(String, u16, PortObservation)> {
    let fields: Vec<&str> = entry.trim().split('/').collect();
    if fields.len() < 7 {
        debug!(entry, "malformed port entry");
        return None;
    }
    let port: u16 = fields[0].trim().parse().ok()?;
    let state = fields[1].trim();
    if state != "open" {
        return None;
    }
    let proto = fields[2].trim().to_string();
    let service = non_empty(fields[4]);
    let (product, version) = match fields[6].trim() {
        "" => (None, None),
        info => match info.split_once(' ') {
            Some((p, v)) => (Some(p.to_string()), Some(v.to_string())),
            None => (Some(info.to_string()), None),
        },
    };
    Some((
        proto,
        port,
        PortObservation {
            service,
            product,
            version,
            state: state.to_string(),
        },
    ))
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Nmap 7.94 scan initiated Mon Aug 25 as: nmap -sS -T2 -Pn -oG - 192.0.2.7
Host: 192.0.2.7 (example.com)\tStatus: Up
Host: 192.0.2.7 (example.com)\tPorts: 22/open/tcp//ssh//OpenSSH 9.6p1 Ubuntu/, 80/open/tcp//http//nginx 1.24.0/, 443/closed/tcp//https///\tIgnored State: filtered (997)
# Nmap done at Mon Aug 25 -- 1 IP address (1 host up) scanned
";

    #[test]
    fn parses_open_ports_only() {
        let (state, protocols) = parse_grepable(SAMPLE).unwrap();
        assert_eq!(state, HostState::Up);
        let tcp = &protocols["tcp"];
        assert_eq!(tcp.len(), 2);
        assert_eq!(tcp[&22].service.as_deref(), Some("ssh"));
        assert_eq!(tcp[&22].product.as_deref(), Some("OpenSSH"));
        assert_eq!(tcp[&22].version.as_deref(), Some("9.6p1 Ubuntu"));
        assert_eq!(tcp[&80].product.as_deref(), Some("nginx"));
        assert!(!tcp.contains_key(&443));
    }

    #[test]
    fn down_host_yields_none() {
        let out = "Host: 192.0.2.9 ()\tStatus: Down\n";
        assert!(parse_grepable(out).is_none());
    }

    #[test]
    fn no_host_line_yields_none() {
        assert!(parse_grepable("# Nmap done: 0 hosts up\n").is_none());
    }

    #[test]
    fn up_host_without_ports_has_empty_map() {
        let out = "Host: 192.0.2.7 (example.com)\tStatus: Up\n";
        let (state, protocols) = parse_grepable(out).unwrap();
        assert_eq!(state, HostState::Up);
        assert!(protocols.is_empty());
    }

    #[test]
    fn port_entry_without_version_info() {
        let entry = "53/open/udp//domain///";
        let (proto, port, obs) = parse_port_entry(entry).unwrap();
        assert_eq!(proto, "udp");
        assert_eq!(port, 53);
        assert_eq!(obs.service.as_deref(), Some("domain"));
        assert_eq!(obs.product, None);
    }
}
