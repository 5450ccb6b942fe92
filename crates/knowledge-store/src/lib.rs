//! Durable knowledge base: targets, ports, vulnerabilities, credentials and
//! intelligence, with the insert/query functions below as the only sanctioned
//! mutation paths.

mod error;
mod insert;
mod models;
mod open;
mod query;
mod schema;

pub use error::{Result, StoreError};
pub use models::*;
pub use open::Db;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn scan_with_port(host: &str, port: u16) -> ScanResult {
        let mut tcp = BTreeMap::new();
        tcp.insert(
            port,
            PortObservation {
                service: Some("ssh".into()),
                product: Some("OpenSSH".into()),
                version: Some("9.6".into()),
                state: "open".into(),
            },
        );
        let mut protocols = BTreeMap::new();
        protocols.insert("tcp".to_string(), tcp);
        ScanResult {
            host: host.to_string(),
            address: Some("192.0.2.10".into()),
            state: HostState::Up,
            protocols,
        }
    }

    #[test]
    fn upsert_target_is_idempotent() {
        let db = Db::open_in_memory().unwrap();
        let a = db.upsert_target("example.com", None, TargetStatus::New).unwrap();
        let b = db.upsert_target("example.com", None, TargetStatus::New).unwrap();
        assert_eq!(a, b);
        let all = db.get_targets_by_status(&[TargetStatus::New]).unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn record_scan_result_is_idempotent() {
        let db = Db::open_in_memory().unwrap();
        let id = db.upsert_target("example.com", None, TargetStatus::New).unwrap();
        let scan = scan_with_port("example.com", 22);
        db.record_scan_result(id, &scan).unwrap();
        db.record_scan_result(id, &scan).unwrap();
        let ports = db.get_open_ports(id).unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].port_number, 22);
        assert_eq!(ports[0].protocol, "tcp");
    }

    #[test]
    fn record_scan_result_without_ports_is_noop() {
        let db = Db::open_in_memory().unwrap();
        let id = db.upsert_target("example.com", None, TargetStatus::New).unwrap();
        let scan = ScanResult {
            host: "example.com".into(),
            address: Some("192.0.2.10".into()),
            state: HostState::Up,
            protocols: BTreeMap::new(),
        };
        db.record_scan_result(id, &scan).unwrap();
        let target = db.get_target_by_id(id).unwrap().unwrap();
        // No protocol data: nothing is touched, not even the address.
        assert_eq!(target.ip_address, None);
        assert!(db.get_open_ports(id).unwrap().is_empty());
    }

    #[test]
    fn scan_result_updates_address_and_state() {
        let db = Db::open_in_memory().unwrap();
        let id = db.upsert_target("example.com", None, TargetStatus::New).unwrap();
        db.record_scan_result(id, &scan_with_port("example.com", 22)).unwrap();
        let target = db.get_target_by_id(id).unwrap().unwrap();
        assert_eq!(target.ip_address.as_deref(), Some("192.0.2.10"));
        assert_eq!(target.state.as_deref(), Some("up"));
    }

    #[test]
    fn intelligence_dedups_on_content_and_type() {
        let db = Db::open_in_memory().unwrap();
        db.add_intelligence("https://github.com/example", "social_media_profile", "social_search", None)
            .unwrap();
        db.add_intelligence("https://github.com/example", "social_media_profile", "social_search", None)
            .unwrap();
        let count: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(1) FROM intelligence", [], |r| r.get(0))
                    .map_err(StoreError::from)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn credentials_are_append_only() {
        let db = Db::open_in_memory().unwrap();
        db.add_credential("hunter2", None, Some("ssh"), Some("root"), "plaintext", "exploitation")
            .unwrap();
        db.add_credential("hunter2", None, Some("ssh"), Some("root"), "plaintext", "exploitation")
            .unwrap();
        let count: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(1) FROM credentials", [], |r| r.get(0))
                    .map_err(StoreError::from)
            })
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn vulnerability_roundtrip() {
        let db = Db::open_in_memory().unwrap();
        let id = db.upsert_target("example.com", None, TargetStatus::New).unwrap();
        db.add_vulnerability(id, "WEAK_SSH_CREDENTIALS", "ssh_bruteforcer", None, None, Some("port 22 open"))
            .unwrap();
        let vulns = db.get_potential_vulnerabilities(id).unwrap();
        assert_eq!(vulns.len(), 1);
        assert_eq!(vulns[0].vuln_type, "WEAK_SSH_CREDENTIALS");

        db.set_vulnerability_status(vulns[0].id, VulnStatus::Confirmed).unwrap();
        assert!(db.get_potential_vulnerabilities(id).unwrap().is_empty());
    }

    #[test]
    fn status_transitions_are_validated() {
        let db = Db::open_in_memory().unwrap();
        let id = db.upsert_target("example.com", None, TargetStatus::New).unwrap();
        db.set_target_status(id, TargetStatus::Scanned).unwrap();
        db.set_target_status(id, TargetStatus::AnalysisComplete).unwrap();

        // scanned is behind us now; going back is refused and leaves the row alone
        let err = db.set_target_status(id, TargetStatus::Scanned).unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));
        let target = db.get_target_by_id(id).unwrap().unwrap();
        assert_eq!(target.status, TargetStatus::AnalysisComplete);

        db.set_target_status(id, TargetStatus::Compromised).unwrap();
    }

    #[test]
    fn same_status_write_is_allowed() {
        let db = Db::open_in_memory().unwrap();
        let id = db.upsert_target("example.com", None, TargetStatus::New).unwrap();
        db.set_target_status(id, TargetStatus::New).unwrap();
    }

    #[test]
    fn targets_by_status_keeps_insertion_order() {
        let db = Db::open_in_memory().unwrap();
        db.upsert_target("a.example.com", None, TargetStatus::New).unwrap();
        db.upsert_target("b.example.com", None, TargetStatus::New).unwrap();
        let targets = db.get_targets_by_status(&[TargetStatus::New]).unwrap();
        let names: Vec<_> = targets.iter().map(|t| t.hostname.as_str()).collect();
        assert_eq!(names, ["a.example.com", "b.example.com"]);
    }
}
