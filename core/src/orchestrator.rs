//! The operational loop. There is no explicit state machine object: each
//! target's persisted status plus the operating mode decide what happens
//! next, so repeated invocations pick up exactly where the store left off.

use crate::capability::ExploitOutcome;
use crate::registry::ModuleRegistry;
use knowledge_store::{Db, Target, TargetId, TargetStatus};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Reconnaissance only; no target is ever selected for attack.
    Recon,
    /// Full cycle: analysis and exploitation run against the focus target.
    FullAttack,
    /// Intelligence-focused: analysis runs, exploitation never does.
    Social,
}

/// Why the cycle loop stopped. The loop has no natural termination, so
/// today the only way out is an interrupt, but the caller maps exit codes
/// from this rather than assuming that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// Ctrl-C received between cycles.
    Interrupted,
}

/// What one cycle did, for logging and tests. The loop continues regardless.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub osint_queries: usize,
    pub recon_attempted: usize,
    pub selected: Option<String>,
    pub analysis_ran: bool,
    pub exploitation: Option<ExploitOutcome>,
}

pub struct Orchestrator {
    db: Arc<Db>,
    registry: ModuleRegistry,
    mode: Mode,
    seed_target: Option<String>,
    /// OSINT queries issued during this process run; never persisted, so a
    /// restart reissues them.
    issued_osint: HashSet<String>,
    cycle_delay: Duration,
}

impl Orchestrator {
    pub fn new(
        db: Arc<Db>,
        registry: ModuleRegistry,
        mode: Mode,
        seed_target: Option<String>,
        cycle_delay: Duration,
    ) -> Self {
        let (osint, recon, analysis, exploitation) = registry.module_counts();
        info!(osint, recon, analysis, exploitation, ?mode, "orchestrator online");
        Orchestrator {
            db,
            registry,
            mode,
            seed_target: seed_target.filter(|s| !s.is_empty()),
            issued_osint: HashSet::new(),
            cycle_delay,
        }
    }

    /// Seed the initial target as `new` if it isn't already known.
    /// Idempotent across repeated calls and process restarts.
    pub fn seed(&self) {
        let Some(hostname) = &self.seed_target else {
            return;
        };
        match self.db.upsert_target(hostname, None, TargetStatus::New) {
            Ok(id) => info!(hostname, id, "seed target in knowledge base"),
            Err(e) => error!(hostname, error = %e, "failed to seed initial target"),
        }
    }

    /// Seed, then cycle forever with a fixed pause between cycles. Ctrl-C is
    /// honored between cycles; an in-flight cycle always finishes.
    pub async fn run(&mut self) -> RunEnd {
        self.seed();
        loop {
            let report = self.run_cycle().await;
            match &report.selected {
                Some(hostname) => info!(hostname, "cycle complete"),
                None => info!("cycle complete; no actionable target, standing by"),
            }
            tokio::select! {
                _ = tokio::time::sleep(self.cycle_delay) => {}
                _ = tokio::signal::ctrl_c() => {
                    warn!("interrupt received; concluding operational cycles");
                    return RunEnd::Interrupted;
                }
            }
        }
    }

    /// One full pass: OSINT, recon, selection, and mode-permitting analysis
    /// and exploitation. Never fails; module and store errors are logged and
    /// surface only as status transitions.
    pub async fn run_cycle(&mut self) -> CycleReport {
        info!("starting operational cycle");
        let mut report = CycleReport::default();

        self.osint_phase(&mut report).await;
        self.recon_phase(&mut report).await;

        let Some(target) = self.select_target() else {
            if self.mode != Mode::Recon {
                info!("no actionable targets this cycle");
            }
            return report;
        };
        info!(hostname = %target.hostname, id = target.id, "selected focus target");
        report.selected = Some(target.hostname.clone());

        self.analysis_phase(&target, &mut report).await;
        if self.mode != Mode::FullAttack {
            return report;
        }
        self.exploitation_phase(&target, &mut report).await;
        report
    }

    /// One compound site-scoped query per seed hostname per process run.
    async fn osint_phase(&mut self, report: &mut CycleReport) {
        let Some(hostname) = self.seed_target.clone() else {
            return;
        };
        if self.issued_osint.contains(&hostname) {
            return;
        }
        let query = format!("site:*.{hostname} | site:{hostname}");
        self.registry.run_osint(&self.db, &query).await;
        self.issued_osint.insert(hostname);
        report.osint_queries = 1;
    }

    /// Every `new` target is scanned independently; one target's failure
    /// never blocks the others.
    async fn recon_phase(&mut self, report: &mut CycleReport) {
        let targets = match self.db.get_targets_by_status(&[TargetStatus::New]) {
            Ok(t) => t,
            Err(e) => {
                error!(error = %e, "could not list new targets; skipping recon phase");
                return;
            }
        };
        for target in targets {
            report.recon_attempted += 1;
            info!(hostname = %target.hostname, "investigating new target");
            match self.registry.run_recon(&target.hostname).await {
                Some(scan) => {
                    if let Err(e) = self.db.record_scan_result(target.id, &scan) {
                        // Leave the target `new` so the next cycle retries.
                        error!(hostname = %target.hostname, error = %e, "failed to persist scan result");
                        continue;
                    }
                    self.transition(target.id, TargetStatus::Scanned);
                }
                None => {
                    warn!(hostname = %target.hostname, "investigation produced no result");
                    self.transition(target.id, TargetStatus::ScanFailed);
                }
            }
        }
    }

    /// First actionable target in storage order; none in recon mode.
    fn select_target(&self) -> Option<Target> {
        if self.mode == Mode::Recon {
            return None;
        }
        let actionable = [
            TargetStatus::Scanned,
            TargetStatus::AnalysisComplete,
            TargetStatus::AnalyzedClean,
        ];
        match self.db.get_targets_by_status(&actionable) {
            Ok(targets) => targets.into_iter().next(),
            Err(e) => {
                error!(error = %e, "could not list actionable targets");
                None
            }
        }
    }

    async fn analysis_phase(&mut self, target: &Target, report: &mut CycleReport) {
        info!(hostname = %target.hostname, "entering analysis phase");
        self.registry.run_analysis(&self.db, target.id).await;
        report.analysis_ran = true;
        match self.db.get_potential_vulnerabilities(target.id) {
            Ok(vulns) if !vulns.is_empty() => {
                info!(hostname = %target.hostname, count = vulns.len(), "potential vulnerabilities on record");
                self.transition(target.id, TargetStatus::AnalysisComplete);
            }
            Ok(_) => {
                info!(hostname = %target.hostname, "no obvious vulnerabilities found");
                self.transition(target.id, TargetStatus::AnalyzedClean);
            }
            Err(e) => {
                error!(hostname = %target.hostname, error = %e, "could not read vulnerabilities; leaving status unchanged");
            }
        }
    }

    /// Runs only when the target sat at exactly `analysis_complete` when it
    /// was selected. The analysis phase may have just moved it there, but
    /// that is not acted on until the next cycle. A failed attempt leaves
    /// the status as it is.
    async fn exploitation_phase(&mut self, target: &Target, report: &mut CycleReport) {
        if target.status != TargetStatus::AnalysisComplete {
            info!(hostname = %target.hostname, status = %target.status, "skipping exploitation");
            return;
        }
        let outcome = self.registry.run_exploitation(&self.db, target.id).await;
        if outcome.succeeded() {
            let module = outcome.module.as_deref().unwrap_or("unknown");
            warn!(hostname = %target.hostname, module, "target COMPROMISED");
            self.transition(target.id, TargetStatus::Compromised);
        } else {
            warn!(hostname = %target.hostname, "exploitation attempt failed");
        }
        report.exploitation = Some(outcome);
    }

    fn transition(&self, target_id: TargetId, status: TargetStatus) {
        if let Err(e) = self.db.set_target_status(target_id, status) {
            error!(target_id, %status, error = %e, "status transition refused");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{
        AnalysisModule, ExploitStatus, ExploitationModule, OsintModule, ReconModule,
    };
    use async_trait::async_trait;
    use knowledge_store::{HostState, PortObservation, ScanResult};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scan_with_tcp_port(host: &str, port: u16) -> ScanResult {
        let mut tcp = BTreeMap::new();
        tcp.insert(
            port,
            PortObservation {
                service: Some("ssh".into()),
                product: None,
                version: None,
                state: "open".into(),
            },
        );
        let mut protocols = BTreeMap::new();
        protocols.insert("tcp".to_string(), tcp);
        ScanResult {
            host: host.to_string(),
            address: Some("192.0.2.7".into()),
            state: HostState::Up,
            protocols,
        }
    }

    struct FixedRecon {
        port: u16,
    }

    #[async_trait]
    impl ReconModule for FixedRecon {
        fn name(&self) -> &str {
            "fixed_recon"
        }
        async fn run(&self, hostname: &str) -> anyhow::Result<Option<ScanResult>> {
            Ok(Some(scan_with_tcp_port(hostname, self.port)))
        }
    }

    struct FailingRecon;

    #[async_trait]
    impl ReconModule for FailingRecon {
        fn name(&self) -> &str {
            "failing_recon"
        }
        async fn run(&self, _hostname: &str) -> anyhow::Result<Option<ScanResult>> {
            Ok(None)
        }
    }

    struct FlaggingAnalysis {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AnalysisModule for FlaggingAnalysis {
        fn name(&self) -> &str {
            "flagging_analysis"
        }
        async fn run(&self, db: &Db, target_id: TargetId) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            db.add_vulnerability(
                target_id,
                "WEAK_SSH_CREDENTIALS",
                "ssh_bruteforcer",
                None,
                None,
                Some("port 22 open"),
            )?;
            Ok(())
        }
    }

    struct QuietAnalysis {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AnalysisModule for QuietAnalysis {
        fn name(&self) -> &str {
            "quiet_analysis"
        }
        async fn run(&self, _db: &Db, _target_id: TargetId) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct WinningExploit {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ExploitationModule for WinningExploit {
        fn name(&self) -> &str {
            "winning_exploit"
        }
        async fn run(&self, _db: &Db, _target_id: TargetId) -> anyhow::Result<ExploitOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ExploitOutcome::success("winning_exploit", "stub shell"))
        }
    }

    struct RecordingOsint {
        queries: Arc<std::sync::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl OsintModule for RecordingOsint {
        fn name(&self) -> &str {
            "recording_osint"
        }
        async fn run(&self, _db: &Db, query: &str) -> anyhow::Result<()> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(())
        }
    }

    fn orchestrator(db: Arc<Db>, registry: ModuleRegistry, mode: Mode) -> Orchestrator {
        Orchestrator::new(db, registry, mode, Some("example.com".into()), Duration::from_secs(0))
    }

    #[tokio::test]
    async fn new_target_transitions_to_scanned_with_exact_ports() {
        let db = Arc::new(Db::open_in_memory().unwrap());
        let mut registry = ModuleRegistry::new();
        registry.register_recon(Arc::new(FixedRecon { port: 22 }));
        let mut orch = orchestrator(db.clone(), registry, Mode::Recon);
        orch.seed();
        orch.run_cycle().await;

        let target = db.get_target("example.com").unwrap().unwrap();
        assert_eq!(target.status, TargetStatus::Scanned);
        assert_eq!(target.ip_address.as_deref(), Some("192.0.2.7"));
        let ports = db.get_open_ports(target.id).unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!((ports[0].port_number, ports[0].protocol.as_str()), (22, "tcp"));
    }

    #[tokio::test]
    async fn empty_recon_result_marks_scan_failed() {
        let db = Arc::new(Db::open_in_memory().unwrap());
        let mut registry = ModuleRegistry::new();
        registry.register_recon(Arc::new(FailingRecon));
        let mut orch = orchestrator(db.clone(), registry, Mode::Recon);
        orch.seed();
        orch.run_cycle().await;

        let target = db.get_target("example.com").unwrap().unwrap();
        assert_eq!(target.status, TargetStatus::ScanFailed);
    }

    #[tokio::test]
    async fn recon_mode_never_dispatches_analysis_or_exploitation() {
        let db = Arc::new(Db::open_in_memory().unwrap());
        let analysis_calls = Arc::new(AtomicUsize::new(0));
        let exploit_calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ModuleRegistry::new();
        registry.register_recon(Arc::new(FixedRecon { port: 22 }));
        registry.register_analysis(Arc::new(FlaggingAnalysis { calls: analysis_calls.clone() }));
        registry.register_exploitation(Arc::new(WinningExploit { calls: exploit_calls.clone() }));

        let mut orch = orchestrator(db.clone(), registry, Mode::Recon);
        orch.seed();
        for _ in 0..3 {
            let report = orch.run_cycle().await;
            assert!(report.selected.is_none());
        }
        assert_eq!(analysis_calls.load(Ordering::SeqCst), 0);
        assert_eq!(exploit_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn analysis_findings_set_analysis_complete() {
        let db = Arc::new(Db::open_in_memory().unwrap());
        let mut registry = ModuleRegistry::new();
        registry.register_recon(Arc::new(FixedRecon { port: 22 }));
        registry.register_analysis(Arc::new(FlaggingAnalysis {
            calls: Arc::new(AtomicUsize::new(0)),
        }));
        let mut orch = orchestrator(db.clone(), registry, Mode::Social);
        orch.seed();
        orch.run_cycle().await; // scan
        orch.run_cycle().await; // analyze

        let target = db.get_target("example.com").unwrap().unwrap();
        assert_eq!(target.status, TargetStatus::AnalysisComplete);
    }

    #[tokio::test]
    async fn clean_analysis_sets_analyzed_clean() {
        let db = Arc::new(Db::open_in_memory().unwrap());
        let mut registry = ModuleRegistry::new();
        registry.register_recon(Arc::new(FixedRecon { port: 80 }));
        registry.register_analysis(Arc::new(QuietAnalysis {
            calls: Arc::new(AtomicUsize::new(0)),
        }));
        let mut orch = orchestrator(db.clone(), registry, Mode::FullAttack);
        orch.seed();
        orch.run_cycle().await;
        orch.run_cycle().await;

        let target = db.get_target("example.com").unwrap().unwrap();
        assert_eq!(target.status, TargetStatus::AnalyzedClean);
    }

    #[tokio::test]
    async fn exploitation_skipped_unless_analysis_complete() {
        let db = Arc::new(Db::open_in_memory().unwrap());
        let exploit_calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ModuleRegistry::new();
        registry.register_recon(Arc::new(FixedRecon { port: 80 }));
        registry.register_analysis(Arc::new(QuietAnalysis {
            calls: Arc::new(AtomicUsize::new(0)),
        }));
        registry.register_exploitation(Arc::new(WinningExploit { calls: exploit_calls.clone() }));
        let mut orch = orchestrator(db.clone(), registry, Mode::FullAttack);
        orch.seed();
        orch.run_cycle().await; // scanned
        orch.run_cycle().await; // analyzed_clean
        orch.run_cycle().await; // still clean, exploitation must not fire

        assert_eq!(exploit_calls.load(Ordering::SeqCst), 0);
        let target = db.get_target("example.com").unwrap().unwrap();
        assert_eq!(target.status, TargetStatus::AnalyzedClean);
    }

    #[tokio::test]
    async fn social_mode_analyzes_but_never_exploits() {
        let db = Arc::new(Db::open_in_memory().unwrap());
        let analysis_calls = Arc::new(AtomicUsize::new(0));
        let exploit_calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ModuleRegistry::new();
        registry.register_recon(Arc::new(FixedRecon { port: 22 }));
        registry.register_analysis(Arc::new(FlaggingAnalysis { calls: analysis_calls.clone() }));
        registry.register_exploitation(Arc::new(WinningExploit { calls: exploit_calls.clone() }));
        let mut orch = orchestrator(db.clone(), registry, Mode::Social);
        orch.seed();
        for _ in 0..3 {
            orch.run_cycle().await;
        }
        assert!(analysis_calls.load(Ordering::SeqCst) >= 1);
        assert_eq!(exploit_calls.load(Ordering::SeqCst), 0);
        let target = db.get_target("example.com").unwrap().unwrap();
        assert_eq!(target.status, TargetStatus::AnalysisComplete);
    }

    #[tokio::test]
    async fn osint_query_issued_once_per_process() {
        let db = Arc::new(Db::open_in_memory().unwrap());
        let queries = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry.register_osint(Arc::new(RecordingOsint { queries: queries.clone() }));
        let mut orch = orchestrator(db, registry, Mode::Recon);
        orch.seed();
        orch.run_cycle().await;
        orch.run_cycle().await;
        orch.run_cycle().await;

        let seen = queries.lock().unwrap();
        assert_eq!(seen.as_slice(), ["site:*.example.com | site:example.com"]);
    }

    #[tokio::test]
    async fn full_attack_end_to_end() {
        let db = Arc::new(Db::open_in_memory().unwrap());
        let mut registry = ModuleRegistry::new();
        registry.register_recon(Arc::new(FixedRecon { port: 22 }));
        registry.register_analysis(Arc::new(FlaggingAnalysis {
            calls: Arc::new(AtomicUsize::new(0)),
        }));
        registry.register_exploitation(Arc::new(WinningExploit {
            calls: Arc::new(AtomicUsize::new(0)),
        }));
        let mut orch = orchestrator(db.clone(), registry, Mode::FullAttack);
        orch.seed();

        // Cycle 1: recon scans the seed, selection picks it up while still
        // `scanned`, analysis flags SSH. Exploitation stays quiet because the
        // selection-time status was not yet analysis_complete.
        let report = orch.run_cycle().await;
        assert_eq!(report.selected.as_deref(), Some("example.com"));
        assert!(report.exploitation.is_none());
        let target = db.get_target("example.com").unwrap().unwrap();
        assert_eq!(target.status, TargetStatus::AnalysisComplete);
        assert_eq!(db.get_open_ports(target.id).unwrap().len(), 1);

        // Cycle 2: the target is selected as analysis_complete, so
        // exploitation fires and lands.
        let report = orch.run_cycle().await;
        let outcome = report.exploitation.expect("exploitation should have run");
        assert_eq!(outcome.status, ExploitStatus::Success);
        let target = db.get_target("example.com").unwrap().unwrap();
        assert_eq!(target.status, TargetStatus::Compromised);

        // Compromised targets are never selected again.
        let report = orch.run_cycle().await;
        assert!(report.selected.is_none());
    }

    #[tokio::test]
    async fn exploitation_waits_for_the_cycle_after_analysis() {
        let db = Arc::new(Db::open_in_memory().unwrap());
        let exploit_calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ModuleRegistry::new();
        registry.register_recon(Arc::new(FixedRecon { port: 22 }));
        registry.register_analysis(Arc::new(FlaggingAnalysis {
            calls: Arc::new(AtomicUsize::new(0)),
        }));
        registry.register_exploitation(Arc::new(WinningExploit { calls: exploit_calls.clone() }));
        let mut orch = orchestrator(db.clone(), registry, Mode::FullAttack);
        orch.seed();

        // Analysis completes in cycle 1, but the gate saw the target as
        // `scanned`: no exploitation dispatch, no same-cycle compromise.
        orch.run_cycle().await;
        assert_eq!(exploit_calls.load(Ordering::SeqCst), 0);
        let target = db.get_target("example.com").unwrap().unwrap();
        assert_eq!(target.status, TargetStatus::AnalysisComplete);

        orch.run_cycle().await;
        assert_eq!(exploit_calls.load(Ordering::SeqCst), 1);
        let target = db.get_target("example.com").unwrap().unwrap();
        assert_eq!(target.status, TargetStatus::Compromised);
    }
}
