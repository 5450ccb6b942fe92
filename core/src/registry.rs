//! Statically populated registry of capability modules. Each capability has
//! its own dispatch policy; a single module's failure is logged and isolated,
//! never propagated to the caller.

use crate::capability::{
    AnalysisModule, ExploitOutcome, ExploitationModule, OsintModule, ReconModule,
};
use knowledge_store::{Db, ScanResult, TargetId};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Default)]
pub struct ModuleRegistry {
    osint: Vec<Arc<dyn OsintModule>>,
    recon: Vec<Arc<dyn ReconModule>>,
    analysis: Vec<Arc<dyn AnalysisModule>>,
    exploitation: Vec<Arc<dyn ExploitationModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_osint(&mut self, module: Arc<dyn OsintModule>) {
        info!(module = module.name(), "registered OSINT module");
        self.osint.push(module);
    }

    pub fn register_recon(&mut self, module: Arc<dyn ReconModule>) {
        info!(module = module.name(), "registered recon module");
        self.recon.push(module);
    }

    pub fn register_analysis(&mut self, module: Arc<dyn AnalysisModule>) {
        info!(module = module.name(), "registered analysis module");
        self.analysis.push(module);
    }

    pub fn register_exploitation(&mut self, module: Arc<dyn ExploitationModule>) {
        info!(module = module.name(), "registered exploitation module");
        self.exploitation.push(module);
    }

    pub fn module_counts(&self) -> (usize, usize, usize, usize) {
        (
            self.osint.len(),
            self.recon.len(),
            self.analysis.len(),
            self.exploitation.len(),
        )
    }

    /// Every OSINT module sees the query; results land in the store as side
    /// effects, nothing is aggregated here.
    pub async fn run_osint(&self, db: &Db, query: &str) {
        info!(modules = self.osint.len(), query, "dispatching OSINT query");
        for module in &self.osint {
            if let Err(e) = module.run(db, query).await {
                error!(module = module.name(), error = %e, "OSINT module failed");
            }
        }
    }

    /// Modules run in registration order; the first non-empty result wins and
    /// later modules are not invoked. Results are deliberately not merged.
    pub async fn run_recon(&self, hostname: &str) -> Option<ScanResult> {
        info!(modules = self.recon.len(), hostname, "dispatching recon");
        for module in &self.recon {
            match module.run(hostname).await {
                Ok(Some(result)) => {
                    info!(module = module.name(), hostname, "recon module produced a result");
                    return Some(result);
                }
                Ok(None) => {}
                Err(e) => error!(module = module.name(), error = %e, "recon module failed"),
            }
        }
        None
    }

    /// Every analysis module sees the target; findings are store side
    /// effects.
    pub async fn run_analysis(&self, db: &Db, target_id: TargetId) {
        info!(modules = self.analysis.len(), target_id, "dispatching analysis");
        for module in &self.analysis {
            if let Err(e) = module.run(db, target_id).await {
                error!(module = module.name(), error = %e, "analysis module failed");
            }
        }
    }

    /// Short-circuit dispatch: stops at the first module reporting success.
    /// Exhausting every module (failures and errors included) yields an
    /// explicit all-modules-failed outcome.
    pub async fn run_exploitation(&self, db: &Db, target_id: TargetId) -> ExploitOutcome {
        info!(modules = self.exploitation.len(), target_id, "dispatching exploitation");
        for module in &self.exploitation {
            match module.run(db, target_id).await {
                Ok(outcome) if outcome.succeeded() => {
                    warn!(module = module.name(), target_id, "exploitation module reported SUCCESS");
                    return outcome;
                }
                Ok(_) => {}
                Err(e) => error!(module = module.name(), error = %e, "exploitation module failed"),
            }
        }
        ExploitOutcome::all_failed()
    }
}
