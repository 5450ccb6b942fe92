//! The four capability contracts. A module is a value implementing exactly
//! one of these traits; modules never call each other and share state only
//! through the knowledge store.

use async_trait::async_trait;
use knowledge_store::{Db, ScanResult, TargetId};

/// Open-source intelligence gathering. Findings (new targets, profile
/// links) are written straight to the store; there is no return value.
#[async_trait]
pub trait OsintModule: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, db: &Db, query: &str) -> anyhow::Result<()>;
}

/// Active reconnaissance of one hostname. `Ok(None)` means the module had
/// nothing to report (host down, tool unavailable); the registry then moves
/// on to the next module.
#[async_trait]
pub trait ReconModule: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, hostname: &str) -> anyhow::Result<Option<ScanResult>>;
}

/// Vulnerability analysis of an already-scanned target. Findings are
/// recorded as potential vulnerabilities on the store.
#[async_trait]
pub trait AnalysisModule: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, db: &Db, target_id: TargetId) -> anyhow::Result<()>;
}

/// Exploitation attempt against a target with potential vulnerabilities.
#[async_trait]
pub trait ExploitationModule: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, db: &Db, target_id: TargetId) -> anyhow::Result<ExploitOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExploitStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone)]
pub struct ExploitOutcome {
    pub status: ExploitStatus,
    /// Name of the module that produced this outcome, when one did.
    pub module: Option<String>,
    /// Why the attempt failed, when no module is to blame.
    pub reason: Option<String>,
    pub detail: Option<String>,
}

impl ExploitOutcome {
    pub fn success(module: impl Into<String>, detail: impl Into<String>) -> Self {
        ExploitOutcome {
            status: ExploitStatus::Success,
            module: Some(module.into()),
            reason: None,
            detail: Some(detail.into()),
        }
    }

    pub fn failure(module: impl Into<String>) -> Self {
        ExploitOutcome {
            status: ExploitStatus::Failure,
            module: Some(module.into()),
            reason: None,
            detail: None,
        }
    }

    /// The registry exhausted every module without a success.
    pub fn all_failed() -> Self {
        ExploitOutcome {
            status: ExploitStatus::Failure,
            module: None,
            reason: Some("all_modules_failed".to_string()),
            detail: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == ExploitStatus::Success
    }
}
