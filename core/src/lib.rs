//! Engine core: the capability contracts pluggable modules implement, the
//! registry that dispatches across them, and the orchestrator that drives
//! operational cycles against the knowledge store.

pub mod capability;
pub mod orchestrator;
pub mod registry;

pub use capability::{
    AnalysisModule, ExploitOutcome, ExploitStatus, ExploitationModule, OsintModule, ReconModule,
};
pub use orchestrator::{CycleReport, Mode, Orchestrator, RunEnd};
pub use registry::ModuleRegistry;

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
