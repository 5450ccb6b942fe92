//! `cortex` — autonomous reconnaissance and exploitation engine.
//!
//! Exit codes: 130 when interrupted (ctrl-c between cycles), 1 on an
//! unhandled top-level error, 0 otherwise (not reached in normal operation,
//! since the cycle loop has no natural termination).

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use cortex_core::{Mode, ModuleRegistry, Orchestrator, RunEnd};
use knowledge_store::Db;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;

const DEFAULT_DB_PATH: &str = "knowledge_base.db";
const DEFAULT_CYCLE_DELAY_SECS: u64 = 5;

const EXIT_INTERRUPTED: i32 = 130;
const EXIT_ERROR: i32 = 1;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ModeArg {
    /// Investigate only; never select a target for attack.
    Recon,
    /// Analysis and exploitation against the focus target.
    FullAttack,
    /// Gather intelligence and analyze, but never exploit.
    Social,
}

impl From<ModeArg> for Mode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Recon => Mode::Recon,
            ModeArg::FullAttack => Mode::FullAttack,
            ModeArg::Social => Mode::Social,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "cortex", version, about = "Cycle-driven recon/exploitation orchestrator")]
struct Cli {
    /// Initial target hostname to seed the knowledge base
    #[arg(long)]
    target: Option<String>,
    /// Operation mode
    #[arg(long, value_enum, default_value_t = ModeArg::Recon)]
    mode: ModeArg,
    /// Knowledge base path (sqlite)
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,
    /// Optional config file (YAML). If omitted, loads ./cortex.yaml if present.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Seconds to pause between operational cycles
    #[arg(long, value_name = "SECS")]
    cycle_delay: Option<u64>,
}

fn build_registry(cfg: &config::Config) -> Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();

    #[cfg(feature = "osint")]
    {
        let mut opts = osint_search::SearchOptions::default();
        if let Some(o) = &cfg.osint {
            opts.endpoint = o.search_url.clone();
            if let Some(t) = o.timeout_ms {
                opts.timeout_ms = t;
            }
        }
        let client = osint_search::SearchClient::new(&opts).context("building search client")?;
        registry.register_osint(Arc::new(osint_search::DomainSearch::new(client.clone())));
        registry.register_osint(Arc::new(osint_search::SocialSearch::new(client)));
    }

    #[cfg(feature = "recon")]
    {
        let mut opts = nmap_recon::NmapOptions::default();
        if let Some(r) = &cfg.recon {
            if let Some(path) = &r.nmap_path {
                opts.binary = path.clone();
            }
            if let Some(args) = &r.nmap_args {
                opts.args = args.clone();
            }
        }
        registry.register_recon(Arc::new(nmap_recon::NmapScanner::new(opts)));
    }

    #[cfg(feature = "analysis")]
    {
        registry.register_analysis(Arc::new(service_audit::SshAudit));
        registry.register_analysis(Arc::new(service_audit::SqlmapPrep));
    }

    #[cfg(feature = "exploit")]
    {
        registry.register_exploitation(Arc::new(exploit_runner::CommandExploit));
    }

    Ok(registry)
}

fn run(cli: Cli) -> Result<RunEnd> {
    let cfg = config::load_config(cli.config.as_deref()).unwrap_or_default();

    let db_path = cli
        .db
        .or_else(|| cfg.store.as_ref().and_then(|s| s.path.clone()))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
    let db = Arc::new(
        Db::open_or_create(&db_path)
            .with_context(|| format!("opening knowledge base at {}", db_path.display()))?,
    );
    info!(path = %db_path.display(), "knowledge base online");

    let registry = build_registry(&cfg)?;

    let cycle_delay = cli
        .cycle_delay
        .or_else(|| cfg.orchestrator.as_ref().and_then(|o| o.cycle_delay_secs))
        .unwrap_or(DEFAULT_CYCLE_DELAY_SECS);

    let mut orchestrator = Orchestrator::new(
        db,
        registry,
        cli.mode.into(),
        cli.target,
        Duration::from_secs(cycle_delay),
    );

    let rt = tokio::runtime::Runtime::new()?;
    Ok(rt.block_on(orchestrator.run()))
}

fn exit_code(end: RunEnd) -> i32 {
    match end {
        RunEnd::Interrupted => EXIT_INTERRUPTED,
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    info!(
        version = cortex_core::version(),
        target = cli.target.as_deref().unwrap_or("<none>"),
        mode = ?cli.mode,
        "cortex starting"
    );

    match run(cli) {
        Ok(end) => std::process::exit(exit_code(end)),
        Err(e) => {
            error!(error = %e, "fatal error");
            std::process::exit(EXIT_ERROR);
        }
    }
}
