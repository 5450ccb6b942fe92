use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type TargetId = i64;
pub type PortId = i64;
pub type VulnId = i64;

/// Lifecycle of a target. The orchestrator drives targets along
/// new -> scanned|scan_failed -> analysis_complete|analyzed_clean -> compromised;
/// the transition table below is the authoritative set of legal moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    New,
    Scanned,
    ScanFailed,
    AnalysisComplete,
    AnalyzedClean,
    Compromised,
}

impl TargetStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetStatus::New => "new",
            TargetStatus::Scanned => "scanned",
            TargetStatus::ScanFailed => "scan_failed",
            TargetStatus::AnalysisComplete => "analysis_complete",
            TargetStatus::AnalyzedClean => "analyzed_clean",
            TargetStatus::Compromised => "compromised",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "new" => TargetStatus::New,
            "scanned" => TargetStatus::Scanned,
            "scan_failed" => TargetStatus::ScanFailed,
            "analysis_complete" => TargetStatus::AnalysisComplete,
            "analyzed_clean" => TargetStatus::AnalyzedClean,
            "compromised" => TargetStatus::Compromised,
            _ => return None,
        })
    }

    /// Writing the current status again is always allowed (timestamp refresh).
    pub fn can_transition(self, next: TargetStatus) -> bool {
        use TargetStatus::*;
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (New, Scanned)
                | (New, ScanFailed)
                | (Scanned, AnalysisComplete)
                | (Scanned, AnalyzedClean)
                | (AnalyzedClean, AnalysisComplete)
                | (AnalysisComplete, AnalyzedClean)
                | (AnalysisComplete, Compromised)
        )
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VulnStatus {
    Potential,
    Confirmed,
    Failed,
}

impl VulnStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VulnStatus::Potential => "potential",
            VulnStatus::Confirmed => "confirmed",
            VulnStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "potential" => VulnStatus::Potential,
            "confirmed" => VulnStatus::Confirmed,
            "failed" => VulnStatus::Failed,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub hostname: String,
    pub ip_address: Option<String>,
    pub status: TargetStatus,
    pub os: Option<String>,
    pub state: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    pub id: PortId,
    pub target_id: TargetId,
    pub port_number: u16,
    pub protocol: String,
    pub service_name: Option<String>,
    pub product: Option<String>,
    pub version: Option<String>,
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vulnerability {
    pub id: VulnId,
    pub target_id: TargetId,
    pub port_id: Option<PortId>,
    pub vuln_type: String,
    pub description: Option<String>,
    pub tool: Option<String>,
    pub command: Option<String>,
    pub status: VulnStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostState {
    Up,
    Down,
}

impl HostState {
    pub fn as_str(self) -> &'static str {
        match self {
            HostState::Up => "up",
            HostState::Down => "down",
        }
    }
}

/// One service observed on an open port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortObservation {
    pub service: Option<String>,
    pub product: Option<String>,
    pub version: Option<String>,
    pub state: String,
}

/// The record a recon module hands back: resolved address, liveness, and a
/// protocol -> port -> observation map. This is the store's input format for
/// `record_scan_result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub host: String,
    pub address: Option<String>,
    pub state: HostState,
    pub protocols: BTreeMap<String, BTreeMap<u16, PortObservation>>,
}

impl ScanResult {
    pub fn open_port_count(&self) -> usize {
        self.protocols
            .values()
            .map(|ports| ports.values().filter(|p| p.state == "open").count())
            .sum()
    }
}
