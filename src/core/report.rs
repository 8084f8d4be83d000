use serde::{Deserialize, Serialize};

use crate::core::{OptimizationOpportunity, OptimizationScore, ScanOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub schema_version: String,
    pub tool_version: String,
    pub os: OsInfo,
    pub generated_at: String,
    pub scans: Vec<ScanOutcome>,
    pub opportunities: Vec<OptimizationOpportunity>,
    pub score: OptimizationScore,
    pub recommendations: Vec<String>,
}
