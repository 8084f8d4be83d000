mod audit;
mod catalog;
mod impact;
mod installed;
mod opportunity;
mod report;

pub use audit::{
    AuditResult, AuditSummary, InstallMethod, InstallationStatus, InstalledApp, MissingApp,
    Priority, SkippedApp,
};
pub use catalog::{AppCategory, AppDefinition};
pub use impact::Impact;
pub use installed::{InstallSourceKind, InstalledRecord};
pub use opportunity::{
    OptimizationCategory, OptimizationOpportunity, OptimizationScore, ScanOutcome, ScoreTier,
};
pub use report::{OptimizationReport, OsInfo};

pub const SCHEMA_VERSION: &str = "1.0";
