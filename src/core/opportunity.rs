use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::Impact;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OptimizationCategory {
    Startup,
    #[serde(rename = "UI")]
    Ui,
    Registry,
    Disk,
    Network,
}

impl OptimizationCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            OptimizationCategory::Startup => "Startup",
            OptimizationCategory::Ui => "UI",
            OptimizationCategory::Registry => "Registry",
            OptimizationCategory::Disk => "Disk",
            OptimizationCategory::Network => "Network",
        }
    }
}

impl fmt::Display for OptimizationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationOpportunity {
    pub category: OptimizationCategory,
    #[serde(rename = "type")]
    pub opportunity_type: String,
    pub description: String,
    pub impact: Impact,
    pub estimated_savings: String,
    pub target: String,
}

impl OptimizationOpportunity {
    pub fn new(
        category: OptimizationCategory,
        opportunity_type: &str,
        impact: Impact,
        target: impl Into<String>,
        description: impl Into<String>,
        estimated_savings: impl Into<String>,
    ) -> Self {
        Self {
            category,
            opportunity_type: opportunity_type.to_string(),
            description: description.into(),
            impact,
            estimated_savings: estimated_savings.into(),
            target: target.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreTier {
    Excellent,
    Good,
    Fair,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
}

impl ScoreTier {
    pub const fn from_score(score: u32) -> Self {
        if score >= 90 {
            ScoreTier::Excellent
        } else if score >= 75 {
            ScoreTier::Good
        } else if score >= 60 {
            ScoreTier::Fair
        } else {
            ScoreTier::NeedsImprovement
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ScoreTier::Excellent => "Excellent",
            ScoreTier::Good => "Good",
            ScoreTier::Fair => "Fair",
            ScoreTier::NeedsImprovement => "Needs Improvement",
        }
    }
}

impl fmt::Display for ScoreTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationScore {
    pub overall: u32,
    pub deductions: u32,
    pub opportunity_count: usize,
    pub category: ScoreTier,
}

/// What one scanner found, plus the counters it gathered along the way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub category: OptimizationCategory,
    pub opportunities: Vec<OptimizationOpportunity>,
    pub counters: BTreeMap<String, u64>,
    pub skipped_checks: Vec<String>,
}

impl ScanOutcome {
    pub fn new(category: OptimizationCategory) -> Self {
        Self {
            category,
            opportunities: Vec::new(),
            counters: BTreeMap::new(),
            skipped_checks: Vec::new(),
        }
    }

    pub fn count(&mut self, key: &str, value: u64) {
        let acc = self.counters.entry(key.to_string()).or_insert(0);
        *acc = acc.saturating_add(value);
    }

    pub fn skip(&mut self, check: &str, err: &anyhow::Error) {
        tracing::warn!(category = %self.category, check, "check skipped: {err:#}");
        self.skipped_checks.push(format!("{check}: {err}"));
    }
}
