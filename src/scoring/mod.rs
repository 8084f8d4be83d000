//! Turns scanner findings into a 0-100 score and a short list of
//! recommendations.

use crate::core::{Impact, OptimizationOpportunity, OptimizationScore, ScoreTier};

pub fn score(opportunities: &[OptimizationOpportunity]) -> OptimizationScore {
    let deductions: u32 = opportunities
        .iter()
        .map(|o| o.impact.penalty())
        .fold(0u32, u32::saturating_add);
    let overall = 100u32.saturating_sub(deductions);
    OptimizationScore {
        overall,
        deductions,
        opportunity_count: opportunities.len(),
        category: ScoreTier::from_score(overall),
    }
}

pub fn recommendations(opportunities: &[OptimizationOpportunity]) -> Vec<String> {
    if opportunities.is_empty() {
        return vec!["System is well optimized. No changes recommended.".to_string()];
    }

    let mut out = Vec::new();
    for impact in Impact::ALL {
        let n = opportunities.iter().filter(|o| o.impact == impact).count();
        if n == 0 {
            continue;
        }
        out.push(match impact {
            Impact::High => format!(
                "Address {n} high-impact issue(s) first for the largest performance gains."
            ),
            Impact::Medium => {
                format!("Apply {n} medium-impact optimization(s) to improve responsiveness.")
            }
            Impact::Low => format!("Consider {n} low-impact tweak(s) for additional polish."),
        });
    }
    out
}
