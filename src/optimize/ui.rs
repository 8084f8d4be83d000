use crate::core::{Impact, OptimizationCategory, OptimizationOpportunity, ScanOutcome};
use crate::optimize::ScanContext;

struct UiRule {
    key: &'static str,
    name: &'static str,
    /// Value Windows assumes when the setting is absent.
    default: Option<u64>,
    is_suboptimal: fn(u64) -> bool,
    impact: Impact,
    opportunity_type: &'static str,
    description: &'static str,
    savings: &'static str,
}

const RULES: [UiRule; 4] = [
    UiRule {
        key: "HKCU\\Software\\Microsoft\\Windows\\CurrentVersion\\Explorer\\VisualEffects",
        name: "VisualFXSetting",
        default: Some(0),
        is_suboptimal: |v| v != 2,
        impact: Impact::Medium,
        opportunity_type: "visual_effects",
        description: "Visual effects are not set to \"Adjust for best performance\"",
        savings: "Smoother UI on low-end GPUs and less CPU during window operations",
    },
    UiRule {
        key: "HKCU\\Control Panel\\Desktop",
        name: "MenuShowDelay",
        default: Some(400),
        is_suboptimal: |v| v > 200,
        impact: Impact::Low,
        opportunity_type: "menu_delay",
        description: "Menu show delay is above 200 ms",
        savings: "Menus open noticeably faster",
    },
    UiRule {
        key: "HKCU\\Control Panel\\Desktop\\WindowMetrics",
        name: "MinAnimate",
        default: Some(1),
        is_suboptimal: |v| v != 0,
        impact: Impact::Low,
        opportunity_type: "window_animation",
        description: "Minimize/maximize window animations are enabled",
        savings: "Snappier window minimize and restore",
    },
    UiRule {
        key: "HKCU\\Software\\Microsoft\\Windows\\CurrentVersion\\Explorer\\Advanced",
        name: "TaskbarAnimations",
        default: Some(1),
        is_suboptimal: |v| v != 0,
        impact: Impact::Low,
        opportunity_type: "taskbar_animation",
        description: "Taskbar animations are enabled",
        savings: "Slightly more responsive taskbar",
    },
];

pub fn scan(ctx: &ScanContext<'_>) -> ScanOutcome {
    let mut out = ScanOutcome::new(OptimizationCategory::Ui);

    for rule in &RULES {
        let value = match ctx.probe.registry_value(rule.key, rule.name) {
            Ok(value) => value,
            Err(err) => {
                out.skip(rule.name, &err);
                continue;
            }
        };
        out.count("settings_checked", 1);

        let Some(value) = value.and_then(|v| v.as_u64()).or(rule.default) else {
            continue;
        };
        if (rule.is_suboptimal)(value) {
            out.opportunities.push(OptimizationOpportunity::new(
                OptimizationCategory::Ui,
                rule.opportunity_type,
                rule.impact,
                format!("{}\\{}", rule.key, rule.name),
                format!("{} (current: {value})", rule.description),
                rule.savings,
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::testing::probe;

    #[test]
    fn absent_values_fall_back_to_windows_defaults() {
        let probe = probe(r#"{"registry": {}}"#);
        let ctx = ScanContext {
            probe: &probe,
            temp_dirs: vec![],
        };
        let out = scan(&ctx);
        let types: Vec<&str> = out
            .opportunities
            .iter()
            .map(|o| o.opportunity_type.as_str())
            .collect();
        assert_eq!(
            types,
            vec!["visual_effects", "menu_delay", "window_animation", "taskbar_animation"]
        );
        assert_eq!(out.counters.get("settings_checked"), Some(&4));
    }

    #[test]
    fn tuned_settings_produce_no_opportunities() {
        let probe = probe(
            r#"{"registry": {
                "HKCU\\Software\\Microsoft\\Windows\\CurrentVersion\\Explorer\\VisualEffects": {"VisualFXSetting": 2},
                "HKCU\\Control Panel\\Desktop": {"MenuShowDelay": "100"},
                "HKCU\\Control Panel\\Desktop\\WindowMetrics": {"MinAnimate": "0"},
                "HKCU\\Software\\Microsoft\\Windows\\CurrentVersion\\Explorer\\Advanced": {"TaskbarAnimations": 0}
            }}"#,
        );
        let ctx = ScanContext {
            probe: &probe,
            temp_dirs: vec![],
        };
        let out = scan(&ctx);
        assert!(out.opportunities.is_empty(), "{:?}", out.opportunities);
    }

    #[test]
    fn visual_effects_is_medium_impact() {
        let probe = probe(
            r#"{"registry": {
                "HKCU\\Software\\Microsoft\\Windows\\CurrentVersion\\Explorer\\VisualEffects": {"VisualFXSetting": 1},
                "HKCU\\Control Panel\\Desktop": {"MenuShowDelay": "0"},
                "HKCU\\Control Panel\\Desktop\\WindowMetrics": {"MinAnimate": "0"},
                "HKCU\\Software\\Microsoft\\Windows\\CurrentVersion\\Explorer\\Advanced": {"TaskbarAnimations": 0}
            }}"#,
        );
        let ctx = ScanContext {
            probe: &probe,
            temp_dirs: vec![],
        };
        let out = scan(&ctx);
        assert_eq!(out.opportunities.len(), 1);
        assert_eq!(out.opportunities[0].impact, Impact::Medium);
        assert!(out.opportunities[0].description.contains("current: 1"));
    }
}
