//! Muscle balance analysis over a member's recent workouts

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::store::workouts::WorkoutEntry;

pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Source tag stored with recommendations produced here
pub const RECOMMENDATION_SOURCE: &str = "muscle_balance_analysis";

const PUSH_GROUPS: &[&str] = &["chest", "triceps", "shoulders"];
const PULL_GROUPS: &[&str] = &["back", "biceps"];

/// Groups expected in any balanced month of training (glutes excluded)
const TRACKED_GROUPS: &[&str] = &["legs", "chest", "back", "shoulders", "biceps", "triceps", "core"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupActivity {
    pub count: usize,
    pub last_workout: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceReport {
    pub muscle_groups: BTreeMap<String, GroupActivity>,
    /// pull / max(push, 1)
    pub push_pull_ratio: f64,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl BalanceReport {
    fn count(&self, group: &str) -> usize {
        self.muscle_groups.get(group).map_or(0, |g| g.count)
    }
}

pub fn analyze_muscle_balance(entries: &[WorkoutEntry]) -> BalanceReport {
    let mut muscle_groups: BTreeMap<String, GroupActivity> = BTreeMap::new();
    for entry in entries {
        for group in &entry.muscle_groups {
            let activity = muscle_groups.entry(group.clone()).or_insert(GroupActivity {
                count: 0,
                last_workout: None,
            });
            activity.count += 1;
            if activity.last_workout.map_or(true, |last| entry.date > last) {
                activity.last_workout = Some(entry.date);
            }
        }
    }

    let mut report = BalanceReport {
        muscle_groups,
        push_pull_ratio: 0.0,
        warnings: Vec::new(),
        recommendations: Vec::new(),
    };

    let push: usize = PUSH_GROUPS.iter().map(|g| report.count(g)).sum();
    let pull: usize = PULL_GROUPS.iter().map(|g| report.count(g)).sum();
    report.push_pull_ratio = pull as f64 / push.max(1) as f64;

    let pull_heavy = report.push_pull_ratio > 2.0;
    let push_heavy = report.push_pull_ratio < 0.5;
    if pull_heavy {
        report
            .warnings
            .push("Significant imbalance detected: Pull exercises greatly exceed push exercises".into());
    }
    if push_heavy {
        report
            .warnings
            .push("Significant imbalance detected: Push exercises greatly exceed pull exercises".into());
    }

    let neglected: Vec<&str> = TRACKED_GROUPS
        .iter()
        .copied()
        .filter(|g| report.count(g) == 0)
        .collect();
    for group in &neglected {
        report
            .warnings
            .push(format!("{} appears to be neglected in your training", group));
    }

    if !report.warnings.is_empty() {
        if pull_heavy {
            report.recommendations.push(
                "Consider incorporating more push exercises (chest, shoulders, triceps) to balance your training".into(),
            );
        }
        if push_heavy {
            report.recommendations.push(
                "Consider incorporating more pull exercises (back, biceps) to balance your training".into(),
            );
        }
        for group in &neglected {
            report
                .recommendations
                .push(format!("Add {} exercises to your routine for balanced development", group));
        }
    }

    report
}

/// Plain-text rendering for the assistant
pub fn describe(report: &BalanceReport, window_days: i64) -> String {
    let mut out = format!("Muscle balance over the last {} days:\n", window_days);
    if report.muscle_groups.is_empty() {
        out.push_str("No workouts with muscle groups logged.\n");
    }
    for (group, activity) in &report.muscle_groups {
        out.push_str(&format!("- {}: {} sessions", group, activity.count));
        if let Some(last) = activity.last_workout {
            out.push_str(&format!(" (last {})", last.format("%Y-%m-%d")));
        }
        out.push('\n');
    }
    out.push_str(&format!("Push/pull ratio: {:.2}\n", report.push_pull_ratio));

    if !report.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for w in &report.warnings {
            out.push_str(&format!("- {}\n", w));
        }
    }
    if !report.recommendations.is_empty() {
        out.push_str("\nRecommendations:\n");
        for r in &report.recommendations {
            out.push_str(&format!("- {}\n", r));
        }
    }
    out
}
