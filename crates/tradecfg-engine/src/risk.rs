//! Risk scoring
//!
//! Deterministic score over a plan's preview rows. Three components add up:
//!
//! - breadth: `min(30, 2 × rows)`
//! - sensitivity: `min(40, 0.8 × largest positive % change)` on
//!   risk-sensitive fields
//! - tightening: `+15` per safety-field row that lands below its minimum
//!   or is cut by more than the allowed percentage, capped at 30

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use tradecfg_model::{field_spec, RiskClass};

use crate::planner::ChangePreview;
use crate::settings::RiskSettings;

const BREADTH_PER_ROW: f64 = 2.0;
const BREADTH_CAP: f64 = 30.0;
const SENSITIVITY_WEIGHT: f64 = 0.8;
const SENSITIVITY_CAP: f64 = 40.0;
const TIGHTENING_STEP: f64 = 15.0;
const TIGHTENING_CAP: f64 = 30.0;

/// Risk bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Score below 40
    Low,
    /// Score 40..65
    Medium,
    /// Score 65..85
    High,
    /// Score 85 and above
    Critical,
}

impl RiskLevel {
    /// Bucket for a score
    #[must_use]
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=39 => Self::Low,
            40..=64 => Self::Medium,
            65..=84 => Self::High,
            _ => Self::Critical,
        }
    }
}

impl Display for RiskLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        })
    }
}

/// Scored risk of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Bucket
    pub level: RiskLevel,
    /// 0..=100
    pub score: u8,
    /// Human-readable contributors
    pub reasons: Vec<String>,
}

impl RiskAssessment {
    /// Assessment of a no-op plan
    #[must_use]
    pub fn none() -> Self {
        Self {
            level: RiskLevel::Low,
            score: 0,
            reasons: Vec::new(),
        }
    }

    /// Score preview rows
    #[must_use]
    pub fn assess(preview: &[ChangePreview], settings: &RiskSettings) -> Self {
        if preview.is_empty() {
            return Self::none();
        }
        let mut reasons = Vec::new();

        #[allow(clippy::cast_precision_loss)]
        let breadth = (BREADTH_PER_ROW * preview.len() as f64).min(BREADTH_CAP);
        if preview.len() > 1 {
            reasons.push(format!("{} values change", preview.len()));
        }

        let largest_increase = preview
            .iter()
            .filter(|row| risk_class(row) == Some(RiskClass::Sensitive))
            .filter_map(|row| row.delta_percent)
            .filter(|pct| *pct > 0.0)
            .fold(0.0_f64, f64::max);
        let sensitivity = (SENSITIVITY_WEIGHT * largest_increase).min(SENSITIVITY_CAP);
        if largest_increase > 0.0 {
            reasons.push(format!(
                "position size grows by up to {largest_increase:.1}%"
            ));
        }

        let tightened = preview
            .iter()
            .filter(|row| risk_class(row) == Some(RiskClass::Safety))
            .filter(|row| tightens(row, settings))
            .count();
        #[allow(clippy::cast_precision_loss)]
        let tightening = (TIGHTENING_STEP * tightened as f64).min(TIGHTENING_CAP);
        if tightened > 0 {
            reasons.push(format!("{tightened} safety value(s) tightened"));
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let score = (breadth + sensitivity + tightening).round().clamp(0.0, 100.0) as u8;
        Self {
            level: RiskLevel::from_score(score),
            score,
            reasons,
        }
    }
}

fn risk_class(row: &ChangePreview) -> Option<RiskClass> {
    field_spec(row.field.as_str()).map(|spec| spec.risk)
}

fn tightens(row: &ChangePreview, settings: &RiskSettings) -> bool {
    let Some(new) = row.new_value.as_f64() else {
        return false;
    };
    let minimum = match row.field.as_str() {
        "grid" => settings.min_safe_grid,
        "trail_start" => settings.min_safe_trail_start,
        _ => f64::NEG_INFINITY,
    };
    let cut_too_far = row
        .delta_percent
        .is_some_and(|pct| pct < -settings.max_safe_cut_percent);
    new < minimum || cut_too_far
}
