//! Deterministic plain-language reading of a single attribution.

use crate::sample::AttributionSample;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Features described by default.
pub const DEFAULT_TOP_N: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Strong,
    Moderate,
    Slight,
}

impl Strength {
    /// `> 0.3` strong, `> 0.15` moderate, otherwise slight.
    pub fn from_magnitude(magnitude: f64) -> Self {
        if magnitude > 0.3 {
            Self::Strong
        } else if magnitude > 0.15 {
            Self::Moderate
        } else {
            Self::Slight
        }
    }

    fn adverb(self) -> &'static str {
        match self {
            Self::Strong => "strongly",
            Self::Moderate => "moderately",
            Self::Slight => "slightly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increases,
    Decreases,
    Neutral,
}

impl Direction {
    fn of(contribution: f64) -> Self {
        if contribution > 0.0 {
            Self::Increases
        } else if contribution < 0.0 {
            Self::Decreases
        } else {
            Self::Neutral
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorReading {
    pub feature: String,
    pub contribution: f64,
    pub strength: Strength,
    pub direction: Direction,
}

/// Which side of the top factors dominates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Balance {
    RiskIncreasing,
    Protective,
    Balanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub instance_id: String,
    pub predicted_value: f64,
    pub factors: Vec<FactorReading>,
    pub balance: Balance,
    pub text: String,
}

impl Interpretation {
    pub fn top_features(&self) -> Vec<&str> {
        self.factors.iter().map(|f| f.feature.as_str()).collect()
    }
}

/// Describe the `top_n` largest contributions of `sample`, largest |contribution| first.
pub fn interpret(sample: &AttributionSample, top_n: usize) -> Interpretation {
    let mut ranked: Vec<(&String, f64)> = sample
        .feature_contributions
        .iter()
        .map(|(name, value)| (name, *value))
        .collect();
    ranked.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()).then_with(|| a.0.cmp(b.0)));

    let factors: Vec<FactorReading> = ranked
        .into_iter()
        .take(top_n)
        .map(|(feature, contribution)| FactorReading {
            feature: feature.clone(),
            contribution,
            strength: Strength::from_magnitude(contribution.abs()),
            direction: Direction::of(contribution),
        })
        .collect();

    let increasing = factors.iter().filter(|f| f.contribution > 0.0).count();
    let protective = factors.iter().filter(|f| f.contribution < 0.0).count();
    let balance = match increasing.cmp(&protective) {
        std::cmp::Ordering::Greater => Balance::RiskIncreasing,
        std::cmp::Ordering::Less => Balance::Protective,
        std::cmp::Ordering::Equal => Balance::Balanced,
    };

    let mut text = String::new();
    let p = sample.predicted_value;
    if p > 0.5 {
        let _ = writeln!(text, "The model predicts HIGH RISK with {:.1}% confidence.", p * 100.0);
    } else {
        let _ = writeln!(
            text,
            "The model predicts LOW RISK with {:.1}% confidence.",
            (1.0 - p) * 100.0
        );
    }
    let _ = writeln!(text, "Key factors:");
    for (i, factor) in factors.iter().enumerate() {
        let (verb, impact) = match factor.direction {
            Direction::Increases => ("increases", "risky"),
            Direction::Decreases => ("decreases", "safe"),
            Direction::Neutral => {
                let _ = writeln!(
                    text,
                    "{}. {} ({:+.3}): has no effect on the risk.",
                    i + 1,
                    factor.feature,
                    factor.contribution
                );
                continue;
            }
        };
        let _ = writeln!(
            text,
            "{}. {} ({:+.3}): {} {} the risk; the current value looks more {}.",
            i + 1,
            factor.feature,
            factor.contribution,
            factor.strength.adverb(),
            verb,
            impact
        );
    }
    let _ = match balance {
        Balance::RiskIncreasing => write!(
            text,
            "Summary: driven by {increasing} risk-increasing factors, outweighing {protective} protective factors."
        ),
        Balance::Protective => write!(
            text,
            "Summary: driven by {protective} protective factors, outweighing {increasing} risk-increasing factors."
        ),
        Balance::Balanced => write!(
            text,
            "Summary: balanced between risk-increasing and protective factors."
        ),
    };

    Interpretation {
        instance_id: sample.instance_id.clone(),
        predicted_value: p,
        factors,
        balance,
        text,
    }
}
