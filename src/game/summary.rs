//! Post-game analysis shown on the results screen.

use serde::{Deserialize, Serialize};

use super::types::{SkillScore, StagePerformance};

/// Aggregate statistics derived from a finished play-through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsSummary {
    /// Number of answered turns.
    pub turns: u32,
    /// Number of turns answered with an optimal option.
    pub optimal_choices: u32,
    /// Mean points per answered turn; 0.0 when nothing was answered.
    pub average_turn_score: f64,
    /// Net rapport change across all answered turns.
    pub net_rapport: i32,
    /// Skill with the highest share of its maximum, if any scored.
    pub strongest_skill: Option<String>,
    /// Skill with the lowest share of its maximum.
    pub weakest_skill: Option<String>,
}

impl ResultsSummary {
    /// Compute the summary from the stage log and skill accumulators.
    pub fn new(stages: &[StagePerformance], skills: &[SkillScore], optimal_choices: u32) -> Self {
        let turns = u32::try_from(stages.len()).unwrap_or(u32::MAX);
        let total: u64 = stages.iter().map(|s| u64::from(s.score)).sum();
        let average_turn_score = if turns == 0 {
            0.0
        } else {
            total as f64 / f64::from(turns)
        };
        let net_rapport = stages.iter().map(|s| s.rapport_gained).sum();

        let strongest_skill = skills
            .iter()
            .filter(|s| s.score > 0)
            .max_by(|a, b| ratio(a).total_cmp(&ratio(b)))
            .map(|s| s.skill.clone());
        let weakest_skill = skills
            .iter()
            .min_by(|a, b| ratio(a).total_cmp(&ratio(b)))
            .map(|s| s.skill.clone());

        Self {
            turns,
            optimal_choices,
            average_turn_score,
            net_rapport,
            strongest_skill,
            weakest_skill,
        }
    }
}

fn ratio(skill: &SkillScore) -> f64 {
    if skill.max_score == 0 {
        return 0.0;
    }
    f64::from(skill.score) / f64::from(skill.max_score)
}
