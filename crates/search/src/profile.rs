//! Developer skill profile

use crate::trust::SkillMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Fused score of one skill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillScore {
    pub name: String,
    #[serde(flatten)]
    pub metrics: SkillMetrics,
}

/// Materialized result of one inference run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub developer: String,

    /// Skills backed by at least one path, strongest belief first
    pub skills: Vec<SkillScore>,

    pub generated_at: DateTime<Utc>,

    /// Hash of developer and skill metrics, stable across identical runs
    pub digest: String,
}

impl Profile {
    pub fn new(developer: impl Into<String>, skills: Vec<SkillScore>) -> Self {
        let developer = developer.into();
        let mut skills: Vec<SkillScore> = skills
            .into_iter()
            .filter(|s| s.metrics.path_count > 0)
            .collect();
        skills.sort_by(|a, b| {
            b.metrics
                .belief
                .total_cmp(&a.metrics.belief)
                .then_with(|| a.name.cmp(&b.name))
        });

        let digest = Self::compute_digest(&developer, &skills);
        Self {
            developer,
            skills,
            generated_at: Utc::now(),
            digest,
        }
    }

    fn compute_digest(developer: &str, skills: &[SkillScore]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(developer.as_bytes());
        for skill in skills {
            hasher.update(skill.name.as_bytes());
            for value in [
                skill.metrics.belief,
                skill.metrics.disbelief,
                skill.metrics.uncertainty,
                skill.metrics.base_rate,
            ] {
                hasher.update(value.to_bits().to_le_bytes());
            }
            hasher.update((skill.metrics.path_count as u64).to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }

    pub fn skill(&self, name: &str) -> Option<&SkillScore> {
        self.skills.iter().find(|s| s.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}
