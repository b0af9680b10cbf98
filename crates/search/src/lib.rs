//! Skillgraph Search
//!
//! Skill inference over a frozen HIN:
//! - `deeppath`: PUCT Monte Carlo Tree Search for developer -> skill paths
//! - `trust`: Subjective Logic opinions and Yager fusion
//! - `profile`: the per-developer result
//! - `engine`: the end-to-end pipeline with bounded parallel searches

pub mod deeppath;
pub mod engine;
pub mod profile;
pub mod trust;

pub use deeppath::{DeepPathSearch, ExpertisePath, SearchParams, SkillHypothesis, SkillSearch};
pub use engine::{InferenceEngine, InferenceRun};
pub use profile::{Profile, SkillScore};
pub use trust::{Opinion, SkillMetrics};
