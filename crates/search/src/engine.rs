//! Inference pipeline: build, freeze, search, fuse

use crate::deeppath::{DeepPathSearch, SearchParams, SkillHypothesis, SkillSearch};
use crate::profile::{Profile, SkillScore};
use crate::trust::skill_metrics;
use serde::Serialize;
use skillgraph_common::config::AppConfig;
use skillgraph_common::errors::{AppError, Result};
use skillgraph_common::graph::{GraphExport, GraphStore, NodeId, NodeKind};
use skillgraph_common::metrics;
use skillgraph_common::oracle::ScoringOracle;
use skillgraph_ingestion::{ActivitySnapshot, HinBuilder, IngestionReport};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Everything produced by one completed run
#[derive(Debug, Clone, Serialize)]
pub struct InferenceRun {
    pub profile: Profile,
    /// Graph projection restricted to the profile's skills
    pub graph: GraphExport,
    pub report: IngestionReport,
    pub searches: Vec<SkillSearch>,
}

/// Per-developer skill inference
#[derive(Clone)]
pub struct InferenceEngine {
    config: Arc<AppConfig>,
    oracle: Arc<dyn ScoringOracle>,
    params: Arc<SearchParams>,
}

impl InferenceEngine {
    pub fn new(config: Arc<AppConfig>, oracle: Arc<dyn ScoringOracle>) -> Self {
        let params = Arc::new(SearchParams::from_config(&config));
        Self {
            config,
            oracle,
            params,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run a full inference for `login`.
    ///
    /// `hypotheses` restricts the searched skills; names without a skill
    /// node are ignored. A cancelled or failed run produces no profile.
    #[instrument(skip(self, snapshot, hypotheses, cancel), fields(developer = %login))]
    pub async fn infer(
        &self,
        login: &str,
        snapshot: &ActivitySnapshot,
        hypotheses: Option<&[String]>,
        cancel: CancellationToken,
    ) -> Result<InferenceRun> {
        let started = Instant::now();
        let result = self.run(login, snapshot, hypotheses, &cancel).await;

        let outcome = match &result {
            Ok(_) => "completed",
            Err(AppError::Cancelled) => "cancelled",
            Err(_) => "failed",
        };
        metrics::record_inference(started.elapsed().as_secs_f64(), outcome);
        result
    }

    async fn run(
        &self,
        login: &str,
        snapshot: &ActivitySnapshot,
        hypotheses: Option<&[String]>,
        cancel: &CancellationToken,
    ) -> Result<InferenceRun> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        let snapshot = bind_login(login, snapshot)?;

        let mut graph = GraphStore::new();
        let report = HinBuilder::from_config(&self.config).build(&mut graph, &snapshot)?;
        let graph = graph.freeze();

        let root = NodeId::developer(&report.developer);
        let skills = resolve_hypotheses(&graph, hypotheses);
        debug!(skills = skills.len(), nodes = graph.node_count(), "Graph frozen, starting searches");

        let search = DeepPathSearch::new(graph.clone(), self.oracle.clone(), self.params.clone());
        let mut searches = self.search_all(search, root, skills, cancel).await?;
        searches.sort_by(|a, b| a.skill.cmp(&b.skill));

        let reward_total = self.params.reward.total();
        let scores = searches
            .iter()
            .map(|s| SkillScore {
                name: s.skill.clone(),
                metrics: skill_metrics(&s.paths, reward_total, &self.config.fusion),
            })
            .collect();
        let profile = Profile::new(report.developer.clone(), scores);

        let kept: BTreeSet<&str> = profile.skills.iter().map(|s| s.name.as_str()).collect();
        let export = graph.export_filtered(|key| kept.contains(key));

        let degraded: usize = searches.iter().map(|s| s.degraded_paths()).sum();
        if degraded > 0 {
            warn!(degraded, "Some paths were scored with the neutral accuracy");
        }
        info!(
            skills = profile.skills.len(),
            searched = searches.len(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "Inference completed"
        );

        Ok(InferenceRun {
            profile,
            graph: export,
            report,
            searches,
        })
    }

    /// One task per skill, at most `search.workers` at a time
    async fn search_all(
        &self,
        search: DeepPathSearch,
        root: NodeId,
        skills: Vec<SkillHypothesis>,
        cancel: &CancellationToken,
    ) -> Result<Vec<SkillSearch>> {
        let permits = Arc::new(Semaphore::new(self.config.search.workers.max(1)));
        let mut tasks = JoinSet::new();

        for skill in skills {
            let search = search.clone();
            let root = root.clone();
            let permits = permits.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| AppError::Internal {
                        message: format!("search worker pool closed: {}", e),
                    })?;
                search.run(&root, &skill, &cancel).await
            });
        }

        let mut searches = Vec::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    info!("Inference cancelled");
                    return Err(AppError::Cancelled);
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok(Ok(result))) => searches.push(result),
                    Some(Ok(Err(e))) => {
                        tasks.abort_all();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        tasks.abort_all();
                        return Err(AppError::Internal {
                            message: format!("search task failed: {}", e),
                        });
                    }
                },
            }
        }
        Ok(searches)
    }
}

/// The snapshot must describe `login`.
///
/// An anonymous snapshot is adopted, and a login differing only in case is
/// rewritten to the requested spelling.
fn bind_login<'a>(login: &str, snapshot: &'a ActivitySnapshot) -> Result<Cow<'a, ActivitySnapshot>> {
    let recorded = snapshot.developer.login.as_str();
    if recorded == login {
        return Ok(Cow::Borrowed(snapshot));
    }
    let recorded = recorded.trim();
    if !recorded.is_empty() && !recorded.eq_ignore_ascii_case(login) {
        return Err(AppError::Validation {
            message: format!("snapshot belongs to {}, not {}", recorded, login),
            field: Some("login".to_string()),
        });
    }
    let mut owned = snapshot.clone();
    owned.developer.login = login.to_string();
    Ok(Cow::Owned(owned))
}

/// All skill nodes, or the requested names that have one
fn resolve_hypotheses(graph: &GraphStore, requested: Option<&[String]>) -> Vec<SkillHypothesis> {
    let skill_nodes = graph.nodes_of_kind(NodeKind::Skill);
    match requested {
        None => skill_nodes.into_iter().map(SkillHypothesis::from_node).collect(),
        Some(names) => {
            let wanted: BTreeSet<String> = names
                .iter()
                .map(|n| n.trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect();
            for name in &wanted {
                if graph.node(&NodeId::skill(name)).is_none() {
                    debug!(skill = %name, "Requested skill has no evidence in the graph");
                }
            }
            skill_nodes
                .into_iter()
                .filter(|node| wanted.contains(&node.id.key))
                .map(SkillHypothesis::from_node)
                .collect()
        }
    }
}
