//! HIN builder
//!
//! Turns an activity snapshot into graph structure:
//! 1. Developer node
//! 2. Repository nodes + contribution edges (forks skipped)
//! 3. Commit nodes + containment edges weighted by richness
//! 4. Skill nodes + mention edges weighted by TF-IDF
//!
//! Malformed records are skipped and counted; graph invariant violations
//! abort the build.

use crate::errors::IngestionError;
use crate::records::{ActivitySnapshot, CommitRecord, RepositoryRecord};
use crate::weighter::{commit_richness, preprocess_patch, repository_weight, EvidenceWeighter};
use serde::{Deserialize, Serialize};
use skillgraph_common::config::{AppConfig, SkillDefinition};
use skillgraph_common::errors::Result;
use skillgraph_common::graph::{
    CommitAttrs, DeveloperAttrs, EdgeKind, GraphStore, NodeAttrs, NodeId, RepositoryAttrs,
    SkillAttrs,
};
use skillgraph_common::metrics::record_ingestion;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, info, instrument, warn};

/// Maximum characters of added code kept on a commit node
const EXCERPT_CHARS: usize = 400;

/// A skipped record and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub record: String,
    pub reason: String,
}

/// Outcome of one build
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestionReport {
    pub developer: String,
    pub repositories: usize,
    pub commits: usize,
    /// Commit -> skill links written
    pub skill_links: usize,
    /// Skills with at least one link, sorted
    pub skills: Vec<String>,
    pub forks_skipped: usize,
    /// Repositories without a single valid commit
    pub empty_repositories: usize,
    pub skipped: usize,
    pub skip_reasons: Vec<SkippedRecord>,
}

impl IngestionReport {
    fn skip(&mut self, err: IngestionError) {
        let (record, reason) = match &err {
            IngestionError::MissingField { record, field } => {
                (record.clone(), format!("missing {}", field))
            }
            IngestionError::Malformed { record, reason } => (record.clone(), reason.clone()),
            other => ("unknown".to_string(), other.to_string()),
        };
        warn!(record = %record, reason = %reason, "Skipping malformed activity record");
        self.skipped += 1;
        self.skip_reasons.push(SkippedRecord { record, reason });
    }
}

/// A skill hypothesis ready for matching
#[derive(Debug, Clone)]
struct SkillSpec {
    name: String,
    definition: SkillDefinition,
    /// Tokenized canonical terms
    terms: Vec<Vec<String>>,
}

/// Builds the HIN for one developer
pub struct HinBuilder {
    weighter: EvidenceWeighter,
    catalog: Vec<SkillDefinition>,
    discover_from_topics: bool,
}

impl HinBuilder {
    pub fn new(
        weighter: EvidenceWeighter,
        catalog: Vec<SkillDefinition>,
        discover_from_topics: bool,
    ) -> Self {
        Self {
            weighter,
            catalog,
            discover_from_topics,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            EvidenceWeighter::from_config(&config.weighting),
            config.skills.clone(),
            config.weighting.discover_skills_from_topics,
        )
    }

    /// Populate `graph` from `snapshot`.
    ///
    /// Re-running on the same snapshot leaves the graph unchanged.
    #[instrument(skip_all, fields(developer = %snapshot.developer.login))]
    pub fn build(&self, graph: &mut GraphStore, snapshot: &ActivitySnapshot) -> Result<IngestionReport> {
        let login = snapshot.developer.login.trim();
        if login.is_empty() {
            return Err(IngestionError::MissingField {
                record: "developer".to_string(),
                field: "login",
            }
            .into());
        }

        let mut report = IngestionReport {
            developer: login.to_string(),
            ..Default::default()
        };

        let dev_id = NodeId::developer(login);
        graph.add_node(
            dev_id.clone(),
            NodeAttrs::Developer(DeveloperAttrs {
                name: snapshot.developer.name.clone(),
                bio: snapshot.developer.bio.clone(),
                public_repos: snapshot.developer.public_repos,
            }),
        )?;

        let accepted = self.accept_records(snapshot, &mut report);
        let collection = self
            .weighter
            .fit(accepted.iter().flat_map(|(_, commits)| commits.iter().copied()));
        let skills = self.skill_specs(&accepted);

        debug!(
            documents = collection.len(),
            skills = skills.len(),
            "Document collection fitted"
        );

        let mut linked: BTreeSet<String> = BTreeSet::new();

        for (repo, commits) in &accepted {
            let repo_id = NodeId::repository(repo.full_name.trim());
            graph.add_node(
                repo_id.clone(),
                NodeAttrs::Repository(RepositoryAttrs {
                    language: repo.language.clone(),
                    languages: repo.languages.clone(),
                    topics: repo.topics.clone(),
                    stars: Some(repo.stars),
                    description: repo.description.clone(),
                }),
            )?;

            // accept_records never keeps a repository without commits
            if let Some(weight) = repository_weight(commits.len()) {
                graph.upsert_edge(&dev_id, &repo_id, EdgeKind::Contributes, weight, None)?;
            }

            for commit in commits {
                let sha = commit.sha.trim();
                let commit_id = NodeId::commit(sha);
                graph.add_node(
                    commit_id.clone(),
                    NodeAttrs::Commit(CommitAttrs {
                        message: Some(commit.message.clone()).filter(|m| !m.is_empty()),
                        date: commit.date.clone(),
                        excerpt: excerpt(commit),
                    }),
                )?;

                let richness = commit_richness(collection.total_score(sha));
                graph.upsert_edge(&repo_id, &commit_id, EdgeKind::Contains, richness, None)?;

                for skill in &skills {
                    let Some(weight) = self.weighter.skill_weight(&collection, sha, &skill.terms)
                    else {
                        continue;
                    };
                    let skill_id = NodeId::skill(&skill.name);
                    graph.add_node(
                        skill_id.clone(),
                        NodeAttrs::Skill(SkillAttrs {
                            display_name: Some(skill.definition.name.trim().to_string()),
                            terms: skill.definition.terms.clone(),
                            tags: skill.definition.tags.clone(),
                        }),
                    )?;
                    graph.add_edge(&commit_id, &skill_id, EdgeKind::Mentions, weight, Some(sha))?;
                    report.skill_links += 1;
                    linked.insert(skill.name.clone());
                }

                report.commits += 1;
            }

            report.repositories += 1;
        }

        report.skills = linked.into_iter().collect();
        record_ingestion(report.commits, report.skipped, graph.node_count());

        info!(
            repositories = report.repositories,
            commits = report.commits,
            skill_links = report.skill_links,
            skipped = report.skipped,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "HIN built"
        );

        Ok(report)
    }

    /// Validate records, drop forks, merge duplicate repositories and
    /// de-duplicate commits per repository.
    fn accept_records<'a>(
        &self,
        snapshot: &'a ActivitySnapshot,
        report: &mut IngestionReport,
    ) -> Vec<(&'a RepositoryRecord, Vec<&'a CommitRecord>)> {
        let mut accepted: Vec<(&RepositoryRecord, Vec<&CommitRecord>)> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut seen: Vec<HashSet<&str>> = Vec::new();

        for repo in &snapshot.repositories {
            if repo.fork {
                debug!(repository = %repo.full_name, "Skipping fork");
                report.forks_skipped += 1;
                continue;
            }
            if let Err(e) = repo.validate() {
                report.skip(e);
                continue;
            }

            let name = repo.full_name.trim();
            let pos = *positions.entry(name).or_insert_with(|| {
                accepted.push((repo, Vec::new()));
                seen.push(HashSet::new());
                accepted.len() - 1
            });

            for commit in &repo.commits {
                match commit.validate(name) {
                    Ok(()) => {
                        if seen[pos].insert(commit.sha.trim()) {
                            accepted[pos].1.push(commit);
                        }
                    }
                    Err(e) => report.skip(e),
                }
            }
        }

        let before = accepted.len();
        accepted.retain(|(repo, commits)| {
            if commits.is_empty() {
                debug!(repository = %repo.full_name, "Repository has no valid commits");
            }
            !commits.is_empty()
        });
        report.empty_repositories = before - accepted.len();

        accepted
    }

    /// Catalog skills plus, optionally, skills discovered from topics and
    /// languages, keyed by canonical name.
    fn skill_specs(&self, accepted: &[(&RepositoryRecord, Vec<&CommitRecord>)]) -> Vec<SkillSpec> {
        let mut definitions: BTreeMap<String, SkillDefinition> = BTreeMap::new();

        for def in &self.catalog {
            let name = canonical(&def.name);
            if name.is_empty() {
                continue;
            }
            definitions.entry(name).or_insert_with(|| def.clone());
        }

        if self.discover_from_topics {
            for (repo, _) in accepted {
                let tags = repo
                    .language
                    .iter()
                    .chain(repo.languages.iter())
                    .chain(repo.topics.iter());
                for tag in tags {
                    let name = canonical(tag);
                    if name.is_empty() {
                        continue;
                    }
                    definitions
                        .entry(name.clone())
                        .or_insert_with(|| SkillDefinition::new(&name, &[&name], &[&name]));
                }
            }
        }

        definitions
            .into_iter()
            .map(|(name, definition)| {
                let raw_terms: Vec<&str> = if definition.terms.is_empty() {
                    vec![name.as_str()]
                } else {
                    definition.terms.iter().map(|t| t.as_str()).collect()
                };
                let terms = raw_terms
                    .into_iter()
                    .map(|t| self.weighter.term_tokens(t))
                    .collect();
                SkillSpec {
                    name,
                    definition,
                    terms,
                }
            })
            .collect()
    }
}

fn canonical(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Short excerpt of the added code, used as oracle context
fn excerpt(commit: &CommitRecord) -> Option<String> {
    let added: String = commit
        .files
        .iter()
        .filter_map(|f| f.patch.as_deref())
        .map(preprocess_patch)
        .filter(|text| !text.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if added.is_empty() {
        None
    } else {
        Some(added.chars().take(EXCERPT_CHARS).collect())
    }
}
