//! Activity sources
//!
//! Where raw activity records come from:
//! - GitHub REST API (live)
//! - Snapshot files on disk (`<dir>/<login>.json`)

use crate::errors::IngestionError;
use crate::records::{ActivitySnapshot, CommitRecord, DeveloperRecord, FileChange, RepositoryRecord};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoffBuilder};
use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use skillgraph_common::config::SourceConfig;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Concurrent commit detail requests per repository
const DETAIL_CONCURRENCY: usize = 4;

/// Trait for activity retrieval
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Gather the activity snapshot of one developer
    async fn fetch(&self, login: &str) -> Result<ActivitySnapshot, IngestionError>;

    /// Source name
    fn name(&self) -> &str;
}

/// Reject logins that could escape a path or URL segment
fn check_login(login: &str) -> Result<(), IngestionError> {
    let valid = !login.is_empty()
        && login.len() <= 39
        && login.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(IngestionError::Malformed {
            record: login.to_string(),
            reason: "invalid login".to_string(),
        })
    }
}

#[derive(Deserialize)]
struct GhUser {
    login: String,
    name: Option<String>,
    bio: Option<String>,
    public_repos: Option<u64>,
}

#[derive(Deserialize)]
struct GhRepo {
    full_name: String,
    #[serde(default)]
    fork: bool,
    language: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    description: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
}

#[derive(Deserialize)]
struct GhCommitSummary {
    sha: String,
    commit: GhCommitInner,
}

#[derive(Deserialize)]
struct GhCommitInner {
    #[serde(default)]
    message: String,
    author: Option<GhAuthor>,
}

#[derive(Deserialize)]
struct GhAuthor {
    date: Option<String>,
}

#[derive(Deserialize)]
struct GhCommitDetail {
    #[serde(default)]
    files: Vec<GhFile>,
}

#[derive(Deserialize)]
struct GhFile {
    filename: String,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    patch: Option<String>,
}

/// GitHub REST v3 client
pub struct GithubSource {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
    max_repos: usize,
    max_commits: usize,
    max_retries: u32,
}

impl GithubSource {
    /// Create a new GitHub source
    pub fn new(config: &SourceConfig) -> Result<Self, IngestionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("skillgraph/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IngestionError::Source(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            max_repos: config.max_repos,
            max_commits: config.max_commits,
            max_retries: 3,
        })
    }

    async fn make_request<T: DeserializeOwned>(&self, url: &str) -> Result<T, (bool, IngestionError)> {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| (true, IngestionError::Source(format!("Request failed: {}", e))))?;

        let status = response.status();
        if !status.is_success() {
            let transient = status.is_server_error() || status.as_u16() == 429;
            let body = response.text().await.unwrap_or_default();
            return Err((
                transient,
                IngestionError::Source(format!("GitHub error {} for {}: {}", status, url, body)),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| (false, IngestionError::Source(format!("Failed to parse {}: {}", url, e))))
    }

    /// GET with exponential backoff on network errors, 5xx and 429
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, IngestionError> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(250))
            .with_max_interval(Duration::from_secs(4))
            .with_max_elapsed_time(None)
            .build();
        let attempts = AtomicU32::new(0);

        retry(policy, || {
            let attempts = &attempts;
            async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                match self.make_request::<T>(url).await {
                    Ok(value) => Ok(value),
                    Err((true, e)) if attempt < self.max_retries => {
                        warn!(
                            attempt = attempt + 1,
                            max_retries = self.max_retries,
                            error = %e,
                            "GitHub request failed, retrying"
                        );
                        Err(backoff::Error::transient(e))
                    }
                    Err((_, e)) => Err(backoff::Error::permanent(e)),
                }
            }
        })
        .await
    }

    async fn fetch_repositories(&self, login: &str) -> Result<Vec<GhRepo>, IngestionError> {
        let url = format!(
            "{}/users/{}/repos?sort=updated&direction=desc&per_page=100",
            self.api_base, login
        );
        let repos: Vec<GhRepo> = self.get_json(&url).await?;
        Ok(repos
            .into_iter()
            .filter(|r| !r.fork)
            .take(self.max_repos)
            .collect())
    }

    /// Languages ordered by byte count, largest first
    async fn fetch_languages(&self, full_name: &str) -> Vec<String> {
        let url = format!("{}/repos/{}/languages", self.api_base, full_name);
        match self.get_json::<HashMap<String, u64>>(&url).await {
            Ok(map) => {
                let mut languages: Vec<(String, u64)> = map.into_iter().collect();
                languages.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                languages.into_iter().map(|(name, _)| name).collect()
            }
            Err(e) => {
                warn!(repository = full_name, error = %e, "Skipped language metadata");
                Vec::new()
            }
        }
    }

    async fn fetch_commits(&self, full_name: &str, login: &str) -> Result<Vec<CommitRecord>, IngestionError> {
        let url = format!(
            "{}/repos/{}/commits?author={}&per_page={}",
            self.api_base,
            full_name,
            login,
            self.max_commits.clamp(1, 100)
        );
        let summaries: Vec<GhCommitSummary> = self.get_json(&url).await?;

        let details = stream::iter(summaries.into_iter().take(self.max_commits))
            .map(|summary| async move {
                let url = format!("{}/repos/{}/commits/{}", self.api_base, full_name, summary.sha);
                match self.get_json::<GhCommitDetail>(&url).await {
                    Ok(detail) => Some(CommitRecord {
                        sha: summary.sha,
                        message: summary.commit.message,
                        date: summary.commit.author.and_then(|a| a.date),
                        files: detail
                            .files
                            .into_iter()
                            .map(|f| FileChange {
                                filename: f.filename,
                                additions: f.additions,
                                deletions: f.deletions,
                                patch: f.patch,
                            })
                            .collect(),
                        terms: Vec::new(),
                    }),
                    Err(e) => {
                        warn!(repository = full_name, sha = %summary.sha, error = %e, "Skipping commit");
                        None
                    }
                }
            })
            .buffered(DETAIL_CONCURRENCY)
            .collect::<Vec<_>>()
            .await;

        Ok(details.into_iter().flatten().collect())
    }
}

#[async_trait]
impl ActivitySource for GithubSource {
    #[instrument(skip(self))]
    async fn fetch(&self, login: &str) -> Result<ActivitySnapshot, IngestionError> {
        check_login(login)?;

        let user: GhUser = self
            .get_json(&format!("{}/users/{}", self.api_base, login))
            .await?;
        let repos = self.fetch_repositories(login).await?;
        info!(repositories = repos.len(), "Fetched repository list");

        let mut repositories = Vec::with_capacity(repos.len());
        for repo in repos {
            let languages = self.fetch_languages(&repo.full_name).await;
            let commits = match self.fetch_commits(&repo.full_name, login).await {
                Ok(commits) => commits,
                Err(e) => {
                    // empty repositories answer 409
                    warn!(repository = %repo.full_name, error = %e, "Skipped commit history");
                    Vec::new()
                }
            };
            debug!(repository = %repo.full_name, commits = commits.len(), "Fetched repository");

            repositories.push(RepositoryRecord {
                full_name: repo.full_name,
                language: repo.language,
                languages,
                topics: repo.topics,
                stars: repo.stargazers_count,
                description: repo.description,
                fork: repo.fork,
                commits,
            });
        }

        Ok(ActivitySnapshot {
            developer: DeveloperRecord {
                login: user.login,
                name: user.name,
                bio: user.bio,
                public_repos: user.public_repos,
            },
            repositories,
        })
    }

    fn name(&self) -> &str {
        "github"
    }
}

/// Reads `<dir>/<login>.json`
pub struct SnapshotSource {
    dir: PathBuf,
}

impl SnapshotSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Parse a snapshot file directly
    pub async fn read_file(path: &std::path::Path) -> Result<ActivitySnapshot, IngestionError> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IngestionError::SnapshotNotFound(path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl ActivitySource for SnapshotSource {
    async fn fetch(&self, login: &str) -> Result<ActivitySnapshot, IngestionError> {
        check_login(login)?;
        let path = self.dir.join(format!("{}.json", login));
        let mut snapshot = Self::read_file(&path).await?;
        if snapshot.developer.login.trim().is_empty() {
            snapshot.developer.login = login.to_string();
        }
        Ok(snapshot)
    }

    fn name(&self) -> &str {
        "snapshot"
    }
}

/// Create an activity source based on configuration
pub fn create_source(config: &SourceConfig) -> Result<Arc<dyn ActivitySource>, IngestionError> {
    match config.provider.as_str() {
        "github" => Ok(Arc::new(GithubSource::new(config)?)),
        "snapshot" => Ok(Arc::new(SnapshotSource::new(&config.snapshot_dir))),
        other => Err(IngestionError::Source(format!("Unknown activity source: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base: &str) -> SourceConfig {
        SourceConfig {
            provider: "github".into(),
            api_base: base.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_github_source_builds_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octocat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "login": "octocat", "name": "The Octocat", "bio": null, "public_repos": 2
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/octocat/repos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "full_name": "octocat/fork", "fork": true, "stargazers_count": 1 },
                { "full_name": "octocat/nlp", "fork": false, "language": "Python",
                  "stargazers_count": 7, "topics": ["nlp"] }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/nlp/languages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Shell": 10, "Python": 900
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/nlp/commits"))
            .and(query_param("author", "octocat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "sha": "abc123", "commit": { "message": "Add tokenizer",
                  "author": { "date": "2024-05-01T10:00:00Z" } } }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/nlp/commits/abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [ { "filename": "tok.py", "additions": 1, "deletions": 0,
                             "patch": "+from transformers import AutoTokenizer" } ]
            })))
            .mount(&server)
            .await;

        let source = GithubSource::new(&config(&server.uri())).unwrap();
        let snapshot = source.fetch("octocat").await.unwrap();

        assert_eq!(snapshot.developer.name.as_deref(), Some("The Octocat"));
        assert_eq!(snapshot.repositories.len(), 1);
        let repo = &snapshot.repositories[0];
        assert_eq!(repo.languages, vec!["Python", "Shell"]);
        assert_eq!(repo.commits.len(), 1);
        assert_eq!(repo.commits[0].files[0].filename, "tok.py");
    }

    #[tokio::test]
    async fn test_github_source_skips_failed_history() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/octocat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "login": "octocat"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/octocat/repos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "full_name": "octocat/empty" }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/octocat/empty/commits"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let source = GithubSource::new(&config(&server.uri())).unwrap();
        let snapshot = source.fetch("octocat").await.unwrap();
        assert_eq!(snapshot.repositories.len(), 1);
        assert!(snapshot.repositories[0].commits.is_empty());
        assert!(snapshot.repositories[0].languages.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_source_reads_file() {
        let dir = std::env::temp_dir().join(format!("skillgraph-snapshots-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(
            dir.join("octocat.json"),
            r#"{ "developer": {}, "repositories": [ { "full_name": "octocat/x" } ] }"#,
        )
        .await
        .unwrap();

        let source = SnapshotSource::new(&dir);
        let snapshot = source.fetch("octocat").await.unwrap();
        assert_eq!(snapshot.developer.login, "octocat");
        assert_eq!(snapshot.repositories.len(), 1);

        let missing = source.fetch("nobody").await.unwrap_err();
        assert!(matches!(missing, IngestionError::SnapshotNotFound(_)));

        let traversal = source.fetch("../etc").await.unwrap_err();
        assert!(matches!(traversal, IngestionError::Malformed { .. }));
    }
}
