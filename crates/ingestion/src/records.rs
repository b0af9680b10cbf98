//! Raw activity records
//!
//! The shape an activity source hands to the HIN builder. Identity fields
//! default to empty so a single bad record does not reject the snapshot;
//! the builder validates each record and skips the malformed ones.

use crate::errors::IngestionError;
use serde::{Deserialize, Serialize};

/// Everything gathered about one developer for one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivitySnapshot {
    pub developer: DeveloperRecord,
    #[serde(default)]
    pub repositories: Vec<RepositoryRecord>,
}

impl ActivitySnapshot {
    /// Total commit records across repositories
    pub fn commit_count(&self) -> usize {
        self.repositories.iter().map(|r| r.commits.len()).sum()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeveloperRecord {
    #[serde(default)]
    pub login: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub public_repos: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryRecord {
    /// `owner/name`
    #[serde(default)]
    pub full_name: String,
    pub language: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub stars: u64,
    pub description: Option<String>,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub commits: Vec<CommitRecord>,
}

impl RepositoryRecord {
    pub fn validate(&self) -> Result<(), IngestionError> {
        let name = self.full_name.trim();
        if name.is_empty() {
            return Err(IngestionError::MissingField {
                record: "repository".to_string(),
                field: "full_name",
            });
        }
        if name.split('/').filter(|part| !part.is_empty()).count() != 2 {
            return Err(IngestionError::Malformed {
                record: name.to_string(),
                reason: "expected owner/name".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitRecord {
    #[serde(default)]
    pub sha: String,
    #[serde(default)]
    pub message: String,
    pub date: Option<String>,
    #[serde(default)]
    pub files: Vec<FileChange>,
    /// Terms extracted upstream (e.g. imports, tags)
    #[serde(default)]
    pub terms: Vec<String>,
}

impl CommitRecord {
    pub fn validate(&self, repository: &str) -> Result<(), IngestionError> {
        let sha = self.sha.trim();
        if sha.is_empty() {
            return Err(IngestionError::MissingField {
                record: format!("{} commit", repository),
                field: "sha",
            });
        }
        if !sha.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(IngestionError::Malformed {
                record: format!("{}@{}", repository, sha),
                reason: "sha is not hexadecimal".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileChange {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    /// Unified diff text
    pub patch: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_identity_fields_deserialize() {
        let json = r#"{
            "developer": { "login": "octocat" },
            "repositories": [ { "language": "Rust", "commits": [ { "message": "wip" } ] } ]
        }"#;
        let snapshot: ActivitySnapshot = serde_json::from_str(json).unwrap();
        let repo = &snapshot.repositories[0];
        assert!(matches!(
            repo.validate(),
            Err(IngestionError::MissingField { field: "full_name", .. })
        ));
        assert!(repo.commits[0].validate("acme/x").is_err());
    }

    #[test]
    fn test_repository_name_shape() {
        let repo = RepositoryRecord {
            full_name: "no-owner".into(),
            ..Default::default()
        };
        assert!(matches!(repo.validate(), Err(IngestionError::Malformed { .. })));

        let repo = RepositoryRecord {
            full_name: "acme/api".into(),
            ..Default::default()
        };
        assert!(repo.validate().is_ok());
    }
}
