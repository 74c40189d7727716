//! Error and warning taxonomy for the build pipeline.
//!
//! Nothing here is fatal to a query. Table and per-unit problems become
//! [`SyncWarning`]s attached to the generation; only a [`BuildError`] stops
//! a rebuild, and even then the previous generation keeps serving.

use std::path::PathBuf;

use story_corpus_core::models::MetadataSource;
use story_corpus_core::pathmap::Ambiguity;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("table {source_name} not found at {}", path.display())]
    Missing {
        source_name: MetadataSource,
        path: PathBuf,
    },
    #[error("table {source_name} at {} is malformed: {reason}", path.display())]
    Malformed {
        source_name: MetadataSource,
        path: PathBuf,
        reason: String,
    },
}

impl TableError {
    pub fn source_kind(&self) -> MetadataSource {
        match self {
            TableError::Missing { source_name, .. } | TableError::Malformed { source_name, .. } => {
                *source_name
            }
        }
    }
}

/// A non-fatal problem found while building a generation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncWarning {
    #[error("missing table {source_name} ({})", path.display())]
    MissingTable {
        source_name: MetadataSource,
        path: PathBuf,
    },
    #[error("skipped malformed table {source_name} ({}): {reason}", path.display())]
    MalformedTable {
        source_name: MetadataSource,
        path: PathBuf,
        reason: String,
    },
    #[error("no corpus asset for {story_id} ({logical_id})")]
    UnresolvedAsset { story_id: String, logical_id: String },
    #[error("{} and {} both map to {key}; keeping the first", kept.display(), ignored.display())]
    AmbiguousPath {
        key: String,
        kept: PathBuf,
        ignored: PathBuf,
    },
}

impl SyncWarning {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncWarning::MissingTable { .. } => "missing_table",
            SyncWarning::MalformedTable { .. } => "malformed_table",
            SyncWarning::UnresolvedAsset { .. } => "unresolved_asset",
            SyncWarning::AmbiguousPath { .. } => "ambiguous_path",
        }
    }
}

impl From<TableError> for SyncWarning {
    fn from(err: TableError) -> Self {
        match err {
            TableError::Missing { source_name, path } => {
                SyncWarning::MissingTable { source_name, path }
            }
            TableError::Malformed {
                source_name,
                path,
                reason,
            } => SyncWarning::MalformedTable {
                source_name,
                path,
                reason,
            },
        }
    }
}

impl From<Ambiguity> for SyncWarning {
    fn from(a: Ambiguity) -> Self {
        SyncWarning::AmbiguousPath {
            key: a.key,
            kept: a.kept,
            ignored: a.ignored,
        }
    }
}

/// Failure that aborts a rebuild.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("corpus directory {} is not accessible: {reason}", path.display())]
    CorpusInaccessible { path: PathBuf, reason: String },
    #[error("corpus walk failed: {0}")]
    Scan(String),
    #[error("build task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for BuildError {
    fn from(err: tokio::task::JoinError) -> Self {
        BuildError::Task(err.to_string())
    }
}

/// Snapshot persistence failure. Logged; never undoes a publish.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_error_converts_to_warning() {
        let err = TableError::Missing {
            source_name: MetadataSource::ZoneTable,
            path: PathBuf::from("/t/zone_table.json"),
        };
        assert_eq!(err.source_kind(), MetadataSource::ZoneTable);
        let warning: SyncWarning = err.into();
        assert_eq!(warning.kind(), "missing_table");
        assert_eq!(
            warning.to_string(),
            "missing table zone_table (/t/zone_table.json)"
        );
    }

    #[test]
    fn test_ambiguity_message() {
        let warning: SyncWarning = Ambiguity {
            key: "obt/a".into(),
            kept: PathBuf::from("Obt/A.txt"),
            ignored: PathBuf::from("obt/a.txt"),
        }
        .into();
        assert_eq!(
            warning.to_string(),
            "Obt/A.txt and obt/a.txt both map to obt/a; keeping the first"
        );
    }
}
