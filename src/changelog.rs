use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::tools::validate_commit_id;

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// What a changelog is generated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangelogTarget {
    Commit(String),
    /// Staged changes, identified by the run's `YYYYMMDD_HHMMSS` timestamp.
    Staged(String),
}

impl ChangelogTarget {
    pub fn commit(commit_id: impl Into<String>) -> Self {
        ChangelogTarget::Commit(commit_id.into())
    }

    /// Builds a commit target from user input, applying the same rules as
    /// the commit tools.
    pub fn parse_commit(input: &str) -> Result<Self, InvalidTarget> {
        validate_commit_id(input)
            .map(ChangelogTarget::Commit)
            .map_err(InvalidTarget)
    }

    pub fn staged_now() -> Self {
        Self::staged_at(Local::now())
    }

    pub fn staged_at(time: DateTime<Local>) -> Self {
        ChangelogTarget::Staged(time.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn thread_id(&self) -> String {
        match self {
            ChangelogTarget::Commit(id) => format!("commit-{}", id),
            ChangelogTarget::Staged(timestamp) => format!("staged-{}", timestamp),
        }
    }

    pub fn file_name(&self) -> String {
        match self {
            // Revisions like `feature/login` must stay one file inside the output dir.
            ChangelogTarget::Commit(id) => {
                format!("{}.md", id.replace(&['/', '\\'][..], "_"))
            }
            ChangelogTarget::Staged(timestamp) => format!("staged_{}.md", timestamp),
        }
    }

    pub fn is_staged(&self) -> bool {
        matches!(self, ChangelogTarget::Staged(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct InvalidTarget(String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangelogDocument {
    target: ChangelogTarget,
    markdown: String,
}

impl ChangelogDocument {
    pub fn new(target: ChangelogTarget, markdown: impl Into<String>) -> Self {
        Self {
            target,
            markdown: markdown.into(),
        }
    }

    pub fn target(&self) -> &ChangelogTarget {
        &self.target
    }

    pub fn markdown(&self) -> &str {
        &self.markdown
    }
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("could not create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write changelog {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct ChangelogWriter {
    output_dir: PathBuf,
}

impl ChangelogWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes the document, replacing any earlier file for the same target.
    pub fn write(&self, document: &ChangelogDocument) -> Result<PathBuf, OutputError> {
        fs::create_dir_all(&self.output_dir).map_err(|source| OutputError::CreateDir {
            path: self.output_dir.clone(),
            source,
        })?;

        let path = self.output_dir.join(document.target().file_name());
        fs::write(&path, document.markdown()).map_err(|source| OutputError::Write {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), bytes = document.markdown().len(), "Changelog written");
        Ok(path)
    }
}
