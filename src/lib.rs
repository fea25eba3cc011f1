pub mod agent;
pub mod ai;
pub mod changelog;
pub mod config;
pub mod content;
pub mod generator;
pub mod git;
pub mod tools;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use agent::{AgentError, AgentLoop, AgentOutcome};
pub use changelog::{ChangelogDocument, ChangelogTarget, ChangelogWriter};
pub use config::Config;
pub use content::{extract_markdown, MessageContent};
pub use generator::{ChangelogGenerator, GenerateError, GeneratedChangelog};
pub use git::{CommandRunner, GitCli, RepoContext};
