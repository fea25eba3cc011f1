use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::Validate;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    #[error("{var} environment variable not set")]
    MissingApiKey { var: &'static str },

    #[error("could not determine config directory")]
    NoConfigDir,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
#[serde(default)]
pub struct Config {
    #[validate]
    pub ai: AIConfig,
    #[validate]
    pub agent: AgentSettings,
    pub output: OutputConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
#[serde(default)]
pub struct AIConfig {
    pub provider: AIProvider,
    #[validate(length(min = 1, message = "Model name cannot be empty"))]
    pub model: String,
    #[validate(range(min = 1, max = 65536, message = "max_tokens must be between 1 and 65536"))]
    pub max_tokens: u32,
    #[validate(range(min = 0.0, max = 2.0, message = "temperature must be between 0 and 2"))]
    pub temperature: f32,
    /// Overrides the provider's base URL.
    pub api_url: Option<String>,
    #[validate(range(min = 1, message = "request timeout must be at least one second"))]
    pub request_timeout_secs: u64,
    #[validate(range(max = 10, message = "max_retries must be at most 10"))]
    pub max_retries: u32,
}

impl Default for AIConfig {
    fn default() -> Self {
        let provider = AIProvider::Gemini;
        Self {
            model: provider.default_model().to_string(),
            provider,
            max_tokens: 8192,
            temperature: 0.7,
            api_url: None,
            request_timeout_secs: 120,
            max_retries: 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AIProvider {
    Gemini,
    Anthropic,
    #[value(name = "openai")]
    OpenAI,
}

impl AIProvider {
    pub fn api_key_var(&self) -> &'static str {
        match self {
            AIProvider::Gemini => "GOOGLE_API_KEY",
            AIProvider::Anthropic => "ANTHROPIC_API_KEY",
            AIProvider::OpenAI => "OPENAI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            AIProvider::Gemini => "gemini-flash-latest",
            AIProvider::Anthropic => "claude-3-5-sonnet-latest",
            AIProvider::OpenAI => "gpt-4o",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
#[serde(default)]
pub struct AgentSettings {
    #[validate(range(min = 1, max = 100, message = "max_iterations must be between 1 and 100"))]
    pub max_iterations: usize,
    #[validate(range(min = 1, message = "git timeout must be at least one second"))]
    pub git_timeout_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            git_timeout_secs: 30,
        }
    }
}

impl AgentSettings {
    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("Changelogs"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    pub print_changelog: bool,
    pub color_output: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            print_changelog: true,
            color_output: true,
        }
    }
}

impl Config {
    pub fn create_default(path: &Path) -> Result<Self, ConfigError> {
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the config at `path`. `None` when there is no file yet; nothing is written.
    pub fn load_if_present(path: &Path) -> Result<Option<Self>, ConfigError> {
        if path.exists() {
            Self::load(path).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Reads the provider's API key from the environment.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        let var = self.ai.provider.api_key_var();
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingApiKey { var }),
        }
    }
}

pub fn get_config_path() -> Result<PathBuf, ConfigError> {
    let proj_dirs =
        ProjectDirs::from("com", "gitscribe", "gitscribe").ok_or(ConfigError::NoConfigDir)?;

    Ok(proj_dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.ai.provider, AIProvider::Gemini);
        assert_eq!(config.ai.model, "gemini-flash-latest");
        assert_eq!(config.agent.max_iterations, 15);
        assert_eq!(config.output.directory, PathBuf::from("Changelogs"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_create_default_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(Config::load_if_present(&path).unwrap().is_none());
        assert!(!path.exists());

        Config::create_default(&path).unwrap();
        let loaded = Config::load_if_present(&path).unwrap().unwrap();
        assert_eq!(loaded.ai.max_tokens, Config::default().ai.max_tokens);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[ai]\nprovider = \"Anthropic\"\nmodel = \"claude-test\"\n\n[agent]\nmax_iterations = 4\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.ai.provider, AIProvider::Anthropic);
        assert_eq!(config.ai.model, "claude-test");
        assert_eq!(config.agent.max_iterations, 4);
        assert_eq!(config.agent.git_timeout_secs, 30);
        assert!(config.display.print_changelog);
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[agent]\nmax_iterations = 0\n").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));

        fs::write(&path, "[ai]\nmax_retries = 60\n").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_api_key() {
        let mut config = Config::default();
        config.ai.provider = AIProvider::OpenAI;
        std::env::remove_var("OPENAI_API_KEY");

        match config.api_key() {
            Err(ConfigError::MissingApiKey { var }) => assert_eq!(var, "OPENAI_API_KEY"),
            other => panic!("expected missing key error, got {:?}", other),
        }
    }
}
