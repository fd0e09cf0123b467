pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the settings file directly
pub const CONFIG_ENV: &str = "RECONFLOW_CONFIG";

/// Settings file name searched in the working and config directories
pub const CONFIG_FILE_NAME: &str = "reconflow.yaml";

/// Top-level settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub source: SourceSettings,
    pub runtime: RuntimeSettings,
    pub cloudflare: CloudflareSettings,
    pub cluster_users: ClusterUsersSettings,
    pub github: GithubSettings,
    pub slack: Option<SlackSettings>,
}

/// Where the declared-state bundle lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Relative paths resolve against the settings file's directory
    pub path: PathBuf,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("state.yaml"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub thread_pool_size: usize,
    pub call_timeout_secs: u64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            thread_pool_size: 10,
            call_timeout_secs: 600,
        }
    }
}

impl RuntimeSettings {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudflareSettings {
    pub enable_deletion: bool,
    /// Prefix of every account's state key
    pub integration: String,
    pub terraform_binary: PathBuf,
}

impl Default for CloudflareSettings {
    fn default() -> Self {
        Self {
            enable_deletion: false,
            integration: "terraform_resources_cloudflare".to_string(),
            terraform_binary: PathBuf::from("terraform"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterUsersSettings {
    pub create_users: bool,
    pub oc_binary: PathBuf,
}

impl Default for ClusterUsersSettings {
    fn default() -> Self {
        Self {
            create_users: false,
            oc_binary: PathBuf::from("oc"),
        }
    }
}

/// Content store used to fetch worker scripts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubSettings {
    pub api_url: String,
    /// Environment variable holding the API token
    pub token_env: String,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
        }
    }
}

/// Chat notifications; absent means notifications are off
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackSettings {
    #[serde(default = "default_slack_token_env")]
    pub token_env: String,
    pub channel: String,
    #[serde(default)]
    pub output: Option<String>,
}

fn default_slack_token_env() -> String {
    "SLACK_TOKEN".to_string()
}

impl Settings {
    /// Parse settings from YAML text
    ///
    /// `origin` is only used in error messages.
    pub fn from_yaml(content: &str, origin: &Path) -> Result<Self> {
        // An empty file means "all defaults"
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Read a settings file, resolving `source.path` against its directory
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut settings = Self::from_yaml(&content, path)?;

        let relative = settings.source.path.is_relative();
        if let Some(dir) = path.parent().filter(|_| relative) {
            settings.source.path = dir.join(&settings.source.path);
        }

        Ok(settings)
    }
}

/// Locate the settings file
///
/// Search order:
/// 1. `explicit` (the `--config` flag)
/// 2. `RECONFLOW_CONFIG` environment variable
/// 3. `./reconflow.yaml`
/// 4. `./.reconflow/reconflow.yaml`
/// 5. `<config dir>/reconflow/reconflow.yaml`
pub fn find_config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(ConfigError::ExplicitFileMissing(path.to_path_buf()));
    }

    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::ExplicitFileMissing(path));
    }

    let current_dir = std::env::current_dir()?;

    let path = current_dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        return Ok(path);
    }

    let path = current_dir.join(".reconflow").join(CONFIG_FILE_NAME);
    if path.exists() {
        return Ok(path);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("reconflow").join(CONFIG_FILE_NAME);
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// Find and load settings
pub fn load(explicit: Option<&Path>) -> Result<Settings> {
    let path = find_config_file(explicit)?;
    tracing::debug!("Loading settings from {}", path.display());
    Settings::from_file(&path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    /// Run `f` with the working directory set to `dir`
    fn in_dir<T>(dir: &Path, f: impl FnOnce() -> T) -> T {
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        let out = f();
        std::env::set_current_dir(original).unwrap();
        out
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_yaml("", Path::new("empty.yaml")).unwrap();

        assert_eq!(settings.runtime.thread_pool_size, 10);
        assert_eq!(settings.runtime.call_timeout(), Duration::from_secs(600));
        assert!(!settings.cloudflare.enable_deletion);
        assert_eq!(settings.cloudflare.integration, "terraform_resources_cloudflare");
        assert!(!settings.cluster_users.create_users);
        assert!(settings.slack.is_none());
    }

    #[test]
    fn test_partial_settings() {
        let yaml = r##"
runtime:
  thread_pool_size: 4
cloudflare:
  enable_deletion: true
slack:
  channel: "#infra"
  output: events
"##;
        let settings = Settings::from_yaml(yaml, Path::new("s.yaml")).unwrap();

        assert_eq!(settings.runtime.thread_pool_size, 4);
        assert_eq!(settings.runtime.call_timeout_secs, 600);
        assert!(settings.cloudflare.enable_deletion);
        assert_eq!(settings.cloudflare.terraform_binary, PathBuf::from("terraform"));

        let slack = settings.slack.unwrap();
        assert_eq!(slack.channel, "#infra");
        assert_eq!(slack.token_env, "SLACK_TOKEN");
        assert_eq!(slack.output.as_deref(), Some("events"));
    }

    #[test]
    fn test_invalid_yaml_names_file() {
        let err = Settings::from_yaml("runtime: [1, 2", Path::new("broken.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
        assert!(err.to_string().contains("broken.yaml"));
    }

    #[test]
    fn test_source_path_resolves_against_settings_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "source:\n  path: bundle/state.yaml\n").unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(
            settings.source.path,
            temp_dir.path().join("bundle").join("state.yaml")
        );
    }

    #[test]
    #[serial]
    fn test_find_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "").unwrap();

        let found = temp_env::with_var_unset(CONFIG_ENV, || {
            in_dir(temp_dir.path(), || find_config_file(None))
        })
        .unwrap();
        assert!(found.ends_with(CONFIG_FILE_NAME));
    }

    #[test]
    #[serial]
    fn test_find_in_dot_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dot_dir = temp_dir.path().join(".reconflow");
        fs::create_dir(&dot_dir).unwrap();
        fs::write(dot_dir.join(CONFIG_FILE_NAME), "").unwrap();

        let found = temp_env::with_var_unset(CONFIG_ENV, || {
            in_dir(temp_dir.path(), || find_config_file(None))
        })
        .unwrap();
        assert!(found.ends_with(".reconflow/reconflow.yaml"));
    }

    #[test]
    #[serial]
    fn test_env_var_wins_over_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "").unwrap();
        let custom = temp_dir.path().join("custom.yaml");
        fs::write(&custom, "").unwrap();

        let found = temp_env::with_var(CONFIG_ENV, Some(custom.as_os_str()), || {
            in_dir(temp_dir.path(), || find_config_file(None))
        })
        .unwrap();
        assert_eq!(found, custom);
    }

    #[test]
    #[serial]
    fn test_explicit_path_wins_over_env() {
        let temp_dir = tempfile::tempdir().unwrap();
        let explicit = temp_dir.path().join("explicit.yaml");
        fs::write(&explicit, "").unwrap();

        let found = temp_env::with_var(CONFIG_ENV, Some("/nonexistent/env.yaml"), || {
            find_config_file(Some(&explicit))
        })
        .unwrap();
        assert_eq!(found, explicit);
    }

    #[test]
    #[serial]
    fn test_missing_explicit_path() {
        let err = find_config_file(Some(Path::new("/nonexistent/reconflow.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::ExplicitFileMissing(_)));
    }

    #[test]
    #[serial]
    fn test_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = temp_env::with_vars(
            [
                (CONFIG_ENV, None::<&str>),
                ("HOME", Some(temp_dir.path().to_str().unwrap())),
                ("XDG_CONFIG_HOME", Some(temp_dir.path().to_str().unwrap())),
            ],
            || in_dir(temp_dir.path(), || find_config_file(None)),
        );

        if let Err(ConfigError::ConfigFileNotFound) = result {
            // expected
        } else {
            panic!("Expected ConfigFileNotFound error, got {:?}", result);
        }
    }
}
