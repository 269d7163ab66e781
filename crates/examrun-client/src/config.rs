//! Configuration loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examrun_core::result::Identity;

use crate::api::DEFAULT_TIMEOUT_SECS;

/// Backend connection settings.
///
/// Note: Custom Debug impl masks the token to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Bearer token of a previous login. Supports `${VAR}` references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// User id the token belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .finish()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            token: None,
            user_id: None,
            email: None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}
fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_exams_path() -> PathBuf {
    PathBuf::from("./data/data.json")
}
fn default_device_id() -> String {
    format!("examrun-{}", uuid::Uuid::new_v4())
}

/// Top-level examrun configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamrunConfig {
    /// Exam data file used when a command is not given `--exams`.
    #[serde(default = "default_exams_path")]
    pub exams_path: PathBuf,
    /// Device id sent with every login. Generated when absent.
    #[serde(default = "default_device_id")]
    pub device_id: String,
    #[serde(default)]
    pub api: ApiConfig,
}

impl Default for ExamrunConfig {
    fn default() -> Self {
        Self {
            exams_path: default_exams_path(),
            device_id: default_device_id(),
            api: ApiConfig::default(),
        }
    }
}

impl ExamrunConfig {
    /// The identity of a stored login, when both token and user id are set.
    pub fn configured_identity(&self) -> Option<Identity> {
        let token = self.api.token.as_ref().filter(|t| !t.is_empty())?;
        let user_id = self.api.user_id.as_ref().filter(|u| !u.is_empty())?;
        Some(Identity {
            user_id: user_id.clone(),
            email: self.api.email.clone(),
            token: token.clone(),
        })
    }

    /// Render as TOML, e.g. for writing a starter config file.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config")
    }

    /// Apply overrides looked up by variable name, then resolve `${VAR}`
    /// references.
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("EXAMRUN_API_URL") {
            self.api.base_url = url;
        }
        if let Some(token) = lookup("EXAMRUN_TOKEN") {
            self.api.token = Some(token);
        }

        self.api.base_url = resolve_env_vars(&self.api.base_url, &lookup);
        self.api.token = self
            .api
            .token
            .as_ref()
            .map(|t| resolve_env_vars(t, &lookup))
            .filter(|t| !t.is_empty());
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars<F>(s: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = lookup(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examrun.toml` in the current directory
/// 2. `~/.config/examrun/config.toml`
///
/// Environment variable overrides: `EXAMRUN_API_URL`, `EXAMRUN_TOKEN`.
pub fn load_config() -> Result<ExamrunConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamrunConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("examrun.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|dir| dir.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<ExamrunConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ExamrunConfig::default(),
    };

    config.apply_overrides(|name| std::env::var(name).ok());
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examrun"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn resolve_env_vars_basic() {
        let lookup = vars(&[("_EXAMRUN_TEST_VAR", "hello")]);
        assert_eq!(resolve_env_vars("${_EXAMRUN_TEST_VAR}", &lookup), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_EXAMRUN_TEST_VAR}_suffix", &lookup),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("${MISSING}", &lookup), "");
        assert_eq!(resolve_env_vars("${unterminated", &lookup), "${unterminated");
    }

    #[test]
    fn default_config() {
        let config = ExamrunConfig::default();
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.exams_path, PathBuf::from("./data/data.json"));
        assert!(config.device_id.starts_with("examrun-"));
        assert!(config.configured_identity().is_none());
    }

    #[test]
    fn parse_config_file() {
        let toml_str = r#"
exams_path = "exams/topik.json"
device_id = "laptop"

[api]
base_url = "https://api.example.com"
timeout_secs = 10
token = "${EXAMRUN_TEST_TOKEN}"
user_id = "u1"
"#;
        let mut config: ExamrunConfig = toml::from_str(toml_str).unwrap();
        config.apply_overrides(vars(&[("EXAMRUN_TEST_TOKEN", "jwt")]));

        assert_eq!(config.api.base_url, "https://api.example.com");
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.device_id, "laptop");
        let identity = config.configured_identity().unwrap();
        assert_eq!(identity.user_id, "u1");
        assert_eq!(identity.token, "jwt");
    }

    #[test]
    fn env_overrides_win() {
        let mut config = ExamrunConfig::default();
        config.api.token = Some("from-file".into());
        config.apply_overrides(vars(&[
            ("EXAMRUN_API_URL", "http://override:1"),
            ("EXAMRUN_TOKEN", "from-env"),
        ]));
        assert_eq!(config.api.base_url, "http://override:1");
        assert_eq!(config.api.token.as_deref(), Some("from-env"));
    }

    #[test]
    fn unresolved_token_is_dropped() {
        let mut config = ExamrunConfig::default();
        config.api.token = Some("${NOT_SET_ANYWHERE}".into());
        config.api.user_id = Some("u1".into());
        config.apply_overrides(vars(&[]));
        assert!(config.api.token.is_none());
        assert!(config.configured_identity().is_none());
    }

    #[test]
    fn debug_masks_token() {
        let mut config = ExamrunConfig::default();
        config.api.token = Some("super-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn explicit_path_must_exist() {
        let err = load_config_from(Some(Path::new("/nonexistent/examrun.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn loads_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("examrun.toml");
        std::fs::write(&path, "exams_path = \"mine.json\"\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.exams_path, PathBuf::from("mine.json"));
    }

    #[test]
    fn starter_config_round_trips() {
        let config = ExamrunConfig::default();
        let rendered = config.to_toml().unwrap();
        let parsed: ExamrunConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.device_id, config.device_id);
        assert_eq!(parsed.api.base_url, config.api.base_url);
    }
}
