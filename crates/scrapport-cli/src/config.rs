// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration: TOML file, then environment, then command-line flags

use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScrapboxConfig {
    pub project: Option<String>,
    /// Value of the `connect.sid` session cookie
    pub connect_sid: Option<String>,
    /// Alternative host, e.g. a self-hosted instance
    pub host: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NotionConfig {
    pub api_key: Option<String>,
    pub database_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub scrapbox: ScrapboxConfig,
    pub notion: NotionConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Optional file overlaid with the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overlay non-empty values returned by `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let overlay = |target: &mut Option<String>, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *target = Some(value);
            }
        };
        overlay(&mut self.scrapbox.project, "SCRAPBOX_PROJECT");
        overlay(&mut self.scrapbox.connect_sid, "SCRAPBOX_COOKIE_CONNECT_SID");
        overlay(&mut self.notion.api_key, "NOTION_API_KEY");
        overlay(&mut self.notion.database_id, "NOTION_DATABASE_ID");
    }

    /// Report every missing value the command needs at once
    pub fn validate(&self, require_scrapbox: bool, require_notion: bool) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if require_scrapbox && is_blank(&self.scrapbox.project) {
            missing.push("SCRAPBOX_PROJECT");
        }
        if require_notion {
            if is_blank(&self.notion.api_key) {
                missing.push("NOTION_API_KEY");
            }
            if is_blank(&self.notion.database_id) {
                missing.push("NOTION_DATABASE_ID");
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Missing(missing))
        }
    }

    pub fn project(&self) -> &str {
        self.scrapbox.project.as_deref().unwrap_or_default()
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            r#"
            [scrapbox]
            project = "notes"
            host = "https://wiki.example"

            [notion]
            database_id = "db"
            "#,
        )
        .unwrap();
        assert_eq!(config.project(), "notes");
        assert_eq!(config.scrapbox.host.as_deref(), Some("https://wiki.example"));
        assert_eq!(config.notion.database_id.as_deref(), Some("db"));
        assert!(config.notion.api_key.is_none());
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut config = Config {
            scrapbox: ScrapboxConfig {
                project: Some("from-file".to_string()),
                ..ScrapboxConfig::default()
            },
            ..Config::default()
        };
        let env: HashMap<&str, &str> = [
            ("SCRAPBOX_PROJECT", "from-env"),
            ("NOTION_API_KEY", "secret"),
            ("NOTION_DATABASE_ID", "  "),
        ]
        .into_iter()
        .collect();

        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.project(), "from-env");
        assert_eq!(config.notion.api_key.as_deref(), Some("secret"));
        assert!(config.notion.database_id.is_none());
    }

    #[test]
    fn test_validate_reports_all_missing() {
        let config = Config::default();
        match config.validate(true, true) {
            Err(ConfigError::Missing(keys)) => assert_eq!(
                keys,
                vec!["SCRAPBOX_PROJECT", "NOTION_API_KEY", "NOTION_DATABASE_ID"]
            ),
            other => panic!("expected missing keys, got {other:?}"),
        }
        assert!(config.validate(false, false).is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrapport.toml");
        std::fs::write(&path, "[notion]\napi_key = \"k\"\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.notion.api_key.as_deref(), Some("k"));

        let missing = Config::from_file(&dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
