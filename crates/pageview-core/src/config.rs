use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::error::ConfigError;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PageViewConfig {
    /// Section records requested per historical page.
    pub section_page_size: u32,
    /// Delay before the stop control is revealed; zero reveals at once.
    pub reveal_delay_ms: u64,
    pub notice_capacity: usize,
    pub path_prefix: String,
}

impl Default for PageViewConfig {
    fn default() -> Self {
        Self {
            section_page_size: 20,
            reveal_delay_ms: 250,
            notice_capacity: 32,
            path_prefix: "/page".to_string(),
        }
    }
}

impl PageViewConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Reads `path` when it exists, then applies `PAGEVIEW_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_toml_str(&std::fs::read_to_string(path)?)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PAGEVIEW_SECTION_PAGE_SIZE") {
            self.section_page_size = parse_env("PAGEVIEW_SECTION_PAGE_SIZE", v)?;
        }
        if let Some(v) = lookup("PAGEVIEW_REVEAL_DELAY_MS") {
            self.reveal_delay_ms = parse_env("PAGEVIEW_REVEAL_DELAY_MS", v)?;
        }
        if let Some(v) = lookup("PAGEVIEW_NOTICE_CAPACITY") {
            self.notice_capacity = parse_env("PAGEVIEW_NOTICE_CAPACITY", v)?;
        }
        if let Some(v) = lookup("PAGEVIEW_PATH_PREFIX") {
            self.path_prefix = v;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}
