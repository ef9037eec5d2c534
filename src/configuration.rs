//! Connection, cache and translation settings for a CCU session

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::translation::Language;

/// Settings needed to open a session against a CCU.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Base URL of the CCU REST interface
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout: u64,
    /// Skip TLS certificate verification (the CCU ships a self-signed certificate)
    pub insecure: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Language used to display room and function names
    pub language: Language,
    pub cache: CacheConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            base_url: "https://ccu3-webui:2122".to_string(),
            timeout: 30,
            insecure: false,
            username: None,
            password: None,
            language: Language::default(),
            cache: CacheConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Persist cached data between sessions
    pub enabled: bool,
    /// Override the cache directory (defaults to XDG_CACHE_HOME/hmip)
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = Configuration::default();
        assert_eq!(config.base_url, "https://ccu3-webui:2122");
        assert_eq!(config.timeout, 30);
        assert!(!config.insecure);
        assert!(config.cache.enabled);
        assert_eq!(config.language, Language::English);
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: Configuration =
            serde_json::from_str(r#"{"base_url": "https://ccu.local:2122", "language": "de"}"#)
                .unwrap();
        assert_eq!(config.base_url, "https://ccu.local:2122");
        assert_eq!(config.language, Language::German);
        assert_eq!(config.timeout, 30);
        assert!(config.cache.dir.is_none());
    }
}
