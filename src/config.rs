//! Configuration management for hmip
//!
//! Supports:
//! - TOML config file at XDG locations
//! - Environment variable overrides
//! - Command-line argument overrides

use std::env;
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File, FileFormat};
use env_logger::fmt::WriteStyle;
use hmip::cache;
use hmip::{Ccu, Configuration, Language};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::cli::{GlobalOpts, LanguageArg, OutputFormat};

const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// Runtime context containing resolved configuration
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    pub global: GlobalOpts,
    pub config: AppConfig,
    config_path: PathBuf,
}

impl RuntimeContext {
    pub fn new(global: &GlobalOpts) -> Result<Self> {
        let config_path = resolve_config_path(global.config.as_ref())?;
        let config = load_config(&config_path, global)?;

        Ok(Self {
            global: global.clone(),
            config,
            config_path,
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn init_logging(&self) -> Result<()> {
        if self.global.quiet {
            log::set_max_level(LevelFilter::Off);
            return Ok(());
        }

        let mut builder = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(&self.config.logging.level),
        );

        if let Some(level) = self.explicit_log_level() {
            builder.filter_level(level);
        }

        let force_color = env::var_os("FORCE_COLOR").is_some();
        let disable_color = self.global.no_color
            || env::var_os("NO_COLOR").is_some()
            || (!force_color && !std::io::stderr().is_terminal());

        if disable_color {
            builder.write_style(WriteStyle::Never);
        } else if force_color {
            builder.write_style(WriteStyle::Always);
        } else {
            builder.write_style(WriteStyle::Auto);
        }

        builder.try_init().or_else(|err| {
            if self.global.verbose > 0 {
                eprintln!("logger already initialized: {err}");
            }
            Ok(())
        })
    }

    /// Level requested on the command line, if any. Without one the
    /// configured `logging.level` (or `RUST_LOG`) applies.
    fn explicit_log_level(&self) -> Option<LevelFilter> {
        if self.global.trace {
            Some(LevelFilter::Trace)
        } else if self.global.debug {
            Some(LevelFilter::Debug)
        } else {
            match self.global.verbose {
                0 => None,
                1 => Some(LevelFilter::Info),
                2 => Some(LevelFilter::Debug),
                _ => Some(LevelFilter::Trace),
            }
        }
    }

    /// Session settings after applying command-line overrides
    pub fn session_config(&self) -> Result<Configuration> {
        let mut session = self.config.ccu.clone();
        let global = &self.global;

        if let Some(url) = &global.url {
            session.base_url = url.clone();
        }
        if let Some(username) = &global.username {
            session.username = Some(username.clone());
        }
        if let Some(password) = &global.password {
            session.password = Some(password.clone());
        }
        if let Some(timeout) = global.timeout {
            session.timeout = timeout;
        }
        if global.insecure {
            session.insecure = true;
        }
        if let Some(language) = global.language {
            session.language = match language {
                LanguageArg::En => Language::English,
                LanguageArg::De => Language::German,
            };
        }
        if global.no_cache {
            session.cache.enabled = false;
        }
        if let Some(dir) = &session.cache.dir {
            session.cache.dir = Some(expand_path(dir)?);
        }

        Ok(session)
    }

    /// Open a session against the configured CCU
    pub fn connect(&self) -> Result<Ccu> {
        let session = self.session_config()?;
        log::debug!("Connecting to {}", session.base_url);
        Ccu::new(session).context("opening CCU session")
    }

    /// Directory holding the persisted cache pools
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.config.ccu.cache.dir {
            Some(dir) => expand_path(dir),
            None => Ok(cache::cache_dir()?),
        }
    }

    /// Get the effective output format
    pub fn output_format(&self) -> OutputFormat {
        if self.global.json {
            return OutputFormat::Json;
        }
        self.global
            .output_format
            .unwrap_or(match self.config.output.format.as_str() {
                "json" => OutputFormat::Json,
                "yaml" => OutputFormat::Yaml,
                "table" => OutputFormat::Table,
                _ => OutputFormat::Auto,
            })
    }
}

/// Application configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ccu: Configuration,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: String,
    pub no_headers: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "auto".to_string(),
            no_headers: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

fn resolve_config_path(override_path: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        let expanded = expand_path(path)?;
        if expanded.is_dir() {
            return Ok(expanded.join("config.toml"));
        }
        return Ok(expanded);
    }

    Ok(default_config_dir()?.join("config.toml"))
}

fn load_config(config_path: &Path, global: &GlobalOpts) -> Result<AppConfig> {
    // Create default config if it doesn't exist
    if !config_path.exists() {
        write_default_config(config_path)?;
    }

    let defaults = Configuration::default();
    let config = Config::builder()
        .set_default("ccu.base_url", defaults.base_url)?
        .set_default("ccu.timeout", 30_i64)?
        .set_default("ccu.insecure", defaults.insecure)?
        .set_default("ccu.language", "en")?
        .set_default("ccu.cache.enabled", defaults.cache.enabled)?
        .set_default("output.format", "auto")?
        .set_default("output.no_headers", false)?
        .set_default("logging.level", "warn")?
        .add_source(
            File::from(config_path)
                .format(FileFormat::Toml)
                .required(false),
        )
        // HMIP__SECTION__KEY overrides, e.g. HMIP__CCU__TIMEOUT=10
        .add_source(
            Environment::with_prefix("HMIP")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    let mut app_config: AppConfig = config
        .try_deserialize()
        .with_context(|| format!("parsing config {}", config_path.display()))?;

    if global.no_headers {
        app_config.output.no_headers = true;
    }

    Ok(app_config)
}

pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }

    let config = AppConfig::default();
    let toml = toml::to_string_pretty(&config).context("serializing default config")?;

    let content = format!(
        "# hmip configuration\n\
        # File: {}\n\
        #\n\
        # Environment variables:\n\
        #   HMIP_URL      - CCU REST base URL\n\
        #   HMIP_USERNAME - HTTP basic auth user\n\
        #   HMIP_PASSWORD - HTTP basic auth password\n\
        #   HMIP__*       - Override any config value (e.g., HMIP__LOGGING__LEVEL=debug)\n\
        \n\
        {toml}",
        path.display()
    );

    fs::write(path, content).with_context(|| format!("writing config to {}", path.display()))
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    if let Some(text) = path.to_str() {
        let expanded = shellexpand::full(text).context("expanding path")?;
        Ok(PathBuf::from(expanded.to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn default_config_dir() -> Result<PathBuf> {
    // Check XDG_CONFIG_HOME first
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(mut dir) = dirs::config_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}
