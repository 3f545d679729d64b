//! User configuration and on-disk locations.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tell_core::{PromptSettings, StoreOptions};

const APP_DIR: &str = "tell-llm";
const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub anthropic_api_key: String,
    #[serde(default = "default_model")]
    pub llm_model: String,
    #[serde(default = "default_preferred_commands")]
    pub preferred_commands: Vec<String>,
    #[serde(default = "default_extra_instructions")]
    pub extra_instructions: Vec<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Overrides the default history database location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_preferred_commands() -> Vec<String> {
    ["rg", "fd", "find", "grep", "awk", "sed"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_extra_instructions() -> Vec<String> {
    vec![
        "Prefer using modern alternatives like ripgrep (rg) instead of grep when available".to_string(),
        "For Python projects, recommend using uv for package management".to_string(),
    ]
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            anthropic_api_key: String::new(),
            llm_model: default_model(),
            preferred_commands: default_preferred_commands(),
            extra_instructions: default_extra_instructions(),
            max_tokens: default_max_tokens(),
            db_path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Config {
    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config file {}", path.display()))?;
        // An empty file is valid YAML for "all defaults"
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("could not parse config file {}", path.display()))?;
        tracing::debug!(
            target: "tell::config",
            "Loaded configuration from {} (model: {}, preferred commands: {})",
            path.display(),
            config.llm_model,
            config.preferred_commands.len()
        );
        Ok(config)
    }

    /// Load config from the default location or fall back to defaults.
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        if path.exists() {
            return Self::load_from(&path);
        }
        tracing::info!(target: "tell::config", "Config file not found at {}, using defaults", path.display());
        Ok(Config::default())
    }

    /// Write the config as YAML, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("could not create {}", parent.display()))?;
        }
        let yaml = serde_yaml::to_string(self).context("could not serialize config")?;
        std::fs::write(path, yaml)
            .with_context(|| format!("could not write config file {}", path.display()))?;
        tracing::info!(target: "tell::config", "Saved configuration to {}", path.display());
        Ok(())
    }

    /// Write the default config, refusing to clobber an existing file.
    pub fn init_at(path: &Path) -> Result<()> {
        if path.exists() {
            bail!("config file already exists at {}", path.display());
        }
        Config::default().save_to(path)
    }

    /// API key from the config file, falling back to the environment.
    pub fn api_key(&self) -> String {
        self.api_key_with_env(std::env::var(API_KEY_ENV).ok())
    }

    fn api_key_with_env(&self, env_value: Option<String>) -> String {
        if !self.anthropic_api_key.trim().is_empty() {
            return self.anthropic_api_key.clone();
        }
        env_value.unwrap_or_default()
    }

    pub fn prompt_settings(&self, shell: Option<String>) -> PromptSettings {
        PromptSettings {
            preferred_commands: self.preferred_commands.clone(),
            extra_instructions: self.extra_instructions.clone(),
            shell,
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: std::time::Duration::from_millis(self.busy_timeout_ms),
        }
    }

    /// History database path: explicit setting or the XDG data location.
    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => default_db_path(),
        }
    }
}

// Mask the API key wherever the config is printed
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("anthropic_api_key", &mask_key(&self.anthropic_api_key))
            .field("llm_model", &self.llm_model)
            .field("preferred_commands", &self.preferred_commands)
            .field("extra_instructions", &self.extra_instructions)
            .field("max_tokens", &self.max_tokens)
            .field("db_path", &self.db_path)
            .field("busy_timeout_ms", &self.busy_timeout_ms)
            .finish()
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Anthropic API Key: {}", mask_key(&self.anthropic_api_key))?;
        writeln!(f, "  LLM Model: {}", self.llm_model)?;
        writeln!(f, "  Max Tokens: {}", self.max_tokens)?;
        if let Some(path) = &self.db_path {
            writeln!(f, "  Database: {}", path.display())?;
        }
        writeln!(f, "  Preferred Commands:")?;
        for cmd in &self.preferred_commands {
            writeln!(f, "    - {}", cmd)?;
        }
        writeln!(f, "  Extra Instructions:")?;
        for instr in &self.extra_instructions {
            writeln!(f, "    - {}", instr)?;
        }
        Ok(())
    }
}

/// Show only the first and last few characters of a secret.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    match chars.len() {
        0 => "(not set)".to_string(),
        n if n <= 8 => "****".to_string(),
        n => format!(
            "{}...{}",
            chars[..4].iter().collect::<String>(),
            chars[n - 4..].iter().collect::<String>()
        ),
    }
}

/// `$XDG_CONFIG_HOME/tell-llm/tell.yaml`, falling back to `~/.config`.
pub fn config_path() -> Result<PathBuf> {
    Ok(xdg_dir("XDG_CONFIG_HOME", ".config")?
        .join(APP_DIR)
        .join("tell.yaml"))
}

/// `$XDG_DATA_HOME/tell-llm/tell.db`, falling back to `~/.local/share`.
pub fn default_db_path() -> Result<PathBuf> {
    Ok(xdg_dir("XDG_DATA_HOME", ".local/share")?
        .join(APP_DIR)
        .join("tell.db"))
}

fn xdg_dir(var: &str, home_fallback: &str) -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(var).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("could not determine home directory")?;
    Ok(home.join(home_fallback))
}
