use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

fn config_path() -> Result<PathBuf> {
    let dir = dirs::home_dir()
        .context("cannot determine home directory")?
        .join(".burrow");
    fs::create_dir_all(&dir)?;
    Ok(dir.join("config.toml"))
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell for completions (bash, zsh, fish)
    pub shell: Option<String>,
    /// Editor for `burrow config` (overrides $VISUAL/$EDITOR)
    pub editor: Option<String>,
    /// Directory for client records (defaults to ~/.burrow/clients)
    pub state_dir: Option<String>,
    /// Lowest port handed out for unspecified local endpoints
    /// (0 = let the OS pick an ephemeral port)
    pub port_min: u16,
    /// Highest port handed out for unspecified local endpoints
    pub port_max: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: None,
            editor: None,
            state_dir: None,
            port_min: 0,
            port_max: 0,
        }
    }
}

impl Config {
    /// Load config from ~/.burrow/config.toml, falling back to defaults.
    pub fn load() -> Self {
        let path = match config_path() {
            Ok(p) => p,
            Err(_) => return Self::default(),
        };
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Resolve the client-record directory: config > default.
    pub fn state_dir(&self) -> Result<PathBuf> {
        match &self.state_dir {
            Some(dir) => Ok(PathBuf::from(dir)),
            None => crate::state::default_dir(),
        }
    }

    /// Resolve which editor to use: config > $VISUAL > $EDITOR > vi
    pub fn resolve_editor(&self) -> String {
        if let Some(ref e) = self.editor {
            return e.clone();
        }
        std::env::var("VISUAL")
            .or_else(|_| std::env::var("EDITOR"))
            .unwrap_or_else(|_| "vi".to_string())
    }

    /// Write a default config file if none exists. Returns the path.
    pub fn init() -> Result<PathBuf> {
        let path = config_path()?;
        if path.exists() {
            return Ok(path);
        }
        let default = Self::default();
        let content =
            toml::to_string_pretty(&default).context("failed to serialize default config")?;
        fs::write(&path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}
