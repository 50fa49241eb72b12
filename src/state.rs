use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::remote::Remote;

/// A client's persisted tunnel record. The structured form is stored, not
/// the rendered strings, so assigned ephemeral ports survive restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecord {
    pub name: String,
    #[serde(default)]
    pub tunnels: Vec<Remote>,
}

/// Directory where client records are stored, one TOML file per client.
pub fn default_dir() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .context("cannot determine home directory")?
        .join(".burrow")
        .join("clients"))
}

fn record_path(dir: &Path, client: &str) -> Result<PathBuf> {
    validate_name(client)?;
    Ok(dir.join(format!("{}.toml", client)))
}

/// Client names become file names, so they must not smuggle in path parts.
fn validate_name(client: &str) -> Result<()> {
    if client.is_empty()
        || client
            .chars()
            .any(|c| !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '.'))
        || client.starts_with('.')
    {
        bail!("invalid client name '{}'", client);
    }
    Ok(())
}

pub fn load(dir: &Path, client: &str) -> Result<Option<ClientRecord>> {
    let path = record_path(dir, client)?;
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let record = toml::from_str(&content)
        .with_context(|| format!("malformed client record {}", path.display()))?;
    Ok(Some(record))
}

pub fn save(dir: &Path, record: &ClientRecord) -> Result<()> {
    let path = record_path(dir, &record.name)?;
    fs::create_dir_all(dir)?;
    let content = toml::to_string_pretty(record).context("failed to serialize client record")?;
    fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn remove(dir: &Path, client: &str) -> Result<bool> {
    let path = record_path(dir, client)?;
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(&path).with_context(|| format!("failed to remove {}", path.display()))?;
    Ok(true)
}

/// Names of all clients with a stored record, sorted.
pub fn list(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return Ok(names),
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "toml") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
