use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_STORE_URL: &str = "NODETREE_STORE_URL";
pub const ENV_DEBOUNCE_MS: &str = "NODETREE_DEBOUNCE_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub store_url: String,
    pub debounce_ms: u64,
    pub force_save: bool,
    /// Read the catalog from this file instead of `{store_url}/funcs`.
    pub catalog_path: Option<PathBuf>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            store_url: "http://localhost/api".to_string(),
            debounce_ms: 750,
            force_save: false,
            catalog_path: None,
        }
    }
}

impl SyncSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("nodetree").join("settings.json"))
}

/// Reads settings from `path`. A missing file means all defaults; keys
/// absent from the file keep their defaults.
pub fn load_settings(path: &Path) -> Result<SyncSettings, String> {
    if !path.exists() {
        return Ok(SyncSettings::default());
    }
    let json = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&json).map_err(|e| format!("Invalid settings in {}: {}", path.display(), e))
}

/// Settings from the default location, then environment overrides.
pub fn load_effective_settings(path: Option<&Path>) -> Result<SyncSettings, String> {
    let path = path.map(Path::to_path_buf).or_else(default_settings_path);
    let mut settings = match path {
        Some(path) => load_settings(&path)?,
        None => SyncSettings::default(),
    };
    let env: HashMap<String, String> = [ENV_STORE_URL, ENV_DEBOUNCE_MS]
        .iter()
        .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
        .collect();
    apply_overrides(&mut settings, &env)?;
    Ok(settings)
}

pub fn apply_overrides(settings: &mut SyncSettings, map: &HashMap<String, String>) -> Result<(), String> {
    for (key, value) in map {
        update_setting(settings, key, value)?;
    }
    Ok(())
}

/// Sets one field from its string form. Keys are the settings-file names or
/// the matching environment variable names.
pub fn update_setting(settings: &mut SyncSettings, key: &str, value: &str) -> Result<(), String> {
    match key {
        "store_url" | ENV_STORE_URL => settings.store_url = value.trim().to_string(),
        "debounce_ms" | ENV_DEBOUNCE_MS => {
            settings.debounce_ms = value
                .trim()
                .parse()
                .map_err(|_| format!("{} must be a whole number of milliseconds, got '{}'", key, value))?
        }
        "force_save" => settings.force_save = value == "true",
        "catalog_path" => {
            settings.catalog_path = (!value.is_empty()).then(|| PathBuf::from(value));
        }
        other => return Err(format!("Unknown setting '{}'", other)),
    }
    Ok(())
}
