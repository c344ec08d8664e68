use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error type for settings persistence
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// What gets indexed and where the index lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Index file name, relative to the workspace root
    #[serde(default = "default_index_file")]
    pub file_name: String,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Directory names pruned at any depth
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
    /// File-name globs
    #[serde(default = "default_exclude_files")]
    pub exclude_files: Vec<String>,
    #[serde(default = "default_true")]
    pub respect_gitignore: bool,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            file_name: default_index_file(),
            extensions: default_extensions(),
            exclude_dirs: default_exclude_dirs(),
            exclude_files: default_exclude_files(),
            respect_gitignore: true,
        }
    }
}

/// Candidate ranking knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverSettings {
    /// `<ns>.<word>` with no parameters counts as an exact match
    #[serde(default = "default_well_known_namespaces")]
    pub well_known_namespaces: Vec<String>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            well_known_namespaces: default_well_known_namespaces(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherSettings {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// Per-project settings stored in .scriptnav/settings.json
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProjectSettings {
    #[serde(default)]
    pub index: IndexSettings,
    #[serde(default)]
    pub resolver: ResolverSettings,
    #[serde(default)]
    pub watcher: WatcherSettings,
}

fn default_true() -> bool {
    true
}

fn default_index_file() -> String {
    "symbols.index".to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["js".to_string(), "ts".to_string()]
}

fn default_exclude_dirs() -> Vec<String> {
    [
        "node_modules",
        "temp",
        "build",
        "release",
        "Release",
        "debug",
        "Debug",
        "simulator",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_exclude_files() -> Vec<String> {
    ["*.d.ts", "*.min.js", "*.asm.js"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_well_known_namespaces() -> Vec<String> {
    vec!["ccsp".to_string()]
}

fn default_debounce_ms() -> u64 {
    300
}

/// Get the .scriptnav directory path for a project
pub fn get_settings_dir(project_path: &Path) -> PathBuf {
    project_path.join(".scriptnav")
}

/// Get the settings file path for a project
pub fn get_settings_path(project_path: &Path) -> PathBuf {
    get_settings_dir(project_path).join("settings.json")
}

/// Load project settings from disk
/// Returns `Ok(None)` when the project has no settings file
pub fn load_project_settings(
    project_path: &Path,
) -> Result<Option<ProjectSettings>, SettingsError> {
    let settings_path = get_settings_path(project_path);

    if !settings_path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&settings_path).map_err(|source| SettingsError::Io {
        path: settings_path.clone(),
        source,
    })?;

    Ok(Some(serde_json::from_str(&content)?))
}

/// Load project settings from disk, returning defaults if missing or unreadable
pub fn load_project_settings_or_default(project_path: &Path) -> ProjectSettings {
    match load_project_settings(project_path) {
        Ok(Some(settings)) => {
            debug!("[SETTINGS] Loaded {:?}", get_settings_path(project_path));
            settings
        }
        Ok(None) => ProjectSettings::default(),
        Err(e) => {
            warn!("[SETTINGS] {}, using defaults", e);
            ProjectSettings::default()
        }
    }
}

/// Save project settings to disk
pub fn save_project_settings(
    project_path: &Path,
    settings: &ProjectSettings,
) -> Result<(), SettingsError> {
    let dir = get_settings_dir(project_path);
    fs::create_dir_all(&dir).map_err(|source| SettingsError::Io {
        path: dir.clone(),
        source,
    })?;

    let settings_path = get_settings_path(project_path);
    let json = serde_json::to_string_pretty(settings)?;

    fs::write(&settings_path, json).map_err(|source| SettingsError::Io {
        path: settings_path.clone(),
        source,
    })?;

    info!("[SETTINGS] Saved settings to {:?}", settings_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_settings() {
        let settings = ProjectSettings::default();
        assert_eq!(settings.index.file_name, "symbols.index");
        assert_eq!(settings.index.extensions, vec!["js", "ts"]);
        assert!(settings.index.exclude_dirs.iter().any(|d| d == "node_modules"));
        assert!(settings.index.exclude_files.iter().any(|f| f == "*.d.ts"));
        assert!(settings.index.respect_gitignore);
        assert_eq!(settings.resolver.well_known_namespaces, vec!["ccsp"]);
        assert_eq!(settings.watcher.debounce_ms, 300);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = concat!(
            r#"{ "index": { "extensions": ["js"] }, "#,
            r#""resolver": { "well_known_namespaces": [] } }"#,
        );
        let settings: ProjectSettings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.index.extensions, vec!["js"]);
        assert_eq!(settings.index.file_name, "symbols.index");
        assert!(settings.resolver.well_known_namespaces.is_empty());
        assert_eq!(settings.watcher.debounce_ms, 300);
    }

    #[test]
    fn test_missing_settings_use_defaults() {
        let temp = tempdir().unwrap();

        assert!(load_project_settings(temp.path()).unwrap().is_none());
        assert_eq!(
            load_project_settings_or_default(temp.path()),
            ProjectSettings::default()
        );
    }

    #[test]
    fn test_broken_settings_fall_back() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(get_settings_dir(temp.path())).unwrap();
        fs::write(get_settings_path(temp.path()), "{ not json").unwrap();

        assert!(matches!(
            load_project_settings(temp.path()),
            Err(SettingsError::Json(_))
        ));
        assert_eq!(
            load_project_settings_or_default(temp.path()),
            ProjectSettings::default()
        );
    }

    #[test]
    fn test_save_and_load_settings() {
        let temp = tempdir().unwrap();
        let project_path = temp.path();

        let mut settings = ProjectSettings::default();
        settings.index.file_name = "nav.index".to_string();
        settings.watcher.debounce_ms = 50;

        save_project_settings(project_path, &settings).unwrap();

        let loaded = load_project_settings(project_path).unwrap().unwrap();
        assert_eq!(loaded, settings);
    }
}
