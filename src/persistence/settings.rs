use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    // If None, use OS default data directory
    #[serde(default)]
    pub data_override: Option<PathBuf>,
    // If None, exports go to the OS temporary directory
    #[serde(default)]
    pub export_override: Option<PathBuf>,
    #[serde(default = "AppSettings::default_autosave_debounce_ms")]
    pub autosave_debounce_ms: u64,
    // 0 disables the periodic id rescan
    #[serde(default = "AppSettings::default_rescan_interval_secs")]
    pub rescan_interval_secs: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            data_override: None,
            export_override: None,
            autosave_debounce_ms: Self::default_autosave_debounce_ms(),
            rescan_interval_secs: Self::default_rescan_interval_secs(),
        }
    }
}

impl AppSettings {
    fn config_dir() -> PathBuf {
        // Cross-platform user config dir
        #[cfg(target_os = "macos")]
        {
            // ~/Library/Application Support/Dialogue-Builder
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join("Library").join("Application Support").join("Dialogue-Builder");
        }
        #[cfg(target_os = "windows")]
        {
            // %APPDATA%\Dialogue-Builder
            if let Ok(appdata) = std::env::var("APPDATA") {
                return PathBuf::from(appdata).join("Dialogue-Builder");
            }
            return PathBuf::from("Dialogue-Builder");
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            // $XDG_CONFIG_HOME/dialogue-builder or ~/.config/dialogue-builder
            if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
                return PathBuf::from(xdg).join("dialogue-builder");
            }
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join(".config").join("dialogue-builder");
        }
    }

    fn data_default_dir() -> PathBuf {
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join("Library").join("Application Support").join("Dialogue-Builder").join("Data");
        }
        #[cfg(target_os = "windows")]
        {
            // %LOCALAPPDATA%\Dialogue-Builder\Data else TEMP
            if let Ok(local) = std::env::var("LOCALAPPDATA") {
                return PathBuf::from(local).join("Dialogue-Builder").join("Data");
            }
            if let Ok(temp) = std::env::var("TEMP") {
                return PathBuf::from(temp).join("Dialogue-Builder");
            }
            return PathBuf::from("Dialogue-Builder");
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            // $XDG_DATA_HOME/dialogue-builder or ~/.local/share/dialogue-builder, else /tmp
            if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
                return PathBuf::from(xdg).join("dialogue-builder");
            }
            if let Ok(home) = std::env::var("HOME") {
                return PathBuf::from(home).join(".local").join("share").join("dialogue-builder");
            }
            return PathBuf::from("/tmp").join("dialogue-builder");
        }
    }

    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_dir().join("settings.json");
        if !path.exists() {
            return Ok(Self::default());
        }
        let mut f = fs::File::open(path)?;
        let mut s = String::new();
        f.read_to_string(&mut s)?;
        Ok(serde_json::from_str(&s)?)
    }

    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let dir = Self::config_dir();
        fs::create_dir_all(&dir)?;
        let path = dir.join("settings.json");
        let s = serde_json::to_string_pretty(self)?;
        let mut f = fs::File::create(&path)?;
        f.write_all(s.as_bytes())?;
        Ok(path)
    }

    /// Return the directory where the settings file (settings.json) is stored.
    pub fn settings_dir() -> PathBuf {
        Self::config_dir()
    }

    pub fn data_dir(&self) -> PathBuf {
        if let Some(p) = &self.data_override { return p.clone(); }
        Self::data_default_dir()
    }

    pub fn local_storage_path(&self) -> PathBuf { self.data_dir().join("local_storage.json") }
    pub fn database_path(&self) -> PathBuf { self.data_dir().join("npcs.json") }
    pub fn backup_dir(&self) -> PathBuf { self.data_dir().join("backups") }

    /// Default export directory when no override is set: OS temporary directory.
    /// Example: {temp_dir}/dialogue-builder/exports
    pub fn export_default_dir() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push("dialogue-builder");
        p.push("exports");
        p
    }

    pub fn export_dir(&self) -> PathBuf {
        if let Some(p) = &self.export_override { return p.clone(); }
        Self::export_default_dir()
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    pub fn rescan_interval(&self) -> Option<Duration> {
        if self.rescan_interval_secs == 0 { None } else { Some(Duration::from_secs(self.rescan_interval_secs)) }
    }

    pub(crate) fn default_autosave_debounce_ms() -> u64 { 1500 }
    pub(crate) fn default_rescan_interval_secs() -> u64 { 30 }
}
