use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_true(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "openspatial".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// GATT characteristic UUIDs of the OpenSpatial service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BleSettings {
    #[serde(default = "default_service_uuid")]
    pub service_uuid: String,
    #[serde(default = "default_pose6d_uuid")]
    pub pose6d_char_uuid: String,
    #[serde(default = "default_button_uuid")]
    pub button_char_uuid: String,
    #[serde(default = "default_motion6d_uuid")]
    pub motion6d_char_uuid: String,
    #[serde(default = "default_pointer_uuid")]
    pub pointer_char_uuid: String,
    #[serde(default = "default_gesture_uuid")]
    pub gesture_char_uuid: String,
    #[serde(default = "default_analog_uuid")]
    pub analog_char_uuid: String,
    #[serde(default = "default_data_uuid")]
    pub data_char_uuid: String,
    #[serde(default = "default_command_uuid")]
    pub command_char_uuid: String,
}

impl Default for BleSettings {
    fn default() -> Self {
        Self {
            service_uuid: default_service_uuid(),
            pose6d_char_uuid: default_pose6d_uuid(),
            button_char_uuid: default_button_uuid(),
            motion6d_char_uuid: default_motion6d_uuid(),
            pointer_char_uuid: default_pointer_uuid(),
            gesture_char_uuid: default_gesture_uuid(),
            analog_char_uuid: default_analog_uuid(),
            data_char_uuid: default_data_uuid(),
            command_char_uuid: default_command_uuid(),
        }
    }
}

fn default_service_uuid() -> String {
    "00000002-0000-1000-8000-a0e5e9000000".to_string()
}
fn default_pose6d_uuid() -> String {
    "00000205-0000-1000-8000-a0e5e9000000".to_string()
}
fn default_button_uuid() -> String {
    "00000206-0000-1000-8000-a0e5e9000000".to_string()
}
fn default_motion6d_uuid() -> String {
    "00000207-0000-1000-8000-a0e5e9000000".to_string()
}
fn default_pointer_uuid() -> String {
    "00000208-0000-1000-8000-a0e5e9000000".to_string()
}
fn default_gesture_uuid() -> String {
    "00000209-0000-1000-8000-a0e5e9000000".to_string()
}
fn default_analog_uuid() -> String {
    "0000020a-0000-1000-8000-a0e5e9000000".to_string()
}
fn default_data_uuid() -> String {
    "0000020b-0000-1000-8000-a0e5e9000000".to_string()
}
fn default_command_uuid() -> String {
    "0000020c-0000-1000-8000-a0e5e9000000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Logging Settings
    #[serde(default)]
    pub log_settings: LogSettings,

    // BLE Settings
    #[serde(default)]
    pub ble: BleSettings,

    /// Route every stream through enable/disable commands on the command
    /// characteristic, even types that have a dedicated characteristic
    #[serde(default = "default_false")]
    pub prefer_data_channel: bool,

    /// Turn on notifications for the data and command characteristics as soon
    /// as a device connects
    #[serde(default = "default_true")]
    pub enable_channels_on_connect: bool,

    // Debug Settings
    #[serde(default = "default_false")]
    pub debug_raw_data_logging: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_settings: LogSettings::default(),
            ble: BleSettings::default(),
            prefer_data_channel: false,
            enable_channels_on_connect: true,
            debug_raw_data_logging: false,
        }
    }
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    /// Load settings from the per-user config directory, falling back to defaults
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::from_path(settings_path))
    }

    /// Load settings from an explicit file, falling back to defaults
    pub fn from_path(settings_path: PathBuf) -> Self {
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!(
                    "Using default settings ({}: {})",
                    settings_path.display(),
                    e
                );
                Settings::default()
            }
        };

        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("OpenSpatial");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "prefer_data_channel": true, "ble": {} }"#).unwrap();
        assert!(settings.prefer_data_channel);
        assert!(settings.enable_channels_on_connect);
        assert_eq!(settings.ble, BleSettings::default());
        assert_eq!(settings.log_settings.level, "info");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("openspatial-missing-settings.json");
        let _ = fs::remove_file(&path);
        let service = SettingsService::from_path(path.clone());
        assert_eq!(service.path(), path.as_path());
        assert!(!service.get().debug_raw_data_logging);
    }

    #[test]
    fn test_save_and_reload() {
        let path = std::env::temp_dir().join(format!(
            "openspatial-settings-{}.json",
            std::process::id()
        ));
        let mut service = SettingsService::from_path(path.clone());
        service.get_mut().debug_raw_data_logging = true;
        service.save().unwrap();

        let reloaded = SettingsService::from_path(path.clone());
        assert!(reloaded.get().debug_raw_data_logging);
        let _ = fs::remove_file(&path);
    }
}
