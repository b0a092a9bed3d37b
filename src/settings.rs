use std::fs;
use std::io;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SETTINGS_PATH: &str = "render_settings.json";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings file: {0}")]
    Io(#[from] io::Error),
    #[error("invalid settings JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Edge length of every shadow map (2D and cube faces).
    #[serde(default = "RenderSettings::default_shadow_map_size")]
    pub shadow_map_size: u32,
    /// Gaussian passes across the ping-pong pair.
    #[serde(default = "RenderSettings::default_blur_passes")]
    pub blur_passes: u32,
    /// Output resolution multiplier applied by `prepare`.
    #[serde(default = "RenderSettings::default_supersample")]
    pub supersample: u32,
    #[serde(default = "RenderSettings::default_true")]
    pub hdr: bool,
    #[serde(default = "RenderSettings::default_true")]
    pub bloom: bool,
    #[serde(default = "RenderSettings::default_clear_color")]
    pub clear_color: [f32; 4],
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            shadow_map_size: Self::default_shadow_map_size(),
            blur_passes: Self::default_blur_passes(),
            supersample: Self::default_supersample(),
            hdr: true,
            bloom: true,
            clear_color: Self::default_clear_color(),
        }
    }
}

impl RenderSettings {
    pub fn load() -> Self {
        Self::load_from_path(DEFAULT_SETTINGS_PATH)
    }

    /// Settings from `path`, or the defaults when it is missing or invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::read(path) {
            Ok(settings) => {
                info!("Render settings loaded from {}", path.display());
                settings.validate()
            }
            Err(SettingsError::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                info!("No render settings at {}, using defaults", path.display());
                Self::default()
            }
            Err(err) => {
                warn!("{}: {}; using default render settings", path.display(), err);
                Self::default()
            }
        }
    }

    /// Parses `path` without validating or falling back.
    pub fn read(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn validate(mut self) -> Self {
        if self.shadow_map_size == 0 {
            warn!("shadow_map_size of 0 replaced by {}", Self::default_shadow_map_size());
            self.shadow_map_size = Self::default_shadow_map_size();
        }

        if self.supersample == 0 {
            warn!("supersample of 0 replaced by {}", Self::default_supersample());
            self.supersample = Self::default_supersample();
        }

        if self.blur_passes % 2 == 1 {
            info!(
                "Odd blur pass count ({}); the final result lands in the horizontal buffer.",
                self.blur_passes
            );
        }

        self
    }

    const fn default_shadow_map_size() -> u32 {
        1024
    }

    const fn default_blur_passes() -> u32 {
        10
    }

    const fn default_supersample() -> u32 {
        2
    }

    const fn default_true() -> bool {
        true
    }

    const fn default_clear_color() -> [f32; 4] {
        [0.0, 0.0, 0.0, 1.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sizes_are_replaced() {
        let validated = RenderSettings {
            shadow_map_size: 0,
            supersample: 0,
            ..RenderSettings::default()
        }
        .validate();

        assert_eq!(validated.shadow_map_size, 1024);
        assert_eq!(validated.supersample, 2);
    }

    #[test]
    fn explicit_values_survive_validation() {
        let valid = RenderSettings {
            shadow_map_size: 512,
            blur_passes: 4,
            supersample: 1,
            hdr: false,
            bloom: false,
            clear_color: [0.1, 0.2, 0.3, 1.0],
        };

        assert_eq!(valid.clone().validate(), valid);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let settings: RenderSettings = serde_json::from_str(r#"{ "blur_passes": 6 }"#).unwrap();
        assert_eq!(settings.blur_passes, 6);
        assert_eq!(settings.shadow_map_size, 1024);
        assert_eq!(settings.supersample, 2);
        assert!(settings.hdr && settings.bloom);
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("wgpu_deferred_missing_settings.json");
        let _ = std::fs::remove_file(&path);
        assert_eq!(RenderSettings::load_from_path(&path), RenderSettings::default());

        let broken = std::env::temp_dir().join("wgpu_deferred_broken_settings.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(RenderSettings::read(&broken), Err(SettingsError::Parse(_))));
        assert_eq!(RenderSettings::load_from_path(&broken), RenderSettings::default());
        let _ = std::fs::remove_file(&broken);
    }
}
