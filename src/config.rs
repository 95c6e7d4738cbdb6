use crate::orientation::Facing;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SnapcamConfig {
    pub camera: CameraConfig,
    pub capture: CaptureConfig,
    pub touch: TouchConfig,
    pub overlay: OverlayConfig,
    pub recording: RecordingConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Sensor facing selected at startup ("back" or "front")
    #[serde(default = "default_facing")]
    pub facing: Facing,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// JPEG quality (0-100) used when a capture request carries none
    #[serde(default = "default_capture_quality")]
    pub quality: u8,

    /// Deliver captures as files in cache_dir instead of in-memory bytes
    #[serde(default = "default_store_to_file")]
    pub store_to_file: bool,

    /// Keep embedded orientation metadata and rotate pixels to match
    #[serde(default = "default_disable_exif_header_stripping")]
    pub disable_exif_header_stripping: bool,

    /// Directory for file-delivered captures
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TouchConfig {
    /// Single tap triggers a still capture
    #[serde(default = "default_tap_to_capture")]
    pub tap_to_capture: bool,

    /// Single tap runs autofocus at the tapped point
    #[serde(default = "default_tap_to_focus")]
    pub tap_to_focus: bool,

    /// Single-finger drag repositions the preview overlay
    #[serde(default = "default_drag_enabled")]
    pub drag_enabled: bool,

    /// Two-finger pinch steps the sensor zoom
    #[serde(default = "default_enable_zoom")]
    pub enable_zoom: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OverlayConfig {
    /// Allow runtime opacity changes on the preview overlay
    #[serde(default = "default_enable_opacity")]
    pub enable_opacity: bool,

    /// Initial overlay opacity (0.0-1.0)
    #[serde(default = "default_opacity")]
    pub opacity: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RecordingConfig {
    /// Record with the plain camcorder source and default encoder
    /// instead of the voice-recognition-tuned source
    #[serde(default = "default_disable_audio")]
    pub disable_audio: bool,

    /// Upper bound on clip length in seconds (0 = unlimited)
    #[serde(default = "default_max_duration_seconds")]
    pub max_duration_seconds: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl SnapcamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("snapcam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            // Start with default values
            .set_default("camera.facing", "back")?
            .set_default("capture.quality", default_capture_quality() as i64)?
            .set_default("capture.store_to_file", default_store_to_file())?
            .set_default(
                "capture.disable_exif_header_stripping",
                default_disable_exif_header_stripping(),
            )?
            .set_default("capture.cache_dir", default_cache_dir())?
            .set_default("touch.tap_to_capture", default_tap_to_capture())?
            .set_default("touch.tap_to_focus", default_tap_to_focus())?
            .set_default("touch.drag_enabled", default_drag_enabled())?
            .set_default("touch.enable_zoom", default_enable_zoom())?
            .set_default("overlay.enable_opacity", default_enable_opacity())?
            .set_default("overlay.opacity", default_opacity() as f64)?
            .set_default("recording.disable_audio", default_disable_audio())?
            .set_default(
                "recording.max_duration_seconds",
                default_max_duration_seconds(),
            )?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with SNAPCAM_ prefix
            .add_source(Environment::with_prefix("SNAPCAM").separator("_"))
            .build()?;

        let config: SnapcamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.quality > 100 {
            return Err(ConfigError::Message(
                "Capture quality must be between 0 and 100".to_string(),
            ));
        }

        if self.capture.cache_dir.is_empty() {
            return Err(ConfigError::Message(
                "Capture cache_dir must not be empty".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.overlay.opacity) {
            return Err(ConfigError::Message(
                "Overlay opacity must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for SnapcamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            capture: CaptureConfig::default(),
            touch: TouchConfig::default(),
            overlay: OverlayConfig::default(),
            recording: RecordingConfig::default(),
            system: SystemConfig::default(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            facing: default_facing(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            quality: default_capture_quality(),
            store_to_file: default_store_to_file(),
            disable_exif_header_stripping: default_disable_exif_header_stripping(),
            cache_dir: default_cache_dir(),
        }
    }
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            tap_to_capture: default_tap_to_capture(),
            tap_to_focus: default_tap_to_focus(),
            drag_enabled: default_drag_enabled(),
            enable_zoom: default_enable_zoom(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enable_opacity: default_enable_opacity(),
            opacity: default_opacity(),
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            disable_audio: default_disable_audio(),
            max_duration_seconds: default_max_duration_seconds(),
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            event_bus_capacity: default_event_bus_capacity(),
        }
    }
}

// Default value functions
fn default_facing() -> Facing {
    Facing::Back
}

fn default_capture_quality() -> u8 {
    85
}
fn default_store_to_file() -> bool {
    false
}
fn default_disable_exif_header_stripping() -> bool {
    false
}
fn default_cache_dir() -> String {
    "./captures".to_string()
}

fn default_tap_to_capture() -> bool {
    false
}
fn default_tap_to_focus() -> bool {
    false
}
fn default_drag_enabled() -> bool {
    false
}
fn default_enable_zoom() -> bool {
    false
}

fn default_enable_opacity() -> bool {
    false
}
fn default_opacity() -> f32 {
    1.0
}

fn default_disable_audio() -> bool {
    false
}
fn default_max_duration_seconds() -> u32 {
    0
}

fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SnapcamConfig::default();

        assert_eq!(config.camera.facing, Facing::Back);
        assert_eq!(config.capture.quality, 85);
        assert!(!config.capture.store_to_file);
        assert!(!config.touch.tap_to_capture);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SnapcamConfig::default();

        config.capture.quality = 101;
        assert!(config.validate().is_err());
        config.capture.quality = 85;
        assert!(config.validate().is_ok());

        config.overlay.opacity = 1.5;
        assert!(config.validate().is_err());
        config.overlay.opacity = 0.4;
        assert!(config.validate().is_ok());

        config.system.event_bus_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = SnapcamConfig::load_from_file("does-not-exist.toml")
            .expect("defaults should apply when the file is absent");

        assert_eq!(config.capture.quality, default_capture_quality());
        assert_eq!(config.capture.cache_dir, default_cache_dir());
        assert!(!config.recording.disable_audio);
    }

    #[test]
    fn test_partial_file_overrides_defaults() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "[camera]\nfacing = \"front\"\n\n[capture]\nquality = 92").unwrap();

        let config = SnapcamConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.camera.facing, Facing::Front);
        assert_eq!(config.capture.quality, 92);
        // Untouched sections keep their defaults
        assert_eq!(config.capture.cache_dir, default_cache_dir());
        assert!(!config.touch.drag_enabled);
    }
}
