//! Device and swapchain settings loaded from `prism.toml`.
//!
//! ```toml
//! [device]
//! application_name = "prism"
//! prefer_high_performance = true
//! enable_validation = false
//! frames_in_flight = 3              # 3 or 4
//! pipeline_layout_cache_capacity = 1024
//!
//! [swapchain]
//! vsync = true
//! image_count = 3
//! format = "bgra8_srgb"
//! ```
//!
//! Every key is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::command_queue::{MAX_RING_CAPACITY, MIN_RING_CAPACITY};
use crate::layout_cache::DEFAULT_LAYOUT_CACHE_CAPACITY;
use crate::types::{SwapChainDesc, TextureFormat};

pub const DEFAULT_CONFIG_PATH: &str = "prism.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    pub device: DeviceSettings,
    pub swapchain: SwapChainSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    pub application_name: String,
    /// Switch to a discrete adapter when one exists.
    pub prefer_high_performance: bool,
    /// Also enabled by the `validation` feature or `PRISM_VALIDATION=1`.
    pub enable_validation: bool,
    /// Capacity of the submission ring.
    pub frames_in_flight: usize,
    pub pipeline_layout_cache_capacity: usize,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            application_name: "prism".to_string(),
            prefer_high_performance: true,
            enable_validation: false,
            frames_in_flight: MIN_RING_CAPACITY,
            pipeline_layout_cache_capacity: DEFAULT_LAYOUT_CACHE_CAPACITY,
        }
    }
}

impl DeviceSettings {
    pub fn ring_capacity(&self) -> usize {
        let clamped = self.frames_in_flight.clamp(MIN_RING_CAPACITY, MAX_RING_CAPACITY);
        if clamped != self.frames_in_flight {
            log::warn!(
                "frames_in_flight = {} is outside {MIN_RING_CAPACITY}..={MAX_RING_CAPACITY}, using {clamped}",
                self.frames_in_flight
            );
        }
        clamped
    }

    pub fn layout_cache_capacity(&self) -> usize {
        if self.pipeline_layout_cache_capacity == 0 {
            log::warn!("pipeline_layout_cache_capacity = 0, using 1");
            return 1;
        }
        self.pipeline_layout_cache_capacity
    }

    /// Validation layers requested by this file, the cargo feature or the environment.
    pub fn validation_requested(&self) -> bool {
        self.enable_validation
            || cfg!(feature = "validation")
            || std::env::var("PRISM_VALIDATION").is_ok_and(|v| v == "1")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapChainSettings {
    pub vsync: bool,
    pub image_count: u32,
    pub format: TextureFormat,
}

impl Default for SwapChainSettings {
    fn default() -> Self {
        let desc = SwapChainDesc::default();
        Self {
            vsync: desc.vsync,
            image_count: desc.image_count,
            format: desc.format,
        }
    }
}

impl SwapChainSettings {
    pub fn to_desc(&self, width: u32, height: u32) -> SwapChainDesc {
        SwapChainDesc {
            width,
            height,
            format: self.format,
            vsync: self.vsync,
            image_count: self.image_count,
        }
    }
}

impl GpuConfig {
    /// Reads [`DEFAULT_CONFIG_PATH`]; a missing or broken file yields the defaults.
    pub fn load() -> Self {
        match Self::load_from_path(DEFAULT_CONFIG_PATH) {
            Ok(config) => config,
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("{DEFAULT_CONFIG_PATH} not found, using default GPU settings");
                Self::default()
            }
            Err(e) => {
                log::warn!("{DEFAULT_CONFIG_PATH}: {e}; using default GPU settings");
                Self::default()
            }
        }
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = GpuConfig::from_toml_str("").unwrap();
        assert_eq!(config, GpuConfig::default());
        assert_eq!(config.device.pipeline_layout_cache_capacity, 1024);
        assert_eq!(config.swapchain.format, TextureFormat::Bgra8Srgb);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = GpuConfig::from_toml_str(
            r#"
            [device]
            frames_in_flight = 4

            [swapchain]
            vsync = false
            format = "rgba8_unorm"
            "#,
        )
        .unwrap();
        assert_eq!(config.device.ring_capacity(), 4);
        assert!(config.device.prefer_high_performance);
        assert!(!config.swapchain.vsync);
        assert_eq!(config.swapchain.format, TextureFormat::Rgba8Unorm);
        assert_eq!(config.swapchain.image_count, 3);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let settings = DeviceSettings {
            frames_in_flight: 9,
            pipeline_layout_cache_capacity: 0,
            ..Default::default()
        };
        assert_eq!(settings.ring_capacity(), MAX_RING_CAPACITY);
        assert_eq!(settings.layout_cache_capacity(), 1);
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let err = GpuConfig::from_toml_str("[device\nvsync = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = GpuConfig::load_from_path("/nonexistent/prism.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn settings_produce_swapchain_desc() {
        let desc = SwapChainSettings::default().to_desc(800, 600);
        assert_eq!((desc.width, desc.height), (800, 600));
        assert!(desc.vsync);
    }
}
