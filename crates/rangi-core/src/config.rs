//! Configuration types for the rangi engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding model weights for weight-backed loaders.
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Directory where generated images are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Home directory of the colorization library. The orchestrator switches
    /// the process working directory here for the duration of each call.
    #[serde(default = "default_colorizer_home")]
    pub colorizer_home: PathBuf,

    /// Name of the directory, relative to `colorizer_home`, where the
    /// colorization library drops its results.
    #[serde(default = "default_colorizer_results_dir")]
    pub colorizer_results_dir: String,

    /// Device preference: "cuda", "metal"/"mps" or "cpu". Unset picks the
    /// best available device.
    #[serde(default)]
    pub device_preference: Option<String>,

    /// Requested compute precision ("f32", "f16", "bf16"). The selected
    /// device may override this, see `DeviceProfile::select_precision`.
    #[serde(default)]
    pub precision: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            output_dir: default_output_dir(),
            colorizer_home: default_colorizer_home(),
            colorizer_results_dir: default_colorizer_results_dir(),
            device_preference: None,
            precision: None,
        }
    }
}

fn default_models_dir() -> PathBuf {
    if let Ok(from_env) = std::env::var("RANGI_MODELS_DIR") {
        let trimmed = from_env.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rangi")
        .join("models")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("generated_images")
}

fn default_colorizer_home() -> PathBuf {
    PathBuf::from("colorizer_workspace")
}

fn default_colorizer_results_dir() -> String {
    "result_images".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.output_dir, PathBuf::from("generated_images"));
        assert_eq!(config.colorizer_results_dir, "result_images");
        assert!(config.device_preference.is_none());
    }

    #[test]
    fn explicit_fields_override_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"output_dir": "out", "device_preference": "cpu"}"#).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.device_preference.as_deref(), Some("cpu"));
        assert_eq!(config.colorizer_home, PathBuf::from("colorizer_workspace"));
    }
}
