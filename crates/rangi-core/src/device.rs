//! Compute device classification for inference placement.
//!
//! Device detection is a pure classification of the runtime environment into
//! an enumerated device kind. It runs once at orchestrator construction and
//! the result is cached for the process lifetime; no handles are opened here.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Cuda,
    Metal,
    Cpu,
}

impl DeviceKind {
    pub fn is_cpu(&self) -> bool {
        matches!(self, DeviceKind::Cpu)
    }

    pub fn is_metal(&self) -> bool {
        matches!(self, DeviceKind::Metal)
    }

    pub fn is_cuda(&self) -> bool {
        matches!(self, DeviceKind::Cuda)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Cuda => "cuda",
            DeviceKind::Metal => "metal",
            DeviceKind::Cpu => "cpu",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute precision used for inference math.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    F32,
    F16,
    BF16,
}

/// Device capabilities and optimization hints.
#[derive(Debug, Clone, Default)]
pub struct DeviceCapabilities {
    /// Whether the device prefers float32 (Metal on Apple Silicon).
    pub prefers_f32: bool,
    /// Whether the device supports bfloat16.
    pub supports_bf16: bool,
    /// Whether the device has unified memory (Apple Silicon).
    pub has_unified_memory: bool,
}

#[derive(Debug, Clone)]
pub struct DeviceProfile {
    pub kind: DeviceKind,
    pub capabilities: DeviceCapabilities,
}

impl DeviceProfile {
    pub fn cpu() -> Self {
        Self {
            kind: DeviceKind::Cpu,
            capabilities: DeviceCapabilities::default(),
        }
    }

    /// Select the compute precision for this device.
    ///
    /// CPU always runs F32. Metal on Apple Silicon runs F32 even when a
    /// half precision is requested. CUDA honors BF16 when the device
    /// supports it and F16 otherwise.
    pub fn select_precision(&self, requested: Option<&str>) -> Precision {
        let precision = match requested.unwrap_or("") {
            "bfloat16" | "bf16" => match self.kind {
                DeviceKind::Cpu => Precision::F32,
                DeviceKind::Metal => {
                    debug!("Metal device: using F32 instead of BF16");
                    Precision::F32
                }
                DeviceKind::Cuda => {
                    if self.capabilities.supports_bf16 {
                        Precision::BF16
                    } else {
                        Precision::F32
                    }
                }
            },
            "float16" | "f16" => match self.kind {
                DeviceKind::Cpu => Precision::F32,
                DeviceKind::Metal => {
                    debug!("Metal device: using F32 instead of F16");
                    Precision::F32
                }
                DeviceKind::Cuda => Precision::F16,
            },
            "float32" | "f32" => Precision::F32,
            _ => match self.kind {
                DeviceKind::Cpu | DeviceKind::Metal => Precision::F32,
                DeviceKind::Cuda => {
                    if self.capabilities.supports_bf16 {
                        Precision::BF16
                    } else {
                        Precision::F32
                    }
                }
            },
        };

        debug!(
            "Selected precision {:?} for device {} (requested: {:?})",
            precision, self.kind, requested
        );

        precision
    }

    /// The precision this device runs best at, without a specific request.
    pub fn optimal_precision(&self) -> Precision {
        self.select_precision(None)
    }

    pub fn has_unified_memory(&self) -> bool {
        self.capabilities.has_unified_memory
    }
}

pub struct DeviceSelector;

impl DeviceSelector {
    fn try_metal() -> Option<DeviceProfile> {
        if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
            Some(DeviceProfile {
                kind: DeviceKind::Metal,
                capabilities: DeviceCapabilities {
                    prefers_f32: true,
                    supports_bf16: false,
                    has_unified_memory: true,
                },
            })
        } else {
            None
        }
    }

    fn try_cuda() -> Option<DeviceProfile> {
        let visible = std::env::var("CUDA_VISIBLE_DEVICES")
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false);
        if visible || Path::new("/dev/nvidia0").exists() {
            Some(DeviceProfile {
                kind: DeviceKind::Cuda,
                capabilities: DeviceCapabilities {
                    prefers_f32: false,
                    // Ampere and later; older devices fall back via select_precision
                    supports_bf16: true,
                    has_unified_memory: false,
                },
            })
        } else {
            None
        }
    }

    /// Classify the best available device.
    pub fn detect() -> DeviceProfile {
        if cfg!(target_os = "macos") {
            if let Some(profile) = Self::try_metal() {
                info!(
                    "Using Metal device for inference (unified memory: {})",
                    profile.has_unified_memory()
                );
                return profile;
            }
        } else if let Some(profile) = Self::try_cuda() {
            info!("Using CUDA device for inference");
            return profile;
        }

        info!("Falling back to CPU for inference");
        DeviceProfile::cpu()
    }

    /// Classify with a caller preference, degrading gracefully when the
    /// preferred device is unavailable.
    pub fn detect_with_preference(preference: Option<&str>) -> DeviceProfile {
        match preference.unwrap_or("") {
            "cuda" => Self::try_cuda().unwrap_or_else(Self::detect),
            "metal" | "mps" => Self::try_metal().unwrap_or_else(Self::detect),
            "cpu" => DeviceProfile::cpu(),
            _ => Self::detect(),
        }
    }
}
