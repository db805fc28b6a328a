//! Model identity and the loading seam consumed by the orchestrators.

mod cache;

pub use cache::ModelCache;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::device::DeviceProfile;
use crate::error::{Error, Result};

/// The two inference tasks the engine serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTask {
    Generation,
    Colorization,
}

impl ModelTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTask::Generation => "generation",
            ModelTask::Colorization => "colorization",
        }
    }
}

impl fmt::Display for ModelTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Colorization model variants, trading vividness for realism.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorizerVariant {
    #[default]
    Artistic,
    Stable,
}

impl ColorizerVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorizerVariant::Artistic => "artistic",
            ColorizerVariant::Stable => "stable",
        }
    }
}

impl fmt::Display for ColorizerVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorizerVariant {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "artistic" => Ok(ColorizerVariant::Artistic),
            "stable" => Ok(ColorizerVariant::Stable),
            other => Err(Error::InvalidRequest(format!(
                "unknown colorizer variant: {other}"
            ))),
        }
    }
}

/// Cache key: one loaded handle per (task, variant) per process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub task: ModelTask,
    pub variant: String,
}

impl ModelKey {
    pub fn new(task: ModelTask, variant: impl Into<String>) -> Self {
        Self {
            task,
            variant: variant.into(),
        }
    }

    pub fn generation(variant: impl Into<String>) -> Self {
        Self::new(ModelTask::Generation, variant)
    }

    pub fn colorization(variant: ColorizerVariant) -> Self {
        Self::new(ModelTask::Colorization, variant.as_str())
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.task, self.variant)
    }
}

/// Loading seam for the underlying model libraries.
///
/// Loading is expected to be expensive and is performed at most once per key;
/// handles are shared read-only afterwards and must support repeated
/// inference calls without reloading.
pub trait ModelLoader: Send + Sync {
    type Handle: Send + Sync + 'static;

    fn load(&self, key: &ModelKey, device: &DeviceProfile) -> Result<Self::Handle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_round_trips_through_str() {
        for variant in [ColorizerVariant::Artistic, ColorizerVariant::Stable] {
            assert_eq!(variant.as_str().parse::<ColorizerVariant>().unwrap(), variant);
        }
        assert_eq!(
            " Stable ".parse::<ColorizerVariant>().unwrap(),
            ColorizerVariant::Stable
        );
    }

    #[test]
    fn unknown_variant_is_rejected() {
        assert!(matches!(
            "vivid".parse::<ColorizerVariant>(),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn key_display_includes_task_and_variant() {
        let key = ModelKey::colorization(ColorizerVariant::Artistic);
        assert_eq!(key.to_string(), "colorization/artistic");
        let key = ModelKey::generation("sd-v1-5");
        assert_eq!(key.to_string(), "generation/sd-v1-5");
    }
}
