//! Text-to-image generation backend management.
//!
//! The [`BackendManager`] decides between local in-process inference and the
//! degraded remote/placeholder path, drives the pipeline with the seeding and
//! progress contracts, and persists results under collision-free names.

mod pipeline;

pub use pipeline::{ProceduralLoader, ProceduralPipeline, TextToImagePipeline};

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::artifact::ArtifactNamer;
use crate::config::EngineConfig;
use crate::device::{DeviceKind, DeviceProfile, DeviceSelector};
use crate::error::{Error, Result};
use crate::model::{ModelCache, ModelKey, ModelLoader};

/// Request for text-to-image generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Text description of the desired image.
    pub prompt: String,

    /// What to avoid in the image.
    #[serde(default = "default_negative_prompt")]
    pub negative_prompt: String,

    #[serde(default = "default_dimension")]
    pub width: u32,

    #[serde(default = "default_dimension")]
    pub height: u32,

    /// Number of denoising steps.
    #[serde(default = "default_steps")]
    pub steps: u32,

    /// How closely to follow the prompt.
    #[serde(default = "default_guidance_scale")]
    pub guidance_scale: f32,

    /// Seed for reproducible generation. Unset leaves the RNG advancing
    /// naturally from prior calls.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_negative_prompt() -> String {
    "blurry, low quality, distorted, ugly, bad anatomy".to_string()
}
fn default_dimension() -> u32 {
    512
}
fn default_steps() -> u32 {
    20
}
fn default_guidance_scale() -> f32 {
    7.5
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: default_negative_prompt(),
            width: default_dimension(),
            height: default_dimension(),
            steps: default_steps(),
            guidance_scale: default_guidance_scale(),
            seed: None,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_guidance_scale(mut self, guidance_scale: f32) -> Self {
        self.guidance_scale = guidance_scale;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        self.negative_prompt = negative_prompt.into();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(Error::InvalidRequest("prompt must not be empty".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidRequest(
                "width and height must be positive".into(),
            ));
        }
        if self.steps == 0 {
            return Err(Error::InvalidRequest("steps must be positive".into()));
        }
        if self.guidance_scale <= 0.0 {
            return Err(Error::InvalidRequest(
                "guidance_scale must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Execution path for generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process model inference.
    Local,
    /// Degraded placeholder path; never fails for model reasons.
    Remote,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Local => "local",
            Backend::Remote => "remote",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub output_path: PathBuf,
    pub backend_used: Backend,
}

/// Snapshot of the manager state for status endpoints and logging.
#[derive(Debug, Clone, Serialize)]
pub struct BackendInfo {
    pub backend: Backend,
    pub device: DeviceKind,
    pub model_name: String,
}

type ProgressHandler = Box<dyn Fn(f32) + Send + Sync>;

/// Drives generation against a local pipeline or the remote placeholder path.
///
/// A failed initial load pins the backend to [`Backend::Remote`] for the life
/// of the instance; local loading is never retried within it.
pub struct BackendManager<L: ModelLoader>
where
    L::Handle: TextToImagePipeline,
{
    backend: Backend,
    cache: ModelCache<L>,
    device: DeviceProfile,
    model_name: String,
    output_dir: PathBuf,
    namer: ArtifactNamer,
    rng: Mutex<StdRng>,
    progress: Option<ProgressHandler>,
}

impl<L: ModelLoader> BackendManager<L>
where
    L::Handle: TextToImagePipeline,
{
    /// Create a manager, attempting the local model load up front when
    /// `use_local` is set.
    pub fn new(
        config: &EngineConfig,
        loader: L,
        use_local: bool,
        model_name: impl Into<String>,
    ) -> Self {
        let model_name = model_name.into();
        let device = DeviceSelector::detect_with_preference(config.device_preference.as_deref());
        let precision = device.select_precision(config.precision.as_deref());
        debug!(device = %device.kind, ?precision, "generation backend device selected");

        let cache = ModelCache::new(loader, device.clone());
        let backend = if use_local {
            match cache.get_or_load(&ModelKey::generation(model_name.as_str())) {
                Ok(_) => {
                    info!(model = %model_name, device = %device.kind, "local generation backend ready");
                    Backend::Local
                }
                Err(error) => {
                    warn!(model = %model_name, %error, "local model load failed, using remote backend");
                    Backend::Remote
                }
            }
        } else {
            Backend::Remote
        };

        Self {
            backend,
            cache,
            device,
            model_name,
            output_dir: config.output_dir.clone(),
            namer: ArtifactNamer::default(),
            rng: Mutex::new(StdRng::from_entropy()),
            progress: None,
        }
    }

    /// Install a progress handler invoked once per denoising step with the
    /// completion percentage.
    pub fn set_progress_handler(&mut self, handler: impl Fn(f32) + Send + Sync + 'static) {
        self.progress = Some(Box::new(handler));
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn info(&self) -> BackendInfo {
        BackendInfo {
            backend: self.backend,
            device: self.device.kind,
            model_name: match self.backend {
                Backend::Local => self.model_name.clone(),
                Backend::Remote => "remote".to_string(),
            },
        }
    }

    /// Generate an image for `request` and persist it under a unique name in
    /// the configured output directory.
    pub fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        request.validate()?;

        fs::create_dir_all(&self.output_dir)?;
        let output_path = self.output_dir.join(self.namer.next_name("generated"));

        let image = match self.backend {
            Backend::Local => {
                // already cached by construction; this never loads again
                let pipeline = self
                    .cache
                    .get_or_load(&ModelKey::generation(self.model_name.as_str()))?;
                debug!(prompt = %request.prompt, steps = request.steps, "generating locally");
                let mut rng = self.rng.lock().unwrap();
                // reproducibility requires reseeding immediately before the call
                if let Some(seed) = request.seed {
                    *rng = StdRng::seed_from_u64(seed);
                }
                let mut on_step = |completed: u32, total: u32| {
                    let percent = completed as f32 / total as f32 * 100.0;
                    debug!(percent, completed, total, "generation progress");
                    if let Some(handler) = &self.progress {
                        handler(percent);
                    }
                };
                pipeline
                    .run(request, &mut rng, &mut on_step)
                    .map_err(|e| Error::GenerationFailed(e.to_string()))?
            }
            Backend::Remote => {
                debug!(prompt = %request.prompt, "rendering remote placeholder");
                pipeline::render_placeholder(request)
            }
        };

        image.save(&output_path)?;
        info!(path = %output_path.display(), backend = %self.backend, "image generated");

        Ok(GenerationResult {
            output_path,
            backend_used: self.backend,
        })
    }
}
