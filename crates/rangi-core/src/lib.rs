//! Rangi Core - image colorization and generation engine
//!
//! This crate provides the backend orchestration for obtaining an image
//! either by colorizing an existing black-and-white photograph or by
//! synthesizing one from a text prompt.
//!
//! # Architecture
//!
//! - [`BackendManager`] selects the local or remote generation path, applies
//!   deterministic seeding and reports per-step progress
//! - [`ColorizationOrchestrator`] drives the working-directory-relative
//!   colorization library with a one-shot artistic fallback
//! - [`ModelCache`] owns model handles, loaded at most once per
//!   (task, variant)
//! - [`DeviceSelector`] classifies the compute environment once at startup
//!
//! # Example
//!
//! ```ignore
//! use rangi_core::{BackendManager, EngineConfig, GenerationRequest, ProceduralLoader};
//!
//! let config = EngineConfig::default();
//! let manager = BackendManager::new(&config, ProceduralLoader, true, "sd-v1-5");
//!
//! let request = GenerationRequest::new("a misty harbor at dawn").with_seed(42);
//! let result = manager.generate(&request)?;
//! ```

pub mod artifact;
pub mod batch;
pub mod colorize;
pub mod config;
pub mod device;
pub mod error;
pub mod generate;
pub mod model;

pub use artifact::ArtifactNamer;
pub use batch::VariationBatchRunner;
pub use colorize::{
    ARTISTIC_FALLBACK, ColorizationOrchestrator, ColorizationRequest, ColorizationResult,
    ColorizerModel, RENDER_FACTOR_RANGE, TintColorizer, TintColorizerLoader,
    WorkingDirectoryScope,
};
pub use config::EngineConfig;
pub use device::{DeviceKind, DeviceProfile, DeviceSelector, Precision};
pub use error::{Error, Result};
pub use generate::{
    Backend, BackendInfo, BackendManager, GenerationRequest, GenerationResult, ProceduralLoader,
    ProceduralPipeline, TextToImagePipeline,
};
pub use model::{ColorizerVariant, ModelCache, ModelKey, ModelLoader, ModelTask};
