//! Colorization orchestration over a working-directory-relative library.
//!
//! The underlying colorization library resolves paths relative to its own
//! home directory and writes results into a directory it controls, without
//! returning a trustworthy handle to the produced file. The orchestrator
//! wraps those quirks: it swaps the working directory behind a scoped guard,
//! applies a one-shot artistic-model fallback, and discovers the result by
//! newest modification time.

mod tint;
mod workdir;

pub use tint::{TintColorizer, TintColorizerLoader};
pub use workdir::WorkingDirectoryScope;

use std::env;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::device::DeviceSelector;
use crate::error::{Error, Result};
use crate::model::{ColorizerVariant, ModelCache, ModelKey, ModelLoader};

/// Recommended render factor range; values outside warn but are not rejected.
pub const RENDER_FACTOR_RANGE: RangeInclusive<u32> = 7..=45;

/// Tag recorded in [`ColorizationResult::model_used`] when the artistic
/// fallback was taken.
pub const ARTISTIC_FALLBACK: &str = "artistic_fallback";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorizationRequest {
    /// Existing black-and-white input image.
    pub input_path: PathBuf,

    /// Where the colorized result is copied to.
    pub output_path: PathBuf,

    /// Quality factor; higher means more internal processing detail.
    #[serde(default = "default_render_factor")]
    pub render_factor: u32,

    #[serde(default)]
    pub variant: ColorizerVariant,
}

fn default_render_factor() -> u32 {
    35
}

impl ColorizationRequest {
    /// Request with the output next to the input as `{stem}_colorized{ext}`.
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        let input_path = input_path.into();
        let output_path = derive_output_path(&input_path);
        Self {
            input_path,
            output_path,
            render_factor: default_render_factor(),
            variant: ColorizerVariant::default(),
        }
    }

    pub fn with_output(mut self, output_path: impl Into<PathBuf>) -> Self {
        self.output_path = output_path.into();
        self
    }

    pub fn with_render_factor(mut self, render_factor: u32) -> Self {
        self.render_factor = render_factor;
        self
    }

    pub fn with_variant(mut self, variant: ColorizerVariant) -> Self {
        self.variant = variant;
        self
    }
}

fn derive_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let extension = input
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    input.with_file_name(format!("{stem}_colorized{extension}"))
}

#[derive(Debug, Clone)]
pub struct ColorizationResult {
    pub output_path: PathBuf,
    /// The requested variant name, or `"artistic_fallback"`.
    pub model_used: String,
}

/// The colorization library seam.
///
/// `transform` reads `input` and writes its result into the library's result
/// directory, resolved relative to the current working directory; it does not
/// report where. The orchestrator owns the directory swap and the result
/// discovery.
pub trait ColorizerModel: Send + Sync {
    fn transform(&self, input: &Path, render_factor: u32) -> Result<()>;
}

/// Serializes colorization calls and drives the library through its state
/// machine: swap directory, load (with fallback), transform, locate result,
/// copy out, restore directory.
pub struct ColorizationOrchestrator<L: ModelLoader>
where
    L::Handle: ColorizerModel,
{
    cache: ModelCache<L>,
    home_dir: PathBuf,
    results_dir: String,
    // the directory swap and newest-file discovery are only correct when at
    // most one colorize call is in flight
    serialize: Mutex<()>,
}

impl<L: ModelLoader> ColorizationOrchestrator<L>
where
    L::Handle: ColorizerModel,
{
    pub fn new(config: &EngineConfig, loader: L) -> Self {
        let device = DeviceSelector::detect_with_preference(config.device_preference.as_deref());
        Self {
            cache: ModelCache::new(loader, device),
            home_dir: config.colorizer_home.clone(),
            results_dir: config.colorizer_results_dir.clone(),
            serialize: Mutex::new(()),
        }
    }

    /// Drop all cached colorizer handles (testing / explicit invalidation).
    pub fn reset_models(&self) {
        self.cache.reset();
    }

    pub fn colorize(&self, request: &ColorizationRequest) -> Result<ColorizationResult> {
        // the lock must cover path resolution too: a concurrent call has the
        // working directory swapped, and relative paths would resolve against
        // the colorizer home instead of the caller's directory
        let _serialized = self.serialize.lock().unwrap();

        // fail fast, before any model work
        if !request.input_path.exists() {
            return Err(Error::InputNotFound(request.input_path.clone()));
        }
        if !RENDER_FACTOR_RANGE.contains(&request.render_factor) {
            warn!(
                render_factor = request.render_factor,
                "render factor outside the recommended 7-45 range"
            );
        }

        // resolve both endpoints while the caller's directory is still current
        let input = request.input_path.canonicalize()?;
        let output_path = if request.output_path.is_absolute() {
            request.output_path.clone()
        } else {
            env::current_dir()?.join(&request.output_path)
        };
        let home = self.home_dir.canonicalize()?;
        let results_dir = home.join(&self.results_dir);

        let scope = WorkingDirectoryScope::enter(&home)?;

        match self.run_colorization(&input, &output_path, &results_dir, request) {
            Ok(result) => {
                scope.restore()?;
                Ok(result)
            }
            Err(error) => {
                // scope drop restores the directory without masking `error`
                drop(scope);
                Err(error)
            }
        }
    }

    fn run_colorization(
        &self,
        input: &Path,
        output_path: &Path,
        results_dir: &Path,
        request: &ColorizationRequest,
    ) -> Result<ColorizationResult> {
        let attempt = |variant: ColorizerVariant| -> Result<()> {
            let model = self.cache.get_or_load(&ModelKey::colorization(variant))?;
            model.transform(input, request.render_factor)
        };

        let requested = request.variant;
        let model_used = match attempt(requested) {
            Ok(()) => requested.as_str().to_string(),
            Err(primary) => {
                warn!(
                    variant = %requested,
                    error = %primary,
                    "colorization failed, retrying once with the artistic model"
                );
                attempt(ColorizerVariant::Artistic).map_err(|fallback| {
                    Error::ColorizationFailed {
                        primary: primary.to_string(),
                        fallback: fallback.to_string(),
                    }
                })?;
                ARTISTIC_FALLBACK.to_string()
            }
        };

        let produced = newest_file(results_dir)?;
        debug!(produced = %produced.display(), "located colorization result");

        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        // copy, not move: the library keeps its own copy in the results dir
        fs::copy(&produced, output_path).map_err(|e| Error::ResultCopyFailed {
            from: produced.clone(),
            to: output_path.to_path_buf(),
            cause: e.to_string(),
        })?;

        info!(
            output = %output_path.display(),
            model = %model_used,
            "colorization completed"
        );

        Ok(ColorizationResult {
            output_path: output_path.to_path_buf(),
            model_used,
        })
    }
}

/// Most recently modified file in `dir`.
///
/// Only valid while colorization calls are serialized; a concurrent writer
/// would make the newest file ambiguous. `ResultNotFound` is reserved for an
/// absent or empty directory; any other io failure keeps its cause.
fn newest_file(dir: &Path) -> Result<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::ResultNotFound(dir.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified()?;
        if newest.as_ref().is_none_or(|(best, _)| modified >= *best) {
            newest = Some((modified, entry.path()));
        }
    }

    newest
        .map(|(_, path)| path)
        .ok_or_else(|| Error::ResultNotFound(dir.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_name_derives_from_input() {
        let request = ColorizationRequest::new("photos/grandma.jpg");
        assert_eq!(
            request.output_path,
            PathBuf::from("photos/grandma_colorized.jpg")
        );
        assert_eq!(request.render_factor, 35);
        assert_eq!(request.variant, ColorizerVariant::Artistic);
    }

    #[test]
    fn default_output_name_without_extension() {
        let request = ColorizationRequest::new("scan");
        assert_eq!(request.output_path, PathBuf::from("scan_colorized"));
    }

    #[test]
    fn absent_or_empty_results_dir_is_result_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = newest_file(&tmp.path().join("missing")).unwrap_err();
        assert!(matches!(err, Error::ResultNotFound(_)));

        let empty = tmp.path().join("empty");
        fs::create_dir_all(&empty).unwrap();
        let err = newest_file(&empty).unwrap_err();
        assert!(matches!(err, Error::ResultNotFound(_)));
    }

    #[test]
    fn unreadable_results_dir_keeps_the_io_cause() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("results");
        fs::write(&file, b"not a directory").unwrap();
        let err = newest_file(&file).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
