//! Sequential prompt-variation batches with per-item failure isolation.

use tracing::{info, warn};

use crate::generate::{BackendManager, GenerationRequest, GenerationResult, TextToImagePipeline};
use crate::model::ModelLoader;

/// Runs a generation per variation of a base prompt, in order. A failure at
/// one index is recorded as `None` there and never affects the others.
pub struct VariationBatchRunner<'a, L: ModelLoader>
where
    L::Handle: TextToImagePipeline,
{
    manager: &'a BackendManager<L>,
    template: GenerationRequest,
}

impl<'a, L: ModelLoader> VariationBatchRunner<'a, L>
where
    L::Handle: TextToImagePipeline,
{
    pub fn new(manager: &'a BackendManager<L>) -> Self {
        Self {
            manager,
            template: GenerationRequest::new(""),
        }
    }

    /// Use `template` for size/steps/guidance; the prompt is replaced per
    /// variation.
    pub fn with_template(mut self, template: GenerationRequest) -> Self {
        self.template = template;
        self
    }

    /// One optional result per variation, same length and order as the input.
    pub fn run(
        &self,
        base_prompt: &str,
        variations: &[String],
    ) -> Vec<Option<GenerationResult>> {
        let total = variations.len();
        variations
            .iter()
            .enumerate()
            .map(|(index, variation)| {
                let mut request = self.template.clone();
                request.prompt = format!("{base_prompt}, {variation}");
                match self.manager.generate(&request) {
                    Ok(result) => {
                        info!(index = index + 1, total, "variation completed");
                        Some(result)
                    }
                    Err(error) => {
                        warn!(index = index + 1, total, %error, "variation failed");
                        None
                    }
                }
            })
            .collect()
    }
}
