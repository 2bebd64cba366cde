//! Drives one generation run: validates the job, then issues the batch units
//! one after another, appending each image to the session as it arrives.
//!
//! Expected failures never escape [`GenerationOrchestrator::generate`]; they end
//! up in the session's `error`. Callers must not start a second run on a
//! session whose `is_generating` is still set.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::gemini::{preview, GENERATION_FAILED, NO_IMAGE_DATA};
use crate::models::{
    strip_data_url, AspectRatio, GenerateImageRequest, GeneratedImage, GenerationRequest,
    GenerationStyle, StyleOptionSet, UploadedImage,
};
use crate::prompt::build_prompt;
use crate::session::{GenerationSession, SessionEvent, SessionHandle};
use crate::transport::ImageGenerator;

pub const CREDENTIAL_REQUIRED: &str = "APIキーが設定されていません";
pub const IMAGE_REQUIRED: &str = "画像を選択してください";

/// Everything one `generate` call needs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJob {
    #[serde(default)]
    pub credential: String,
    #[serde(default)]
    pub uploaded_images: Vec<UploadedImage>,
    #[serde(default)]
    pub style: GenerationStyle,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub aspect_ratio: Option<AspectRatio>,
    #[serde(default)]
    pub custom_prompt: Option<String>,
    #[serde(default)]
    pub translated_prompt: Option<String>,
    #[serde(flatten)]
    pub options: StyleOptionSet,
}

fn default_count() -> u32 {
    1
}

impl GenerationJob {
    /// Free-style text: the translation wins whenever one is present.
    pub fn prompt_text(&self) -> Option<&str> {
        self.translated_prompt
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(self.custom_prompt.as_deref())
    }

    pub fn generation_request(&self) -> GenerationRequest {
        let StyleOptionSet {
            package_options,
            display_stand_options,
            background_options,
            three_view_options,
            acrylic_stand_options,
            line_art_options,
        } = self.options.clone();

        GenerationRequest {
            style: self.style,
            custom_prompt: self.prompt_text().map(str::to_string),
            aspect_ratio: self.aspect_ratio,
            package_options,
            display_stand_options,
            background_options,
            three_view_options,
            acrylic_stand_options,
            line_art_options,
        }
    }
}

/// Resets the run flags however the run ends, including a panic in the
/// transport or the future being dropped mid-await.
struct RunGuard<'a> {
    session: &'a SessionHandle,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.session.update(|s| {
            s.is_generating = false;
            s.progress_percent = 0;
        });
        self.session.emit(SessionEvent::Finished);
    }
}

fn percent(completed: u32, count: u32) -> u8 {
    ((completed as f64 / count as f64) * 100.0).round() as u8
}

pub struct GenerationOrchestrator<G> {
    generator: G,
    rng: Mutex<StdRng>,
}

impl<G: ImageGenerator> GenerationOrchestrator<G> {
    pub fn new(generator: G) -> Self {
        Self::with_rng(generator, StdRng::from_entropy())
    }

    pub fn with_seed(generator: G, seed: u64) -> Self {
        Self::with_rng(generator, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(generator: G, rng: StdRng) -> Self {
        Self { generator, rng: Mutex::new(rng) }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Uniform pick, so a multi-image upload yields varied outputs across a batch.
    fn pick_image<'a>(&self, images: &'a [UploadedImage]) -> &'a UploadedImage {
        let index = self.rng.lock().gen_range(0..images.len());
        &images[index]
    }

    pub async fn generate(&self, session: &SessionHandle, job: &GenerationJob) {
        if job.credential.is_empty() {
            warn!("⚠️ Generation refused: no API key");
            session.update(|s| s.error = Some(CREDENTIAL_REQUIRED.to_string()));
            return;
        }
        if job.uploaded_images.is_empty() {
            warn!("⚠️ Generation refused: no input image");
            session.update(|s| s.error = Some(IMAGE_REQUIRED.to_string()));
            return;
        }

        session.update(|s| {
            s.is_generating = true;
            s.error = None;
            s.progress_percent = 0;
        });
        session.emit(SessionEvent::Started { count: job.count });
        let _guard = RunGuard { session };

        info!(
            "🚀 Generating {} image(s) in style {:?} from {} upload(s)",
            job.count,
            job.style,
            job.uploaded_images.len()
        );

        if let Err(message) = self.run_batch(session, job).await {
            error!("❌ Generation aborted: {}", message);
            session.update(|s| s.error = Some(message.clone()));
            session.emit(SessionEvent::Failed { message });
        }
    }

    async fn run_batch(&self, session: &SessionHandle, job: &GenerationJob) -> Result<(), String> {
        let prompt = build_prompt(&job.generation_request());
        let custom_prompt = job.prompt_text().map(str::to_string);

        for i in 0..job.count {
            let input = self.pick_image(&job.uploaded_images);
            info!("🎯 Batch unit {}/{} using upload '{}'", i + 1, job.count, input.name);

            let request = GenerateImageRequest {
                api_key: job.credential.clone(),
                image_base64: strip_data_url(&input.base64).to_string(),
                mime_type: input.mime_type.clone(),
                style: job.style,
                custom_prompt: custom_prompt.clone(),
                aspect_ratio: job.aspect_ratio,
                prompt: Some(prompt.clone()),
            };

            let outcome = match self.generator.generate(&request).await {
                Ok(response) if response.success => response
                    .image_base64
                    .filter(|data| !data.is_empty())
                    .ok_or_else(|| NO_IMAGE_DATA.to_string()),
                Ok(response) => Err(response.error.unwrap_or_else(|| GENERATION_FAILED.to_string())),
                Err(e) => Err(e.to_string()),
            };

            let progress = percent(i + 1, job.count);
            match outcome {
                Ok(payload) => {
                    let image = GeneratedImage::from_payload(&payload);
                    info!("✅ Batch unit {} done: {}", i + 1, preview(&payload));
                    let id = image.id.clone();
                    session.update(|s: &mut GenerationSession| {
                        s.results.push(image);
                        s.progress_percent = progress;
                    });
                    session.emit(SessionEvent::ImageAdded { id });
                    session.emit(SessionEvent::Progress { percent: progress });
                }
                Err(message) => {
                    session.update(|s| s.progress_percent = progress);
                    session.emit(SessionEvent::Progress { percent: progress });
                    return Err(message);
                }
            }
        }
        Ok(())
    }
}
