//! Canned backends producing deterministic responses without a remote provider
//!
//! Every adapter validates its credentials on `initialize`, passes through its
//! kind's rate limiter before doing any work, and can simulate provider
//! latency, including a cold-start penalty that `prewarm` removes.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::Rng;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::backend::conversation::ConversationStore;
use crate::backend::rate_limiter::{FixedWindowRateLimiter, RateLimiterPool};
use crate::backend::text_backend::TextGenerationService;
use crate::backend::traits::{AiService, ServiceFactory};
use crate::backend::types::{
    Recommendation, Request, RequestPayload, Response, ResponsePayload, ServiceKind,
};
use crate::config::ServiceConfig;
use crate::error::{AppError, Result};

/// Bytes of synthetic PCM audio per millisecond (16 kHz, 8 bit)
const AUDIO_BYTES_PER_MS: u64 = 16;
const SPEECH_MS_PER_WORD: u64 = 400;
/// Longest clip a single synthesis request produces
const MAX_SPEECH_DURATION_MS: u64 = 60_000;
/// Longest text accepted for synthesis, in characters
const MAX_SYNTHESIS_CHARS: usize = 4_096;

/// State shared by every canned adapter
pub(crate) struct AdapterCore {
    kind: ServiceKind,
    name: String,
    config: ServiceConfig,
    limiter: Arc<FixedWindowRateLimiter>,
    available: AtomicBool,
    warmed: AtomicBool,
    requests_served: AtomicU64,
}

impl AdapterCore {
    pub(crate) fn new(config: ServiceConfig, limiter: Arc<FixedWindowRateLimiter>) -> Self {
        let name = match &config.model {
            Some(model) => format!("{}:{}", config.kind, model),
            None => format!("canned-{}", config.kind),
        };

        Self {
            kind: config.kind,
            name,
            config,
            limiter,
            available: AtomicBool::new(false),
            warmed: AtomicBool::new(false),
            requests_served: AtomicU64::new(0),
        }
    }

    pub(crate) fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub(crate) fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    pub(crate) fn requests_served(&self) -> u64 {
        self.requests_served.load(Ordering::Relaxed)
    }

    /// Credential and endpoint checks standing in for a provider handshake
    pub(crate) async fn initialize(&self) -> Result<()> {
        if self.config.requires_api_key {
            match self.config.resolve_api_key() {
                None => return Err(self.init_error("missing API key")),
                Some(key) if key.starts_with("invalid") => {
                    return Err(self.init_error("invalid API credentials"))
                }
                Some(_) => {}
            }
        }

        if let Some(endpoint) = &self.config.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(self.init_error(&format!("invalid endpoint '{}'", endpoint)));
            }
        }

        self.available.store(true, Ordering::Release);
        info!(service = %self.kind, name = %self.name, "Canned backend initialized");
        Ok(())
    }

    fn init_error(&self, message: &str) -> AppError {
        AppError::Initialization {
            kind: self.kind,
            message: message.to_string(),
        }
    }

    pub(crate) async fn prewarm(&self) -> Result<()> {
        if !self.is_available() {
            return Err(AppError::ServiceUnavailable(self.kind));
        }
        tokio::time::sleep(self.jittered_latency()).await;
        self.warmed.store(true, Ordering::Release);
        Ok(())
    }

    pub(crate) fn shutdown(&self) {
        if self.available.swap(false, Ordering::AcqRel) {
            info!(
                service = %self.kind,
                served = self.requests_served(),
                "Canned backend shut down"
            );
        }
    }

    /// Availability check, rate limiting and simulated provider latency.
    ///
    /// Returns the instant the request started, for timing.
    pub(crate) async fn begin_request(&self, request: &Request) -> Result<Instant> {
        let started = Instant::now();
        if !self.is_available() {
            return Err(AppError::ServiceUnavailable(self.kind));
        }
        if request.service_kind() != self.kind {
            return Err(AppError::InvalidRequest(format!(
                "{} backend cannot handle {} payloads",
                self.kind,
                request.service_kind()
            )));
        }

        let waited = self.limiter.acquire().await;
        if !waited.is_zero() {
            debug!(
                service = %self.kind,
                request_id = %request.id,
                waited_ms = waited.as_millis() as u64,
                "Request delayed by rate limiter"
            );
        }

        let mut latency = self.jittered_latency();
        if !self.warmed.swap(true, Ordering::AcqRel) {
            latency += self.config.simulated_latency();
        }
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        // A shutdown during the wait means the provider connection is gone.
        if !self.is_available() {
            return Err(AppError::ServiceUnavailable(self.kind));
        }

        self.requests_served.fetch_add(1, Ordering::Relaxed);
        Ok(started)
    }

    fn jittered_latency(&self) -> Duration {
        let base = self.config.simulated_latency_ms;
        if base == 0 {
            return Duration::ZERO;
        }
        let jitter = rand::thread_rng().gen_range(0..=base / 10);
        Duration::from_millis(base + jitter)
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Canned backend for speech, vision, recommendation, translation and scene generation
pub struct CannedService {
    core: AdapterCore,
}

impl CannedService {
    pub fn new(config: ServiceConfig, limiter: Arc<FixedWindowRateLimiter>) -> Self {
        Self {
            core: AdapterCore::new(config, limiter),
        }
    }

    pub fn requests_served(&self) -> u64 {
        self.core.requests_served()
    }

    fn respond(&self, payload: &RequestPayload) -> Result<ResponsePayload> {
        match payload {
            RequestPayload::SpeechSynthesis { text, voice } => synthesize_speech(text, voice),
            RequestPayload::SpeechRecognition { audio_base64, language } => {
                recognize_speech(audio_base64, language)
            }
            RequestPayload::VisionAnalysis { image_base64, prompt } => {
                analyze_image(image_base64, prompt.as_deref())
            }
            RequestPayload::Recommendation {
                context,
                preferences,
                max_results,
            } => Ok(recommend(context, preferences, *max_results)),
            RequestPayload::Translation {
                text,
                source_language,
                target_language,
            } => Ok(translate(text, source_language.as_deref(), target_language)),
            RequestPayload::SceneGeneration { description, style } => {
                Ok(generate_scene(description, style.as_deref()))
            }
            RequestPayload::TextGeneration { .. } => Err(AppError::InvalidRequest(
                "text generation is served by the text backend".to_string(),
            )),
        }
    }
}

#[async_trait]
impl AiService for CannedService {
    fn kind(&self) -> ServiceKind {
        self.core.kind()
    }

    fn name(&self) -> &str {
        self.core.name()
    }

    fn is_available(&self) -> bool {
        self.core.is_available()
    }

    async fn initialize(&self) -> Result<()> {
        self.core.initialize().await
    }

    async fn process(&self, request: &Request) -> Result<Response> {
        let started = self.core.begin_request(request).await?;
        match self.respond(&request.payload) {
            Ok(payload) => Ok(Response::success(request.id, payload, elapsed_ms(started))),
            Err(e) => Ok(Response::failure(request.id, e.to_string(), elapsed_ms(started))),
        }
    }

    async fn prewarm(&self) -> Result<()> {
        self.core.prewarm().await
    }

    async fn shutdown(&self) {
        self.core.shutdown();
    }
}

fn synthesize_speech(text: &str, voice: &str) -> Result<ResponsePayload> {
    let chars = text.chars().count();
    if chars > MAX_SYNTHESIS_CHARS {
        return Err(AppError::InvalidRequest(format!(
            "text too long for synthesis: {} characters (max {})",
            chars, MAX_SYNTHESIS_CHARS
        )));
    }

    let words = text.split_whitespace().count().max(1) as u64;
    let duration_ms = (words * SPEECH_MS_PER_WORD).min(MAX_SPEECH_DURATION_MS);

    // 8-bit PCM silence tagged with the voice name.
    let mut audio = voice.as_bytes().to_vec();
    audio.resize((duration_ms * AUDIO_BYTES_PER_MS) as usize, 0x80);

    Ok(ResponsePayload::SynthesizedSpeech {
        audio_base64: STANDARD.encode(audio),
        duration_ms,
    })
}

const RECOGNITION_PHRASES: [&str; 4] = [
    "show me the next destination",
    "what is the weather like there",
    "take me back to the lobby",
    "tell me more about this place",
];

fn recognize_speech(audio_base64: &str, language: &str) -> Result<ResponsePayload> {
    let audio = STANDARD
        .decode(audio_base64)
        .map_err(|e| AppError::Processing(format!("invalid audio payload: {}", e)))?;
    if audio.is_empty() {
        return Err(AppError::Processing("audio payload is empty".to_string()));
    }

    let phrase = RECOGNITION_PHRASES[audio.len() % RECOGNITION_PHRASES.len()];
    let confidence = if language.starts_with("en") { 0.92 } else { 0.78 };

    Ok(ResponsePayload::RecognizedText {
        text: phrase.to_string(),
        confidence,
    })
}

const VISION_LABELS: [&str; 6] = ["landmark", "person", "building", "sky", "water", "vegetation"];

fn analyze_image(image_base64: &str, prompt: Option<&str>) -> Result<ResponsePayload> {
    let image = STANDARD
        .decode(image_base64)
        .map_err(|e| AppError::Processing(format!("invalid image payload: {}", e)))?;
    if image.is_empty() {
        return Err(AppError::Processing("image payload is empty".to_string()));
    }

    let count = 2 + image.len() % 3;
    let labels: Vec<String> = VISION_LABELS
        .iter()
        .cycle()
        .skip(image.len() % VISION_LABELS.len())
        .take(count)
        .map(|l| l.to_string())
        .collect();

    let description = match prompt {
        Some(prompt) => format!("In answer to '{}': the scene shows {}", prompt, labels.join(", ")),
        None => format!("The scene shows {}", labels.join(", ")),
    };

    Ok(ResponsePayload::VisionAnalysis { description, labels })
}

const CATALOG: [(&str, &str); 6] = [
    ("Lisbon", "Hilltop viewpoints and tiled facades along the Tagus"),
    ("Kyoto", "Temples, gardens and quiet wooden streets"),
    ("Reykjavik", "Geothermal pools under the northern lights"),
    ("Cape Town", "Table Mountain above two oceans"),
    ("Patagonia", "Glaciers and granite towers at the end of the world"),
    ("Marrakesh", "Spice markets and riads in the red city"),
];

fn recommend(context: &str, preferences: &[String], max_results: u32) -> ResponsePayload {
    let context = context.to_lowercase();
    let mut items: Vec<Recommendation> = CATALOG
        .iter()
        .map(|(title, description)| {
            let text = format!("{} {}", title, description).to_lowercase();
            let matches = preferences
                .iter()
                .chain(std::iter::once(&context))
                .filter(|p| !p.is_empty())
                .flat_map(|p| p.split_whitespace())
                .filter(|word| text.contains(&word.to_lowercase()))
                .count();
            Recommendation {
                title: title.to_string(),
                description: description.to_string(),
                score: (0.5 + 0.1 * matches as f32).min(1.0),
            }
        })
        .collect();

    items.sort_by(|a, b| b.score.total_cmp(&a.score));
    items.truncate(max_results as usize);

    ResponsePayload::Recommendations { items }
}

fn translate(text: &str, source_language: Option<&str>, target_language: &str) -> ResponsePayload {
    let detected = source_language.unwrap_or("en").to_string();
    let text = if detected.eq_ignore_ascii_case(target_language) {
        text.to_string()
    } else {
        format!("[{}] {}", target_language, text)
    };

    ResponsePayload::Translated {
        text,
        detected_language: detected,
    }
}

fn generate_scene(description: &str, style: Option<&str>) -> ResponsePayload {
    let lowered = description.to_lowercase();
    let lighting = if lowered.contains("night") {
        "moonlight"
    } else if lowered.contains("sunset") {
        "golden_hour"
    } else {
        "daylight"
    };
    let skybox = if lowered.contains("space") { "stars" } else { "clear_sky" };
    let objects: Vec<_> = description
        .split_whitespace()
        .filter(|w| w.len() > 3)
        .take(5)
        .enumerate()
        .map(|(i, word)| {
            json!({
                "name": word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase(),
                "position": [i as f32 * 2.0, 0.0, -5.0],
            })
        })
        .collect();

    ResponsePayload::GeneratedScene {
        scene: json!({
            "description": description,
            "style": style.unwrap_or("realistic"),
            "lighting": lighting,
            "skybox": skybox,
            "objects": objects,
        }),
    }
}

/// Builds canned adapters, sharing rate limiters and conversation history
/// across restarts of the same kind.
pub struct CannedServiceFactory {
    limiters: RateLimiterPool,
    conversations: Arc<ConversationStore>,
}

impl CannedServiceFactory {
    pub fn new(conversations: Arc<ConversationStore>) -> Self {
        Self {
            limiters: RateLimiterPool::new(),
            conversations,
        }
    }

    pub fn rate_limiters(&self) -> &RateLimiterPool {
        &self.limiters
    }
}

impl ServiceFactory for CannedServiceFactory {
    fn create(&self, config: &ServiceConfig) -> Result<Arc<dyn AiService>> {
        let limiter = self.limiters.get_or_create(
            config.kind,
            config.requests_per_minute,
            config.rate_limit_window(),
        );

        let service: Arc<dyn AiService> = match config.kind {
            ServiceKind::TextGeneration => Arc::new(TextGenerationService::new(
                config.clone(),
                limiter,
                self.conversations.clone(),
            )),
            _ => Arc::new(CannedService::new(config.clone(), limiter)),
        };
        Ok(service)
    }
}
