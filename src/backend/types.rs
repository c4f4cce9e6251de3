//! Request and response types shared by the dispatcher and every backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

/// Backend capability a request is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    TextGeneration,
    Speech,
    Vision,
    Recommendation,
    Translation,
    SceneGeneration,
}

impl ServiceKind {
    pub const COUNT: usize = 6;

    /// Every kind, in declaration order
    pub const ALL: [ServiceKind; Self::COUNT] = [
        ServiceKind::TextGeneration,
        ServiceKind::Speech,
        ServiceKind::Vision,
        ServiceKind::Recommendation,
        ServiceKind::Translation,
        ServiceKind::SceneGeneration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::TextGeneration => "text_generation",
            ServiceKind::Speech => "speech",
            ServiceKind::Vision => "vision",
            ServiceKind::Recommendation => "recommendation",
            ServiceKind::Translation => "translation",
            ServiceKind::SceneGeneration => "scene_generation",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        ServiceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| AppError::InvalidRequest(format!("Unknown service kind '{}'", s)))
    }
}

/// Typed request payload, one variant per concrete request shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestPayload {
    TextGeneration {
        prompt: String,
        #[serde(default)]
        conversation_id: Option<String>,
        #[serde(default)]
        system_prompt: Option<String>,
    },
    SpeechSynthesis {
        text: String,
        #[serde(default = "default_voice")]
        voice: String,
    },
    SpeechRecognition {
        audio_base64: String,
        #[serde(default = "default_language")]
        language: String,
    },
    VisionAnalysis {
        image_base64: String,
        #[serde(default)]
        prompt: Option<String>,
    },
    Recommendation {
        context: String,
        #[serde(default)]
        preferences: Vec<String>,
        #[serde(default = "default_max_results")]
        max_results: u32,
    },
    Translation {
        text: String,
        #[serde(default)]
        source_language: Option<String>,
        target_language: String,
    },
    SceneGeneration {
        description: String,
        #[serde(default)]
        style: Option<String>,
    },
}

fn default_voice() -> String {
    "default".to_string()
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_max_results() -> u32 {
    5
}

impl RequestPayload {
    /// The service kind able to handle this payload
    pub fn service_kind(&self) -> ServiceKind {
        match self {
            RequestPayload::TextGeneration { .. } => ServiceKind::TextGeneration,
            RequestPayload::SpeechSynthesis { .. } | RequestPayload::SpeechRecognition { .. } => {
                ServiceKind::Speech
            }
            RequestPayload::VisionAnalysis { .. } => ServiceKind::Vision,
            RequestPayload::Recommendation { .. } => ServiceKind::Recommendation,
            RequestPayload::Translation { .. } => ServiceKind::Translation,
            RequestPayload::SceneGeneration { .. } => ServiceKind::SceneGeneration,
        }
    }
}

/// A single unit of work submitted to the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Reserved for a future ordering policy; admission is FIFO.
    pub priority: f32,
    pub payload: RequestPayload,
}

impl Request {
    pub fn new(payload: RequestPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            priority: 1.0,
            payload,
        }
    }

    pub fn with_priority(mut self, priority: f32) -> Self {
        self.priority = priority;
        self
    }

    pub fn service_kind(&self) -> ServiceKind {
        self.payload.service_kind()
    }

    pub fn text(prompt: impl Into<String>) -> Self {
        Self::new(RequestPayload::TextGeneration {
            prompt: prompt.into(),
            conversation_id: None,
            system_prompt: None,
        })
    }
}

/// One scored recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    pub score: f32,
}

/// Typed response payload; callers resolve it by pattern matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    GeneratedText {
        text: String,
        conversation_id: String,
        turns: usize,
    },
    SynthesizedSpeech {
        audio_base64: String,
        duration_ms: u64,
    },
    RecognizedText {
        text: String,
        confidence: f32,
    },
    VisionAnalysis {
        description: String,
        labels: Vec<String>,
    },
    Recommendations {
        items: Vec<Recommendation>,
    },
    Translated {
        text: String,
        detected_language: String,
    },
    GeneratedScene {
        #[schema(value_type = Object)]
        scene: serde_json::Value,
    },
}

/// Outcome of a processed request, successful or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Response {
    /// Echoes the originating request id
    pub id: Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub processing_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<ResponsePayload>,
}

impl Response {
    pub fn success(id: Uuid, payload: ResponsePayload, processing_time_ms: u64) -> Self {
        Self {
            id,
            success: true,
            error_message: None,
            processing_time_ms,
            payload: Some(payload),
        }
    }

    pub fn failure(id: Uuid, message: impl Into<String>, processing_time_ms: u64) -> Self {
        Self {
            id,
            success: false,
            error_message: Some(message.into()),
            processing_time_ms,
            payload: None,
        }
    }
}
