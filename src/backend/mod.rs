//! Backend module - service contract, registry, and canned adapters

pub mod canned;
pub mod conversation;
pub mod rate_limiter;
pub mod registry;
pub mod text_backend;
pub mod traits;
pub mod types;

pub use canned::{CannedService, CannedServiceFactory};
pub use conversation::{ChatMessage, ConversationStore, Role, DEFAULT_CONVERSATION_ID};
pub use rate_limiter::{FixedWindowRateLimiter, RateLimiterPool};
pub use registry::{RegistrationReport, ServiceHandle, ServiceRegistry, ServiceState, ServiceStatus};
pub use text_backend::TextGenerationService;
pub use traits::{AiService, ServiceFactory};
pub use types::{Recommendation, Request, RequestPayload, Response, ResponsePayload, ServiceKind};
