pub mod models;
pub mod services;
pub mod tools;

pub use models::{Speaker, StreamEvent, TranscriptEntry, TranscriptStore};
pub use services::{AssistantBackend, ConversationSession, RenderEvent, SessionConfig, TurnError};
pub use tools::{Tool, ToolRegistry};
