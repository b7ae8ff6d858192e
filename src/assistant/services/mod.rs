pub mod annotation_formatter;
pub mod backend;
pub mod openai_backend;
pub mod session;
pub mod stream_reducer;

pub use annotation_formatter::{format_annotations, sanitize_live, strip_citation_markers};
pub use backend::{AssistantBackend, BackendError, EventStream, FetchedFile};
pub use openai_backend::OpenAiBackend;
pub use session::{ConversationSession, SessionConfig};
pub use stream_reducer::{ReducerOptions, RenderEvent, StreamReducer, TurnError};

#[cfg(test)]
pub(crate) mod test_support;
