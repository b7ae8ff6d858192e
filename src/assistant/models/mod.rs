pub mod events;
pub mod transcript;

pub use events::{
    Annotation, AnnotationKind, FinishedToolCall, LocalActionCall, RunId, SessionId, StreamEvent,
    ToolCallKind, ToolOutput,
};
pub use transcript::{Speaker, TranscriptEntry, TranscriptStore};
