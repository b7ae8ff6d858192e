use async_trait::async_trait;
use base64::Engine;
use futures::stream::BoxStream;

use crate::assistant::models::{RunId, SessionId, StreamEvent, ToolOutput};

/// Errors surfaced by the remote assistant service or its transport.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("remote service rejected the request ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("malformed stream payload: {0}")]
    Protocol(String),
    #[error("remote run failed: {0}")]
    RunFailed(String),
}

/// Ordered events of one remote generation run.
///
/// Order is generation order and must be preserved by implementations; the
/// reducer relies on it.
pub type EventStream = BoxStream<'static, Result<StreamEvent, BackendError>>;

/// Raw content of a remote file, used to materialize download links.
#[derive(Clone, Debug)]
pub struct FetchedFile {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FetchedFile {
    /// Encode the content as a same-document `data:` href.
    pub fn to_data_href(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        format!("data:{};base64,{}", self.content_type, encoded)
    }
}

/// The remote conversation service, as seen from the session and reducer.
///
/// One implementation speaks the real HTTP surface; tests substitute an
/// in-memory mock.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    /// Create a fresh remote conversation thread.
    async fn create_session(&self) -> Result<SessionId, BackendError>;

    /// Append a user message to the thread before starting a run.
    async fn append_user_message(
        &self,
        session: &SessionId,
        text: &str,
    ) -> Result<(), BackendError>;

    /// Start a generation run and stream its events.
    async fn open_run_stream(
        &self,
        session: &SessionId,
        assistant_id: &str,
    ) -> Result<EventStream, BackendError>;

    /// Submit local tool outputs for a paused run; the returned stream is the
    /// continuation of the same turn.
    async fn submit_tool_outputs(
        &self,
        session: &SessionId,
        run: &RunId,
        outputs: Vec<ToolOutput>,
    ) -> Result<EventStream, BackendError>;

    /// Fetch the content of a run-generated file.
    async fn fetch_file(&self, file_id: &str) -> Result<FetchedFile, BackendError>;

    /// Discard the remote thread. Called on reset.
    async fn delete_session(&self, session: &SessionId) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_href_encodes_content() {
        let file = FetchedFile {
            content_type: "text/csv".to_string(),
            bytes: b"a,b\n1,2\n".to_vec(),
        };
        assert_eq!(file.to_data_href(), "data:text/csv;base64,YSxiCjEsMgo=");
    }
}
