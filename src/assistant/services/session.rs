use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::assistant::models::{SessionId, Speaker, TranscriptStore};
use crate::assistant::services::backend::AssistantBackend;
use crate::assistant::services::stream_reducer::{
    ReducerOptions, RenderEvent, StreamReducer, TurnError,
};
use crate::assistant::tools::ToolRegistry;
use crate::presets::Preset;

/// Behavior configuration for a conversation session.
///
/// The reset-guard and live-log knobs exist because the shipped page variants
/// disagreed on both; neither choice is mandated.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Remote assistant to run against.
    pub assistant_id: String,
    /// Maximum wait for the next stream event before the turn fails.
    pub event_timeout: Duration,
    /// Swallow a failing remote-session delete during reset.
    pub guarded_reset: bool,
    /// Show tool log output as it streams instead of only at finalization.
    pub live_tool_logs: bool,
    /// Full citation-formatting pass on finalized text; off strips markers only.
    pub format_citations: bool,
    /// Whether the surrounding UI offers file upload. Carried as configuration
    /// only; no upload path exists in the terminal client.
    pub file_upload_enabled: bool,
}

impl SessionConfig {
    pub fn new(assistant_id: impl Into<String>) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            event_timeout: Duration::from_secs(120),
            guarded_reset: true,
            live_tool_logs: false,
            format_citations: true,
            file_upload_enabled: false,
        }
    }

    fn reducer_options(&self) -> ReducerOptions {
        ReducerOptions {
            event_timeout: self.event_timeout,
            live_tool_logs: self.live_tool_logs,
            format_citations: self.format_citations,
        }
    }
}

/// One user-visible conversation against the remote assistant.
///
/// Owns the remote session identifier and the transcript for its whole
/// lifetime. The remote session is created lazily on the first submit and
/// reused for every following turn until an explicit reset discards it.
pub struct ConversationSession {
    backend: Arc<dyn AssistantBackend>,
    tools: ToolRegistry,
    config: SessionConfig,
    transcript: TranscriptStore,
    session_id: Option<SessionId>,
    in_progress: bool,
    render: UnboundedSender<RenderEvent>,
}

impl ConversationSession {
    /// Build a session and the render-event receiver the UI drains.
    pub fn new(
        backend: Arc<dyn AssistantBackend>,
        tools: ToolRegistry,
        config: SessionConfig,
    ) -> (Self, UnboundedReceiver<RenderEvent>) {
        let (render, receiver) = mpsc::unbounded_channel();
        (
            Self {
                backend,
                tools,
                config,
                transcript: TranscriptStore::new(),
                session_id: None,
                in_progress: false,
                render,
            },
            receiver,
        )
    }

    pub fn transcript(&self) -> &TranscriptStore {
        &self.transcript
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn is_turn_in_progress(&self) -> bool {
        self.in_progress
    }

    /// Run one full turn: ensure the remote session exists, append the user
    /// message, then drive the response stream to completion.
    ///
    /// The in-progress flag is cleared on every exit path; a failed turn
    /// keeps whatever partial transcript was already sealed.
    pub async fn submit(&mut self, user_text: &str) -> Result<(), TurnError> {
        if self.in_progress {
            return Err(TurnError::TurnInProgress);
        }
        self.in_progress = true;
        let result = self.run_turn(user_text).await;
        self.in_progress = false;
        if let Err(err) = &result {
            warn!(error = %err, "turn failed; partial transcript retained");
        }
        result
    }

    /// Submit one of the canned starter prompts.
    pub async fn submit_preset(&mut self, preset: Preset) -> Result<(), TurnError> {
        self.submit(preset.prompt()).await
    }

    async fn run_turn(&mut self, user_text: &str) -> Result<(), TurnError> {
        let session_id = match &self.session_id {
            Some(id) => id.clone(),
            None => {
                let id = self.backend.create_session().await?;
                info!(session = %id, "created remote session");
                self.session_id = Some(id.clone());
                id
            }
        };

        // The user entry is sealed before anything streams back.
        self.transcript.append(Speaker::User, user_text);
        self.backend
            .append_user_message(&session_id, user_text)
            .await?;

        let stream = self
            .backend
            .open_run_stream(&session_id, &self.config.assistant_id)
            .await?;
        let reducer = StreamReducer::new(
            Arc::clone(&self.backend),
            session_id,
            &self.tools,
            &mut self.transcript,
            self.render.clone(),
            self.config.reducer_options(),
        );
        reducer.run(stream).await
    }

    /// Discard the remote session and clear the transcript, atomically: the
    /// transcript is never left pointing at a session id that no longer
    /// exists. With `guarded_reset` a failing remote delete is swallowed.
    pub async fn reset(&mut self) -> Result<(), TurnError> {
        if self.in_progress {
            return Err(TurnError::TurnInProgress);
        }
        if let Some(id) = self.session_id.take() {
            match self.backend.delete_session(&id).await {
                Ok(()) => debug!(session = %id, "remote session discarded"),
                Err(err) if self.config.guarded_reset => {
                    debug!(session = %id, error = %err, "ignoring failed remote session delete");
                }
                Err(err) => {
                    // Local state is already discarded either way.
                    self.transcript.clear();
                    return Err(TurnError::Backend(err));
                }
            }
        }
        self.transcript.clear();
        Ok(())
    }
}
