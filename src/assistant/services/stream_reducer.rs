use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::future::BoxFuture;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::assistant::models::{
    Annotation, AnnotationKind, LocalActionCall, RunId, SessionId, Speaker, StreamEvent,
    ToolCallKind, ToolOutput, TranscriptStore,
};
use crate::assistant::services::annotation_formatter::{
    format_annotations, sanitize_live, strip_citation_markers,
};
use crate::assistant::services::backend::{AssistantBackend, BackendError, EventStream};
use crate::assistant::tools::ToolRegistry;

/// Incremental updates for whatever renders the conversation live.
///
/// Mirrors the transcript's growth: `MessageSealed` fires once per sealed
/// entry, the `*Updated` variants replace the single live slot in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderEvent {
    MessageStarted,
    /// Replace the live message slot with this (sanitized) snapshot.
    MessageUpdated { text: String },
    /// An assistant entry was sealed into the transcript.
    MessageSealed { text: String },
    CodeBlockStarted,
    /// Replace the live code-block slot with the accumulated input.
    CodeBlockUpdated { code: String },
    /// A live tool log chunk; emitted only when live logs are enabled.
    LogChunk { text: String },
}

/// Failure of one user turn.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("a turn is already in progress")]
    TurnInProgress,
    #[error("timed out waiting for the next stream event")]
    StreamTimeout,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Behavior knobs for the reducer, derived from the session config.
#[derive(Clone, Copy, Debug)]
pub struct ReducerOptions {
    /// Maximum wait for the next stream event before the turn fails.
    pub event_timeout: Duration,
    /// Show tool log output as it streams, instead of only at finalization.
    pub live_tool_logs: bool,
    /// Run the full citation-formatting pass on finalized text. When off,
    /// finalization only strips citation markers.
    pub format_citations: bool,
}

impl Default for ReducerOptions {
    fn default() -> Self {
        Self {
            event_timeout: Duration::from_secs(120),
            live_tool_logs: false,
            format_citations: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReducerState {
    Idle,
    StreamingText,
    StreamingToolInput,
}

/// Folds one ordered event stream into transcript mutations and render
/// events, dispatching requested local tool calls along the way.
///
/// All transcript mutations are append-only; once an entry is sealed no later
/// event touches it. Exactly one live render slot exists per in-flight
/// message or code block.
pub struct StreamReducer<'a> {
    backend: Arc<dyn AssistantBackend>,
    session: SessionId,
    tools: &'a ToolRegistry,
    transcript: &'a mut TranscriptStore,
    render: UnboundedSender<RenderEvent>,
    options: ReducerOptions,
    state: ReducerState,
    /// Call ids already sealed; guards against double-processing.
    sealed_calls: HashSet<String>,
    /// Accumulated input of the in-flight tool call. Reset on creation,
    /// discarded on finalization.
    pending_tool_input: String,
}

impl<'a> StreamReducer<'a> {
    pub fn new(
        backend: Arc<dyn AssistantBackend>,
        session: SessionId,
        tools: &'a ToolRegistry,
        transcript: &'a mut TranscriptStore,
        render: UnboundedSender<RenderEvent>,
        options: ReducerOptions,
    ) -> Self {
        Self {
            backend,
            session,
            tools,
            transcript,
            render,
            options,
            state: ReducerState::Idle,
            sealed_calls: HashSet::new(),
            pending_tool_input: String::new(),
        }
    }

    /// Drive the stream to exhaustion, including nested continuations.
    pub async fn run(mut self, stream: EventStream) -> Result<(), TurnError> {
        self.reduce(stream).await
    }

    /// Consume one event sequence. Boxed so continuation streams opened by
    /// `RequiresLocalAction` can be reduced recursively.
    fn reduce<'s>(&'s mut self, mut stream: EventStream) -> BoxFuture<'s, Result<(), TurnError>> {
        Box::pin(async move {
            loop {
                let next = tokio::time::timeout(self.options.event_timeout, stream.next())
                    .await
                    .map_err(|_| TurnError::StreamTimeout)?;
                let Some(event) = next else {
                    break;
                };
                self.apply(event?).await?;
            }
            Ok(())
        })
    }

    async fn apply(&mut self, event: StreamEvent) -> Result<(), TurnError> {
        match event {
            StreamEvent::TextCreated => {
                self.state = ReducerState::StreamingText;
                self.emit(RenderEvent::MessageStarted);
            }
            StreamEvent::TextDelta { snapshot } => {
                // The remote service occasionally sends empty first deltas.
                if snapshot.is_empty() {
                    return Ok(());
                }
                if self.state != ReducerState::StreamingText {
                    self.state = ReducerState::StreamingText;
                    self.emit(RenderEvent::MessageStarted);
                }
                // Snapshot deltas carry the full text so far: latest wins.
                self.emit(RenderEvent::MessageUpdated {
                    text: sanitize_live(&snapshot),
                });
            }
            StreamEvent::TextDone { text, annotations } => {
                let formatted = if self.options.format_citations {
                    let resolved = self.resolve_file_annotations(annotations).await;
                    format_annotations(&text, &resolved)
                } else {
                    strip_citation_markers(&text)
                };
                self.seal(formatted);
                self.state = ReducerState::Idle;
            }
            StreamEvent::ToolCallCreated { kind } => {
                if kind == ToolCallKind::CodeInterpreter {
                    self.pending_tool_input.clear();
                    self.state = ReducerState::StreamingToolInput;
                    self.emit(RenderEvent::CodeBlockStarted);
                }
            }
            StreamEvent::ToolCallDelta {
                kind,
                partial_input,
                log_output,
            } => {
                if kind != ToolCallKind::CodeInterpreter {
                    return Ok(());
                }
                if self.state != ReducerState::StreamingToolInput {
                    self.pending_tool_input.clear();
                    self.state = ReducerState::StreamingToolInput;
                    self.emit(RenderEvent::CodeBlockStarted);
                }
                if let Some(input) = partial_input.filter(|input| !input.is_empty()) {
                    self.pending_tool_input.push_str(&input);
                    self.emit(RenderEvent::CodeBlockUpdated {
                        code: render_code_input(&self.pending_tool_input),
                    });
                }
                if let Some(log) = log_output {
                    if self.options.live_tool_logs {
                        self.emit(RenderEvent::LogChunk { text: log });
                    } else {
                        // Deliberate noise reduction: logs only appear once
                        // the call is finalized.
                        debug!(len = log.len(), "suppressing live tool log chunk");
                    }
                }
            }
            StreamEvent::ToolCallDone { call } => {
                if !self.sealed_calls.insert(call.id.clone()) {
                    debug!(call_id = %call.id, "ignoring duplicate tool call finalization");
                    return Ok(());
                }
                if call.kind == ToolCallKind::CodeInterpreter {
                    let block = render_code_input(&call.input);
                    self.emit(RenderEvent::CodeBlockUpdated {
                        code: block.clone(),
                    });
                    self.seal(block);
                    for log in &call.log_outputs {
                        self.seal(render_code_output(log));
                    }
                    self.pending_tool_input.clear();
                }
                self.state = ReducerState::Idle;
            }
            StreamEvent::RequiresLocalAction { run_id, calls } => {
                self.handle_local_action(run_id, calls).await?;
                self.state = ReducerState::Idle;
            }
        }
        Ok(())
    }

    /// Execute the requested local functions and reduce the continuation
    /// stream their outputs unlock.
    async fn handle_local_action(
        &mut self,
        run_id: RunId,
        calls: Vec<LocalActionCall>,
    ) -> Result<(), TurnError> {
        let names: Vec<&str> = calls.iter().map(|call| call.name.as_str()).collect();
        self.seal(format!("### Function Calling: {}", names.join(", ")));

        let mut outputs = Vec::with_capacity(calls.len());
        for call in &calls {
            let output = match self.tools.invoke(&call.name, &call.arguments_json).await {
                Ok(output) => output,
                // Tool failures are surfaced to the model as output strings,
                // never as turn failures.
                Err(err) => {
                    warn!(call_id = %call.id, tool = %call.name, error = %err, "tool call failed");
                    err.to_string()
                }
            };
            outputs.push(ToolOutput {
                call_id: call.id.clone(),
                output,
            });
        }

        debug!(run = %run_id, outputs = outputs.len(), "submitting tool outputs");
        let continuation = self
            .backend
            .submit_tool_outputs(&self.session, &run_id, outputs)
            .await?;
        self.reduce(continuation).await
    }

    /// Materialize download hrefs for file-path annotations. Files the remote
    /// service can no longer resolve keep `None` and fall back to the raw
    /// marker during formatting.
    async fn resolve_file_annotations(&self, annotations: Vec<Annotation>) -> Vec<Annotation> {
        let mut resolved = annotations;
        for annotation in &mut resolved {
            if let AnnotationKind::FilePath {
                file_id,
                download_href: download_href @ None,
            } = &mut annotation.kind
            {
                match self.backend.fetch_file(file_id).await {
                    Ok(file) => *download_href = Some(file.to_data_href()),
                    Err(err) => {
                        warn!(file_id = %file_id, error = %err, "leaving file annotation unresolved");
                    }
                }
            }
        }
        resolved
    }

    fn seal(&mut self, text: String) {
        self.emit(RenderEvent::MessageSealed { text: text.clone() });
        self.transcript.append(Speaker::Assistant, text);
    }

    fn emit(&self, event: RenderEvent) {
        // A dropped receiver means nothing is rendering; the transcript is
        // still the source of truth.
        let _ = self.render.send(event);
    }
}

fn render_code_input(input: &str) -> String {
    format!("### code interpreter\ninput:\n```python\n{input}\n```")
}

fn render_code_output(logs: &str) -> String {
    format!("### code interpreter\noutput:\n```\n{logs}\n```")
}
