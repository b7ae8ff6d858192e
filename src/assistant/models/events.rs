use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle to a remote conversation thread.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle to one remote generation run within a session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of tool call the remote model is streaming.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallKind {
    CodeInterpreter,
    Function,
    Other,
}

/// One function the remote model asks the caller to execute locally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalActionCall {
    pub id: String,
    pub name: String,
    /// Serialized argument object, exactly as sent by the remote service.
    pub arguments_json: String,
}

/// Result of one local function call, keyed back to the requesting call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    pub call_id: String,
    pub output: String,
}

/// A fully streamed tool call, as delivered by the finalization event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinishedToolCall {
    pub id: String,
    pub kind: ToolCallKind,
    pub input: String,
    /// Log-typed outputs, in emission order. Other output kinds are dropped
    /// by the wire adapter.
    pub log_outputs: Vec<String>,
}

/// Structured citation attached to a finalized message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Annotation {
    /// The exact span of the raw text this annotation refers to.
    pub matched_span: String,
    pub kind: AnnotationKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnnotationKind {
    /// A quotation from a file in the remote knowledge store.
    FileCitation { quote: String, filename: String },
    /// A file generated during the run. `download_href` is filled in once the
    /// file content has been fetched and materialized; `None` means the remote
    /// service could not (or has not yet) resolved the file.
    FilePath {
        file_id: String,
        download_href: Option<String>,
    },
}

/// One unit of the remote service's incremental response protocol.
///
/// Order within a stream is generation order and is significant; the reducer
/// never reorders or deduplicates events, with the single exception of the
/// duplicate-`ToolCallDone` guard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// A new assistant message has started.
    TextCreated,
    /// The message grew. `snapshot` carries the ENTIRE text so far, not the
    /// new fragment; rendering policy is latest-snapshot-wins.
    TextDelta { snapshot: String },
    /// The message is complete.
    TextDone {
        text: String,
        annotations: Vec<Annotation>,
    },
    /// The model opened a tool call of the given kind.
    ToolCallCreated { kind: ToolCallKind },
    /// Incremental tool-call content. Unlike text deltas these carry
    /// fragments; the reducer accumulates them per in-flight call.
    ToolCallDelta {
        kind: ToolCallKind,
        partial_input: Option<String>,
        log_output: Option<String>,
    },
    /// The tool call finished streaming.
    ToolCallDone { call: FinishedToolCall },
    /// Generation is paused until the caller executes the named functions and
    /// submits their outputs against `run_id`.
    RequiresLocalAction {
        run_id: RunId,
        calls: Vec<LocalActionCall>,
    },
}
