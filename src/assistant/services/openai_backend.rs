use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::assistant::models::{
    Annotation, AnnotationKind, FinishedToolCall, LocalActionCall, RunId, SessionId, StreamEvent,
    ToolCallKind, ToolOutput,
};
use crate::assistant::services::backend::{
    AssistantBackend, BackendError, EventStream, FetchedFile,
};

/// Timeout for non-streaming requests
const REQUEST_TIMEOUT_SECS: u64 = 30;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const ASSISTANTS_BETA: &str = "assistants=v2";

/// HTTP implementation of [`AssistantBackend`] over the hosted assistants
/// REST surface (threads / runs / files) with server-sent-event streaming.
///
/// The wire protocol streams text as fragments; this adapter accumulates them
/// so every emitted [`StreamEvent::TextDelta`] carries the full snapshot, as
/// the reducer's latest-snapshot-wins policy expects.
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiBackend {
    pub fn new(api_key: &str) -> Result<Self, BackendError> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|err| BackendError::Transport(format!("invalid API key: {err}")))?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert("OpenAI-Beta", HeaderValue::from_static(ASSISTANTS_BETA));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent("ludobot/0.1")
            .build()
            .map_err(|err| BackendError::Transport(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post_json(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, BackendError> {
        let response = self
            .client
            .post(self.url(path))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .json(&body)
            .send()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|err| BackendError::Protocol(err.to_string()))
    }

    /// POST a streaming request and translate its SSE frames into events.
    async fn open_sse(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<EventStream, BackendError> {
        let response = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        let response = check_status(response).await?;
        debug!(path, "stream opened");
        Ok(sse_event_stream(response))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(BackendError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl AssistantBackend for OpenAiBackend {
    async fn create_session(&self) -> Result<SessionId, BackendError> {
        #[derive(Deserialize)]
        struct Created {
            id: String,
        }
        let value = self.post_json("/threads", json!({})).await?;
        let created: Created = serde_json::from_value(value)
            .map_err(|err| BackendError::Protocol(err.to_string()))?;
        Ok(SessionId(created.id))
    }

    async fn append_user_message(
        &self,
        session: &SessionId,
        text: &str,
    ) -> Result<(), BackendError> {
        self.post_json(
            &format!("/threads/{session}/messages"),
            json!({ "role": "user", "content": text, "attachments": [] }),
        )
        .await?;
        Ok(())
    }

    async fn open_run_stream(
        &self,
        session: &SessionId,
        assistant_id: &str,
    ) -> Result<EventStream, BackendError> {
        self.open_sse(
            &format!("/threads/{session}/runs"),
            json!({ "assistant_id": assistant_id, "stream": true }),
        )
        .await
    }

    async fn submit_tool_outputs(
        &self,
        session: &SessionId,
        run: &RunId,
        outputs: Vec<ToolOutput>,
    ) -> Result<EventStream, BackendError> {
        let tool_outputs: Vec<serde_json::Value> = outputs
            .iter()
            .map(|o| json!({ "tool_call_id": o.call_id, "output": o.output }))
            .collect();
        self.open_sse(
            &format!("/threads/{session}/runs/{run}/submit_tool_outputs"),
            json!({ "tool_outputs": tool_outputs, "stream": true }),
        )
        .await
    }

    async fn fetch_file(&self, file_id: &str) -> Result<FetchedFile, BackendError> {
        let response = self
            .client
            .get(self.url(&format!("/files/{file_id}/content")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        let response = check_status(response).await?;
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        Ok(FetchedFile {
            content_type,
            bytes: bytes.to_vec(),
        })
    }

    async fn delete_session(&self, session: &SessionId) -> Result<(), BackendError> {
        let response = self
            .client
            .delete(self.url(&format!("/threads/{session}")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        check_status(response).await?;
        Ok(())
    }
}

/// Turn a streaming HTTP response body into typed stream events.
fn sse_event_stream(response: reqwest::Response) -> EventStream {
    Box::pin(async_stream::stream! {
        let mut body = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        let mut translator = WireTranslator::default();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    yield Err(BackendError::Transport(err.to_string()));
                    return;
                }
            };
            buffer.extend_from_slice(&chunk);

            // Frames are separated by a blank line.
            while let Some(pos) = find_frame_boundary(&buffer) {
                let frame: Vec<u8> = buffer.drain(..pos + 2).collect();
                let frame = String::from_utf8_lossy(&frame[..pos]).into_owned();
                match translator.translate_frame(&frame) {
                    Ok(events) => {
                        for event in events {
                            yield Ok(event);
                        }
                    }
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                }
            }
        }
    })
}

fn find_frame_boundary(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Stateful frame-to-event translation.
///
/// Holds the running text of the in-flight message so fragment deltas can be
/// re-emitted as whole snapshots.
#[derive(Default)]
struct WireTranslator {
    text_snapshot: String,
}

impl WireTranslator {
    fn translate_frame(&mut self, frame: &str) -> Result<Vec<StreamEvent>, BackendError> {
        let mut event_name = "";
        let mut data_lines: Vec<&str> = Vec::new();
        for line in frame.lines() {
            if let Some(rest) = line.strip_prefix("event:") {
                event_name = rest.trim();
            } else if let Some(rest) = line.strip_prefix("data:") {
                data_lines.push(rest.trim_start());
            }
        }
        let data = data_lines.join("\n");
        if data.is_empty() || data == "[DONE]" {
            return Ok(Vec::new());
        }

        match event_name {
            "thread.message.created" => {
                self.text_snapshot.clear();
                Ok(vec![StreamEvent::TextCreated])
            }
            "thread.message.delta" => {
                let payload: MessageDeltaPayload = parse(&data)?;
                for part in payload.delta.content {
                    if let Some(value) = part.text.and_then(|t| t.value) {
                        self.text_snapshot.push_str(&value);
                    }
                }
                Ok(vec![StreamEvent::TextDelta {
                    snapshot: self.text_snapshot.clone(),
                }])
            }
            "thread.message.completed" => {
                let payload: MessagePayload = parse(&data)?;
                let Some(text) = payload
                    .content
                    .into_iter()
                    .find_map(|part| (part.kind == "text").then_some(part.text).flatten())
                else {
                    return Ok(Vec::new());
                };
                Ok(vec![StreamEvent::TextDone {
                    text: text.value,
                    annotations: text
                        .annotations
                        .into_iter()
                        .filter_map(translate_annotation)
                        .collect(),
                }])
            }
            "thread.run.step.created" => {
                let payload: StepPayload = parse(&data)?;
                let Some(details) = payload.step_details.filter(|d| d.kind == "tool_calls")
                else {
                    return Ok(Vec::new());
                };
                let kind = details
                    .tool_calls
                    .first()
                    .and_then(|call| call.kind.as_deref())
                    .map(parse_kind)
                    .unwrap_or(ToolCallKind::CodeInterpreter);
                Ok(vec![StreamEvent::ToolCallCreated { kind }])
            }
            "thread.run.step.delta" => {
                let payload: StepDeltaPayload = parse(&data)?;
                let Some(details) = payload.delta.step_details else {
                    return Ok(Vec::new());
                };
                let mut events = Vec::new();
                for call in details.tool_calls {
                    match call.kind.as_deref() {
                        Some("code_interpreter") => {
                            let Some(ci) = call.code_interpreter else { continue };
                            if let Some(input) = ci.input.filter(|i| !i.is_empty()) {
                                events.push(StreamEvent::ToolCallDelta {
                                    kind: ToolCallKind::CodeInterpreter,
                                    partial_input: Some(input),
                                    log_output: None,
                                });
                            }
                            for output in ci.outputs {
                                if output.kind == "logs" {
                                    if let Some(logs) = output.logs {
                                        events.push(StreamEvent::ToolCallDelta {
                                            kind: ToolCallKind::CodeInterpreter,
                                            partial_input: None,
                                            log_output: Some(logs),
                                        });
                                    }
                                }
                            }
                        }
                        Some("function") => {
                            if let Some(arguments) =
                                call.function.and_then(|f| f.arguments).filter(|a| !a.is_empty())
                            {
                                events.push(StreamEvent::ToolCallDelta {
                                    kind: ToolCallKind::Function,
                                    partial_input: Some(arguments),
                                    log_output: None,
                                });
                            }
                        }
                        _ => {}
                    }
                }
                Ok(events)
            }
            "thread.run.step.completed" => {
                let payload: StepPayload = parse(&data)?;
                let Some(details) = payload.step_details.filter(|d| d.kind == "tool_calls")
                else {
                    return Ok(Vec::new());
                };
                Ok(details
                    .tool_calls
                    .into_iter()
                    .filter_map(translate_finished_call)
                    .map(|call| StreamEvent::ToolCallDone { call })
                    .collect())
            }
            "thread.run.requires_action" => {
                let payload: RunPayload = parse(&data)?;
                let Some(action) = payload.required_action else {
                    return Ok(Vec::new());
                };
                let calls = action
                    .submit_tool_outputs
                    .tool_calls
                    .into_iter()
                    .map(|call| LocalActionCall {
                        id: call.id,
                        name: call.function.name,
                        arguments_json: call.function.arguments,
                    })
                    .collect();
                Ok(vec![StreamEvent::RequiresLocalAction {
                    run_id: RunId(payload.id),
                    calls,
                }])
            }
            "thread.run.failed" | "thread.run.expired" => {
                let payload: RunPayload = parse(&data)?;
                let message = payload
                    .last_error
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| event_name.to_string());
                Err(BackendError::RunFailed(message))
            }
            // Lifecycle events with no rendering consequence.
            _ => Ok(Vec::new()),
        }
    }
}

fn parse<'de, T: Deserialize<'de>>(data: &'de str) -> Result<T, BackendError> {
    serde_json::from_str(data).map_err(|err| BackendError::Protocol(err.to_string()))
}

fn parse_kind(kind: &str) -> ToolCallKind {
    match kind {
        "code_interpreter" => ToolCallKind::CodeInterpreter,
        "function" => ToolCallKind::Function,
        _ => ToolCallKind::Other,
    }
}

fn translate_annotation(annotation: WireAnnotation) -> Option<Annotation> {
    let kind = match annotation.kind.as_str() {
        // The wire identifies cited files by id only; the id doubles as the
        // displayed name.
        "file_citation" => {
            let citation = annotation.file_citation?;
            AnnotationKind::FileCitation {
                quote: citation.quote.unwrap_or_default(),
                filename: citation.file_id,
            }
        }
        "file_path" => AnnotationKind::FilePath {
            file_id: annotation.file_path?.file_id,
            download_href: None,
        },
        other => {
            warn!(kind = other, "dropping annotation of unknown kind");
            return None;
        }
    };
    Some(Annotation {
        matched_span: annotation.text,
        kind,
    })
}

fn translate_finished_call(call: StepToolCall) -> Option<FinishedToolCall> {
    let id = call.id?;
    let kind = call.kind.as_deref().map(parse_kind)?;
    let (input, log_outputs) = match kind {
        ToolCallKind::CodeInterpreter => {
            let ci = call.code_interpreter?;
            let logs = ci
                .outputs
                .into_iter()
                .filter(|o| o.kind == "logs")
                .filter_map(|o| o.logs)
                .collect();
            (ci.input.unwrap_or_default(), logs)
        }
        ToolCallKind::Function => (
            call.function.and_then(|f| f.arguments).unwrap_or_default(),
            Vec::new(),
        ),
        ToolCallKind::Other => (String::new(), Vec::new()),
    };
    Some(FinishedToolCall {
        id,
        kind,
        input,
        log_outputs,
    })
}

// Wire DTOs. Only the fields the translator reads are modeled.

#[derive(Deserialize)]
struct MessagePayload {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    text: Option<TextPart>,
}

#[derive(Deserialize)]
struct TextPart {
    value: String,
    #[serde(default)]
    annotations: Vec<WireAnnotation>,
}

#[derive(Deserialize)]
struct WireAnnotation {
    #[serde(rename = "type")]
    kind: String,
    text: String,
    file_citation: Option<WireFileCitation>,
    file_path: Option<WireFilePath>,
}

#[derive(Deserialize)]
struct WireFileCitation {
    #[serde(default)]
    quote: Option<String>,
    file_id: String,
}

#[derive(Deserialize)]
struct WireFilePath {
    file_id: String,
}

#[derive(Deserialize)]
struct MessageDeltaPayload {
    delta: MessageDelta,
}

#[derive(Deserialize)]
struct MessageDelta {
    #[serde(default)]
    content: Vec<DeltaContentPart>,
}

#[derive(Deserialize)]
struct DeltaContentPart {
    text: Option<DeltaText>,
}

#[derive(Deserialize)]
struct DeltaText {
    value: Option<String>,
}

#[derive(Deserialize)]
struct StepPayload {
    step_details: Option<StepDetails>,
}

#[derive(Deserialize)]
struct StepDeltaPayload {
    delta: StepDelta,
}

#[derive(Deserialize)]
struct StepDelta {
    step_details: Option<StepDetails>,
}

#[derive(Deserialize)]
struct StepDetails {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    tool_calls: Vec<StepToolCall>,
}

#[derive(Deserialize)]
struct StepToolCall {
    id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    code_interpreter: Option<WireCodeInterpreter>,
    function: Option<WireStepFunction>,
}

#[derive(Deserialize)]
struct WireCodeInterpreter {
    input: Option<String>,
    #[serde(default)]
    outputs: Vec<WireCiOutput>,
}

#[derive(Deserialize)]
struct WireCiOutput {
    #[serde(rename = "type")]
    kind: String,
    logs: Option<String>,
}

#[derive(Deserialize)]
struct WireStepFunction {
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct RunPayload {
    id: String,
    required_action: Option<RequiredAction>,
    last_error: Option<LastError>,
}

#[derive(Deserialize)]
struct RequiredAction {
    submit_tool_outputs: SubmitToolOutputs,
}

#[derive(Deserialize)]
struct SubmitToolOutputs {
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct LastError {
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: &str, data: &str) -> String {
        let data_lines = data
            .lines()
            .map(|line| format!("data: {line}"))
            .collect::<Vec<_>>()
            .join("\n");
        format!("event: {event}\n{data_lines}")
    }

    #[test]
    fn message_deltas_accumulate_into_snapshots() {
        let mut translator = WireTranslator::default();
        assert_eq!(
            translator
                .translate_frame(&frame("thread.message.created", r#"{"id":"msg_1"}"#))
                .unwrap(),
            vec![StreamEvent::TextCreated]
        );

        let delta = |fragment: &str| {
            frame(
                "thread.message.delta",
                &format!(
                    r#"{{"id":"msg_1","delta":{{"content":[{{"index":0,"type":"text","text":{{"value":"{fragment}"}}}}]}}}}"#
                ),
            )
        };
        assert_eq!(
            translator.translate_frame(&delta("Try Ca")).unwrap(),
            vec![StreamEvent::TextDelta {
                snapshot: "Try Ca".to_string()
            }]
        );
        assert_eq!(
            translator.translate_frame(&delta("tan!")).unwrap(),
            vec![StreamEvent::TextDelta {
                snapshot: "Try Catan!".to_string()
            }]
        );
    }

    #[test]
    fn completed_message_carries_annotations() {
        let data = r#"{
            "id": "msg_1",
            "content": [{
                "type": "text",
                "text": {
                    "value": "Great game【0】",
                    "annotations": [{
                        "type": "file_citation",
                        "text": "【0】",
                        "file_citation": { "quote": "a quote", "file_id": "file-9" }
                    }]
                }
            }]
        }"#;
        let mut translator = WireTranslator::default();
        let events = translator
            .translate_frame(&frame("thread.message.completed", data))
            .unwrap();
        assert_eq!(
            events,
            vec![StreamEvent::TextDone {
                text: "Great game【0】".to_string(),
                annotations: vec![Annotation {
                    matched_span: "【0】".to_string(),
                    kind: AnnotationKind::FileCitation {
                        quote: "a quote".to_string(),
                        filename: "file-9".to_string(),
                    },
                }],
            }]
        );
    }

    #[test]
    fn requires_action_maps_to_local_action_calls() {
        let data = r#"{
            "id": "run_7",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "shuffle_picks", "arguments": "{\"count\":3}" }
                    }]
                }
            }
        }"#;
        let mut translator = WireTranslator::default();
        let events = translator
            .translate_frame(&frame("thread.run.requires_action", data))
            .unwrap();
        assert_eq!(
            events,
            vec![StreamEvent::RequiresLocalAction {
                run_id: RunId("run_7".to_string()),
                calls: vec![LocalActionCall {
                    id: "call_1".to_string(),
                    name: "shuffle_picks".to_string(),
                    arguments_json: "{\"count\":3}".to_string(),
                }],
            }]
        );
    }

    #[test]
    fn step_delta_splits_input_and_logs() {
        let data = r#"{
            "id": "step_1",
            "delta": {
                "step_details": {
                    "type": "tool_calls",
                    "tool_calls": [{
                        "index": 0,
                        "type": "code_interpreter",
                        "code_interpreter": {
                            "input": "print(1)",
                            "outputs": [{ "type": "logs", "logs": "1" }]
                        }
                    }]
                }
            }
        }"#;
        let mut translator = WireTranslator::default();
        let events = translator
            .translate_frame(&frame("thread.run.step.delta", data))
            .unwrap();
        assert_eq!(
            events,
            vec![
                StreamEvent::ToolCallDelta {
                    kind: ToolCallKind::CodeInterpreter,
                    partial_input: Some("print(1)".to_string()),
                    log_output: None,
                },
                StreamEvent::ToolCallDelta {
                    kind: ToolCallKind::CodeInterpreter,
                    partial_input: None,
                    log_output: Some("1".to_string()),
                },
            ]
        );
    }

    #[test]
    fn completed_step_finalizes_the_call() {
        let data = r#"{
            "id": "step_1",
            "step_details": {
                "type": "tool_calls",
                "tool_calls": [{
                    "id": "call_9",
                    "type": "code_interpreter",
                    "code_interpreter": {
                        "input": "print(1)",
                        "outputs": [{ "type": "logs", "logs": "1" }, { "type": "image" }]
                    }
                }]
            }
        }"#;
        let mut translator = WireTranslator::default();
        let events = translator
            .translate_frame(&frame("thread.run.step.completed", data))
            .unwrap();
        assert_eq!(
            events,
            vec![StreamEvent::ToolCallDone {
                call: FinishedToolCall {
                    id: "call_9".to_string(),
                    kind: ToolCallKind::CodeInterpreter,
                    input: "print(1)".to_string(),
                    log_outputs: vec!["1".to_string()],
                },
            }]
        );
    }

    #[test]
    fn run_failure_surfaces_the_remote_error() {
        let data = r#"{"id":"run_1","last_error":{"code":"rate_limit_exceeded","message":"over quota"}}"#;
        let mut translator = WireTranslator::default();
        let err = translator
            .translate_frame(&frame("thread.run.failed", data))
            .unwrap_err();
        assert!(matches!(err, BackendError::RunFailed(ref m) if m == "over quota"));
    }

    #[test]
    fn done_marker_and_unknown_events_produce_nothing() {
        let mut translator = WireTranslator::default();
        assert!(translator.translate_frame("data: [DONE]").unwrap().is_empty());
        assert!(
            translator
                .translate_frame(&frame("thread.run.queued", r#"{"id":"run_1"}"#))
                .unwrap()
                .is_empty()
        );
    }
}
