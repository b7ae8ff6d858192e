/// Shared test helpers for the session and reducer test suites.
///
/// Provides `MockBackend` — a fully in-memory implementation of
/// [`AssistantBackend`] driven by pre-scripted event sequences.
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::StreamExt;

use crate::assistant::models::{RunId, SessionId, StreamEvent, ToolOutput};
use crate::assistant::services::backend::{
    AssistantBackend, BackendError, EventStream, FetchedFile,
};

/// In-memory mock of [`AssistantBackend`].
///
/// Scripts are consumed in order: `open_run_stream` and `submit_tool_outputs`
/// each pop the next one, so a turn with one tool round trip needs two
/// scripts queued.
pub(crate) struct MockBackend {
    scripts: Mutex<VecDeque<Vec<Result<StreamEvent, BackendError>>>>,
    sessions_created: AtomicUsize,
    appended: Mutex<Vec<(SessionId, String)>>,
    submitted: Mutex<Vec<(RunId, Vec<ToolOutput>)>>,
    deleted: Mutex<Vec<SessionId>>,
    files: Mutex<HashMap<String, FetchedFile>>,
    /// If set, `delete_session` fails with this message.
    delete_error: Mutex<Option<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            sessions_created: AtomicUsize::new(0),
            appended: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            files: Mutex::new(HashMap::new()),
            delete_error: Mutex::new(None),
        }
    }

    pub fn push_script(&self, events: Vec<Result<StreamEvent, BackendError>>) {
        self.scripts.lock().unwrap().push_back(events);
    }

    pub fn with_delete_error(error: &str) -> Self {
        let backend = Self::new();
        *backend.delete_error.lock().unwrap() = Some(error.to_string());
        backend
    }

    pub fn add_file(&self, file_id: &str, file: FetchedFile) {
        self.files.lock().unwrap().insert(file_id.to_string(), file);
    }

    /// Pop the next script as a stream, for driving the reducer directly.
    pub fn next_stream(&self) -> EventStream {
        let events = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("a script should be queued");
        futures::stream::iter(events).boxed()
    }

    pub fn sessions_created(&self) -> usize {
        self.sessions_created.load(Ordering::SeqCst)
    }

    pub fn appended_messages(&self) -> Vec<(SessionId, String)> {
        self.appended.lock().unwrap().clone()
    }

    pub fn submitted_outputs(&self) -> Vec<(RunId, Vec<ToolOutput>)> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn deleted_sessions(&self) -> Vec<SessionId> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssistantBackend for MockBackend {
    async fn create_session(&self) -> Result<SessionId, BackendError> {
        let n = self.sessions_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SessionId(format!("session-{n}")))
    }

    async fn append_user_message(
        &self,
        session: &SessionId,
        text: &str,
    ) -> Result<(), BackendError> {
        self.appended
            .lock()
            .unwrap()
            .push((session.clone(), text.to_string()));
        Ok(())
    }

    async fn open_run_stream(
        &self,
        _session: &SessionId,
        _assistant_id: &str,
    ) -> Result<EventStream, BackendError> {
        Ok(self.next_stream())
    }

    async fn submit_tool_outputs(
        &self,
        _session: &SessionId,
        run: &RunId,
        outputs: Vec<ToolOutput>,
    ) -> Result<EventStream, BackendError> {
        self.submitted.lock().unwrap().push((run.clone(), outputs));
        Ok(self.next_stream())
    }

    async fn fetch_file(&self, file_id: &str) -> Result<FetchedFile, BackendError> {
        self.files
            .lock()
            .unwrap()
            .get(file_id)
            .cloned()
            .ok_or_else(|| BackendError::Api {
                status: 404,
                message: format!("file {file_id} not found"),
            })
    }

    async fn delete_session(&self, session: &SessionId) -> Result<(), BackendError> {
        if let Some(message) = self.delete_error.lock().unwrap().clone() {
            return Err(BackendError::Transport(message));
        }
        self.deleted.lock().unwrap().push(session.clone());
        Ok(())
    }
}
