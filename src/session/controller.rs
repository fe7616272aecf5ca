//! Session controller
//!
//! Owns the recognition handles, the session state and the presentation
//! sink. Every engine event passes through [`SessionController::handle_message`]
//! on a single thread, so transitions never overlap: events delivered while a
//! transition runs wait in the queue.

use super::state::{Outcome, SessionState, Transition, TransitionTable};
use crate::engine::{EngineError, EngineEvent, HandleId, RecognitionHandle};
use crate::grammar::{GrammarRegistry, Language, RegistryError, SearchId};
use crate::presentation::PresentationSink;
use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Messages consumed by the controller thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMessage {
    /// Event reported by the engine behind `handle`
    Engine { handle: HandleId, event: EngineEvent },
    /// Stop every engine and end the controller loop
    Shutdown,
}

/// Controller errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("No recognition handles configured")]
    NoHandles,

    #[error("No recognition handle serves language {0}")]
    NoHandleFor(Language),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Snapshot of the session, readable from any thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Language of the active handle
    pub language: Language,
    /// Active search
    pub search: SearchId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carried_text: Option<String>,
    pub live_text: String,
    /// Completed transitions since startup
    pub transitions: u64,
    /// Events dropped because their handle was not active
    pub stale_events_ignored: u64,
    /// Failed transitions recovered by returning to the wake search
    pub fallbacks: u64,
    /// Whether the controller is still processing events
    pub running: bool,
}

/// State machine driving the recognition handles
pub struct SessionController {
    registry: Arc<GrammarRegistry>,
    table: TransitionTable,
    handles: Vec<RecognitionHandle>,
    sink: Box<dyn PresentationSink>,
    state: SessionState,
    status: Arc<RwLock<SessionStatus>>,
    transitions: u64,
    stale_events: u64,
    fallbacks: u64,
    running: bool,
}

impl SessionController {
    /// Enter the wake search on the default (first) handle
    ///
    /// Failure here is a startup failure: it is shown as the caption and
    /// returned.
    pub fn start(
        registry: Arc<GrammarRegistry>,
        table: TransitionTable,
        mut handles: Vec<RecognitionHandle>,
        sink: Box<dyn PresentationSink>,
    ) -> Result<Self, SessionError> {
        let result = Self::enter_wake(&registry, &mut handles);
        let caption = match result {
            Ok(caption) => caption,
            Err(e) => {
                tracing::error!("Failed to start session: {}", e);
                sink.set_caption(&format!("Failed to init recognizer: {}", e));
                return Err(e);
            }
        };

        let default = &handles[0];
        let state = SessionState::new(default.id(), SearchId::Wake);
        let status = SessionStatus {
            language: default.language(),
            search: SearchId::Wake,
            carried_text: None,
            live_text: String::new(),
            transitions: 0,
            stale_events_ignored: 0,
            fallbacks: 0,
            running: true,
        };

        sink.set_caption(&caption);
        tracing::info!(
            "Session started: {} on {} ({})",
            SearchId::Wake,
            default.id(),
            default.language()
        );

        Ok(Self {
            registry,
            table,
            handles,
            sink,
            state,
            status: Arc::new(RwLock::new(status)),
            transitions: 0,
            stale_events: 0,
            fallbacks: 0,
            running: true,
        })
    }

    fn enter_wake(
        registry: &GrammarRegistry,
        handles: &mut [RecognitionHandle],
    ) -> Result<String, SessionError> {
        let caption = registry.caption(SearchId::Wake)?.to_string();
        let (default, others) = handles.split_first_mut().ok_or(SessionError::NoHandles)?;
        for handle in others {
            handle.stop();
        }
        default.start(SearchId::Wake)?;
        Ok(caption)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn handles(&self) -> &[RecognitionHandle] {
        &self.handles
    }

    /// The handle currently receiving audio
    pub fn active_handle(&self) -> &RecognitionHandle {
        &self.handles[self.active_index()]
    }

    /// Number of handles that report themselves as decoding
    pub fn decoding_count(&self) -> usize {
        self.handles.iter().filter(|h| h.is_decoding()).count()
    }

    /// Shared status snapshot, updated after every message
    pub fn status_handle(&self) -> Arc<RwLock<SessionStatus>> {
        self.status.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.status.read().clone()
    }

    /// Drain the queue until shutdown or until every sender is gone
    pub fn run(mut self, receiver: Receiver<SessionMessage>) -> SessionStatus {
        tracing::info!("Session controller running");
        while let Ok(message) = receiver.recv() {
            if !self.handle_message(message) {
                return self.status();
            }
        }

        tracing::info!("Session queue disconnected");
        self.shutdown();
        self.status()
    }

    /// Process one message; returns false once the session has shut down
    ///
    /// A session also ends when recovery from a failed transition leaves no
    /// handle decoding.
    pub fn handle_message(&mut self, message: SessionMessage) -> bool {
        if !self.running {
            tracing::debug!("Session stopped, dropping {:?}", message);
            return false;
        }

        match message {
            SessionMessage::Engine { handle, event } => {
                self.handle_event(handle, event);
                self.running
            }
            SessionMessage::Shutdown => {
                self.shutdown();
                false
            }
        }
    }

    /// Apply one engine event
    pub fn handle_event(&mut self, from: HandleId, event: EngineEvent) {
        if from != self.state.active_handle {
            self.stale_events += 1;
            tracing::debug!(
                "Ignoring stale {:?} from {} (active: {})",
                event,
                from,
                self.state.active_handle
            );
            self.publish_status();
            return;
        }

        match self.table.evaluate(&self.state, &event) {
            Outcome::Transition(transition) => self.apply(transition),
            Outcome::LiveText(text) => {
                self.sink.set_live_text(&text);
                self.state.live_text = text;
            }
            Outcome::Final { notify } => {
                self.state.live_text.clear();
                self.sink.set_live_text("");
                if let Some(text) = notify {
                    tracing::info!("Recognized: {}", text);
                    self.sink.notify(&text);
                }
            }
            Outcome::Ignore => {
                tracing::trace!("No action for {:?} in {}", event, self.state.search);
            }
        }

        self.publish_status();
    }

    /// Stop every handle
    pub fn shutdown(&mut self) {
        for handle in &mut self.handles {
            handle.stop();
        }
        self.running = false;
        self.status.write().running = false;
        tracing::info!(
            "Session stopped after {} transitions ({} stale events ignored)",
            self.transitions,
            self.stale_events
        );
    }

    fn apply(&mut self, transition: Transition) {
        match self.enter(transition.target, transition.carried_text.clone()) {
            Ok(()) => {
                self.transitions += 1;
                tracing::info!(
                    "Session transition: {} -> {} (reason: {:?})",
                    transition.from,
                    transition.target,
                    transition.reason
                );
            }
            Err(e) => {
                tracing::warn!(
                    "Transition {} -> {} failed: {}",
                    transition.from,
                    transition.target,
                    e
                );
                self.fall_back(&e);
            }
        }
    }

    /// Move to `target`, switching handles if it lives on another one
    fn enter(&mut self, target: SearchId, carried: Option<String>) -> Result<(), SessionError> {
        // Resolve everything that can fail before touching the engines
        let caption = self.registry.caption(target)?;
        let target_index = self.handle_index_for(target)?;
        let active_index = self.active_index();

        if target_index != active_index {
            self.handles[active_index].stop();
        }

        let handle = &mut self.handles[target_index];
        self.state.active_handle = handle.id();
        handle.start(target)?;

        let caption = match carried.as_deref() {
            Some(text) if !text.is_empty() => format!("{}\n{}", text, caption),
            _ => caption.to_string(),
        };

        self.state.search = target;
        self.state.carried_text = carried;
        self.state.live_text.clear();
        self.sink.set_live_text("");
        self.sink.set_caption(&caption);
        Ok(())
    }

    /// Recover from a failed transition by re-entering wake on the default handle
    ///
    /// If wake cannot be restarted either, nothing is left decoding and the
    /// session stops.
    fn fall_back(&mut self, error: &SessionError) {
        self.fallbacks += 1;

        let (default, others) = match self.handles.split_first_mut() {
            Some(split) => split,
            None => return,
        };
        for handle in others {
            handle.stop();
        }

        self.state.active_handle = default.id();
        self.state.carried_text = None;
        self.state.live_text.clear();

        match default.start(SearchId::Wake) {
            Ok(()) => {
                self.state.search = SearchId::Wake;
                tracing::info!("Fell back to {} on {}", SearchId::Wake, default.id());
                if let Ok(caption) = self.registry.caption(SearchId::Wake) {
                    self.sink.set_caption(caption);
                }
            }
            Err(e) => {
                tracing::error!("Fallback to {} failed, stopping session: {}", SearchId::Wake, e);
                self.sink.set_caption(&format!("Recognizer stopped: {}", e));
                self.shutdown();
            }
        }

        self.sink.set_live_text("");
        self.sink.notify(&format!("Recognizer error: {}", error));
    }

    fn active_index(&self) -> usize {
        self.handles
            .iter()
            .position(|h| h.id() == self.state.active_handle)
            .unwrap_or(0)
    }

    /// Index of the handle that runs `search`
    ///
    /// Language-neutral searches run on the default handle.
    fn handle_index_for(&self, search: SearchId) -> Result<usize, SessionError> {
        match search.language() {
            None => Ok(0),
            Some(lang) => self
                .handles
                .iter()
                .position(|h| h.language() == lang)
                .ok_or(SessionError::NoHandleFor(lang)),
        }
    }

    fn publish_status(&self) {
        let active = self.active_handle();
        let mut status = self.status.write();
        status.language = active.language();
        status.search = self.state.search;
        status.carried_text = self.state.carried_text.clone();
        status.live_text = self.state.live_text.clone();
        status.transitions = self.transitions;
        status.stale_events_ignored = self.stale_events;
        status.fallbacks = self.fallbacks;
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state)
            .field("handles", &self.handles)
            .finish()
    }
}
