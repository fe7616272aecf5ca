//! Shared test doubles: a scriptable recognition engine and a recording sink.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use voicemenu::bootstrap::{self, Session};
use voicemenu::config::{AssetsConfig, Config, LoggingConfig};
use voicemenu::{
    EngineError, EngineFactory, EngineListener, EngineSetup, Language, PresentationSink,
    RecognitionEngine, SessionMessage,
};

// =============================================================================
// Fake engine
// =============================================================================

/// A call made into a fake engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Keyphrase(String, String),
    Grammar(String, PathBuf),
    Start(String),
    Stop,
}

/// Shared view into one fake engine: recorded calls plus its listener
#[derive(Clone, Default)]
pub struct EngineProbe {
    calls: Arc<Mutex<Vec<EngineCall>>>,
    listener: Arc<Mutex<Option<EngineListener>>>,
    fail_start: Arc<Mutex<Option<String>>>,
    setup: Arc<Mutex<Option<EngineSetup>>>,
}

impl EngineProbe {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    /// Names passed to `start_listening`, in order
    pub fn starts(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                EngineCall::Start(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn stop_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| **c == EngineCall::Stop)
            .count()
    }

    pub fn setup(&self) -> Option<EngineSetup> {
        self.setup.lock().clone()
    }

    /// Make `start_listening(name)` fail with a model load error
    pub fn fail_start_of(&self, name: &str) {
        *self.fail_start.lock() = Some(name.to_string());
    }

    fn listener(&self) -> EngineListener {
        self.listener
            .lock()
            .clone()
            .expect("listener attached during handle setup")
    }

    pub fn partial(&self, text: &str) {
        self.listener().on_partial(text);
    }

    pub fn final_result(&self, text: &str) {
        self.listener().on_final(text);
    }

    pub fn speech_begin(&self) {
        self.listener().on_speech_begin();
    }

    pub fn speech_end(&self) {
        self.listener().on_speech_end();
    }
}

pub struct FakeEngine {
    probe: EngineProbe,
}

impl RecognitionEngine for FakeEngine {
    fn add_keyphrase_search(&mut self, name: &str, keyphrase: &str) -> Result<(), EngineError> {
        self.probe
            .calls
            .lock()
            .push(EngineCall::Keyphrase(name.to_string(), keyphrase.to_string()));
        Ok(())
    }

    fn add_grammar_search(&mut self, name: &str, grammar: &Path) -> Result<(), EngineError> {
        self.probe
            .calls
            .lock()
            .push(EngineCall::Grammar(name.to_string(), grammar.to_path_buf()));
        Ok(())
    }

    fn start_listening(&mut self, name: &str) -> Result<(), EngineError> {
        if self.probe.fail_start.lock().as_deref() == Some(name) {
            return Err(EngineError::ModelLoad(format!("cannot load {}", name)));
        }
        self.probe
            .calls
            .lock()
            .push(EngineCall::Start(name.to_string()));
        Ok(())
    }

    fn stop(&mut self) {
        self.probe.calls.lock().push(EngineCall::Stop);
    }

    fn attach_listener(&mut self, listener: EngineListener) {
        *self.probe.listener.lock() = Some(listener);
    }
}

/// Hands out fake engines, one probe per language
#[derive(Default)]
pub struct FakeFactory {
    probes: Mutex<HashMap<Language, EngineProbe>>,
    fail_language: Option<Language>,
}

impl FakeFactory {
    pub fn failing_for(language: Language) -> Self {
        Self {
            fail_language: Some(language),
            ..Default::default()
        }
    }

    pub fn probe(&self, language: Language) -> EngineProbe {
        self.probes.lock().entry(language).or_default().clone()
    }
}

impl EngineFactory for FakeFactory {
    fn create(&self, setup: &EngineSetup) -> Result<Box<dyn RecognitionEngine>, EngineError> {
        if self.fail_language == Some(setup.language) {
            return Err(EngineError::ModelLoad(format!(
                "missing acoustic model {}",
                setup.acoustic_model.display()
            )));
        }
        let probe = self.probe(setup.language);
        *probe.setup.lock() = Some(setup.clone());
        Ok(Box::new(FakeEngine { probe }))
    }
}

// =============================================================================
// Recording sink
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkUpdate {
    Caption(String),
    Live(String),
    Notify(String),
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<SinkUpdate>>,
}

impl RecordingSink {
    pub fn updates(&self) -> Vec<SinkUpdate> {
        self.updates.lock().clone()
    }

    pub fn clear(&self) {
        self.updates.lock().clear();
    }

    pub fn captions(&self) -> Vec<String> {
        self.updates
            .lock()
            .iter()
            .filter_map(|u| match u {
                SinkUpdate::Caption(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_caption(&self) -> Option<String> {
        self.captions().pop()
    }

    pub fn last_live(&self) -> Option<String> {
        self.updates
            .lock()
            .iter()
            .rev()
            .find_map(|u| match u {
                SinkUpdate::Live(text) => Some(text.clone()),
                _ => None,
            })
    }

    pub fn notifications(&self) -> Vec<String> {
        self.updates
            .lock()
            .iter()
            .filter_map(|u| match u {
                SinkUpdate::Notify(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

impl PresentationSink for RecordingSink {
    fn set_caption(&self, text: &str) {
        self.updates.lock().push(SinkUpdate::Caption(text.to_string()));
    }

    fn set_live_text(&self, text: &str) {
        self.updates.lock().push(SinkUpdate::Live(text.to_string()));
    }

    fn notify(&self, text: &str) {
        self.updates.lock().push(SinkUpdate::Notify(text.to_string()));
    }
}

// =============================================================================
// Harness
// =============================================================================

/// Default config with every directory inside `dir`
pub fn test_config(dir: &Path) -> Config {
    Config {
        assets: AssetsConfig {
            source_dir: None,
            staging_dir: Some(dir.join("assets")),
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            file_logging: false,
            log_dir: Some(dir.join("logs")),
        },
        ..Default::default()
    }
}

/// Caption configured for `id` in the default config
pub fn caption(id: voicemenu::SearchId) -> String {
    Config::default()
        .searches
        .into_iter()
        .find(|s| s.id == id)
        .map(|s| s.caption)
        .expect("default config has a caption for every search")
}

/// A prepared session driven synchronously from the test thread
pub struct Harness {
    pub session: Session,
    pub factory: FakeFactory,
    pub sink: Arc<RecordingSink>,
    _dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let factory = FakeFactory::default();
        let sink = Arc::new(RecordingSink::default());
        let session =
            bootstrap::prepare(&test_config(dir.path()), &factory, Box::new(sink.clone()))
                .expect("session starts");
        Self {
            session,
            factory,
            sink,
            _dir: dir,
        }
    }

    pub fn english(&self) -> EngineProbe {
        self.factory.probe(Language::English)
    }

    pub fn spanish(&self) -> EngineProbe {
        self.factory.probe(Language::Spanish)
    }

    /// Process every queued message on the test thread
    pub fn pump(&mut self) {
        while let Ok(message) = self.session.receiver.try_recv() {
            self.session.controller.handle_message(message);
            assert_eq!(
                self.session.controller.decoding_count(),
                1,
                "exactly one handle must decode"
            );
        }
    }

    pub fn send(&mut self, message: SessionMessage) {
        self.session.sender.send(message).unwrap();
    }
}
