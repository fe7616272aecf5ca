//! Recognition engine handles
//!
//! The recognition engine itself is an external capability described by the
//! [`RecognitionEngine`] trait. A [`RecognitionHandle`] owns one engine
//! configured from one [`LanguageProfile`] and exposes the start/stop
//! semantics the session controller relies on:
//!
//! - starting the search that is already running is a no-op
//! - starting a different search stops the current one first
//! - a failed start leaves the handle stopped
//!
//! Engines report hypotheses through an [`EngineListener`], which tags every
//! event with the handle id and pushes it onto the session queue.

use crate::grammar::{GrammarRegistry, GrammarResource, Language, RegistryError, SearchId};
use crate::session::SessionMessage;
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Identity of a recognition handle within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleId(pub usize);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle-{}", self.0)
    }
}

/// Recognition result delivered by an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hypothesis {
    /// Recognized text, possibly empty
    pub text: String,
    /// Whether the utterance is complete
    pub is_final: bool,
}

impl Hypothesis {
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_result(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// Events an engine reports while decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Partial(Hypothesis),
    Final(Hypothesis),
    SpeechBegin,
    SpeechEnd,
}

/// Engine configuration for one spoken language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageProfile {
    /// Language served by this profile
    pub language: Language,
    /// Acoustic model directory, relative to the asset root
    pub acoustic_model: PathBuf,
    /// Pronunciation dictionary, relative to the asset root
    pub dictionary: PathBuf,
    /// Keyword-activation threshold
    pub keyword_threshold: f32,
    /// Menu token that selects this language
    pub selector: String,
    /// Searches this profile's engine can run
    pub searches: Vec<SearchId>,
}

impl LanguageProfile {
    pub fn supports(&self, search: SearchId) -> bool {
        self.searches.contains(&search)
    }
}

/// Resolved inputs for building one engine instance
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSetup {
    pub language: Language,
    pub acoustic_model: PathBuf,
    pub dictionary: PathBuf,
    pub keyword_threshold: f32,
    /// Directory the engine may write raw audio and decoder logs to
    pub log_dir: PathBuf,
}

impl EngineSetup {
    /// Resolve a profile's resource paths against the staged asset root
    pub fn resolve(profile: &LanguageProfile, asset_root: &Path, log_dir: &Path) -> Self {
        Self {
            language: profile.language,
            acoustic_model: asset_root.join(&profile.acoustic_model),
            dictionary: asset_root.join(&profile.dictionary),
            keyword_threshold: profile.keyword_threshold,
            log_dir: log_dir.to_path_buf(),
        }
    }
}

/// Engine errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// The engine could not load a model or grammar
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Search {search} is not available for language {language}")]
    SearchNotInProfile { search: SearchId, language: Language },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// External speech recognition engine
///
/// Implementations decode audio on a thread they own and report results to
/// the attached listener. Calls into the engine come from the controller
/// thread only.
pub trait RecognitionEngine: Send {
    /// Register a keyword-activation search for a literal phrase
    fn add_keyphrase_search(&mut self, name: &str, keyphrase: &str) -> Result<(), EngineError>;

    /// Register a grammar-based search
    fn add_grammar_search(&mut self, name: &str, grammar: &Path) -> Result<(), EngineError>;

    /// Begin continuous decoding against a registered search
    fn start_listening(&mut self, name: &str) -> Result<(), EngineError>;

    /// Halt decoding; may flush one trailing final result
    fn stop(&mut self);

    /// Attach the listener that receives decoding events
    fn attach_listener(&mut self, listener: EngineListener);
}

/// Builds engines from resolved profile settings
pub trait EngineFactory {
    fn create(&self, setup: &EngineSetup) -> Result<Box<dyn RecognitionEngine>, EngineError>;
}

impl<F> EngineFactory for F
where
    F: Fn(&EngineSetup) -> Result<Box<dyn RecognitionEngine>, EngineError>,
{
    fn create(&self, setup: &EngineSetup) -> Result<Box<dyn RecognitionEngine>, EngineError> {
        self(setup)
    }
}

/// Forwards engine callbacks into the session queue
#[derive(Debug, Clone)]
pub struct EngineListener {
    handle: HandleId,
    sender: Sender<SessionMessage>,
}

impl EngineListener {
    pub fn new(handle: HandleId, sender: Sender<SessionMessage>) -> Self {
        Self { handle, sender }
    }

    pub fn handle(&self) -> HandleId {
        self.handle
    }

    pub fn on_partial(&self, text: impl Into<String>) {
        self.deliver(EngineEvent::Partial(Hypothesis::partial(text)));
    }

    pub fn on_final(&self, text: impl Into<String>) {
        self.deliver(EngineEvent::Final(Hypothesis::final_result(text)));
    }

    pub fn on_speech_begin(&self) {
        self.deliver(EngineEvent::SpeechBegin);
    }

    pub fn on_speech_end(&self) {
        self.deliver(EngineEvent::SpeechEnd);
    }

    fn deliver(&self, event: EngineEvent) {
        let message = SessionMessage::Engine {
            handle: self.handle,
            event,
        };
        if let Err(e) = self.sender.send(message) {
            tracing::trace!("Session queue closed, dropping {:?}", e.into_inner());
        }
    }
}

/// One configured engine bound to a language profile
pub struct RecognitionHandle {
    id: HandleId,
    profile: LanguageProfile,
    engine: Box<dyn RecognitionEngine>,
    current_search: Option<SearchId>,
    decoding: bool,
}

impl RecognitionHandle {
    /// Create the engine for `profile` and register all of its searches
    pub fn open(
        id: HandleId,
        profile: LanguageProfile,
        factory: &dyn EngineFactory,
        registry: &GrammarRegistry,
        asset_root: &Path,
        log_dir: &Path,
        listener: EngineListener,
    ) -> Result<Self, EngineError> {
        let setup = EngineSetup::resolve(&profile, asset_root, log_dir);
        tracing::info!(
            "Creating {} engine (acoustic model: {})",
            profile.language,
            setup.acoustic_model.display()
        );
        let engine = factory.create(&setup)?;
        Self::with_engine(id, profile, engine, registry, asset_root, listener)
    }

    /// Wrap an already created engine and register the profile's searches
    pub fn with_engine(
        id: HandleId,
        profile: LanguageProfile,
        mut engine: Box<dyn RecognitionEngine>,
        registry: &GrammarRegistry,
        asset_root: &Path,
        listener: EngineListener,
    ) -> Result<Self, EngineError> {
        for search in &profile.searches {
            let entry = registry.lookup(*search)?;
            match &entry.resource {
                GrammarResource::Keyphrase(phrase) => {
                    engine.add_keyphrase_search(search.as_str(), phrase)?;
                }
                GrammarResource::Grammar(path) => {
                    engine.add_grammar_search(search.as_str(), &asset_root.join(path))?;
                }
            }
            tracing::debug!("Registered search {} on {}", search, id);
        }

        engine.attach_listener(listener);

        Ok(Self {
            id,
            profile,
            engine,
            current_search: None,
            decoding: false,
        })
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn language(&self) -> Language {
        self.profile.language
    }

    pub fn profile(&self) -> &LanguageProfile {
        &self.profile
    }

    /// Last successfully started search
    pub fn current_search(&self) -> Option<SearchId> {
        self.current_search
    }

    pub fn is_decoding(&self) -> bool {
        self.decoding
    }

    /// Start decoding against `search`
    pub fn start(&mut self, search: SearchId) -> Result<(), EngineError> {
        if !self.profile.supports(search) {
            return Err(EngineError::SearchNotInProfile {
                search,
                language: self.profile.language,
            });
        }

        if self.decoding && self.current_search == Some(search) {
            tracing::trace!("{} already running {}", self.id, search);
            return Ok(());
        }

        if self.decoding {
            self.engine.stop();
            self.decoding = false;
        }

        if let Err(e) = self.engine.start_listening(search.as_str()) {
            tracing::warn!("{} failed to start {}: {}", self.id, search, e);
            return Err(e);
        }

        self.decoding = true;
        self.current_search = Some(search);
        tracing::debug!("{} ({}) decoding {}", self.id, self.profile.language, search);
        Ok(())
    }

    /// Halt decoding; safe to call when already stopped
    pub fn stop(&mut self) {
        if !self.decoding {
            return;
        }
        self.engine.stop();
        self.decoding = false;
        tracing::debug!("{} ({}) stopped", self.id, self.profile.language);
    }
}

impl fmt::Debug for RecognitionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecognitionHandle")
            .field("id", &self.id)
            .field("language", &self.profile.language)
            .field("current_search", &self.current_search)
            .field("decoding", &self.decoding)
            .finish()
    }
}
