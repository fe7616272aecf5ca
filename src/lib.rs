//! voicemenu - voice-command session controller
//!
//! Drives continuous speech recognition through a wake keyphrase, a language
//! menu, number entry and a spoken confirmation, with one recognition engine
//! per language. The engines and the user-facing display are supplied by the
//! embedding application through [`RecognitionEngine`], [`EngineFactory`]
//! and [`PresentationSink`].
//!
//! ```no_run
//! # use voicemenu::{bootstrap, config, EngineFactory, TracingSink};
//! # fn factory() -> Box<dyn EngineFactory> { unimplemented!() }
//! let config = config::load_or_default();
//! voicemenu::logging::init_logging(&config.logging).ok();
//!
//! let runtime = bootstrap::start(&config, factory().as_ref(), Box::new(TracingSink))?;
//! println!("{:?}", runtime.status());
//! runtime.shutdown()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod assets;
pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod grammar;
pub mod logging;
pub mod presentation;
pub mod session;

pub use bootstrap::{SessionRuntime, StartupError};
pub use config::Config;
pub use engine::{
    EngineError, EngineEvent, EngineFactory, EngineListener, EngineSetup, HandleId, Hypothesis,
    LanguageProfile, RecognitionEngine, RecognitionHandle,
};
pub use grammar::{GrammarRegistry, GrammarResource, Language, RegistryError, SearchId};
pub use presentation::{PresentationSink, TracingSink};
pub use session::{SessionController, SessionMessage, SessionStatus};
