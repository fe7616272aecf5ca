//! Session startup
//!
//! Startup runs once, in order:
//!
//! 1. stage bundled assets into the writable asset root
//! 2. validate the configuration into a registry and transition table
//! 3. create one recognition handle per language profile
//! 4. enter the wake search on the default handle
//!
//! Any failure is terminal for the session. It is shown as the caption and
//! returned to the caller.

use crate::assets::{sync_assets, AssetSyncError};
use crate::config::{Config, ConfigError, SessionPlan};
use crate::engine::{EngineError, EngineFactory, EngineListener, HandleId, RecognitionHandle};
use crate::presentation::PresentationSink;
use crate::session::{SessionController, SessionError, SessionMessage, SessionStatus};
use anyhow::anyhow;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Caption shown while the recognizer is being prepared
pub const PREPARING_CAPTION: &str = "Preparing the recognizer";

/// Startup errors
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Asset sync failed: {0}")]
    AssetSync(#[from] AssetSyncError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Failed to spawn session thread: {0}")]
    Thread(#[source] std::io::Error),
}

/// A started session that has not been handed to a thread yet
pub struct Session {
    pub controller: SessionController,
    pub receiver: Receiver<SessionMessage>,
    pub sender: Sender<SessionMessage>,
}

/// Stage assets if a bundled source is configured; returns the asset root
pub fn stage_assets(config: &Config) -> Result<PathBuf, AssetSyncError> {
    let staging_dir = config.assets.staging_dir();
    match &config.assets.source_dir {
        Some(source) => Ok(sync_assets(source, &staging_dir)?.root),
        None => {
            tracing::debug!("No bundled assets configured, using {}", staging_dir.display());
            Ok(staging_dir)
        }
    }
}

/// Run startup and return the controller together with its queue
///
/// The caller drives the controller; see [`start`] for a threaded session.
pub fn prepare(
    config: &Config,
    factory: &dyn EngineFactory,
    sink: Box<dyn PresentationSink>,
) -> Result<Session, StartupError> {
    sink.set_caption(PREPARING_CAPTION);

    let (sender, receiver) = unbounded();
    let prepared = stage_assets(config)
        .map_err(StartupError::from)
        .and_then(|root| open_handles(config, factory, root, &sender));

    let (plan, handles) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            tracing::error!("Failed to init recognizer: {}", e);
            sink.set_caption(&format!("Failed to init recognizer: {}", e));
            return Err(e);
        }
    };

    let controller =
        SessionController::start(Arc::new(plan.registry), plan.table, handles, sink)?;

    Ok(Session {
        controller,
        receiver,
        sender,
    })
}

fn open_handles(
    config: &Config,
    factory: &dyn EngineFactory,
    asset_root: PathBuf,
    sender: &Sender<SessionMessage>,
) -> Result<(SessionPlan, Vec<RecognitionHandle>), StartupError> {
    let plan = config.validate()?;
    let log_dir = config.logging.log_dir();

    let mut handles = Vec::with_capacity(plan.profiles.len());
    for (index, profile) in plan.profiles.iter().enumerate() {
        let id = HandleId(index);
        let handle = RecognitionHandle::open(
            id,
            profile.clone(),
            factory,
            &plan.registry,
            &asset_root,
            &log_dir,
            EngineListener::new(id, sender.clone()),
        )?;
        handles.push(handle);
    }

    tracing::info!(
        "Opened {} recognition handles from {}",
        handles.len(),
        asset_root.display()
    );
    Ok((plan, handles))
}

/// Run startup and drive the controller on a dedicated thread
pub fn start(
    config: &Config,
    factory: &dyn EngineFactory,
    sink: Box<dyn PresentationSink>,
) -> Result<SessionRuntime, StartupError> {
    let Session {
        controller,
        receiver,
        sender,
    } = prepare(config, factory, sink)?;

    let status = controller.status_handle();
    let thread = std::thread::Builder::new()
        .name("voicemenu-session".to_string())
        .spawn(move || controller.run(receiver))
        .map_err(StartupError::Thread)?;

    Ok(SessionRuntime {
        sender,
        status,
        thread: Some(thread),
    })
}

/// Handle to a session running on its own thread
pub struct SessionRuntime {
    sender: Sender<SessionMessage>,
    status: Arc<RwLock<SessionStatus>>,
    thread: Option<JoinHandle<SessionStatus>>,
}

impl SessionRuntime {
    /// Latest published status
    pub fn status(&self) -> SessionStatus {
        self.status.read().clone()
    }

    /// Queue sender, for delivering messages from outside an engine
    pub fn sender(&self) -> Sender<SessionMessage> {
        self.sender.clone()
    }

    /// Stop every engine and wait for the controller thread
    pub fn shutdown(mut self) -> anyhow::Result<SessionStatus> {
        self.stop_thread()
            .ok_or_else(|| anyhow!("Session controller already stopped"))?
    }

    fn stop_thread(&mut self) -> Option<anyhow::Result<SessionStatus>> {
        let thread = self.thread.take()?;
        // The controller may already have exited if the queue disconnected
        let _ = self.sender.send(SessionMessage::Shutdown);
        Some(
            thread
                .join()
                .map_err(|_| anyhow!("Session controller thread panicked")),
        )
    }
}

impl Drop for SessionRuntime {
    fn drop(&mut self) {
        if let Some(Err(e)) = self.stop_thread() {
            tracing::error!("{}", e);
        }
    }
}
