//! Presentation sink
//!
//! The controller pushes caption, live text and transient notifications to a
//! sink. Nothing flows back, and the controller never waits on it.

use std::sync::Arc;

/// Receiver of user-visible session updates
pub trait PresentationSink: Send {
    /// Replace the caption describing what the user can say
    fn set_caption(&self, text: &str);

    /// Replace the live (partial) recognition text
    fn set_live_text(&self, text: &str);

    /// Show a transient notification
    fn notify(&self, text: &str);
}

impl<T> PresentationSink for Arc<T>
where
    T: PresentationSink + Sync + ?Sized,
{
    fn set_caption(&self, text: &str) {
        (**self).set_caption(text)
    }

    fn set_live_text(&self, text: &str) {
        (**self).set_live_text(text)
    }

    fn notify(&self, text: &str) {
        (**self).notify(text)
    }
}

/// Sink that writes every update to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl PresentationSink for TracingSink {
    fn set_caption(&self, text: &str) {
        tracing::info!(target: "voicemenu::presentation", "caption: {:?}", text);
    }

    fn set_live_text(&self, text: &str) {
        tracing::debug!(target: "voicemenu::presentation", "live: {:?}", text);
    }

    fn notify(&self, text: &str) {
        tracing::info!(target: "voicemenu::presentation", "notify: {:?}", text);
    }
}
