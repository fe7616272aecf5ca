//! Voice-command session
//!
//! A session drives one recognition handle per language through a fixed set
//! of searches. Recognized text moves the session between searches and is
//! pushed to the presentation sink.
//!
//! ## States
//!
//! 1. **WAKE** - Keyword search waiting for the keyphrase
//! 2. **MENU** - Waiting for a language selector token
//! 3. **NUMBERS(lang)** - Free-form number entry on that language's handle
//! 4. **CONFIRM(lang)** - Yes/no confirmation, showing the carried number
//!
//! ## State Transitions
//!
//! ```text
//!            keyphrase            selector(lang)
//! ┌──────┐  (partial)  ┌──────┐    (partial)    ┌───────────────┐
//! │ WAKE │────────────►│ MENU │────────────────►│ NUMBERS(lang) │
//! └──────┘             └──────┘                 └───────────────┘
//!    ▲                                                  │
//!    │                                       speech end │ carries live text
//!    │          speech end                              ▼
//!    │  (default profile, text cleared)         ┌───────────────┐
//!    └──────────────────────────────────────────│ CONFIRM(lang) │
//!                                               └───────────────┘
//! ```
//!
//! Partial results drive the keyword transitions; end of speech drives the
//! free-form ones. Final results only clear the live text and raise a
//! notification.
//!
//! ## Threading
//!
//! Engines deliver events from their own decoding threads into a single
//! queue of [`SessionMessage`]s. One controller thread drains it, so at most
//! one transition is ever in flight. Events from a handle that is no longer
//! active are counted and dropped.

pub mod controller;
pub mod state;

pub use controller::{SessionController, SessionError, SessionMessage, SessionStatus};
pub use state::{Outcome, SessionState, Transition, TransitionReason, TransitionTable};
