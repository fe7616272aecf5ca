//! Session state and transition table
//!
//! The table decides what a delivered engine event means in the current
//! state. It has no side effects; the controller applies its outcome to the
//! engines and the presentation sink.

use crate::engine::{EngineEvent, HandleId, LanguageProfile};
use crate::grammar::{Language, SearchId};
use serde::{Deserialize, Serialize};

/// Mutable session state, owned by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Handle currently receiving audio
    pub active_handle: HandleId,
    /// Search running on the active handle
    pub search: SearchId,
    /// Text carried into the current state from the previous one
    pub carried_text: Option<String>,
    /// Live text most recently pushed to the sink
    pub live_text: String,
}

impl SessionState {
    pub fn new(active_handle: HandleId, search: SearchId) -> Self {
        Self {
            active_handle,
            search,
            carried_text: None,
            live_text: String::new(),
        }
    }
}

/// Why a transition happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    /// Keyphrase heard while waiting
    Keyphrase,
    /// Language selector heard in the menu
    LanguageSelected { language: Language },
    /// Speech ended while entering a number
    EndOfNumber,
    /// Speech ended while confirming
    EndOfConfirmation,
}

/// A transition requested by the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: SearchId,
    pub target: SearchId,
    pub reason: TransitionReason,
    /// Text to show above the target caption
    pub carried_text: Option<String>,
}

/// What the controller should do with an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Switch to another search
    Transition(Transition),
    /// Show partial text without changing state
    LiveText(String),
    /// Utterance finished: clear live text, optionally notify
    Final { notify: Option<String> },
    /// Nothing to do
    Ignore,
}

/// Trigger tokens and the transitions they drive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    keyphrase: String,
    selectors: Vec<(String, Language)>,
}

impl TransitionTable {
    pub fn new(keyphrase: impl Into<String>, selectors: Vec<(String, Language)>) -> Self {
        Self {
            keyphrase: keyphrase.into(),
            selectors,
        }
    }

    /// Build the table with one selector per configured profile
    pub fn from_profiles(keyphrase: impl Into<String>, profiles: &[LanguageProfile]) -> Self {
        let selectors = profiles
            .iter()
            .map(|p| (p.selector.clone(), p.language))
            .collect();
        Self::new(keyphrase, selectors)
    }

    pub fn keyphrase(&self) -> &str {
        &self.keyphrase
    }

    pub fn selectors(&self) -> &[(String, Language)] {
        &self.selectors
    }

    /// Every search this table can transition to
    pub fn referenced_searches(&self) -> Vec<SearchId> {
        let mut ids = vec![SearchId::Wake, SearchId::Menu];
        for (_, lang) in &self.selectors {
            ids.push(SearchId::Numbers(*lang));
            ids.push(SearchId::Confirm(*lang));
        }
        ids
    }

    /// Whether `text` is any trigger token
    pub fn is_trigger(&self, text: &str) -> bool {
        text == self.keyphrase || self.selectors.iter().any(|(token, _)| token == text)
    }

    /// Target of a partial match in `current`, if `text` triggers one
    pub fn trigger_target(&self, current: SearchId, text: &str) -> Option<(SearchId, TransitionReason)> {
        match current {
            SearchId::Wake if text == self.keyphrase => {
                Some((SearchId::Menu, TransitionReason::Keyphrase))
            }
            SearchId::Menu => self
                .selectors
                .iter()
                .find(|(token, _)| token == text)
                .map(|(_, lang)| {
                    (
                        SearchId::Numbers(*lang),
                        TransitionReason::LanguageSelected { language: *lang },
                    )
                }),
            _ => None,
        }
    }

    /// Decide the outcome of `event` in `state`
    pub fn evaluate(&self, state: &SessionState, event: &EngineEvent) -> Outcome {
        match event {
            EngineEvent::Partial(hyp) => {
                match self.trigger_target(state.search, &hyp.text) {
                    Some((target, reason)) => Outcome::Transition(Transition {
                        from: state.search,
                        target,
                        reason,
                        carried_text: None,
                    }),
                    // Keyword searches repeat their hypothesis until stopped, so a
                    // trigger can arrive again after its transition
                    None if self.is_trigger(&hyp.text) => Outcome::Ignore,
                    None => Outcome::LiveText(hyp.text.clone()),
                }
            }

            EngineEvent::Final(hyp) => {
                let notify = if hyp.text.is_empty() || self.is_trigger(&hyp.text) {
                    None
                } else {
                    Some(hyp.text.clone())
                };
                Outcome::Final { notify }
            }

            EngineEvent::SpeechEnd => match state.search {
                SearchId::Numbers(lang) => Outcome::Transition(Transition {
                    from: state.search,
                    target: SearchId::Confirm(lang),
                    reason: TransitionReason::EndOfNumber,
                    carried_text: Some(state.live_text.clone()).filter(|t| !t.is_empty()),
                }),
                SearchId::Confirm(_) => Outcome::Transition(Transition {
                    from: state.search,
                    target: SearchId::Wake,
                    reason: TransitionReason::EndOfConfirmation,
                    carried_text: None,
                }),
                // Keyword-style searches have no end-of-speech exit
                SearchId::Wake | SearchId::Menu => Outcome::Ignore,
            },

            EngineEvent::SpeechBegin => Outcome::Ignore,
        }
    }
}
