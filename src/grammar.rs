//! Search identifiers and the grammar registry
//!
//! Every search the engines can decode against is named by a [`SearchId`].
//! The registry maps each id to the caption shown while it is active and the
//! resource the engine loads for it. It is built once during configuration
//! and is read-only afterwards.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Spoken language served by one recognition engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "es")]
    Spanish,
}

impl Language {
    /// All supported languages, in declaration order
    pub const ALL: [Language; 2] = [Language::English, Language::Spanish];

    /// Short language tag used in search names
    pub fn tag(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Spanish => "es",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Identifier of a search configuration
///
/// The four variants are the four state classes of the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchId {
    /// Keyword-activation search waiting for the keyphrase
    Wake,
    /// Language selection menu
    Menu,
    /// Free-form number entry
    Numbers(Language),
    /// Yes/no confirmation of the entered number
    Confirm(Language),
}

impl SearchId {
    /// Stable name, also used as the engine-side search name
    ///
    /// This is the only name table: parsing and serde go through it.
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchId::Wake => "wake",
            SearchId::Menu => "menu",
            SearchId::Numbers(Language::English) => "numbers-en",
            SearchId::Numbers(Language::Spanish) => "numbers-es",
            SearchId::Confirm(Language::English) => "confirm-en",
            SearchId::Confirm(Language::Spanish) => "confirm-es",
        }
    }

    /// Language the search is bound to, if it is language specific
    ///
    /// `Wake` and `Menu` return `None`; they run on the default profile.
    pub fn language(&self) -> Option<Language> {
        match self {
            SearchId::Numbers(lang) | SearchId::Confirm(lang) => Some(*lang),
            SearchId::Wake | SearchId::Menu => None,
        }
    }

    /// Every search id the controller knows about
    pub fn all() -> Vec<SearchId> {
        let mut ids = vec![SearchId::Wake, SearchId::Menu];
        for lang in Language::ALL {
            ids.push(SearchId::Numbers(lang));
            ids.push(SearchId::Confirm(lang));
        }
        ids
    }
}

impl fmt::Display for SearchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchId {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SearchId::all()
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| RegistryError::UnknownSearch(s.to_string()))
    }
}

impl Serialize for SearchId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SearchId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Resource an engine loads for a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrammarResource {
    /// Keyword-activation search for a single literal phrase
    Keyphrase(String),
    /// Grammar file, relative paths resolve against the staged asset root
    Grammar(PathBuf),
}

/// Registry entry for one search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarEntry {
    pub id: SearchId,
    pub caption: String,
    pub resource: GrammarResource,
}

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown search: {0}")]
    UnknownSearch(String),

    #[error("Search registered twice: {0}")]
    DuplicateSearch(SearchId),
}

/// Collects grammar entries during configuration
#[derive(Debug, Default)]
pub struct GrammarRegistryBuilder {
    entries: HashMap<SearchId, GrammarEntry>,
}

impl GrammarRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a search
    ///
    /// Fails if the id is already registered.
    pub fn register(
        &mut self,
        id: SearchId,
        caption: impl Into<String>,
        resource: GrammarResource,
    ) -> Result<&mut Self, RegistryError> {
        if self.entries.contains_key(&id) {
            return Err(RegistryError::DuplicateSearch(id));
        }

        self.entries.insert(
            id,
            GrammarEntry {
                id,
                caption: caption.into(),
                resource,
            },
        );
        Ok(self)
    }

    /// Finish configuration
    pub fn build(self) -> GrammarRegistry {
        tracing::debug!("Grammar registry built with {} searches", self.entries.len());
        GrammarRegistry {
            entries: self.entries,
        }
    }
}

/// Immutable map from search id to caption and resource
#[derive(Debug, Clone)]
pub struct GrammarRegistry {
    entries: HashMap<SearchId, GrammarEntry>,
}

impl GrammarRegistry {
    pub fn builder() -> GrammarRegistryBuilder {
        GrammarRegistryBuilder::new()
    }

    /// Look up the entry for a search
    pub fn lookup(&self, id: SearchId) -> Result<&GrammarEntry, RegistryError> {
        self.entries
            .get(&id)
            .ok_or_else(|| RegistryError::UnknownSearch(id.to_string()))
    }

    /// Caption for a search
    pub fn caption(&self, id: SearchId) -> Result<&str, RegistryError> {
        self.lookup(id).map(|e| e.caption.as_str())
    }

    pub fn contains(&self, id: SearchId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Check that every id in `ids` has an entry
    ///
    /// Reports the first missing id.
    pub fn ensure_registered<I>(&self, ids: I) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = SearchId>,
    {
        for id in ids {
            self.lookup(id)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
