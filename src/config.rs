//! Configuration management for voicemenu
//!
//! Settings are stored as JSON in `~/.voicemenu/config.json` with schema
//! versioning and migrations. The document describes the language profiles,
//! the grammar registry, asset staging and logging. [`Config::validate`]
//! turns it into the immutable registry and transition table the session
//! runs on, so configuration mistakes fail at load time instead of during a
//! transition.

use crate::engine::LanguageProfile;
use crate::grammar::{GrammarRegistry, GrammarResource, Language, RegistryError, SearchId};
use crate::session::TransitionTable;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Current config schema version
const CURRENT_VERSION: u32 = 1;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unknown config version: {0}")]
    UnknownVersion(u32),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schema version for migrations
    pub version: u32,
    /// Asset staging settings
    pub assets: AssetsConfig,
    /// Logging settings
    pub logging: LoggingConfig,
    /// One profile per spoken language; the first is the default
    pub profiles: Vec<LanguageProfile>,
    /// Grammar registry entries
    pub searches: Vec<SearchConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            assets: AssetsConfig::default(),
            logging: LoggingConfig::default(),
            profiles: default_profiles(),
            searches: default_searches(),
        }
    }
}

/// Asset staging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Bundled assets to stage (None to use the staging directory as is)
    pub source_dir: Option<PathBuf>,
    /// Writable asset root (None for ~/.voicemenu/assets)
    pub staging_dir: Option<PathBuf>,
}

impl AssetsConfig {
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(|| get_config_dir().join("assets"))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is not set
    pub level: String,
    /// Whether to also write to a log file
    pub file_logging: bool,
    /// Log directory, also handed to engines (None for ~/.voicemenu/logs)
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: true,
            log_dir: None,
        }
    }
}

impl LoggingConfig {
    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| get_config_dir().join("logs"))
    }
}

/// One grammar registry entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub id: SearchId,
    pub caption: String,
    #[serde(flatten)]
    pub resource: GrammarResource,
}

impl SearchConfig {
    fn grammar(id: SearchId, caption: &str, path: &str) -> Self {
        Self {
            id,
            caption: caption.to_string(),
            resource: GrammarResource::Grammar(PathBuf::from(path)),
        }
    }
}

fn default_profiles() -> Vec<LanguageProfile> {
    vec![
        LanguageProfile {
            language: Language::English,
            acoustic_model: PathBuf::from("models/hmm/en-us-semi"),
            dictionary: PathBuf::from("models/dict/cmu07a.dic"),
            keyword_threshold: 1e-20,
            selector: "english".to_string(),
            searches: vec![
                SearchId::Wake,
                SearchId::Menu,
                SearchId::Numbers(Language::English),
                SearchId::Confirm(Language::English),
            ],
        },
        LanguageProfile {
            language: Language::Spanish,
            acoustic_model: PathBuf::from(
                "models/voxforge-es-0.1.1/model_parameters/voxforge_es_sphinx.cd_cont_1500",
            ),
            dictionary: PathBuf::from("models/voxforge-es-0.1.1/etc/voxforge_es_sphinx.dic"),
            keyword_threshold: 1e-20,
            selector: "espanol".to_string(),
            searches: vec![
                SearchId::Numbers(Language::Spanish),
                SearchId::Confirm(Language::Spanish),
            ],
        },
    ]
}

fn default_searches() -> Vec<SearchConfig> {
    vec![
        SearchConfig {
            id: SearchId::Wake,
            caption: "To start, say \"cycle count\".".to_string(),
            resource: GrammarResource::Keyphrase("cycle count".to_string()),
        },
        SearchConfig::grammar(
            SearchId::Menu,
            "Choose a language: say \"english\" or \"espanol\".",
            "models/grammar/menu.gram",
        ),
        SearchConfig::grammar(
            SearchId::Numbers(Language::English),
            "Say the count, for example \"twenty three\".",
            "models/grammar/numbers.gram",
        ),
        SearchConfig::grammar(
            SearchId::Numbers(Language::Spanish),
            "Diga la cantidad, por ejemplo \"veintitres\".",
            "models/grammar/numeros.gram",
        ),
        SearchConfig::grammar(
            SearchId::Confirm(Language::English),
            "Is that correct? Say \"yes\" or \"no\".",
            "models/grammar/polar.gram",
        ),
        SearchConfig::grammar(
            SearchId::Confirm(Language::Spanish),
            "¿Es correcto? Diga \"si\" o \"no\".",
            "models/grammar/span_polar.gram",
        ),
    ]
}

/// Registry, transition table and profiles derived from a valid config
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub registry: GrammarRegistry,
    pub table: TransitionTable,
    pub profiles: Vec<LanguageProfile>,
}

impl Config {
    /// Check the configuration and build the session plan
    pub fn validate(&self) -> Result<SessionPlan, ConfigError> {
        if self.profiles.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one language profile is required".to_string(),
            ));
        }

        let mut languages = HashSet::new();
        let mut selectors = HashSet::new();
        for profile in &self.profiles {
            if !languages.insert(profile.language) {
                return Err(ConfigError::Invalid(format!(
                    "language {} has more than one profile",
                    profile.language
                )));
            }
            if profile.selector.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "profile {} has an empty selector",
                    profile.language
                )));
            }
            if !selectors.insert(profile.selector.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "selector {:?} is used by more than one profile",
                    profile.selector
                )));
            }
        }

        let mut builder = GrammarRegistry::builder();
        for search in &self.searches {
            builder.register(search.id, search.caption.clone(), search.resource.clone())?;
        }
        let registry = builder.build();

        let keyphrase = match &registry.lookup(SearchId::Wake)?.resource {
            GrammarResource::Keyphrase(phrase) if !phrase.trim().is_empty() => phrase.clone(),
            _ => {
                return Err(ConfigError::Invalid(
                    "the wake search must be a non-empty keyphrase".to_string(),
                ))
            }
        };
        if selectors.contains(keyphrase.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "keyphrase {:?} is also a language selector",
                keyphrase
            )));
        }

        let table = TransitionTable::from_profiles(keyphrase, &self.profiles);
        registry.ensure_registered(table.referenced_searches())?;

        let default_language = self.profiles[0].language;
        for search in table.referenced_searches() {
            let owner = search.language().unwrap_or(default_language);
            let serves = self
                .profiles
                .iter()
                .any(|p| p.language == owner && p.supports(search));
            if !serves {
                return Err(ConfigError::Invalid(format!(
                    "search {} must be listed in the {} profile",
                    search, owner
                )));
            }
        }

        for profile in &self.profiles {
            registry.ensure_registered(profile.searches.iter().copied())?;
            for search in &profile.searches {
                let owner = search.language().unwrap_or(default_language);
                if owner != profile.language {
                    return Err(ConfigError::Invalid(format!(
                        "search {} cannot run on the {} profile",
                        search, profile.language
                    )));
                }
            }
        }

        Ok(SessionPlan {
            registry,
            table,
            profiles: self.profiles.clone(),
        })
    }
}

/// Get the path to the config file (~/.voicemenu/config.json)
pub fn get_config_path() -> PathBuf {
    get_config_dir().join("config.json")
}

/// Get the path to the config directory (~/.voicemenu)
pub fn get_config_dir() -> PathBuf {
    home_dir_or_fallback().join(".voicemenu")
}

/// Get the home directory, falling back to /tmp if unavailable
fn home_dir_or_fallback() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        tracing::error!("Could not determine home directory, using /tmp");
        PathBuf::from("/tmp")
    })
}

/// Load configuration from `path`, using defaults if the file is absent
pub fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::info!("Config file not found at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&contents)?;

    let original_version = config.version;
    let migrated = migrate_config(config)?;
    if migrated.version != original_version {
        save_to_path(&migrated, path)?;
    }

    Ok(migrated)
}

/// Save configuration to `path`, creating parent directories
pub fn save_to_path(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let contents = serde_json::to_string_pretty(config)?;
    fs::write(path, contents)?;

    tracing::info!("Config saved to {}", path.display());
    Ok(())
}

/// Load configuration from the default location
///
/// Falls back to defaults when the file cannot be read or parsed.
pub fn load_or_default() -> Config {
    load_from_path(&get_config_path()).unwrap_or_else(|e| {
        tracing::error!("Failed to load config, using defaults: {}", e);
        Config::default()
    })
}

/// Migrate configuration from older schema versions
pub fn migrate_config(mut config: Config) -> Result<Config, ConfigError> {
    let original_version = config.version;

    while config.version < CURRENT_VERSION {
        config = apply_migration(config)?;
    }

    if config.version > CURRENT_VERSION {
        return Err(ConfigError::UnknownVersion(config.version));
    }

    if config.version != original_version {
        tracing::info!(
            "Migrated config from version {} to {}",
            original_version,
            config.version
        );
    }

    Ok(config)
}

/// Apply a single migration step
fn apply_migration(config: Config) -> Result<Config, ConfigError> {
    match config.version {
        // Version 0 -> 1: searches gained explicit captions
        0 => {
            let mut migrated = config;
            migrated.version = 1;
            Ok(migrated)
        }
        v => Err(ConfigError::UnknownVersion(v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_current_version() {
        let config = Config::default();
        assert_eq!(config.version, CURRENT_VERSION);
    }

    #[test]
    fn test_default_config_is_valid() {
        let plan = Config::default().validate().unwrap();
        assert_eq!(plan.registry.len(), 6);
        assert_eq!(plan.table.keyphrase(), "cycle count");
        assert_eq!(plan.profiles[0].language, Language::English);
        assert_eq!(plan.table.selectors().len(), 2);
    }

    #[test]
    fn test_default_profiles() {
        let profiles = default_profiles();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].selector, "english");
        assert_eq!(profiles[1].selector, "espanol");
        assert!(profiles[0].supports(SearchId::Wake));
        assert!(!profiles[1].supports(SearchId::Wake));
        assert_eq!(profiles[0].keyword_threshold, 1e-20);
    }

    #[test]
    fn test_config_serialisation_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialised: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialised.version, config.version);
        assert_eq!(deserialised.profiles, config.profiles);
        assert_eq!(deserialised.searches, config.searches);
        assert_eq!(deserialised.logging.level, "info");
    }

    #[test]
    fn test_search_config_json_shape() {
        let json = serde_json::to_string(&default_searches()[0]).unwrap();
        assert_eq!(
            json,
            r#"{"id":"wake","caption":"To start, say \"cycle count\".","keyphrase":"cycle count"}"#
        );

        let parsed: SearchConfig = serde_json::from_str(
            r#"{"id":"confirm-en","caption":"yes or no","grammar":"polar.gram"}"#,
        )
        .unwrap();
        assert_eq!(parsed.id, SearchId::Confirm(Language::English));
        assert_eq!(
            parsed.resource,
            GrammarResource::Grammar(PathBuf::from("polar.gram"))
        );
    }

    #[test]
    fn test_partial_config_deserialisation() {
        let json = r#"{"version": 1, "logging": {"level": "debug"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.file_logging);
        assert_eq!(config.profiles.len(), 2);
        assert_eq!(config.searches.len(), 6);
    }

    #[test]
    fn test_validate_rejects_missing_search() {
        let mut config = Config::default();
        config
            .searches
            .retain(|s| s.id != SearchId::Confirm(Language::Spanish));

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Registry(RegistryError::UnknownSearch(ref id)) if id == "confirm-es"
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_search() {
        let mut config = Config::default();
        let duplicate = config.searches[1].clone();
        config.searches.push(duplicate);

        assert!(matches!(
            config.validate(),
            Err(ConfigError::Registry(RegistryError::DuplicateSearch(
                SearchId::Menu
            )))
        ));
    }

    #[test]
    fn test_validate_rejects_grammar_wake_search() {
        let mut config = Config::default();
        config.searches[0].resource = GrammarResource::Grammar(PathBuf::from("wake.gram"));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_no_profiles() {
        let config = Config {
            profiles: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_selector() {
        let mut config = Config::default();
        config.profiles[1].selector = "english".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_keyphrase_selector_clash() {
        let mut config = Config::default();
        config.profiles[1].selector = "cycle count".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_search_on_wrong_profile() {
        let mut config = Config::default();
        config.profiles[1]
            .searches
            .push(SearchId::Numbers(Language::English));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_unserved_search() {
        let mut config = Config::default();
        config.profiles[0].searches.retain(|s| *s != SearchId::Menu);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_single_language_config_is_valid() {
        let mut config = Config::default();
        config.profiles.truncate(1);
        config.searches.retain(|s| s.id.language() != Some(Language::Spanish));

        let plan = config.validate().unwrap();
        assert_eq!(plan.table.referenced_searches().len(), 4);
    }

    #[test]
    fn test_migration_from_version_0() {
        let old_config = Config {
            version: 0,
            ..Default::default()
        };

        let migrated = migrate_config(old_config).unwrap();
        assert_eq!(migrated.version, CURRENT_VERSION);
    }

    #[test]
    fn test_migration_rejects_future_version() {
        let future_config = Config {
            version: 999,
            ..Default::default()
        };

        assert!(matches!(
            migrate_config(future_config),
            Err(ConfigError::UnknownVersion(999))
        ));
    }

    #[test]
    fn test_config_path_format() {
        let path = get_config_path();
        let path_str = path.to_string_lossy();

        assert!(path_str.contains(".voicemenu"));
        assert!(path_str.ends_with("config.json"));
    }

    #[test]
    fn test_default_directories() {
        assert!(AssetsConfig::default().staging_dir().ends_with("assets"));
        assert!(LoggingConfig::default().log_dir().ends_with("logs"));

        let assets = AssetsConfig {
            source_dir: None,
            staging_dir: Some(PathBuf::from("/srv/voicemenu")),
        };
        assert_eq!(assets.staging_dir(), PathBuf::from("/srv/voicemenu"));
    }
}
