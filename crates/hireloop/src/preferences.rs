//! Per-owner UI settings behind an injected key/value store.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{RepositoryError, ServiceError};
use crate::hiring::domain::OwnerId;

const THEME_KEY: &str = "theme";
const CONVERSATION_KEY: &str = "active_conversation";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    pub const fn label(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            "system" | "auto" => Some(Theme::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub theme: Theme,
    pub active_conversation: Option<String>,
}

/// Partial update; absent fields keep their value, `active_conversation: null` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferencesUpdate {
    #[serde(default)]
    pub theme: Option<Theme>,
    #[serde(default, deserialize_with = "double_option")]
    pub active_conversation: Option<Option<String>>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Debug, thiserror::Error)]
pub enum PreferenceError {
    #[error("preference file error: {0}")]
    Io(#[from] io::Error),
    #[error("preference file is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("preference store unavailable: {0}")]
    Unavailable(String),
}

impl From<PreferenceError> for ServiceError {
    fn from(err: PreferenceError) -> Self {
        ServiceError::Repository(RepositoryError::Unavailable(err.to_string()))
    }
}

/// Flat key/value persistence for settings.
pub trait PreferenceStore: Send + Sync {
    fn load(&self) -> Result<BTreeMap<String, String>, PreferenceError>;
    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), PreferenceError>;
}

#[derive(Default, Clone)]
pub struct InMemoryPreferenceStore {
    values: Arc<Mutex<BTreeMap<String, String>>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for InMemoryPreferenceStore {
    fn load(&self) -> Result<BTreeMap<String, String>, PreferenceError> {
        self.values
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| PreferenceError::Unavailable("preference lock poisoned".to_string()))
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), PreferenceError> {
        let mut guard = self
            .values
            .lock()
            .map_err(|_| PreferenceError::Unavailable("preference lock poisoned".to_string()))?;
        *guard = values.clone();
        Ok(())
    }
}

/// JSON document on disk; a missing file reads as empty.
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn load(&self) -> Result<BTreeMap<String, String>, PreferenceError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), PreferenceError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, serde_json::to_vec_pretty(values)?)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

/// Settings service; state is re-derived from the store when constructed.
pub struct PreferencesService {
    store: Arc<dyn PreferenceStore>,
    values: Mutex<BTreeMap<String, String>>,
}

impl PreferencesService {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Result<Self, PreferenceError> {
        let values = store.load()?;
        debug!(entries = values.len(), "preferences loaded");
        Ok(Self {
            store,
            values: Mutex::new(values),
        })
    }

    pub fn get(&self, owner: &OwnerId) -> Result<Preferences, PreferenceError> {
        let guard = self.lock()?;
        Ok(Preferences {
            theme: guard
                .get(&key(owner, THEME_KEY))
                .and_then(|raw| Theme::parse(raw))
                .unwrap_or_default(),
            active_conversation: guard.get(&key(owner, CONVERSATION_KEY)).cloned(),
        })
    }

    pub fn update(
        &self,
        owner: &OwnerId,
        update: PreferencesUpdate,
    ) -> Result<Preferences, PreferenceError> {
        {
            let mut guard = self.lock()?;
            let mut next = guard.clone();
            if let Some(theme) = update.theme {
                next.insert(key(owner, THEME_KEY), theme.label().to_string());
            }
            match update.active_conversation {
                Some(Some(conversation)) => {
                    next.insert(key(owner, CONVERSATION_KEY), conversation);
                }
                Some(None) => {
                    next.remove(&key(owner, CONVERSATION_KEY));
                }
                None => {}
            }
            self.store.save(&next)?;
            *guard = next;
        }
        info!(owner = %owner, "preferences updated");
        self.get(owner)
    }

    pub fn set_theme(&self, owner: &OwnerId, theme: Theme) -> Result<Preferences, PreferenceError> {
        self.update(
            owner,
            PreferencesUpdate {
                theme: Some(theme),
                active_conversation: None,
            },
        )
    }

    pub fn set_active_conversation(
        &self,
        owner: &OwnerId,
        conversation: Option<String>,
    ) -> Result<Preferences, PreferenceError> {
        self.update(
            owner,
            PreferencesUpdate {
                theme: None,
                active_conversation: Some(conversation),
            },
        )
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>, PreferenceError> {
        self.values
            .lock()
            .map_err(|_| PreferenceError::Unavailable("preference lock poisoned".to_string()))
    }
}

fn key(owner: &OwnerId, name: &str) -> String {
    format!("{owner}.{name}")
}
