use std::{
    fmt::Debug,
    path::{Path, PathBuf},
    sync::Arc,
};

use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};

use crate::fs_json_util::ReadJsonError;

mod json;
mod sqlite;

pub use json::JsonCookieStore;
pub use sqlite::SqliteCookieStore;

/// Telegram user identifier, the key of the cookie store.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    derive_more::From,
    derive_more::Display,
    Serialize,
    Deserialize,
)]
pub struct UserId(u64);
impl UserId {
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Raw value of the `Cookie` header captured from a logged-in browser.
#[derive(Clone, PartialEq, Eq, derive_more::From, Serialize, Deserialize)]
pub struct Cookie(String);
impl Debug for Cookie {
    // The value is a live session; only a prefix ever reaches the logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix: String = self.0.chars().take(12).collect();
        write!(f, "Cookie({prefix:?}..., {} chars)", self.0.chars().count())
    }
}

pub const DEFAULT_COOKIE_MARKER: &str = "laravel_session";

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CookieError {
    #[error("The cookie is empty.")]
    Empty,
    #[error("The cookie does not contain `{0}`.")]
    MissingMarker(String),
    #[error("The cookie contains characters that cannot be sent in an HTTP header.")]
    NotAHeaderValue,
}

impl Cookie {
    /// Validates text sent by a user. Nothing here touches the network.
    pub fn parse(text: &str, marker: &str) -> Result<Self, CookieError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CookieError::Empty);
        }
        if !text.contains(marker) {
            return Err(CookieError::MissingMarker(marker.to_owned()));
        }
        if HeaderValue::from_str(text).is_err() {
            return Err(CookieError::NotAHeaderValue);
        }
        Ok(Self(text.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// At most one cookie per user; `put` replaces whatever was stored before.
pub trait CookieStore: Send + Sync {
    fn get(&self, user: UserId) -> anyhow::Result<Option<Cookie>>;
    fn put(&self, user: UserId, cookie: &Cookie) -> anyhow::Result<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum CookieStoreLoadError {
    #[error("Cookie store {path:?} could not be loaded: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: ReadJsonError,
    },
    #[error("Cookie database could not be opened: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, clap::ValueEnum)]
pub enum StorageKind {
    Json,
    Sqlite,
}
impl StorageKind {
    pub fn default_path(self) -> &'static Path {
        Path::new(match self {
            Self::Json => "users.json",
            Self::Sqlite => "users.db",
        })
    }
}

pub fn open(kind: StorageKind, path: &Path) -> Result<Arc<dyn CookieStore>, CookieStoreLoadError> {
    let store: Arc<dyn CookieStore> = match kind {
        StorageKind::Json => Arc::new(JsonCookieStore::open(path)?),
        StorageKind::Sqlite => Arc::new(SqliteCookieStore::open(path)?),
    };
    Ok(store)
}
