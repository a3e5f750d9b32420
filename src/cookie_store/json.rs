use std::{collections::BTreeMap, path::PathBuf, sync::Mutex};

use anyhow::{anyhow, Context};
use log::debug;

use crate::fs_json_util::{read_json_or_default, write_json_atomically};

use super::{Cookie, CookieStore, CookieStoreLoadError, UserId};

/// Flat JSON object `{ "<user id>": "<cookie>" }` kept in memory and
/// rewritten as a whole on every `put`.
pub struct JsonCookieStore {
    path: PathBuf,
    cookies: Mutex<BTreeMap<UserId, Cookie>>,
}

impl JsonCookieStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CookieStoreLoadError> {
        let path = path.into();
        let cookies: BTreeMap<UserId, Cookie> = read_json_or_default(&path)
            .map_err(|source| CookieStoreLoadError::Json {
                path: path.clone(),
                source,
            })?;
        debug!("Loaded {} cookies from {path:?}", cookies.len());
        Ok(Self {
            path,
            cookies: Mutex::new(cookies),
        })
    }
}

impl CookieStore for JsonCookieStore {
    fn get(&self, user: UserId) -> anyhow::Result<Option<Cookie>> {
        let cookies = self
            .cookies
            .lock()
            .map_err(|_| anyhow!("Cookie store lock is poisoned"))?;
        Ok(cookies.get(&user).cloned())
    }

    fn put(&self, user: UserId, cookie: &Cookie) -> anyhow::Result<()> {
        let mut cookies = self
            .cookies
            .lock()
            .map_err(|_| anyhow!("Cookie store lock is poisoned"))?;
        let previous = cookies.insert(user, cookie.clone());
        if let Err(e) = write_json_atomically(&self.path, &*cookies) {
            // Keep memory and disk in agreement.
            match previous {
                Some(previous) => cookies.insert(user, previous),
                None => cookies.remove(&user),
            };
            return Err(e).with_context(|| format!("While saving cookies to {:?}", self.path));
        }
        Ok(())
    }
}
