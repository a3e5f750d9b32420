use std::{path::Path, sync::Mutex};

use anyhow::{anyhow, Context};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};

use super::{Cookie, CookieStore, CookieStoreLoadError, UserId};

/// Single table `users(user_id INTEGER PRIMARY KEY, cookie TEXT)`.
pub struct SqliteCookieStore {
    conn: Mutex<Connection>,
}

impl SqliteCookieStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CookieStoreLoadError> {
        debug!("Opening cookie database {:?}", path.as_ref());
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, CookieStoreLoadError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, CookieStoreLoadError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                cookie TEXT
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn sql_key(user: UserId) -> anyhow::Result<i64> {
    i64::try_from(user.get()).with_context(|| format!("User id {user} does not fit in INTEGER"))
}

impl CookieStore for SqliteCookieStore {
    fn get(&self, user: UserId) -> anyhow::Result<Option<Cookie>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("Cookie database lock is poisoned"))?;
        let cookie = conn
            .query_row(
                "SELECT cookie FROM users WHERE user_id = ?1",
                params![sql_key(user)?],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();
        Ok(cookie.map(Cookie::from))
    }

    fn put(&self, user: UserId, cookie: &Cookie) -> anyhow::Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("Cookie database lock is poisoned"))?;
        conn.execute(
            "REPLACE INTO users (user_id, cookie) VALUES (?1, ?2)",
            params![sql_key(user)?, cookie.as_str()],
        )
        .with_context(|| format!("While saving the cookie of user {user}"))?;
        Ok(())
    }
}
