use std::{future::Future, sync::Arc};

use anyhow::Context;
use log::{error, info};
use tokio::task;

use crate::{
    api::{JournalPage, JournalSource},
    cookie_store::{Cookie, CookieStore, UserId},
    messages,
};

/// Receives the "working on it" notes sent before a slow portal request.
pub trait Progress: Sync {
    fn report(&self, text: &'static str) -> impl Future<Output = ()> + Send;
}

impl Progress for () {
    async fn report(&self, _: &'static str) {}
}

/// The cookie → journal → grades flow, independent of the chat transport.
/// Every method resolves to the text that should be sent back.
pub struct GradeService<S> {
    source: S,
    store: Arc<dyn CookieStore>,
    cookie_marker: String,
}

impl<S: JournalSource> GradeService<S> {
    pub fn new(source: S, store: Arc<dyn CookieStore>, cookie_marker: impl Into<String>) -> Self {
        Self {
            source,
            store,
            cookie_marker: cookie_marker.into(),
        }
    }

    /// Handles arbitrary text from a user as a cookie. The cookie is stored
    /// only after the portal has accepted it.
    pub async fn submit_cookie(&self, user: UserId, text: &str, progress: &impl Progress) -> String {
        let cookie = match Cookie::parse(text, &self.cookie_marker) {
            Ok(cookie) => cookie,
            Err(e) => {
                info!("User {user} sent something that is not a cookie: {e}");
                return messages::invalid_cookie(e);
            }
        };
        progress.report(messages::COOKIE_RECEIVED).await;
        self.try_submit_cookie(user, cookie)
            .await
            .unwrap_or_else(|e| report_error(user, e))
    }

    async fn try_submit_cookie(&self, user: UserId, cookie: Cookie) -> anyhow::Result<String> {
        match self.source.fetch(&cookie).await? {
            JournalPage::Rejected { status } => {
                info!("Cookie of user {user} was rejected by the portal ({status})");
                Ok(messages::COOKIE_REJECTED.to_owned())
            }
            JournalPage::Journal(html) => {
                self.save_cookie(user, cookie.clone()).await?;
                info!("Saved cookie {cookie:?} for user {user}");
                Ok(messages::grades_reply(&html))
            }
        }
    }

    /// Re-fetches the journal with the cookie stored for `user`.
    pub async fn refresh(&self, user: UserId, progress: &impl Progress) -> String {
        self.try_refresh(user, progress)
            .await
            .unwrap_or_else(|e| report_error(user, e))
    }

    async fn try_refresh(&self, user: UserId, progress: &impl Progress) -> anyhow::Result<String> {
        let Some(cookie) = self.stored_cookie(user).await? else {
            info!("No cookie stored for user {user}");
            return Ok(messages::COOKIE_NOT_FOUND.to_owned());
        };
        progress.report(messages::REFRESHING).await;
        Ok(match self.source.fetch(&cookie).await? {
            JournalPage::Rejected { status } => {
                info!("Stored cookie of user {user} no longer works ({status})");
                messages::COOKIE_EXPIRED.to_owned()
            }
            JournalPage::Journal(html) => messages::grades_reply(&html),
        })
    }

    // File and SQLite I/O stay off the async workers.
    async fn stored_cookie(&self, user: UserId) -> anyhow::Result<Option<Cookie>> {
        let store = Arc::clone(&self.store);
        task::spawn_blocking(move || store.get(user))
            .await
            .context("Cookie store task failed")?
    }

    async fn save_cookie(&self, user: UserId, cookie: Cookie) -> anyhow::Result<()> {
        let store = Arc::clone(&self.store);
        task::spawn_blocking(move || store.put(user, &cookie))
            .await
            .context("Cookie store task failed")?
    }
}

fn report_error(user: UserId, e: anyhow::Error) -> String {
    error!("While handling a message from user {user}: {e:#}");
    messages::unexpected_error(&e)
}
