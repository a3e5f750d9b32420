use std::{future::Future, time::Duration};

use anyhow::Context;
use log::{debug, info};
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    redirect, StatusCode, Url,
};

use crate::cookie_store::Cookie;

pub const JOURNAL_URL: &str = "https://college.snation.kz/kz/tko/control/journals";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7";
const REFERER: &str = "https://college.snation.kz/";

/// Outcome of one journal request.
#[derive(Debug, PartialEq, Eq)]
pub enum JournalPage {
    /// The portal served the journal; holds the raw HTML.
    Journal(String),
    /// Login page, error page or anything else: the session is not usable.
    Rejected { status: StatusCode },
}

/// Where journal pages come from.
pub trait JournalSource: Send + Sync {
    fn fetch(&self, cookie: &Cookie) -> impl Future<Output = anyhow::Result<JournalPage>> + Send;
}

pub struct JournalClient {
    client: reqwest::Client,
    url: Url,
}

impl JournalClient {
    pub fn new(url: Url, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .default_headers(default_headers())
            .user_agent(USER_AGENT)
            .redirect(redirect::Policy::limited(10))
            .timeout(timeout)
            .build()
            .context("While building the HTTP client")?;
        Ok(Self { client, url })
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static(ACCEPT_LANGUAGE),
    );
    headers.insert(header::REFERER, HeaderValue::from_static(REFERER));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );
    headers
}

impl JournalSource for JournalClient {
    async fn fetch(&self, cookie: &Cookie) -> anyhow::Result<JournalPage> {
        info!("Fetching {}", self.url);
        let response = self
            .client
            .get(self.url.clone())
            .header(header::COOKIE, cookie.as_str())
            .send()
            .await
            .with_context(|| format!("While requesting {}", self.url))?;
        let status = response.status();
        debug!("Journal responded with {status} (final url: {})", response.url());
        let body = response
            .text()
            .await
            .context("While reading the journal page")?;
        Ok(classify(status, body))
    }
}

/// A page counts as the journal only if it came with 200 and mentions the
/// journal in either language.
pub fn classify(status: StatusCode, body: String) -> JournalPage {
    if status == StatusCode::OK && has_journal_marker(&body) {
        JournalPage::Journal(body)
    } else {
        debug!("Journal page rejected, status {status}");
        JournalPage::Rejected { status }
    }
}

fn has_journal_marker(body: &str) -> bool {
    body.contains("Журнал") || body.to_lowercase().contains("баға")
}
