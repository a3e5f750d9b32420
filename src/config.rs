use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::Context;
use clap::Parser;
use url::Url;

use crate::{
    api::{DEFAULT_TIMEOUT, JOURNAL_URL},
    cookie_store::{StorageKind, DEFAULT_COOKIE_MARKER},
};

/// Telegram bot showing Snation College journal grades.
///
/// Every option can also be given through the environment variable named
/// next to it, which is how hosted deployments configure the bot.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Opts {
    /// Token issued by @BotFather.
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    pub bot_token: String,

    /// Public base URL of this service. When set, updates arrive through a
    /// webhook instead of long polling.
    #[arg(long, env = "APP_URL")]
    pub app_url: Option<Url>,

    /// Port the webhook server listens on.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "STORAGE", value_enum, default_value_t = StorageKind::Json)]
    pub storage: StorageKind,

    /// Cookie file or database; defaults to `users.json` or `users.db`.
    #[arg(long, env = "STORAGE_PATH")]
    pub storage_path: Option<PathBuf>,

    #[arg(long, env = "JOURNAL_URL", default_value = JOURNAL_URL)]
    pub journal_url: Url,

    /// Substring every submitted cookie must contain.
    #[arg(long, env = "COOKIE_MARKER", default_value = DEFAULT_COOKIE_MARKER)]
    pub cookie_marker: String,

    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub request_timeout_secs: u64,
}

impl Opts {
    pub fn storage_path(&self) -> PathBuf {
        self.storage_path
            .clone()
            .unwrap_or_else(|| self.storage.default_path().to_owned())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Where Telegram should deliver updates, if the webhook mode is on.
    pub fn webhook(&self) -> anyhow::Result<Option<Webhook>> {
        let Some(app_url) = &self.app_url else {
            return Ok(None);
        };
        let url = webhook_url(app_url, &self.bot_token)?;
        Ok(Some(Webhook {
            address: SocketAddr::from(([0, 0, 0, 0], self.port)),
            url,
        }))
    }
}

#[derive(Debug)]
pub struct Webhook {
    pub address: SocketAddr,
    pub url: Url,
}

/// `<app url>/webhook/<id>_<secret>`. The `:` of the token is replaced
/// because the router would read everything after it as a path parameter,
/// leaving only the public bot id to match.
pub fn webhook_url(app_url: &Url, token: &str) -> anyhow::Result<Url> {
    let base = app_url.as_str().trim_end_matches('/');
    let segment = token.replace(':', "_");
    format!("{base}/webhook/{segment}")
        .parse()
        .with_context(|| format!("Invalid APP_URL: {app_url}"))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use clap::Parser;

    use crate::cookie_store::StorageKind;

    use super::{webhook_url, Opts};

    #[test]
    fn webhook_url_is_token_suffixed() {
        let app_url = "https://grades.example.com/".parse().unwrap();
        assert_eq!(
            webhook_url(&app_url, "123:abc").unwrap().as_str(),
            "https://grades.example.com/webhook/123_abc"
        );
        let app_url = "https://example.com/bots".parse().unwrap();
        assert_eq!(
            webhook_url(&app_url, "t").unwrap().as_str(),
            "https://example.com/bots/webhook/t"
        );
    }

    #[test]
    fn defaults() {
        let opts = Opts::try_parse_from(["snation-grades", "--bot-token", "t"]).unwrap();
        assert_eq!(opts.storage, StorageKind::Json);
        assert_eq!(opts.storage_path(), Path::new("users.json"));
        assert_eq!(opts.cookie_marker, "laravel_session");
        assert_eq!(
            opts.journal_url.as_str(),
            "https://college.snation.kz/kz/tko/control/journals"
        );
        assert_eq!(opts.request_timeout().as_secs(), 20);
        assert!(opts.webhook().unwrap().is_none());
    }

    #[test]
    fn app_url_switches_to_webhook() {
        let opts = Opts::try_parse_from([
            "snation-grades",
            "--bot-token",
            "t",
            "--app-url",
            "https://bot.example.com",
            "--port",
            "10000",
            "--storage",
            "sqlite",
        ])
        .unwrap();
        assert_eq!(opts.storage_path(), Path::new("users.db"));
        let webhook = opts.webhook().unwrap().unwrap();
        assert_eq!(webhook.address.port(), 10000);
        assert_eq!(webhook.url.as_str(), "https://bot.example.com/webhook/t");
    }
}
