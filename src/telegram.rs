use std::sync::Arc;

use anyhow::Context;
use log::{error, info};
use teloxide::{
    dispatching::{HandlerExt, UpdateFilterExt, UpdateHandler},
    dptree,
    error_handlers::LoggingErrorHandler,
    payloads::SendMessageSetters,
    prelude::{Bot, Dispatcher, Requester},
    types::{ChatId, Message, ParseMode, Update},
    update_listeners::webhooks,
    utils::{command::BotCommands, html::escape},
};

use crate::{
    api::JournalClient,
    config::{Opts, Webhook},
    cookie_store::UserId,
    messages,
    service::{GradeService, Progress},
};

pub type Service = GradeService<JournalClient>;

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Команды:")]
pub enum Command {
    #[command(description = "как начать")]
    Start,
    #[command(description = "обновить оценки с сохранённой cookie")]
    Refresh,
    #[command(description = "этот список")]
    Help,
}

/// Any text that is not a command is taken as a cookie. Only private chats
/// are served, so cookies are never pasted where others can read them.
pub fn schema() -> UpdateHandler<anyhow::Error> {
    Update::filter_message()
        .filter(|msg: Message| is_served(&msg))
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::endpoint(handle_message))
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    service: Arc<Service>,
) -> anyhow::Result<()> {
    info!("Command {cmd:?} in chat {}", msg.chat.id);
    let reply = match cmd {
        Command::Start => messages::GREETING.to_owned(),
        Command::Help => escape(&Command::descriptions().to_string()),
        Command::Refresh => {
            let Some(user) = sender(&msg) else {
                return Ok(());
            };
            service.refresh(user, &ChatProgress::new(&bot, &msg)).await
        }
    };
    send_html(&bot, msg.chat.id, reply).await
}

async fn handle_message(bot: Bot, msg: Message, service: Arc<Service>) -> anyhow::Result<()> {
    let reply = match incoming(&msg) {
        Incoming::Ignored => return Ok(()),
        Incoming::NotText => messages::NOT_A_TEXT.to_owned(),
        Incoming::Cookie { user, text } => {
            service
                .submit_cookie(user, text, &ChatProgress::new(&bot, &msg))
                .await
        }
    };
    send_html(&bot, msg.chat.id, reply).await
}

/// What a non-command message asks of the bot.
#[derive(Debug, PartialEq, Eq)]
enum Incoming<'a> {
    Cookie { user: UserId, text: &'a str },
    NotText,
    Ignored,
}

fn is_served(msg: &Message) -> bool {
    msg.chat.is_private()
}

fn incoming(msg: &Message) -> Incoming<'_> {
    if !is_served(msg) {
        return Incoming::Ignored;
    }
    let Some(user) = sender(msg) else {
        return Incoming::Ignored;
    };
    match msg.text() {
        Some(text) => Incoming::Cookie { user, text },
        None => Incoming::NotText,
    }
}

fn sender(msg: &Message) -> Option<UserId> {
    msg.from.as_ref().map(|user| UserId::from(user.id.0))
}

async fn send_html(bot: &Bot, chat_id: ChatId, text: String) -> anyhow::Result<()> {
    for chunk in messages::split_message(&text, messages::MESSAGE_LIMIT) {
        bot.send_message(chat_id, chunk)
            .parse_mode(ParseMode::Html)
            .await
            .with_context(|| format!("While replying to chat {chat_id}"))?;
    }
    Ok(())
}

struct ChatProgress<'a> {
    bot: &'a Bot,
    chat_id: ChatId,
}
impl<'a> ChatProgress<'a> {
    fn new(bot: &'a Bot, msg: &Message) -> Self {
        Self {
            bot,
            chat_id: msg.chat.id,
        }
    }
}
impl Progress for ChatProgress<'_> {
    async fn report(&self, text: &'static str) {
        if let Err(e) = self.bot.send_message(self.chat_id, text).await {
            error!("Failed to send a progress message to {}: {e}", self.chat_id);
        }
    }
}

/// The server route is the path of the registered URL.
pub fn webhook_options(webhook: Webhook) -> webhooks::Options {
    webhooks::Options::new(webhook.address, webhook.url)
}

/// Serves updates until Ctrl-C. Long polling unless `APP_URL` is configured,
/// in which case Telegram pushes updates to `<APP_URL>/webhook/<id>_<secret>`.
pub async fn run(opts: &Opts, service: Service) -> anyhow::Result<()> {
    let bot = Bot::new(&opts.bot_token);
    bot.set_my_commands(Command::bot_commands())
        .await
        .context("While registering bot commands")?;

    let mut dispatcher = Dispatcher::builder(bot.clone(), schema())
        .dependencies(dptree::deps![Arc::new(service)])
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error occurred in the update handler",
        ))
        .enable_ctrlc_handler()
        .build();

    match opts.webhook()? {
        None => {
            info!("Bot started (polling mode)");
            dispatcher.dispatch().await;
        }
        Some(webhook) => {
            info!("Bot started (webhook mode), listening on {}", webhook.address);
            let listener = webhooks::axum(bot, webhook_options(webhook))
                .await
                .context("While setting up the webhook")?;
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error occurred in the webhook"),
                )
                .await;
        }
    }
    info!("Bot stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use teloxide::{
        types::Message,
        update_listeners::webhooks,
        utils::command::BotCommands,
    };
    use tower::ServiceExt;

    use crate::{
        config::{webhook_url, Webhook},
        cookie_store::UserId,
    };

    use super::{incoming, webhook_options, Command, Incoming};

    fn private_chat() -> Value {
        json!({"id": 42, "type": "private", "first_name": "Aida"})
    }

    fn group_chat() -> Value {
        json!({"id": -1001, "type": "group", "title": "ИС-21"})
    }

    fn message(chat: Value, content: Value) -> Message {
        let mut json = json!({
            "message_id": 7,
            "date": 1_700_000_000,
            "chat": chat,
            "from": {"id": 42, "is_bot": false, "first_name": "Aida"},
        });
        if let (Some(json), Some(content)) = (json.as_object_mut(), content.as_object()) {
            json.extend(content.clone());
        }
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn commands_are_parsed() {
        assert!(matches!(Command::parse("/start", "bot"), Ok(Command::Start)));
        assert!(matches!(
            Command::parse("/refresh", "bot"),
            Ok(Command::Refresh)
        ));
        assert!(Command::parse("laravel_session=abc", "bot").is_err());
    }

    #[test]
    fn every_command_is_registered() {
        let commands = Command::bot_commands();
        assert_eq!(commands.len(), 3);
        assert!(commands.iter().all(|c| !c.description.is_empty()));
    }

    #[test]
    fn private_text_is_a_cookie_submission() {
        let msg = message(private_chat(), json!({"text": "laravel_session=abc"}));
        assert_eq!(
            incoming(&msg),
            Incoming::Cookie {
                user: UserId::from(42),
                text: "laravel_session=abc"
            }
        );
    }

    #[test]
    fn group_messages_are_ignored() {
        let msg = message(group_chat(), json!({"text": "laravel_session=abc"}));
        assert_eq!(incoming(&msg), Incoming::Ignored);
    }

    #[test]
    fn non_text_gets_a_hint() {
        let msg = message(
            private_chat(),
            json!({"location": {"latitude": 51.13, "longitude": 71.43}}),
        );
        assert_eq!(incoming(&msg), Incoming::NotText);
    }

    #[test]
    fn message_without_sender_is_ignored() {
        let mut msg = message(private_chat(), json!({"text": "laravel_session=abc"}));
        msg.from = None;
        assert_eq!(incoming(&msg), Incoming::Ignored);
    }

    #[tokio::test]
    async fn webhook_answers_only_on_the_full_token_path() {
        let app_url = "https://grades.example.com".parse().unwrap();
        let url = webhook_url(&app_url, "123456:secret").unwrap();
        let mut options = webhook_options(Webhook {
            address: SocketAddr::from(([127, 0, 0, 1], 8443)),
            url,
        });
        options.secret_token = Some("header-secret".to_owned());
        let (_listener, _stop, router) = webhooks::axum_no_setup(options);

        let update = json!({
            "update_id": 1,
            "message": {
                "message_id": 7,
                "date": 1_700_000_000,
                "chat": private_chat(),
                "from": {"id": 42, "is_bot": false, "first_name": "Aida"},
                "text": "/start",
            },
        });
        let status = |path: &str| {
            let request = Request::post(path)
                .header("content-type", "application/json")
                .header("x-telegram-bot-api-secret-token", "header-secret")
                .body(Body::from(update.to_string()))
                .unwrap();
            let router = router.clone();
            async move { router.oneshot(request).await.unwrap().status() }
        };

        assert_eq!(status("/webhook/123456_wrong").await, StatusCode::NOT_FOUND);
        assert_eq!(status("/webhook/123456").await, StatusCode::NOT_FOUND);
        assert_ne!(status("/webhook/123456_secret").await, StatusCode::NOT_FOUND);
    }
}
