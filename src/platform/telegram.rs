use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, LinkPreviewOptions, ParseMode, User};
use tracing::{info, warn};

use crate::platform::IncomingMessage;
use crate::relay::{Relay, Reply};

/// Break a reply into pieces of at most `max_len` bytes, preferring to cut
/// after a newline, then after a space. A single character wider than
/// `max_len` becomes its own chunk.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.len() > max_len {
        let mut cut = max_len;
        while cut > 0 && !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }

        let window = &rest[..cut];
        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .map(|pos| pos + 1)
            .unwrap_or(cut);

        let (head, tail) = rest.split_at(cut);
        chunks.push(head.to_string());
        rest = tail;
    }

    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

/// `@username` if set, otherwise "First Last", otherwise empty.
fn sender_name(user: Option<&User>) -> String {
    let Some(user) = user else {
        return String::new();
    };
    if let Some(username) = user.username.as_deref().filter(|u| !u.is_empty()) {
        return username.to_string();
    }
    display_name(&user.first_name, user.last_name.as_deref())
}

fn display_name(first: &str, last: Option<&str>) -> String {
    match last.filter(|l| !l.is_empty()) {
        Some(last) => format!("{} {}", first, last).trim().to_string(),
        None => first.trim().to_string(),
    }
}

fn no_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}

/// Run the Telegram platform until a shutdown signal arrives
pub async fn run(relay: Arc<Relay>, bot: Bot) -> Result<()> {
    info!("Starting Telegram platform...");

    let handler = Update::filter_message().endpoint(handle_message);

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![relay])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build();

    let token = dispatcher.shutdown_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, stopping dispatcher");
        match token.shutdown() {
            Ok(stopped) => stopped.await,
            Err(_) => warn!("Dispatcher was not running"),
        }
    });

    dispatcher.dispatch().await;
    info!("Telegram platform stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn handle_message(bot: Bot, msg: Message, relay: Arc<Relay>) -> ResponseResult<()> {
    let text = match msg.text() {
        Some(t) => t.to_string(),
        None => return Ok(()),
    };

    let incoming = IncomingMessage {
        chat_id: msg.chat.id.0,
        user_name: sender_name(msg.from.as_ref()),
        text,
    };

    info!(
        "Telegram message in chat {} from {:?}: {}",
        incoming.chat_id, incoming.user_name, incoming.text
    );

    let typing_bot = bot.clone();
    let chat_id = msg.chat.id;
    let show_typing = move || {
        tokio::spawn(async move {
            typing_bot
                .send_chat_action(chat_id, ChatAction::Typing)
                .await
                .ok();
        });
    };

    let Some(reply) = relay.handle_with(&incoming, show_typing).await else {
        return Ok(());
    };

    send_reply(&bot, msg.chat.id, reply).await
}

async fn send_reply(bot: &Bot, chat_id: ChatId, reply: Reply) -> ResponseResult<()> {
    for chunk in split_message(&reply.text, 4000) {
        let mut request = bot.send_message(chat_id, chunk);
        if reply.html {
            request = request.parse_mode(ParseMode::Html);
        }
        if reply.disable_link_preview {
            request = request.link_preview_options(no_preview());
        }
        request.await?;
    }
    Ok(())
}
