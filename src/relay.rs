use std::sync::Arc;

use tracing::{debug, error, info};

use crate::activity::{ActivitySink, LogEvent, LogRecord};
use crate::command::{parse_lang_code, parse_override, Command};
use crate::llm::Generator;
use crate::platform::IncomingMessage;
use crate::state::ChatState;
use crate::translate::translate;

pub const WELCOME_MESSAGE: &str = "<b>Hi! I translate whatever you send me.</b>\n\n\
     The source language is detected automatically. Replies are in English unless you pick \
     another language.\n\n\
     <b>Commands</b>\n\
     /lang &lt;code&gt; - set the target language, e.g. <code>/lang tr</code>\n\
     /to &lt;code&gt; &lt;text&gt; - translate one message, e.g. <code>/to ru hello</code>\n\
     /id - show this chat's id\n\n\
     You can also start a message with <code>to de:</code> for a one-off translation.";

pub const USAGE_HINT: &str =
    "Usage: /lang <code> or /to <code> [text], where <code> is a 2-3 letter language code (e.g. /lang en).";

pub const FAILURE_MESSAGE: &str = "Sorry, I couldn't translate that right now. Please try again later.";

/// An outgoing reply for the chat that sent the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Render `text` as Telegram HTML.
    pub html: bool,
    pub disable_link_preview: bool,
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            html: false,
            disable_link_preview: false,
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            html: true,
            disable_link_preview: false,
        }
    }

    /// Plain text with link previews suppressed.
    pub fn quiet(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            html: false,
            disable_link_preview: true,
        }
    }
}

/// Turns inbound text events into replies and activity records.
pub struct Relay {
    state: ChatState,
    generator: Arc<dyn Generator>,
    activity: Arc<dyn ActivitySink>,
}

impl Relay {
    pub fn new(
        state: ChatState,
        generator: Arc<dyn Generator>,
        activity: Arc<dyn ActivitySink>,
    ) -> Self {
        Self {
            state,
            generator,
            activity,
        }
    }

    /// Handle one message. Returns the reply to send, if any.
    pub async fn handle(&self, msg: &IncomingMessage) -> Option<Reply> {
        self.handle_with(msg, || {}).await
    }

    /// Like [`Relay::handle`], calling `on_accept` once the event has passed
    /// the debouncer and is about to be translated.
    pub async fn handle_with<F>(&self, msg: &IncomingMessage, on_accept: F) -> Option<Reply>
    where
        F: FnOnce() + Send,
    {
        match Command::parse(&msg.text) {
            Some(Command::Start) => Some(Reply::html(WELCOME_MESSAGE)),
            Some(Command::Id) => Some(Reply::plain(msg.chat_id.to_string())),
            Some(Command::Other) => {
                debug!("Ignoring unrelated command in chat {}", msg.chat_id);
                None
            }
            Some(command @ (Command::Lang | Command::To)) => {
                self.handle_lang_command(msg, command, on_accept).await
            }
            None => {
                if !self.accept(msg.chat_id).await {
                    return None;
                }
                on_accept();
                self.translate_event(msg).await
            }
        }
    }

    async fn handle_lang_command<F>(
        &self,
        msg: &IncomingMessage,
        command: Command,
        on_accept: F,
    ) -> Option<Reply>
    where
        F: FnOnce() + Send,
    {
        let Some(code) = parse_lang_code(&msg.text) else {
            return Some(Reply::plain(USAGE_HINT));
        };
        let body = parse_override(&msg.text).map(|o| o.body).unwrap_or("");

        // A command carrying text is a translation event; a debounced one
        // must leave the stored preference untouched.
        if !body.is_empty() && !self.accept(msg.chat_id).await {
            return None;
        }

        // `/to xx text` is a one-off; everything else stores the code.
        let one_off = command == Command::To && !body.is_empty();
        if !one_off {
            self.state.prefs.set(msg.chat_id, &code).await;
            info!("Chat {} target language set to {}", msg.chat_id, code);
        }

        if body.is_empty() {
            return Some(Reply::plain(format!(
                "Target language set to \"{}\".",
                code
            )));
        }

        on_accept();
        self.translate_event(msg).await
    }

    /// Debounce check. A dropped event gets no reply and no records.
    async fn accept(&self, chat_id: i64) -> bool {
        let accepted = self.state.debounce.accept(chat_id).await;
        if !accepted {
            debug!("Debounced message in chat {}", chat_id);
        }
        accepted
    }

    /// Resolve target and text, log, translate, reply.
    async fn translate_event(&self, msg: &IncomingMessage) -> Option<Reply> {
        let chat_id = msg.chat_id;

        let (target, text) = match parse_override(&msg.text) {
            Some(ov) => {
                debug!("Chat {} override {:?} -> {}", chat_id, ov.source, ov.code);
                // Fall back to the raw text when the override leaves nothing.
                let text = if ov.body.is_empty() {
                    msg.text.as_str()
                } else {
                    ov.body
                };
                (ov.code, text)
            }
            None => (self.state.prefs.get(chat_id).await, msg.text.as_str()),
        };

        self.activity.append(LogRecord::new(
            chat_id,
            LogEvent::In {
                user: msg.user_name.clone(),
                text: text.to_string(),
                target: target.clone(),
            },
        ));

        match translate(self.generator.as_ref(), text, &target).await {
            Ok(translated) => {
                self.activity.append(LogRecord::new(
                    chat_id,
                    LogEvent::Out {
                        text: translated.clone(),
                    },
                ));
                Some(Reply::quiet(translated))
            }
            Err(e) => {
                error!("Translation failed for chat {}: {:#}", chat_id, e);
                self.activity.append(LogRecord::new(
                    chat_id,
                    LogEvent::Error {
                        error: format!("{:#}", e),
                    },
                ));
                Some(Reply::quiet(FAILURE_MESSAGE))
            }
        }
    }
}
