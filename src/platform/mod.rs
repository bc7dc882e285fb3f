pub mod telegram;

/// A text message received from the chat platform
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Platform chat identifier
    pub chat_id: i64,
    /// Sender username or display name, empty if unknown
    pub user_name: String,
    /// The message text
    pub text: String,
}
