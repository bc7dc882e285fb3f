use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Target language used for chats that never picked one.
pub const DEFAULT_LANG: &str = "en";

/// Per-chat target language. Lives for the process lifetime; no expiry.
#[derive(Default)]
pub struct PreferenceStore {
    langs: Mutex<HashMap<i64, String>>,
}

impl PreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, chat_id: i64, code: &str) {
        self.langs.lock().await.insert(chat_id, code.to_string());
    }

    pub async fn get(&self, chat_id: i64) -> String {
        self.langs
            .lock()
            .await
            .get(&chat_id)
            .cloned()
            .unwrap_or_else(|| DEFAULT_LANG.to_string())
    }
}

/// Drops events that arrive within `window` of the last accepted event
/// for the same chat. Dropped events do not move the timestamp.
pub struct Debouncer {
    window: Duration,
    last_accepted: Mutex<HashMap<i64, Instant>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if the event should be processed.
    pub async fn accept(&self, chat_id: i64) -> bool {
        self.accept_at(chat_id, Instant::now()).await
    }

    pub async fn accept_at(&self, chat_id: i64, now: Instant) -> bool {
        let mut last = self.last_accepted.lock().await;
        if let Some(prev) = last.get(&chat_id) {
            if now.saturating_duration_since(*prev) < self.window {
                return false;
            }
        }
        last.insert(chat_id, now);
        true
    }
}

/// Mutable per-chat state owned by the relay. Created at startup, dropped
/// at shutdown.
pub struct ChatState {
    pub prefs: PreferenceStore,
    pub debounce: Debouncer,
}

impl ChatState {
    pub fn new(debounce_window: Duration) -> Self {
        Self {
            prefs: PreferenceStore::new(),
            debounce: Debouncer::new(debounce_window),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_lang() {
        let prefs = PreferenceStore::new();
        assert_eq!(prefs.get(42).await, "en");
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let prefs = PreferenceStore::new();
        prefs.set(42, "tr").await;
        assert_eq!(prefs.get(42).await, "tr");
        prefs.set(42, "de").await;
        assert_eq!(prefs.get(42).await, "de");
        assert_eq!(prefs.get(7).await, "en");
    }

    #[tokio::test]
    async fn test_debounce_window() {
        let debounce = Debouncer::new(Duration::from_millis(900));
        let t0 = Instant::now();
        assert!(debounce.accept_at(1, t0).await);
        assert!(!debounce.accept_at(1, t0 + Duration::from_millis(500)).await);
        assert!(!debounce.accept_at(1, t0 + Duration::from_millis(899)).await);
        assert!(debounce.accept_at(1, t0 + Duration::from_millis(900)).await);
    }

    #[tokio::test]
    async fn test_dropped_event_does_not_extend_window() {
        let debounce = Debouncer::new(Duration::from_millis(900));
        let t0 = Instant::now();
        assert!(debounce.accept_at(1, t0).await);
        assert!(!debounce.accept_at(1, t0 + Duration::from_millis(800)).await);
        assert!(debounce.accept_at(1, t0 + Duration::from_millis(1000)).await);
    }

    #[tokio::test]
    async fn test_debounce_is_per_chat() {
        let debounce = Debouncer::new(Duration::from_millis(900));
        let t0 = Instant::now();
        assert!(debounce.accept_at(1, t0).await);
        assert!(debounce.accept_at(2, t0).await);
        assert!(!debounce.accept_at(1, t0).await);
    }
}
