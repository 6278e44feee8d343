//! Notification watcher.
//!
//! Notifications are only exposed through REST, so the watcher polls on an
//! interval and republishes the result as a [`Subscription`], the same
//! push-style handle the ticket feeds hand out.

use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::api::NotificationSource;
use crate::feed::{FeedEvent, Subscription};
use crate::shared::DeskError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "userId", default)]
    pub user_id: String,
    pub message: String,
    #[serde(rename = "type", default = "generic_kind")]
    pub kind: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "ticketId", default)]
    pub ticket_id: Option<String>,
}

fn generic_kind() -> String {
    "generic".to_string()
}

impl Notification {
    /// Older records only carry `createdAt`.
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp.or(self.created_at)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationSnapshot {
    pub items: Vec<Notification>,
    pub unread: usize,
}

impl NotificationSnapshot {
    pub fn from_items(mut items: Vec<Notification>) -> Self {
        items.sort_by(|a, b| b.sent_at().cmp(&a.sent_at()));
        let unread = items.iter().filter(|n| !n.read).count();
        Self { items, unread }
    }

    pub fn has_unread(&self) -> bool {
        self.unread > 0
    }
}

pub struct NotificationWatcher;

impl NotificationWatcher {
    /// Starts polling `source` every `interval`. The first fetch happens
    /// immediately. Releasing the subscription stops the task.
    pub fn spawn(
        source: Arc<dyn NotificationSource>,
        interval: Duration,
    ) -> Subscription<NotificationSnapshot> {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(poll_loop(source, interval, tx));
        Subscription::new("notifications/my", rx, move || handle.abort())
    }
}

async fn poll_loop(
    source: Arc<dyn NotificationSource>,
    interval: Duration,
    tx: mpsc::UnboundedSender<FeedEvent<NotificationSnapshot>>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last: Option<NotificationSnapshot> = None;

    loop {
        ticker.tick().await;
        if tx.is_closed() {
            break;
        }
        match source.fetch_notifications().await {
            Ok(items) => {
                let snapshot = NotificationSnapshot::from_items(items);
                if last.as_ref() != Some(&snapshot) {
                    debug!("notifications changed: {} unread", snapshot.unread);
                    if tx.send(FeedEvent::Snapshot(snapshot.clone())).is_err() {
                        break;
                    }
                    last = Some(snapshot);
                }
            }
            Err(e @ DeskError::Unauthorized(_)) => {
                error!("notification polling stopped: {e}");
                let _ = tx.send(FeedEvent::Error(e.to_string()));
                break;
            }
            Err(e) => {
                warn!("notification poll failed, keeping previous list: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedSource {
        calls: AtomicUsize,
        responses: Mutex<Vec<crate::shared::Result<Vec<Notification>>>>,
    }

    #[async_trait]
    impl NotificationSource for ScriptedSource {
        async fn fetch_notifications(&self) -> crate::shared::Result<Vec<Notification>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap_or_else(|p| p.into_inner());
            if responses.len() > 1 {
                responses.remove(0)
            } else {
                match responses.first() {
                    Some(Ok(items)) => Ok(items.clone()),
                    _ => Ok(Vec::new()),
                }
            }
        }
    }

    fn note(id: &str, read: bool) -> Notification {
        Notification {
            id: id.to_string(),
            user_id: "u1".to_string(),
            message: format!("note {id}"),
            kind: "ticket_created".to_string(),
            read,
            timestamp: None,
            created_at: None,
            ticket_id: Some("t1".to_string()),
        }
    }

    #[test]
    fn test_snapshot_unread_flag() {
        let snap = NotificationSnapshot::from_items(vec![note("a", true), note("b", false)]);
        assert_eq!(snap.unread, 1);
        assert!(snap.has_unread());
        assert!(!NotificationSnapshot::default().has_unread());
    }

    #[test]
    fn test_notification_decodes_api_shape() {
        let raw = r#"{"id":"n1","userId":"u1","message":"New comment","read":false,"timestamp":"2024-06-01T08:00:00.000Z","createdAt":"2024-06-01T08:00:00.000Z","ticketId":"t9"}"#;
        let n: Notification = crate::assert_ok!(serde_json::from_str(raw));
        assert_eq!(n.kind, "generic");
        assert_eq!(n.ticket_id.as_deref(), Some("t9"));
        assert!(n.timestamp.is_some());
        assert_eq!(n.sent_at(), n.created_at);
    }

    #[test]
    fn test_created_at_only_record_still_sorts() {
        let older = r#"{"id":"n1","message":"old","createdAt":"2024-06-01T08:00:00Z"}"#;
        let newer = r#"{"id":"n2","message":"new","timestamp":"2024-06-02T08:00:00Z","createdAt":"2024-06-02T08:00:00Z"}"#;
        let older: Notification = crate::assert_ok!(serde_json::from_str(older));
        let newer: Notification = crate::assert_ok!(serde_json::from_str(newer));
        assert!(older.timestamp.is_none());
        assert!(older.sent_at().is_some());

        let snap = NotificationSnapshot::from_items(vec![older, newer]);
        assert_eq!(snap.items[0].id, "n2");
        assert_eq!(snap.unread, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watcher_publishes_changes_only() {
        let source = Arc::new(ScriptedSource {
            calls: AtomicUsize::new(0),
            responses: Mutex::new(vec![
                Ok(vec![note("a", false)]),
                Ok(vec![note("a", false)]),
                Err(DeskError::Transport("reset".into())),
                Ok(vec![note("a", true)]),
            ]),
        });
        let mut sub = NotificationWatcher::spawn(source.clone(), Duration::from_secs(30));

        let first = sub.next().await;
        assert!(matches!(first, Some(FeedEvent::Snapshot(s)) if s.unread == 1));

        let second = sub.next().await;
        assert!(matches!(second, Some(FeedEvent::Snapshot(s)) if s.unread == 0));
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
        sub.release();
    }

    #[tokio::test(start_paused = true)]
    async fn test_watcher_stops_on_unauthorized() {
        let source = Arc::new(ScriptedSource {
            calls: AtomicUsize::new(0),
            responses: Mutex::new(vec![
                Err(DeskError::Unauthorized("expired".into())),
                Ok(vec![]),
            ]),
        });
        let mut sub = NotificationWatcher::spawn(source, Duration::from_secs(30));
        assert!(matches!(sub.next().await, Some(FeedEvent::Error(_))));
        assert_eq!(sub.next().await, None);
    }
}
