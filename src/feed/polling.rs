use log::{debug, error, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::{FeedEvent, RecordFeed, Subscription, TicketScope};
use crate::api::TicketApi;
use crate::shared::{DeskError, Result};
use crate::tickets::Ticket;

/// Feed backed by REST polling. Each watcher is one task that refetches on
/// an interval and forwards only what changed.
#[derive(Clone)]
pub struct PollingFeed {
    api: Arc<dyn TicketApi>,
    interval: Duration,
    runtime: Handle,
}

impl PollingFeed {
    /// Must be called from inside a tokio runtime; watcher tasks run on it.
    pub fn new(api: Arc<dyn TicketApi>, interval: Duration) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| DeskError::Config(format!("polling feed needs a tokio runtime: {e}")))?;
        Ok(Self {
            api,
            interval,
            runtime,
        })
    }

    fn spawn<T, F, Fut>(&self, label: String, fetch: F) -> Subscription<T>
    where
        T: PartialEq + Clone + Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self
            .runtime
            .spawn(poll_loop(label.clone(), self.interval, tx, fetch));
        Subscription::new(label, rx, move || handle.abort())
    }
}

async fn poll_loop<T, F, Fut>(
    label: String,
    interval: Duration,
    tx: mpsc::UnboundedSender<FeedEvent<T>>,
    mut fetch: F,
) where
    T: PartialEq + Clone,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last: Option<FeedEvent<T>> = None;

    loop {
        ticker.tick().await;
        if tx.is_closed() {
            break;
        }
        let (event, fatal) = match fetch().await {
            Ok(value) => (FeedEvent::Snapshot(value), false),
            Err(DeskError::NotFound(_)) => (FeedEvent::Removed, false),
            Err(e) if e.is_transient() => {
                warn!("poll of {label} failed, will retry next tick: {e}");
                continue;
            }
            Err(e @ (DeskError::Unauthorized(_) | DeskError::Forbidden(_))) => {
                (FeedEvent::Error(e.to_string()), true)
            }
            Err(e) => (FeedEvent::Error(e.to_string()), false),
        };
        if last.as_ref() == Some(&event) {
            continue;
        }
        if let FeedEvent::Error(message) = &event {
            error!("listener on {label} failed: {message}");
        }
        if tx.send(event.clone()).is_err() {
            break;
        }
        if fatal {
            debug!("polling of {label} stopped");
            break;
        }
        last = Some(event);
    }
}

impl RecordFeed for PollingFeed {
    fn watch_ticket(&self, id: &str) -> Subscription<Ticket> {
        let api = self.api.clone();
        let id = id.to_string();
        let label = format!("tickets/{id}");
        self.spawn(label, move || {
            let api = api.clone();
            let id = id.clone();
            async move { api.fetch_ticket(&id).await }
        })
    }

    fn watch_tickets(&self, scope: TicketScope) -> Subscription<Vec<Ticket>> {
        let api = self.api.clone();
        let label = scope.to_string();
        self.spawn(label, move || {
            let api = api.clone();
            let scope = scope.clone();
            async move {
                let mut tickets = api.fetch_tickets(&scope).await?;
                tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                Ok(tickets)
            }
        })
    }
}
