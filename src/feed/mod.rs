//! Live record feeds.
//!
//! A feed pushes every change of a watched record (or record set) to the
//! holder of a [`Subscription`]. Dropping or releasing the subscription
//! tears the listener down exactly once; nothing is delivered afterwards.

pub mod memory;
pub mod polling;

pub use memory::MemoryFeed;
pub use polling::PollingFeed;

use log::debug;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

use crate::tickets::Ticket;

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent<T> {
    Snapshot(T),
    /// The watched record no longer exists (or never did).
    Removed,
    Error(String),
}

/// Which tickets a list watcher receives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TicketScope {
    All,
    ReportedBy(String),
    AssignedTo(String),
    DisplayId(String),
}

impl TicketScope {
    pub fn matches(&self, ticket: &Ticket) -> bool {
        match self {
            Self::All => true,
            Self::ReportedBy(uid) => ticket.reporter_id == *uid,
            Self::AssignedTo(uid) => ticket.assigned_to_id.as_deref() == Some(uid.as_str()),
            Self::DisplayId(display_id) => ticket.display_id.eq_ignore_ascii_case(display_id),
        }
    }
}

impl fmt::Display for TicketScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "tickets/*"),
            Self::ReportedBy(uid) => write!(f, "tickets?reporter={uid}"),
            Self::AssignedTo(uid) => write!(f, "tickets?assignee={uid}"),
            Self::DisplayId(id) => write!(f, "tickets?display_id={id}"),
        }
    }
}

type ReleaseFn = Box<dyn FnOnce() + Send + 'static>;

pub struct Subscription<T> {
    id: u64,
    label: String,
    rx: mpsc::UnboundedReceiver<FeedEvent<T>>,
    release: Option<ReleaseFn>,
}

impl<T> Subscription<T> {
    pub fn new(
        label: impl Into<String>,
        rx: mpsc::UnboundedReceiver<FeedEvent<T>>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        let id = NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed);
        let label = label.into();
        debug!("subscription #{id} opened on {label}");
        Self {
            id,
            label,
            rx,
            release: Some(Box::new(release)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_open(&self) -> bool {
        self.release.is_some()
    }

    /// Waits for the next event. `None` once the producer is gone.
    pub async fn next(&mut self) -> Option<FeedEvent<T>> {
        if !self.is_open() {
            return None;
        }
        self.rx.recv().await
    }

    /// Returns an already-delivered event without waiting.
    pub fn try_next(&mut self) -> Option<FeedEvent<T>> {
        if !self.is_open() {
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// Drains everything queued so far and returns the newest event.
    pub fn latest(&mut self) -> Option<FeedEvent<T>> {
        let mut last = None;
        while let Some(event) = self.try_next() {
            last = Some(event);
        }
        last
    }

    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if let Some(release) = self.release.take() {
            self.rx.close();
            release();
            debug!("subscription #{} released from {}", self.id, self.label);
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Source of live ticket pushes.
pub trait RecordFeed: Send + Sync {
    fn watch_ticket(&self, id: &str) -> Subscription<Ticket>;

    fn watch_tickets(&self, scope: TicketScope) -> Subscription<Vec<Ticket>>;
}
