use log::{debug, trace};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use super::{FeedEvent, RecordFeed, Subscription, TicketScope};
use crate::tickets::Ticket;

enum Watcher {
    One {
        ticket_id: String,
        tx: mpsc::UnboundedSender<FeedEvent<Ticket>>,
    },
    Many {
        scope: TicketScope,
        tx: mpsc::UnboundedSender<FeedEvent<Vec<Ticket>>>,
    },
}

#[derive(Default)]
struct FeedState {
    tickets: BTreeMap<String, Ticket>,
    watchers: HashMap<u64, Watcher>,
    next_watcher: u64,
}

impl FeedState {
    fn scoped(&self, scope: &TicketScope) -> Vec<Ticket> {
        let mut tickets: Vec<Ticket> = self
            .tickets
            .values()
            .filter(|t| scope.matches(t))
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tickets
    }

    fn add_watcher(&mut self, watcher: Watcher) -> u64 {
        self.next_watcher += 1;
        self.watchers.insert(self.next_watcher, watcher);
        self.next_watcher
    }
}

/// In-process document store with per-record and per-scope watchers.
#[derive(Clone, Default)]
pub struct MemoryFeed {
    state: Arc<Mutex<FeedState>>,
}

impl MemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tickets(tickets: impl IntoIterator<Item = Ticket>) -> Self {
        let feed = Self::new();
        {
            let mut state = feed.lock();
            for ticket in tickets {
                state.tickets.insert(ticket.id.clone(), ticket);
            }
        }
        feed
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, id: &str) -> Option<Ticket> {
        self.lock().tickets.get(id).cloned()
    }

    pub fn open_watchers(&self) -> usize {
        self.lock().watchers.len()
    }

    /// Stores `ticket` and pushes it to every watcher that can see it.
    pub fn upsert(&self, ticket: Ticket) {
        let mut state = self.lock();
        let previous = state.tickets.insert(ticket.id.clone(), ticket.clone());
        trace!("memory feed upsert {}", ticket.id);

        let mut dead = Vec::new();
        let scoped: Vec<(u64, TicketScope)> = state
            .watchers
            .iter()
            .filter_map(|(key, w)| match w {
                Watcher::Many { scope, .. }
                    if scope.matches(&ticket)
                        || previous.as_ref().is_some_and(|p| scope.matches(p)) =>
                {
                    Some((*key, scope.clone()))
                }
                _ => None,
            })
            .collect();

        for (key, watcher) in &state.watchers {
            if let Watcher::One { ticket_id, tx } = watcher {
                if *ticket_id == ticket.id && tx.send(FeedEvent::Snapshot(ticket.clone())).is_err() {
                    dead.push(*key);
                }
            }
        }
        for (key, scope) in scoped {
            let snapshot = state.scoped(&scope);
            if let Some(Watcher::Many { tx, .. }) = state.watchers.get(&key) {
                if tx.send(FeedEvent::Snapshot(snapshot)).is_err() {
                    dead.push(key);
                }
            }
        }
        for key in dead {
            state.watchers.remove(&key);
        }
    }

    pub fn remove(&self, id: &str) {
        let mut state = self.lock();
        let Some(previous) = state.tickets.remove(id) else {
            return;
        };
        let mut dead = Vec::new();
        let scoped: Vec<(u64, TicketScope)> = state
            .watchers
            .iter()
            .filter_map(|(key, w)| match w {
                Watcher::Many { scope, .. } if scope.matches(&previous) => {
                    Some((*key, scope.clone()))
                }
                _ => None,
            })
            .collect();
        for (key, watcher) in &state.watchers {
            if let Watcher::One { ticket_id, tx } = watcher {
                if ticket_id == id && tx.send(FeedEvent::Removed).is_err() {
                    dead.push(*key);
                }
            }
        }
        for (key, scope) in scoped {
            let snapshot = state.scoped(&scope);
            if let Some(Watcher::Many { tx, .. }) = state.watchers.get(&key) {
                if tx.send(FeedEvent::Snapshot(snapshot)).is_err() {
                    dead.push(key);
                }
            }
        }
        for key in dead {
            state.watchers.remove(&key);
        }
    }

    /// Delivers a listener error to the watchers of one ticket.
    pub fn fail(&self, id: &str, message: &str) {
        let state = self.lock();
        for watcher in state.watchers.values() {
            if let Watcher::One { ticket_id, tx } = watcher {
                if ticket_id == id {
                    let _ = tx.send(FeedEvent::Error(message.to_string()));
                }
            }
        }
    }

    fn release_fn(&self, key: u64) -> impl FnOnce() + Send + 'static {
        let state = Arc::downgrade(&self.state);
        move || {
            if let Some(state) = state.upgrade() {
                let mut state = state.lock().unwrap_or_else(|p| p.into_inner());
                if state.watchers.remove(&key).is_some() {
                    debug!("memory feed watcher {key} removed");
                }
            }
        }
    }
}

impl RecordFeed for MemoryFeed {
    fn watch_ticket(&self, id: &str) -> Subscription<Ticket> {
        let (tx, rx) = mpsc::unbounded_channel();
        let key = {
            let mut state = self.lock();
            let initial = match state.tickets.get(id) {
                Some(ticket) => FeedEvent::Snapshot(ticket.clone()),
                None => FeedEvent::Removed,
            };
            let _ = tx.send(initial);
            state.add_watcher(Watcher::One {
                ticket_id: id.to_string(),
                tx,
            })
        };
        Subscription::new(format!("tickets/{id}"), rx, self.release_fn(key))
    }

    fn watch_tickets(&self, scope: TicketScope) -> Subscription<Vec<Ticket>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let label = scope.to_string();
        let key = {
            let mut state = self.lock();
            let _ = tx.send(FeedEvent::Snapshot(state.scoped(&scope)));
            state.add_watcher(Watcher::Many { scope, tx })
        };
        Subscription::new(label, rx, self.release_fn(key))
    }
}
