//! REST API client.
//!
//! Every authenticated call carries the session's bearer token. Bodies are
//! JSON except attachment upload (multipart) and export (CSV bytes).

#[cfg(feature = "directory")]
pub mod admin;
pub mod auth;
pub mod client;
pub mod notifications;
pub mod tickets;

pub use client::ApiClient;

use async_trait::async_trait;

use crate::feed::TicketScope;
use crate::notifications::Notification;
use crate::shared::Result;
use crate::tickets::{Ticket, TicketPatch};

/// Ticket calls the detail reconciler and polling feed depend on.
#[async_trait]
pub trait TicketApi: Send + Sync {
    async fn fetch_ticket(&self, id: &str) -> Result<Ticket>;

    async fn fetch_tickets(&self, scope: &TicketScope) -> Result<Vec<Ticket>>;

    async fn patch_ticket(&self, id: &str, patch: &TicketPatch) -> Result<()>;

    async fn post_comment(&self, id: &str, text: &str, commenter: &str) -> Result<()>;
}

/// Where the notification watcher pulls from.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    async fn fetch_notifications(&self) -> Result<Vec<Notification>>;
}

#[async_trait]
impl TicketApi for ApiClient {
    async fn fetch_ticket(&self, id: &str) -> Result<Ticket> {
        self.get_ticket(id).await
    }

    async fn fetch_tickets(&self, scope: &TicketScope) -> Result<Vec<Ticket>> {
        let tickets = match scope {
            TicketScope::ReportedBy(uid) => self.my_tickets(uid).await?,
            _ => self.all_tickets().await?,
        };
        Ok(tickets.into_iter().filter(|t| scope.matches(t)).collect())
    }

    async fn patch_ticket(&self, id: &str, patch: &TicketPatch) -> Result<()> {
        self.update_ticket(id, patch).await
    }

    async fn post_comment(&self, id: &str, text: &str, commenter: &str) -> Result<()> {
        self.add_comment(id, text, commenter).await
    }
}

#[async_trait]
impl NotificationSource for ApiClient {
    async fn fetch_notifications(&self) -> Result<Vec<Notification>> {
        self.my_notifications().await
    }
}
