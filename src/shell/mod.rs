//! Shell and router.
//!
//! Owns the signed-in session and the subscriptions of the screen on
//! display. Every navigation releases what the previous screen opened
//! before the next screen subscribes.

use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;

use crate::api::ApiClient;
use crate::feed::{RecordFeed, Subscription, TicketScope};
use crate::notifications::NotificationSnapshot;
use crate::session::{Identity, Session};
use crate::shared::{DeskError, Result};
use crate::tickets::detail::LiveTicketDetail;
use crate::tickets::Ticket;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Screen {
    Dashboard,
    MyTickets,
    AllTickets,
    TicketDetail(String),
    Users,
    Clients,
    Profile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Anyone,
    Elevated,
    Admin,
}

impl Screen {
    fn access(&self) -> Access {
        match self {
            Self::AllTickets => Access::Elevated,
            Self::Users | Self::Clients => Access::Admin,
            _ => Access::Anyone,
        }
    }

    pub fn allows(&self, identity: &Identity) -> bool {
        match self.access() {
            Access::Anyone => true,
            Access::Elevated => identity.is_elevated(),
            Access::Admin => identity.is_admin(),
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dashboard => f.write_str("dashboard"),
            Self::MyTickets => f.write_str("myTickets"),
            Self::AllTickets => f.write_str("allTickets"),
            Self::TicketDetail(id) => write!(f, "ticketDetail/{id}"),
            Self::Users => f.write_str("users"),
            Self::Clients => f.write_str("clients"),
            Self::Profile => f.write_str("profile"),
        }
    }
}

/// What the current screen keeps open.
enum ActiveView {
    Idle,
    Tickets(Subscription<Vec<Ticket>>),
    Detail(LiveTicketDetail),
}

impl ActiveView {
    fn release(self) {
        match self {
            Self::Idle => {}
            Self::Tickets(subscription) => subscription.release(),
            Self::Detail(live) => {
                live.close();
            }
        }
    }
}

pub struct Shell {
    feed: Arc<dyn RecordFeed>,
    api: Option<Arc<ApiClient>>,
    session: Option<Session>,
    screen: Option<Screen>,
    active: ActiveView,
    notifications: Option<Subscription<NotificationSnapshot>>,
}

impl Shell {
    pub fn new(feed: Arc<dyn RecordFeed>) -> Self {
        Self {
            feed,
            api: None,
            session: None,
            screen: None,
            active: ActiveView::Idle,
            notifications: None,
        }
    }

    /// Client whose bearer token is cleared on sign out.
    pub fn with_client(mut self, api: Arc<ApiClient>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn screen(&self) -> Option<&Screen> {
        self.screen.as_ref()
    }

    /// Installs the session and opens the dashboard.
    pub fn sign_in(&mut self, session: Session) -> Result<()> {
        if self.session.is_some() {
            self.sign_out();
        }
        info!("{} signed in as {}", session.identity.email, session.identity.role);
        self.session = Some(session);
        self.navigate(Screen::Dashboard)
    }

    pub fn sign_out(&mut self) {
        self.release_active();
        if let Some(notifications) = self.notifications.take() {
            notifications.release();
        }
        self.screen = None;
        if let Some(api) = &self.api {
            api.clear_token();
        }
        if let Some(session) = self.session.take() {
            info!("{} signed out", session.identity.email);
        }
    }

    pub fn attach_notifications(&mut self, subscription: Subscription<NotificationSnapshot>) {
        if let Some(previous) = self.notifications.replace(subscription) {
            previous.release();
        }
    }

    /// Both live streams at once, for callers multiplexing them.
    pub fn streams_mut(
        &mut self,
    ) -> (
        Option<&mut Subscription<Vec<Ticket>>>,
        Option<&mut Subscription<NotificationSnapshot>>,
    ) {
        let tickets = match &mut self.active {
            ActiveView::Tickets(subscription) => Some(subscription),
            _ => None,
        };
        (tickets, self.notifications.as_mut())
    }

    fn release_active(&mut self) {
        std::mem::replace(&mut self.active, ActiveView::Idle).release();
    }

    pub fn navigate(&mut self, screen: Screen) -> Result<()> {
        let identity = self
            .session
            .as_ref()
            .map(|s| s.identity.clone())
            .ok_or_else(|| DeskError::Unauthorized("Please sign in first.".to_string()))?;
        if self.screen.as_ref() == Some(&screen) {
            debug!("already on {screen}");
            return Ok(());
        }
        if !screen.allows(&identity) {
            warn!("{} may not open {screen}", identity.email);
            return Err(DeskError::Forbidden(format!(
                "You do not have permission to open {screen}."
            )));
        }

        self.release_active();
        self.active = match &screen {
            Screen::Dashboard => {
                let scope = if identity.is_elevated() {
                    TicketScope::All
                } else {
                    TicketScope::ReportedBy(identity.uid.clone())
                };
                ActiveView::Tickets(self.feed.watch_tickets(scope))
            }
            Screen::MyTickets => {
                ActiveView::Tickets(self.feed.watch_tickets(TicketScope::ReportedBy(identity.uid.clone())))
            }
            Screen::AllTickets => ActiveView::Tickets(self.feed.watch_tickets(TicketScope::All)),
            Screen::TicketDetail(id) => {
                ActiveView::Detail(LiveTicketDetail::open(self.feed.as_ref(), id, identity))
            }
            Screen::Users | Screen::Clients | Screen::Profile => ActiveView::Idle,
        };
        debug!("navigated to {screen}");
        self.screen = Some(screen);
        Ok(())
    }

    /// Re-subscribes the current list with a narrower scope, e.g. when a
    /// display-id search is entered.
    pub fn rescope(&mut self, scope: TicketScope) -> Result<()> {
        if !matches!(self.active, ActiveView::Tickets(_)) {
            return Err(DeskError::Forbidden("No ticket list is open.".to_string()));
        }
        self.release_active();
        self.active = ActiveView::Tickets(self.feed.watch_tickets(scope));
        Ok(())
    }

    pub fn tickets_mut(&mut self) -> Option<&mut Subscription<Vec<Ticket>>> {
        match &mut self.active {
            ActiveView::Tickets(subscription) => Some(subscription),
            _ => None,
        }
    }

    pub fn detail_mut(&mut self) -> Option<&mut LiveTicketDetail> {
        match &mut self.active {
            ActiveView::Detail(live) => Some(live),
            _ => None,
        }
    }

    /// Drops the session when an error means the token is no longer valid.
    pub fn handle_error(&mut self, error: &DeskError) {
        if error.ends_session() {
            warn!("session ended: {error}");
            self.sign_out();
        }
    }
}

impl Drop for Shell {
    fn drop(&mut self) {
        self.sign_out();
    }
}
