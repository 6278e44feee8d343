//! Ticket list view-models.
//!
//! A view holds the live superset delivered by its feed plus the filter
//! selections. Everything shown is derived from those two; changing a
//! filter never refetches.

use serde::Serialize;

use super::{looks_like_display_id, Ticket, TicketStatus};
use crate::feed::{FeedEvent, TicketScope};
use crate::session::Identity;
use crate::shared::utils::contains_lower;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssignmentFilter {
    #[default]
    Any,
    Unassigned,
    AssignedToMe,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub assignment: AssignmentFilter,
    pub keyword: String,
    pub include_closed: bool,
}

impl TicketFilter {
    pub fn status(status: TicketStatus) -> Self {
        Self {
            status: Some(status),
            include_closed: status.is_terminal(),
            ..Self::default()
        }
    }

    pub fn assignment(assignment: AssignmentFilter) -> Self {
        Self {
            assignment,
            ..Self::default()
        }
    }

    fn keyword(&self) -> Option<String> {
        let keyword = self.keyword.trim();
        (!keyword.is_empty()).then(|| keyword.to_lowercase())
    }

    /// An exact display id searches closed tickets too.
    fn is_id_search(&self) -> bool {
        looks_like_display_id(&self.keyword)
    }

    pub fn matches(&self, ticket: &Ticket, viewer: &Identity) -> bool {
        if ticket.is_terminal() && !(self.include_closed || self.is_id_search()) {
            return false;
        }
        if self.status.is_some_and(|s| s != ticket.status) {
            return false;
        }
        let assignment_ok = match self.assignment {
            AssignmentFilter::Any => true,
            AssignmentFilter::Unassigned => !ticket.is_assigned(),
            AssignmentFilter::AssignedToMe => {
                ticket.assigned_to_id.as_deref() == Some(viewer.uid.as_str())
            }
        };
        if !assignment_ok {
            return false;
        }
        match self.keyword() {
            None => true,
            Some(needle) => {
                let category = ticket.category.map(|c| c.as_str());
                contains_lower(Some(ticket.display_id.as_str()), &needle)
                    || contains_lower(Some(ticket.short_description.as_str()), &needle)
                    || contains_lower(Some(ticket.reporter_email.as_str()), &needle)
                    || contains_lower(category, &needle)
                    || contains_lower(ticket.assigned_to_email.as_deref(), &needle)
            }
        }
    }

    pub fn heading(&self) -> String {
        if self.keyword().is_some() {
            return format!("Search Results for \"{}\"", self.keyword.trim());
        }
        match (self.assignment, self.status) {
            (AssignmentFilter::AssignedToMe, _) => "Assigned to Me".to_string(),
            (AssignmentFilter::Unassigned, _) => "Unassigned Tickets".to_string(),
            (AssignmentFilter::Any, Some(status)) => format!("{status} Tickets"),
            (AssignmentFilter::Any, None) => "All Tickets".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total_active: usize,
    pub open: usize,
    pub in_progress: usize,
    pub hold: usize,
    pub resolved: usize,
    pub cancelled: usize,
    /// Active tickets with no assignee.
    pub unassigned: usize,
}

impl StatusCounts {
    pub fn of(tickets: &[Ticket]) -> Self {
        let mut counts = Self::default();
        for ticket in tickets {
            match ticket.status {
                TicketStatus::Open => counts.open += 1,
                TicketStatus::InProgress => counts.in_progress += 1,
                TicketStatus::Hold => counts.hold += 1,
                TicketStatus::Resolved => counts.resolved += 1,
                TicketStatus::Cancelled => counts.cancelled += 1,
            }
            if ticket.status.is_active() {
                counts.total_active += 1;
                if !ticket.is_assigned() {
                    counts.unassigned += 1;
                }
            }
        }
        counts
    }
}

/// Support-facing list over every ticket.
#[derive(Debug, Clone)]
pub struct TicketListView {
    viewer: Identity,
    superset: Vec<Ticket>,
    filter: TicketFilter,
}

impl TicketListView {
    pub fn new(viewer: Identity, filter: TicketFilter) -> Self {
        Self {
            viewer,
            superset: Vec::new(),
            filter,
        }
    }

    pub fn viewer(&self) -> &Identity {
        &self.viewer
    }

    pub fn filter(&self) -> &TicketFilter {
        &self.filter
    }

    /// Takes a fresh snapshot from the feed. Errors and removals leave the
    /// last superset in place.
    pub fn apply(&mut self, event: FeedEvent<Vec<Ticket>>) {
        if let FeedEvent::Snapshot(tickets) = event {
            self.replace(tickets);
        }
    }

    pub fn replace(&mut self, superset: Vec<Ticket>) {
        self.superset = superset;
    }

    pub fn set_filter(&mut self, filter: TicketFilter) {
        self.filter = filter;
    }

    pub fn superset(&self) -> &[Ticket] {
        &self.superset
    }

    pub fn displayed(&self) -> Vec<&Ticket> {
        self.superset
            .iter()
            .filter(|t| self.filter.matches(t, &self.viewer))
            .collect()
    }

    pub fn total(&self) -> usize {
        self.displayed().len()
    }

    pub fn counts(&self) -> StatusCounts {
        StatusCounts::of(&self.superset)
    }

    pub fn heading(&self) -> String {
        self.filter.heading()
    }

    /// The subscription this view needs. Only an exact display id narrows
    /// the remote query; other keywords filter locally.
    pub fn feed_scope(&self) -> TicketScope {
        if self.filter.is_id_search() {
            TicketScope::DisplayId(self.filter.keyword.trim().to_uppercase())
        } else {
            TicketScope::All
        }
    }
}

/// Reporter-facing list: the viewer's own tickets, closed ones included.
#[derive(Debug, Clone)]
pub struct MyTicketsView {
    inner: TicketListView,
}

impl MyTicketsView {
    pub fn new(viewer: Identity) -> Self {
        let filter = TicketFilter {
            include_closed: true,
            ..TicketFilter::default()
        };
        Self {
            inner: TicketListView::new(viewer, filter),
        }
    }

    pub fn apply(&mut self, event: FeedEvent<Vec<Ticket>>) {
        if let FeedEvent::Snapshot(tickets) = event {
            self.replace(tickets);
        }
    }

    pub fn replace(&mut self, superset: Vec<Ticket>) {
        let uid = self.inner.viewer.uid.clone();
        self.inner
            .replace(superset.into_iter().filter(|t| t.reporter_id == uid).collect());
    }

    pub fn set_keyword(&mut self, keyword: impl Into<String>) {
        self.inner.filter.keyword = keyword.into();
    }

    pub fn set_status(&mut self, status: Option<TicketStatus>) {
        self.inner.filter.status = status;
    }

    pub fn displayed(&self) -> Vec<&Ticket> {
        self.inner.displayed()
    }

    pub fn total(&self) -> usize {
        self.inner.total()
    }

    pub fn counts(&self) -> StatusCounts {
        self.inner.counts()
    }

    pub fn feed_scope(&self) -> TicketScope {
        TicketScope::ReportedBy(self.inner.viewer.uid.clone())
    }
}
