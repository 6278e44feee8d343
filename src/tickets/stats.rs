use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Priority, Ticket, TicketStatus};
use crate::session::Identity;

/// Shape of `GET /tickets/summary-counts`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub active_tickets: u64,
    pub assigned_to_me: u64,
    pub total_tickets: u64,
}

/// Shape of `GET /tickets/status-summary`: every status, zero-filled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusSummary(pub BTreeMap<String, u64>);

impl StatusSummary {
    pub fn zeroed() -> Self {
        Self(
            TicketStatus::ALL
                .iter()
                .map(|s| (s.as_str().to_string(), 0))
                .collect(),
        )
    }

    pub fn get(&self, status: TicketStatus) -> u64 {
        self.0.get(status.as_str()).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub counts: SummaryCounts,
    pub by_status: StatusSummary,
    pub active_by_priority: BTreeMap<Priority, u64>,
    pub overdue: u64,
}

impl DashboardSummary {
    pub fn from_tickets(tickets: &[Ticket], viewer: &Identity, now: DateTime<Utc>) -> Self {
        let mut summary = Self {
            by_status: StatusSummary::zeroed(),
            active_by_priority: Priority::ALL.iter().map(|p| (*p, 0)).collect(),
            ..Self::default()
        };

        for ticket in tickets {
            summary.counts.total_tickets += 1;
            *summary
                .by_status
                .0
                .entry(ticket.status.as_str().to_string())
                .or_insert(0) += 1;

            if ticket.assigned_to_id.as_deref() == Some(viewer.uid.as_str()) {
                summary.counts.assigned_to_me += 1;
            }
            if ticket.status.is_active() {
                summary.counts.active_tickets += 1;
                *summary.active_by_priority.entry(ticket.priority).or_insert(0) += 1;
            }
            if ticket.is_overdue(now) {
                summary.overdue += 1;
            }
        }
        summary
    }
}
