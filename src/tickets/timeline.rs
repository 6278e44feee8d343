use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Priority, Ticket, TicketStatus};
use crate::shared::utils::email_handle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    Created,
    PriorityInit,
    StatusInit,
    StatusChange,
    AssignedInit,
    AssignedChange,
    Comment,
    AttachmentAdded,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEvent {
    pub kind: TimelineKind,
    pub timestamp: DateTime<Utc>,
    pub label: String,
    pub detail: String,
}

fn handle_or(email: Option<&str>, fallback: &str) -> String {
    email
        .filter(|e| !e.trim().is_empty())
        .map_or_else(|| fallback.to_string(), |e| email_handle(e).to_string())
}

/// History of a ticket in chronological order. Entries without a
/// timestamp are skipped.
pub fn timeline(ticket: &Ticket) -> Vec<TimelineEvent> {
    let mut events = Vec::new();
    let mut push = |kind, timestamp: Option<DateTime<Utc>>, label: String, detail: String| {
        if let Some(timestamp) = timestamp {
            events.push(TimelineEvent {
                kind,
                timestamp,
                label,
                detail,
            });
        }
    };

    push(
        TimelineKind::Created,
        ticket.created_at,
        "Created".to_string(),
        ticket.reporter_email.clone(),
    );
    if ticket.priority != Priority::Low {
        push(
            TimelineKind::PriorityInit,
            ticket.created_at,
            format!("Priority: {}", ticket.priority),
            String::new(),
        );
    }

    if ticket.status_history.is_empty() {
        if ticket.status != TicketStatus::Open {
            push(
                TimelineKind::StatusInit,
                ticket.created_at,
                format!("Status: {}", ticket.status),
                String::new(),
            );
        }
    } else {
        for change in &ticket.status_history {
            push(
                TimelineKind::StatusChange,
                change.timestamp,
                format!("Status: {}", change.new_status),
                handle_or(change.changed_by.as_deref(), "System"),
            );
        }
    }

    if ticket.assigned_to_history.is_empty() {
        if let Some(assignee) = ticket.assigned_to_email.as_deref().filter(|e| !e.is_empty()) {
            push(
                TimelineKind::AssignedInit,
                ticket.created_at,
                "Assigned".to_string(),
                email_handle(assignee).to_string(),
            );
        }
    } else {
        for change in &ticket.assigned_to_history {
            if let Some(assignee) = change.new_assigned_to.as_deref() {
                push(
                    TimelineKind::AssignedChange,
                    change.timestamp,
                    "Assigned".to_string(),
                    email_handle(assignee).to_string(),
                );
            }
        }
    }

    for comment in &ticket.comments {
        push(
            TimelineKind::Comment,
            comment.timestamp,
            "Comment".to_string(),
            handle_or(Some(&comment.commenter), "Anonymous"),
        );
    }

    if !ticket.attachments.is_empty() {
        push(
            TimelineKind::AttachmentAdded,
            ticket.updated_at.or(ticket.created_at),
            "Attachment".to_string(),
            String::new(),
        );
    }

    if ticket.is_terminal() {
        push(
            TimelineKind::Resolved,
            ticket.resolved_at,
            ticket.status.to_string(),
            handle_or(ticket.closed_by_email.as_deref(), "System"),
        );
    }

    // stable: same-instant events keep insertion order
    events.sort_by_key(|e| e.timestamp);
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_util;
    use crate::tickets::{AssignmentChange, Comment, StatusChange};
    use chrono::Duration;

    #[test]
    fn test_timeline_orders_history() {
        let mut ticket = test_util::ticket("t1", TicketStatus::Resolved);
        let created = ticket.created_at.unwrap_or_else(Utc::now);
        ticket.status_history = vec![
            StatusChange {
                old_status: Some(TicketStatus::Open),
                new_status: TicketStatus::InProgress,
                timestamp: Some(created + Duration::hours(2)),
                changed_by: Some("agent@corp.example".into()),
            },
            StatusChange {
                old_status: Some(TicketStatus::InProgress),
                new_status: TicketStatus::Resolved,
                timestamp: Some(created + Duration::hours(5)),
                changed_by: None,
            },
        ];
        ticket.assigned_to_history = vec![AssignmentChange {
            old_assigned_to: None,
            new_assigned_to: Some("agent@corp.example".into()),
            timestamp: Some(created + Duration::hours(1)),
            changed_by: None,
        }];
        ticket.comments = vec![
            Comment {
                text: "Looking".into(),
                commenter: "agent@corp.example".into(),
                timestamp: Some(created + Duration::hours(3)),
            },
            Comment {
                text: "undated".into(),
                commenter: "agent@corp.example".into(),
                timestamp: None,
            },
        ];
        ticket.resolved_at = Some(created + Duration::hours(5));
        ticket.closed_by_email = Some("agent@corp.example".into());

        let kinds: Vec<TimelineKind> = timeline(&ticket).iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TimelineKind::Created,
                TimelineKind::PriorityInit,
                TimelineKind::AssignedChange,
                TimelineKind::StatusChange,
                TimelineKind::Comment,
                TimelineKind::StatusChange,
                TimelineKind::Resolved,
            ]
        );
        let events = timeline(&ticket);
        assert_eq!(events[3].detail, "agent");
        assert_eq!(events[5].detail, "System");
    }

    #[test]
    fn test_timeline_without_history_uses_current_state() {
        let mut ticket = test_util::ticket("t1", TicketStatus::Hold);
        ticket.priority = Priority::Low;
        ticket.assigned_to_email = Some("ops@corp.example".into());
        let events = timeline(&ticket);
        let labels: Vec<&str> = events.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Created", "Status: Hold", "Assigned"]);
        assert_eq!(events[2].detail, "ops");
    }
}
