//! Live ticket detail.
//!
//! Keeps one ticket's detail view consistent between the pushed server
//! record and the viewer's in-progress edit buffer. While editing, pushes
//! only move the fields the server changed among status, priority and
//! assignment; free text typed by the viewer is never overwritten.

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use super::timeline::{timeline, TimelineEvent};
use super::{Priority, Ticket, TicketPatch, TicketStatus, LONG_DESCRIPTION_MAX, SHORT_DESCRIPTION_MAX};
use crate::api::TicketApi;
use crate::feed::{FeedEvent, RecordFeed, Subscription};
use crate::session::Identity;
use crate::shared::utils::non_blank;
use crate::shared::{DeskError, Field, Result};

static TIME_SPENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{1,3}$").unwrap_or_else(|e| panic!("invalid time spent pattern: {e}"))
});

const FORBIDDEN_VIEW: &str = "You do not have permission to view this ticket.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditBuffer {
    pub request_for_email: String,
    pub short_description: String,
    pub long_description: String,
    pub contact_number: String,
    pub priority: Priority,
    pub status: TicketStatus,
    pub assigned_to_email: String,
    pub closed_by_email: String,
    pub closure_notes: String,
    pub time_spent: String,
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

impl EditBuffer {
    pub fn from_ticket(ticket: &Ticket) -> Self {
        Self {
            request_for_email: text(&ticket.request_for_email),
            short_description: ticket.short_description.clone(),
            long_description: ticket.long_description.clone(),
            contact_number: text(&ticket.contact_number),
            priority: ticket.priority,
            status: ticket.status,
            assigned_to_email: text(&ticket.assigned_to_email),
            closed_by_email: text(&ticket.closed_by_email),
            closure_notes: text(&ticket.closure_notes),
            time_spent: text(&ticket.time_spent),
        }
    }

    /// Takes over the server-controlled fields that changed between
    /// `previous` and `current`.
    fn adopt_remote_changes(&mut self, previous: &Ticket, current: &Ticket) {
        if previous.status != current.status {
            self.status = current.status;
        }
        if previous.priority != current.priority {
            self.priority = current.priority;
        }
        if previous.assigned_to_email != current.assigned_to_email {
            self.assigned_to_email = text(&current.assigned_to_email);
        }
        if previous.closed_by_email != current.closed_by_email {
            self.closed_by_email = text(&current.closed_by_email);
        }
        if current.is_terminal() {
            self.closure_notes = text(&current.closure_notes);
            self.time_spent = text(&current.time_spent);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailState {
    Loading,
    Ready,
    AccessDenied(String),
    Missing,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveAction {
    Save,
    /// Resolve in one step, regardless of the status in the buffer.
    Close,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Unchanged,
    Saved(TicketPatch),
}

#[derive(Debug, Clone)]
pub struct TicketDetail {
    ticket_id: String,
    viewer: Identity,
    server: Option<Ticket>,
    buffer: EditBuffer,
    editing: bool,
    state: DetailState,
}

impl TicketDetail {
    pub fn new(ticket_id: impl Into<String>, viewer: Identity) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            viewer,
            server: None,
            buffer: EditBuffer::default(),
            editing: false,
            state: DetailState::Loading,
        }
    }

    pub fn ticket_id(&self) -> &str {
        &self.ticket_id
    }

    pub fn viewer(&self) -> &Identity {
        &self.viewer
    }

    pub fn state(&self) -> &DetailState {
        &self.state
    }

    pub fn ticket(&self) -> Option<&Ticket> {
        self.server.as_ref()
    }

    pub fn buffer(&self) -> &EditBuffer {
        &self.buffer
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    /// Access denial ends the subscription for good.
    pub fn is_closed(&self) -> bool {
        matches!(self.state, DetailState::AccessDenied(_))
    }

    fn may_view(&self, ticket: &Ticket) -> bool {
        self.viewer.is_elevated() || ticket.reporter_id == self.viewer.uid
    }

    pub fn apply_push(&mut self, event: FeedEvent<Ticket>) {
        if self.is_closed() {
            debug!("ignoring push for {} after access denial", self.ticket_id);
            return;
        }
        match event {
            FeedEvent::Snapshot(ticket) => {
                if ticket.id != self.ticket_id {
                    warn!("push for {} delivered to detail {}", ticket.id, self.ticket_id);
                    return;
                }
                if !self.may_view(&ticket) {
                    warn!("{} denied access to ticket {}", self.viewer.email, ticket.display_id);
                    self.server = None;
                    self.buffer = EditBuffer::default();
                    self.editing = false;
                    self.state = DetailState::AccessDenied(FORBIDDEN_VIEW.to_string());
                    return;
                }
                match (&self.server, self.editing) {
                    (Some(previous), true) => {
                        let previous = previous.clone();
                        self.buffer.adopt_remote_changes(&previous, &ticket);
                    }
                    _ => self.buffer = EditBuffer::from_ticket(&ticket),
                }
                if ticket.is_terminal() && self.editing {
                    info!("ticket {} became {} during edit", ticket.display_id, ticket.status);
                    self.editing = false;
                }
                self.server = Some(ticket);
                self.state = DetailState::Ready;
            }
            FeedEvent::Removed => {
                self.server = None;
                self.editing = false;
                self.state = DetailState::Missing;
            }
            FeedEvent::Error(message) => {
                error!("ticket {} listener failed: {message}", self.ticket_id);
                self.state = DetailState::Failed(message);
            }
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.server.as_ref().is_some_and(Ticket::is_terminal)
    }

    pub fn can_edit(&self) -> bool {
        match (&self.state, &self.server) {
            (DetailState::Ready, Some(ticket)) => {
                !ticket.is_terminal() && self.may_view(ticket)
            }
            _ => false,
        }
    }

    pub fn can_comment(&self) -> bool {
        self.state == DetailState::Ready && !self.is_terminal()
    }

    pub fn can_attach(&self) -> bool {
        self.can_comment()
    }

    pub fn begin_edit(&mut self) -> Result<()> {
        if !self.can_edit() {
            return Err(DeskError::Forbidden(
                "This ticket can no longer be edited.".to_string(),
            ));
        }
        if let Some(ticket) = &self.server {
            self.buffer = EditBuffer::from_ticket(ticket);
        }
        self.editing = true;
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        if let Some(ticket) = &self.server {
            self.buffer = EditBuffer::from_ticket(ticket);
        }
        self.editing = false;
    }

    pub fn buffer_mut(&mut self) -> Result<&mut EditBuffer> {
        if !self.editing {
            return Err(DeskError::Forbidden("Not in edit mode.".to_string()));
        }
        Ok(&mut self.buffer)
    }

    pub fn select_status(&mut self, status: TicketStatus) -> Result<()> {
        let email = self.viewer.email.clone();
        let buffer = self.buffer_mut()?;
        buffer.status = status;
        if status == TicketStatus::Resolved {
            buffer.closed_by_email = email;
        }
        Ok(())
    }

    /// Changed fields of the buffer against the last pushed record.
    pub fn diff(&self) -> TicketPatch {
        match &self.server {
            Some(server) => diff_against(server, &self.buffer),
            None => TicketPatch::default(),
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.diff().is_empty()
    }

    /// Applies the business rules and builds the PATCH body.
    /// `Ok(None)` means there is nothing to submit.
    pub fn prepare_save(&self, action: SaveAction, now: DateTime<Utc>) -> Result<Option<TicketPatch>> {
        let server = self
            .server
            .as_ref()
            .ok_or_else(|| DeskError::NotFound(format!("Ticket {} is not loaded.", self.ticket_id)))?;
        if server.is_terminal() {
            return Err(DeskError::Forbidden(
                "Cannot update a resolved or cancelled ticket.".to_string(),
            ));
        }
        match action {
            SaveAction::Save if !self.editing => {
                return Err(DeskError::Forbidden("Not in edit mode.".to_string()));
            }
            SaveAction::Close if !self.viewer.is_elevated() => {
                return Err(DeskError::Forbidden(
                    "Only support associates or admins can close tickets.".to_string(),
                ));
            }
            _ => {}
        }

        let mut target = self.buffer.clone();
        if action == SaveAction::Close {
            target.status = TicketStatus::Resolved;
            target.closed_by_email = self.viewer.email.clone();
        }

        check_lengths(&target)?;
        if target.status == TicketStatus::Resolved {
            self.check_resolution(&target)?;
        }
        if !self.viewer.is_elevated() {
            if target.status != server.status {
                return Err(DeskError::validation(
                    Field::Status,
                    "Only support associates or admins can change the status.",
                ));
            }
            if non_blank(Some(target.assigned_to_email.as_str())) != non_blank(server.assigned_to_email.as_deref()) {
                return Err(DeskError::validation(
                    Field::AssignedTo,
                    "Only support associates or admins can assign tickets.",
                ));
            }
        }

        let mut patch = diff_against(server, &target);
        if target.status.is_terminal() {
            patch.closed_by_email = Some(Some(self.viewer.email.clone()));
            patch.resolved_at = Some(Some(now));
        }
        Ok((!patch.is_empty()).then_some(patch))
    }

    fn check_resolution(&self, target: &EditBuffer) -> Result<()> {
        if target.closure_notes.trim().is_empty() {
            return Err(DeskError::validation(
                Field::ClosureNotes,
                "Closure notes are required to resolve this ticket.",
            ));
        }
        if self.viewer.is_elevated() {
            if target.assigned_to_email.trim().is_empty() {
                return Err(DeskError::validation(
                    Field::AssignedTo,
                    "Assigned to field cannot be empty when resolving.",
                ));
            }
            if !TIME_SPENT_RE.is_match(target.time_spent.trim()) {
                return Err(DeskError::validation(
                    Field::TimeSpent,
                    "Please enter time spent (in hours, max 3 digits).",
                ));
            }
        }
        Ok(())
    }

    /// Validates, then PATCHes the changed fields. On success edit mode
    /// ends and the next push carries the stored record; on failure the
    /// buffer is kept as it was.
    pub async fn save(&mut self, api: &dyn TicketApi, action: SaveAction) -> Result<SaveOutcome> {
        let patch = match self.prepare_save(action, Utc::now()) {
            Ok(Some(patch)) => patch,
            Ok(None) => return Ok(SaveOutcome::Unchanged),
            Err(e) => {
                warn!("save of ticket {} rejected locally: {e}", self.ticket_id);
                return Err(e);
            }
        };
        match api.patch_ticket(&self.ticket_id, &patch).await {
            Ok(()) => {
                info!("ticket {} updated by {}", self.ticket_id, self.viewer.email);
                self.editing = false;
                Ok(SaveOutcome::Saved(patch))
            }
            Err(e) => {
                error!("ticket {} update failed: {e}", self.ticket_id);
                Err(e)
            }
        }
    }

    pub async fn add_comment(&self, api: &dyn TicketApi, text: &str) -> Result<()> {
        if !self.can_comment() {
            return Err(DeskError::Forbidden(
                "Cannot add comments to a resolved or cancelled ticket.".to_string(),
            ));
        }
        if text.trim().is_empty() {
            return Err(DeskError::validation(Field::Comment, "Comment text cannot be empty."));
        }
        api.post_comment(&self.ticket_id, text.trim(), &self.viewer.email).await
    }

    pub fn timeline(&self) -> Vec<TimelineEvent> {
        self.server.as_ref().map(timeline).unwrap_or_default()
    }
}

fn check_lengths(buffer: &EditBuffer) -> Result<()> {
    if buffer.short_description.trim().is_empty() {
        return Err(DeskError::validation(
            Field::ShortDescription,
            "Short description is required.",
        ));
    }
    if buffer.short_description.chars().count() > SHORT_DESCRIPTION_MAX {
        return Err(DeskError::validation(
            Field::ShortDescription,
            format!("Short description exceeds {SHORT_DESCRIPTION_MAX} character limit."),
        ));
    }
    if buffer.long_description.chars().count() > LONG_DESCRIPTION_MAX {
        return Err(DeskError::validation(
            Field::LongDescription,
            format!("Description exceeds {LONG_DESCRIPTION_MAX} character limit."),
        ));
    }
    Ok(())
}

fn changed_text(server: &str, local: &str) -> Option<String> {
    (server != local).then(|| local.to_string())
}

fn changed_optional(server: &Option<String>, local: &str) -> Option<Option<String>> {
    let local = non_blank(Some(local));
    (non_blank(server.as_deref()) != local).then(|| local.map(str::to_string))
}

fn diff_against(server: &Ticket, buffer: &EditBuffer) -> TicketPatch {
    TicketPatch {
        request_for_email: changed_text(&text(&server.request_for_email), &buffer.request_for_email),
        short_description: changed_text(&server.short_description, &buffer.short_description),
        long_description: changed_text(&server.long_description, &buffer.long_description),
        contact_number: changed_text(&text(&server.contact_number), &buffer.contact_number),
        priority: (server.priority != buffer.priority).then_some(buffer.priority),
        status: (server.status != buffer.status).then_some(buffer.status),
        assigned_to_email: changed_optional(&server.assigned_to_email, &buffer.assigned_to_email),
        closed_by_email: changed_optional(&server.closed_by_email, &buffer.closed_by_email),
        closure_notes: changed_optional(&server.closure_notes, &buffer.closure_notes),
        time_spent: changed_optional(&server.time_spent, &buffer.time_spent),
        resolved_at: None,
    }
}

/// A [`TicketDetail`] bound to its live subscription.
pub struct LiveTicketDetail {
    detail: TicketDetail,
    subscription: Option<Subscription<Ticket>>,
}

impl LiveTicketDetail {
    pub fn open(feed: &dyn RecordFeed, ticket_id: &str, viewer: Identity) -> Self {
        Self {
            detail: TicketDetail::new(ticket_id, viewer),
            subscription: Some(feed.watch_ticket(ticket_id)),
        }
    }

    pub fn detail(&self) -> &TicketDetail {
        &self.detail
    }

    pub fn detail_mut(&mut self) -> &mut TicketDetail {
        &mut self.detail
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Applies every push already delivered. Returns how many were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.subscription.as_mut().and_then(Subscription::try_next) {
            self.detail.apply_push(event);
            applied += 1;
            self.drop_if_denied();
        }
        applied
    }

    /// Waits for the next push and applies it. `false` once the
    /// subscription has ended.
    pub async fn next(&mut self) -> bool {
        let Some(subscription) = self.subscription.as_mut() else {
            return false;
        };
        match subscription.next().await {
            Some(event) => {
                self.detail.apply_push(event);
                self.drop_if_denied();
                true
            }
            None => {
                self.subscription = None;
                false
            }
        }
    }

    fn drop_if_denied(&mut self) {
        if self.detail.is_closed() {
            if let Some(subscription) = self.subscription.take() {
                subscription.release();
            }
        }
    }

    pub fn close(mut self) -> TicketDetail {
        if let Some(subscription) = self.subscription.take() {
            subscription.release();
        }
        self.detail
    }
}
