pub mod detail;
#[cfg(feature = "export")]
pub mod export;
pub mod list;
pub mod stats;
pub mod timeline;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::shared::utils::{is_valid_email, non_blank};
use crate::shared::{DeskError, Field, Result};

pub const SHORT_DESCRIPTION_MAX: usize = 250;
pub const LONG_DESCRIPTION_MAX: usize = 4000;
pub const DISPLAY_ID_PREFIX: &str = "TT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    #[default]
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    Hold,
    Resolved,
    #[serde(alias = "Closed")]
    Cancelled,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 5] = [
        Self::Open,
        Self::InProgress,
        Self::Hold,
        Self::Resolved,
        Self::Cancelled,
    ];

    /// Edits are frozen once a ticket reaches one of these.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Cancelled)
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "In Progress",
            Self::Hold => "Hold",
            Self::Resolved => "Resolved",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "Open" => Ok(Self::Open),
            "In Progress" => Ok(Self::InProgress),
            "Hold" => Ok(Self::Hold),
            "Resolved" => Ok(Self::Resolved),
            "Cancelled" | "Closed" => Ok(Self::Cancelled),
            other => Err(DeskError::validation(
                Field::Status,
                format!("Invalid ticket status: {other}"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Software,
    Hardware,
    Troubleshoot,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Software => "software",
            Self::Hardware => "hardware",
            Self::Troubleshoot => "troubleshoot",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
    pub commenter: String,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    #[serde(default)]
    pub old_status: Option<TicketStatus>,
    pub new_status: TicketStatus,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub changed_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentChange {
    #[serde(default)]
    pub old_assigned_to: Option<String>,
    pub new_assigned_to: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub changed_by: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ticket {
    pub id: String,
    pub display_id: String,
    pub category: Option<Category>,
    pub priority: Priority,
    pub status: TicketStatus,
    #[serde(deserialize_with = "null_as_default")]
    pub short_description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub long_description: String,
    pub request_for_email: Option<String>,
    pub contact_number: Option<String>,
    pub hostname_asset_id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub reporter_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub reporter_email: String,
    pub assigned_to_id: Option<String>,
    pub assigned_to_email: Option<String>,
    pub closed_by_email: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub comments: Vec<Comment>,
    #[serde(deserialize_with = "null_as_default")]
    pub attachments: Vec<Attachment>,
    pub closure_notes: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub time_spent: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub status_history: Vec<StatusChange>,
    #[serde(deserialize_with = "null_as_default")]
    pub assigned_to_history: Vec<AssignmentChange>,
}

impl Ticket {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_assigned(&self) -> bool {
        non_blank(self.assigned_to_email.as_deref()).is_some()
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status.is_active() && self.due_date.is_some_and(|due| due < now)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// time_spent arrives as a number from the store and as a string from older clients.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Body of `POST /tickets`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewTicket {
    pub request_for_email: String,
    pub category: Option<Category>,
    pub short_description: String,
    pub long_description: String,
    pub contact_number: String,
    pub priority: Option<Priority>,
    pub hostname_asset_id: String,
    pub attachments: Vec<Attachment>,
}

impl NewTicket {
    pub fn validate(&self) -> Result<()> {
        if self.request_for_email.trim().is_empty() {
            return Err(DeskError::validation(
                Field::RequestForEmail,
                "Request for is required.",
            ));
        }
        if !is_valid_email(&self.request_for_email) {
            return Err(DeskError::validation(
                Field::RequestForEmail,
                "Invalid email format for \"Request for\".",
            ));
        }
        if self.category.is_none() {
            return Err(DeskError::validation(Field::Category, "Category is required."));
        }
        if self.short_description.trim().is_empty() {
            return Err(DeskError::validation(
                Field::ShortDescription,
                "Short description is required.",
            ));
        }
        if self.short_description.chars().count() > SHORT_DESCRIPTION_MAX {
            return Err(DeskError::validation(
                Field::ShortDescription,
                format!("Short description exceeds {SHORT_DESCRIPTION_MAX} character limit."),
            ));
        }
        if self.long_description.chars().count() > LONG_DESCRIPTION_MAX {
            return Err(DeskError::validation(
                Field::LongDescription,
                format!("Description exceeds {LONG_DESCRIPTION_MAX} character limit."),
            ));
        }
        if self.contact_number.trim().is_empty() {
            return Err(DeskError::validation(
                Field::ContactNumber,
                "Contact number is required.",
            ));
        }
        if self.hostname_asset_id.trim().is_empty() {
            return Err(DeskError::validation(Field::AssetId, "Asset ID is required."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedTicket {
    pub id: String,
    pub display_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Field-level PATCH body. `Some(None)` clears a field server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TicketPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_for_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TicketStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to_email: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_by_email: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closure_notes: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_spent: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<Option<DateTime<Utc>>>,
}

impl TicketPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Successor of the most recent display id: `TT0041` -> `TT0042`.
/// `None` starts the sequence; a malformed or exhausted last id is an error.
pub fn next_display_id(last: Option<&str>) -> Result<String> {
    let Some(last) = last else {
        return Ok(format!("{DISPLAY_ID_PREFIX}0001"));
    };
    let n = last
        .strip_prefix(DISPLAY_ID_PREFIX)
        .filter(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
        .and_then(|digits| digits.parse::<u64>().ok())
        .ok_or_else(|| DeskError::validation(Field::DisplayId, format!("Malformed display id {last}.")))?;
    let next = n
        .checked_add(1)
        .ok_or_else(|| DeskError::validation(Field::DisplayId, "Display id sequence exhausted."))?;
    Ok(format!("{DISPLAY_ID_PREFIX}{next:04}"))
}

pub fn looks_like_display_id(keyword: &str) -> bool {
    let upper = keyword.trim().to_uppercase();
    upper
        .strip_prefix(DISPLAY_ID_PREFIX)
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}
