use std::fmt;

/// Form fields a local validation failure can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    ShortDescription,
    LongDescription,
    RequestForEmail,
    ContactNumber,
    Category,
    AssetId,
    Status,
    Priority,
    AssignedTo,
    ClosureNotes,
    TimeSpent,
    Comment,
    Email,
    Password,
    ConfirmPassword,
    Role,
    ClientName,
    Domain,
    Name,
    JoinedDate,
    EmployeeId,
    Designation,
    DisplayId,
    Target,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ShortDescription => "short_description",
            Self::LongDescription => "long_description",
            Self::RequestForEmail => "request_for_email",
            Self::ContactNumber => "contact_number",
            Self::Category => "category",
            Self::AssetId => "hostname_asset_id",
            Self::Status => "status",
            Self::Priority => "priority",
            Self::AssignedTo => "assigned_to_email",
            Self::ClosureNotes => "closure_notes",
            Self::TimeSpent => "time_spent",
            Self::Comment => "comment_text",
            Self::Email => "email",
            Self::Password => "password",
            Self::ConfirmPassword => "confirm_password",
            Self::Role => "role",
            Self::ClientName => "client_name",
            Self::Domain => "domain",
            Self::Name => "name",
            Self::JoinedDate => "joined_date",
            Self::EmployeeId => "employeeid",
            Self::Designation => "designation",
            Self::DisplayId => "display_id",
            Self::Target => "target",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Network error: {0}")]
    Transport(String),
    #[error("{field}: {message}")]
    Validation { field: Field, message: String },
    #[error("{message}")]
    Remote { status: u16, message: String },
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Export failed: {0}")]
    Export(String),
}

pub type Result<T> = std::result::Result<T, DeskError>;

impl DeskError {
    pub fn validation(field: Field, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Transport failures are the only errors worth showing as "try again".
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn field(&self) -> Option<Field> {
        match self {
            Self::Validation { field, .. } => Some(*field),
            _ => None,
        }
    }

    /// Errors after which the shell must drop the session.
    pub fn ends_session(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

impl From<reqwest::Error> for DeskError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for DeskError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

#[cfg(feature = "export")]
impl From<csv::Error> for DeskError {
    fn from(e: csv::Error) -> Self {
        Self::Export(e.to_string())
    }
}

impl From<figment::Error> for DeskError {
    fn from(e: figment::Error) -> Self {
        Self::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_carries_field() {
        let err = DeskError::validation(Field::ClosureNotes, "required");
        assert_eq!(err.field(), Some(Field::ClosureNotes));
        assert_eq!(err.to_string(), "closure_notes: required");
        assert!(!err.is_transient());
    }

    #[test]
    fn test_remote_message_is_verbatim() {
        let err = DeskError::Remote {
            status: 400,
            message: "Email already in use.".to_string(),
        };
        assert_eq!(err.to_string(), "Email already in use.");
    }

    #[test]
    fn test_only_unauthorized_ends_session() {
        assert!(DeskError::Unauthorized("expired".into()).ends_session());
        assert!(!DeskError::Forbidden("nope".into()).ends_session());
        assert!(DeskError::Transport("reset".into()).is_transient());
    }
}
