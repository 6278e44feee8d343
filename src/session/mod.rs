use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::api::ApiClient;
use crate::shared::{DeskError, Field, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Support,
    Admin,
    SuperAdmin,
    SiteAdmin,
}

impl Role {
    /// Support staff and administrators see every ticket.
    pub fn is_elevated(self) -> bool {
        matches!(self, Self::Support | Self::Admin | Self::SuperAdmin)
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Support => "support",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
            Self::SiteAdmin => "site_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "user" => Ok(Self::User),
            "support" => Ok(Self::Support),
            "admin" => Ok(Self::Admin),
            "super_admin" => Ok(Self::SuperAdmin),
            "site_admin" => Ok(Self::SiteAdmin),
            other => Err(DeskError::validation(Field::Role, format!("Invalid role: {other}"))),
        }
    }
}

/// Who is looking at the data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(alias = "id")]
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

impl Identity {
    pub fn is_elevated(&self) -> bool {
        self.role.is_elevated()
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub user: Identity,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Identity,
    token: String,
}

impl Session {
    pub fn new(identity: Identity, token: impl Into<String>) -> Self {
        Self {
            identity,
            token: token.into(),
        }
    }

    /// Exchanges an identity-provider token for the desk profile and
    /// leaves `api` authenticated with it.
    pub async fn login(api: &ApiClient, id_token: &str) -> Result<Self> {
        if id_token.trim().is_empty() {
            return Err(DeskError::Unauthorized(
                "Authorization token is required.".to_string(),
            ));
        }
        api.set_token(Some(id_token.to_string())).await;
        match api.login().await {
            Ok(identity) => {
                info!("signed in as {} ({})", identity.email, identity.role);
                Ok(Self::new(identity, id_token))
            }
            Err(e) => {
                api.set_token(None).await;
                Err(e)
            }
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_elevated(&self) -> bool {
        self.identity.is_elevated()
    }
}
