use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::ApiClient;
use crate::session::{Identity, LoginResponse, Role};
use crate::shared::utils::is_valid_email;
use crate::shared::{DeskError, Field, Result};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(skip)]
    pub confirm_password: String,
}

impl Registration {
    pub fn validate(&self) -> Result<()> {
        if !is_valid_email(&self.email) {
            return Err(DeskError::validation(Field::Email, "Enter a valid email address."));
        }
        check_password(&self.password, &self.confirm_password)
    }
}

pub(crate) fn check_password(password: &str, confirm: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DeskError::validation(
            Field::Password,
            format!("Password must be at least {MIN_PASSWORD_LEN} characters."),
        ));
    }
    if password != confirm {
        return Err(DeskError::validation(
            Field::ConfirmPassword,
            "Passwords do not match.",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct Registered {
    pub user_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiClient {
    /// Resolves the current bearer token to a desk identity.
    pub async fn login(&self) -> Result<Identity> {
        let builder = self.request(Method::POST, "/login").await;
        let response: LoginResponse = self.send_json(builder).await?;
        Ok(response.user)
    }

    pub async fn register(&self, registration: &Registration) -> Result<Registered> {
        registration.validate()?;
        let builder = self.request(Method::POST, "/register").await.json(registration);
        self.send_json(builder).await
    }

    pub async fn profile(&self, uid: &str) -> Result<Identity> {
        let path = format!("/profile/{}", urlencoding::encode(uid));
        let builder = self.request(Method::GET, &path).await;
        self.send_json(builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_validation() {
        let mut reg = Registration {
            email: "new@corp.example".to_string(),
            password: "hunter22".to_string(),
            role: Role::User,
            confirm_password: "hunter22".to_string(),
        };
        assert!(reg.validate().is_ok());

        reg.confirm_password = "hunter23".to_string();
        assert_eq!(crate::assert_err!(reg.validate()).field(), Some(Field::ConfirmPassword));

        reg.password = "abc".to_string();
        assert_eq!(crate::assert_err!(reg.validate()).field(), Some(Field::Password));
    }

    #[test]
    fn test_registration_body_omits_confirmation() {
        let reg = Registration {
            email: "new@corp.example".to_string(),
            password: "hunter22".to_string(),
            role: Role::Support,
            confirm_password: "hunter22".to_string(),
        };
        let body = crate::assert_ok!(serde_json::to_value(&reg));
        assert_eq!(
            body,
            serde_json::json!({"email": "new@corp.example", "password": "hunter22", "role": "support"})
        );
    }
}
