use serde::{Deserialize, Serialize};

use crate::api::auth::check_password;
use crate::session::{Identity, Role};
use crate::shared::utils::{contains_lower, is_valid_email};
use crate::shared::{DeskError, Field, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    #[serde(alias = "id")]
    pub uid: String,
    pub email: String,
    pub role: Role,
    pub name: Option<String>,
    pub asset_id: Option<String>,
    pub client_name: Option<String>,
    pub domain: Option<String>,
    pub joined_date: Option<String>,
    pub employeeid: Option<String>,
    pub designation: Option<String>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }

    /// Domain from the record, falling back to the email address.
    pub fn effective_domain(&self) -> Option<&str> {
        self.domain
            .as_deref()
            .filter(|d| !d.is_empty())
            .or_else(|| self.email.split_once('@').map(|(_, d)| d))
    }
}

/// Body of `POST /api/users`. Support engineers and client end users
/// carry different required fields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewUser {
    pub role: Role,
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip)]
    pub confirm_password: String,
    pub asset_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employeeid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

fn required(value: Option<&str>, field: Field, label: &str) -> Result<()> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(DeskError::validation(field, format!("{label} is required."))),
    }
}

impl NewUser {
    pub fn validate(&self) -> Result<()> {
        required(Some(&self.name), Field::Name, "Name")?;
        if !is_valid_email(&self.email) {
            return Err(DeskError::validation(Field::Email, "Enter a valid email address."));
        }
        check_password(&self.password, &self.confirm_password)?;
        required(Some(&self.asset_id), Field::AssetId, "Asset ID")?;
        match self.role {
            Role::Support => {
                required(self.joined_date.as_deref(), Field::JoinedDate, "Joined date")?;
                required(self.employeeid.as_deref(), Field::EmployeeId, "Employee ID")?;
                required(self.designation.as_deref(), Field::Designation, "Designation")
            }
            Role::User => {
                required(self.client_name.as_deref(), Field::ClientName, "Client name")?;
                required(self.domain.as_deref(), Field::Domain, "Domain")?;
                let domain = self.domain.as_deref().unwrap_or_default().trim();
                if !self.email.trim().ends_with(&format!("@{domain}")) {
                    return Err(DeskError::validation(
                        Field::Email,
                        format!("User email must belong to the {domain} domain."),
                    ));
                }
                Ok(())
            }
            other => Err(DeskError::validation(
                Field::Role,
                format!("Invalid role {other}. Only support and user accounts can be created here."),
            )),
        }
    }
}

/// Body of `PUT /api/users/{uid}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(DeskError::validation(Field::Target, "No fields to update."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PasswordChange {
    pub new_password: String,
    pub confirm_password: String,
}

impl PasswordChange {
    pub fn validate(&self) -> Result<()> {
        check_password(&self.new_password, &self.confirm_password)
    }
}

/// Admins may not remove their own account.
pub fn guard_delete_user(actor: &Identity, target: &User) -> Result<()> {
    if !actor.is_admin() {
        return Err(DeskError::Forbidden(
            "Only administrators can delete users.".to_string(),
        ));
    }
    if actor.uid == target.uid || actor.email.eq_ignore_ascii_case(&target.email) {
        return Err(DeskError::validation(
            Field::Target,
            "You cannot delete your own account.",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct UserListView {
    superset: Vec<User>,
    pub role: Option<Role>,
    pub keyword: String,
}

impl UserListView {
    pub fn replace(&mut self, users: Vec<User>) {
        self.superset = users;
    }

    fn matches(&self, user: &User) -> bool {
        if self.role.is_some_and(|r| r != user.role) {
            return false;
        }
        let needle = self.keyword.trim().to_lowercase();
        needle.is_empty()
            || contains_lower(Some(user.email.as_str()), &needle)
            || contains_lower(user.name.as_deref(), &needle)
            || contains_lower(user.client_name.as_deref(), &needle)
            || contains_lower(user.asset_id.as_deref(), &needle)
    }

    pub fn displayed(&self) -> Vec<&User> {
        self.superset.iter().filter(|u| self.matches(u)).collect()
    }

    pub fn total(&self) -> usize {
        self.displayed().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_util;

    fn engineer() -> NewUser {
        NewUser {
            role: Role::Support,
            name: "Priya".into(),
            email: "priya@corp.example".into(),
            password: "secret1".into(),
            confirm_password: "secret1".into(),
            asset_id: "LT-7".into(),
            joined_date: Some("2024-01-15".into()),
            employeeid: Some("E-204".into()),
            designation: Some("L2 engineer".into()),
            ..NewUser::default()
        }
    }

    #[test]
    fn test_new_engineer_requirements() {
        assert!(engineer().validate().is_ok());

        let mut draft = engineer();
        draft.designation = None;
        assert_eq!(crate::assert_err!(draft.validate()).field(), Some(Field::Designation));

        let mut draft = engineer();
        draft.confirm_password = "secret2".into();
        assert_eq!(crate::assert_err!(draft.validate()).field(), Some(Field::ConfirmPassword));

        let mut draft = engineer();
        draft.role = Role::Admin;
        assert_eq!(crate::assert_err!(draft.validate()).field(), Some(Field::Role));
    }

    #[test]
    fn test_end_user_domain_must_match() {
        let mut draft = NewUser {
            role: Role::User,
            name: "Sam".into(),
            email: "sam@acme.example".into(),
            password: "hunter22".into(),
            confirm_password: "hunter22".into(),
            asset_id: "PC-1".into(),
            client_name: Some("Acme".into()),
            domain: Some("acme.example".into()),
            ..NewUser::default()
        };
        assert!(draft.validate().is_ok());
        draft.email = "sam@other.example".into();
        assert_eq!(crate::assert_err!(draft.validate()).field(), Some(Field::Email));
    }

    #[test]
    fn test_cannot_delete_self() {
        let admin = test_util::identity("root", Role::Admin);
        let me = User {
            uid: "root".into(),
            email: "root@corp.example".into(),
            ..User::default()
        };
        assert!(guard_delete_user(&admin, &me).is_err());
        let other = User {
            uid: "u2".into(),
            email: "u2@corp.example".into(),
            ..User::default()
        };
        assert!(guard_delete_user(&admin, &other).is_ok());
        let support = test_util::identity("agent", Role::Support);
        assert!(matches!(guard_delete_user(&support, &other), Err(DeskError::Forbidden(_))));
    }

    #[test]
    fn test_user_list_filters() {
        let mut view = UserListView::default();
        view.replace(vec![
            User {
                uid: "1".into(),
                email: "a@acme.example".into(),
                role: Role::User,
                client_name: Some("Acme".into()),
                ..User::default()
            },
            User {
                uid: "2".into(),
                email: "b@corp.example".into(),
                role: Role::Support,
                ..User::default()
            },
        ]);
        assert_eq!(view.total(), 2);
        view.role = Some(Role::Support);
        assert_eq!(view.total(), 1);
        view.role = None;
        view.keyword = "ACME".into();
        assert_eq!(view.displayed()[0].uid, "1");
    }

    #[test]
    fn test_empty_update_rejected() {
        assert!(UserUpdate::default().validate().is_err());
        let update = UserUpdate {
            role: Some(Role::Support),
            ..UserUpdate::default()
        };
        assert!(update.validate().is_ok());
        assert!(PasswordChange {
            new_password: "abc".into(),
            confirm_password: "abc".into()
        }
        .validate()
        .is_err());
    }
}
