use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::users::User;
use crate::shared::utils::contains_lower;
use crate::shared::{DeskError, Field, Result};

/// A customer organisation. `GET /api/clients` answers with display
/// headings as keys, writes use the snake_case names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Client {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(alias = "Client name")]
    pub client_name: String,
    #[serde(alias = "Client type")]
    pub client_type: Option<String>,
    #[serde(alias = "Location")]
    pub location: Option<String>,
    #[serde(alias = "Domain")]
    pub domain: String,
    #[serde(alias = "Joined date")]
    pub joined_date: Option<String>,
    #[serde(alias = "Contract end")]
    pub contract_end: Option<String>,
    #[serde(alias = "Site admin")]
    pub site_admin: Option<String>,
    #[serde(alias = "No of users")]
    pub no_of_users: u64,
}

impl Client {
    pub fn validate(&self) -> Result<()> {
        if self.client_name.trim().is_empty() {
            return Err(DeskError::validation(Field::ClientName, "Client name is required."));
        }
        let domain = self.domain.trim();
        if domain.is_empty() || !domain.contains('.') || domain.contains('@') {
            return Err(DeskError::validation(
                Field::Domain,
                "Enter a domain such as example.com.",
            ));
        }
        Ok(())
    }

    /// A user can only be moved to a client owning their email domain.
    pub fn accepts(&self, email: &str) -> Result<()> {
        let user_domain = email.rsplit_once('@').map(|(_, d)| d).unwrap_or_default();
        if !user_domain.eq_ignore_ascii_case(&self.domain) {
            return Err(DeskError::validation(
                Field::ClientName,
                format!(
                    "User email domain ({user_domain}) does not match client domain ({}).",
                    self.domain
                ),
            ));
        }
        Ok(())
    }
}

/// Fills `no_of_users` from the users sharing each client's domain.
pub fn attach_user_counts(clients: &mut [Client], users: &[User]) {
    let mut per_domain: HashMap<String, u64> = HashMap::new();
    for user in users {
        if let Some(domain) = user.domain.as_deref().filter(|d| !d.is_empty()) {
            *per_domain.entry(domain.to_lowercase()).or_insert(0) += 1;
        }
    }
    for client in clients {
        client.no_of_users = per_domain
            .get(&client.domain.to_lowercase())
            .copied()
            .unwrap_or(0);
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientListView {
    superset: Vec<Client>,
    pub client_type: Option<String>,
    pub keyword: String,
}

impl ClientListView {
    pub fn replace(&mut self, clients: Vec<Client>) {
        self.superset = clients;
    }

    fn matches(&self, client: &Client) -> bool {
        if let Some(kind) = &self.client_type {
            if !client
                .client_type
                .as_deref()
                .is_some_and(|t| t.eq_ignore_ascii_case(kind))
            {
                return false;
            }
        }
        let needle = self.keyword.trim().to_lowercase();
        needle.is_empty()
            || contains_lower(Some(client.client_name.as_str()), &needle)
            || contains_lower(Some(client.domain.as_str()), &needle)
            || contains_lower(client.location.as_deref(), &needle)
            || contains_lower(client.site_admin.as_deref(), &needle)
    }

    pub fn displayed(&self) -> Vec<&Client> {
        self.superset.iter().filter(|c| self.matches(c)).collect()
    }

    pub fn total(&self) -> usize {
        self.displayed().len()
    }

    pub fn total_users(&self) -> u64 {
        self.displayed().iter().map(|c| c.no_of_users).sum()
    }
}
