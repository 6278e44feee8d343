use log::info;
use reqwest::Method;
use serde::Deserialize;

use super::ApiClient;
use crate::directory::{Client, NewUser, User, UserUpdate};
use crate::shared::Result;

#[derive(Debug, Clone, Deserialize)]
pub struct AdminMessage {
    #[serde(default)]
    pub message: Option<String>,
}

fn user_path(uid: &str) -> String {
    format!("/api/users/{}", urlencoding::encode(uid))
}

fn client_path(id: &str) -> String {
    format!("/api/clients/{}", urlencoding::encode(id))
}

impl ApiClient {
    /// Support engineers known to the directory.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let builder = self.request(Method::GET, "/api/users").await;
        self.send_json(builder).await
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<AdminMessage> {
        user.validate()?;
        let builder = self.request(Method::POST, "/api/users").await.json(user);
        let created: AdminMessage = self.send_json(builder).await?;
        info!("created {} account {}", user.role, user.email);
        Ok(created)
    }

    pub async fn update_user(&self, uid: &str, update: &UserUpdate) -> Result<AdminMessage> {
        update.validate()?;
        let builder = self.request(Method::PUT, &user_path(uid)).await.json(update);
        self.send_json(builder).await
    }

    /// Callers run [`crate::directory::guard_delete_user`] first.
    pub async fn delete_user(&self, uid: &str) -> Result<()> {
        let builder = self.request(Method::DELETE, &user_path(uid)).await;
        self.send(builder).await?;
        info!("deleted user {uid}");
        Ok(())
    }

    /// Clients with `no_of_users` computed server-side from user domains.
    pub async fn list_clients(&self) -> Result<Vec<Client>> {
        let builder = self.request(Method::GET, "/api/clients").await;
        self.send_json(builder).await
    }

    pub async fn create_client(&self, client: &Client) -> Result<Client> {
        client.validate()?;
        let builder = self.request(Method::POST, "/api/clients").await.json(client);
        self.send_json(builder).await
    }

    pub async fn update_client(&self, id: &str, client: &Client) -> Result<Client> {
        client.validate()?;
        let builder = self.request(Method::PUT, &client_path(id)).await.json(client);
        self.send_json(builder).await
    }

    pub async fn delete_client(&self, id: &str) -> Result<()> {
        let builder = self.request(Method::DELETE, &client_path(id)).await;
        self.send(builder).await?;
        Ok(())
    }
}
