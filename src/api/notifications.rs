use reqwest::Method;

use super::ApiClient;
use crate::notifications::Notification;
use crate::shared::Result;

impl ApiClient {
    /// The 20 most recent notifications of the signed-in user.
    pub async fn my_notifications(&self) -> Result<Vec<Notification>> {
        let builder = self.request(Method::GET, "/notifications/my").await;
        self.send_json(builder).await
    }

    pub async fn mark_notification_read(&self, id: &str) -> Result<()> {
        let path = format!("/notifications/{}/read", urlencoding::encode(id));
        let builder = self.request(Method::PATCH, &path).await;
        self.send(builder).await?;
        Ok(())
    }

    pub async fn delete_notification(&self, id: &str) -> Result<()> {
        let path = format!("/notifications/{}", urlencoding::encode(id));
        let builder = self.request(Method::DELETE, &path).await;
        self.send(builder).await?;
        Ok(())
    }

    pub async fn clear_notifications(&self) -> Result<()> {
        let builder = self.request(Method::DELETE, "/notifications/clear-all").await;
        self.send(builder).await?;
        Ok(())
    }
}
