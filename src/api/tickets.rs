use chrono::NaiveDate;
use log::{info, warn};
use reqwest::multipart;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;

use super::ApiClient;
use crate::shared::{DeskError, Field, Result};
use crate::tickets::stats::{StatusSummary, SummaryCounts};
use crate::tickets::{Attachment, CreatedTicket, NewTicket, Ticket, TicketPatch};

pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;
const ALLOWED_EXTENSIONS: [&str; 6] = ["pdf", "jpg", "jpeg", "png", "doc", "docx"];

#[derive(Debug, Deserialize)]
struct UploadedFile {
    #[serde(rename = "originalFilename")]
    original_filename: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    files: Vec<UploadedFile>,
}

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// MIME type for an allowed attachment, or a validation error.
pub fn attachment_mime(file_name: &str) -> Result<&'static str> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(DeskError::validation(
            Field::Target,
            format!("File type for {file_name} not allowed. Allowed types: PDF, JPG, PNG, Word."),
        ));
    }
    Ok(match ext.as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "doc" => "application/msword",
        _ => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    })
}

impl ApiClient {
    pub async fn get_ticket(&self, id: &str) -> Result<Ticket> {
        let builder = self.request(Method::GET, &format!("/ticket/{}", encode(id))).await;
        self.send_json(builder).await
    }

    /// Tickets reported by `uid`. The server refuses any uid other than the
    /// token owner's, and leaves out closed tickets.
    pub async fn my_tickets(&self, uid: &str) -> Result<Vec<Ticket>> {
        let builder = self
            .request(Method::GET, "/tickets/my")
            .await
            .query(&[("userId", uid)]);
        self.send_json(builder).await
    }

    pub async fn all_tickets(&self) -> Result<Vec<Ticket>> {
        let builder = self.request(Method::GET, "/tickets/all").await;
        self.send_json(builder).await
    }

    pub async fn create_ticket(&self, ticket: &NewTicket) -> Result<CreatedTicket> {
        ticket.validate()?;
        let builder = self.request(Method::POST, "/tickets").await.json(ticket);
        let created: CreatedTicket = self.send_json(builder).await?;
        info!("ticket {} created", created.display_id);
        Ok(created)
    }

    pub async fn update_ticket(&self, id: &str, patch: &TicketPatch) -> Result<()> {
        let builder = self
            .request(Method::PATCH, &format!("/ticket/{}", encode(id)))
            .await
            .json(patch);
        self.send(builder).await?;
        Ok(())
    }

    pub async fn cancel_ticket(&self, id: &str) -> Result<()> {
        let builder = self
            .request(Method::PATCH, &format!("/ticket/{}/cancel", encode(id)))
            .await;
        self.send(builder).await?;
        Ok(())
    }

    pub async fn add_comment(&self, id: &str, text: &str, commenter: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(DeskError::validation(
                Field::Comment,
                "Comment text cannot be empty.",
            ));
        }
        let builder = self
            .request(Method::POST, &format!("/ticket/{}/add_comment", encode(id)))
            .await
            .json(&json!({ "comment_text": text, "commenter_name": commenter }));
        self.send(builder).await?;
        Ok(())
    }

    pub async fn summary_counts(&self) -> Result<SummaryCounts> {
        let builder = self.request(Method::GET, "/tickets/summary-counts").await;
        self.send_json(builder).await
    }

    pub async fn status_summary(&self) -> Result<StatusSummary> {
        let builder = self.request(Method::GET, "/tickets/status-summary").await;
        self.send_json(builder).await
    }

    /// Server-rendered CSV for tickets created within the inclusive date range.
    pub async fn export_tickets(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<u8>> {
        let mut query = Vec::new();
        if let Some(start) = start {
            query.push(("start_date", start.format("%Y-%m-%d").to_string()));
        }
        if let Some(end) = end {
            query.push(("end_date", end.format("%Y-%m-%d").to_string()));
        }
        let builder = self.request(Method::GET, "/tickets/export").await.query(&query);
        let response = self.send(builder).await?;
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn upload_attachment(&self, file_name: &str, bytes: Vec<u8>) -> Result<Attachment> {
        let mime = attachment_mime(file_name)?;
        if bytes.len() > MAX_ATTACHMENT_BYTES {
            return Err(DeskError::validation(
                Field::Target,
                format!("{file_name} exceeds the 10MB attachment limit."),
            ));
        }
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)?;
        let form = multipart::Form::new().part("attachment", part);
        let builder = self.request(Method::POST, "/upload-attachment").await.multipart(form);
        let uploaded: UploadResponse = self.send_json(builder).await?;
        let file = uploaded.files.into_iter().next().ok_or_else(|| {
            warn!("upload of {file_name} returned no files");
            DeskError::Decode("upload response contained no files".to_string())
        })?;
        Ok(Attachment {
            url: file.url,
            file_name: file.original_filename,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_types() {
        assert_eq!(crate::assert_ok!(attachment_mime("scan.PDF")), "application/pdf");
        assert_eq!(crate::assert_ok!(attachment_mime("photo.jpeg")), "image/jpeg");
        assert!(attachment_mime("payload.exe").is_err());
        assert!(attachment_mime("noext").is_err());
    }
}
