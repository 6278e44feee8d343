#[cfg(test)]
mod api_client_integration_tests {
    use mockito::Matcher;
    use serde_json::json;
    use ticketdesk::api::auth::Registration;
    use ticketdesk::api::{ApiClient, TicketApi};
    use ticketdesk::config::ApiConfig;
    use std::sync::Arc;
    use std::time::Duration;
    use ticketdesk::feed::{FeedEvent, PollingFeed, RecordFeed, TicketScope};
    use ticketdesk::session::{Role, Session};
    use ticketdesk::shared::Field;
    use ticketdesk::tests::test_util;
    use ticketdesk::tickets::detail::{SaveAction, SaveOutcome, TicketDetail};
    use ticketdesk::tickets::{NewTicket, TicketStatus};
    use ticketdesk::{assert_err, assert_ok, DeskError};

    fn client(url: &str) -> ApiClient {
        let config = ApiConfig {
            base_url: url.to_string(),
            timeout_secs: 5,
        };
        assert_ok!(ApiClient::new(&config))
    }

    #[tokio::test]
    async fn test_login_resolves_identity_with_bearer() {
        test_util::setup();
        let mut server = mockito::Server::new_async().await;
        let login = server
            .mock("POST", "/login")
            .match_header("authorization", "Bearer id-token-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":"Login successful","user":{"id":"u7","email":"agent@corp.example","role":"support"}}"#)
            .create_async()
            .await;

        let api = client(&server.url());
        let session = assert_ok!(Session::login(&api, "id-token-1").await);
        assert_eq!(session.identity.uid, "u7");
        assert_eq!(session.identity.role, Role::Support);
        assert!(api.has_token().await);
        login.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_login_clears_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/login")
            .with_status(401)
            .with_body(r#"{"error":"Unauthorized: Invalid token."}"#)
            .create_async()
            .await;

        let api = client(&server.url());
        let err = assert_err!(Session::login(&api, "stale").await);
        assert!(matches!(err, DeskError::Unauthorized(ref m) if m == "Unauthorized: Invalid token."));
        assert!(!api.has_token().await);
    }

    #[tokio::test]
    async fn test_business_error_is_verbatim() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/register")
            .with_status(400)
            .with_body(r#"{"error":"Email already registered."}"#)
            .create_async()
            .await;

        let api = client(&server.url());
        let registration = Registration {
            email: "dup@corp.example".into(),
            password: "hunter22".into(),
            role: Role::User,
            confirm_password: "hunter22".into(),
        };
        let err = assert_err!(api.register(&registration).await);
        assert_eq!(err.to_string(), "Email already registered.");
        assert!(matches!(err, DeskError::Remote { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_invalid_ticket_never_reaches_server() {
        let mut server = mockito::Server::new_async().await;
        let create = server.mock("POST", "/tickets").expect(0).create_async().await;

        let api = client(&server.url());
        let err = assert_err!(api.create_ticket(&NewTicket::default()).await);
        assert_eq!(err.field(), Some(Field::RequestForEmail));
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_detail_save_patches_changed_fields() {
        let mut server = mockito::Server::new_async().await;
        let patch = server
            .mock("PATCH", "/ticket/t1")
            .match_body(Matcher::Json(json!({"long_description": "Happens on battery only"})))
            .with_status(200)
            .with_body(r#"{"message":"Ticket updated successfully"}"#)
            .create_async()
            .await;

        let api = client(&server.url());
        let mut detail = TicketDetail::new("t1", test_util::identity("reporter", Role::User));
        detail.apply_push(FeedEvent::Snapshot(test_util::ticket("t1", TicketStatus::Open)));
        assert_ok!(detail.begin_edit());
        assert_ok!(detail.buffer_mut()).long_description = "Happens on battery only".into();

        let outcome = assert_ok!(detail.save(&api as &dyn TicketApi, SaveAction::Save).await);
        assert!(matches!(outcome, SaveOutcome::Saved(_)));
        patch.assert_async().await;
    }

    #[tokio::test]
    async fn test_resolve_without_notes_issues_no_request() {
        let mut server = mockito::Server::new_async().await;
        let patch = server.mock("PATCH", "/ticket/t1").expect(0).create_async().await;

        let api = client(&server.url());
        let mut detail = TicketDetail::new("t1", test_util::identity("agent", Role::Support));
        detail.apply_push(FeedEvent::Snapshot(test_util::ticket("t1", TicketStatus::InProgress)));
        assert_ok!(detail.begin_edit());
        assert_ok!(detail.select_status(TicketStatus::Resolved));

        let err = assert_err!(detail.save(&api, SaveAction::Save).await);
        assert_eq!(err.field(), Some(Field::ClosureNotes));
        patch.assert_async().await;
    }

    #[tokio::test]
    async fn test_export_not_found_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tickets/export")
            .match_query(Matcher::UrlEncoded("start_date".into(), "2024-03-01".into()))
            .with_status(404)
            .with_body(r#"{"message":"No tickets found for the specified criteria."}"#)
            .create_async()
            .await;

        let api = client(&server.url());
        let start = chrono::NaiveDate::from_ymd_opt(2024, 3, 1);
        let err = assert_err!(api.export_tickets(start, None).await);
        assert!(matches!(err, DeskError::NotFound(ref m) if m == "No tickets found for the specified criteria."));
    }

    #[tokio::test]
    async fn test_upload_attachment_multipart() {
        let mut server = mockito::Server::new_async().await;
        let upload = server
            .mock("POST", "/upload-attachment")
            .match_body(Matcher::Regex(r#"name="attachment"; filename="scan.pdf""#.into()))
            .with_status(200)
            .with_body(r#"{"message":"Files uploaded","files":[{"originalFilename":"scan.pdf","url":"https://files.example/scan.pdf","mimetype":"application/pdf"}]}"#)
            .create_async()
            .await;

        let api = client(&server.url());
        let attachment = assert_ok!(api.upload_attachment("scan.pdf", b"%PDF-1.4".to_vec()).await);
        assert_eq!(attachment.file_name, "scan.pdf");
        assert_eq!(attachment.url, "https://files.example/scan.pdf");
        upload.assert_async().await;

        assert!(api.upload_attachment("run.exe", vec![0]).await.is_err());
    }

    #[tokio::test]
    async fn test_notifications_and_counts() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/notifications/my")
            .with_status(200)
            .with_body(r#"[{"id":"n1","userId":"u1","message":"Ticket TT0004 assigned to you","type":"assignment","read":false,"timestamp":"2024-06-01T08:00:00.000Z","createdAt":"2024-06-01T08:00:00.000Z","ticketId":"t4"}]"#)
            .create_async()
            .await;
        server
            .mock("GET", "/tickets/summary-counts")
            .with_status(200)
            .with_body(r#"{"active_tickets":5,"assigned_to_me":2,"total_tickets":9}"#)
            .create_async()
            .await;
        let read = server
            .mock("PATCH", "/notifications/n1/read")
            .with_status(200)
            .with_body(r#"{"message":"Notification marked as read"}"#)
            .create_async()
            .await;

        let api = client(&server.url());
        let notes = assert_ok!(api.my_notifications().await);
        assert_eq!(notes[0].kind, "assignment");
        assert!(!notes[0].read);
        assert!(notes[0].sent_at().is_some());
        assert_ok!(api.mark_notification_read("n1").await);
        read.assert_async().await;

        let counts = assert_ok!(api.summary_counts().await);
        assert_eq!(counts.assigned_to_me, 2);
    }

    const OWN_TICKETS: &str = r#"[{"id":"t1","display_id":"TT0001","status":"Open","reporter_id":"reporter","created_at":"2024-06-01T08:00:00.000Z"},{"id":"t2","display_id":"TT0002","status":"Hold","reporter_id":"reporter","created_at":"2024-06-02T08:00:00.000Z"}]"#;

    async fn own_tickets_server() -> mockito::ServerGuard {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/tickets/my")
            .match_query(Matcher::Missing)
            .with_status(403)
            .with_body(r#"{"error":"Unauthorized: You can only view your own tickets."}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/tickets/my")
            .match_query(Matcher::UrlEncoded("userId".into(), "reporter".into()))
            .with_status(200)
            .with_body(OWN_TICKETS)
            .create_async()
            .await;
        server
    }

    #[tokio::test]
    async fn test_reported_by_scope_sends_user_id() {
        let server = own_tickets_server().await;
        let api = client(&server.url());
        let tickets = assert_ok!(api.fetch_tickets(&TicketScope::ReportedBy("reporter".into())).await);
        assert_eq!(tickets.len(), 2);
        assert!(tickets.iter().all(|t| t.reporter_id == "reporter"));
    }

    #[tokio::test]
    async fn test_polling_feed_watches_own_tickets() {
        let server = own_tickets_server().await;
        let api = Arc::new(client(&server.url()));
        let feed = assert_ok!(PollingFeed::new(api, Duration::from_millis(50)));
        let mut mine = feed.watch_tickets(TicketScope::ReportedBy("reporter".into()));
        match mine.next().await {
            Some(FeedEvent::Snapshot(list)) => {
                assert_eq!(list.len(), 2);
                assert_eq!(list[0].id, "t2");
            }
            other => panic!("expected own tickets, got {other:?}"),
        }
        mine.release();
    }

    #[cfg(feature = "directory")]
    #[tokio::test]
    async fn test_clients_listing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/clients")
            .with_status(200)
            .with_body(r#"[{"id":"c1","Client name":"Acme","Domain":"acme.example","No of users":3}]"#)
            .create_async()
            .await;

        let api = client(&server.url());
        let clients = assert_ok!(api.list_clients().await);
        assert_eq!(clients[0].client_name, "Acme");
        assert_eq!(clients[0].no_of_users, 3);
    }
}
