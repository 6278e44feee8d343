use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use log::{error, info, warn};
use std::sync::Arc;

use ticketdesk::api::ApiClient;
use ticketdesk::config::AppConfig;
use ticketdesk::feed::{FeedEvent, PollingFeed};
use ticketdesk::init_logging;
use ticketdesk::notifications::NotificationWatcher;
use ticketdesk::session::Session;
use ticketdesk::shell::Shell;
use ticketdesk::tickets::stats::DashboardSummary;
use ticketdesk::DeskError;

const TOKEN_VAR: &str = "DESK_ID_TOKEN";

fn parse_date(value: Option<&String>) -> anyhow::Result<Option<NaiveDate>> {
    value
        .map(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").with_context(|| format!("bad date {v}")))
        .transpose()
}

async fn export(api: &ApiClient, args: &[String]) -> anyhow::Result<()> {
    let Some(out) = args.first() else {
        bail!("usage: ticketdesk export <out.csv> [start YYYY-MM-DD] [end YYYY-MM-DD]");
    };
    let start = parse_date(args.get(1))?;
    let end = parse_date(args.get(2))?;
    let bytes = api.export_tickets(start, end).await?;
    tokio::fs::write(out, &bytes)
        .await
        .with_context(|| format!("writing {out}"))?;
    info!("wrote {} bytes to {out}", bytes.len());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let config = AppConfig::load(None).context("loading configuration")?;
    let api = Arc::new(ApiClient::new(&config.api)?);

    let token = std::env::var(TOKEN_VAR).with_context(|| format!("{TOKEN_VAR} is not set"))?;
    let session = Session::login(&api, &token).await?;
    let identity = session.identity.clone();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("export") {
        return export(&api, &args[1..]).await;
    }

    let (counts, by_status) = futures::join!(api.summary_counts(), api.status_summary());
    match (counts, by_status) {
        (Ok(counts), Ok(by_status)) => info!(
            "{} active, {} assigned to me, {} total; by status {:?}",
            counts.active_tickets, counts.assigned_to_me, counts.total_tickets, by_status.0
        ),
        (Err(e), _) | (_, Err(e)) => warn!("dashboard counts unavailable: {e}"),
    }

    let feed = PollingFeed::new(api.clone(), config.feed_interval())?;
    let mut shell = Shell::new(Arc::new(feed)).with_client(api.clone());
    shell.sign_in(session)?;
    shell.attach_notifications(NotificationWatcher::spawn(
        api.clone(),
        config.notification_interval(),
    ));

    let mut session_error = None;
    loop {
        let (Some(tickets), Some(notifications)) = shell.streams_mut() else {
            break;
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            event = tickets.next() => match event {
                Some(FeedEvent::Snapshot(list)) => {
                    let summary = DashboardSummary::from_tickets(&list, &identity, Utc::now());
                    info!(
                        "{} active tickets, {} overdue",
                        summary.counts.active_tickets, summary.overdue
                    );
                }
                Some(FeedEvent::Error(message)) => {
                    error!("ticket feed failed: {message}");
                    break;
                }
                Some(FeedEvent::Removed) => {}
                None => break,
            },
            event = notifications.next() => match event {
                Some(FeedEvent::Snapshot(snapshot)) if snapshot.has_unread() => {
                    info!("{} unread notifications", snapshot.unread);
                }
                Some(FeedEvent::Error(message)) => {
                    session_error = Some(DeskError::Unauthorized(message));
                    break;
                }
                Some(_) => {}
                None => break,
            },
        }
    }

    match session_error {
        Some(e) => shell.handle_error(&e),
        None => shell.sign_out(),
    }
    Ok(())
}
