use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use log::info;

use super::Ticket;
use crate::shared::{DeskError, Result};

pub const EXPORT_HEADERS: [&str; 16] = [
    "Ticket ID",
    "Short description",
    "Category",
    "Priority",
    "Status",
    "Requested by",
    "Requested for",
    "Contact",
    "Asset ID",
    "Assigned to",
    "Created",
    "Updated",
    "Resolved Date",
    "Time Spent",
    "Closure Notes",
    "Closed by",
];

pub const EXPORT_FILE_NAME: &str = "tickets_export.csv";

/// Inclusive range of creation dates. `end` covers the whole day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl ExportRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(DeskError::validation(
                    crate::shared::Field::Target,
                    "Start date must not be after end date.",
                ));
            }
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, created_at: Option<DateTime<Utc>>) -> bool {
        let Some(created_at) = created_at else {
            return self.start.is_none() && self.end.is_none();
        };
        let after_start = self
            .start
            .map_or(true, |d| created_at >= d.and_time(NaiveTime::MIN).and_utc());
        let before_end = self.end.map_or(true, |d| {
            let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
            created_at <= d.and_time(end_of_day).and_utc()
        });
        after_start && before_end
    }
}

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value.map(|t| t.to_rfc3339()).unwrap_or_default()
}

/// Renders the tickets created within `range` as CSV, oldest first.
pub fn export_csv(tickets: &[Ticket], range: ExportRange) -> Result<Vec<u8>> {
    let mut selected: Vec<&Ticket> = tickets.iter().filter(|t| range.contains(t.created_at)).collect();
    if selected.is_empty() {
        return Err(DeskError::NotFound(
            "No tickets found for the specified criteria.".to_string(),
        ));
    }
    selected.sort_by_key(|t| t.created_at);

    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(EXPORT_HEADERS)?;
    for ticket in &selected {
        writer.write_record([
            ticket.display_id.clone(),
            ticket.short_description.clone(),
            ticket.category.map(|c| c.to_string()).unwrap_or_default(),
            ticket.priority.to_string(),
            ticket.status.to_string(),
            ticket.reporter_email.clone(),
            ticket.request_for_email.clone().unwrap_or_default(),
            ticket.contact_number.clone().unwrap_or_default(),
            ticket.hostname_asset_id.clone().unwrap_or_default(),
            ticket.assigned_to_email.clone().unwrap_or_default(),
            timestamp(ticket.created_at),
            timestamp(ticket.updated_at),
            timestamp(ticket.resolved_at),
            ticket.time_spent.clone().unwrap_or_default(),
            ticket.closure_notes.clone().unwrap_or_default(),
            ticket.closed_by_email.clone().unwrap_or_default(),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| DeskError::Export(e.to_string()))?;
    info!("exported {} tickets", selected.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_util;
    use crate::tickets::TicketStatus;
    use chrono::{Duration, TimeZone};

    fn on(day: u32) -> Option<DateTime<Utc>> {
        Utc.with_ymd_and_hms(2024, 3, day, 22, 30, 0).single()
    }

    #[test]
    fn test_export_filters_and_orders() {
        let mut late = test_util::ticket("t2", TicketStatus::Resolved);
        late.created_at = on(5);
        late.short_description = "Monitor \"flickers\", badly".into();
        late.closure_notes = Some("Cable swapped".into());
        let mut early = test_util::ticket("t1", TicketStatus::Open);
        early.created_at = on(3);
        let mut outside = test_util::ticket("t3", TicketStatus::Open);
        outside.created_at = on(9);

        let range = crate::assert_ok!(ExportRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 1),
            NaiveDate::from_ymd_opt(2024, 3, 5),
        ));
        let bytes = crate::assert_ok!(export_csv(&[late, early, outside], range));

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let headers = crate::assert_ok!(reader.headers()).clone();
        assert_eq!(headers.len(), EXPORT_HEADERS.len());
        assert_eq!(&headers[0], "Ticket ID");
        let rows: Vec<csv::StringRecord> = reader.records().filter_map(|r| r.ok()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "TT0001");
        assert_eq!(&rows[1][1], "Monitor \"flickers\", badly");
        assert_eq!(&rows[1][14], "Cable swapped");
    }

    #[test]
    fn test_empty_export_is_not_found() {
        let mut ticket = test_util::ticket("t1", TicketStatus::Open);
        ticket.created_at = on(3).map(|t| t - Duration::days(30));
        let range = ExportRange {
            start: NaiveDate::from_ymd_opt(2024, 3, 1),
            end: None,
        };
        assert!(matches!(export_csv(&[ticket], range), Err(DeskError::NotFound(_))));
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert!(ExportRange::new(NaiveDate::from_ymd_opt(2024, 3, 5), NaiveDate::from_ymd_opt(2024, 3, 1)).is_err());
    }
}
