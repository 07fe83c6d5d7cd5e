//! Ticket store
//!
//! CRUD and filter queries over `tickets`, joined with the submitting member
//! for list views. Status changes are unconstrained: any status may be set
//! from any status.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::events::{ChangeKind, EventBus};
use crate::schema::{tickets, users};

pub const TABLE: &str = "tickets";

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Solved,
    Closed,
    Ai,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 5] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::Solved,
        TicketStatus::Closed,
        TicketStatus::Ai,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Solved => "solved",
            TicketStatus::Closed => "closed",
            TicketStatus::Ai => "ai",
        }
    }

    /// Human-readable label used in emails and dashboards
    pub fn label(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in progress",
            TicketStatus::Solved => "solved",
            TicketStatus::Closed => "closed",
            TicketStatus::Ai => "ai",
        }
    }
}

impl FromStr for TicketStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(TicketStatus::Open),
            "in_progress" => Ok(TicketStatus::InProgress),
            "solved" => Ok(TicketStatus::Solved),
            "closed" => Ok(TicketStatus::Closed),
            "ai" => Ok(TicketStatus::Ai),
            _ => Err(anyhow::anyhow!(
                "Invalid ticket status: {}. Must be one of open, in_progress, solved, closed, ai",
                s
            )),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(anyhow::anyhow!("Invalid priority: {}", s)),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a ticket's conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Epoch milliseconds at creation
    pub id: i64,
    pub text: String,
    pub sender: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(text: impl Into<String>, sender: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: at.timestamp_millis(),
            text: text.into(),
            sender: sender.into(),
            timestamp: at,
        }
    }

    pub fn agent_reply(text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(text, "agent", at)
    }

    /// The member's original request, shown first in the thread
    pub fn customer_message(text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(text, "customer", at)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Ticket {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: TicketStatus,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The submitting member, as shown next to a ticket
#[derive(Queryable, Selectable, Debug, Clone, Serialize)]
#[diesel(table_name = users)]
pub struct TicketMember {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketWithMember {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub member: TicketMember,
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: TicketStatus,
    pub created_by: Uuid,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
}

impl TicketUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.priority.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TicketStats {
    pub open: i64,
    pub solved: i64,
}

#[derive(Insertable)]
#[diesel(table_name = tickets)]
struct NewTicketRow<'a> {
    id: Uuid,
    title: &'a str,
    description: &'a str,
    priority: &'a str,
    status: &'a str,
    created_by: Uuid,
    assigned_to: Option<Uuid>,
    history: serde_json::Value,
}

#[derive(AsChangeset)]
#[diesel(table_name = tickets)]
struct TicketChanges<'a> {
    title: Option<&'a str>,
    description: Option<&'a str>,
    priority: Option<&'a str>,
    updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = tickets)]
struct TicketRow {
    id: Uuid,
    title: String,
    description: String,
    priority: String,
    status: String,
    created_by: Uuid,
    assigned_to: Option<Uuid>,
    history: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = anyhow::Error;

    fn try_from(row: TicketRow) -> Result<Self> {
        let history: Vec<HistoryEntry> =
            serde_json::from_value(row.history).context("Failed to parse ticket history")?;

        Ok(Ticket {
            id: row.id,
            title: row.title,
            description: row.description,
            priority: Priority::from_str(&row.priority)?,
            status: TicketStatus::from_str(&row.status)?,
            created_by: row.created_by,
            assigned_to: row.assigned_to,
            history,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ============================================================================
// Database Operations
// ============================================================================

pub struct TicketDb {
    conn: Arc<Mutex<PgConnection>>,
    events: EventBus,
}

impl TicketDb {
    pub fn new(conn: Arc<Mutex<PgConnection>>, events: EventBus) -> Self {
        Self { conn, events }
    }

    pub fn create(&self, ticket: NewTicket) -> Result<Ticket> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let row = NewTicketRow {
            id: Uuid::new_v4(),
            title: &ticket.title,
            description: &ticket.description,
            priority: ticket.priority.as_str(),
            status: ticket.status.as_str(),
            created_by: ticket.created_by,
            assigned_to: ticket.assigned_to,
            history: serde_json::json!([]),
        };

        let inserted: TicketRow = diesel::insert_into(tickets::table)
            .values(&row)
            .returning(TicketRow::as_returning())
            .get_result(&mut *conn)
            .context("Failed to insert ticket")?;

        let ticket = Ticket::try_from(inserted)?;
        self.events.publish(TABLE, ChangeKind::Insert, ticket.id);
        Ok(ticket)
    }

    pub fn get(&self, id: Uuid) -> Result<Option<Ticket>> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let row = tickets::table
            .find(id)
            .select(TicketRow::as_select())
            .first(&mut *conn)
            .optional()?;

        row.map(Ticket::try_from).transpose()
    }

    pub fn get_with_member(&self, id: Uuid) -> Result<Option<TicketWithMember>> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let row = tickets::table
            .inner_join(users::table)
            .filter(tickets::id.eq(id))
            .select((TicketRow::as_select(), TicketMember::as_select()))
            .first::<(TicketRow, TicketMember)>(&mut *conn)
            .optional()?;

        row.map(|(ticket, member)| {
            Ok(TicketWithMember {
                ticket: Ticket::try_from(ticket)?,
                member,
            })
        })
        .transpose()
    }

    /// Newest first, joined with the submitting member
    pub fn list(&self, filter: &TicketFilter) -> Result<Vec<TicketWithMember>> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let mut query = tickets::table
            .inner_join(users::table)
            .select((TicketRow::as_select(), TicketMember::as_select()))
            .into_boxed();

        if let Some(status) = filter.status {
            query = query.filter(tickets::status.eq(status.as_str()));
        }
        if let Some(agent) = filter.assigned_to {
            query = query.filter(tickets::assigned_to.eq(agent));
        }
        if let Some(member) = filter.created_by {
            query = query.filter(tickets::created_by.eq(member));
        }

        let rows = query
            .order(tickets::created_at.desc())
            .load::<(TicketRow, TicketMember)>(&mut *conn)
            .context("Failed to list tickets")?;

        rows.into_iter()
            .map(|(ticket, member)| {
                Ok(TicketWithMember {
                    ticket: Ticket::try_from(ticket)?,
                    member,
                })
            })
            .collect()
    }

    pub fn update_details(&self, id: Uuid, update: &TicketUpdate) -> Result<Option<Ticket>> {
        if update.is_empty() {
            return self.get(id);
        }

        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let changes = TicketChanges {
            title: update.title.as_deref(),
            description: update.description.as_deref(),
            priority: update.priority.map(|p| p.as_str()),
            updated_at: Utc::now(),
        };

        let row = diesel::update(tickets::table.find(id))
            .set(&changes)
            .returning(TicketRow::as_returning())
            .get_result(&mut *conn)
            .optional()
            .context("Failed to update ticket")?;

        drop(conn);
        self.finish_update(row)
    }

    /// Checks the ticket exists, then sets the status. No transition rules.
    pub fn set_status(&self, id: Uuid, status: TicketStatus) -> Result<Option<Ticket>> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let exists: bool =
            diesel::dsl::select(diesel::dsl::exists(tickets::table.filter(tickets::id.eq(id))))
                .get_result(&mut *conn)?;
        if !exists {
            tracing::warn!("Status change for missing ticket {}", id);
            return Ok(None);
        }

        let row = diesel::update(tickets::table.find(id))
            .set((
                tickets::status.eq(status.as_str()),
                tickets::updated_at.eq(Utc::now()),
            ))
            .returning(TicketRow::as_returning())
            .get_result(&mut *conn)
            .optional()
            .context("Failed to update ticket status")?;

        drop(conn);
        self.finish_update(row)
    }

    /// Assign to an agent, or unassign with `None`
    pub fn assign(&self, id: Uuid, agent_id: Option<Uuid>) -> Result<Option<Ticket>> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let row = diesel::update(tickets::table.find(id))
            .set((
                tickets::assigned_to.eq(agent_id),
                tickets::updated_at.eq(Utc::now()),
            ))
            .returning(TicketRow::as_returning())
            .get_result(&mut *conn)
            .optional()
            .context("Failed to assign ticket")?;

        drop(conn);
        self.finish_update(row)
    }

    /// Append to the history array and bump `updated_at`. The first entry
    /// on an empty thread is preceded by the ticket description.
    pub fn append_history(&self, id: Uuid, entry: HistoryEntry) -> Result<Option<Ticket>> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let row = conn.transaction::<_, anyhow::Error, _>(|conn| {
            let current: Option<(serde_json::Value, String, DateTime<Utc>)> = tickets::table
                .find(id)
                .select((tickets::history, tickets::description, tickets::created_at))
                .for_update()
                .first(conn)
                .optional()?;

            let Some((current, description, created_at)) = current else {
                return Ok(None);
            };

            let opening = HistoryEntry::customer_message(description, created_at);
            let history = append_entry(current, opening, &entry)?;

            let row = diesel::update(tickets::table.find(id))
                .set((
                    tickets::history.eq(history),
                    tickets::updated_at.eq(Utc::now()),
                ))
                .returning(TicketRow::as_returning())
                .get_result(conn)?;
            Ok(Some(row))
        })?;

        drop(conn);
        self.finish_update(row)
    }

    pub fn delete(&self, id: Uuid) -> Result<bool> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let deleted = diesel::delete(tickets::table.find(id))
            .execute(&mut *conn)
            .context("Failed to delete ticket")?;

        if deleted > 0 {
            self.events.publish(TABLE, ChangeKind::Delete, id);
        }
        Ok(deleted > 0)
    }

    pub fn stats(&self) -> Result<TicketStats> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Failed to acquire database lock"))?;

        let open: i64 = tickets::table
            .filter(tickets::status.eq(TicketStatus::Open.as_str()))
            .count()
            .get_result(&mut *conn)?;
        let solved: i64 = tickets::table
            .filter(tickets::status.eq(TicketStatus::Solved.as_str()))
            .count()
            .get_result(&mut *conn)?;

        Ok(TicketStats { open, solved })
    }

    fn finish_update(&self, row: Option<TicketRow>) -> Result<Option<Ticket>> {
        let ticket = row.map(Ticket::try_from).transpose()?;
        if let Some(t) = &ticket {
            self.events.publish(TABLE, ChangeKind::Update, t.id);
        }
        Ok(ticket)
    }
}

/// Append one entry to a stored history array. A null column counts as
/// empty, and an empty thread starts with `opening`.
fn append_entry(
    current: serde_json::Value,
    opening: HistoryEntry,
    entry: &HistoryEntry,
) -> Result<serde_json::Value> {
    let mut items = match current {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Null => Vec::new(),
        other => anyhow::bail!("Ticket history is not an array: {}", other),
    };
    if items.is_empty() {
        items.push(serde_json::to_value(opening)?);
    }
    items.push(serde_json::to_value(entry)?);
    Ok(serde_json::Value::Array(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_round_trips_labels() {
        for status in TicketStatus::ALL {
            assert_eq!(TicketStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(TicketStatus::from_str("pending").is_err());
    }

    #[test]
    fn test_in_progress_label() {
        assert_eq!(TicketStatus::InProgress.as_str(), "in_progress");
        assert_eq!(TicketStatus::InProgress.label(), "in progress");
        let json = serde_json::to_value(TicketStatus::InProgress).unwrap();
        assert_eq!(json, "in_progress");
    }

    #[test]
    fn test_priority_defaults_to_medium() {
        assert_eq!(Priority::default(), Priority::Medium);
        assert_eq!(Priority::from_str("urgent").unwrap(), Priority::Urgent);
        assert!(Priority::from_str("critical").is_err());
    }

    #[test]
    fn test_agent_reply_uses_epoch_millis() {
        let at = Utc.with_ymd_and_hms(2025, 1, 18, 12, 0, 0).unwrap();
        let entry = HistoryEntry::agent_reply("On it", at);
        assert_eq!(entry.id, at.timestamp_millis());
        assert_eq!(entry.sender, "agent");
    }

    fn opening() -> HistoryEntry {
        let created = Utc.with_ymd_and_hms(2025, 1, 18, 11, 30, 0).unwrap();
        HistoryEntry::customer_message("Locker is broken", created)
    }

    #[test]
    fn test_first_reply_seeds_customer_message() {
        let at = Utc.with_ymd_and_hms(2025, 1, 18, 12, 0, 0).unwrap();
        let reply = HistoryEntry::agent_reply("On it", at);

        let history = append_entry(serde_json::json!([]), opening(), &reply).unwrap();

        let parsed: Vec<HistoryEntry> = serde_json::from_value(history).unwrap();
        assert_eq!(parsed, vec![opening(), reply]);
        assert_eq!(parsed[0].sender, "customer");
        assert_eq!(parsed[0].text, "Locker is broken");
        assert_eq!(parsed[0].timestamp, opening().timestamp);
    }

    #[test]
    fn test_later_replies_do_not_reseed() {
        let at = Utc.with_ymd_and_hms(2025, 1, 18, 12, 0, 0).unwrap();
        let first = HistoryEntry::agent_reply("On it", at);
        let second = HistoryEntry::agent_reply("Fixed", at + chrono::Duration::minutes(5));

        let history = append_entry(serde_json::json!([]), opening(), &first).unwrap();
        let history = append_entry(history, opening(), &second).unwrap();

        let parsed: Vec<HistoryEntry> = serde_json::from_value(history).unwrap();
        assert_eq!(parsed, vec![opening(), first, second]);
    }

    #[test]
    fn test_append_entry_treats_null_as_empty() {
        let entry = HistoryEntry::agent_reply("hi", Utc::now());
        let history = append_entry(serde_json::Value::Null, opening(), &entry).unwrap();
        assert_eq!(history.as_array().map(Vec::len), Some(2));
        assert!(append_entry(serde_json::json!({}), opening(), &entry).is_err());
    }

    #[test]
    fn test_empty_update() {
        assert!(TicketUpdate::default().is_empty());
        let update = TicketUpdate {
            priority: Some(Priority::High),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
