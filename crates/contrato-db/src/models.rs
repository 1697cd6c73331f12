//! Database row types. These map directly to SQLite rows and are converted
//! into the `contrato-types` domain models at the crate boundary.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use contrato_types::models::{
    Contract, ContractStatus, NotificationKind, NotificationRecord, NotificationStatus, User,
};
use rusqlite::Row;
use tracing::warn;
use uuid::Uuid;

pub struct UserRow {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

impl UserRow {
    pub(crate) const COLUMNS: &'static str = "id, full_name, email, password, created_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            full_name: row.get(1)?,
            email: row.get(2)?,
            password: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    pub fn to_user(&self) -> Result<User> {
        Ok(User {
            id: parse_id(&self.id)?,
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            created_at: parse_stored_timestamp(&self.created_at, "users.created_at"),
        })
    }
}

pub struct ContractRow {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub starts_at: String,
    pub ends_at: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ContractRow {
    pub(crate) const COLUMNS: &'static str =
        "id, owner_id, name, description, starts_at, ends_at, status, created_at, updated_at";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            starts_at: row.get(4)?,
            ends_at: row.get(5)?,
            status: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    pub fn into_contract(self) -> Result<Contract> {
        Ok(Contract {
            id: parse_id(&self.id)?,
            owner_id: parse_id(&self.owner_id)?,
            status: ContractStatus::from_stored(&self.status),
            created_at: parse_stored_timestamp(&self.created_at, "contracts.created_at"),
            updated_at: parse_stored_timestamp(&self.updated_at, "contracts.updated_at"),
            name: self.name,
            description: self.description,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
        })
    }
}

/// A ledger row joined with the name of its contract.
pub struct NotificationRow {
    pub id: String,
    pub contract_id: String,
    pub contract_name: String,
    pub kind: String,
    pub subject: String,
    pub message: Option<String>,
    pub recipients: String,
    pub status: String,
    pub sent_at: Option<String>,
    pub created_at: String,
}

impl NotificationRow {
    pub(crate) const SELECT: &'static str = "SELECT n.id, n.contract_id, c.name, n.kind, n.subject, n.message, \
         n.recipients, n.status, n.sent_at, n.created_at \
         FROM notifications n JOIN contracts c ON c.id = n.contract_id";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            contract_id: row.get(1)?,
            contract_name: row.get(2)?,
            kind: row.get(3)?,
            subject: row.get(4)?,
            message: row.get(5)?,
            recipients: row.get(6)?,
            status: row.get(7)?,
            sent_at: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    pub fn into_record(self) -> Result<NotificationRecord> {
        let status = NotificationStatus::from_stored(&self.status)
            .ok_or_else(|| anyhow!("Unknown notification status in ledger: {}", self.status))?;

        Ok(NotificationRecord {
            id: parse_id(&self.id)?,
            contract_id: parse_id(&self.contract_id)?,
            contract_name: self.contract_name,
            kind: NotificationKind::from_stored(&self.kind),
            subject: self.subject,
            message: self.message.unwrap_or_default(),
            recipients: self.recipients,
            status,
            sent_at: self
                .sent_at
                .as_deref()
                .map(|raw| parse_stored_timestamp(raw, "notifications.sent_at")),
            created_at: parse_stored_timestamp(&self.created_at, "notifications.created_at"),
        })
    }
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("Malformed id in database: {raw}"))
}

/// Formats a timestamp the way every column in this database stores it.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Bookkeeping timestamps are written by this crate, so a value that fails to
/// parse means a hand-edited row. Log it and fall back to the epoch rather
/// than failing the whole listing.
fn parse_stored_timestamp(raw: &str, column: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return naive.and_utc();
    }
    warn!("Unparseable timestamp in {}: {:?}", column, raw);
    DateTime::<Utc>::default()
}
