//! The notification ledger: one append-only row per delivery attempt.

use crate::Database;
use crate::models::{NotificationRow, format_timestamp};
use crate::queries::OptionalExt;
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use contrato_types::models::{NotificationKind, NotificationRecord, NotificationStatus};
use rusqlite::{Connection, params};
use uuid::Uuid;

pub struct NewNotification {
    pub contract_id: Uuid,
    pub kind: NotificationKind,
    pub subject: String,
    pub message: String,
    /// Comma-joined recipient addresses.
    pub recipients: String,
    pub delivered: bool,
    /// When the attempt happened. Also the send time if it was delivered.
    pub attempted_at: DateTime<Utc>,
}

impl Database {
    /// Appends one ledger row for a delivery attempt, whatever its outcome.
    pub fn record_notification(&self, new: &NewNotification) -> Result<NotificationRecord> {
        let id = Uuid::new_v4().to_string();
        let status = NotificationStatus::from_delivered(new.delivered);
        let attempted_at = format_timestamp(new.attempted_at);
        let sent_at = new.delivered.then(|| attempted_at.clone());

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, contract_id, kind, subject, message, recipients, status, sent_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id,
                    new.contract_id.to_string(),
                    new.kind.as_str(),
                    new.subject,
                    new.message,
                    new.recipients,
                    status.as_str(),
                    sent_at,
                    attempted_at
                ],
            )?;
            query_notification(conn, &id)?
                .ok_or_else(|| anyhow!("Notification vanished after insert: {}", id))
        })
    }

    /// The owner's ledger, newest first.
    pub fn list_notifications(&self, owner: Uuid) -> Result<Vec<NotificationRecord>> {
        self.with_conn(|conn| query_owner_notifications(conn, &owner.to_string(), None))
    }

    pub fn recent_notifications(&self, owner: Uuid, limit: u32) -> Result<Vec<NotificationRecord>> {
        self.with_conn(|conn| query_owner_notifications(conn, &owner.to_string(), Some(limit)))
    }

    pub fn count_notifications(&self, owner: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM notifications n JOIN contracts c ON c.id = n.contract_id
                 WHERE c.owner_id = ?1",
                [owner.to_string()],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }

    /// Number of distinct recipient strings the owner has notified. A
    /// multi-address notification counts as one string.
    pub fn count_distinct_recipients(&self, owner: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(DISTINCT n.recipients) FROM notifications n
                 JOIN contracts c ON c.id = n.contract_id WHERE c.owner_id = ?1",
                [owner.to_string()],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }

    pub fn delete_notifications_for_owner(&self, owner: Uuid) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM notifications WHERE contract_id IN (SELECT id FROM contracts WHERE owner_id = ?1)",
                [owner.to_string()],
            )?;
            Ok(removed)
        })
    }
}

fn query_notification(conn: &Connection, id: &str) -> Result<Option<NotificationRecord>> {
    let row = conn
        .query_row(
            &format!("{} WHERE n.id = ?1", NotificationRow::SELECT),
            [id],
            NotificationRow::from_row,
        )
        .optional()?;
    row.map(NotificationRow::into_record).transpose()
}

fn query_owner_notifications(
    conn: &Connection,
    owner: &str,
    limit: Option<u32>,
) -> Result<Vec<NotificationRecord>> {
    // LIMIT -1 means no limit in SQLite.
    let limit = limit.map(i64::from).unwrap_or(-1);
    let mut stmt = conn.prepare(&format!(
        "{} WHERE c.owner_id = ?1 ORDER BY n.created_at DESC, n.rowid DESC LIMIT ?2",
        NotificationRow::SELECT
    ))?;
    let rows = stmt.query_map(params![owner, limit], NotificationRow::from_row)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?.into_record()?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewContract;
    use chrono::TimeZone;
    use contrato_types::models::{Contract, ContractStatus};

    fn setup() -> (Database, Uuid, Contract) {
        let db = Database::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        db.create_user(owner, "Ana Souza", "ana@example.com", "hash").unwrap();
        let contract = db
            .insert_contract(
                owner,
                &NewContract {
                    name: "Lease A".into(),
                    description: None,
                    starts_at: "2024-01-10T00:00:00.000Z".into(),
                    ends_at: "2025-01-10T00:00:00.000Z".into(),
                    status: ContractStatus::Active,
                },
            )
            .unwrap();
        (db, owner, contract)
    }

    fn attempt(contract: &Contract, recipients: &str, delivered: bool, minute: u32) -> NewNotification {
        NewNotification {
            contract_id: contract.id,
            kind: NotificationKind::WeeklyReminder,
            subject: "Aviso".into(),
            message: "texto".into(),
            recipients: recipients.into(),
            delivered,
            attempted_at: Utc.with_ymd_and_hms(2025, 1, 5, 9, minute, 0).unwrap(),
        }
    }

    #[test]
    fn outcome_decides_status_and_send_time() {
        let (db, _, contract) = setup();

        let sent = db.record_notification(&attempt(&contract, "a@b.com", true, 0)).unwrap();
        assert_eq!(sent.status, NotificationStatus::Sent);
        assert_eq!(sent.sent_at, Some(Utc.with_ymd_and_hms(2025, 1, 5, 9, 0, 0).unwrap()));
        assert_eq!(sent.contract_name, "Lease A");

        let failed = db.record_notification(&attempt(&contract, "a@b.com", false, 1)).unwrap();
        assert_eq!(failed.status, NotificationStatus::Error);
        assert_eq!(failed.sent_at, None);
    }

    #[test]
    fn every_attempt_appends_exactly_one_row() {
        let (db, owner, contract) = setup();
        for i in 0..5 {
            db.record_notification(&attempt(&contract, "a@b.com", i % 2 == 0, i)).unwrap();
        }
        assert_eq!(db.count_notifications(owner).unwrap(), 5);

        let listed = db.list_notifications(owner).unwrap();
        assert_eq!(listed.len(), 5);
        // Newest first.
        assert!(listed.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        assert_eq!(db.recent_notifications(owner, 3).unwrap().len(), 3);
    }

    #[test]
    fn same_instant_rows_keep_insertion_order_reversed() {
        let (db, owner, contract) = setup();
        let first = db.record_notification(&attempt(&contract, "a@b.com", true, 0)).unwrap();
        let second = db.record_notification(&attempt(&contract, "a@b.com", true, 0)).unwrap();

        let ids: Vec<_> = db.list_notifications(owner).unwrap().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, [second.id, first.id]);
    }

    #[test]
    fn distinct_recipients_count_joined_strings() {
        let (db, owner, contract) = setup();
        db.record_notification(&attempt(&contract, "a@b.com", true, 0)).unwrap();
        db.record_notification(&attempt(&contract, "a@b.com", false, 1)).unwrap();
        db.record_notification(&attempt(&contract, "a@b.com,c@d.com", true, 2)).unwrap();

        assert_eq!(db.count_distinct_recipients(owner).unwrap(), 2);
    }

    #[test]
    fn deleting_a_contract_removes_its_ledger_rows() {
        let (db, owner, contract) = setup();
        db.record_notification(&attempt(&contract, "a@b.com", true, 0)).unwrap();

        assert!(db.delete_contract(owner, contract.id).unwrap());
        assert_eq!(db.count_notifications(owner).unwrap(), 0);
        assert!(db.get_contract(owner, contract.id).unwrap().is_none());
    }

    #[test]
    fn bulk_deletes_are_owner_scoped() {
        let (db, owner, contract) = setup();
        db.record_notification(&attempt(&contract, "a@b.com", true, 0)).unwrap();

        let stranger = Uuid::new_v4();
        db.create_user(stranger, "Bruno", "bruno@example.com", "hash").unwrap();
        assert_eq!(db.delete_notifications_for_owner(stranger).unwrap(), 0);
        assert_eq!(db.delete_all_contracts(stranger).unwrap(), 0);
        assert_eq!(db.count_notifications(owner).unwrap(), 1);

        assert_eq!(db.delete_notifications_for_owner(owner).unwrap(), 1);
        assert_eq!(db.delete_all_contracts(owner).unwrap(), 1);
        assert!(db.list_contracts(owner).unwrap().is_empty());
    }

    #[test]
    fn unknown_contract_is_rejected_by_the_foreign_key() {
        let (db, _, contract) = setup();
        let mut orphan = attempt(&contract, "a@b.com", true, 0);
        orphan.contract_id = Uuid::new_v4();
        assert!(db.record_notification(&orphan).is_err());
    }
}
