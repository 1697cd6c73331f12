use crate::Database;
use crate::models::{ContractRow, UserRow, format_timestamp};
use anyhow::Result;
use chrono::Utc;
use contrato_types::models::{Contract, ContractStatus};
use rusqlite::{Connection, params};
use uuid::Uuid;

pub struct NewContract {
    pub name: String,
    pub description: Option<String>,
    pub starts_at: String,
    pub ends_at: String,
    pub status: ContractStatus,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Default)]
pub struct ContractChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub starts_at: Option<String>,
    pub ends_at: Option<String>,
    pub status: Option<ContractStatus>,
}

#[derive(Default)]
pub struct UserChanges {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, full_name, email, password, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id.to_string(), full_name, email, password_hash, format_timestamp(Utc::now())],
            )?;
            query_user_by_id(conn, &id.to_string())?
                .ok_or_else(|| anyhow::anyhow!("User vanished after insert: {}", id))
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", UserRow::COLUMNS),
                [email],
                UserRow::from_row,
            )
            .optional()
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, &id.to_string()))
    }

    /// True when `email` belongs to an account other than `except`.
    pub fn email_taken(&self, email: &str, except: Option<Uuid>) -> Result<bool> {
        let except = except.map(|id| id.to_string()).unwrap_or_default();
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE email = ?1 AND id != ?2",
                params![email, except],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    pub fn update_user(&self, id: Uuid, changes: &UserChanges) -> Result<Option<UserRow>> {
        let id = id.to_string();
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET
                    full_name = COALESCE(?2, full_name),
                    email     = COALESCE(?3, email),
                    password  = COALESCE(?4, password)
                 WHERE id = ?1",
                params![id, changes.full_name, changes.email, changes.password_hash],
            )?;
            query_user_by_id(conn, &id)
        })
    }

    // -- Contracts --

    pub fn insert_contract(&self, owner: Uuid, new: &NewContract) -> Result<Contract> {
        let id = Uuid::new_v4().to_string();
        let owner = owner.to_string();
        let now = format_timestamp(Utc::now());
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO contracts (id, owner_id, name, description, starts_at, ends_at, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    id,
                    owner,
                    new.name,
                    new.description,
                    new.starts_at,
                    new.ends_at,
                    new.status.as_str(),
                    now
                ],
            )?;
            query_contract(conn, &owner, &id)?
                .ok_or_else(|| anyhow::anyhow!("Contract vanished after insert: {}", id))
        })
    }

    /// Looks a contract up within the owner's scope. Another owner's contract
    /// is indistinguishable from a missing one.
    pub fn get_contract(&self, owner: Uuid, id: Uuid) -> Result<Option<Contract>> {
        self.with_conn(|conn| query_contract(conn, &owner.to_string(), &id.to_string()))
    }

    /// All of the owner's contracts, soonest end date first.
    pub fn list_contracts(&self, owner: Uuid) -> Result<Vec<Contract>> {
        self.with_conn(|conn| {
            query_contracts(
                conn,
                &format!(
                    "SELECT {} FROM contracts WHERE owner_id = ?1 ORDER BY ends_at ASC, rowid ASC",
                    ContractRow::COLUMNS
                ),
                params![owner.to_string()],
            )
        })
    }

    pub fn recent_contracts(&self, owner: Uuid, limit: u32) -> Result<Vec<Contract>> {
        self.with_conn(|conn| {
            query_contracts(
                conn,
                &format!(
                    "SELECT {} FROM contracts WHERE owner_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                    ContractRow::COLUMNS
                ),
                params![owner.to_string(), limit],
            )
        })
    }

    pub fn update_contract(
        &self,
        owner: Uuid,
        id: Uuid,
        changes: &ContractChanges,
    ) -> Result<Option<Contract>> {
        let owner = owner.to_string();
        let id = id.to_string();
        let status = changes.status.as_ref().map(|s| s.as_str().to_string());
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE contracts SET
                    name        = COALESCE(?3, name),
                    description = COALESCE(?4, description),
                    starts_at   = COALESCE(?5, starts_at),
                    ends_at     = COALESCE(?6, ends_at),
                    status      = COALESCE(?7, status),
                    updated_at  = ?8
                 WHERE id = ?1 AND owner_id = ?2",
                params![
                    id,
                    owner,
                    changes.name,
                    changes.description,
                    changes.starts_at,
                    changes.ends_at,
                    status,
                    format_timestamp(Utc::now())
                ],
            )?;
            query_contract(conn, &owner, &id)
        })
    }

    pub fn set_contract_status(
        &self,
        owner: Uuid,
        id: Uuid,
        status: &ContractStatus,
    ) -> Result<Option<Contract>> {
        self.update_contract(
            owner,
            id,
            &ContractChanges {
                status: Some(status.clone()),
                ..Default::default()
            },
        )
    }

    /// Removes a contract and its ledger rows in one transaction. Returns
    /// false when the owner has no such contract.
    pub fn delete_contract(&self, owner: Uuid, id: Uuid) -> Result<bool> {
        let owner = owner.to_string();
        let id = id.to_string();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let owned: i64 = tx.query_row(
                "SELECT COUNT(*) FROM contracts WHERE id = ?1 AND owner_id = ?2",
                params![id, owner],
                |row| row.get(0),
            )?;
            if owned == 0 {
                return Ok(false);
            }
            tx.execute("DELETE FROM notifications WHERE contract_id = ?1", [&id])?;
            tx.execute("DELETE FROM contracts WHERE id = ?1", [&id])?;
            tx.commit()?;
            Ok(true)
        })
    }

    /// Deletes every contract the owner has, ledger rows first. Returns the
    /// number of contracts removed.
    pub fn delete_all_contracts(&self, owner: Uuid) -> Result<usize> {
        let owner = owner.to_string();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM notifications WHERE contract_id IN (SELECT id FROM contracts WHERE owner_id = ?1)",
                [&owner],
            )?;
            let removed = tx.execute("DELETE FROM contracts WHERE owner_id = ?1", [&owner])?;
            tx.commit()?;
            Ok(removed)
        })
    }

    /// Contract count per stored status tag, most common first.
    pub fn contract_status_counts(&self, owner: Uuid) -> Result<Vec<(ContractStatus, usize)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM contracts WHERE owner_id = ?1
                 GROUP BY status ORDER BY COUNT(*) DESC, status ASC",
            )?;
            let rows = stmt.query_map([owner.to_string()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;

            let mut counts = Vec::new();
            for row in rows {
                let (status, total) = row?;
                counts.push((ContractStatus::from_stored(&status), total as usize));
            }
            Ok(counts)
        })
    }
}

// -- Helper functions (operate on a borrowed connection) --

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", UserRow::COLUMNS),
        [id],
        UserRow::from_row,
    )
    .optional()
}

fn query_contract(conn: &Connection, owner: &str, id: &str) -> Result<Option<Contract>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {} FROM contracts WHERE id = ?1 AND owner_id = ?2",
                ContractRow::COLUMNS
            ),
            [id, owner],
            ContractRow::from_row,
        )
        .optional()?;
    row.map(ContractRow::into_contract).transpose()
}

fn query_contracts(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Contract>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, ContractRow::from_row)?;

    let mut contracts = Vec::new();
    for row in rows {
        contracts.push(row?.into_contract()?);
    }
    Ok(contracts)
}

pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
