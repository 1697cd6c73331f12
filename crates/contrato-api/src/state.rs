use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use contrato_db::Database;
use contrato_notify::Dispatcher;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
    /// Link placed in every outgoing email.
    pub public_url: String,
    pub in_flight: InFlight,
}

/// Contracts with a notification between lookup and ledger insert.
///
/// A contract must not disappear while its row is still to be written, so
/// deletion runs under the same lock and is refused while a send is open.
#[derive(Default)]
pub struct InFlight {
    /// contract id -> (owner, open sends)
    sends: Mutex<HashMap<Uuid, (Uuid, usize)>>,
}

const BUSY: &str = "Há uma notificação em andamento para este contrato";

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, (Uuid, usize)>> {
        // Nothing panics while holding this lock, so a poisoned map is still whole.
        self.sends.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Marks a send as open until the returned guard is dropped.
    pub fn begin(&self, owner: Uuid, contract_id: Uuid) -> SendGuard<'_> {
        self.lock().entry(contract_id).or_insert((owner, 0)).1 += 1;
        SendGuard {
            in_flight: self,
            contract_id,
        }
    }

    pub fn is_busy(&self, contract_id: Uuid) -> bool {
        self.lock().contains_key(&contract_id)
    }

    /// Runs `f` unless a send is open on `contract_id`. No send can start
    /// while `f` runs.
    pub fn unless_sending<T>(
        &self,
        contract_id: Uuid,
        f: impl FnOnce() -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let sends = self.lock();
        if sends.contains_key(&contract_id) {
            return Err(ApiError::Conflict(BUSY.to_string()));
        }
        f()
    }

    /// Like [`InFlight::unless_sending`], for every contract of `owner`.
    pub fn unless_owner_sending<T>(
        &self,
        owner: Uuid,
        f: impl FnOnce() -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let sends = self.lock();
        if sends.values().any(|(o, _)| *o == owner) {
            return Err(ApiError::Conflict(BUSY.to_string()));
        }
        f()
    }
}

pub struct SendGuard<'a> {
    in_flight: &'a InFlight,
    contract_id: Uuid,
}

impl Drop for SendGuard<'_> {
    fn drop(&mut self) {
        let mut sends = self.in_flight.lock();
        if let Some(entry) = sends.get_mut(&self.contract_id) {
            entry.1 -= 1;
            if entry.1 == 0 {
                sends.remove(&self.contract_id);
            }
        }
    }
}
