use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde_json::json;

use contrato_notify::{ExpiryState, expiry_state, remaining_days};
use contrato_types::api::{Claims, DashboardStats, StatusCount, UpcomingExpiration};
use contrato_types::models::{Contract, ContractStatus, NotificationRecord};

use crate::blocking;
use crate::error::ApiError;
use crate::state::AppState;

/// Window for "expiring soon" on the stats panel.
pub const STATS_HORIZON_DAYS: u64 = 30;
/// Window for the "expiring this week" counter.
pub const WEEK_HORIZON_DAYS: u64 = 7;
const PANEL_LIMIT: u32 = 5;

fn upcoming(contract: &Contract, now: DateTime<Utc>) -> UpcomingExpiration {
    UpcomingExpiration {
        id: contract.id,
        nome: contract.name.clone(),
        data_fim: contract.ends_at.clone(),
        status: contract.status.clone(),
        dias_restantes: remaining_days(&contract.ends_at, now),
    }
}

/// Aggregates the dashboard from already-loaded data. `contracts` must be in
/// end-date order. Only active contracts count as expiring or overdue.
pub fn build_stats(
    contracts: &[Contract],
    status_counts: Vec<(ContractStatus, usize)>,
    recent: Vec<NotificationRecord>,
    now: DateTime<Utc>,
) -> DashboardStats {
    let active: Vec<(&Contract, ExpiryState)> = contracts
        .iter()
        .filter(|c| c.status.is_active())
        .map(|c| (c, expiry_state(&c.ends_at, now, STATS_HORIZON_DAYS)))
        .collect();

    let expiring = active.iter().filter(|(_, s)| *s == ExpiryState::Expiring).count();
    let overdue = active.iter().filter(|(_, s)| *s == ExpiryState::Overdue).count();

    let next_up = active
        .iter()
        .filter(|(_, s)| matches!(s, ExpiryState::Expiring | ExpiryState::Later))
        .take(PANEL_LIMIT as usize)
        .map(|(c, _)| upcoming(c, now))
        .collect();

    DashboardStats {
        total_contratos: contracts.len(),
        contratos_ativos: active.len(),
        contratos_proximos: expiring,
        contratos_vencidos: overdue,
        status_distribuicao: status_counts
            .into_iter()
            .map(|(status, total)| StatusCount { status, total })
            .collect(),
        ultimas_notificacoes: recent,
        proximos_vencimentos: next_up,
        atualizado_em: now,
    }
}

/// Active contracts ending between today and `horizon_days` from now.
pub fn expiring_within(contracts: &[Contract], now: DateTime<Utc>, horizon_days: u64) -> Vec<UpcomingExpiration> {
    contracts
        .iter()
        .filter(|c| c.status.is_active())
        .filter(|c| expiry_state(&c.ends_at, now, horizon_days) == ExpiryState::Expiring)
        .map(|c| upcoming(c, now))
        .collect()
}

pub async fn stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = claims.sub;
    let (contracts, counts, recent) = blocking(move || {
        Ok((
            state.db.list_contracts(owner)?,
            state.db.contract_status_counts(owner)?,
            state.db.recent_notifications(owner, PANEL_LIMIT)?,
        ))
    })
    .await?;

    let stats = build_stats(&contracts, counts, recent, Utc::now());
    Ok(Json(json!({ "success": true, "stats": stats })))
}

pub async fn expiring_this_week(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let contracts = blocking(move || Ok(state.db.list_contracts(claims.sub)?)).await?;
    let expiring = expiring_within(&contracts, Utc::now(), WEEK_HORIZON_DAYS);

    Ok(Json(json!({
        "success": true,
        "total": expiring.len(),
        "contratos": expiring,
    })))
}

pub async fn active_recipients(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let total = blocking(move || Ok(state.db.count_distinct_recipients(claims.sub)?)).await?;
    Ok(Json(json!({ "success": true, "total": total })))
}
