use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use contrato_db::models::format_timestamp;
use contrato_db::{ContractChanges, NewContract};
use contrato_notify::deadline::parse_timestamp;
use contrato_notify::remaining_days;
use contrato_types::api::{
    Claims, ContractResponse, CreateContractRequest, UpdateContractRequest, UpdateStatusRequest,
};
use contrato_types::models::Contract;

use crate::blocking;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::{AppState, AppStateInner};

pub const RECENT_LIMIT: u32 = 5;

pub fn contract_response(contract: Contract, now: DateTime<Utc>) -> ContractResponse {
    ContractResponse {
        id: contract.id,
        dias_restantes: remaining_days(&contract.ends_at, now),
        nome: contract.name,
        descricao: contract.description,
        data_inicio: contract.starts_at,
        data_fim: contract.ends_at,
        status: contract.status,
        criado_em: contract.created_at,
        atualizado_em: contract.updated_at,
    }
}

fn required(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("Campo {field} é obrigatório")));
    }
    Ok(())
}

fn parse_date(raw: &str, field: &str) -> Result<DateTime<Utc>, ApiError> {
    parse_timestamp(raw).ok_or_else(|| ApiError::validation(format!("Data inválida em {field}: {raw}")))
}

fn check_range(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<(), ApiError> {
    if ends_at < starts_at {
        return Err(ApiError::validation(
            "A data de término deve ser igual ou posterior à data de início",
        ));
    }
    Ok(())
}

/// A blank description is stored as no description.
fn description(raw: Option<String>) -> Option<String> {
    raw.map(|d| d.trim().to_string()).filter(|d| !d.is_empty())
}

pub async fn list_contracts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let contracts = blocking(move || Ok(state.db.list_contracts(claims.sub)?)).await?;
    let now = Utc::now();
    let contracts: Vec<_> = contracts.into_iter().map(|c| contract_response(c, now)).collect();

    Ok(Json(json!({ "success": true, "contratos": contracts })))
}

pub async fn recent_contracts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let contracts = blocking(move || Ok(state.db.recent_contracts(claims.sub, RECENT_LIMIT)?)).await?;
    let now = Utc::now();
    let contracts: Vec<_> = contracts.into_iter().map(|c| contract_response(c, now)).collect();

    Ok(Json(json!({ "success": true, "contratos": contracts })))
}

pub async fn get_contract(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let contract = blocking(move || Ok(state.db.get_contract(claims.sub, id)?))
        .await?
        .ok_or_else(ApiError::contract_not_found)?;

    Ok(Json(json!({
        "success": true,
        "contrato": contract_response(contract, Utc::now()),
    })))
}

pub async fn create_contract(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateContractRequest>,
) -> Result<impl IntoResponse, ApiError> {
    required(&req.nome, "nome")?;
    required(&req.data_inicio, "data_inicio")?;
    required(&req.data_fim, "data_fim")?;

    let starts_at = parse_date(&req.data_inicio, "data_inicio")?;
    let ends_at = parse_date(&req.data_fim, "data_fim")?;
    check_range(starts_at, ends_at)?;

    let new = NewContract {
        name: req.nome.trim().to_string(),
        description: description(req.descricao),
        starts_at: format_timestamp(starts_at),
        ends_at: format_timestamp(ends_at),
        status: req.status.unwrap_or_default(),
    };

    let contract = blocking(move || Ok(state.db.insert_contract(claims.sub, &new)?)).await?;
    info!(contract_id = %contract.id, owner = %claims.sub, "Contract created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Contrato criado com sucesso",
            "contrato": contract_response(contract, Utc::now()),
        })),
    ))
}

pub async fn update_contract(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateContractRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(name) = &req.nome {
        required(name, "nome")?;
    }
    let starts_at = req.data_inicio.as_deref().map(|d| parse_date(d, "data_inicio")).transpose()?;
    let ends_at = req.data_fim.as_deref().map(|d| parse_date(d, "data_fim")).transpose()?;

    let owner = claims.sub;
    let contract = blocking(move || {
        let current = state
            .db
            .get_contract(owner, id)?
            .ok_or_else(ApiError::contract_not_found)?;

        // The range is checked against the stored side when only one date moves.
        if starts_at.is_some() || ends_at.is_some() {
            let start = match starts_at {
                Some(s) => Some(s),
                None => parse_timestamp(&current.starts_at),
            };
            let end = match ends_at {
                Some(e) => Some(e),
                None => parse_timestamp(&current.ends_at),
            };
            if let (Some(start), Some(end)) = (start, end) {
                check_range(start, end)?;
            }
        }

        let changes = ContractChanges {
            name: req.nome.map(|n| n.trim().to_string()),
            description: description(req.descricao),
            starts_at: starts_at.map(format_timestamp),
            ends_at: ends_at.map(format_timestamp),
            status: req.status,
        };
        state
            .db
            .update_contract(owner, id, &changes)?
            .ok_or_else(ApiError::contract_not_found)
    })
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Contrato atualizado com sucesso",
        "contrato": contract_response(contract, Utc::now()),
    })))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let status = req.status.ok_or_else(|| ApiError::validation("Status é obrigatório"))?;

    let new_status = status.clone();
    let contract = blocking(move || Ok(state.db.set_contract_status(claims.sub, id, &new_status)?))
        .await?
        .ok_or_else(ApiError::contract_not_found)?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Status do contrato atualizado para {status}"),
        "contrato": contract_response(contract, Utc::now()),
    })))
}

/// Deletes one contract and its ledger, refused while a notification for it
/// is still being sent.
pub fn remove_contract(state: &AppStateInner, owner: Uuid, id: Uuid) -> Result<(), ApiError> {
    let removed = state
        .in_flight
        .unless_sending(id, || Ok(state.db.delete_contract(owner, id)?))?;
    if !removed {
        return Err(ApiError::contract_not_found());
    }
    Ok(())
}

pub async fn delete_contract(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    blocking(move || remove_contract(&state, claims.sub, id)).await?;
    info!(contract_id = %id, owner = %claims.sub, "Contract deleted");

    Ok(Json(json!({ "success": true, "message": "Contrato excluído com sucesso" })))
}

/// Removes every contract of the caller together with its ledger.
pub async fn clear_contracts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = claims.sub;
    let removed = blocking(move || {
        state
            .in_flight
            .unless_owner_sending(owner, || Ok(state.db.delete_all_contracts(owner)?))
    })
    .await?;
    info!(owner = %owner, removed, "Contracts cleared");

    Ok(Json(json!({
        "success": true,
        "message": "Contratos removidos",
        "removidos": removed,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_before_start_is_rejected() {
        let start = parse_date("2025-01-10", "data_inicio").unwrap();
        let end = parse_date("2025-01-09T23:59:59Z", "data_fim").unwrap();
        assert!(check_range(start, end).is_err());
        assert!(check_range(start, start).is_ok());
    }

    #[test]
    fn unparseable_date_names_the_field() {
        let err = parse_date("amanhã", "data_fim").unwrap_err();
        assert_eq!(err.to_string(), "Data inválida em data_fim: amanhã");
    }

    #[test]
    fn blank_description_is_dropped() {
        assert_eq!(description(Some("   ".into())), None);
        assert_eq!(description(Some(" Galpão ".into())), Some("Galpão".into()));
    }
}
