use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use contrato_db::{Database, NewNotification};
use contrato_notify::{Dispatcher, Recipients, compose, render_all};
use contrato_types::api::{Claims, NotifyRequest, NotifyResponse};
use contrato_types::models::{NotificationKind, NotificationRecord};

use crate::blocking;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::AppState;

pub const RECENT_LIMIT: u32 = 5;

/// Result of one notify call. `delivered == false` still carries the ledger
/// row that recorded the failure.
#[derive(Debug)]
pub struct NotifyOutcome {
    pub delivered: bool,
    pub recipients: usize,
    pub record: NotificationRecord,
}

/// Compose, dispatch and record a notification for one of `owner`'s
/// contracts.
///
/// The request is validated before anything is read or sent, and a contract
/// the owner can't see is reported as missing. Neither case writes to the
/// ledger. Once dispatch has been attempted exactly one row is appended,
/// whatever the transport said.
pub fn notify_contract(
    db: &Database,
    dispatcher: &Dispatcher,
    dashboard_url: &str,
    owner: Uuid,
    contract_id: Uuid,
    req: &NotifyRequest,
    now: DateTime<Utc>,
) -> Result<NotifyOutcome, ApiError> {
    let kind = req
        .tipo
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::validation("Emails e tipo são obrigatórios"))?;
    let emails = req
        .emails
        .as_ref()
        .ok_or_else(|| ApiError::validation("Emails e tipo são obrigatórios"))?;

    let kind = NotificationKind::parse(kind)?;
    let recipients = Recipients::parse(emails)?;

    let contract = db
        .get_contract(owner, contract_id)?
        .ok_or_else(ApiError::contract_not_found)?;

    let doc = compose(
        &contract,
        &kind,
        req.mensagem_customizada.as_deref(),
        req.assunto.as_deref(),
        now,
    );
    let rendered = render_all(&doc, dashboard_url);

    let delivered = dispatcher.dispatch(&recipients, &doc.subject, &rendered.html, &rendered.text);

    let record = db.record_notification(&NewNotification {
        contract_id: contract.id,
        kind,
        subject: doc.subject,
        message: doc.message.to_plain_text(),
        recipients: recipients.joined(),
        delivered,
        attempted_at: now,
    })?;

    if delivered {
        info!(contract_id = %contract.id, recipients = recipients.len(), "Notification sent");
    } else {
        warn!(contract_id = %contract.id, recipients = recipients.len(), "Notification recorded as failed");
    }

    Ok(NotifyOutcome {
        delivered,
        recipients: recipients.len(),
        record,
    })
}

pub async fn notify(
    State(state): State<AppState>,
    Path(contract_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<NotifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = blocking(move || {
        // Held from the lookup until the row is written.
        let _sending = state.in_flight.begin(claims.sub, contract_id);
        notify_contract(
            &state.db,
            &state.dispatcher,
            &state.public_url,
            claims.sub,
            contract_id,
            &req,
            Utc::now(),
        )
    })
    .await?;

    let (status, message) = if outcome.delivered {
        (
            StatusCode::OK,
            format!("Notificação enviada para {} email(s)", outcome.recipients),
        )
    } else {
        (StatusCode::BAD_GATEWAY, "Erro ao enviar notificação".to_string())
    };

    Ok((
        status,
        Json(NotifyResponse {
            success: outcome.delivered,
            message,
            enviados: if outcome.delivered { outcome.recipients } else { 0 },
            notificacao: outcome.record,
        }),
    ))
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let records = blocking(move || Ok(state.db.list_notifications(claims.sub)?)).await?;
    Ok(Json(json!({ "success": true, "notificacoes": records })))
}

pub async fn recent_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let records = blocking(move || Ok(state.db.recent_notifications(claims.sub, RECENT_LIMIT)?)).await?;
    Ok(Json(json!({ "success": true, "notificacoes": records })))
}

pub async fn count_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let count = blocking(move || Ok(state.db.count_notifications(claims.sub)?)).await?;
    Ok(Json(json!({ "success": true, "count": count })))
}

pub async fn clear_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = blocking(move || Ok(state.db.delete_notifications_for_owner(claims.sub)?)).await?;
    info!(owner = %claims.sub, removed, "Notifications cleared");

    Ok(Json(json!({
        "success": true,
        "message": "Notificações removidas",
        "removidos": removed,
    })))
}
