//! Health check, the test email, and small helper endpoints used by the UI.

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use contrato_db::migrations::REQUIRED_TABLES;
use contrato_notify::{Recipients, compose_test_message, remaining_days, render_all};
use contrato_types::api::{Claims, RecipientsInput, TestEmailRequest};

use crate::auth::looks_like_email;
use crate::blocking;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let tables = blocking(move || Ok(state.db.table_names()?)).await?;
    let missing: Vec<&str> = REQUIRED_TABLES
        .iter()
        .copied()
        .filter(|t| !tables.iter().any(|have| have == t))
        .collect();

    let healthy = missing.is_empty();
    Ok(Json(json!({
        "status": if healthy { "healthy" } else { "warning" },
        "database": {
            "tabelas": tables,
            "tabelas_faltando": missing,
        },
        "timestamp": Utc::now(),
        "message": if healthy { "Sistema operacional" } else { "Algumas tabelas estão faltando" },
    })))
}

pub async fn send_test_email(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<TestEmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req
        .email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::validation("Email é obrigatório"))?;
    let recipients = Recipients::parse(&RecipientsInput::Joined(email.clone()))?;

    let doc = compose_test_message(&email, Utc::now());
    let rendered = render_all(&doc, &state.public_url);

    let delivered = blocking(move || {
        Ok(state
            .dispatcher
            .dispatch(&recipients, &doc.subject, &rendered.html, &rendered.text))
    })
    .await?;

    if !delivered {
        return Err(ApiError::Delivery("Erro ao enviar email de teste".to_string()));
    }

    info!(user_id = %claims.sub, "Test email sent");
    Ok(Json(json!({ "success": true, "message": "Email de teste enviado com sucesso!" })))
}

pub async fn calculate_days(Path(data_fim): Path<String>) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "dias_restantes": remaining_days(&data_fim, Utc::now()),
    }))
}

pub async fn check_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if !looks_like_email(&email) {
        return Err(ApiError::validation(format!("Email inválido: {email}")));
    }

    let taken = blocking(move || Ok(state.db.email_taken(&email, Some(claims.sub))?)).await?;
    Ok(Json(json!({
        "success": true,
        "disponivel": !taken,
        "message": if taken { "Email já está em uso" } else { "Email disponível" },
    })))
}
