use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde_json::json;
use tracing::info;

use contrato_db::UserChanges;
use contrato_types::api::{Claims, UpdateProfileRequest};

use crate::auth::{MIN_PASSWORD_LEN, hash_password, looks_like_email, user_response, verify_password};
use crate::blocking;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::AppState;

fn user_not_found() -> ApiError {
    ApiError::NotFound("Usuário não encontrado".to_string())
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let row = blocking(move || Ok(state.db.get_user_by_id(claims.sub)?))
        .await?
        .ok_or_else(user_not_found)?;

    Ok(Json(json!({ "success": true, "perfil": user_response(&row)? })))
}

/// Partial profile update. Changing the password requires the current one;
/// `nova_senha` without `senha_atual` is rejected rather than ignored.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let full_name = req.nome_completo.map(|n| n.trim().to_string());
    if full_name.as_deref() == Some("") {
        return Err(ApiError::validation("Nome completo não pode ser vazio"));
    }

    let email = req.email.map(|e| e.trim().to_string());
    if let Some(email) = &email {
        if !looks_like_email(email) {
            return Err(ApiError::validation(format!("Email inválido: {email}")));
        }
    }

    let password_change = match (req.senha_atual, req.nova_senha) {
        (None, None) => None,
        (Some(current), Some(new)) => {
            if new.chars().count() < MIN_PASSWORD_LEN {
                return Err(ApiError::validation(format!(
                    "A senha deve ter pelo menos {MIN_PASSWORD_LEN} caracteres"
                )));
            }
            Some((current, new))
        }
        _ => {
            return Err(ApiError::validation(
                "Informe a senha atual e a nova senha para alterar a senha",
            ));
        }
    };

    let user_id = claims.sub;
    let row = blocking(move || {
        let current = state.db.get_user_by_id(user_id)?.ok_or_else(user_not_found)?;

        if let Some(email) = &email {
            if state.db.email_taken(email, Some(user_id))? {
                return Err(ApiError::Conflict("Email já está em uso".to_string()));
            }
        }

        let password_hash = match password_change {
            Some((old, new)) => {
                if !verify_password(&old, &current.password)? {
                    return Err(ApiError::validation("Senha atual incorreta"));
                }
                Some(hash_password(&new)?)
            }
            None => None,
        };

        let changes = UserChanges {
            full_name,
            email,
            password_hash,
        };
        state
            .db
            .update_user(user_id, &changes)
            .map_err(|e| ApiError::unless_conflict(e, "Email já está em uso"))?
            .ok_or_else(user_not_found)
    })
    .await?;

    info!(user_id = %user_id, "Profile updated");
    Ok(Json(json!({
        "success": true,
        "message": "Perfil atualizado com sucesso",
        "perfil": user_response(&row)?,
    })))
}
