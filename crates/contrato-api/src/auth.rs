use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use contrato_db::models::UserRow;
use contrato_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest, UserResponse};

use crate::blocking;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::middleware::create_token;
use crate::state::AppState;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Same weak shape check applied to notification recipients.
pub fn looks_like_email(email: &str) -> bool {
    email.contains('@') && email.contains('.')
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| anyhow::anyhow!("Stored password hash is malformed: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn user_response(row: &UserRow) -> Result<UserResponse, ApiError> {
    let user = row.to_user()?;
    Ok(UserResponse {
        id: user.id,
        nome_completo: user.full_name,
        email: user.email,
        criado_em: user.created_at,
    })
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let full_name = req.nome_completo.trim().to_string();
    let email = req.email.trim().to_string();

    if full_name.is_empty() || email.is_empty() || req.senha.is_empty() {
        return Err(ApiError::validation("Todos os campos são obrigatórios"));
    }
    if !looks_like_email(&email) {
        return Err(ApiError::validation(format!("Email inválido: {email}")));
    }
    if req.senha.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "A senha deve ter pelo menos {MIN_PASSWORD_LEN} caracteres"
        )));
    }

    let app = state.clone();
    let row = blocking(move || {
        if app.db.email_taken(&email, None)? {
            return Err(ApiError::Conflict("Email já cadastrado".to_string()));
        }
        let password_hash = hash_password(&req.senha)?;
        app.db
            .create_user(Uuid::new_v4(), &full_name, &email, &password_hash)
            .map_err(|e| ApiError::unless_conflict(e, "Email já cadastrado"))
    })
    .await?;

    let user = user_response(&row)?;
    let token = create_token(&state.jwt_secret, user.id, &user.email)?;
    info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            message: "Usuário criado com sucesso".to_string(),
            token,
            user,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_string();
    if email.is_empty() || req.senha.is_empty() {
        return Err(ApiError::validation("Email e senha são obrigatórios"));
    }

    let app = state.clone();
    let row = blocking(move || {
        let row = app.db.get_user_by_email(&email)?.ok_or(ApiError::Unauthorized)?;
        if !verify_password(&req.senha, &row.password)? {
            return Err(ApiError::Unauthorized);
        }
        Ok(row)
    })
    .await?;

    let user = user_response(&row)?;
    let token = create_token(&state.jwt_secret, user.id, &user.email)?;

    Ok(Json(AuthResponse {
        success: true,
        message: "Login realizado com sucesso".to_string(),
        token,
        user,
    }))
}

/// Resolves the bearer token back to the stored account. A token for an
/// account that no longer exists is treated as no token.
pub async fn check(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let app = state.clone();
    let row = blocking(move || Ok(app.db.get_user_by_id(claims.sub)?)).await?;
    let row = row.ok_or(ApiError::Unauthorized)?;

    Ok(Json(json!({
        "authenticated": true,
        "user": user_response(&row)?,
    })))
}
