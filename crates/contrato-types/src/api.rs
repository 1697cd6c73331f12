use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ContractStatus, NotificationRecord};

// -- JWT Claims --

/// Bearer token claims. `sub` is the owner id threaded through every query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub nome_completo: String,
    pub email: String,
    pub senha: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub senha: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub nome_completo: String,
    pub email: String,
    pub criado_em: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: UserResponse,
}

// -- Profile --

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub nome_completo: Option<String>,
    pub email: Option<String>,
    pub senha_atual: Option<String>,
    pub nova_senha: Option<String>,
}

// -- Contracts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateContractRequest {
    pub nome: String,
    #[serde(default)]
    pub descricao: Option<String>,
    pub data_inicio: String,
    pub data_fim: String,
    #[serde(default)]
    pub status: Option<ContractStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateContractRequest {
    pub nome: Option<String>,
    pub descricao: Option<String>,
    pub data_inicio: Option<String>,
    pub data_fim: Option<String>,
    pub status: Option<ContractStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusRequest {
    pub status: Option<ContractStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractResponse {
    pub id: Uuid,
    pub nome: String,
    pub descricao: Option<String>,
    pub data_inicio: String,
    pub data_fim: String,
    pub status: ContractStatus,
    pub criado_em: DateTime<Utc>,
    pub atualizado_em: DateTime<Utc>,
    /// `None` when the stored end date can't be parsed.
    pub dias_restantes: Option<i64>,
}

// -- Notifications --

/// Recipients arrive either as one comma-delimited string or as a list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RecipientsInput {
    Joined(String),
    List(Vec<String>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotifyRequest {
    pub emails: Option<RecipientsInput>,
    pub tipo: Option<String>,
    pub assunto: Option<String>,
    pub mensagem_customizada: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    pub success: bool,
    pub message: String,
    pub enviados: usize,
    pub notificacao: NotificationRecord,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestEmailRequest {
    pub email: Option<String>,
}

// -- Dashboard --

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: ContractStatus,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpcomingExpiration {
    pub id: Uuid,
    pub nome: String,
    pub data_fim: String,
    pub status: ContractStatus,
    pub dias_restantes: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_contratos: usize,
    pub contratos_ativos: usize,
    pub contratos_proximos: usize,
    pub contratos_vencidos: usize,
    pub status_distribuicao: Vec<StatusCount>,
    pub ultimas_notificacoes: Vec<NotificationRecord>,
    pub proximos_vencimentos: Vec<UpcomingExpiration>,
    pub atualizado_em: DateTime<Utc>,
}
