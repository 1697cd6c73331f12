use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Status inválido: {0}")]
    InvalidStatus(String),

    #[error("Tipo de notificação inválido: {0}")]
    InvalidKind(String),
}

/// Free-form tags (statuses, custom notification kinds) must be short,
/// lowercase identifiers so that a typo can't silently create a new bucket.
const MAX_TAG_LEN: usize = 32;

fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag.len() <= MAX_TAG_LEN
        && tag
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

// -- Users --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

// -- Contracts --

/// Lifecycle tag of a contract. `Active` and `Ended` are the values the
/// application itself writes; anything else is accepted as long as it is a
/// well-formed tag (e.g. `renovado`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ContractStatus {
    #[default]
    Active,
    Ended,
    Other(String),
}

impl ContractStatus {
    pub const ACTIVE: &'static str = "ativo";
    pub const ENDED: &'static str = "encerrado";

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let raw = raw.trim();
        match raw {
            Self::ACTIVE => Ok(Self::Active),
            Self::ENDED => Ok(Self::Ended),
            other if is_valid_tag(other) => Ok(Self::Other(other.to_string())),
            other => Err(DomainError::InvalidStatus(other.to_string())),
        }
    }

    /// Rows written before validation existed may hold arbitrary text; keep it.
    pub fn from_stored(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|_| Self::Other(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => Self::ACTIVE,
            Self::Ended => Self::ENDED,
            Self::Other(tag) => tag,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ContractStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ContractStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// A tracked agreement. Start and end timestamps are kept exactly as stored;
/// interpreting them is the deadline calculator's job.
#[derive(Debug, Clone, PartialEq)]
pub struct Contract {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub starts_at: String,
    pub ends_at: String,
    pub status: ContractStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Notifications --

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    DailyReminder,
    WeeklyReminder,
    MonthlyReminder,
    Generic(String),
}

impl NotificationKind {
    pub const DAILY: &'static str = "lembrete_diario";
    pub const WEEKLY: &'static str = "lembrete_semanal";
    pub const MONTHLY: &'static str = "lembrete_mensal";

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let raw = raw.trim();
        match raw {
            Self::DAILY => Ok(Self::DailyReminder),
            Self::WEEKLY => Ok(Self::WeeklyReminder),
            Self::MONTHLY => Ok(Self::MonthlyReminder),
            other if is_valid_tag(other) => Ok(Self::Generic(other.to_string())),
            other => Err(DomainError::InvalidKind(other.to_string())),
        }
    }

    pub fn from_stored(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|_| Self::Generic(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::DailyReminder => Self::DAILY,
            Self::WeeklyReminder => Self::WEEKLY,
            Self::MonthlyReminder => Self::MONTHLY,
            Self::Generic(tag) => tag,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NotificationKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NotificationKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationStatus {
    #[serde(rename = "pendente")]
    Pending,
    #[serde(rename = "enviado")]
    Sent,
    #[serde(rename = "erro")]
    Error,
}

impl NotificationStatus {
    pub fn from_delivered(delivered: bool) -> Self {
        if delivered { Self::Sent } else { Self::Error }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pendente",
            Self::Sent => "enviado",
            Self::Error => "erro",
        }
    }

    pub fn from_stored(raw: &str) -> Option<Self> {
        match raw {
            "pendente" => Some(Self::Pending),
            "enviado" => Some(Self::Sent),
            "erro" => Some(Self::Error),
            _ => None,
        }
    }
}

/// One row of the notification ledger, in its wire representation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    #[serde(rename = "contrato_id")]
    pub contract_id: Uuid,
    #[serde(rename = "contrato_nome")]
    pub contract_name: String,
    #[serde(rename = "tipo")]
    pub kind: NotificationKind,
    #[serde(rename = "assunto")]
    pub subject: String,
    #[serde(rename = "mensagem")]
    pub message: String,
    /// Comma-joined recipient addresses.
    #[serde(rename = "email_destino")]
    pub recipients: String,
    pub status: NotificationStatus,
    #[serde(rename = "data_envio")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(rename = "criado_em")]
    pub created_at: DateTime<Utc>,
}
