//! Builds notification documents from a contract and a requested kind.
//!
//! Nothing here performs I/O. The reference instant is passed in so a
//! document is a pure function of its inputs.

use chrono::{DateTime, Utc};
use thiserror::Error;

use contrato_types::api::RecipientsInput;
use contrato_types::models::{Contract, NotificationKind};

use crate::deadline::{self, UrgencyTier};

pub const PRODUCT_NAME: &str = "CONTRATO+";
pub const DEFAULT_SUBJECT: &str = "Notificação de Contrato - CONTRATO+";
pub const TEST_SUBJECT: &str = "Teste de Email - CONTRATO+";
const MISSING_DESCRIPTION: &str = "Não informada";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    #[error("Email inválido: {0}")]
    InvalidRecipient(String),

    #[error("Nenhum destinatário informado")]
    NoRecipients,
}

// -- Recipients --

/// A validated, non-empty list of trimmed addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipients(Vec<String>);

impl Recipients {
    /// Split, trim and check every address for an `@` and a `.`. The first
    /// bad entry, blank ones included, rejects the whole list. Only a wholly
    /// empty input is `NoRecipients`.
    pub fn parse(input: &RecipientsInput) -> Result<Self, ComposeError> {
        let candidates: Vec<String> = match input {
            RecipientsInput::Joined(joined) if joined.trim().is_empty() => Vec::new(),
            RecipientsInput::Joined(joined) => joined.split(',').map(|s| s.trim().to_string()).collect(),
            RecipientsInput::List(list) => list.iter().map(|s| s.trim().to_string()).collect(),
        };

        if candidates.is_empty() {
            return Err(ComposeError::NoRecipients);
        }

        for address in &candidates {
            if !address.contains('@') || !address.contains('.') {
                return Err(ComposeError::InvalidRecipient(address.clone()));
            }
        }
        Ok(Self(candidates))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Storage form: addresses joined by commas.
    pub fn joined(&self) -> String {
        self.0.join(",")
    }
}

// -- Document model --

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    /// Rendered bold in HTML, as-is in plain text.
    Emphasis(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub segments: Vec<Segment>,
}

impl Message {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { segments: vec![Segment::Text(text.into())] }
    }

    fn text(mut self, text: impl Into<String>) -> Self {
        self.segments.push(Segment::Text(text.into()));
        self
    }

    fn emphasis(mut self, text: impl Into<String>) -> Self {
        self.segments.push(Segment::Emphasis(text.into()));
        self
    }

    pub fn to_plain_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Text(t) | Segment::Emphasis(t) => t.as_str(),
            })
            .collect()
    }
}

/// Contract details embedded in a notification, already formatted for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSummary {
    pub name: String,
    pub description: String,
    pub starts_at: String,
    pub ends_at: String,
    pub status: String,
    /// True remaining days, independent of the notification kind.
    pub remaining_days: Option<i64>,
    pub deadline_tier: Option<UrgencyTier>,
}

impl ContractSummary {
    pub fn new(contract: &Contract, reference: DateTime<Utc>) -> Self {
        let remaining_days = deadline::remaining_days(&contract.ends_at, reference);
        Self {
            name: contract.name.clone(),
            description: contract
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .unwrap_or(MISSING_DESCRIPTION)
                .to_string(),
            starts_at: deadline::format_display(&contract.starts_at),
            ends_at: deadline::format_display(&contract.ends_at),
            status: contract.status.to_string(),
            remaining_days,
            deadline_tier: remaining_days.map(UrgencyTier::from_remaining_days),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDocument {
    pub subject: String,
    pub title: String,
    pub kind: NotificationKind,
    /// Presentation tier. For contract notifications it follows the kind,
    /// not the dates.
    pub tier: UrgencyTier,
    pub message: Message,
    pub contract: Option<ContractSummary>,
}

/// Tier and title each kind is presented with.
pub fn kind_presentation<'a>(kind: &NotificationKind, subject: &'a str) -> (UrgencyTier, &'a str) {
    match kind {
        NotificationKind::DailyReminder => (UrgencyTier::Critical, "CONTRATO VENCE AMANHÃ!"),
        NotificationKind::WeeklyReminder => (UrgencyTier::Warning, "Contrato Próximo do Vencimento"),
        NotificationKind::MonthlyReminder => (UrgencyTier::Normal, "Lembrete de Contrato"),
        NotificationKind::Generic(_) => (UrgencyTier::Normal, subject),
    }
}

fn default_message(kind: &NotificationKind, contract_name: &str) -> Message {
    match kind {
        NotificationKind::DailyReminder => Message::default()
            .text("O contrato ")
            .emphasis(contract_name)
            .text(
                " está prestes a vencer! Tome as providências necessárias imediatamente \
                 para evitar interrupção dos serviços.",
            ),
        NotificationKind::WeeklyReminder => Message::default()
            .text("O contrato ")
            .emphasis(contract_name)
            .text(" vencerá em 7 dias. Verifique as condições para renovação."),
        NotificationKind::MonthlyReminder => Message::default()
            .text("Este é um lembrete automático: o contrato ")
            .emphasis(contract_name)
            .text(" vencerá em aproximadamente 30 dias."),
        NotificationKind::Generic(_) => Message::default()
            .text("Notificação referente ao contrato ")
            .emphasis(contract_name)
            .text("."),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

pub fn compose(
    contract: &Contract,
    kind: &NotificationKind,
    custom_message: Option<&str>,
    subject: Option<&str>,
    reference: DateTime<Utc>,
) -> NotificationDocument {
    let subject = non_blank(subject).unwrap_or(DEFAULT_SUBJECT);
    let (tier, title) = kind_presentation(kind, subject);

    let message = match non_blank(custom_message) {
        Some(custom) => Message::plain(custom),
        None => default_message(kind, &contract.name),
    };

    NotificationDocument {
        subject: subject.to_string(),
        title: title.to_string(),
        kind: kind.clone(),
        tier,
        message,
        contract: Some(ContractSummary::new(contract, reference)),
    }
}

/// Connectivity check sent from the settings page.
pub fn compose_test_message(recipient: &str, reference: DateTime<Utc>) -> NotificationDocument {
    let message = Message::default()
        .text("Se você está lendo esta mensagem, o sistema de notificações do ")
        .emphasis(PRODUCT_NAME)
        .text(" está funcionando perfeitamente! Este email foi enviado para: ")
        .emphasis(recipient)
        .text(". Data/Hora: ")
        .emphasis(reference.format("%d/%m/%Y %H:%M:%S").to_string())
        .text(".");

    NotificationDocument {
        subject: TEST_SUBJECT.to_string(),
        title: "Teste de Conexão Bem-sucedido!".to_string(),
        kind: NotificationKind::Generic("teste".to_string()),
        tier: UrgencyTier::Normal,
        message,
        contract: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use contrato_types::models::ContractStatus;
    use uuid::Uuid;

    fn lease(end: &str) -> Contract {
        let created = Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap();
        Contract {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Lease A".to_string(),
            description: None,
            starts_at: "2024-01-10T00:00:00Z".to_string(),
            ends_at: end.to_string(),
            status: ContractStatus::Active,
            created_at: created,
            updated_at: created,
        }
    }

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 5, 0, 0, 0).unwrap()
    }

    #[test]
    fn recipients_from_joined_string() {
        let r = Recipients::parse(&RecipientsInput::Joined(" a@b.com ,c@d.org".into())).unwrap();
        assert_eq!(r.as_slice(), ["a@b.com", "c@d.org"]);
        assert_eq!(r.joined(), "a@b.com,c@d.org");
    }

    #[test]
    fn blank_entry_rejects_the_list() {
        let empty = ComposeError::InvalidRecipient(String::new());
        assert_eq!(
            Recipients::parse(&RecipientsInput::Joined("a@b.com, ".into())),
            Err(empty.clone())
        );
        assert_eq!(
            Recipients::parse(&RecipientsInput::List(vec!["a@b.com".into(), "".into()])),
            Err(empty.clone())
        );
        assert_eq!(Recipients::parse(&RecipientsInput::Joined(" , ".into())), Err(empty));
    }

    #[test]
    fn first_invalid_recipient_rejects_all() {
        let input = RecipientsInput::List(vec!["a@b.com".into(), "bad-email".into(), "x@".into()]);
        assert_eq!(
            Recipients::parse(&input),
            Err(ComposeError::InvalidRecipient("bad-email".into()))
        );
    }

    #[test]
    fn empty_recipient_list_is_rejected() {
        assert_eq!(
            Recipients::parse(&RecipientsInput::Joined("   ".into())),
            Err(ComposeError::NoRecipients)
        );
        assert_eq!(
            Recipients::parse(&RecipientsInput::List(Vec::new())),
            Err(ComposeError::NoRecipients)
        );
    }

    #[test]
    fn daily_is_always_critical() {
        let doc = compose(&lease("2026-06-01T00:00:00Z"), &NotificationKind::DailyReminder, None, None, reference());
        assert_eq!(doc.tier, UrgencyTier::Critical);

        let summary = doc.contract.unwrap();
        assert!(summary.remaining_days.unwrap() > 400);
        assert_eq!(summary.deadline_tier, Some(UrgencyTier::Normal));
    }

    #[test]
    fn weekly_kind_overrides_date_tier() {
        let doc = compose(&lease("2025-01-10T00:00:00Z"), &NotificationKind::WeeklyReminder, None, None, reference());

        assert_eq!(doc.tier, UrgencyTier::Warning);
        assert_eq!(doc.title, "Contrato Próximo do Vencimento");
        assert_eq!(doc.subject, DEFAULT_SUBJECT);

        let body = doc.message.to_plain_text();
        assert!(body.contains("Lease A"));
        assert!(body.contains("7 dias"));

        let summary = doc.contract.unwrap();
        assert_eq!(summary.remaining_days, Some(5));
        assert_eq!(summary.deadline_tier, Some(UrgencyTier::Critical));
        assert_eq!(summary.description, "Não informada");
        assert_eq!(summary.ends_at, "10/01/2025 00:00");
    }

    #[test]
    fn custom_message_replaces_template() {
        let doc = compose(
            &lease("2025-01-10"),
            &NotificationKind::MonthlyReminder,
            Some("Renovar <já>"),
            Some("Aviso"),
            reference(),
        );
        assert_eq!(doc.message, Message::plain("Renovar <já>"));
        assert_eq!(doc.subject, "Aviso");
        assert_eq!(doc.tier, UrgencyTier::Normal);
    }

    #[test]
    fn generic_kind_uses_subject_as_title() {
        let kind = NotificationKind::Generic("aviso_renovacao".into());
        let doc = compose(&lease("2025-01-10"), &kind, None, Some("Renovação"), reference());
        assert_eq!(doc.title, "Renovação");
        assert_eq!(doc.message.to_plain_text(), "Notificação referente ao contrato Lease A.");
    }

    #[test]
    fn composing_twice_is_identical() {
        let contract = lease("2025-01-10T00:00:00Z");
        let a = compose(&contract, &NotificationKind::DailyReminder, None, None, reference());
        let b = compose(&contract, &NotificationKind::DailyReminder, None, None, reference());
        assert_eq!(a, b);
    }

    #[test]
    fn unreadable_end_date_has_no_days() {
        let doc = compose(&lease("em breve"), &NotificationKind::MonthlyReminder, None, None, reference());
        let summary = doc.contract.unwrap();
        assert_eq!(summary.remaining_days, None);
        assert_eq!(summary.deadline_tier, None);
        assert_eq!(summary.ends_at, "em breve");
    }
}
