//! Presentation of a [`NotificationDocument`] as HTML and as plain text.

use crate::compose::{ContractSummary, Message, NotificationDocument, PRODUCT_NAME, Segment};
use crate::deadline::UrgencyTier;

pub trait Render {
    fn render(&self, doc: &NotificationDocument) -> String;
}

/// Both representations of one document, produced together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNotification {
    pub html: String,
    pub text: String,
}

pub fn render_all(doc: &NotificationDocument, dashboard_url: &str) -> RenderedNotification {
    RenderedNotification {
        html: HtmlRenderer::new(dashboard_url).render(doc),
        text: TextRenderer::new(dashboard_url).render(doc),
    }
}

struct Palette {
    primary: &'static str,
    icon: &'static str,
    badge: &'static str,
}

fn palette(tier: UrgencyTier) -> Palette {
    match tier {
        UrgencyTier::Critical => Palette { primary: "#dc2626", icon: "⚠️", badge: "URGENTE" },
        UrgencyTier::Warning => Palette { primary: "#f59e0b", icon: "📅", badge: "AVISO" },
        UrgencyTier::Normal => Palette { primary: "#10b981", icon: "📋", badge: "INFO" },
    }
}

/// (background, foreground) of the remaining-days chip.
fn days_chip_colors(tier: Option<UrgencyTier>) -> (&'static str, &'static str) {
    match tier {
        Some(UrgencyTier::Critical) => ("#fee2e2", "#991b1b"),
        Some(UrgencyTier::Warning) => ("#fef3c7", "#92400e"),
        Some(UrgencyTier::Normal) => ("#d1fae5", "#065f46"),
        None => ("#e2e8f0", "#334155"),
    }
}

fn days_label(days: Option<i64>) -> String {
    match days {
        Some(d) => format!("{d} dias"),
        None => "Indisponível".to_string(),
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// -- HTML --

pub struct HtmlRenderer {
    dashboard_url: String,
}

impl HtmlRenderer {
    pub fn new(dashboard_url: impl Into<String>) -> Self {
        Self { dashboard_url: dashboard_url.into() }
    }

    fn message(&self, message: &Message) -> String {
        message
            .segments
            .iter()
            .map(|s| match s {
                Segment::Text(t) => escape_html(t),
                Segment::Emphasis(t) => format!("<strong>{}</strong>", escape_html(t)),
            })
            .collect()
    }

    fn summary(&self, summary: &ContractSummary, primary: &str) -> String {
        let (chip_bg, chip_fg) = days_chip_colors(summary.deadline_tier);
        let cell = "padding: 8px 0; border-bottom: 1px solid #e2e8f0;";

        let mut rows = String::new();
        for (label, value) in [
            ("Nome", &summary.name),
            ("Descrição", &summary.description),
            ("Data Início", &summary.starts_at),
            ("Data Término", &summary.ends_at),
            ("Status", &summary.status),
        ] {
            rows.push_str(&format!(
                r#"<tr><td style="{cell}"><strong>{label}:</strong></td><td style="{cell}">{}</td></tr>"#,
                escape_html(value)
            ));
        }

        format!(
            r#"<div style="background: #f8fafc; border-radius: 8px; padding: 20px; margin: 20px 0; border-left: 4px solid {primary};">
<h3 style="margin-top: 0; color: #1e293b;">Detalhes do Contrato</h3>
<table style="width: 100%; border-collapse: collapse;">
{rows}<tr><td style="padding: 8px 0;"><strong>Dias Restantes:</strong></td><td style="padding: 8px 0;"><span style="background: {chip_bg}; color: {chip_fg}; padding: 4px 12px; border-radius: 20px; font-weight: bold;">{days}</span></td></tr>
</table>
</div>"#,
            days = days_label(summary.remaining_days),
        )
    }
}

impl Render for HtmlRenderer {
    fn render(&self, doc: &NotificationDocument) -> String {
        let p = palette(doc.tier);
        let details = doc
            .contract
            .as_ref()
            .map(|s| self.summary(s, p.primary))
            .unwrap_or_default();

        format!(
            r#"<!DOCTYPE html>
<html lang="pt-BR">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{subject}</title>
</head>
<body style="font-family: 'Inter', -apple-system, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #334155; margin: 0; padding: 0; background: #eef2ff;">
<div style="max-width: 600px; margin: 40px auto; background: #ffffff; border-radius: 20px; overflow: hidden;">
<div style="background: {primary}; color: #ffffff; padding: 40px 30px; text-align: center;">
<h1 style="font-size: 32px; font-weight: 700; margin: 0;">{icon} {product}</h1>
<p style="opacity: 0.9; font-size: 14px; margin-top: 10px;">Sistema Inteligente de Gerenciamento</p>
</div>
<div style="padding: 40px 30px; background: #f8fafc;">
<h2 style="color: #1e293b; font-size: 24px; font-weight: 700; margin: 0 0 20px 0;">{title}</h2>
<div style="display: inline-block; color: {primary}; border: 1px solid {primary}; padding: 8px 20px; border-radius: 50px; font-weight: 600; font-size: 14px; margin: 10px 0;">{badge}</div>
<div style="font-size: 16px; line-height: 1.7; color: #475569; margin-bottom: 25px;">{message}</div>
{details}
<p style="text-align: center; font-weight: 600;">Esta é uma notificação automática do sistema {product}</p>
<div style="text-align: center;"><a href="{url}" style="display: inline-block; background: {primary}; color: #ffffff; text-decoration: none; padding: 14px 32px; border-radius: 50px; font-weight: 600;">Acessar Dashboard</a></div>
</div>
<div style="text-align: center; padding: 25px 30px; background: #1e293b; color: #cbd5e1; font-size: 13px;">
Esta é uma mensagem automática. Por favor, não responda este e-mail.
</div>
</div>
</body>
</html>
"#,
            subject = escape_html(&doc.subject),
            primary = p.primary,
            icon = p.icon,
            product = escape_html(PRODUCT_NAME),
            title = escape_html(&doc.title),
            badge = p.badge,
            message = self.message(&doc.message),
            url = escape_html(&self.dashboard_url),
        )
    }
}

// -- Plain text --

pub struct TextRenderer {
    dashboard_url: String,
}

impl TextRenderer {
    pub fn new(dashboard_url: impl Into<String>) -> Self {
        Self { dashboard_url: dashboard_url.into() }
    }
}

impl Render for TextRenderer {
    fn render(&self, doc: &NotificationDocument) -> String {
        let mut out = format!(
            "{PRODUCT_NAME} - {}\n\n{}\n\n{}\n",
            doc.subject,
            doc.title,
            doc.message.to_plain_text()
        );

        if let Some(summary) = &doc.contract {
            out.push_str(&format!(
                "\nContrato: {}\nData de Término: {}\nDias Restantes: {}\nStatus: {}\n",
                summary.name,
                summary.ends_at,
                days_label(summary.remaining_days),
                summary.status
            ));
        }

        out.push_str(&format!(
            "\n---\nEsta é uma notificação automática do sistema {PRODUCT_NAME}.\nAcesse: {}",
            self.dashboard_url
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{compose, compose_test_message};
    use chrono::{TimeZone, Utc};
    use contrato_types::models::{Contract, ContractStatus, NotificationKind};
    use uuid::Uuid;

    const URL: &str = "http://localhost:3000";

    fn contract(name: &str) -> Contract {
        let created = Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap();
        Contract {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: name.to_string(),
            description: Some("Aluguel do galpão".to_string()),
            starts_at: "2024-01-10T00:00:00Z".to_string(),
            ends_at: "2025-01-10T00:00:00Z".to_string(),
            status: ContractStatus::Active,
            created_at: created,
            updated_at: created,
        }
    }

    fn doc(name: &str, kind: NotificationKind) -> NotificationDocument {
        let now = Utc.with_ymd_and_hms(2025, 1, 5, 0, 0, 0).unwrap();
        compose(&contract(name), &kind, None, None, now)
    }

    #[test]
    fn html_uses_kind_tier_and_true_days() {
        let html = HtmlRenderer::new(URL).render(&doc("Lease A", NotificationKind::WeeklyReminder));

        assert!(html.contains("#f59e0b"));
        assert!(html.contains("AVISO"));
        assert!(html.contains("<strong>Lease A</strong>"));
        // Remaining-days chip is coloured by the date, not the kind.
        assert!(html.contains("#fee2e2"));
        assert!(html.contains("5 dias"));
        assert!(html.contains("Aluguel do galpão"));
    }

    #[test]
    fn html_escapes_user_text() {
        let html = HtmlRenderer::new(URL).render(&doc("<script>x</script>", NotificationKind::DailyReminder));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;x&lt;/script&gt;"));
    }

    #[test]
    fn text_carries_the_same_content() {
        let d = doc("Lease A", NotificationKind::WeeklyReminder);
        let rendered = render_all(&d, URL);

        assert!(rendered.text.starts_with("CONTRATO+ - Notificação de Contrato - CONTRATO+"));
        assert!(rendered.text.contains(&d.message.to_plain_text()));
        assert!(rendered.text.contains("Data de Término: 10/01/2025 00:00"));
        assert!(rendered.text.contains("Dias Restantes: 5 dias"));
        assert!(rendered.text.contains("Status: ativo"));
        assert!(rendered.text.ends_with(URL));
        assert!(!rendered.text.contains('<'));
    }

    #[test]
    fn test_message_has_no_contract_block() {
        let now = Utc.with_ymd_and_hms(2025, 1, 5, 9, 30, 0).unwrap();
        let rendered = render_all(&compose_test_message("ops@example.com", now), URL);

        assert!(!rendered.text.contains("Contrato:"));
        assert!(rendered.text.contains("ops@example.com"));
        assert!(rendered.html.contains("05/01/2025 09:30:00"));
        assert!(!rendered.html.contains("Detalhes do Contrato"));
    }
}
