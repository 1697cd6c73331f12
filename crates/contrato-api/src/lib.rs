//! HTTP surface of Contrato+: authentication, contract management, the
//! notify flow and the dashboard, as one axum [`Router`].

pub mod auth;
pub mod contracts;
pub mod dashboard;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod notifications;
pub mod profile;
pub mod state;
pub mod system;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};
use tracing::error;

pub use error::ApiError;
pub use state::{AppState, AppStateInner, InFlight};

/// Run blocking work (SQLite, Argon2, SMTP) off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!("blocking task failed: {}", e))
    })?
}

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/health", get(system::health))
        .route("/api/system/health", get(system::health));

    let protected_routes = Router::new()
        .route("/api/auth/check", get(auth::check))
        .route(
            "/api/contratos",
            get(contracts::list_contracts).post(contracts::create_contract),
        )
        .route("/api/contratos/recentes", get(contracts::recent_contracts))
        .route(
            "/api/sistema/reset",
            post(contracts::clear_contracts).delete(contracts::clear_contracts),
        )
        .route(
            "/api/contratos/limpar",
            post(contracts::clear_contracts).delete(contracts::clear_contracts),
        )
        .route(
            "/api/contratos/{id}",
            get(contracts::get_contract)
                .put(contracts::update_contract)
                .delete(contracts::delete_contract),
        )
        .route("/api/contratos/{id}/status", put(contracts::update_status))
        .route("/api/contratos/{id}/notificar", post(notifications::notify))
        .route("/api/notificacoes", get(notifications::list_notifications))
        .route("/api/notificacoes/count", get(notifications::count_notifications))
        .route("/api/notificacoes/recentes", get(notifications::recent_notifications))
        .route(
            "/api/notificacoes/limpar",
            post(notifications::clear_notifications).delete(notifications::clear_notifications),
        )
        .route("/api/dashboard/stats", get(dashboard::stats))
        .route("/api/dashboard/contratos-vencendo", get(dashboard::expiring_this_week))
        .route("/api/dashboard/destinatarios-ativos", get(dashboard::active_recipients))
        .route(
            "/api/configuracoes/perfil",
            get(profile::get_profile).put(profile::update_profile),
        )
        .route("/api/email/test", post(system::send_test_email))
        .route("/api/test-email/send-test", post(system::send_test_email))
        .route("/api/utils/calcular-dias/{data_fim}", get(system::calculate_days))
        .route("/api/utils/verificar-email/{email}", get(system::check_email))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex};

    use contrato_db::Database;
    use contrato_notify::{Dispatcher, MailError, Mailer, OutboundEmail};

    use crate::state::{AppState, AppStateInner};

    #[derive(Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<OutboundEmail>>,
    }

    impl RecordingMailer {
        pub fn sent(&self) -> Vec<OutboundEmail> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Mailer for RecordingMailer {
        fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    pub struct FailingMailer;

    impl Mailer for FailingMailer {
        fn send(&self, _email: &OutboundEmail) -> Result<(), MailError> {
            Err(MailError::Smtp("connection refused".into()))
        }
    }

    pub fn app_state(mailer: Arc<dyn Mailer>) -> AppState {
        Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            dispatcher: Dispatcher::new(mailer),
            jwt_secret: "test-secret".into(),
            public_url: "http://localhost:3000".into(),
            in_flight: Default::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex, OnceLock};

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use uuid::Uuid;

    use contrato_notify::{MailError, Mailer, OutboundEmail};

    use super::*;
    use crate::test_support::{FailingMailer, RecordingMailer, app_state};

    async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                req = req.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn register(app: &Router, email: &str) -> String {
        let (status, body) = call(
            app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "nome_completo": "Ana Souza", "email": email, "senha": "s3nha-forte" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_lease(app: &Router, token: &str) -> String {
        let (status, body) = call(
            app,
            "POST",
            "/api/contratos",
            Some(token),
            Some(json!({
                "nome": "Lease A",
                "data_inicio": "2030-01-10",
                "data_fim": "2031-01-10T00:00:00Z",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["contrato"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = router(app_state(Arc::new(RecordingMailer::default())));
        let (status, body) = call(&app, "GET", "/api/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"]["tabelas_faltando"], json!([]));
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        let app = router(app_state(Arc::new(RecordingMailer::default())));

        let (status, body) = call(&app, "GET", "/api/contratos", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _) = call(&app, "GET", "/api/contratos", Some("not-a-jwt"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_login_and_duplicate_email() {
        let app = router(app_state(Arc::new(RecordingMailer::default())));
        register(&app, "ana@example.com").await;

        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "nome_completo": "Outra", "email": "ana@example.com", "senha": "s3nha-forte" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "Email já cadastrado");

        let (status, _) = call(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ana@example.com", "senha": "errada-123" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ana@example.com", "senha": "s3nha-forte" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap();

        let (status, body) = call(&app, "GET", "/api/auth/check", Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "ana@example.com");
    }

    #[tokio::test]
    async fn failed_delivery_is_reported_and_recorded() {
        let app = router(app_state(Arc::new(FailingMailer)));
        let token = register(&app, "ana@example.com").await;
        let id = create_lease(&app, &token).await;

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/contratos/{id}/notificar"),
            Some(&token),
            Some(json!({ "emails": ["ops@x.io"], "tipo": "lembrete_semanal" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["success"], false);
        assert_eq!(body["notificacao"]["status"], "erro");
        assert!(body["notificacao"]["data_envio"].is_null());

        let (_, body) = call(&app, "GET", "/api/notificacoes", Some(&token), None).await;
        let rows = body["notificacoes"].as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["contrato_nome"], "Lease A");
        assert_eq!(rows[0]["email_destino"], "ops@x.io");
    }

    #[tokio::test]
    async fn invalid_recipient_leaves_no_trace() {
        let app = router(app_state(Arc::new(RecordingMailer::default())));
        let token = register(&app, "ana@example.com").await;
        let id = create_lease(&app, &token).await;

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/contratos/{id}/notificar"),
            Some(&token),
            Some(json!({ "emails": ["a@b.com", "bad-email"], "tipo": "lembrete_semanal" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Email inválido: bad-email");

        let (_, body) = call(&app, "GET", "/api/notificacoes/count", Some(&token), None).await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn contracts_of_other_users_are_invisible() {
        let app = router(app_state(Arc::new(RecordingMailer::default())));
        let owner = register(&app, "ana@example.com").await;
        let stranger = register(&app, "bruno@example.com").await;
        let id = create_lease(&app, &owner).await;

        let (status, _) = call(&app, "GET", &format!("/api/contratos/{id}"), Some(&stranger), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(
            &app,
            "POST",
            &format!("/api/contratos/{id}/notificar"),
            Some(&stranger),
            Some(json!({ "emails": "a@b.com", "tipo": "lembrete_diario" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, "DELETE", &format!("/api/contratos/{id}"), Some(&stranger), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, "GET", &format!("/api/contratos/{id}"), Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn contract_lifecycle() {
        let app = router(app_state(Arc::new(RecordingMailer::default())));
        let token = register(&app, "ana@example.com").await;
        let id = create_lease(&app, &token).await;

        let (status, body) = call(
            &app,
            "PUT",
            &format!("/api/contratos/{id}"),
            Some(&token),
            Some(json!({ "data_fim": "2029-01-01" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

        let (status, body) = call(
            &app,
            "PUT",
            &format!("/api/contratos/{id}/status"),
            Some(&token),
            Some(json!({ "status": "encerrado" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["contrato"]["status"], "encerrado");

        let (_, body) = call(&app, "GET", "/api/dashboard/stats", Some(&token), None).await;
        assert_eq!(body["stats"]["total_contratos"], 1);
        assert_eq!(body["stats"]["contratos_ativos"], 0);

        let (status, _) = call(&app, "DELETE", &format!("/api/contratos/{id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(&app, "GET", "/api/contratos", Some(&token), None).await;
        assert_eq!(body["contratos"], json!([]));
    }

    #[tokio::test]
    async fn blank_description_on_update_keeps_the_stored_one() {
        let app = router(app_state(Arc::new(RecordingMailer::default())));
        let token = register(&app, "ana@example.com").await;
        let id = create_lease(&app, &token).await;

        let (status, body) = call(
            &app,
            "PUT",
            &format!("/api/contratos/{id}"),
            Some(&token),
            Some(json!({ "descricao": "Galpão 3" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["contrato"]["descricao"], "Galpão 3");

        let (status, body) = call(
            &app,
            "PUT",
            &format!("/api/contratos/{id}"),
            Some(&token),
            Some(json!({ "descricao": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["contrato"]["descricao"], "Galpão 3");
    }

    #[tokio::test]
    async fn legacy_route_aliases() {
        let mailer = Arc::new(RecordingMailer::default());
        let app = router(app_state(mailer.clone()));

        let (status, body) = call(&app, "GET", "/api/system/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let token = register(&app, "ana@example.com").await;
        create_lease(&app, &token).await;

        let (status, body) = call(
            &app,
            "POST",
            "/api/test-email/send-test",
            Some(&token),
            Some(json!({ "email": "ops@x.io" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(mailer.sent().len(), 1);

        let (status, _) = call(&app, "POST", "/api/sistema/reset", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(&app, "DELETE", "/api/sistema/reset", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removidos"], 1);
    }

    /// Tries to delete the contract it is delivering for, from inside `send`.
    #[derive(Default)]
    struct DeletingMailer {
        target: OnceLock<(AppState, Uuid, Uuid)>,
        attempts: Mutex<Vec<StatusCode>>,
    }

    impl Mailer for DeletingMailer {
        fn send(&self, _email: &OutboundEmail) -> Result<(), MailError> {
            if let Some((state, owner, id)) = self.target.get() {
                let single = contracts::remove_contract(state, *owner, *id);
                let all = state
                    .in_flight
                    .unless_owner_sending(*owner, || Ok(state.db.delete_all_contracts(*owner)?));
                let mut attempts = self.attempts.lock().unwrap();
                attempts.push(single.err().map_or(StatusCode::OK, |e| e.status()));
                attempts.push(all.err().map_or(StatusCode::OK, |e| e.status()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn contract_cannot_be_deleted_while_its_notification_is_sent() {
        let mailer = Arc::new(DeletingMailer::default());
        let state = app_state(mailer.clone());
        let app = router(state.clone());
        let token = register(&app, "ana@example.com").await;
        let id = create_lease(&app, &token).await;

        let (_, body) = call(&app, "GET", "/api/auth/check", Some(&token), None).await;
        let owner: Uuid = body["user"]["id"].as_str().unwrap().parse().unwrap();
        assert!(mailer.target.set((state.clone(), owner, id.parse().unwrap())).is_ok());

        let (status, body) = call(
            &app,
            "POST",
            &format!("/api/contratos/{id}/notificar"),
            Some(&token),
            Some(json!({ "emails": "ops@x.io", "tipo": "lembrete_diario" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["notificacao"]["status"], "enviado");
        assert_eq!(*mailer.attempts.lock().unwrap(), [StatusCode::CONFLICT, StatusCode::CONFLICT]);
        assert!(!state.in_flight.is_busy(id.parse().unwrap()));

        let (_, body) = call(&app, "GET", "/api/notificacoes/count", Some(&token), None).await;
        assert_eq!(body["count"], 1);

        let (status, _) = call(&app, "DELETE", &format!("/api/contratos/{id}"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&app, "GET", "/api/notificacoes/count", Some(&token), None).await;
        assert_eq!(body["count"], 0);
    }
}
