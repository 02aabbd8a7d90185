use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, with_security_headers, Config};
use crate::handlers::{
    get_stats, get_ticket, get_ticket_image, health_check, invalidate_ticket, issue_ticket,
    list_tickets, redeem_ticket,
};
use crate::state::AppState;

pub fn create_routes(state: AppState, config: &Config) -> Router {
    let api = Router::new()
        .route("/health", get(health_check))
        .route("/tickets", post(issue_ticket).get(list_tickets))
        .route("/tickets/:id", get(get_ticket))
        .route("/tickets/:id/image", get(get_ticket_image))
        .route("/tickets/:id/invalidate", post(invalidate_ticket))
        .route("/tickets/:id/redeem", post(redeem_ticket))
        .route("/stats", get(get_stats))
        .with_state(state);

    with_security_headers(api, config.production)
        .layer(create_cors_layer(config.cors_allowed_origins.as_deref()))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::services::{NotificationDispatcher, SvgQrRenderer};
    use crate::store::{
        InMemoryCounterStore, InMemoryTicketStore, MockTicketStore, StoreError, TicketStore,
    };

    fn app_with(tickets: Arc<dyn TicketStore>) -> Router {
        let state = AppState::new(
            tickets,
            Arc::new(InMemoryCounterStore::new()),
            NotificationDispatcher::disabled(),
            Arc::new(SvgQrRenderer::default()),
        );
        create_routes(state, &Config::default())
    }

    fn app() -> Router {
        app_with(Arc::new(InMemoryTicketStore::new()))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn issue(app: &Router, owner: &str) -> (StatusCode, Value) {
        send(
            app,
            "POST",
            "/tickets",
            Some(json!({ "owner_id": owner, "first_name": "Anna", "username": "anna_k" })),
        )
        .await
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "ok");
    }

    #[tokio::test]
    async fn test_issue_is_created_then_ok_with_same_ticket() {
        let app = app();

        let (first_status, first) = issue(&app, "u1").await;
        let (second_status, second) = issue(&app, "u1").await;

        assert_eq!(first_status, StatusCode::CREATED);
        assert_eq!(second_status, StatusCode::OK);
        assert_eq!(first["data"]["id"], second["data"]["id"]);
        assert_eq!(first["data"]["issued_at"], second["data"]["issued_at"]);
        assert_eq!(first["data"]["status"], "issued");
    }

    #[tokio::test]
    async fn test_issue_rejects_blank_owner() {
        let (status, body) = issue(&app(), "  ").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_redemption_flow_status_codes() {
        let app = app();
        let (_, issued) = issue(&app, "u1").await;
        let id = issued["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, "POST", &format!("/tickets/{}/redeem", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "✅ Success! Anna (@anna_k)");
        assert_eq!(body["data"]["outcome"], "success");

        let (status, body) = send(&app, "POST", &format!("/tickets/{}/redeem", id), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "ALREADY_USED");

        let unknown = uuid::Uuid::new_v4();
        let (status, body) =
            send(&app, "POST", &format!("/tickets/{}/redeem", unknown), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["details"]["counters"]["fail_count"], 2);

        let (status, body) = send(&app, "GET", "/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!({ "success": 1, "fail": 2, "total": 3 }));
    }

    #[tokio::test]
    async fn test_malformed_id_is_rejected_without_counting() {
        let app = app();

        let (status, _) = send(&app, "POST", "/tickets/not-a-uuid/redeem", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&app, "GET", "/stats", None).await;
        assert_eq!(body["data"]["fail"], 0);
    }

    #[tokio::test]
    async fn test_invalidated_ticket_reports_invalid_state() {
        let app = app();
        let (_, issued) = issue(&app, "u1").await;
        let id = issued["data"]["id"].as_str().unwrap().to_string();

        let (status, body) =
            send(&app, "POST", &format!("/tickets/{}/invalidate", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "invalid");

        let (status, body) = send(&app, "POST", &format!("/tickets/{}/redeem", id), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_STATE");
        assert_eq!(body["error"]["message"], "❓ Invalid code status: invalid");

        let (status, _) = send(&app, "POST", &format!("/tickets/{}/invalidate", id), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_get_list_and_image() {
        let app = app();
        let (_, issued) = issue(&app, "u1").await;
        issue(&app, "u2").await;
        let id = issued["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, "GET", &format!("/tickets/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["owner_id"], "u1");

        let (status, body) = send(&app, "GET", "/tickets?skip=0&limit=10", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let (status, _) = send(&app, "GET", "/tickets?limit=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/tickets/{}/image", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");

        let missing = uuid::Uuid::new_v4();
        let (status, _) = send(&app, "GET", &format!("/tickets/{}/image", missing), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_store_failure_is_service_unavailable() {
        let mut store = MockTicketStore::new();
        store
            .expect_get()
            .returning(|_| Err(StoreError::Unresolved("connection reset".to_string())));
        let app = app_with(Arc::new(store));

        let id = uuid::Uuid::new_v4();
        let (status, body) = send(&app, "POST", &format!("/tickets/{}/redeem", id), None).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "STORE_UNAVAILABLE");
        assert_eq!(body["error"]["details"]["retryable"], true);
    }
}
