use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{food_bank, food_logs, profiles, sessions};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(sessions::router())
                .merge(food_logs::router())
                .merge(profiles::router())
                .merge(food_bank::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{claims::TokenKind, jwt::sign_for_tests};
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    struct Client {
        app: Router,
        token: String,
    }

    impl Client {
        fn new() -> Self {
            let state = AppState::fake();
            let token = sign_for_tests(&state.config.jwt, Uuid::new_v4(), TokenKind::Access);
            Self {
                app: build_app(state),
                token,
            }
        }

        async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let mut req = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", self.token));
            let body = match body {
                Some(v) => {
                    req = req.header(header::CONTENT_TYPE, "application/json");
                    Body::from(v.to_string())
                }
                None => Body::empty(),
            };
            let res = self.app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
            let status = res.status();
            let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
            let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, value)
        }
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn requests_without_token_are_rejected() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/api/v1/food-logs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn parse_then_commit_once() {
        let client = Client::new();
        let (status, session) = client
            .call(
                Method::POST,
                "/api/v1/parse-sessions",
                Some(json!({
                    "text": "I had 2 cups of oatmeal with 1 banana for breakfast at 8am",
                    "wait": true
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["status"], "completed");
        assert_eq!(session["parsed_dishes"].as_array().unwrap().len(), 2);
        assert_eq!(session["meal_type"], "breakfast");

        let id = session["id"].as_str().unwrap();
        let (status, logs) = client
            .call(Method::POST, &format!("/api/v1/parse-sessions/{id}/commit"), None)
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(logs.as_array().unwrap().len(), 2);

        let (status, err) = client
            .call(Method::POST, &format!("/api/v1/parse-sessions/{id}/commit"), None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["code"], "ALREADY_MATERIALIZED");

        let (status, _) = client
            .call(Method::POST, &format!("/api/v1/parse-sessions/{id}/cancel"), None)
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn submit_returns_accepted_and_gibberish_is_refused() {
        let client = Client::new();
        let (status, body) = client
            .call(
                Method::POST,
                "/api/v1/parse-sessions",
                Some(json!({ "text": "a bowl of rice and grilled chicken" })),
            )
            .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "pending");

        let (status, body) = client
            .call(
                Method::POST,
                "/api/v1/parse-sessions",
                Some(json!({ "text": "asdkjh qwezxc mnbvcx poiuyt lkjhgf" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_INPUT");
        assert!(!body["suggestions"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let client = Client::new();
        let (status, body) = client
            .call(
                Method::GET,
                &format!("/api/v1/parse-sessions/{}", Uuid::new_v4()),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn food_bank_needs_a_profile() {
        let client = Client::new();
        let (status, _) = client.call(Method::GET, "/api/v1/food-bank/week", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = client
            .call(
                Method::PUT,
                "/api/v1/profile",
                Some(json!({
                    "gender": "female",
                    "height_cm": 165.0,
                    "weight_kg": 60.0,
                    "age": 25,
                    "activity_level": "sedentary",
                    "goal": "lose_weight"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, summary) = client.call(Method::GET, "/api/v1/food-bank/week", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["days"], 7);
        assert_eq!(summary["completion_rate"], 0.0);

        let (status, _) = client.call(Method::GET, "/api/v1/food-bank/year", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn manual_log_can_be_added_listed_and_removed() {
        let client = Client::new();
        let (status, log) = client
            .call(
                Method::POST,
                "/api/v1/food-logs",
                Some(json!({
                    "description": "homemade lentil soup",
                    "nutrition": { "macros": { "calories_kcal": { "amount": 310.0, "unit": "kcal" } } },
                    "meal_type": "dinner"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(log["source"], "manual");
        assert_eq!(log["session_id"], Value::Null);

        let (status, logs) = client.call(Method::GET, "/api/v1/food-logs", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(logs.as_array().unwrap().len(), 1);

        let id = log["id"].as_str().unwrap();
        let (status, _) = client
            .call(Method::DELETE, &format!("/api/v1/food-logs/{id}"), None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = client
            .call(
                Method::POST,
                "/api/v1/food-logs",
                Some(json!({ "description": "" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn deleting_a_missing_log_is_not_found() {
        let client = Client::new();
        let (status, _) = client
            .call(
                Method::DELETE,
                &format!("/api/v1/food-logs/{}", Uuid::new_v4()),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, logs) = client.call(Method::GET, "/api/v1/food-logs", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(logs.as_array().unwrap().is_empty());
    }
}
