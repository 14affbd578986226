//! HTTP API router assembly.

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the API router with CORS and request tracing applied.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/alerts", get(handlers::list_alerts))
        .route("/slos", get(handlers::list_slos))
        .route(
            "/silences",
            get(handlers::list_silences).post(handlers::create_silence),
        )
        .route("/silences/{id}", delete(handlers::delete_silence))
        .route("/reload", post(handlers::reload_config));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use chrono::Utc;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tempfile::NamedTempFile;
    use tower::ServiceExt;

    use vigil_config::{ConfigDocument, SharedConfig};
    use vigil_metrics::{InMemoryMetricSource, MetricSource, Sample};
    use vigil_notify::{Dispatcher, DispatcherStats, RetryPolicy};

    use crate::engine::{DispatchWorker, Engine};

    fn config_json() -> Value {
        json!({
            "slis": [{
                "name": "checkout-availability",
                "service": "checkout",
                "good_query": "checkout_ok[{{window}}]",
                "total_query": "checkout_total[{{window}}]",
                "window": "5m"
            }],
            "slos": [{
                "name": "checkout-availability-999",
                "sli": "checkout-availability",
                "target": 0.999,
                "compliance_period": "1h",
                "burn_rules": [{
                    "short_window": "5m",
                    "long_window": "10m",
                    "factor": 14.4,
                    "severity": "critical"
                }]
            }],
            "route": {
                "receiver": "team-chat",
                "group_by": ["alertname", "service"],
                "group_wait": "0s",
                "group_interval": "1m",
                "repeat_interval": "4h"
            },
            "receivers": [{
                "name": "team-chat",
                "send_resolved": true,
                "channels": [{
                    "type": "chat",
                    "webhook_url": "https://chat.example.com/hooks/T0/B0",
                    "channel": "#alerts"
                }]
            }],
            "engine": {
                "tick_interval": "30s",
                "watchdog": { "enabled": false }
            }
        })
    }

    struct Harness {
        state: AppState,
        engine: Arc<Engine>,
        source: InMemoryMetricSource,
        // Holds the queue receiver open so flushes enqueue cleanly.
        _worker: DispatchWorker,
        config_file: NamedTempFile,
    }

    fn harness_at(started_at: chrono::DateTime<Utc>) -> Harness {
        let doc_value = config_json();
        let mut config_file = NamedTempFile::new().unwrap();
        write!(config_file, "{doc_value}").unwrap();

        let document: ConfigDocument = serde_json::from_value(doc_value).unwrap();
        let config = SharedConfig::new(Arc::new(document.validate().unwrap()));

        let source = InMemoryMetricSource::new();
        let dyn_source: Arc<dyn MetricSource> = Arc::new(source.clone());
        let stats = Arc::new(DispatcherStats::new());
        let dispatcher = Dispatcher::new(RetryPolicy::default(), Arc::clone(&stats));
        let (engine, worker) = Engine::new(config.clone(), dyn_source, dispatcher, None, started_at);

        let state = AppState::new(config_file.path(), config, Arc::clone(&engine), stats);
        Harness {
            state,
            engine,
            source,
            _worker: worker,
            config_file,
        }
    }

    fn harness() -> Harness {
        harness_at(Utc::now())
    }

    fn seed_burning(source: &InMemoryMetricSource, at: chrono::DateTime<Utc>) {
        for i in 0..60 {
            let ts = at - chrono::Duration::minutes(i);
            source.record("checkout_ok", Sample::new(ts, 95.0));
            source.record("checkout_total", Sample::new(ts, 100.0));
        }
    }

    async fn request(state: &AppState, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(value) => builder
                .header("content-type", "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(state: &AppState, uri: &str) -> (StatusCode, Value) {
        request(state, Method::GET, uri, None).await
    }

    mod health_tests {
        use super::*;

        #[tokio::test]
        async fn fresh_engine_reports_ok() {
            let harness = harness();
            let (status, body) = get(&harness.state, "/api/health").await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "ok");
            assert_eq!(body["ticks"], 0);
            assert_eq!(body["alerts"], 0);
            assert_eq!(body["notifications"]["notifications_sent"], 0);
        }

        #[tokio::test]
        async fn stalled_engine_reports_503() {
            // Started long ago, never ticked.
            let harness = harness_at(Utc::now() - chrono::Duration::minutes(10));
            let (status, body) = get(&harness.state, "/api/health").await;

            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(body["status"], "stale");
        }

        #[tokio::test]
        async fn tick_brings_a_stalled_engine_back() {
            let harness = harness_at(Utc::now() - chrono::Duration::minutes(10));
            harness.engine.tick(Utc::now()).await;

            let (status, body) = get(&harness.state, "/api/health").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["ticks"], 1);
        }
    }

    mod alert_tests {
        use super::*;

        #[tokio::test]
        async fn empty_store_lists_nothing() {
            let harness = harness();
            let (status, body) = get(&harness.state, "/api/alerts").await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!([]));
        }

        #[tokio::test]
        async fn burning_service_appears_with_state_filter() {
            let harness = harness();
            let now = Utc::now();
            seed_burning(&harness.source, now);
            harness.engine.tick(now).await;

            let (status, body) = get(&harness.state, "/api/alerts").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body.as_array().unwrap().len(), 1);
            assert_eq!(body[0]["labels"]["alertname"], "ErrorBudgetBurn");
            assert_eq!(body[0]["state"], "firing");

            let (status, firing) = get(&harness.state, "/api/alerts?state=firing").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(firing.as_array().unwrap().len(), 1);

            let (status, resolved) = get(&harness.state, "/api/alerts?state=resolved").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(resolved, json!([]));
        }

        #[tokio::test]
        async fn unknown_state_filter_is_rejected() {
            let harness = harness();
            let (status, body) = get(&harness.state, "/api/alerts?state=active").await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "invalid_request");
        }
    }

    mod slo_tests {
        use super::*;

        #[tokio::test]
        async fn budgets_appear_after_the_first_tick() {
            let harness = harness();
            let (_, before) = get(&harness.state, "/api/slos").await;
            assert_eq!(before, json!([]));

            let now = Utc::now();
            seed_burning(&harness.source, now);
            harness.engine.tick(now).await;

            let (status, body) = get(&harness.state, "/api/slos").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body[0]["name"], "checkout-availability-999");
            assert_eq!(body[0]["service"], "checkout");
            assert!(body[0]["budget"]["remaining_ratio"].as_f64().unwrap() < 1.0);
        }
    }

    mod silence_tests {
        use super::*;

        fn silence_request() -> Value {
            json!({
                "matchers": [{"name": "service", "op": "=", "value": "checkout"}],
                "ends_at": Utc::now() + chrono::Duration::hours(2),
                "created_by": "oncall",
                "comment": "planned maintenance"
            })
        }

        #[tokio::test]
        async fn create_list_expire_round_trip() {
            let harness = harness();

            let (status, created) =
                request(&harness.state, Method::POST, "/api/silences", Some(silence_request()))
                    .await;
            assert_eq!(status, StatusCode::CREATED);
            let id = created["id"].as_str().unwrap().to_string();
            assert!(!id.is_empty());
            assert_eq!(created["created_by"], "oncall");

            let (status, listed) = get(&harness.state, "/api/silences").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(listed.as_array().unwrap().len(), 1);

            let (status, expired) = request(
                &harness.state,
                Method::DELETE,
                &format!("/api/silences/{id}"),
                None,
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(expired["id"], id.as_str());

            // Expired silences stay listed until GC.
            let (_, after) = get(&harness.state, "/api/silences").await;
            assert_eq!(after.as_array().unwrap().len(), 1);
        }

        #[tokio::test]
        async fn expiring_a_missing_silence_is_404() {
            let harness = harness();
            let (status, body) = request(
                &harness.state,
                Method::DELETE,
                "/api/silences/no-such-id",
                None,
            )
            .await;

            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body["error"], "not_found");
        }

        #[tokio::test]
        async fn backwards_time_range_is_rejected() {
            let harness = harness();
            let body = json!({
                "matchers": [{"name": "service", "op": "=", "value": "checkout"}],
                "starts_at": "2025-06-01T14:00:00Z",
                "ends_at": "2025-06-01T13:00:00Z",
                "created_by": "oncall"
            });

            let (status, response) =
                request(&harness.state, Method::POST, "/api/silences", Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(response["error"], "invalid_request");
        }
    }

    mod reload_tests {
        use super::*;

        #[tokio::test]
        async fn reload_swaps_in_the_new_document() {
            let harness = harness();
            assert_eq!(harness.state.config().current().objectives[0].target, 0.999);

            let mut updated = config_json();
            updated["slos"][0]["target"] = json!(0.995);
            std::fs::write(harness.config_file.path(), updated.to_string()).unwrap();

            let (status, body) =
                request(&harness.state, Method::POST, "/api/reload", None).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["slos"], 1);
            assert_eq!(body["receivers"], 1);
            assert_eq!(harness.state.config().current().objectives[0].target, 0.995);
        }

        #[tokio::test]
        async fn invalid_document_leaves_config_active() {
            let harness = harness();

            let mut broken = config_json();
            broken["slos"][0]["sli"] = json!("no-such-sli");
            std::fs::write(harness.config_file.path(), broken.to_string()).unwrap();

            let (status, body) =
                request(&harness.state, Method::POST, "/api/reload", None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "invalid_config");
            assert!(body["message"]
                .as_str()
                .unwrap()
                .contains("unknown SLI"));
            assert_eq!(harness.state.config().current().objectives[0].target, 0.999);
        }

        #[tokio::test]
        async fn unparseable_file_is_rejected() {
            let harness = harness();
            std::fs::write(harness.config_file.path(), "{ not json").unwrap();

            let (status, body) =
                request(&harness.state, Method::POST, "/api/reload", None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "invalid_config");
        }
    }
}
