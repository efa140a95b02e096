//! TrafficLens demo server
//!
//! Wires the traffic logger and the stats layer in front of a few routes:
//!
//! - `GET /healthcheck` - liveness, never logged or recorded
//! - `GET /stats` - the holder's current report
//! - `POST /echo` - returns the request body
//! - `GET /slow?ms=250` - sleeps before answering
//! - `GET /boom` - answers 500
//!
//! Run with: cargo run -p traffic-demo
//! Then try: curl -X POST -H 'content-type: application/json' \
//!   -d '{"password": "hunter2", "user": "bob"}' http://127.0.0.1:8080/echo

use http::{header, Method, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use trafficlens_core::{next_fn, BoxError, IntoResponse, Json, LayerStack, Request, Response, Server};
use trafficlens_extras::stats::{StatsConfig, StatsHolder, StatsLayer};
use trafficlens_extras::traffic_log::{TrafficLogConfig, TrafficLogLayer};
use trafficlens_extras::{load_dotenv, ConfigError};

async fn route(req: Request, holder: Arc<StatsHolder>) -> Result<Response, BoxError> {
    let method = req.method().clone();
    let path = req.path().to_string();

    match (method, path.as_str()) {
        (Method::GET, "/healthcheck") => Ok("ok".into_response()),
        (Method::GET, "/stats") => Ok(Json(holder.to_json()?).into_response()),
        (Method::POST, "/echo") => echo(req).await,
        (Method::GET, "/slow") => {
            let ms = req
                .query_string()
                .and_then(|q| q.strip_prefix("ms="))
                .and_then(|ms| ms.parse().ok())
                .unwrap_or(200);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(format!("slept {}ms", ms).into_response())
        }
        (Method::GET, "/boom") => Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": "boom"})),
        )
            .into_response()),
        _ => Ok((StatusCode::NOT_FOUND, "not found").into_response()),
    }
}

async fn echo(mut req: Request) -> Result<Response, BoxError> {
    let content_type = req.headers().get(header::CONTENT_TYPE).cloned();
    let body = req.take_body().to_bytes().await?;

    let mut response = Response::new(body.into());
    if let Some(content_type) = content_type {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_type);
    }
    Ok(response)
}

fn configs() -> Result<(TrafficLogConfig, StatsConfig), ConfigError> {
    let mut log_config = TrafficLogConfig::from_env()?;
    if log_config.sanitizer().fields().is_empty() {
        log_config = log_config.sensitive_fields(["password", "token", "authorization", "cookie"]);
    }
    Ok((log_config, StatsConfig::from_env()?))
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (log_config, stats_config) = configs()?;
    let holder = Arc::new(StatsHolder::new());

    let layers = LayerStack::new()
        .layer(TrafficLogLayer::with_config(log_config))
        .layer(StatsLayer::with_holder(stats_config, holder.clone()));

    let handler = next_fn(move |req| route(req, holder.clone()));

    tracing::info!("try POST /echo, GET /slow, GET /boom, then GET /stats");
    Server::new(layers, handler).run("127.0.0.1:8080").await
}
