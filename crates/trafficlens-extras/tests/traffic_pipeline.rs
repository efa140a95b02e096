use bytes::Bytes;
use futures_util::stream;
use http::{header, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use trafficlens_core::{
    next_fn, sync_next_fn, Body, BoxError, IntoResponse, Json, LayerStack, PeerAddr, Request,
    Response,
};
use trafficlens_extras::sanitization::{MASK, TRUNCATION_MARKER};
use trafficlens_extras::stats::{RequestSample, StatsAggregator, StatsConfig, StatsHolder, StatsLayer};
use trafficlens_extras::traffic_log::{MemorySink, TrafficLogConfig, TrafficLogLayer};

fn request(method: &str, uri: &str, body: impl Into<Body>) -> Request {
    let mut req: Request = http::Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "api.test")
        .body(body.into())
        .unwrap()
        .into();
    let peer: SocketAddr = "10.0.0.7:51000".parse().unwrap();
    req.extensions_mut().insert(PeerAddr(peer));
    req
}

fn json_request(uri: &str, body: &'static str) -> Request {
    let mut req = request("POST", uri, body);
    req.headers_mut()
        .insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
    req
}

struct Pipeline {
    stack: LayerStack,
    sink: MemorySink,
    holder: Arc<StatsHolder>,
    stats: StatsLayer,
}

fn pipeline(log_config: TrafficLogConfig) -> Pipeline {
    let sink = MemorySink::new(100);
    let holder = Arc::new(StatsHolder::new());
    let stats = StatsLayer::with_holder(StatsConfig::new(), holder.clone());
    let stack = LayerStack::new()
        .layer(TrafficLogLayer::with_config(log_config).sink(sink.clone()))
        .layer(stats.clone());

    Pipeline {
        stack,
        sink,
        holder,
        stats,
    }
}

fn echo() -> trafficlens_core::BoxedNext {
    next_fn(|mut req: Request| async move {
        let body = req.take_body().to_bytes().await?;
        let mut response = Response::new(Body::from(body));
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        Ok::<_, BoxError>(response)
    })
}

#[tokio::test]
async fn full_chain_logs_and_records() {
    let p = pipeline(TrafficLogConfig::new().sensitive_fields(["token"]));

    let response = p
        .stack
        .execute(json_request("/login?page=2", r#"{"token": "abc", "x": 1}"#), echo())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().to_bytes().await.unwrap();
    assert_eq!(body.as_ref(), br#"{"token": "abc", "x": 1}"#);

    let records = p.sink.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record["method"], "POST");
    assert_eq!(record["url"], "http://api.test/login?page=2");
    assert_eq!(record["request"]["params"]["page"], "2");
    assert_eq!(
        record["request"]["request-body"],
        format!(r#"{{"token": "{}", "x": 1}}"#, MASK)
    );
    assert_eq!(
        record["response"]["body"],
        format!(r#"{{"token": "{}", "x": 1}}"#, MASK)
    );
    assert_eq!(record["response"]["response_code"], 200);
    assert_eq!(record["request"]["from"]["ip"], "10.0.0.7");
    assert_eq!(record["request"]["from"]["port"], 51000);

    let samples = p.stats.aggregator().samples();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].url, "http://api.test/login?page=2");
    assert!(p.holder.is_populated());
}

#[tokio::test]
async fn healthcheck_is_neither_logged_nor_recorded() {
    let p = pipeline(TrafficLogConfig::new());
    let handler = sync_next_fn(|_req| Ok("ok".into_response()));

    for _ in 0..3 {
        let response = p
            .stack
            .execute(request("GET", "/healthcheck", ()), handler.clone())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert!(p.sink.is_empty());
    assert_eq!(p.stats.aggregator().window_len(), 0);
    assert!(!p.holder.is_populated());
}

#[tokio::test]
async fn healthcheck_stays_excluded_with_custom_exclusions() {
    let sink = MemorySink::new(10);
    let stats = StatsLayer::with_config(StatsConfig::new().excluded_paths(["/internal"]));
    let stack = LayerStack::new()
        .layer(
            TrafficLogLayer::with_config(TrafficLogConfig::new().excluded_paths(["/internal"]))
                .sink(sink.clone()),
        )
        .layer(stats.clone());
    let handler = sync_next_fn(|_req| Ok("ok".into_response()));

    for path in ["/healthcheck", "/internal", "/public"] {
        stack
            .execute(request("GET", path, ()), handler.clone())
            .await
            .unwrap();
    }

    let urls: Vec<_> = sink
        .records()
        .iter()
        .map(|r| r["url"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(urls, ["http://api.test/public"]);
    let samples = stats.aggregator().samples();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].url, "http://api.test/public");
}

#[tokio::test]
async fn client_ip_precedence_end_to_end() {
    let p = pipeline(TrafficLogConfig::new());
    let handler = sync_next_fn(|_req| Ok("ok".into_response()));

    let mut both = request("GET", "/a", ());
    both.headers_mut()
        .insert("x-real-ip", "1.1.1.1".parse().unwrap());
    both.headers_mut()
        .insert("x-forwarded-for", "2.2.2.2, 3.3.3.3".parse().unwrap());
    p.stack.execute(both, handler.clone()).await.unwrap();

    let mut forwarded = request("GET", "/b", ());
    forwarded
        .headers_mut()
        .insert("x-forwarded-for", "2.2.2.2, 3.3.3.3".parse().unwrap());
    p.stack.execute(forwarded, handler.clone()).await.unwrap();

    p.stack
        .execute(request("GET", "/c", ()), handler.clone())
        .await
        .unwrap();

    let ips: Vec<_> = p
        .sink
        .records()
        .iter()
        .map(|r| r["request"]["from"]["ip"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ips, ["1.1.1.1", "2.2.2.2", "10.0.0.7"]);
}

#[tokio::test]
async fn sensitive_headers_are_masked() {
    let p = pipeline(TrafficLogConfig::new().sensitive_fields(["authorization"]));
    let handler = sync_next_fn(|_req| Ok("ok".into_response()));

    let mut req = request("GET", "/me", ());
    req.headers_mut()
        .insert(header::AUTHORIZATION, "Bearer secret".parse().unwrap());
    p.stack.execute(req, handler).await.unwrap();

    let record = &p.sink.records()[0];
    assert_eq!(record["request"]["request_headers"]["authorization"], MASK);
    assert_eq!(record["request"]["request_headers"]["host"], "api.test");
}

#[tokio::test]
async fn long_bodies_are_truncated() {
    let p = pipeline(TrafficLogConfig::new().max_field_len(10));
    let payload = "x".repeat(50);

    let mut req = request("PUT", "/doc", payload.clone());
    req.headers_mut()
        .insert(header::CONTENT_TYPE, "text/plain".parse().unwrap());
    let response = p.stack.execute(req, echo()).await.unwrap();

    // The handler and the client still see every byte.
    let body = response.into_body().to_bytes().await.unwrap();
    assert_eq!(body.len(), 50);

    let record = &p.sink.records()[0];
    let expected = format!("{}{}", "x".repeat(10), TRUNCATION_MARKER);
    assert_eq!(record["request"]["request-body"], expected);
    assert_eq!(record["response"]["body"], expected);
}

#[tokio::test]
async fn server_errors_use_their_own_cap() {
    let p = pipeline(
        TrafficLogConfig::new()
            .response_body_limit(5)
            .server_error_body_limit(8),
    );
    let handler = sync_next_fn(|req| {
        let status = if req.path() == "/fail" {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::OK
        };
        Ok((status, "abcdefghijklmnop").into_response())
    });

    p.stack
        .execute(request("GET", "/ok", ()), handler.clone())
        .await
        .unwrap();
    p.stack
        .execute(request("GET", "/fail", ()), handler)
        .await
        .unwrap();

    let records = p.sink.records();
    assert_eq!(records[0]["response"]["body"], format!("abcde{}", TRUNCATION_MARKER));
    assert_eq!(records[1]["response"]["body"], format!("abcdefgh{}", TRUNCATION_MARKER));
    assert_eq!(records[1]["response"]["response_code"], 500);

    let report = p.holder.get();
    assert_eq!(report.responses["500"].count, 1);
    assert_eq!(report.responses["500"].last_urls[0].url, "http://api.test/fail");
}

#[tokio::test]
async fn capture_bound_marks_logged_bodies_as_truncated() {
    let p = pipeline(TrafficLogConfig::new().max_capture_bytes(8));
    let chunks: Vec<Result<Bytes, BoxError>> = vec![
        Ok(Bytes::from_static(b"0123")),
        Ok(Bytes::from_static(b"456789ab")),
        Ok(Bytes::from_static(b"cdef")),
    ];

    let mut req = request("POST", "/upload", Body::from_stream(stream::iter(chunks)));
    req.headers_mut()
        .insert(header::CONTENT_TYPE, "text/plain".parse().unwrap());
    let response = p.stack.execute(req, echo()).await.unwrap();

    let body = response.into_body().to_bytes().await.unwrap();
    assert_eq!(body.as_ref(), b"0123456789abcdef");

    let record = &p.sink.records()[0];
    let expected = format!("01234567{}", TRUNCATION_MARKER);
    assert_eq!(record["request"]["request-body"], expected);
    assert_eq!(record["response"]["body"], expected);
}

#[tokio::test]
async fn form_bodies_are_parsed_and_masked() {
    let p = pipeline(TrafficLogConfig::new().sensitive_fields(["password"]));

    let mut req = request("POST", "/signin", "user=bob&password=hunter2");
    req.headers_mut().insert(
        header::CONTENT_TYPE,
        "application/x-www-form-urlencoded".parse().unwrap(),
    );
    p.stack.execute(req, echo()).await.unwrap();

    let record = &p.sink.records()[0];
    assert_eq!(record["request"]["form"]["user"], "bob");
    assert_eq!(record["request"]["form"]["password"], MASK);
}

#[tokio::test]
async fn get_bodies_are_not_captured() {
    let p = pipeline(TrafficLogConfig::new());
    p.stack
        .execute(request("GET", "/items", "ignored"), echo())
        .await
        .unwrap();

    let record = &p.sink.records()[0];
    assert!(record["request"]["request-body"].is_null());
}

#[tokio::test]
async fn binary_and_empty_responses() {
    let p = pipeline(TrafficLogConfig::new());
    let handler = sync_next_fn(|req| {
        if req.path() == "/png" {
            let mut response = Response::new(Body::from(vec![0x89u8, b'P', b'N', b'G']));
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, "image/png".parse().unwrap());
            Ok(response)
        } else {
            Ok(StatusCode::NO_CONTENT.into_response())
        }
    });

    p.stack
        .execute(request("GET", "/png", ()), handler.clone())
        .await
        .unwrap();
    p.stack
        .execute(request("GET", "/empty", ()), handler)
        .await
        .unwrap();

    let records = p.sink.records();
    assert_eq!(records[0]["response"]["body"], "bytes[4]");
    assert!(records[1]["response"]["body"].is_null());
}

#[tokio::test]
async fn handler_sees_streamed_body_unchanged() {
    let p = pipeline(TrafficLogConfig::new());
    let chunks: Vec<Result<Bytes, BoxError>> = vec![
        Ok(Bytes::from_static(b"{\"a\":")),
        Ok(Bytes::from_static(b"1,")),
        Ok(Bytes::from_static(b"\"b\":2}")),
    ];

    let mut req = request("PATCH", "/obj", Body::from_stream(stream::iter(chunks)));
    req.headers_mut()
        .insert(header::CONTENT_TYPE, "application/json".parse().unwrap());

    let seen = next_fn(|mut req: Request| async move {
        let body = req.take_body().to_bytes().await?;
        assert_eq!(body.as_ref(), br#"{"a":1,"b":2}"#);
        Ok::<_, BoxError>(Json(serde_json::json!({"len": body.len()})).into_response())
    });
    let response = p.stack.execute(req, seen).await.unwrap();
    let body = response.into_body().to_bytes().await.unwrap();
    assert_eq!(body.as_ref(), br#"{"len":13}"#);

    assert_eq!(p.sink.records()[0]["request"]["request-body"], r#"{"a":1,"b":2}"#);
}

#[tokio::test]
async fn handler_errors_skip_recording() {
    let p = pipeline(TrafficLogConfig::new());
    let failing = next_fn(|_req| async { Err::<Response, BoxError>("handler exploded".into()) });

    let result = p.stack.execute(request("GET", "/x", ()), failing).await;
    assert!(result.is_err());
    assert!(p.sink.is_empty());
    assert_eq!(p.stats.aggregator().window_len(), 0);
}

#[test]
fn window_of_five_hundred_requests() {
    let holder = Arc::new(StatsHolder::new());
    let aggregator = StatsAggregator::new(StatsConfig::new(), holder.clone());

    for i in 1..=500 {
        aggregator.record(RequestSample::new(
            format!("http://api.test/r/{}", i),
            "GET",
            i as f64,
            200,
        ));
    }

    let stats = aggregator.snapshot();
    assert_eq!(stats.total_requests, 500);
    assert_eq!(stats.avg_response_time, 250.5);
    assert_eq!(stats.max_response_time, 500.0);
    assert_eq!(stats.min_response_time, 1.0);
    let slowest: Vec<f64> = stats.most_long_requests.iter().map(|r| r.elapsed).collect();
    assert_eq!(slowest, [500.0, 499.0, 498.0, 497.0, 496.0]);

    // The 500th request is a multiple of the publish cadence.
    let published = holder.latest().unwrap();
    assert_eq!(published.basic_stats, *stats);
    assert_eq!(published.extended_metrics.total_requests_processed, 500);
    assert_eq!(published.extended_metrics.success_rate_percent, 100.0);

    // One more pushes the oldest sample out.
    aggregator.record(RequestSample::new("http://api.test/r/501", "GET", 501.0, 200));
    let stats = aggregator.snapshot();
    assert_eq!(stats.total_requests, 500);
    assert_eq!(stats.min_response_time, 2.0);
}

#[test]
fn repeated_snapshots_reuse_the_computation() {
    let aggregator = StatsAggregator::new(StatsConfig::new(), Arc::new(StatsHolder::new()));
    for i in 0..10 {
        aggregator.record(RequestSample::new("http://api.test/", "GET", i as f64, 200));
    }

    let first = aggregator.snapshot();
    let computed = aggregator.computation_count();
    for _ in 0..20 {
        let again = aggregator.snapshot();
        assert!(Arc::ptr_eq(&first, &again));
    }
    assert_eq!(aggregator.computation_count(), computed);

    aggregator.record(RequestSample::new("http://api.test/", "GET", 99.0, 200));
    let fresh = aggregator.snapshot();
    assert_eq!(fresh.max_response_time, 99.0);
    assert_eq!(aggregator.computation_count(), computed + 1);
}

#[tokio::test]
async fn stats_report_serves_as_json() {
    let p = pipeline(TrafficLogConfig::new());
    let holder = p.holder.clone();
    let handler = sync_next_fn(move |req| match req.path() {
        "/stats" => Ok(Json(holder.get()).into_response()),
        _ => Ok("ok".into_response()),
    });

    p.stack
        .execute(request("GET", "/work", ()), handler.clone())
        .await
        .unwrap();
    let response = p
        .stack
        .execute(request("GET", "/stats", ()), handler)
        .await
        .unwrap();
    let body = response.into_body().to_bytes().await.unwrap();
    let report: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(report["time"]["basic_stats"]["total_requests"], 1);
    assert_eq!(report["time"]["extended_metrics"]["window_max_size"], 500);
    // /stats itself is excluded from the window.
    assert_eq!(p.stats.aggregator().window_len(), 1);
    // ...but still logged.
    assert_eq!(p.sink.len(), 2);
}
