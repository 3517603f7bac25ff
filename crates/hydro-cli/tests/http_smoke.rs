use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use hydro_report::MemoryStore;
use tower::ServiceExt;

#[tokio::test]
async fn health_ready_metrics_endpoints() {
    let (app, state) = hydro_cli::build_app(Arc::new(MemoryStore::new())).unwrap();

    // /healthz returns 200 and increments a counter
    let res = app
        .clone()
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // /readyz initially 503
    let res = app
        .clone()
        .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    hydro_cli::set_ready(&state, true);

    let res = app
        .clone()
        .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // an API call goes through the request counter too
    let res = app
        .clone()
        .oneshot(Request::builder().uri("/api/v1/groups").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // /metrics returns prometheus text and contains our counter
    let res = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let ct = res.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(ct.starts_with("text/plain"));
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("hydro_requests_total"));
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (app, _state) = hydro_cli::build_app(Arc::new(MemoryStore::new())).unwrap();

    let res = app
        .oneshot(Request::builder().uri("/api/v1/nothing").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
