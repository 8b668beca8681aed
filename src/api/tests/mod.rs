use super::*;
use crate::depot::test_helpers::{TestDepot, create_test_depot};
use crate::types::{TaskId, TaskInfo, TaskState};
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tower::ServiceExt;


/// Test depot plus a router over it
struct TestApi {
    td: TestDepot,
    app: Router,
}

async fn create_test_api() -> TestApi {
    let td = create_test_depot().await;
    let depot = Arc::new(td.depot.clone());
    let app = create_router(depot.clone(), depot.get_config());
    TestApi { td, app }
}

impl TestApi {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::delete(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post_empty(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::post(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn send_json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Poll GET /tasks/:id until the task is terminal
    async fn wait_for_task(&self, id: TaskId) -> TaskInfo {
        for _ in 0..500 {
            let (status, body) = self.get(&format!("/tasks/{}", id)).await;
            assert_eq!(status, StatusCode::OK);
            let task: TaskInfo = serde_json::from_value(body).unwrap();
            if task.state.is_terminal() {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {} did not finish", id);
    }
}

#[tokio::test]
async fn api_server_spawns() {
    let td = create_test_depot().await;
    let mut config = (*td.depot.get_config()).clone();
    // Port 0 = OS assigns a free port
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();

    let api_handle = tokio::spawn(start_api_server(
        Arc::new(td.depot.clone()),
        Arc::new(config),
    ));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!api_handle.is_finished(), "server exited early");
    api_handle.abort();
}

#[tokio::test]
async fn cors_headers_present_when_enabled() {
    let api = create_test_api().await;

    let response = api
        .app
        .clone()
        .oneshot(
            Request::get("/health")
                .header("Origin", "http://example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn cors_headers_absent_when_disabled() {
    let td = create_test_depot().await;
    let mut config = (*td.depot.get_config()).clone();
    config.api.cors_enabled = false;
    let app = create_router(Arc::new(td.depot.clone()), Arc::new(config));

    let response = app
        .oneshot(
            Request::get("/health")
                .header("Origin", "http://example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn unknown_route_is_404() {
    let api = create_test_api().await;
    let (status, _) = api.get("/widgets").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
