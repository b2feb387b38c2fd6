//! HTTP 入口

use std::sync::Arc;

use axum::{Router, extract::State, routing::get};

use crate::demo::{self, Connector};

pub const GREETING: &str = "Hello, World 👋!";

/// 创建路由：`GET /` 执行一次演示流程，然后返回问候语
pub fn create_router<C: Connector + 'static>(connector: C) -> Router {
    Router::new().route("/", get(hello::<C>)).with_state(Arc::new(connector))
}

async fn hello<C: Connector + 'static>(State(connector): State<Arc<C>>) -> &'static str {
    log::info!("running influxdb demo");

    let mut out = std::io::stdout();
    demo::run_with(connector.as_ref(), &mut out).await;

    GREETING
}

#[cfg(test)]
mod test_server {
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use mockito::{Matcher, Server};
    use tower::ServiceExt;

    use crate::{demo::InfluxConnector, test_util::setup};

    use super::{GREETING, create_router};

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn test_hello_with_unreachable_store_impl() {
        setup();
        let app = create_router(InfluxConnector::new("http://127.0.0.1:1"));

        let resp = app.oneshot(get("/")).await.unwrap();
        assert_eq!(StatusCode::OK, resp.status());
        assert!(resp.headers()[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/plain"));

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(GREETING.as_bytes(), &body[..]);
    }

    #[tokio::test]
    async fn test_hello_with_unreachable_store() {
        test_hello_with_unreachable_store_impl().await;
    }

    async fn test_hello_runs_demo_impl() {
        setup();
        let mut server = Server::new_async().await;

        let write_mock = server
            .mock("POST", "/api/v2/write")
            .match_query(Matcher::Any)
            .with_status(204)
            .expect(3)
            .create_async()
            .await;

        let query_mock = server
            .mock("POST", "/api/v2/query")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("\r\n")
            .expect(1)
            .create_async()
            .await;

        let app = create_router(InfluxConnector::new(server.url()));

        let resp = app.oneshot(get("/")).await.unwrap();
        assert_eq!(StatusCode::OK, resp.status());

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!("Hello, World 👋!", String::from_utf8(body.to_vec()).unwrap());

        write_mock.assert_async().await;
        query_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_hello_runs_demo() {
        test_hello_runs_demo_impl().await;
    }

    async fn test_unknown_path_impl() {
        setup();
        let app = create_router(InfluxConnector::new("http://127.0.0.1:1"));

        let resp = app.oneshot(get("/metrics")).await.unwrap();
        assert_eq!(StatusCode::NOT_FOUND, resp.status());
    }

    #[tokio::test]
    async fn test_unknown_path() {
        test_unknown_path_impl().await;
    }
}
