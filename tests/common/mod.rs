//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::routing::any;
use axum::Router;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower::ServiceExt;

use service_wire::binding::{BindError, Field, JsonBody, ValidationError};
use service_wire::{
    BootConfig, Endpoint, HttpServer, Record, RequestDecoder, RouteInfo, Service, ServiceError,
    ServiceRequest, ServiceResponse, Shutdown,
};

/// `GET /items/{id}?qty=N` with a required `X-Token` header.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GetItem {
    pub id: i64,
    pub qty: i64,
    pub token: String,
}

impl Record for GetItem {
    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::scalar("ID", r#"path:"id""#, |r: &Self| &r.id, |r| &mut r.id),
            Field::scalar("Qty", r#"query:"qty""#, |r: &Self| &r.qty, |r| &mut r.qty),
            Field::scalar("Token", r#"header:"X-Token" required:"true""#, |r: &Self| &r.token, |r| &mut r.token),
        ]
    }
}

impl ServiceRequest for GetItem {
    fn cache_key(&self) -> Option<String> {
        Some(format!("item:{}:{}", self.id, self.qty))
    }
}

impl Endpoint for GetItem {
    fn info() -> RouteInfo {
        RouteInfo {
            name: "get_item",
            method: Method::GET,
            path: "/items/{id}",
            description: "Fetch one item",
        }
    }
}

/// `POST /items` carrying the whole record as JSON.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CreateItem {
    pub name: String,
    pub qty: i64,
}

impl Record for CreateItem {
    fn json_body() -> Option<JsonBody<Self>> {
        Some(JsonBody::new())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.is_empty() {
            return Err(ValidationError::new("name is required"));
        }
        Ok(())
    }

    fn client_validation() -> bool {
        false
    }
}

impl ServiceRequest for CreateItem {}

impl Endpoint for CreateItem {
    fn info() -> RouteInfo {
        RouteInfo {
            name: "create_item",
            method: Method::POST,
            path: "/items",
            description: "Store one item",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub qty: i64,
    #[serde(skip)]
    pub status: u16,
}

impl ServiceResponse for Item {
    fn status_code(&self) -> u16 {
        if self.status == 0 {
            200
        } else {
            self.status
        }
    }
}

/// Item store counting how often the business logic actually runs.
#[derive(Default)]
pub struct Catalog {
    items: DashMap<i64, Item>,
    pub calls: AtomicU32,
}

impl Catalog {
    pub fn with_items(items: &[(i64, &str)]) -> Arc<Self> {
        let catalog = Self::default();
        for (id, name) in items {
            catalog.items.insert(
                *id,
                Item {
                    id: *id,
                    name: name.to_string(),
                    qty: 0,
                    status: 200,
                },
            );
        }
        Arc::new(catalog)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Service<GetItem, Item> for Catalog {
    async fn execute(&self, request: GetItem) -> Result<Item, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut item = self
            .items
            .get(&request.id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::coded(404, format!("item {} not found", request.id)))?;
        item.qty = request.qty;
        Ok(item)
    }

    fn expected_statuses(&self) -> Option<Vec<u16>> {
        Some(vec![200])
    }
}

#[async_trait]
impl Service<CreateItem, Item> for Catalog {
    async fn execute(&self, request: CreateItem) -> Result<Item, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let id = self.items.len() as i64 + 1;
        let item = Item {
            id,
            name: request.name,
            qty: request.qty,
            status: 201,
        };
        self.items.insert(id, item.clone());
        Ok(item)
    }
}

/// A server listening on an ephemeral local port.
pub struct TestServer {
    pub base_url: String,
    pub shutdown: Shutdown,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Bind an ephemeral port and serve `server` in the background.
pub async fn spawn_server(server: HttpServer) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let signal = shutdown.clone();
    tokio::spawn(async move {
        server.run(listener, signal).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{addr}"),
        shutdown,
    }
}

/// Configuration with defaults suitable for tests.
pub fn test_config() -> BootConfig {
    let mut config = BootConfig::default();
    config.server.bind_address = "127.0.0.1:0".to_string();
    config
}

/// Serve `request` from a router holding only `template` and decode it in the handler.
pub async fn decode_routed<R: Record>(template: &str, request: Request<Body>) -> Result<R, BindError> {
    let slot: Arc<Mutex<Option<Result<R, BindError>>>> = Arc::default();
    let sink = Arc::clone(&slot);
    let router = Router::new().route(
        template,
        any(move |request: Request<Body>| {
            let sink = Arc::clone(&sink);
            async move {
                let decoded = RequestDecoder::<R>::new().unwrap().decode_routed(request).await;
                *sink.lock().unwrap() = Some(decoded.map_err(|rejected| rejected.error));
                StatusCode::NO_CONTENT
            }
        }),
    );

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT, "request did not reach {template}");
    let decoded = slot.lock().unwrap().take();
    decoded.unwrap()
}

/// Replay an encoded client request as an inbound server request.
pub fn to_inbound(request: &reqwest::Request) -> Request<Body> {
    let target = match request.url().query() {
        Some(query) => format!("{}?{}", request.url().path(), query),
        None => request.url().path().to_string(),
    };
    let mut builder = Request::builder().method(request.method().clone()).uri(target);
    for (name, value) in request.headers() {
        builder = builder.header(name, value);
    }
    let body = request
        .body()
        .and_then(|body| body.as_bytes())
        .map(|bytes| Body::from(bytes.to_vec()))
        .unwrap_or_else(Body::empty);
    builder.body(body).unwrap()
}
