//! Demo widget inventory served by `service-wire serve`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::Method;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use service_wire::binding::{Field, ValidationError};
use service_wire::service::Configurable;
use service_wire::{Endpoint, Record, RouteInfo, Service, ServiceError, ServiceRequest, ServiceResponse};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Widget {
    pub id: u64,
    pub name: String,
    pub qty: u32,
}

/// `GET /widgets/{id}?qty=N` with `X-Token`.
#[derive(Debug, Default)]
pub struct GetWidget {
    pub id: u64,
    pub qty: u32,
    pub token: String,
}

impl Record for GetWidget {
    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::scalar("ID", r#"path:"id" required:"true""#, |r: &Self| &r.id, |r| &mut r.id),
            Field::scalar("Qty", r#"query:"qty""#, |r: &Self| &r.qty, |r| &mut r.qty),
            Field::scalar("Token", r#"header:"X-Token" required:"true""#, |r: &Self| &r.token, |r| &mut r.token),
        ]
    }
}

impl ServiceRequest for GetWidget {
    fn cache_key(&self) -> Option<String> {
        Some(format!("widget:{}:{}", self.id, self.qty))
    }

    fn cache_ttl(&self) -> Option<Duration> {
        Some(Duration::from_secs(5))
    }
}

impl Endpoint for GetWidget {
    fn info() -> RouteInfo {
        RouteInfo {
            name: "get_widget",
            method: Method::GET,
            path: "/widgets/{id}",
            description: "Fetch a widget, optionally checking stock for a quantity",
        }
    }
}

/// Body of `POST /widgets`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewWidget {
    pub name: String,
    pub qty: u32,
}

#[derive(Debug, Default)]
pub struct CreateWidget {
    pub token: String,
    pub widget: NewWidget,
}

impl Record for CreateWidget {
    fn fields() -> Vec<Field<Self>> {
        vec![
            Field::scalar("Token", r#"request:"header!" alias:"X-Token""#, |r: &Self| &r.token, |r| &mut r.token),
            Field::document("Widget", r#"request:"form!" json:"widget""#, |r: &Self| &r.widget, |r| &mut r.widget),
        ]
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.widget.name.trim().is_empty() {
            return Err(ValidationError::new("widget name must not be empty"));
        }
        Ok(())
    }
}

impl ServiceRequest for CreateWidget {}

impl Endpoint for CreateWidget {
    fn info() -> RouteInfo {
        RouteInfo {
            name: "create_widget",
            method: Method::POST,
            path: "/widgets",
            description: "Add a widget to the inventory",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetReply {
    #[serde(flatten)]
    pub widget: Widget,
    #[serde(skip, default = "ok_status")]
    pub status: u16,
}

fn ok_status() -> u16 {
    200
}

impl ServiceResponse for WidgetReply {
    fn status_code(&self) -> u16 {
        self.status
    }
}

/// `[custom]` settings of the inventory.
#[derive(Debug, Default, Deserialize)]
pub struct InventoryConfig {
    /// Largest stock a single create may add.
    #[serde(default)]
    pub max_qty: Option<u32>,
}

/// In-memory inventory.
#[derive(Default)]
pub struct Inventory {
    widgets: DashMap<u64, Widget>,
    next_id: AtomicU64,
    max_qty: Option<u32>,
}

impl Configurable for Inventory {
    type Config = InventoryConfig;

    fn set_config(&mut self, config: InventoryConfig) {
        self.max_qty = config.max_qty;
    }
}

impl Inventory {
    pub fn seeded() -> Self {
        let inventory = Self::default();
        inventory.insert("sprocket".to_string(), 12);
        inventory.insert("flange".to_string(), 3);
        inventory
    }

    fn insert(&self, name: String, qty: u32) -> Widget {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let widget = Widget { id, name, qty };
        self.widgets.insert(id, widget.clone());
        widget
    }
}

#[async_trait]
impl Service<GetWidget, WidgetReply> for Inventory {
    async fn execute(&self, request: GetWidget) -> Result<WidgetReply, ServiceError> {
        let widget = self
            .widgets
            .get(&request.id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::coded(404, format!("widget {} not found", request.id)))?;

        if request.qty > widget.qty {
            return Err(ServiceError::coded(
                409,
                format!("only {} of widget {} in stock", widget.qty, widget.id),
            ));
        }
        Ok(WidgetReply { widget, status: 200 })
    }

    fn expected_statuses(&self) -> Option<Vec<u16>> {
        Some(vec![200])
    }
}

#[async_trait]
impl Service<CreateWidget, WidgetReply> for Inventory {
    async fn execute(&self, request: CreateWidget) -> Result<WidgetReply, ServiceError> {
        if let Some(max) = self.max_qty.filter(|max| request.widget.qty > *max) {
            return Err(ServiceError::coded(
                422,
                format!("qty {} exceeds the limit of {max}", request.widget.qty),
            ));
        }
        let widget = self.insert(request.widget.name, request.widget.qty);
        Ok(WidgetReply { widget, status: 201 })
    }

    fn expected_statuses(&self) -> Option<Vec<u16>> {
        Some(vec![201])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(qty: u32) -> CreateWidget {
        CreateWidget {
            token: "t".into(),
            widget: NewWidget {
                name: "gear".into(),
                qty,
            },
        }
    }

    #[tokio::test]
    async fn test_configured_limit_caps_creates() {
        let mut inventory = Inventory::seeded();
        inventory.set_config(InventoryConfig { max_qty: Some(10) });

        let reply = inventory.execute(create(10)).await.unwrap();
        assert_eq!(reply.status, 201);
        let err = inventory.execute(create(11)).await.unwrap_err();
        assert_eq!(err.status(), 422);
    }
}
