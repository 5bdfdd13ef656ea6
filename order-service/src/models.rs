use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "rejected" => Ok(OrderStatus::Rejected),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: String,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: String,
    pub quantity: i32,
    pub price: BigDecimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: String,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: i32,
    pub price: BigDecimal,
}

impl Order {
    /// A fresh pending order with ids assigned to it and its items.
    pub fn pending(request: &CreateOrderRequest) -> Self {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let items = request
            .items
            .iter()
            .map(|item| OrderItem {
                id: Uuid::new_v4(),
                order_id: id,
                product_id: item.product_id.clone(),
                quantity: item.quantity,
                price: item.price.clone(),
            })
            .collect();

        Self {
            id,
            user_id: request.user_id.clone(),
            status: OrderStatus::Pending,
            items,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Insertable)]
#[diesel(table_name = crate::schema::orders)]
pub struct OrderRow {
    pub id: Uuid,
    pub user_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Insertable, Associations)]
#[diesel(belongs_to(OrderRow, foreign_key = order_id))]
#[diesel(table_name = crate::schema::order_items)]
pub struct OrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub position: i32,
    pub product_id: String,
    pub quantity: i32,
    pub price: BigDecimal,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id.clone(),
            status: order.status.as_str().to_string(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

impl OrderItemRow {
    /// `position` keeps line items in the order they were submitted.
    pub fn new(position: i32, item: &OrderItem) -> Self {
        Self {
            id: item.id,
            order_id: item.order_id,
            position,
            product_id: item.product_id.clone(),
            quantity: item.quantity,
            price: item.price.clone(),
        }
    }
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            quantity: row.quantity,
            price: row.price,
        }
    }
}

impl TryFrom<(OrderRow, Vec<OrderItemRow>)> for Order {
    type Error = String;

    fn try_from((row, items): (OrderRow, Vec<OrderItemRow>)) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            status: row.status.parse()?,
            items: items.into_iter().map(OrderItem::from).collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
