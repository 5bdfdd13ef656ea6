use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::products)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: BigDecimal,
}

#[derive(Debug, Clone, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::inventory)]
pub struct Inventory {
    pub product_id: String,
    pub quantity: i32,
    pub reserved: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::reservations)]
pub struct NewReservation<'a> {
    pub order_id: Uuid,
    pub product_id: &'a str,
    pub quantity: i32,
}

/// Owned and held units for one product, as read under the row lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Queryable)]
pub struct InventoryLevels {
    pub quantity: i32,
    pub reserved: i32,
}

impl InventoryLevels {
    pub fn available(&self) -> i32 {
        self.quantity - self.reserved
    }
}

impl From<&Inventory> for InventoryLevels {
    fn from(row: &Inventory) -> Self {
        Self {
            quantity: row.quantity,
            reserved: row.reserved,
        }
    }
}
