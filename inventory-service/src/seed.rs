use anyhow::Result;
use bigdecimal::BigDecimal;
use chrono::Utc;
use tracing::{info, warn};

use crate::ledger::PgLedger;
use crate::models::{Inventory, Product};

/// Sample catalog: (id, name, description, price, quantity on hand).
const CATALOG: &[(&str, &str, &str, i64, i32)] = &[
    ("prod-001", "Gaming Laptop", "High-end laptop for gaming", 15_000_000, 10),
    ("prod-002", "Smartphone", "Smartphone with a 108MP camera", 8_000_000, 20),
    ("prod-003", "Bluetooth Headphones", "Noise cancelling headphones", 2_000_000, 30),
    ("prod-004", "Smart Watch", "Watch with health tracking", 3_500_000, 15),
    ("prod-005", "Wireless Earbuds", "Earbuds with premium sound", 1_800_000, 25),
];

/// Inserts the sample catalog, leaving rows that already exist alone.
pub async fn seed_catalog(ledger: &PgLedger) -> Result<()> {
    for &(id, name, description, price, quantity) in CATALOG {
        let product = Product {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            price: BigDecimal::from(price),
        };

        match ledger.insert_product(&product).await {
            Ok(true) => info!("Seeded product: {} - {}", id, name),
            Ok(false) => info!("Product {} already present", id),
            Err(e) => {
                warn!("Failed to seed product {}: {}", id, e);
                continue;
            }
        }

        let row = Inventory {
            product_id: id.to_string(),
            quantity,
            reserved: 0,
            updated_at: Utc::now(),
        };
        match ledger.insert_inventory(&row).await {
            Ok(true) => info!("Seeded inventory for product: {} - Quantity: {}", id, quantity),
            Ok(false) => info!("Inventory for {} already present", id),
            Err(e) => warn!("Failed to seed inventory for product {}: {}", id, e),
        }
    }

    Ok(())
}
