//! Inventory ledger models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// The stock row for one (center, part) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: Uuid,
    pub center_id: Uuid,
    pub part_id: Uuid,
    pub available_quantity: i32,
    pub minimum_stock: i32,
    pub unit_cost: Option<Decimal>,
    pub last_restocked: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    /// At or below the configured minimum
    pub fn is_low_stock(&self) -> bool {
        self.available_quantity <= self.minimum_stock
    }
}

/// Inventory row as returned to clients
#[derive(Debug, Clone, Serialize)]
pub struct InventoryView {
    #[serde(flatten)]
    pub record: InventoryRecord,
    pub part_name: String,
    pub part_number: String,
    pub low_stock: bool,
}

/// Input for restocking or adjusting a (center, part) record
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpsertStockRequest {
    /// Units added to the available quantity
    #[serde(default)]
    #[validate(range(min = 0, message = "Restock quantity cannot be negative"))]
    pub restock_quantity: i32,

    #[validate(range(min = 0, message = "Minimum stock cannot be negative"))]
    pub minimum_stock: Option<i32>,

    pub unit_cost: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_stock_includes_minimum() {
        let mut record = InventoryRecord {
            id: Uuid::new_v4(),
            center_id: Uuid::new_v4(),
            part_id: Uuid::new_v4(),
            available_quantity: 3,
            minimum_stock: 3,
            unit_cost: None,
            last_restocked: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(record.is_low_stock());

        record.available_quantity = 4;
        assert!(!record.is_low_stock());
    }
}
