//! Inventory ledger: one stock row per (center, part)
//!
//! Reads and restocks go through `InventoryService`. The free functions at the
//! bottom run inside a caller's transaction and are the only code that
//! consumes or moves stock.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    validate_upsert_stock, InventoryRecord, InventoryView, StockLevel, UpsertStockRequest,
    MAX_ROW_QUANTITY,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::catalog::CatalogService;

/// Inventory service for reading and restocking the ledger
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
    catalog: CatalogService,
}

#[derive(Debug, FromRow)]
struct InventoryRow {
    id: Uuid,
    center_id: Uuid,
    part_id: Uuid,
    available_quantity: i32,
    minimum_stock: i32,
    unit_cost: Option<Decimal>,
    last_restocked: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<InventoryRow> for InventoryRecord {
    fn from(row: InventoryRow) -> Self {
        InventoryRecord {
            id: row.id,
            center_id: row.center_id,
            part_id: row.part_id,
            available_quantity: row.available_quantity,
            minimum_stock: row.minimum_stock,
            unit_cost: row.unit_cost,
            last_restocked: row.last_restocked,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Row for the inventory listing query
#[derive(Debug, FromRow)]
struct InventoryViewRow {
    #[sqlx(flatten)]
    record: InventoryRow,
    part_name: String,
    part_number: String,
}

impl From<InventoryViewRow> for InventoryView {
    fn from(row: InventoryViewRow) -> Self {
        let record = InventoryRecord::from(row.record);
        InventoryView {
            low_stock: record.is_low_stock(),
            record,
            part_name: row.part_name,
            part_number: row.part_number,
        }
    }
}

impl InventoryService {
    /// Create a new InventoryService instance
    pub fn new(db: PgPool) -> Self {
        Self {
            catalog: CatalogService::new(db.clone()),
            db,
        }
    }

    /// List every stock row of a center
    pub async fn list_for_center(&self, center_id: Uuid) -> AppResult<Vec<InventoryView>> {
        // 404 for unknown centers rather than an empty list
        self.catalog.get_center(center_id).await?;

        let rows = sqlx::query_as::<_, InventoryViewRow>(
            r#"
            SELECT i.id, i.center_id, i.part_id, i.available_quantity, i.minimum_stock,
                   i.unit_cost, i.last_restocked, i.created_at, i.updated_at,
                   p.name AS part_name, p.part_number
            FROM inventory i
            JOIN parts p ON p.id = i.part_id
            WHERE i.center_id = $1
            ORDER BY p.name
            "#,
        )
        .bind(center_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(InventoryView::from).collect())
    }

    /// Stock rows at or below their minimum
    pub async fn list_low_stock(&self, center_id: Uuid) -> AppResult<Vec<InventoryView>> {
        let rows = self.list_for_center(center_id).await?;
        Ok(rows.into_iter().filter(|row| row.low_stock).collect())
    }

    /// Get the stock row for a (center, part) pair
    pub async fn get_record(&self, center_id: Uuid, part_id: Uuid) -> AppResult<InventoryRecord> {
        sqlx::query_as::<_, InventoryRow>(
            r#"
            SELECT id, center_id, part_id, available_quantity, minimum_stock, unit_cost,
                   last_restocked, created_at, updated_at
            FROM inventory
            WHERE center_id = $1 AND part_id = $2
            "#,
        )
        .bind(center_id)
        .bind(part_id)
        .fetch_optional(&self.db)
        .await?
        .map(InventoryRecord::from)
        .ok_or_else(|| AppError::not_found("Inventory record"))
    }

    /// Restock or adjust a (center, part) row, creating it if needed.
    ///
    /// Only the center's owner or an admin may do this.
    pub async fn upsert_stock(
        &self,
        actor: &AuthUser,
        center_id: Uuid,
        part_id: Uuid,
        input: UpsertStockRequest,
    ) -> AppResult<InventoryRecord> {
        validate_upsert_stock(&input)?;

        let center = self.catalog.get_center(center_id).await?;
        if !center.is_owned_by(actor.user_id) && !actor.is_admin() {
            return Err(AppError::forbidden(
                "Only the center owner can change its inventory",
            ));
        }
        self.catalog.get_part(part_id).await?;

        let record = sqlx::query_as::<_, InventoryRow>(
            r#"
            INSERT INTO inventory (center_id, part_id, available_quantity, minimum_stock,
                                   unit_cost, last_restocked)
            VALUES ($1, $2, $3, COALESCE($4, 0), $5, CASE WHEN $3 > 0 THEN NOW() END)
            ON CONFLICT (center_id, part_id) DO UPDATE
            SET available_quantity = inventory.available_quantity + EXCLUDED.available_quantity,
                minimum_stock = COALESCE($4, inventory.minimum_stock),
                unit_cost = COALESCE($5, inventory.unit_cost),
                last_restocked = CASE WHEN $3 > 0 THEN NOW() ELSE inventory.last_restocked END,
                updated_at = NOW()
            WHERE inventory.available_quantity::BIGINT + EXCLUDED.available_quantity <= $6
            RETURNING id, center_id, part_id, available_quantity, minimum_stock, unit_cost,
                      last_restocked, created_at, updated_at
            "#,
        )
        .bind(center_id)
        .bind(part_id)
        .bind(input.restock_quantity)
        .bind(input.minimum_stock)
        .bind(input.unit_cost)
        .bind(MAX_ROW_QUANTITY)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| capacity_exceeded(center_id, part_id))?;

        tracing::info!(
            %center_id,
            %part_id,
            restocked = input.restock_quantity,
            available = record.available_quantity,
            "inventory upserted"
        );

        Ok(record.into())
    }
}

// ============================================================================
// Transactional ledger operations
// ============================================================================

/// Stock rows locked for the rest of a transaction
#[derive(Debug, Default)]
pub struct LockedStock {
    rows: Vec<(Uuid, StockLevel)>,
}

impl LockedStock {
    /// Levels of one center, keyed by part
    pub fn for_center(&self, center_id: Uuid) -> HashMap<Uuid, StockLevel> {
        self.rows
            .iter()
            .filter(|(center, _)| *center == center_id)
            .map(|(_, level)| (level.part_id, *level))
            .collect()
    }
}

/// Lock the rows of `part_ids` at every center in `center_ids`.
///
/// Rows are locked in (center, part) order so concurrent acceptances and
/// transfers between the same centers queue instead of deadlocking. Missing
/// rows are simply absent from the result.
pub async fn lock_stock(
    conn: &mut PgConnection,
    center_ids: &[Uuid],
    part_ids: &[Uuid],
) -> AppResult<LockedStock> {
    if part_ids.is_empty() {
        return Ok(LockedStock::default());
    }

    let rows = sqlx::query_as::<_, (Uuid, Uuid, i32, Option<Decimal>)>(
        r#"
        SELECT center_id, part_id, available_quantity, unit_cost
        FROM inventory
        WHERE center_id = ANY($1) AND part_id = ANY($2)
        ORDER BY center_id, part_id
        FOR UPDATE
        "#,
    )
    .bind(center_ids)
    .bind(part_ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(LockedStock {
        rows: rows
            .into_iter()
            .map(|(center_id, part_id, available_quantity, unit_cost)| {
                (
                    center_id,
                    StockLevel {
                        part_id,
                        available_quantity,
                        unit_cost,
                    },
                )
            })
            .collect(),
    })
}

/// Read one center's levels without locking
pub async fn read_levels(
    conn: &mut PgConnection,
    center_id: Uuid,
    part_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, StockLevel>> {
    let rows = sqlx::query_as::<_, (Uuid, i32, Option<Decimal>)>(
        r#"
        SELECT part_id, available_quantity, unit_cost
        FROM inventory
        WHERE center_id = $1 AND part_id = ANY($2)
        "#,
    )
    .bind(center_id)
    .bind(part_ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(part_id, available_quantity, unit_cost)| {
            (
                part_id,
                StockLevel {
                    part_id,
                    available_quantity,
                    unit_cost,
                },
            )
        })
        .collect())
}

pub(crate) fn capacity_exceeded(center_id: Uuid, part_id: Uuid) -> AppError {
    AppError::ValidationError(format!(
        "Stock for part {} at center {} would exceed {} units",
        part_id, center_id, MAX_ROW_QUANTITY
    ))
}

/// Narrow an aggregated quantity to the column type
pub(crate) fn as_quantity(quantity: i64) -> AppResult<i32> {
    i32::try_from(quantity)
        .map_err(|_| AppError::ValidationError(format!("Quantity {} is out of range", quantity)))
}

/// Subtract `quantity` from a row, returning the new available quantity.
///
/// The update only applies while enough stock remains, so it can never drive
/// a row negative even if the caller skipped locking.
pub async fn decrement_stock(
    conn: &mut PgConnection,
    center_id: Uuid,
    part_id: Uuid,
    quantity: i64,
) -> AppResult<i32> {
    let quantity = as_quantity(quantity)?;

    let remaining = sqlx::query_scalar::<_, i32>(
        r#"
        UPDATE inventory
        SET available_quantity = available_quantity - $3, updated_at = NOW()
        WHERE center_id = $1 AND part_id = $2 AND available_quantity >= $3
        RETURNING available_quantity
        "#,
    )
    .bind(center_id)
    .bind(part_id)
    .bind(quantity)
    .fetch_optional(&mut *conn)
    .await?;

    remaining.ok_or_else(|| {
        AppError::InvalidState(format!(
            "Stock for part {} at center {} changed during the update",
            part_id, center_id
        ))
    })
}

/// Add `quantity` to a row, creating it with `minimum_stock = 0` if absent.
///
/// Returns the new available quantity and whether the row was created. Fails
/// without writing if the row would go past `MAX_ROW_QUANTITY`.
pub async fn increment_or_create_stock(
    conn: &mut PgConnection,
    center_id: Uuid,
    part_id: Uuid,
    quantity: i64,
    unit_cost: Option<Decimal>,
) -> AppResult<(i32, bool)> {
    let quantity = as_quantity(quantity)?;

    let row = sqlx::query_as::<_, (i32, bool)>(
        r#"
        INSERT INTO inventory (center_id, part_id, available_quantity, minimum_stock,
                               unit_cost, last_restocked)
        VALUES ($1, $2, $3, 0, $4, NOW())
        ON CONFLICT (center_id, part_id) DO UPDATE
        SET available_quantity = inventory.available_quantity + EXCLUDED.available_quantity,
            last_restocked = NOW(),
            updated_at = NOW()
        WHERE inventory.available_quantity::BIGINT + EXCLUDED.available_quantity <= $5
        RETURNING available_quantity, (xmax = 0) AS created
        "#,
    )
    .bind(center_id)
    .bind(part_id)
    .bind(quantity)
    .bind(unit_cost)
    .bind(MAX_ROW_QUANTITY)
    .fetch_optional(&mut *conn)
    .await?;

    row.ok_or_else(|| capacity_exceeded(center_id, part_id))
}
