//! Read access to parts, service centers and issue types
//!
//! These records are owned by other parts of the platform; the core flows only
//! look them up to validate references and resolve center ownership.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use shared::{IssueType, Part, ServiceCenter, Shortfall};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct CatalogService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct PartRow {
    id: Uuid,
    name: String,
    part_number: String,
    supplier: Option<String>,
    warranty_months: Option<i32>,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<PartRow> for Part {
    fn from(row: PartRow) -> Self {
        Part {
            id: row.id,
            name: row.name,
            part_number: row.part_number,
            supplier: row.supplier,
            warranty_months: row.warranty_months,
            description: row.description,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct CenterRow {
    id: Uuid,
    name: String,
    address: Option<String>,
    phone: Option<String>,
    user_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<CenterRow> for ServiceCenter {
    fn from(row: CenterRow) -> Self {
        ServiceCenter {
            id: row.id,
            name: row.name,
            address: row.address,
            phone: row.phone,
            user_id: row.user_id,
            created_at: row.created_at,
        }
    }
}

impl CatalogService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List all parts
    pub async fn list_parts(&self) -> AppResult<Vec<Part>> {
        let rows = sqlx::query_as::<_, PartRow>(
            r#"
            SELECT id, name, part_number, supplier, warranty_months, description, created_at
            FROM parts
            ORDER BY name
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Part::from).collect())
    }

    /// Get a part by ID
    pub async fn get_part(&self, part_id: Uuid) -> AppResult<Part> {
        sqlx::query_as::<_, PartRow>(
            r#"
            SELECT id, name, part_number, supplier, warranty_months, description, created_at
            FROM parts
            WHERE id = $1
            "#,
        )
        .bind(part_id)
        .fetch_optional(&self.db)
        .await?
        .map(Part::from)
        .ok_or_else(|| AppError::not_found("Part"))
    }

    /// Fail with `NotFound` naming every id that has no part
    pub async fn ensure_parts_exist(&self, part_ids: &[Uuid]) -> AppResult<()> {
        if part_ids.is_empty() {
            return Ok(());
        }

        let found: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM parts WHERE id = ANY($1)")
            .bind(part_ids)
            .fetch_all(&self.db)
            .await?;

        let missing: Vec<String> = part_ids
            .iter()
            .filter(|id| !found.contains(id))
            .map(Uuid::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::not_found(format!("Part {}", missing.join(", "))))
        }
    }

    /// Display names for a set of parts
    pub async fn part_names(&self, part_ids: &[Uuid]) -> AppResult<HashMap<Uuid, String>> {
        let rows = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, name FROM parts WHERE id = ANY($1)",
        )
        .bind(part_ids)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// Build the insufficient-inventory error, naming every offending part
    pub async fn insufficient_inventory(&self, shortfalls: Vec<Shortfall>) -> AppError {
        let ids: Vec<Uuid> = shortfalls.iter().map(|s| s.part_id).collect();
        // Names are decoration; fall back to ids if the lookup fails
        let names = self.part_names(&ids).await.unwrap_or_default();

        let lines: Vec<String> = shortfalls
            .iter()
            .map(|s| {
                let name = names
                    .get(&s.part_id)
                    .cloned()
                    .unwrap_or_else(|| s.part_id.to_string());
                format!(
                    "{} (requested {}, available {}, {})",
                    name,
                    s.requested,
                    s.available,
                    s.reason.as_str()
                )
            })
            .collect();

        AppError::InsufficientInventory {
            message: format!(
                "Insufficient inventory for {} item(s): {}",
                shortfalls.len(),
                lines.join("; ")
            ),
            items: shortfalls,
        }
    }

    /// List all service centers
    pub async fn list_centers(&self) -> AppResult<Vec<ServiceCenter>> {
        let rows = sqlx::query_as::<_, CenterRow>(
            "SELECT id, name, address, phone, user_id, created_at FROM service_centers ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(ServiceCenter::from).collect())
    }

    /// Get a service center by ID
    pub async fn get_center(&self, center_id: Uuid) -> AppResult<ServiceCenter> {
        sqlx::query_as::<_, CenterRow>(
            "SELECT id, name, address, phone, user_id, created_at FROM service_centers WHERE id = $1",
        )
        .bind(center_id)
        .fetch_optional(&self.db)
        .await?
        .map(ServiceCenter::from)
        .ok_or_else(|| AppError::not_found("Service center"))
    }

    /// The center owned by a user, if any
    pub async fn owned_center(&self, user_id: Uuid) -> AppResult<Option<ServiceCenter>> {
        let row = sqlx::query_as::<_, CenterRow>(
            r#"
            SELECT id, name, address, phone, user_id, created_at
            FROM service_centers
            WHERE user_id = $1
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(ServiceCenter::from))
    }

    /// Get an issue type by ID
    pub async fn get_issue_type(&self, issue_type_id: Uuid) -> AppResult<IssueType> {
        sqlx::query_as::<_, (Uuid, String, Option<String>)>(
            "SELECT id, name, description FROM issue_types WHERE id = $1",
        )
        .bind(issue_type_id)
        .fetch_optional(&self.db)
        .await?
        .map(|(id, name, description)| IssueType {
            id,
            name,
            description,
        })
        .ok_or_else(|| AppError::not_found("Issue type"))
    }
}
