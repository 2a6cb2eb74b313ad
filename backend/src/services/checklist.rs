//! Repair checklist service
//!
//! Acceptance is the only step that consumes stock. It runs in one
//! transaction: the checklist row and every inventory row it draws on are
//! locked, the whole consumption is planned against the locked values, and
//! nothing is written unless every line can be served.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    aggregate_lines, distinct_ids, parse_checklist_parts, plan_consumption, validate_fields,
    CancelChecklistRequest, Checklist, ChecklistAcceptance, ChecklistCancellation,
    ChecklistEvent, ChecklistPart, ChecklistStatus, CreateChecklistRequest, Role,
};
use sqlx::{types::Json, FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::catalog::CatalogService;
use crate::services::inventory::{decrement_stock, increment_or_create_stock, lock_stock};

const CHECKLIST_COLUMNS: &str = r#"
    c.id, c.appointment_id, c.issue_type_id, c.technician_id, c.issue_description,
    c.solution_applied, c.parts, c.status, c.total_cost, c.cancellation_note,
    c.accepted_by, c.accepted_at, c.completed_at, c.canceled_at, c.created_at, c.updated_at
"#;

/// Checklist service for the repair workflow
#[derive(Clone)]
pub struct ChecklistService {
    db: PgPool,
    catalog: CatalogService,
    restore_on_cancel: bool,
}

#[derive(Debug, FromRow)]
struct ChecklistRow {
    id: Uuid,
    appointment_id: Uuid,
    issue_type_id: Uuid,
    technician_id: Uuid,
    issue_description: String,
    solution_applied: String,
    parts: Json<Vec<ChecklistPart>>,
    status: String,
    total_cost: Option<Decimal>,
    cancellation_note: Option<String>,
    accepted_by: Option<Uuid>,
    accepted_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    canceled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ChecklistRow {
    fn into_checklist(self) -> AppResult<Checklist> {
        Ok(Checklist {
            id: self.id,
            appointment_id: self.appointment_id,
            issue_type_id: self.issue_type_id,
            technician_id: self.technician_id,
            issue_description: self.issue_description,
            solution_applied: self.solution_applied,
            parts: self.parts.0,
            status: self.status.parse()?,
            total_cost: self.total_cost,
            cancellation_note: self.cancellation_note,
            accepted_by: self.accepted_by,
            accepted_at: self.accepted_at,
            completed_at: self.completed_at,
            canceled_at: self.canceled_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// A checklist locked for update, with the center its appointment belongs to
#[derive(Debug, FromRow)]
struct LockedChecklistRow {
    #[sqlx(flatten)]
    checklist: ChecklistRow,
    center_id: Uuid,
}

/// Map a unique-index violation to `DuplicateEntry`
fn unique_violation(err: sqlx::Error, what: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            AppError::DuplicateEntry(what.to_string())
        }
        _ => err.into(),
    }
}

impl ChecklistService {
    /// Create a new ChecklistService instance
    ///
    /// `restore_on_cancel` is used when a cancel request does not say whether
    /// consumed parts go back into stock.
    pub fn new(db: PgPool, restore_on_cancel: bool) -> Self {
        Self {
            catalog: CatalogService::new(db.clone()),
            db,
            restore_on_cancel,
        }
    }

    /// Record a technician's checklist for an appointment
    pub async fn create(
        &self,
        actor: &AuthUser,
        input: CreateChecklistRequest,
    ) -> AppResult<Checklist> {
        actor.require_role(Role::CHECKLIST_AUTHORS)?;
        let parts = parse_checklist_parts(&input)?;

        let appointment_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM appointments WHERE id = $1)")
                .bind(input.appointment_id)
                .fetch_one(&self.db)
                .await?;
        if !appointment_exists {
            return Err(AppError::not_found("Appointment"));
        }

        self.catalog.get_issue_type(input.issue_type_id).await?;
        let part_ids = distinct_ids(parts.iter().map(|p| p.part_id));
        self.catalog.ensure_parts_exist(&part_ids).await?;

        let sql = format!(
            r#"
            INSERT INTO checklists AS c (appointment_id, issue_type_id, technician_id,
                                         issue_description, solution_applied, parts, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {CHECKLIST_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, ChecklistRow>(&sql)
            .bind(input.appointment_id)
            .bind(input.issue_type_id)
            .bind(actor.user_id)
            .bind(input.issue_description.trim())
            .bind(input.solution_applied.trim())
            .bind(Json(&parts))
            .bind(ChecklistStatus::Pending.as_str())
            .fetch_one(&self.db)
            .await
            .map_err(|e| unique_violation(e, "An open checklist for this appointment"))?;

        let checklist = row.into_checklist()?;
        tracing::info!(
            checklist_id = %checklist.id,
            appointment_id = %checklist.appointment_id,
            lines = checklist.parts.len(),
            "checklist created"
        );

        Ok(checklist)
    }

    /// Get a checklist by ID
    pub async fn get(&self, checklist_id: Uuid) -> AppResult<Checklist> {
        let sql = format!("SELECT {CHECKLIST_COLUMNS} FROM checklists c WHERE c.id = $1");
        sqlx::query_as::<_, ChecklistRow>(&sql)
            .bind(checklist_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Checklist"))?
            .into_checklist()
    }

    /// Every checklist written for an appointment, oldest first
    pub async fn list_for_appointment(&self, appointment_id: Uuid) -> AppResult<Vec<Checklist>> {
        let sql = format!(
            "SELECT {CHECKLIST_COLUMNS} FROM checklists c WHERE c.appointment_id = $1 ORDER BY c.created_at"
        );
        let rows = sqlx::query_as::<_, ChecklistRow>(&sql)
            .bind(appointment_id)
            .fetch_all(&self.db)
            .await?;

        rows.into_iter().map(ChecklistRow::into_checklist).collect()
    }

    async fn lock(conn: &mut PgConnection, checklist_id: Uuid) -> AppResult<(Checklist, Uuid)> {
        let sql = format!(
            r#"
            SELECT {CHECKLIST_COLUMNS}, a.center_id
            FROM checklists c
            JOIN appointments a ON a.id = c.appointment_id
            WHERE c.id = $1
            FOR UPDATE OF c
            "#
        );
        let row = sqlx::query_as::<_, LockedChecklistRow>(&sql)
            .bind(checklist_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::not_found("Checklist"))?;

        Ok((row.checklist.into_checklist()?, row.center_id))
    }

    /// Approve the parts on a pending checklist and consume them from the
    /// appointment center's stock.
    ///
    /// Either every line is served and priced or nothing changes.
    pub async fn accept(&self, actor: &AuthUser, checklist_id: Uuid) -> AppResult<ChecklistAcceptance> {
        actor.require_role(Role::CHECKLIST_APPROVERS)?;

        let mut tx = self.db.begin().await?;
        let (checklist, center_id) = Self::lock(&mut tx, checklist_id).await?;
        let next = checklist.status.apply(ChecklistEvent::Accept)?;

        let lines = checklist.stock_lines();
        let part_ids = distinct_ids(lines.iter().map(|l| l.part_id));
        let stock = lock_stock(&mut tx, &[center_id], &part_ids)
            .await?
            .for_center(center_id);

        let plan = match plan_consumption(&lines, &stock) {
            Ok(plan) => plan,
            Err(shortfalls) => {
                tx.rollback().await?;
                tracing::warn!(
                    %checklist_id,
                    %center_id,
                    short_lines = shortfalls.len(),
                    "checklist acceptance refused"
                );
                return Err(self.catalog.insufficient_inventory(shortfalls).await);
            }
        };

        for (part_id, quantity) in &plan.decrements {
            let remaining = decrement_stock(&mut tx, center_id, *part_id, *quantity).await?;
            tracing::info!(%center_id, %part_id, consumed = quantity, remaining, "stock consumed");
        }

        let priced: Vec<ChecklistPart> = plan
            .lines
            .iter()
            .map(|line| ChecklistPart {
                part_id: line.part_id,
                quantity: line.quantity,
                unit_cost: Some(line.unit_cost),
            })
            .collect();

        let sql = format!(
            r#"
            UPDATE checklists c
            SET status = $2, parts = $3, total_cost = $4, accepted_by = $5,
                accepted_at = NOW(), updated_at = NOW()
            WHERE c.id = $1
            RETURNING {CHECKLIST_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, ChecklistRow>(&sql)
            .bind(checklist_id)
            .bind(next.as_str())
            .bind(Json(&priced))
            .bind(plan.total_cost)
            .bind(actor.user_id)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("UPDATE appointments SET estimated_cost = $2, updated_at = NOW() WHERE id = $1")
            .bind(checklist.appointment_id)
            .bind(plan.total_cost)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            %checklist_id,
            appointment_id = %checklist.appointment_id,
            total_cost = %plan.total_cost,
            "checklist accepted"
        );

        Ok(ChecklistAcceptance {
            checklist: row.into_checklist()?,
            total_cost: plan.total_cost,
            inventory_updated: plan.decrements.len(),
        })
    }

    /// Close an accepted checklist and complete its appointment
    pub async fn complete(&self, actor: &AuthUser, checklist_id: Uuid) -> AppResult<Checklist> {
        actor.require_role(Role::CHECKLIST_AUTHORS)?;

        let mut tx = self.db.begin().await?;
        let (checklist, _) = Self::lock(&mut tx, checklist_id).await?;
        let next = checklist.status.apply(ChecklistEvent::Complete)?;

        let sql = format!(
            r#"
            UPDATE checklists c
            SET status = $2, completed_at = NOW(), updated_at = NOW()
            WHERE c.id = $1
            RETURNING {CHECKLIST_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, ChecklistRow>(&sql)
            .bind(checklist_id)
            .bind(next.as_str())
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("UPDATE appointments SET status = 'completed', updated_at = NOW() WHERE id = $1")
            .bind(checklist.appointment_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            %checklist_id,
            appointment_id = %checklist.appointment_id,
            "checklist completed"
        );

        row.into_checklist()
    }

    /// Cancel a pending or accepted checklist.
    ///
    /// Stock consumed at acceptance goes back only when the request asks for
    /// it, or when it is silent and the server default says so.
    pub async fn cancel(
        &self,
        actor: &AuthUser,
        checklist_id: Uuid,
        input: CancelChecklistRequest,
    ) -> AppResult<ChecklistCancellation> {
        actor.require_role(Role::CHECKLIST_AUTHORS)?;
        validate_fields(&input)?;

        let mut tx = self.db.begin().await?;
        let (checklist, center_id) = Self::lock(&mut tx, checklist_id).await?;
        let next = checklist.status.apply(ChecklistEvent::Cancel)?;

        let restore = checklist
            .status
            .restores_stock_on_cancel(input.restore_inventory, self.restore_on_cancel);

        if restore {
            let lines = checklist.stock_lines();
            for (part_id, quantity) in aggregate_lines(&lines) {
                let unit_cost = checklist
                    .parts
                    .iter()
                    .find(|p| p.part_id == part_id)
                    .and_then(|p| p.unit_cost);
                let available =
                    increment_or_create_stock(&mut tx, center_id, part_id, quantity, unit_cost)
                        .await?
                        .0;
                tracing::info!(%center_id, %part_id, restored = quantity, available, "stock restored");
            }
        }

        let note = input
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());

        let sql = format!(
            r#"
            UPDATE checklists c
            SET status = $2, cancellation_note = $3, canceled_at = NOW(), updated_at = NOW()
            WHERE c.id = $1
            RETURNING {CHECKLIST_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, ChecklistRow>(&sql)
            .bind(checklist_id)
            .bind(next.as_str())
            .bind(note)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            %checklist_id,
            from = %checklist.status,
            inventory_restored = restore,
            "checklist canceled"
        );

        Ok(ChecklistCancellation {
            checklist: row.into_checklist()?,
            inventory_restored: restore,
        })
    }
}
