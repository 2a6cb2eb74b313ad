//! Inter-center transfer negotiation service
//!
//! `from_center` asks for parts and gains stock on execution; `to_center`
//! holds the parts, decides on the request, and loses stock on execution.
//!
//! Every mutating call locks the transfer row first and checks that the actor
//! owns the center entitled to the event before looking at the status.
//! Execution moves all lines in one transaction or none of them.

use chrono::{DateTime, Utc};
use shared::{
    check_availability, distinct_ids, parse_counter_offer_items, parse_transfer_request,
    plan_transfer, validate_fields, CounterOfferItem, CreateTransferRequest, InterCenterTransfer,
    ProcessAction, ProcessTransferRequest, RespondCounterOfferRequest, StockLine, StockRoute,
    TransferDirection, TransferEvent, TransferExecution, TransferItem, TransferItemResult,
    TransferParty, TransferStatus,
};
use sqlx::{types::Json, FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::catalog::CatalogService;
use crate::services::inventory::{
    as_quantity, capacity_exceeded, decrement_stock, increment_or_create_stock, lock_stock,
    read_levels,
};

const TRANSFER_COLUMNS: &str = r#"
    t.id, t.from_center_id, t.to_center_id, t.requested_by, t.items, t.counter_offer_items,
    t.status, t.notes, t.created_at, t.updated_at, t.completed_at
"#;

/// Transfer service for negotiating and executing stock moves between centers
#[derive(Clone)]
pub struct TransferService {
    db: PgPool,
    catalog: CatalogService,
}

#[derive(Debug, FromRow)]
struct TransferRow {
    id: Uuid,
    from_center_id: Uuid,
    to_center_id: Uuid,
    requested_by: Uuid,
    items: Json<Vec<TransferItem>>,
    counter_offer_items: Json<Vec<CounterOfferItem>>,
    status: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TransferRow {
    fn into_transfer(self) -> AppResult<InterCenterTransfer> {
        Ok(InterCenterTransfer {
            id: self.id,
            from_center_id: self.from_center_id,
            to_center_id: self.to_center_id,
            requested_by: self.requested_by,
            items: self.items.0,
            counter_offer_items: self.counter_offer_items.0,
            status: self.status.parse()?,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
        })
    }
}

/// A transfer together with the owners of both centers
#[derive(Debug, FromRow)]
struct OwnedTransferRow {
    #[sqlx(flatten)]
    transfer: TransferRow,
    from_owner: Uuid,
    to_owner: Uuid,
}

struct OwnedTransfer {
    transfer: InterCenterTransfer,
    from_owner: Uuid,
    to_owner: Uuid,
}

impl OwnedTransfer {
    fn owner(&self, party: TransferParty) -> Uuid {
        match party {
            TransferParty::Requester => self.from_owner,
            TransferParty::Holder => self.to_owner,
        }
    }

    /// Fail with `Forbidden` unless the actor owns the center `event` belongs to
    fn authorize(&self, actor: &AuthUser, event: TransferEvent) -> AppResult<()> {
        let party = event.party();
        if self.owner(party) == actor.user_id {
            return Ok(());
        }

        let center = match party {
            TransferParty::Requester => "requesting",
            TransferParty::Holder => "supplying",
        };
        Err(AppError::forbidden(format!(
            "Only the owner of the {} center can {} this transfer",
            center,
            event.as_str()
        )))
    }

    fn is_visible_to(&self, actor: &AuthUser) -> bool {
        actor.is_admin() || self.from_owner == actor.user_id || self.to_owner == actor.user_id
    }
}

/// Append a new note below the existing ones
fn append_note(existing: Option<&str>, note: Option<&str>) -> Option<String> {
    let note = note.map(str::trim).filter(|n| !n.is_empty());
    match (existing, note) {
        (Some(existing), Some(note)) => Some(format!("{}\n{}", existing, note)),
        (None, Some(note)) => Some(note.to_string()),
        (existing, None) => existing.map(str::to_string),
    }
}

fn part_ids(lines: &[StockLine]) -> Vec<Uuid> {
    distinct_ids(lines.iter().map(|l| l.part_id))
}

impl TransferService {
    /// Create a new TransferService instance
    pub fn new(db: PgPool) -> Self {
        Self {
            catalog: CatalogService::new(db.clone()),
            db,
        }
    }

    async fn fetch(
        conn: &mut PgConnection,
        transfer_id: Uuid,
        for_update: bool,
    ) -> AppResult<OwnedTransfer> {
        let sql = format!(
            r#"
            SELECT {TRANSFER_COLUMNS}, fc.user_id AS from_owner, tc.user_id AS to_owner
            FROM inter_center_transfers t
            JOIN service_centers fc ON fc.id = t.from_center_id
            JOIN service_centers tc ON tc.id = t.to_center_id
            WHERE t.id = $1
            {}
            "#,
            if for_update { "FOR UPDATE OF t" } else { "" }
        );
        let row = sqlx::query_as::<_, OwnedTransferRow>(&sql)
            .bind(transfer_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::not_found("Transfer"))?;

        Ok(OwnedTransfer {
            transfer: row.transfer.into_transfer()?,
            from_owner: row.from_owner,
            to_owner: row.to_owner,
        })
    }

    async fn store(
        conn: &mut PgConnection,
        transfer_id: Uuid,
        status: TransferStatus,
        counter_offer_items: Option<&[CounterOfferItem]>,
        notes: Option<&str>,
    ) -> AppResult<InterCenterTransfer> {
        let sql = format!(
            r#"
            UPDATE inter_center_transfers t
            SET status = $2,
                counter_offer_items = COALESCE($3, t.counter_offer_items),
                notes = $4,
                completed_at = CASE WHEN $2 = 'completed' THEN NOW() ELSE t.completed_at END,
                updated_at = NOW()
            WHERE t.id = $1
            RETURNING {TRANSFER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, TransferRow>(&sql)
            .bind(transfer_id)
            .bind(status.as_str())
            .bind(counter_offer_items.map(Json))
            .bind(notes)
            .fetch_one(&mut *conn)
            .await?
            .into_transfer()
    }

    /// Open a request for parts from another center
    pub async fn create(
        &self,
        actor: &AuthUser,
        input: CreateTransferRequest,
    ) -> AppResult<InterCenterTransfer> {
        let from_center_id = match input.from_center_id {
            Some(center_id) => {
                let center = self.catalog.get_center(center_id).await?;
                if !center.is_owned_by(actor.user_id) && !actor.is_admin() {
                    return Err(AppError::forbidden(
                        "Transfers can only be requested for a center you own",
                    ));
                }
                center.id
            }
            None => {
                self.catalog
                    .owned_center(actor.user_id)
                    .await?
                    .ok_or_else(|| AppError::forbidden("You do not own a service center"))?
                    .id
            }
        };

        let items = parse_transfer_request(&input, from_center_id)?;
        self.catalog.get_center(input.to_center_id).await?;
        self.catalog
            .ensure_parts_exist(&distinct_ids(items.iter().map(|i| i.part_id)))
            .await?;

        let sql = format!(
            r#"
            INSERT INTO inter_center_transfers AS t (from_center_id, to_center_id, requested_by,
                                                     items, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {TRANSFER_COLUMNS}
            "#
        );
        let transfer = sqlx::query_as::<_, TransferRow>(&sql)
            .bind(from_center_id)
            .bind(input.to_center_id)
            .bind(actor.user_id)
            .bind(Json(&items))
            .bind(TransferStatus::Pending.as_str())
            .bind(append_note(None, input.notes.as_deref()))
            .fetch_one(&self.db)
            .await?
            .into_transfer()?;

        tracing::info!(
            transfer_id = %transfer.id,
            from_center_id = %transfer.from_center_id,
            to_center_id = %transfer.to_center_id,
            lines = transfer.items.len(),
            "transfer requested"
        );

        Ok(transfer)
    }

    /// Get a transfer visible to the actor
    pub async fn get(&self, actor: &AuthUser, transfer_id: Uuid) -> AppResult<InterCenterTransfer> {
        let mut conn = self.db.acquire().await?;
        let owned = Self::fetch(&mut conn, transfer_id, false).await?;
        if !owned.is_visible_to(actor) {
            return Err(AppError::forbidden(
                "Only the owners of the two centers can view this transfer",
            ));
        }
        Ok(owned.transfer)
    }

    /// Transfers involving the actor's center, newest first.
    ///
    /// Admins without a center of their own see every transfer.
    pub async fn list(
        &self,
        actor: &AuthUser,
        direction: TransferDirection,
    ) -> AppResult<Vec<InterCenterTransfer>> {
        let center = self.catalog.owned_center(actor.user_id).await?;

        let rows = match center {
            Some(center) => {
                let filter = match direction {
                    TransferDirection::Incoming => "t.to_center_id = $1",
                    TransferDirection::Outgoing => "t.from_center_id = $1",
                    TransferDirection::All => "(t.to_center_id = $1 OR t.from_center_id = $1)",
                };
                let sql = format!(
                    "SELECT {TRANSFER_COLUMNS} FROM inter_center_transfers t WHERE {filter} ORDER BY t.created_at DESC"
                );
                sqlx::query_as::<_, TransferRow>(&sql)
                    .bind(center.id)
                    .fetch_all(&self.db)
                    .await?
            }
            None if actor.is_admin() => {
                let sql = format!(
                    "SELECT {TRANSFER_COLUMNS} FROM inter_center_transfers t ORDER BY t.created_at DESC"
                );
                sqlx::query_as::<_, TransferRow>(&sql)
                    .fetch_all(&self.db)
                    .await?
            }
            None => return Err(AppError::forbidden("You do not own a service center")),
        };

        rows.into_iter().map(TransferRow::into_transfer).collect()
    }

    /// The holder's decision on a pending request: accept, reject or counter-offer
    pub async fn process(
        &self,
        actor: &AuthUser,
        transfer_id: Uuid,
        input: ProcessTransferRequest,
    ) -> AppResult<InterCenterTransfer> {
        validate_fields(&input)?;

        let counter_items = match input.action {
            ProcessAction::CounterOffer => {
                let items = parse_counter_offer_items(input.counter_offer_items.as_deref())?;
                self.catalog
                    .ensure_parts_exist(&distinct_ids(items.iter().map(|i| i.part_id)))
                    .await?;
                Some(items)
            }
            ProcessAction::Accept | ProcessAction::Reject => None,
        };

        let event = TransferEvent::from(input.action);
        let mut tx = self.db.begin().await?;
        let owned = Self::fetch(&mut tx, transfer_id, true).await?;
        owned.authorize(actor, event)?;
        let transfer = owned.transfer;
        let next = transfer.status.apply(event)?;

        // Lines the holder's stock must cover for this decision
        let required: Vec<StockLine> = match &counter_items {
            Some(items) => items
                .iter()
                .map(|item| StockLine::new(item.part_id, item.available_quantity))
                .collect(),
            None if input.action == ProcessAction::Accept => transfer.requested_lines(),
            None => Vec::new(),
        };

        if !required.is_empty() {
            let stock = read_levels(&mut tx, transfer.to_center_id, &part_ids(&required)).await?;
            if let Err(shortfalls) = check_availability(&required, &stock) {
                tx.rollback().await?;
                tracing::warn!(
                    %transfer_id,
                    action = event.as_str(),
                    short_lines = shortfalls.len(),
                    "transfer decision refused"
                );
                return Err(self.catalog.insufficient_inventory(shortfalls).await);
            }
        }

        let notes = append_note(transfer.notes.as_deref(), input.notes.as_deref());
        let updated = Self::store(
            &mut tx,
            transfer_id,
            next,
            counter_items.as_deref(),
            notes.as_deref(),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            %transfer_id,
            from = %transfer.status,
            to = %updated.status,
            "transfer processed"
        );

        Ok(updated)
    }

    /// The requester's answer to a counter-offer
    pub async fn respond(
        &self,
        actor: &AuthUser,
        transfer_id: Uuid,
        input: RespondCounterOfferRequest,
    ) -> AppResult<InterCenterTransfer> {
        let event = TransferEvent::from(input.action);

        let mut tx = self.db.begin().await?;
        let owned = Self::fetch(&mut tx, transfer_id, true).await?;
        owned.authorize(actor, event)?;
        let transfer = owned.transfer;
        let next = transfer.status.apply(event)?;

        let updated =
            Self::store(&mut tx, transfer_id, next, None, transfer.notes.as_deref()).await?;
        tx.commit().await?;

        tracing::info!(
            %transfer_id,
            from = %transfer.status,
            to = %updated.status,
            "counter-offer answered"
        );

        Ok(updated)
    }

    /// Move the agreed stock from the holder to the requester.
    ///
    /// Stock is re-checked against locked rows; if any line is now short the
    /// transfer stays where it is and nothing moves.
    pub async fn execute(&self, actor: &AuthUser, transfer_id: Uuid) -> AppResult<TransferExecution> {
        let mut tx = self.db.begin().await?;
        let owned = Self::fetch(&mut tx, transfer_id, true).await?;
        owned.authorize(actor, TransferEvent::Execute)?;
        let transfer = owned.transfer;
        let next = transfer.status.apply(TransferEvent::Execute)?;

        let lines = transfer.execution_lines()?;
        let StockRoute {
            source: source_id,
            destination: destination_id,
        } = transfer.stock_route();

        let locked = lock_stock(&mut tx, &[source_id, destination_id], &part_ids(&lines)).await?;
        let source = locked.for_center(source_id);
        let destination = locked.for_center(destination_id);

        let movements = match plan_transfer(&lines, &source, &destination) {
            Ok(movements) => movements,
            Err(shortfalls) => {
                tx.rollback().await?;
                tracing::warn!(
                    %transfer_id,
                    short_lines = shortfalls.len(),
                    "transfer execution refused"
                );
                return Err(self.catalog.insufficient_inventory(shortfalls).await);
            }
        };

        if let Some(movement) = movements.iter().find(|m| m.overflows_destination()) {
            tx.rollback().await?;
            return Err(capacity_exceeded(destination_id, movement.part_id));
        }

        let mut results = Vec::with_capacity(movements.len());
        for movement in &movements {
            let part_id = movement.part_id;
            let unit_cost = source.get(&part_id).and_then(|level| level.unit_cost);

            let source_remaining =
                decrement_stock(&mut tx, source_id, part_id, movement.quantity).await?;
            let (destination_available, destination_created) = increment_or_create_stock(
                &mut tx,
                destination_id,
                part_id,
                movement.quantity,
                unit_cost,
            )
            .await?;

            tracing::info!(
                %transfer_id,
                %part_id,
                quantity = movement.quantity,
                source_remaining,
                destination_available,
                destination_created,
                "stock moved"
            );

            results.push(TransferItemResult {
                part_id,
                quantity: as_quantity(movement.quantity)?,
                source_remaining,
                destination_available,
                destination_created,
            });
        }

        let updated =
            Self::store(&mut tx, transfer_id, next, None, transfer.notes.as_deref()).await?;
        tx.commit().await?;

        tracing::info!(
            %transfer_id,
            from = %transfer.status,
            lines = results.len(),
            "transfer executed"
        );

        Ok(TransferExecution {
            transfer: updated,
            results,
        })
    }

    /// Withdraw a request before any stock has moved
    pub async fn cancel(&self, actor: &AuthUser, transfer_id: Uuid) -> AppResult<InterCenterTransfer> {
        let mut tx = self.db.begin().await?;
        let owned = Self::fetch(&mut tx, transfer_id, true).await?;
        owned.authorize(actor, TransferEvent::Cancel)?;
        let transfer = owned.transfer;
        let next = transfer.status.apply(TransferEvent::Cancel)?;

        let updated =
            Self::store(&mut tx, transfer_id, next, None, transfer.notes.as_deref()).await?;
        tx.commit().await?;

        tracing::info!(%transfer_id, from = %transfer.status, "transfer cancelled");

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_note() {
        assert_eq!(append_note(None, None), None);
        assert_eq!(append_note(None, Some("  urgent ")), Some("urgent".to_string()));
        assert_eq!(
            append_note(Some("urgent"), Some("only 4 left")),
            Some("urgent\nonly 4 left".to_string())
        );
        assert_eq!(append_note(Some("urgent"), Some("   ")), Some("urgent".to_string()));
    }

    #[test]
    fn test_authorize_by_party() {
        let (requester, holder) = (Uuid::new_v4(), Uuid::new_v4());
        let owned = OwnedTransfer {
            transfer: InterCenterTransfer {
                id: Uuid::new_v4(),
                from_center_id: Uuid::new_v4(),
                to_center_id: Uuid::new_v4(),
                requested_by: requester,
                items: vec![],
                counter_offer_items: vec![],
                status: TransferStatus::Pending,
                notes: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
                completed_at: None,
            },
            from_owner: requester,
            to_owner: holder,
        };
        let user = |user_id, role| AuthUser { user_id, role };

        assert!(owned
            .authorize(&user(holder, shared::Role::Staff), TransferEvent::Accept)
            .is_ok());
        assert!(owned
            .authorize(&user(requester, shared::Role::Staff), TransferEvent::Accept)
            .is_err());
        assert!(owned
            .authorize(&user(requester, shared::Role::Staff), TransferEvent::Cancel)
            .is_ok());
        // Admins can read but not act for a center
        assert!(owned
            .authorize(&user(Uuid::new_v4(), shared::Role::Admin), TransferEvent::Execute)
            .is_err());
        assert!(owned.is_visible_to(&user(Uuid::new_v4(), shared::Role::Admin)));
    }
}
