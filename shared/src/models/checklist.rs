//! Repair checklist models and lifecycle
//!
//! ```text
//! pending --accept--> accepted --complete--> completed
//! pending --cancel--> canceled
//! accepted --cancel--> canceled
//! ```

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ParseStatusError, TransitionError};
use crate::stock::StockLine;

/// Checklist status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistStatus {
    Pending,
    Accepted,
    Completed,
    Canceled,
}

/// Something that moves a checklist between statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecklistEvent {
    Accept,
    Complete,
    Cancel,
}

impl ChecklistEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecklistEvent::Accept => "accept",
            ChecklistEvent::Complete => "complete",
            ChecklistEvent::Cancel => "cancel",
        }
    }
}

impl ChecklistStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecklistStatus::Pending => "pending",
            ChecklistStatus::Accepted => "accepted",
            ChecklistStatus::Completed => "completed",
            ChecklistStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ChecklistStatus::Completed | ChecklistStatus::Canceled)
    }

    /// Whether canceling from this status puts consumed stock back.
    ///
    /// Only an accepted checklist has consumed anything. An explicit choice in
    /// the request wins over the server default.
    pub fn restores_stock_on_cancel(self, requested: Option<bool>, default: bool) -> bool {
        self == ChecklistStatus::Accepted && requested.unwrap_or(default)
    }

    /// Status after `event`, or an error if the event is not allowed here
    pub fn apply(self, event: ChecklistEvent) -> Result<ChecklistStatus, TransitionError> {
        use ChecklistEvent::*;
        use ChecklistStatus::*;

        match (self, event) {
            (Pending, Accept) => Ok(Accepted),
            (Accepted, Complete) => Ok(Completed),
            (Pending | Accepted, Cancel) => Ok(Canceled),
            (from, event) => Err(TransitionError::new(from.as_str(), event.as_str())),
        }
    }
}

impl FromStr for ChecklistStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ChecklistStatus::Pending),
            "accepted" => Ok(ChecklistStatus::Accepted),
            "completed" => Ok(ChecklistStatus::Completed),
            "canceled" => Ok(ChecklistStatus::Canceled),
            other => Err(ParseStatusError {
                kind: "checklist",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ChecklistStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One part line on a checklist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistPart {
    pub part_id: Uuid,
    pub quantity: i32,
    /// Unit cost captured from the inventory record when the checklist was accepted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_cost: Option<Decimal>,
}

impl ChecklistPart {
    pub fn stock_line(&self) -> StockLine {
        StockLine::new(self.part_id, self.quantity)
    }
}

/// A technician's diagnosis and repair record for one appointment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checklist {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub issue_type_id: Uuid,
    pub technician_id: Uuid,
    pub issue_description: String,
    pub solution_applied: String,
    pub parts: Vec<ChecklistPart>,
    pub status: ChecklistStatus,
    pub total_cost: Option<Decimal>,
    pub cancellation_note: Option<String>,
    pub accepted_by: Option<Uuid>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Checklist {
    pub fn stock_lines(&self) -> Vec<StockLine> {
        self.parts.iter().map(ChecklistPart::stock_line).collect()
    }
}

/// Input for creating a checklist
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateChecklistRequest {
    pub appointment_id: Uuid,
    pub issue_type_id: Uuid,

    #[validate(length(min = 1, max = 4000, message = "Issue description is required"))]
    pub issue_description: String,

    #[validate(length(min = 1, max = 4000, message = "Solution applied is required"))]
    pub solution_applied: String,

    #[serde(default)]
    #[validate]
    pub parts: Vec<ChecklistPartInput>,
}

/// Part line on a create request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChecklistPartInput {
    pub part_id: Uuid,

    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

/// Input for canceling a checklist
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CancelChecklistRequest {
    #[validate(length(max = 1000, message = "Note must be at most 1000 characters"))]
    pub note: Option<String>,

    /// Put consumed parts back into stock when canceling an accepted checklist.
    /// Falls back to the server default when absent.
    pub restore_inventory: Option<bool>,
}

/// Result of accepting a checklist
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistAcceptance {
    pub checklist: Checklist,
    pub total_cost: Decimal,
    /// Number of inventory records decremented
    pub inventory_updated: usize,
}

/// Result of canceling a checklist
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistCancellation {
    pub checklist: Checklist,
    pub inventory_restored: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ChecklistStatus; 4] = [
        ChecklistStatus::Pending,
        ChecklistStatus::Accepted,
        ChecklistStatus::Completed,
        ChecklistStatus::Canceled,
    ];

    #[test]
    fn test_happy_path() {
        let status = ChecklistStatus::Pending
            .apply(ChecklistEvent::Accept)
            .and_then(|s| s.apply(ChecklistEvent::Complete))
            .unwrap();
        assert_eq!(status, ChecklistStatus::Completed);
    }

    #[test]
    fn test_cancel_from_open_statuses() {
        assert_eq!(
            ChecklistStatus::Pending.apply(ChecklistEvent::Cancel),
            Ok(ChecklistStatus::Canceled)
        );
        assert_eq!(
            ChecklistStatus::Accepted.apply(ChecklistEvent::Cancel),
            Ok(ChecklistStatus::Canceled)
        );
    }

    #[test]
    fn test_restore_on_cancel_needs_acceptance() {
        for status in [ChecklistStatus::Pending, ChecklistStatus::Completed, ChecklistStatus::Canceled] {
            assert!(!status.restores_stock_on_cancel(Some(true), true));
        }
    }

    #[test]
    fn test_restore_on_cancel_request_overrides_default() {
        let accepted = ChecklistStatus::Accepted;
        assert!(accepted.restores_stock_on_cancel(None, true));
        assert!(!accepted.restores_stock_on_cancel(None, false));
        assert!(accepted.restores_stock_on_cancel(Some(true), false));
        assert!(!accepted.restores_stock_on_cancel(Some(false), true));
    }

    #[test]
    fn test_complete_requires_acceptance() {
        let err = ChecklistStatus::Pending
            .apply(ChecklistEvent::Complete)
            .unwrap_err();
        assert_eq!(err.from, "pending");
        assert_eq!(err.action, "complete");
    }

    #[test]
    fn test_terminal_statuses_are_closed() {
        for status in ALL.iter().filter(|s| s.is_terminal()) {
            for event in [ChecklistEvent::Accept, ChecklistEvent::Complete, ChecklistEvent::Cancel] {
                assert!(status.apply(event).is_err(), "{status} accepted {event:?}");
            }
        }
    }

    #[test]
    fn test_status_round_trips_through_text() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<ChecklistStatus>(), Ok(status));
        }
        assert!("cancelled".parse::<ChecklistStatus>().is_err());
    }
}
