//! Inter-center parts transfer negotiation
//!
//! `from_center` is the requester: it asks for parts and receives stock when
//! the transfer executes. `to_center` is the holder: it decides on the request
//! and gives stock up at execution. The names follow the direction of the
//! request, not the direction the parts travel.
//!
//! ```text
//! pending --accept--> accepted --execute--> completed
//! pending --reject--> rejected
//! pending --counter_offer--> counter_offer
//! counter_offer --approve--> counter_accept --execute--> completed
//! counter_offer --reject--> counter_rejected
//! pending | counter_offer | counter_rejected --cancel--> cancelled
//! ```

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ParseStatusError, TransitionError};
use crate::stock::StockLine;

/// Transfer status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Accepted,
    Rejected,
    CounterOffer,
    CounterAccept,
    CounterRejected,
    Completed,
    Cancelled,
}

/// Which side of the negotiation may perform an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferParty {
    /// Owner of `from_center`
    Requester,
    /// Owner of `to_center`
    Holder,
}

/// Something that moves a transfer between statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferEvent {
    Accept,
    Reject,
    CounterOffer,
    ApproveCounter,
    RejectCounter,
    Execute,
    Cancel,
}

impl TransferEvent {
    pub const ALL: [TransferEvent; 7] = [
        TransferEvent::Accept,
        TransferEvent::Reject,
        TransferEvent::CounterOffer,
        TransferEvent::ApproveCounter,
        TransferEvent::RejectCounter,
        TransferEvent::Execute,
        TransferEvent::Cancel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferEvent::Accept => "accept",
            TransferEvent::Reject => "reject",
            TransferEvent::CounterOffer => "counter_offer",
            TransferEvent::ApproveCounter => "approve_counter_offer",
            TransferEvent::RejectCounter => "reject_counter_offer",
            TransferEvent::Execute => "execute",
            TransferEvent::Cancel => "cancel",
        }
    }

    /// The party entitled to perform this event
    pub fn party(&self) -> TransferParty {
        match self {
            TransferEvent::Accept
            | TransferEvent::Reject
            | TransferEvent::CounterOffer
            | TransferEvent::Execute => TransferParty::Holder,
            TransferEvent::ApproveCounter
            | TransferEvent::RejectCounter
            | TransferEvent::Cancel => TransferParty::Requester,
        }
    }
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Accepted => "accepted",
            TransferStatus::Rejected => "rejected",
            TransferStatus::CounterOffer => "counter_offer",
            TransferStatus::CounterAccept => "counter_accept",
            TransferStatus::CounterRejected => "counter_rejected",
            TransferStatus::Completed => "completed",
            TransferStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferStatus::Rejected | TransferStatus::Completed | TransferStatus::Cancelled
        )
    }

    /// Status after `event`, or an error if the event is not allowed here
    pub fn apply(self, event: TransferEvent) -> Result<TransferStatus, TransitionError> {
        use TransferEvent as E;
        use TransferStatus as S;

        match (self, event) {
            (S::Pending, E::Accept) => Ok(S::Accepted),
            (S::Pending, E::Reject) => Ok(S::Rejected),
            (S::Pending, E::CounterOffer) => Ok(S::CounterOffer),
            (S::CounterOffer, E::ApproveCounter) => Ok(S::CounterAccept),
            (S::CounterOffer, E::RejectCounter) => Ok(S::CounterRejected),
            (S::Accepted | S::CounterAccept, E::Execute) => Ok(S::Completed),
            (S::Pending | S::CounterOffer | S::CounterRejected, E::Cancel) => Ok(S::Cancelled),
            (from, event) => Err(TransitionError::new(from.as_str(), event.as_str())),
        }
    }

    /// Events the given party may perform from this status
    pub fn allowed_events(&self, party: TransferParty) -> Vec<TransferEvent> {
        TransferEvent::ALL
            .into_iter()
            .filter(|event| event.party() == party && self.apply(*event).is_ok())
            .collect()
    }
}

impl FromStr for TransferStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransferStatus::Pending),
            "accepted" => Ok(TransferStatus::Accepted),
            "rejected" => Ok(TransferStatus::Rejected),
            "counter_offer" => Ok(TransferStatus::CounterOffer),
            "counter_accept" => Ok(TransferStatus::CounterAccept),
            "counter_rejected" => Ok(TransferStatus::CounterRejected),
            "completed" => Ok(TransferStatus::Completed),
            "cancelled" => Ok(TransferStatus::Cancelled),
            other => Err(ParseStatusError {
                kind: "transfer",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested part line. Immutable once the transfer is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferItem {
    pub part_id: Uuid,
    pub quantity: i32,
    pub supplier: Option<String>,
}

/// An alternative line proposed by the holder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterOfferItem {
    pub part_id: Uuid,
    /// Amount moved at execution
    pub quantity: i32,
    /// Amount the holder declares it can spare
    pub available_quantity: i32,
    pub supplier: Option<String>,
}

/// One negotiation thread between two centers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterCenterTransfer {
    pub id: Uuid,
    pub from_center_id: Uuid,
    pub to_center_id: Uuid,
    pub requested_by: Uuid,
    pub items: Vec<TransferItem>,
    pub counter_offer_items: Vec<CounterOfferItem>,
    pub status: TransferStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl InterCenterTransfer {
    pub fn requested_lines(&self) -> Vec<StockLine> {
        self.items
            .iter()
            .map(|item| StockLine::new(item.part_id, item.quantity))
            .collect()
    }

    /// Lines moved on execution: the original items after a plain accept, the
    /// counter-offer quantities after an approved counter-offer.
    pub fn execution_lines(&self) -> Result<Vec<StockLine>, TransitionError> {
        match self.status {
            TransferStatus::Accepted => Ok(self.requested_lines()),
            TransferStatus::CounterAccept => Ok(self
                .counter_offer_items
                .iter()
                .map(|item| StockLine::new(item.part_id, item.quantity))
                .collect()),
            other => Err(TransitionError::new(
                other.as_str(),
                TransferEvent::Execute.as_str(),
            )),
        }
    }
}

/// Which center gives stock and which receives it when a transfer executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockRoute {
    pub source: Uuid,
    pub destination: Uuid,
}

impl InterCenterTransfer {
    /// The holder (`to_center_id`) gives and the requester (`from_center_id`)
    /// receives, whatever the field names suggest.
    pub fn stock_route(&self) -> StockRoute {
        StockRoute {
            source: self.to_center_id,
            destination: self.from_center_id,
        }
    }
}

/// Input for opening a transfer request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTransferRequest {
    pub to_center_id: Uuid,

    /// Requesting center; defaults to the center the actor owns
    pub from_center_id: Option<Uuid>,

    #[validate]
    pub items: Vec<TransferItemInput>,

    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

/// Requested line on a create request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TransferItemInput {
    pub part_id: Uuid,

    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,

    #[validate(length(max = 200, message = "Supplier must be at most 200 characters"))]
    pub supplier: Option<String>,
}

/// Holder's decision on a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessAction {
    Accept,
    Reject,
    CounterOffer,
}

impl From<ProcessAction> for TransferEvent {
    fn from(action: ProcessAction) -> Self {
        match action {
            ProcessAction::Accept => TransferEvent::Accept,
            ProcessAction::Reject => TransferEvent::Reject,
            ProcessAction::CounterOffer => TransferEvent::CounterOffer,
        }
    }
}

/// Input for the holder's decision
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProcessTransferRequest {
    pub action: ProcessAction,

    pub counter_offer_items: Option<Vec<CounterOfferItemInput>>,

    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

/// Counter-offer line on a process request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CounterOfferItemInput {
    pub part_id: Uuid,

    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,

    /// Defaults to `quantity`
    #[validate(range(min = 1, message = "Available quantity must be at least 1"))]
    pub available_quantity: Option<i32>,

    #[validate(length(max = 200, message = "Supplier must be at most 200 characters"))]
    pub supplier: Option<String>,
}

/// Requester's answer to a counter-offer. Both spellings are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CounterResponse {
    #[serde(rename = "approve", alias = "counter_accept")]
    Approve,
    #[serde(rename = "reject", alias = "counter_rejected")]
    Reject,
}

impl From<CounterResponse> for TransferEvent {
    fn from(response: CounterResponse) -> Self {
        match response {
            CounterResponse::Approve => TransferEvent::ApproveCounter,
            CounterResponse::Reject => TransferEvent::RejectCounter,
        }
    }
}

/// Input for answering a counter-offer
#[derive(Debug, Clone, Deserialize)]
pub struct RespondCounterOfferRequest {
    pub action: CounterResponse,
}

/// Per-part outcome of an executed transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferItemResult {
    pub part_id: Uuid,
    pub quantity: i32,
    /// Holder's available quantity after the move
    pub source_remaining: i32,
    /// Requester's available quantity after the move
    pub destination_available: i32,
    pub destination_created: bool,
}

/// Result of executing a transfer
#[derive(Debug, Clone, Serialize)]
pub struct TransferExecution {
    pub transfer: InterCenterTransfer,
    pub results: Vec<TransferItemResult>,
}

/// Listing filter relative to the actor's own center
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    /// Requests addressed to the actor's center (actor is the holder)
    Incoming,
    /// Requests the actor's center opened (actor is the requester)
    Outgoing,
    #[default]
    All,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TransferStatus; 8] = [
        TransferStatus::Pending,
        TransferStatus::Accepted,
        TransferStatus::Rejected,
        TransferStatus::CounterOffer,
        TransferStatus::CounterAccept,
        TransferStatus::CounterRejected,
        TransferStatus::Completed,
        TransferStatus::Cancelled,
    ];

    #[test]
    fn test_holder_paths() {
        assert_eq!(
            TransferStatus::Pending.apply(TransferEvent::Accept),
            Ok(TransferStatus::Accepted)
        );
        assert_eq!(
            TransferStatus::Pending.apply(TransferEvent::Reject),
            Ok(TransferStatus::Rejected)
        );
        assert_eq!(
            TransferStatus::Accepted.apply(TransferEvent::Execute),
            Ok(TransferStatus::Completed)
        );
    }

    #[test]
    fn test_counter_offer_path() {
        let status = TransferStatus::Pending
            .apply(TransferEvent::CounterOffer)
            .and_then(|s| s.apply(TransferEvent::ApproveCounter))
            .and_then(|s| s.apply(TransferEvent::Execute))
            .unwrap();
        assert_eq!(status, TransferStatus::Completed);
    }

    #[test]
    fn test_execute_never_skips_negotiation() {
        assert!(TransferStatus::Pending.apply(TransferEvent::Execute).is_err());
        assert!(TransferStatus::CounterOffer.apply(TransferEvent::Execute).is_err());
        assert!(TransferStatus::CounterRejected.apply(TransferEvent::Execute).is_err());
        assert!(TransferStatus::Completed.apply(TransferEvent::Execute).is_err());
    }

    #[test]
    fn test_cancel_windows() {
        let cancellable: Vec<_> = ALL
            .into_iter()
            .filter(|s| s.apply(TransferEvent::Cancel).is_ok())
            .collect();
        assert_eq!(
            cancellable,
            vec![
                TransferStatus::Pending,
                TransferStatus::CounterOffer,
                TransferStatus::CounterRejected
            ]
        );
    }

    #[test]
    fn test_terminal_statuses_are_closed() {
        for status in ALL.iter().filter(|s| s.is_terminal()) {
            for event in TransferEvent::ALL {
                assert!(status.apply(event).is_err(), "{status} accepted {event:?}");
            }
        }
    }

    #[test]
    fn test_counter_rejected_only_cancels() {
        assert_eq!(
            TransferStatus::CounterRejected.allowed_events(TransferParty::Requester),
            vec![TransferEvent::Cancel]
        );
        assert!(TransferStatus::CounterRejected
            .allowed_events(TransferParty::Holder)
            .is_empty());
    }

    #[test]
    fn test_counter_response_spellings() {
        for (raw, expected) in [
            ("\"approve\"", CounterResponse::Approve),
            ("\"counter_accept\"", CounterResponse::Approve),
            ("\"reject\"", CounterResponse::Reject),
            ("\"counter_rejected\"", CounterResponse::Reject),
        ] {
            let parsed: CounterResponse = serde_json::from_str(raw).unwrap();
            assert_eq!(parsed, expected);
        }
        assert!(serde_json::from_str::<CounterResponse>("\"maybe\"").is_err());
    }

    #[test]
    fn test_execution_lines_follow_negotiated_quantities() {
        let part = Uuid::new_v4();
        let mut transfer = InterCenterTransfer {
            id: Uuid::new_v4(),
            from_center_id: Uuid::new_v4(),
            to_center_id: Uuid::new_v4(),
            requested_by: Uuid::new_v4(),
            items: vec![TransferItem {
                part_id: part,
                quantity: 10,
                supplier: None,
            }],
            counter_offer_items: vec![CounterOfferItem {
                part_id: part,
                quantity: 4,
                available_quantity: 6,
                supplier: None,
            }],
            status: TransferStatus::Accepted,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: None,
        };

        assert_eq!(transfer.execution_lines().unwrap()[0].quantity, 10);

        transfer.status = TransferStatus::CounterAccept;
        assert_eq!(transfer.execution_lines().unwrap()[0].quantity, 4);

        transfer.status = TransferStatus::Pending;
        assert!(transfer.execution_lines().is_err());
    }

    #[test]
    fn test_stock_route_sends_holder_stock_to_requester() {
        let (requester, holder) = (Uuid::new_v4(), Uuid::new_v4());
        let transfer = InterCenterTransfer {
            id: Uuid::new_v4(),
            from_center_id: requester,
            to_center_id: holder,
            requested_by: Uuid::new_v4(),
            items: vec![],
            counter_offer_items: vec![],
            status: TransferStatus::Accepted,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: None,
        };

        let route = transfer.stock_route();
        assert_eq!(route.source, holder);
        assert_eq!(route.destination, requester);
    }
}
