//! Stock sufficiency checks and movement planning
//!
//! Both core flows follow the same shape: lock the relevant inventory rows,
//! build a plan from their current values, and only write if the plan is
//! clean. Every function here is all-or-nothing: one short line rejects the
//! whole request and the error lists every short line, not just the first.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A requested (part, quantity) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub part_id: Uuid,
    pub quantity: i32,
}

impl StockLine {
    pub fn new(part_id: Uuid, quantity: i32) -> Self {
        Self { part_id, quantity }
    }
}

/// The current state of one inventory row as seen inside a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub part_id: Uuid,
    pub available_quantity: i32,
    pub unit_cost: Option<Decimal>,
}

/// Why a line could not be served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallReason {
    MissingRecord,
    MissingUnitCost,
    InsufficientQuantity,
}

impl ShortfallReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShortfallReason::MissingRecord => "no inventory record",
            ShortfallReason::MissingUnitCost => "no positive unit cost",
            ShortfallReason::InsufficientQuantity => "insufficient quantity",
        }
    }
}

/// One offending part in a rejected request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub part_id: Uuid,
    pub requested: i64,
    pub available: i64,
    pub reason: ShortfallReason,
}

impl std::fmt::Display for Shortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "part {}: requested {}, available {} ({})",
            self.part_id,
            self.requested,
            self.available,
            self.reason.as_str()
        )
    }
}

/// Sum quantities per part. Keys come back in part-id order, which is also
/// the order rows must be locked in.
pub fn aggregate_lines<'a, I>(lines: I) -> BTreeMap<Uuid, i64>
where
    I: IntoIterator<Item = &'a StockLine>,
{
    let mut totals = BTreeMap::new();
    for line in lines {
        *totals.entry(line.part_id).or_insert(0i64) += i64::from(line.quantity);
    }
    totals
}

/// Check that every part has a record with enough available stock.
///
/// Returns the aggregated demand per part on success.
pub fn check_availability(
    lines: &[StockLine],
    stock: &HashMap<Uuid, StockLevel>,
) -> Result<BTreeMap<Uuid, i64>, Vec<Shortfall>> {
    let demand = aggregate_lines(lines);
    let shortfalls: Vec<Shortfall> = demand
        .iter()
        .filter_map(|(part_id, &requested)| match stock.get(part_id) {
            None => Some(Shortfall {
                part_id: *part_id,
                requested,
                available: 0,
                reason: ShortfallReason::MissingRecord,
            }),
            Some(level) if i64::from(level.available_quantity) < requested => Some(Shortfall {
                part_id: *part_id,
                requested,
                available: i64::from(level.available_quantity),
                reason: ShortfallReason::InsufficientQuantity,
            }),
            Some(_) => None,
        })
        .collect();

    if shortfalls.is_empty() {
        Ok(demand)
    } else {
        Err(shortfalls)
    }
}

/// A checklist line priced at the unit cost captured during acceptance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostedLine {
    pub part_id: Uuid,
    pub quantity: i32,
    pub unit_cost: Decimal,
    pub line_cost: Decimal,
}

/// Result of planning a checklist's parts consumption
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumptionPlan {
    /// Lines in their original order, each with its captured unit cost
    pub lines: Vec<CostedLine>,
    /// Total to subtract per part
    pub decrements: BTreeMap<Uuid, i64>,
    pub total_cost: Decimal,
}

/// Plan the consumption of `lines` against `stock`.
///
/// Every part needs a record, a positive unit cost and enough available
/// quantity for the aggregated demand.
pub fn plan_consumption(
    lines: &[StockLine],
    stock: &HashMap<Uuid, StockLevel>,
) -> Result<ConsumptionPlan, Vec<Shortfall>> {
    let demand = aggregate_lines(lines);
    let mut shortfalls = Vec::new();

    for (part_id, &requested) in &demand {
        let shortfall = match stock.get(part_id) {
            None => Some((0, ShortfallReason::MissingRecord)),
            Some(level) => {
                let available = i64::from(level.available_quantity);
                if !level.unit_cost.is_some_and(|cost| cost > Decimal::ZERO) {
                    Some((available, ShortfallReason::MissingUnitCost))
                } else if available < requested {
                    Some((available, ShortfallReason::InsufficientQuantity))
                } else {
                    None
                }
            }
        };
        if let Some((available, reason)) = shortfall {
            shortfalls.push(Shortfall {
                part_id: *part_id,
                requested,
                available,
                reason,
            });
        }
    }

    if !shortfalls.is_empty() {
        return Err(shortfalls);
    }

    let costed: Vec<CostedLine> = lines
        .iter()
        .map(|line| {
            // Presence and positivity checked above
            let unit_cost = stock[&line.part_id].unit_cost.unwrap_or(Decimal::ZERO);
            CostedLine {
                part_id: line.part_id,
                quantity: line.quantity,
                unit_cost,
                line_cost: unit_cost * Decimal::from(line.quantity),
            }
        })
        .collect();
    let total_cost = costed.iter().map(|line| line.line_cost).sum();

    Ok(ConsumptionPlan {
        lines: costed,
        decrements: demand,
        total_cost,
    })
}

/// Most a single inventory row can hold
pub const MAX_ROW_QUANTITY: i64 = i32::MAX as i64;

/// A planned move of one part from the holder to the requester
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub part_id: Uuid,
    pub quantity: i64,
    pub source_before: i64,
    pub source_after: i64,
    pub destination_before: i64,
    pub destination_after: i64,
    /// The requester had no record for this part and one will be created
    pub creates_destination: bool,
}

impl StockMovement {
    /// The requester's row could not hold the moved quantity
    pub fn overflows_destination(&self) -> bool {
        self.destination_after > MAX_ROW_QUANTITY
    }
}

/// Plan a transfer of `lines` from `source` stock into `destination` stock.
///
/// Fails with every short line if the source cannot cover the aggregated
/// demand. A part missing from `destination` is planned as a new record.
pub fn plan_transfer(
    lines: &[StockLine],
    source: &HashMap<Uuid, StockLevel>,
    destination: &HashMap<Uuid, StockLevel>,
) -> Result<Vec<StockMovement>, Vec<Shortfall>> {
    let demand = check_availability(lines, source)?;

    Ok(demand
        .into_iter()
        .map(|(part_id, quantity)| {
            let source_before = i64::from(source[&part_id].available_quantity);
            let existing = destination.get(&part_id);
            let destination_before = existing.map_or(0, |d| i64::from(d.available_quantity));
            StockMovement {
                part_id,
                quantity,
                source_before,
                source_after: source_before - quantity,
                destination_before,
                destination_after: destination_before + quantity,
                creates_destination: existing.is_none(),
            }
        })
        .collect())
}

/// Index stock levels by part id
pub fn index_levels<I>(levels: I) -> HashMap<Uuid, StockLevel>
where
    I: IntoIterator<Item = StockLevel>,
{
    levels.into_iter().map(|level| (level.part_id, level)).collect()
}
