//! Request validation for the EV Service Center Platform
//!
//! Field-level rules live on the request DTOs (`validator` derives). The
//! functions here run those rules, add the cross-field checks, and turn a raw
//! request into the domain values the services work with. Each returns either
//! the parsed value or every field error found.

use rust_decimal::Decimal;
use uuid::Uuid;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::models::{
    ChecklistPart, CounterOfferItem, CounterOfferItemInput, CreateChecklistRequest,
    CreateTransferRequest, TransferItem, UpsertStockRequest,
};
use crate::types::FieldError;

/// Outcome of validating a request
pub type Validated<T> = Result<T, Vec<FieldError>>;

/// Flatten `validator` errors into `field` / `items[0].quantity` style paths
pub fn flatten_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut out = Vec::new();
    collect_errors("", errors, &mut out);
    out.sort_by(|a, b| a.field.cmp(&b.field));
    out
}

fn collect_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", error.code));
                    out.push(FieldError::new(path.clone(), message));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_errors(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_errors(&format!("{}[{}]", path, index), inner, out);
                }
            }
        }
    }
}

/// Run the derived field rules on a request
pub fn validate_fields<T: Validate>(request: &T) -> Validated<()> {
    request.validate().map_err(|e| flatten_errors(&e))
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Validate a checklist creation request and return its part lines
pub fn parse_checklist_parts(request: &CreateChecklistRequest) -> Validated<Vec<ChecklistPart>> {
    let mut errors = match validate_fields(request) {
        Ok(()) => Vec::new(),
        Err(errors) => errors,
    };

    if request.issue_description.trim().is_empty() {
        errors.push(FieldError::new("issue_description", "Issue description is required"));
    }
    if request.solution_applied.trim().is_empty() {
        errors.push(FieldError::new("solution_applied", "Solution applied is required"));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(request
        .parts
        .iter()
        .map(|part| ChecklistPart {
            part_id: part.part_id,
            quantity: part.quantity,
            unit_cost: None,
        })
        .collect())
}

/// Validate a transfer request and return its items
///
/// `from_center_id` is the already-resolved requesting center.
pub fn parse_transfer_request(
    request: &CreateTransferRequest,
    from_center_id: Uuid,
) -> Validated<Vec<TransferItem>> {
    let mut errors = match validate_fields(request) {
        Ok(()) => Vec::new(),
        Err(errors) => errors,
    };

    if request.items.is_empty() {
        errors.push(FieldError::new("items", "At least one item is required"));
    }
    if request.to_center_id == from_center_id {
        errors.push(FieldError::new(
            "to_center_id",
            "A center cannot request a transfer from itself",
        ));
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(request
        .items
        .iter()
        .map(|item| TransferItem {
            part_id: item.part_id,
            quantity: item.quantity,
            supplier: trimmed(&item.supplier),
        })
        .collect())
}

/// Validate counter-offer lines
///
/// The list must be present and non-empty, every quantity positive, and
/// `available_quantity` (defaulting to `quantity`) no smaller than `quantity`.
pub fn parse_counter_offer_items(
    items: Option<&[CounterOfferItemInput]>,
) -> Validated<Vec<CounterOfferItem>> {
    let items = match items {
        Some(items) if !items.is_empty() => items,
        _ => {
            return Err(vec![FieldError::new(
                "counter_offer_items",
                "Counter offer requires at least one item",
            )])
        }
    };

    let mut errors = Vec::new();
    let mut parsed = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
        let prefix = format!("counter_offer_items[{}]", index);
        if let Err(e) = item.validate() {
            errors.extend(flatten_errors(&e).into_iter().map(|mut err| {
                err.field = format!("{}.{}", prefix, err.field);
                err
            }));
            continue;
        }

        let available_quantity = item.available_quantity.unwrap_or(item.quantity);
        if available_quantity < item.quantity {
            errors.push(FieldError::new(
                format!("{}.available_quantity", prefix),
                "Available quantity cannot be less than the offered quantity",
            ));
            continue;
        }

        parsed.push(CounterOfferItem {
            part_id: item.part_id,
            quantity: item.quantity,
            available_quantity,
            supplier: trimmed(&item.supplier),
        });
    }

    if errors.is_empty() {
        Ok(parsed)
    } else {
        Err(errors)
    }
}

/// Validate a stock upsert request
pub fn validate_upsert_stock(request: &UpsertStockRequest) -> Validated<()> {
    let mut errors = match validate_fields(request) {
        Ok(()) => Vec::new(),
        Err(errors) => errors,
    };

    if let Some(cost) = request.unit_cost {
        if cost <= Decimal::ZERO {
            errors.push(FieldError::new("unit_cost", "Unit cost must be positive"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Distinct ids in first-seen order
pub fn distinct_ids<I>(ids: I) -> Vec<Uuid>
where
    I: IntoIterator<Item = Uuid>,
{
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChecklistPartInput, TransferItemInput};

    fn checklist_request(parts: Vec<ChecklistPartInput>) -> CreateChecklistRequest {
        CreateChecklistRequest {
            appointment_id: Uuid::new_v4(),
            issue_type_id: Uuid::new_v4(),
            issue_description: "Battery not charging".to_string(),
            solution_applied: "Replaced charge port".to_string(),
            parts,
        }
    }

    fn transfer_request(to: Uuid, items: Vec<TransferItemInput>) -> CreateTransferRequest {
        CreateTransferRequest {
            to_center_id: to,
            from_center_id: None,
            items,
            notes: None,
        }
    }

    #[test]
    fn test_checklist_without_parts_is_valid() {
        let parts = parse_checklist_parts(&checklist_request(vec![])).unwrap();
        assert!(parts.is_empty());
    }

    #[test]
    fn test_checklist_rejects_zero_quantity() {
        let request = checklist_request(vec![
            ChecklistPartInput {
                part_id: Uuid::new_v4(),
                quantity: 2,
            },
            ChecklistPartInput {
                part_id: Uuid::new_v4(),
                quantity: 0,
            },
        ]);

        let errors = parse_checklist_parts(&request).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "parts[1].quantity");
    }

    #[test]
    fn test_checklist_rejects_blank_text() {
        let mut request = checklist_request(vec![]);
        request.solution_applied = "   ".to_string();

        let errors = parse_checklist_parts(&request).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "solution_applied"));
    }

    #[test]
    fn test_transfer_rejects_self_request() {
        let center = Uuid::new_v4();
        let request = transfer_request(
            center,
            vec![TransferItemInput {
                part_id: Uuid::new_v4(),
                quantity: 1,
                supplier: None,
            }],
        );

        let errors = parse_transfer_request(&request, center).unwrap_err();
        assert_eq!(errors[0].field, "to_center_id");
    }

    #[test]
    fn test_transfer_rejects_empty_and_negative() {
        let errors = parse_transfer_request(
            &transfer_request(Uuid::new_v4(), vec![]),
            Uuid::new_v4(),
        )
        .unwrap_err();
        assert!(errors.iter().any(|e| e.field == "items"));

        let errors = parse_transfer_request(
            &transfer_request(
                Uuid::new_v4(),
                vec![TransferItemInput {
                    part_id: Uuid::new_v4(),
                    quantity: -3,
                    supplier: None,
                }],
            ),
            Uuid::new_v4(),
        )
        .unwrap_err();
        assert_eq!(errors[0].field, "items[0].quantity");
    }

    #[test]
    fn test_transfer_trims_supplier() {
        let items = parse_transfer_request(
            &transfer_request(
                Uuid::new_v4(),
                vec![TransferItemInput {
                    part_id: Uuid::new_v4(),
                    quantity: 1,
                    supplier: Some("  ".to_string()),
                }],
            ),
            Uuid::new_v4(),
        )
        .unwrap();
        assert_eq!(items[0].supplier, None);
    }

    #[test]
    fn test_counter_offer_defaults_available_quantity() {
        let items = parse_counter_offer_items(Some(&[CounterOfferItemInput {
            part_id: Uuid::new_v4(),
            quantity: 4,
            available_quantity: None,
            supplier: None,
        }]))
        .unwrap();
        assert_eq!(items[0].available_quantity, 4);
    }

    #[test]
    fn test_counter_offer_rejects_bad_lines() {
        assert!(parse_counter_offer_items(None).is_err());
        assert!(parse_counter_offer_items(Some(&[])).is_err());

        let errors = parse_counter_offer_items(Some(&[
            CounterOfferItemInput {
                part_id: Uuid::new_v4(),
                quantity: 0,
                available_quantity: Some(3),
                supplier: None,
            },
            CounterOfferItemInput {
                part_id: Uuid::new_v4(),
                quantity: 5,
                available_quantity: Some(2),
                supplier: None,
            },
        ]))
        .unwrap_err();

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "counter_offer_items[0].quantity");
        assert_eq!(errors[1].field, "counter_offer_items[1].available_quantity");
    }

    #[test]
    fn test_upsert_stock_rules() {
        let ok = UpsertStockRequest {
            restock_quantity: 5,
            minimum_stock: Some(2),
            unit_cost: Some(Decimal::from(120)),
        };
        assert!(validate_upsert_stock(&ok).is_ok());

        let bad = UpsertStockRequest {
            restock_quantity: -1,
            minimum_stock: None,
            unit_cost: Some(Decimal::ZERO),
        };
        assert_eq!(validate_upsert_stock(&bad).unwrap_err().len(), 2);
    }

    #[test]
    fn test_distinct_ids_keeps_first_seen_order() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(distinct_ids([a, b, a, b]), vec![a, b]);
    }
}
