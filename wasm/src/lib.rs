//! WebAssembly module for the EV Service Center Platform
//!
//! Lets the staff and technician UI run the same rules as the server before a
//! request is sent:
//! - Checklist cost preview against a center's stock
//! - Transfer actions available to each side for a status
//! - Checklist and counter-offer validation
//!
//! Structured inputs and outputs cross the boundary as JSON strings.

use serde::Serialize;
use shared::{
    parse_checklist_parts, parse_counter_offer_items, plan_consumption, index_levels,
    CounterOfferItemInput, CreateChecklistRequest, FieldError, Shortfall, StockLevel, StockLine,
    TransferParty, TransferStatus,
};
use wasm_bindgen::prelude::*;

#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum CostPreview {
    Ok {
        total_cost: String,
        lines: Vec<shared::CostedLine>,
    },
    Insufficient {
        shortfalls: Vec<Shortfall>,
    },
}

fn js_error(context: &str, err: impl std::fmt::Display) -> JsValue {
    let message = format!("{}: {}", context, err);
    web_sys::console::warn_1(&JsValue::from_str(&message));
    JsValue::from_str(&message)
}

fn preview(lines_json: &str, stock_json: &str) -> Result<CostPreview, String> {
    let lines: Vec<StockLine> =
        serde_json::from_str(lines_json).map_err(|e| format!("Invalid lines JSON: {}", e))?;
    let stock: Vec<StockLevel> =
        serde_json::from_str(stock_json).map_err(|e| format!("Invalid stock JSON: {}", e))?;

    Ok(match plan_consumption(&lines, &index_levels(stock)) {
        Ok(plan) => CostPreview::Ok {
            total_cost: plan.total_cost.to_string(),
            lines: plan.lines,
        },
        Err(shortfalls) => CostPreview::Insufficient { shortfalls },
    })
}

/// Price a checklist's lines against stock levels the way acceptance would.
///
/// Returns `{"outcome":"ok",...}` or `{"outcome":"insufficient","shortfalls":[...]}`.
#[wasm_bindgen]
pub fn preview_checklist_cost(lines_json: &str, stock_json: &str) -> Result<String, JsValue> {
    let result = preview(lines_json, stock_json).map_err(|e| js_error("preview", e))?;
    serde_json::to_string(&result).map_err(|e| js_error("preview", e))
}

fn allowed_actions(status: &str, party: &str) -> Result<Vec<&'static str>, String> {
    let status: TransferStatus = status.parse().map_err(|e| format!("{}", e))?;
    let party = match party {
        "requester" => TransferParty::Requester,
        "holder" => TransferParty::Holder,
        other => return Err(format!("Unknown party '{}'", other)),
    };

    Ok(status
        .allowed_events(party)
        .iter()
        .map(|event| event.as_str())
        .collect())
}

/// Actions the given side ("requester" or "holder") may take on a transfer
#[wasm_bindgen]
pub fn allowed_transfer_actions(status: &str, party: &str) -> Result<js_sys::Array, JsValue> {
    let actions = allowed_actions(status, party).map_err(|e| js_error("transfer actions", e))?;
    Ok(actions.into_iter().map(JsValue::from_str).collect())
}

fn field_errors<T>(result: Result<T, Vec<FieldError>>) -> Vec<FieldError> {
    result.err().unwrap_or_default()
}

fn checklist_errors(request_json: &str) -> Result<Vec<FieldError>, String> {
    let request: CreateChecklistRequest = serde_json::from_str(request_json)
        .map_err(|e| format!("Invalid checklist JSON: {}", e))?;
    Ok(field_errors(parse_checklist_parts(&request)))
}

fn counter_offer_errors(items_json: &str) -> Result<Vec<FieldError>, String> {
    let items: Vec<CounterOfferItemInput> = serde_json::from_str(items_json)
        .map_err(|e| format!("Invalid counter offer JSON: {}", e))?;
    Ok(field_errors(parse_counter_offer_items(Some(&items))))
}

/// Field errors for a checklist creation request; `[]` when valid
#[wasm_bindgen]
pub fn validate_checklist(request_json: &str) -> Result<String, JsValue> {
    let errors = checklist_errors(request_json).map_err(|e| js_error("checklist", e))?;
    serde_json::to_string(&errors).map_err(|e| js_error("checklist", e))
}

/// Field errors for a list of counter-offer lines; `[]` when valid
#[wasm_bindgen]
pub fn validate_counter_offer(items_json: &str) -> Result<String, JsValue> {
    let errors = counter_offer_errors(items_json).map_err(|e| js_error("counter offer", e))?;
    serde_json::to_string(&errors).map_err(|e| js_error("counter offer", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PART: &str = "6f1c2a8e-3f7b-4c51-9b0e-2d8a4e5f7a10";

    #[test]
    fn test_preview_prices_lines() {
        let lines = format!(r#"[{{"part_id":"{PART}","quantity":3}}]"#);
        let stock =
            format!(r#"[{{"part_id":"{PART}","available_quantity":5,"unit_cost":"100"}}]"#);

        match preview(&lines, &stock).unwrap() {
            CostPreview::Ok { total_cost, .. } => assert_eq!(total_cost, "300"),
            CostPreview::Insufficient { .. } => panic!("expected a priced plan"),
        }
    }

    #[test]
    fn test_preview_reports_shortfall() {
        let lines = format!(r#"[{{"part_id":"{PART}","quantity":3}}]"#);
        let stock =
            format!(r#"[{{"part_id":"{PART}","available_quantity":2,"unit_cost":"100"}}]"#);

        match preview(&lines, &stock).unwrap() {
            CostPreview::Insufficient { shortfalls } => {
                assert_eq!(shortfalls.len(), 1);
                assert_eq!(shortfalls[0].available, 2);
            }
            CostPreview::Ok { .. } => panic!("expected a shortfall"),
        }
    }

    #[test]
    fn test_allowed_actions() {
        assert_eq!(
            allowed_actions("pending", "holder").unwrap(),
            vec!["accept", "reject", "counter_offer"]
        );
        assert_eq!(allowed_actions("pending", "requester").unwrap(), vec!["cancel"]);
        assert_eq!(allowed_actions("accepted", "holder").unwrap(), vec!["execute"]);
        assert!(allowed_actions("completed", "holder").unwrap().is_empty());
        assert!(allowed_actions("shipped", "holder").is_err());
        assert!(allowed_actions("pending", "customer").is_err());
    }

    #[test]
    fn test_counter_offer_errors() {
        let items = format!(r#"[{{"part_id":"{PART}","quantity":5,"available_quantity":2}}]"#);
        let errors = counter_offer_errors(&items).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "counter_offer_items[0].available_quantity");

        let items = format!(r#"[{{"part_id":"{PART}","quantity":4}}]"#);
        assert!(counter_offer_errors(&items).unwrap().is_empty());
    }

    #[test]
    fn test_checklist_errors() {
        let request = format!(
            r#"{{"appointment_id":"{PART}","issue_type_id":"{PART}","issue_description":"No charge",
                "solution_applied":"Replaced fuse","parts":[{{"part_id":"{PART}","quantity":0}}]}}"#
        );
        let errors = checklist_errors(&request).unwrap();
        assert_eq!(errors[0].field, "parts[0].quantity");
    }
}
