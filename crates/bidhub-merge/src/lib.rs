//! Import reconciliation for BidHub: payload parsing and the pure merge
//! engine that folds an external bid list into the live collection.

use std::collections::HashMap;

use bidhub_core::{mint_id, timestamp, Bid, Presence};
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub const CRATE_NAME: &str = "bidhub-merge";

/// Rejections before anything reaches the merge engine. Messages are shown
/// to the user verbatim.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("That does not look like valid JSON.")]
    InvalidJson(#[source] serde_json::Error),
    #[error("JSON must contain a 'bids' array.")]
    MissingBids,
}

/// Parse arbitrary import text into leniently normalized bids. The payload
/// must be an object carrying a `bids` array; each entry is filled out from
/// the default shape.
pub fn parse_import(text: &str) -> Result<Vec<IncomingBid>, ImportError> {
    let value: Value = serde_json::from_str(text).map_err(ImportError::InvalidJson)?;
    let bids = value
        .get("bids")
        .and_then(Value::as_array)
        .ok_or(ImportError::MissingBids)?;
    Ok(bids.iter().map(IncomingBid::from_json_value).collect())
}

/// An import record plus presence markers for the fields that always carry
/// a value after normalization. `stage`, `deliveryStatus` and `probability`
/// take defaults when the payload leaves them out or blank, so "was this
/// explicitly set" has to be decided against the raw payload, not the
/// normalized record.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingBid {
    pub bid: Bid,
    stage_present: bool,
    delivery_status_present: bool,
    probability_present: bool,
}

impl IncomingBid {
    pub fn from_json_value(value: &Value) -> IncomingBid {
        IncomingBid {
            bid: Bid::from_json_value(value),
            stage_present: field_present(value, "stage"),
            delivery_status_present: field_present(value, "deliveryStatus"),
            probability_present: field_present(value, "probability"),
        }
    }
}

/// A fully-formed record carries every field deliberately.
impl From<Bid> for IncomingBid {
    fn from(bid: Bid) -> IncomingBid {
        IncomingBid {
            bid,
            stage_present: true,
            delivery_status_present: true,
            probability_present: true,
        }
    }
}

fn field_present(value: &Value, key: &str) -> bool {
    match value.get(key) {
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Number(_)) | Some(Value::Bool(_)) => true,
        _ => false,
    }
}

/// Case-folded, whitespace-collapsed form used for business-key comparisons.
pub fn normalize_key(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Business identity for merge purposes: normalized (title, client). Storage
/// ids are regenerated by spreadsheet round trips; title and client are the
/// stable pair.
pub fn bid_key(bid: &Bid) -> String {
    format!("{}||{}", normalize_key(&bid.title), normalize_key(&bid.client))
}

/// Overwrite each default-shape field of `merged` with the incoming value
/// when it is present. Identity fields stay put.
macro_rules! take_present {
    ($merged:ident, $incoming:ident, $($field:ident),+ $(,)?) => {
        $(
            if $incoming.$field.is_present() {
                $merged.$field = $incoming.$field.clone();
            }
        )+
    };
}

fn merge_fields(existing: &Bid, record: &IncomingBid, now_ts: &str) -> Bid {
    let incoming = &record.bid;
    let mut merged = existing.clone();
    take_present!(
        merged, incoming, title, client, client_ref, owner, date_received, due_date,
        submitted_date, decision_date, value_aud, scope, scope_summary,
        requirements, assumptions, dependencies, risks, stakeholders, resourcing, commercials,
        differentiators, differentiators_other, competitor_notes, next_steps, notes,
        qualification,
    );

    // These three can't be judged from the normalized record; a missing or
    // blank payload field means the existing value stands.
    if record.stage_present {
        merged.stage = incoming.stage;
    }
    if record.delivery_status_present {
        merged.delivery_status = incoming.delivery_status;
    }
    if record.probability_present {
        merged.probability = incoming.probability.clone();
    }

    // Identity and business-visible numbering never move.
    merged.id = existing.id.clone();
    merged.bid_number = existing.bid_number.clone();

    merged.created_at = if existing.created_at.is_present() {
        existing.created_at.clone()
    } else if incoming.created_at.is_present() {
        incoming.created_at.clone()
    } else {
        now_ts.to_string()
    };
    merged.updated_at = now_ts.to_string();
    merged
}

/// Merge an incoming bid list into the existing collection without creating
/// duplicate identities. Pure; inputs are never mutated.
///
/// Incoming records matching an existing (title, client) key are folded in
/// field-by-field under the presence rule; unmatched records are accepted as
/// new entries ahead of the existing ones. Each incoming record matches
/// against the original existing lookup, so a batch with repeated keys
/// resolves last-write-wins against the same existing record, and repeated
/// keys with no existing match produce separate new entries.
pub fn merge(existing: &[Bid], incoming: &[IncomingBid], now: DateTime<Utc>) -> Vec<Bid> {
    let now_ts = timestamp(now);

    let mut existing_by_key: HashMap<String, usize> = HashMap::new();
    for (idx, bid) in existing.iter().enumerate() {
        existing_by_key.insert(bid_key(bid), idx);
    }

    let mut merged_existing: Vec<Bid> = existing.to_vec();
    let mut new_ones: Vec<Bid> = Vec::new();
    let mut folded = 0usize;

    for record in incoming {
        let mut normalized = record.bid.clone();
        if normalized.id.is_empty() {
            normalized.id = mint_id();
        }
        if normalized.created_at.is_empty() {
            normalized.created_at = now_ts.clone();
        }
        if normalized.updated_at.is_empty() {
            normalized.updated_at = now_ts.clone();
        }

        match existing_by_key.get(&bid_key(&normalized)) {
            Some(&idx) => {
                let update = IncomingBid {
                    bid: normalized,
                    ..record.clone()
                };
                merged_existing[idx] = merge_fields(&existing[idx], &update, &now_ts);
                folded += 1;
            }
            None => {
                normalized.updated_at = now_ts.clone();
                new_ones.push(normalized);
            }
        }
    }

    debug!(
        incoming = incoming.len(),
        folded,
        accepted = new_ones.len(),
        "merged import batch"
    );
    new_ones.extend(merged_existing);
    new_ones
}

#[cfg(test)]
mod tests {
    use super::*;
    use bidhub_core::{DeliveryStatus, Stage};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        "2026-03-02T09:00:00Z".parse().unwrap()
    }

    fn existing_bid(id: &str, number: &str, title: &str, client: &str) -> Bid {
        Bid {
            id: id.to_string(),
            bid_number: number.to_string(),
            title: title.to_string(),
            client: client.to_string(),
            owner: "Dana".to_string(),
            notes: "kept unless overwritten".to_string(),
            created_at: "2025-11-01T08:00:00.000Z".to_string(),
            updated_at: "2025-11-01T08:00:00.000Z".to_string(),
            ..Bid::default()
        }
    }

    #[test]
    fn import_payload_taxonomy() {
        assert!(matches!(
            parse_import("nonsense"),
            Err(ImportError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_import(r#"{"records": []}"#),
            Err(ImportError::MissingBids)
        ));
        assert!(matches!(parse_import("[1, 2]"), Err(ImportError::MissingBids)));
        assert!(parse_import(r#"{"bids": []}"#).unwrap().is_empty());
    }

    #[test]
    fn key_normalization_collapses_whitespace_and_case() {
        assert_eq!(normalize_key("  Payroll   Uplift "), "payroll uplift");
        let a = Bid {
            title: "Payroll  Uplift".to_string(),
            client: " ACME ".to_string(),
            ..Bid::default()
        };
        let b = Bid {
            title: "payroll uplift".to_string(),
            client: "acme".to_string(),
            ..Bid::default()
        };
        assert_eq!(bid_key(&a), bid_key(&b));
    }

    #[test]
    fn matched_records_keep_identity_and_take_present_fields() {
        let existing = vec![existing_bid("e1", "BID-2025-0004", "Payroll Uplift", "Acme")];
        let incoming = vec![IncomingBid::from_json_value(&json!({
            "id": "regenerated",
            "bidNumber": "BID-2026-0099",
            "title": "payroll uplift",
            "client": "ACME",
            "owner": "",
            "dueDate": "2026-04-10",
            "stage": "Review",
        }))];

        let merged = merge(&existing, &incoming, now());
        assert_eq!(merged.len(), 1);
        let bid = &merged[0];
        assert_eq!(bid.id, "e1");
        assert_eq!(bid.bid_number, "BID-2025-0004");
        assert_eq!(bid.owner, "Dana", "blank incoming owner does not overwrite");
        assert_eq!(bid.due_date, "2026-04-10");
        assert_eq!(bid.stage, Stage::Review);
        assert_eq!(bid.notes, "kept unless overwritten");
        assert_eq!(bid.created_at, "2025-11-01T08:00:00.000Z");
        assert_eq!(bid.updated_at, timestamp(now()));
    }

    #[test]
    fn absent_stage_status_and_probability_never_overwrite() {
        // Normalization gives these three fields defaults, so presence is
        // judged against the raw payload: blank and missing both mean
        // "unset" and the existing values stand.
        let mut existing = existing_bid("e1", "BID-2025-0004", "Payroll Uplift", "Acme");
        existing.stage = Stage::Negotiation;
        existing.delivery_status = DeliveryStatus::AtRisk;
        existing.probability = "80".to_string();

        let blank = vec![IncomingBid::from_json_value(&json!({
            "title": "Payroll Uplift",
            "client": "Acme",
            "stage": "",
            "deliveryStatus": "",
            "probability": "",
        }))];
        let merged = merge(&[existing.clone()], &blank, now());
        assert_eq!(merged[0].stage, Stage::Negotiation);
        assert_eq!(merged[0].delivery_status, DeliveryStatus::AtRisk);
        assert_eq!(merged[0].probability, "80");

        let missing = vec![IncomingBid::from_json_value(&json!({
            "title": "Payroll Uplift",
            "client": "Acme",
        }))];
        let merged = merge(&[existing], &missing, now());
        assert_eq!(merged[0].stage, Stage::Negotiation);
        assert_eq!(merged[0].delivery_status, DeliveryStatus::AtRisk);
        assert_eq!(merged[0].probability, "80");
    }

    #[test]
    fn explicit_stage_status_and_probability_overwrite() {
        let existing = existing_bid("e1", "BID-2025-0004", "Payroll Uplift", "Acme");
        let incoming = vec![IncomingBid::from_json_value(&json!({
            "title": "Payroll Uplift",
            "client": "Acme",
            "stage": "Review",
            "deliveryStatus": "behind",
            "probability": 70,
        }))];
        let merged = merge(&[existing], &incoming, now());
        assert_eq!(merged[0].stage, Stage::Review);
        assert_eq!(merged[0].delivery_status, DeliveryStatus::Behind);
        assert_eq!(merged[0].probability, "70");
    }

    #[test]
    fn unmatched_records_are_accepted_first_with_minted_ids() {
        let existing = vec![
            existing_bid("e1", "BID-2025-0001", "Alpha", "Acme"),
            existing_bid("e2", "BID-2025-0002", "Beta", "Acme"),
        ];
        let incoming = vec![
            IncomingBid::from_json_value(&json!({"title": "Beta", "client": "Acme", "notes": "update"})),
            IncomingBid::from_json_value(&json!({"title": "Gamma", "client": "Initech"})),
        ];

        let merged = merge(&existing, &incoming, now());
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].title, "Gamma");
        assert!(!merged[0].id.is_empty());
        assert!(merged[0].bid_number.is_empty(), "new entries get no number here");
        assert_eq!(merged[0].created_at, timestamp(now()));
        assert_eq!(merged[1].id, "e1");
        assert_eq!(merged[2].id, "e2");
        assert_eq!(merged[2].notes, "update");

        let mut ids: Vec<_> = merged.iter().map(|b| b.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3, "ids stay pairwise distinct");
    }

    #[test]
    fn later_batch_duplicates_win_against_the_same_existing_record() {
        let existing = vec![existing_bid("e1", "BID-2025-0001", "Alpha", "Acme")];
        let incoming = vec![
            IncomingBid::from_json_value(&json!({"title": "Alpha", "client": "Acme", "notes": "first"})),
            IncomingBid::from_json_value(&json!({"title": "Alpha", "client": "Acme", "owner": "Lee"})),
        ];

        let merged = merge(&existing, &incoming, now());
        assert_eq!(merged.len(), 1);
        // The second pass merged against the original record, not the first
        // pass's outcome, so its blank notes left the original notes intact
        // and the first pass's notes were discarded.
        assert_eq!(merged[0].notes, "kept unless overwritten");
        assert_eq!(merged[0].owner, "Lee");
    }

    #[test]
    fn duplicate_new_keys_produce_separate_entries() {
        let incoming = vec![
            IncomingBid::from_json_value(&json!({"title": "Gamma", "client": "Initech"})),
            IncomingBid::from_json_value(&json!({"title": "Gamma", "client": "Initech"})),
        ];
        let merged = merge(&[], &incoming, now());
        assert_eq!(merged.len(), 2);
        assert_ne!(merged[0].id, merged[1].id);
    }

    #[test]
    fn merge_does_not_mutate_inputs() {
        let existing = vec![existing_bid("e1", "BID-2025-0001", "Alpha", "Acme")];
        let incoming = vec![IncomingBid::from_json_value(&json!({"title": "Alpha", "client": "Acme", "owner": "Lee"}))];
        let existing_snapshot = existing.clone();
        let incoming_snapshot = incoming.clone();

        let _ = merge(&existing, &incoming, now());
        assert_eq!(existing, existing_snapshot);
        assert_eq!(incoming, incoming_snapshot);
    }

    #[test]
    fn supplied_timestamps_on_new_entries_are_kept_for_created_at() {
        let incoming = vec![IncomingBid::from_json_value(&json!({
            "title": "Gamma",
            "client": "Initech",
            "createdAt": "2024-01-01T00:00:00.000Z",
        }))];
        let merged = merge(&[], &incoming, now());
        assert_eq!(merged[0].created_at, "2024-01-01T00:00:00.000Z");
        assert_eq!(merged[0].updated_at, timestamp(now()));
    }
}
