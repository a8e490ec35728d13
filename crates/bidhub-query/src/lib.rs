//! Read-only query and aggregate views over the live bid collection. Nothing
//! here mutates; every function maps (bids, arguments) to a derived view.

use bidhub_core::{is_due_soon, Bid, Stage};
use chrono::NaiveDate;
use serde::Serialize;

pub const CRATE_NAME: &str = "bidhub-query";

/// Open bids due within this many working days count toward the due-soon
/// KPI.
pub const DUE_SOON_WINDOW_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    UpdatedDesc,
    UpdatedAsc,
    DueAsc,
    ValueDesc,
}

impl SortKey {
    /// Unknown sort keys are a no-op, encoded as None.
    pub fn parse(key: &str) -> Option<SortKey> {
        match key {
            "updated_desc" => Some(SortKey::UpdatedDesc),
            "updated_asc" => Some(SortKey::UpdatedAsc),
            "due_asc" => Some(SortKey::DueAsc),
            "value_desc" => Some(SortKey::ValueDesc),
            _ => None,
        }
    }
}

/// Filter and sort selections. `None` is the "all"/"any" sentinel for the
/// categorical filters and "leave the order alone" for the sort.
#[derive(Debug, Clone, Default)]
pub struct BidQuery {
    pub text: String,
    pub stage: Option<Stage>,
    pub owner: Option<String>,
    pub scope: Option<String>,
    pub sort: Option<SortKey>,
}

/// Everything the text filter searches across, joined and case-folded.
fn haystack(bid: &Bid) -> String {
    let scope_joined = bid.scope.join(",");
    let parts = [
        bid.bid_number.as_str(),
        bid.title.as_str(),
        bid.client.as_str(),
        bid.client_ref.as_str(),
        bid.owner.as_str(),
        bid.stage.label(),
        bid.delivery_status.label(),
        scope_joined.as_str(),
        bid.scope_summary.as_str(),
        bid.requirements.as_str(),
        bid.notes.as_str(),
    ];
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" | ")
        .to_lowercase()
}

fn matches(bid: &Bid, query: &BidQuery) -> bool {
    let needle = query.text.trim().to_lowercase();
    if !needle.is_empty() && !haystack(bid).contains(&needle) {
        return false;
    }
    if let Some(stage) = query.stage {
        if bid.stage != stage {
            return false;
        }
    }
    if let Some(owner) = &query.owner {
        if bid.owner.trim() != owner {
            return false;
        }
    }
    if let Some(scope) = &query.scope {
        let wanted = scope.to_lowercase();
        if !bid.scope.iter().any(|s| s.to_lowercase() == wanted) {
            return false;
        }
    }
    true
}

fn numeric_value(bid: &Bid) -> i64 {
    bid.value_aud.parse().unwrap_or(0)
}

/// Filtered, sorted row view. Sorting is stable, so a missing sort key keeps
/// the original order.
pub fn filter_rows<'a>(bids: &'a [Bid], query: &BidQuery) -> Vec<&'a Bid> {
    let mut rows: Vec<&Bid> = bids.iter().filter(|b| matches(b, query)).collect();
    match query.sort {
        Some(SortKey::UpdatedDesc) => rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
        Some(SortKey::UpdatedAsc) => rows.sort_by(|a, b| a.updated_at.cmp(&b.updated_at)),
        // Lexicographic on YYYY-MM-DD; empty dates sort first.
        Some(SortKey::DueAsc) => rows.sort_by(|a, b| a.due_date.cmp(&b.due_date)),
        Some(SortKey::ValueDesc) => rows.sort_by(|a, b| numeric_value(b).cmp(&numeric_value(a))),
        None => {}
    }
    rows
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Kpis {
    pub in_progress: usize,
    pub closed: usize,
    pub due_soon: usize,
}

/// Summary counts over the whole collection: open bids, closed bids, and
/// open bids due within the working-day window.
pub fn kpis(bids: &[Bid], today: NaiveDate) -> Kpis {
    let in_progress = bids.iter().filter(|b| !b.stage.is_closed()).count();
    let closed = bids.len() - in_progress;
    let due_soon = bids
        .iter()
        .filter(|b| !b.stage.is_closed() && is_due_soon(today, &b.due_date, DUE_SOON_WINDOW_DAYS))
        .count();
    Kpis {
        in_progress,
        closed,
        due_soon,
    }
}

/// Distinct trimmed owners, sorted, for populating the owner filter.
pub fn owner_options(bids: &[Bid]) -> Vec<String> {
    let mut owners: Vec<String> = bids
        .iter()
        .map(|b| b.owner.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();
    owners.sort();
    owners.dedup();
    owners
}
