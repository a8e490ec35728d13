//! Core domain model for BidHub: bid records, the persisted document,
//! qualification scoring, and working-day date utilities.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, SecondsFormat, Utc, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub const CRATE_NAME: &str = "bidhub-core";

/// Current persisted document schema version.
pub const SCHEMA_VERSION: u32 = 2;

/// Lifecycle position in the fixed pipeline. Serialized as the human label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Stage {
    #[default]
    #[serde(rename = "RFP Received")]
    RfpReceived,
    Qualification,
    #[serde(rename = "In Progress")]
    InProgress,
    Review,
    Submission,
    Negotiation,
    Awarded,
    Lost,
    Withdrawn,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::RfpReceived,
        Stage::Qualification,
        Stage::InProgress,
        Stage::Review,
        Stage::Submission,
        Stage::Negotiation,
        Stage::Awarded,
        Stage::Lost,
        Stage::Withdrawn,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Stage::RfpReceived => "RFP Received",
            Stage::Qualification => "Qualification",
            Stage::InProgress => "In Progress",
            Stage::Review => "Review",
            Stage::Submission => "Submission",
            Stage::Negotiation => "Negotiation",
            Stage::Awarded => "Awarded",
            Stage::Lost => "Lost",
            Stage::Withdrawn => "Withdrawn",
        }
    }

    /// Terminal outcomes; bids in these stages are closed.
    pub fn is_closed(self) -> bool {
        matches!(self, Stage::Awarded | Stage::Lost | Stage::Withdrawn)
    }

    pub fn from_label(label: &str) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| s.label() == label)
    }

    /// Coerce any stored stage string, including pre-v2 labels.
    ///
    /// `Solutioning`, `Pricing` and `Writing` collapsed into `In Progress`
    /// when the pipeline was reshaped; anything else unrecognized lands there
    /// too, and an empty stage falls back to the initial stage.
    pub fn from_legacy_label(label: &str) -> Stage {
        let label = label.trim();
        if label.is_empty() {
            return Stage::RfpReceived;
        }
        let mapped = match label {
            "Solutioning" | "Pricing" | "Writing" => "In Progress",
            other => other,
        };
        Stage::from_label(mapped).unwrap_or(Stage::InProgress)
    }
}

/// Delivery health (RAG), orthogonal to stage. Serialized as the short code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeliveryStatus {
    #[default]
    #[serde(rename = "onTrack")]
    OnTrack,
    #[serde(rename = "atRisk")]
    AtRisk,
    #[serde(rename = "behind")]
    Behind,
}

impl DeliveryStatus {
    pub const ALL: [DeliveryStatus; 3] = [
        DeliveryStatus::OnTrack,
        DeliveryStatus::AtRisk,
        DeliveryStatus::Behind,
    ];

    pub fn code(self) -> &'static str {
        match self {
            DeliveryStatus::OnTrack => "onTrack",
            DeliveryStatus::AtRisk => "atRisk",
            DeliveryStatus::Behind => "behind",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DeliveryStatus::OnTrack => "On Track",
            DeliveryStatus::AtRisk => "At Risk",
            DeliveryStatus::Behind => "Behind Schedule",
        }
    }

    pub fn rag(self) -> &'static str {
        match self {
            DeliveryStatus::OnTrack => "green",
            DeliveryStatus::AtRisk => "amber",
            DeliveryStatus::Behind => "red",
        }
    }

    pub fn from_code(code: &str) -> Option<DeliveryStatus> {
        DeliveryStatus::ALL.into_iter().find(|s| s.code() == code)
    }
}

/// Scope options offered by pickers, grouped for display. Membership is not
/// enforced on records; migrated tag lists may carry free text.
pub const SCOPE_OPTION_GROUPS: &[(&str, &[&str])] = &[
    (
        "SAP SuccessFactors",
        &[
            "Employee Central",
            "Employee Central Payroll",
            "Recruiting",
            "Onboarding",
            "Performance & Goals",
            "Succession",
            "Learning",
            "Compensation",
            "Variable Pay",
            "People Analytics",
            "Integration",
        ],
    ),
    (
        "EPI-USE Products",
        &["PRISM", "Data Sync Manager", "Variance Monitor", "PatternFlex"],
    ),
    (
        "Services",
        &[
            "Implementation",
            "Optimisation",
            "Managed Services",
            "Testing",
            "Change & Adoption",
            "Architecture",
        ],
    ),
];

pub const DIFFERENTIATOR_OPTIONS: &[&str] = &[
    "Client track record",
    "Payroll expertise",
    "Integration capability",
    "Industry experience",
    "Accelerators and tooling",
    "Local delivery capability",
    "Change and adoption expertise",
    "Pragmatic delivery model",
    "Security and compliance focus",
];

/// A tracked bid. Scalar fields are strings with `""` meaning unset, matching
/// the persisted JSON; `scope` and `differentiators` are always sequences at
/// rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Bid {
    pub id: String,
    pub bid_number: String,
    pub title: String,
    pub client: String,
    #[serde(alias = "opportunityId")]
    pub client_ref: String,
    pub owner: String,
    pub stage: Stage,
    pub delivery_status: DeliveryStatus,
    pub date_received: String,
    pub due_date: String,
    pub submitted_date: String,
    pub decision_date: String,
    pub value_aud: String,
    pub probability: String,
    pub scope: Vec<String>,
    pub scope_summary: String,
    pub requirements: String,
    pub assumptions: String,
    pub dependencies: String,
    pub risks: String,
    pub stakeholders: String,
    pub resourcing: String,
    pub commercials: String,
    pub differentiators: Vec<String>,
    pub differentiators_other: String,
    pub competitor_notes: String,
    pub next_steps: String,
    pub notes: String,
    pub qualification: Option<Qualification>,
    pub created_at: String,
    pub updated_at: String,
}

impl Default for Bid {
    fn default() -> Self {
        Self {
            id: String::new(),
            bid_number: String::new(),
            title: String::new(),
            client: String::new(),
            client_ref: String::new(),
            owner: String::new(),
            stage: Stage::default(),
            delivery_status: DeliveryStatus::default(),
            date_received: String::new(),
            due_date: String::new(),
            submitted_date: String::new(),
            decision_date: String::new(),
            value_aud: String::new(),
            probability: "50".to_string(),
            scope: Vec::new(),
            scope_summary: String::new(),
            requirements: String::new(),
            assumptions: String::new(),
            dependencies: String::new(),
            risks: String::new(),
            stakeholders: String::new(),
            resourcing: String::new(),
            commercials: String::new(),
            differentiators: Vec::new(),
            differentiators_other: String::new(),
            competitor_notes: String::new(),
            next_steps: String::new(),
            notes: String::new(),
            qualification: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }
}

impl Bid {
    /// Build a bid from an arbitrary JSON object, filling every missing field
    /// from the default shape. Both migration and import feed records through
    /// here: stages are coerced through the legacy substitution table, scope
    /// and differentiators are forced into sequences, and numbers are
    /// accepted where digit strings are expected.
    pub fn from_json_value(value: &Value) -> Bid {
        let mut bid = Bid::default();
        let Some(obj) = value.as_object() else {
            return bid;
        };

        bid.id = string_at(obj, &["id"]);
        bid.bid_number = string_at(obj, &["bidNumber"]);
        bid.title = string_at(obj, &["title"]);
        bid.client = string_at(obj, &["client"]);
        bid.client_ref = string_at(obj, &["clientRef", "opportunityId"]);
        bid.owner = string_at(obj, &["owner"]);
        bid.stage = Stage::from_legacy_label(&string_at(obj, &["stage"]));
        bid.delivery_status = DeliveryStatus::from_code(&string_at(obj, &["deliveryStatus"]))
            .unwrap_or_default();
        bid.date_received = string_at(obj, &["dateReceived"]);
        bid.due_date = string_at(obj, &["dueDate"]);
        bid.submitted_date = string_at(obj, &["submittedDate"]);
        bid.decision_date = string_at(obj, &["decisionDate"]);
        bid.value_aud = string_at(obj, &["valueAud"]);
        let probability = string_at(obj, &["probability"]);
        if !probability.is_empty() {
            bid.probability = probability;
        }
        bid.scope = seq_at(obj, "scope");
        bid.scope_summary = string_at(obj, &["scopeSummary"]);
        bid.requirements = string_at(obj, &["requirements"]);
        bid.assumptions = string_at(obj, &["assumptions"]);
        bid.dependencies = string_at(obj, &["dependencies"]);
        bid.risks = string_at(obj, &["risks"]);
        bid.stakeholders = string_at(obj, &["stakeholders"]);
        bid.resourcing = string_at(obj, &["resourcing"]);
        bid.commercials = string_at(obj, &["commercials"]);
        bid.differentiators = seq_at(obj, "differentiators");
        bid.differentiators_other = string_at(obj, &["differentiatorsOther"]);
        bid.competitor_notes = string_at(obj, &["competitorNotes"]);
        bid.next_steps = string_at(obj, &["nextSteps"]);
        bid.notes = string_at(obj, &["notes"]);
        bid.qualification = obj
            .get("qualification")
            .and_then(|v| serde_json::from_value(v.clone()).ok());
        bid.created_at = string_at(obj, &["createdAt"]);
        bid.updated_at = string_at(obj, &["updatedAt"]);
        bid
    }
}

fn lenient_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn string_at(obj: &Map<String, Value>, keys: &[&str]) -> String {
    for key in keys {
        if let Some(value) = obj.get(*key) {
            let s = lenient_string(value);
            if !s.is_empty() {
                return s;
            }
        }
    }
    String::new()
}

fn seq_at(obj: &Map<String, Value>, key: &str) -> Vec<String> {
    match obj.get(key) {
        Some(Value::Array(items)) => items.iter().map(lenient_string).collect(),
        _ => Vec::new(),
    }
}

/// The presence rule driving merge precedence: empty strings, empty
/// sequences and absent options all mean "unset". A deliberate business
/// rule; do not tighten or loosen it.
pub trait Presence {
    fn is_present(&self) -> bool;
}

impl Presence for String {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl Presence for Vec<String> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl<T> Presence for Option<T> {
    fn is_present(&self) -> bool {
        self.is_some()
    }
}

// ---------------------------------------------------------------------------
// Qualification questionnaire and scoring
// ---------------------------------------------------------------------------

pub const CRITICAL_QUESTIONS: [&str; 9] = [
    "Has the client expressed clear commitment to the project timeline and scope?",
    "Are key stakeholders (Executive Leadership Team) actively engaged?",
    "Is the project scope aligned with our current capabilities and expertise?",
    "Is the potential revenue substantial enough to justify the investment of resources?",
    "Will the payment terms meet our financial requirements?",
    "Does the project pose acceptable legal, regulatory, or reputational risks?",
    "Does the project have an acceptable risk profile overall?",
    "Can we meet the proposed project timeline?",
    "Are the commercial terms attractive?",
];

pub const EVALUATION_QUESTIONS: [&str; 19] = [
    "Is this an EPI-USE led opportunity (not SAP)?",
    "Is this a People Solutions opportunity?",
    "Is this response a prerequisite for further shortlisting?",
    "Have we worked with this client or within this industry before?",
    "Is the client financially stable and likely to honour commitments?",
    "Do we have prior positive relationships with this client?",
    "Do we consider this a fair competitive landscape?",
    "Can we differentiate ourselves effectively?",
    "Does the project fit best practice (out of the box)?",
    "Do we have experience with similar integration complexity?",
    "Are the technical requirements compatible with our capabilities?",
    "Can we meet requirements without significant custom development?",
    "Does the client have realistic expectations?",
    "Do we understand the budget and can we price competitively?",
    "Is the client mature in implementing technology solutions?",
    "Does the scope align with our core implementation strengths?",
    "Can we mitigate the identified risks?",
    "Will SAP assist with the response (non-functionals)?",
    "Does the client have a good reputation?",
];

pub const ENHANCED_QUESTIONS: [&str; 7] = [
    "Is there potential for licence revenue?",
    "Is there potential to upsell our products?",
    "Is there potential to upsell our services?",
    "Is the project scalable for future phases?",
    "Will it strengthen our position in a key market or industry?",
    "Can this project unlock future opportunities?",
    "Does this align with our strategic growth objectives?",
];

/// Raw answers keyed by question text, one map per group. Absent answers
/// score as blank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualificationAnswers {
    pub critical: BTreeMap<String, String>,
    pub evaluation: BTreeMap<String, String>,
    pub enhanced: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    Proceed,
    #[serde(rename = "Proceed with Caution")]
    ProceedWithCaution,
    #[serde(rename = "Do Not Proceed")]
    DoNotProceed,
}

impl Recommendation {
    pub fn label(self) -> &'static str {
        match self {
            Recommendation::Proceed => "Proceed",
            Recommendation::ProceedWithCaution => "Proceed with Caution",
            Recommendation::DoNotProceed => "Do Not Proceed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub critical_failed: bool,
    pub eval_score: u32,
    pub eval_max: u32,
    pub eval_pct: u32,
    pub enh_score: u32,
    pub enh_max: u32,
    pub enh_pct: u32,
    pub recommendation: Recommendation,
}

/// Scoring snapshot persisted on a bid alongside the answers that produced
/// it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Qualification {
    #[serde(flatten)]
    pub score: ScoreResult,
    pub answers: QualificationAnswers,
    pub updated_at: String,
}

fn answer<'a>(answers: &'a BTreeMap<String, String>, question: &str) -> &'a str {
    answers.get(question).map(|a| a.trim()).unwrap_or("")
}

fn pct(score: u32, max: u32) -> u32 {
    if max == 0 {
        return 0;
    }
    ((f64::from(score) * 100.0) / f64::from(max)).round() as u32
}

/// Score the standard questionnaire.
pub fn score_qualification(answers: &QualificationAnswers) -> ScoreResult {
    score_questionnaire(
        &CRITICAL_QUESTIONS,
        &EVALUATION_QUESTIONS,
        &ENHANCED_QUESTIONS,
        answers,
    )
}

/// Score an explicit question set. Total: missing answers are blanks, blank
/// critical answers fail the gate, and empty groups score zero percent.
pub fn score_questionnaire(
    critical: &[&str],
    evaluation: &[&str],
    enhanced: &[&str],
    answers: &QualificationAnswers,
) -> ScoreResult {
    let critical_failed = critical.iter().any(|q| {
        let a = answer(&answers.critical, q);
        a == "No" || a.is_empty()
    });

    let eval_score = evaluation
        .iter()
        .map(|q| match answer(&answers.evaluation, q) {
            "Yes" => 2,
            "Partial" => 1,
            _ => 0,
        })
        .sum::<u32>();
    let eval_max = evaluation.len() as u32 * 2;
    let eval_pct = pct(eval_score, eval_max);

    let enh_score = enhanced
        .iter()
        .filter(|q| answer(&answers.enhanced, q) == "Yes")
        .count() as u32;
    let enh_max = enhanced.len() as u32;
    let enh_pct = pct(enh_score, enh_max);

    // Priority order: the critical gate overrides everything.
    let recommendation = if critical_failed {
        Recommendation::DoNotProceed
    } else if eval_pct < 55 {
        Recommendation::ProceedWithCaution
    } else {
        Recommendation::Proceed
    };

    ScoreResult {
        critical_failed,
        eval_score,
        eval_max,
        eval_pct,
        enh_score,
        enh_max,
        enh_pct,
        recommendation,
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentMeta {
    pub next_bid_seq: u32,
}

impl Default for DocumentMeta {
    fn default() -> Self {
        Self { next_bid_seq: 1 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UiState {
    pub last_selected_bid_id: String,
}

/// The whole persisted unit. Bids are kept in display order; new bids are
/// prepended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Document {
    pub version: u32,
    pub meta: DocumentMeta,
    pub bids: Vec<Bid>,
    pub ui: UiState,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            meta: DocumentMeta::default(),
            bids: Vec::new(),
            ui: UiState::default(),
        }
    }
}

impl Document {
    /// Brand-new document with a single starter bid numbered
    /// `BID-<year>-0001`.
    pub fn seed(now: DateTime<Utc>, today: NaiveDate) -> Document {
        let mut doc = Document::default();
        doc.create_bid(now, today);
        doc
    }

    /// Mint a bid with a fresh id and the next sequential bid number, and
    /// prepend it.
    pub fn create_bid(&mut self, now: DateTime<Utc>, today: NaiveDate) -> Bid {
        let seq = self.meta.next_bid_seq.max(1);
        self.meta.next_bid_seq = seq + 1;

        let stamp = timestamp(now);
        let bid = Bid {
            id: mint_id(),
            bid_number: format_bid_number(today.year(), seq),
            title: "New bid".to_string(),
            date_received: today.format("%Y-%m-%d").to_string(),
            created_at: stamp.clone(),
            updated_at: stamp,
            ..Bid::default()
        };
        self.bids.insert(0, bid.clone());
        bid
    }

    pub fn find_bid(&self, id: &str) -> Option<&Bid> {
        self.bids.iter().find(|b| b.id == id)
    }

    /// Replace the record with the same id, stamping `updatedAt`. Returns
    /// false when no record matches.
    pub fn update_bid(&mut self, mut bid: Bid, now: DateTime<Utc>) -> bool {
        bid.updated_at = timestamp(now);
        match self.bids.iter_mut().find(|b| b.id == bid.id) {
            Some(slot) => {
                *slot = bid;
                true
            }
            None => false,
        }
    }

    /// Remove a bid outright; no tombstone is kept.
    pub fn delete_bid(&mut self, id: &str) -> bool {
        let before = self.bids.len();
        self.bids.retain(|b| b.id != id);
        if self.ui.last_selected_bid_id == id {
            self.ui.last_selected_bid_id.clear();
        }
        self.bids.len() != before
    }

    /// Advisory last-viewed marker.
    pub fn select_bid(&mut self, id: &str) {
        self.ui.last_selected_bid_id = id.to_string();
    }

    pub fn replace_bids(&mut self, bids: Vec<Bid>) {
        self.bids = bids;
    }
}

pub fn mint_id() -> String {
    Uuid::new_v4().to_string()
}

/// RFC 3339 with milliseconds and a `Z` suffix; lexicographic order matches
/// chronological order.
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn format_bid_number(year: i32, seq: u32) -> String {
    format!("BID-{year}-{seq:04}")
}

/// Numeric suffix of a well-formed bid number (`BID-<yyyy>-<nnnn>`), or None.
pub fn bid_number_seq(bid_number: &str) -> Option<u32> {
    let rest = bid_number.strip_prefix("BID-")?;
    let (year, seq) = rest.split_once('-')?;
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if seq.len() != 4 || !seq.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    seq.parse().ok()
}

// ---------------------------------------------------------------------------
// Working-day date utilities
// ---------------------------------------------------------------------------

pub fn parse_iso_date(iso: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(iso, "%Y-%m-%d").ok()
}

/// Working days from `start` (exclusive) to `end` (inclusive), negative when
/// `end` is in the past. Saturdays and Sundays never count.
pub fn working_days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    let step = if end >= start { 1 } else { -1 };
    let mut count = 0;
    let mut day = start;
    while day != end {
        day += Duration::days(step);
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            count += step;
        }
    }
    count
}

/// Signed working-day countdown from `today` to an ISO due date, or None for
/// an empty or unparseable date.
pub fn working_days_until(today: NaiveDate, iso_due_date: &str) -> Option<i64> {
    let due = parse_iso_date(iso_due_date)?;
    Some(working_days_between(today, due))
}

pub fn is_due_soon(today: NaiveDate, iso_due_date: &str, window_days: i64) -> bool {
    match working_days_until(today, iso_due_date) {
        Some(wd) => (0..=window_days).contains(&wd),
        None => false,
    }
}

/// `"2026-03-20 (14 working days)"`; a dash for empty dates and the bare
/// string when the date does not parse.
pub fn format_due_with_countdown(today: NaiveDate, iso_due_date: &str) -> String {
    if iso_due_date.is_empty() {
        return "–".to_string();
    }
    match working_days_until(today, iso_due_date) {
        Some(wd) => {
            let suffix = if wd == 1 { "working day" } else { "working days" };
            format!("{iso_due_date} ({wd} {suffix})")
        }
        None => iso_due_date.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn now() -> DateTime<Utc> {
        "2026-03-02T09:00:00Z".parse().unwrap()
    }

    #[test]
    fn legacy_stage_labels_collapse_into_in_progress() {
        assert_eq!(Stage::from_legacy_label("Solutioning"), Stage::InProgress);
        assert_eq!(Stage::from_legacy_label("Pricing"), Stage::InProgress);
        assert_eq!(Stage::from_legacy_label("Writing"), Stage::InProgress);
        assert_eq!(Stage::from_legacy_label("Negotiation"), Stage::Negotiation);
        assert_eq!(Stage::from_legacy_label(""), Stage::RfpReceived);
        assert_eq!(Stage::from_legacy_label("Discovery"), Stage::InProgress);
    }

    #[test]
    fn stage_serializes_as_label() {
        assert_eq!(
            serde_json::to_value(Stage::RfpReceived).unwrap(),
            json!("RFP Received")
        );
        assert_eq!(
            serde_json::to_value(DeliveryStatus::Behind).unwrap(),
            json!("behind")
        );
    }

    #[test]
    fn lenient_bid_fills_default_shape() {
        let bid = Bid::from_json_value(&json!({
            "title": "Payroll replacement",
            "client": "Acme",
            "opportunityId": "OPP-9",
            "stage": "Pricing",
            "valueAud": 250000,
            "scope": "Employee Central",
        }));
        assert_eq!(bid.title, "Payroll replacement");
        assert_eq!(bid.client_ref, "OPP-9");
        assert_eq!(bid.stage, Stage::InProgress);
        assert_eq!(bid.value_aud, "250000");
        assert_eq!(bid.probability, "50");
        assert!(bid.scope.is_empty(), "bare string scope is coerced to empty");
        assert!(bid.qualification.is_none());
    }

    #[test]
    fn malformed_qualification_is_dropped() {
        let bid = Bid::from_json_value(&json!({
            "qualification": { "completed": false, "critical": {} },
        }));
        assert!(bid.qualification.is_none());
    }

    #[test]
    fn presence_rule() {
        assert!(!String::new().is_present());
        assert!("x".to_string().is_present());
        assert!(!Vec::<String>::new().is_present());
        assert!(vec!["a".to_string()].is_present());
        assert!(!None::<Qualification>.is_present());
    }

    fn yes_all(questions: &[&str]) -> BTreeMap<String, String> {
        questions
            .iter()
            .map(|q| ((*q).to_string(), "Yes".to_string()))
            .collect()
    }

    #[test]
    fn evaluation_points_add_up() {
        let answers = QualificationAnswers {
            evaluation: [("A".to_string(), "Yes".to_string()), ("B".to_string(), "Partial".to_string())]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let result = score_questionnaire(&[], &["A", "B"], &[], &answers);
        assert_eq!(result.eval_score, 3);
        assert_eq!(result.eval_max, 4);
        assert_eq!(result.eval_pct, 75);
        assert!(!result.critical_failed);
    }

    #[test]
    fn high_evaluation_score_proceeds() {
        let answers = QualificationAnswers {
            critical: yes_all(&["C1", "C2"]),
            evaluation: [
                ("E1".to_string(), "Yes".to_string()),
                ("E2".to_string(), "Yes".to_string()),
                ("E3".to_string(), "Yes".to_string()),
                ("E4".to_string(), "Yes".to_string()),
                ("E5".to_string(), "No".to_string()),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        let result =
            score_questionnaire(&["C1", "C2"], &["E1", "E2", "E3", "E4", "E5"], &[], &answers);
        assert_eq!(result.eval_pct, 80);
        assert_eq!(result.recommendation, Recommendation::Proceed);
    }

    #[test]
    fn low_evaluation_score_proceeds_with_caution() {
        let answers = QualificationAnswers {
            critical: yes_all(&["C1"]),
            evaluation: [
                ("E1".to_string(), "Yes".to_string()),
                ("E2".to_string(), "No".to_string()),
                ("E3".to_string(), "No".to_string()),
                ("E4".to_string(), "No".to_string()),
                ("E5".to_string(), "Partial".to_string()),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        let result =
            score_questionnaire(&["C1"], &["E1", "E2", "E3", "E4", "E5"], &[], &answers);
        assert_eq!(result.eval_pct, 30);
        assert_eq!(result.recommendation, Recommendation::ProceedWithCaution);
    }

    #[test]
    fn blank_critical_answer_gates_despite_strong_evaluation() {
        let mut critical = yes_all(&["C1", "C2"]);
        critical.insert("C3".to_string(), String::new());
        let answers = QualificationAnswers {
            critical,
            evaluation: yes_all(&["E1", "E2"]),
            ..Default::default()
        };
        let result = score_questionnaire(&["C1", "C2", "C3"], &["E1", "E2"], &[], &answers);
        assert!(result.critical_failed);
        assert_eq!(result.eval_pct, 100);
        assert_eq!(result.recommendation, Recommendation::DoNotProceed);
    }

    #[test]
    fn flipping_one_critical_answer_flips_the_gate() {
        let questions = ["C1", "C2", "C3"];
        let mut answers = QualificationAnswers {
            critical: yes_all(&questions),
            ..Default::default()
        };
        let before = score_questionnaire(&questions, &[], &[], &answers);
        assert!(!before.critical_failed);

        answers.critical.insert("C2".to_string(), "No".to_string());
        let after = score_questionnaire(&questions, &[], &[], &answers);
        assert!(after.critical_failed);
        assert_eq!(after.recommendation, Recommendation::DoNotProceed);
    }

    #[test]
    fn empty_groups_score_zero_percent() {
        let result = score_questionnaire(&[], &[], &[], &QualificationAnswers::default());
        assert_eq!(result.eval_pct, 0);
        assert_eq!(result.enh_pct, 0);
        assert!(!result.critical_failed);
    }

    #[test]
    fn standard_questionnaire_is_total_on_empty_answers() {
        let result = score_qualification(&QualificationAnswers::default());
        assert!(result.critical_failed);
        assert_eq!(result.eval_max, 38);
        assert_eq!(result.enh_max, 7);
        assert_eq!(result.recommendation, Recommendation::DoNotProceed);
    }

    #[test]
    fn seeded_document_has_one_numbered_bid() {
        let doc = Document::seed(now(), monday());
        assert_eq!(doc.version, SCHEMA_VERSION);
        assert_eq!(doc.bids.len(), 1);
        assert_eq!(doc.bids[0].bid_number, "BID-2026-0001");
        assert_eq!(doc.bids[0].date_received, "2026-03-02");
        assert_eq!(doc.meta.next_bid_seq, 2);
    }

    #[test]
    fn created_bids_are_prepended_with_sequential_numbers() {
        let mut doc = Document::seed(now(), monday());
        let second = doc.create_bid(now(), monday());
        assert_eq!(second.bid_number, "BID-2026-0002");
        assert_eq!(doc.bids[0].id, second.id);
        assert_eq!(doc.meta.next_bid_seq, 3);
        assert_ne!(doc.bids[0].id, doc.bids[1].id);
    }

    #[test]
    fn update_and_delete_by_id() {
        let mut doc = Document::seed(now(), monday());
        let mut bid = doc.bids[0].clone();
        bid.title = "Renamed".to_string();
        assert!(doc.update_bid(bid, now()));
        assert_eq!(doc.bids[0].title, "Renamed");

        let missing = Bid {
            id: "nope".to_string(),
            ..Bid::default()
        };
        assert!(!doc.update_bid(missing, now()));

        let id = doc.bids[0].id.clone();
        doc.select_bid(&id);
        assert!(doc.delete_bid(&id));
        assert!(doc.bids.is_empty());
        assert!(doc.ui.last_selected_bid_id.is_empty());
    }

    #[test]
    fn bid_number_suffix_parsing() {
        assert_eq!(bid_number_seq("BID-2026-0031"), Some(31));
        assert_eq!(bid_number_seq("BID-2026-31"), None);
        assert_eq!(bid_number_seq("BID-26-0031"), None);
        assert_eq!(bid_number_seq(""), None);
        assert_eq!(bid_number_seq("bid-2026-0031"), None);
    }

    #[test]
    fn document_round_trips_camel_case_json() {
        let doc = Document::seed(now(), monday());
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value.get("meta").and_then(|m| m.get("nextBidSeq")).is_some());
        assert!(value["bids"][0].get("bidNumber").is_some());
        assert!(value["bids"][0].get("deliveryStatus").is_some());
        let back: Document = serde_json::from_value(value).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn working_days_skip_weekends_in_both_directions() {
        let friday = NaiveDate::from_ymd_opt(2026, 3, 6).unwrap();
        let next_monday = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        let prev_friday = NaiveDate::from_ymd_opt(2026, 2, 27).unwrap();

        assert_eq!(working_days_between(monday(), friday), 4);
        assert_eq!(working_days_between(monday(), next_monday), 5);
        assert_eq!(working_days_between(monday(), monday()), 0);
        assert_eq!(working_days_between(monday(), prev_friday), -1);
    }

    #[test]
    fn countdown_handles_empty_and_malformed_dates() {
        assert_eq!(working_days_until(monday(), ""), None);
        assert_eq!(working_days_until(monday(), "not-a-date"), None);
        assert_eq!(working_days_until(monday(), "2026-03-20"), Some(14));
    }

    #[test]
    fn due_soon_window_is_inclusive() {
        assert!(is_due_soon(monday(), "2026-03-02", 14));
        assert!(is_due_soon(monday(), "2026-03-20", 14));
        assert!(!is_due_soon(monday(), "2026-03-23", 14));
        assert!(!is_due_soon(monday(), "2026-02-27", 14));
        assert!(!is_due_soon(monday(), "", 14));
    }

    #[test]
    fn countdown_display_string() {
        assert_eq!(
            format_due_with_countdown(monday(), "2026-03-20"),
            "2026-03-20 (14 working days)"
        );
        assert_eq!(
            format_due_with_countdown(monday(), "2026-03-03"),
            "2026-03-03 (1 working day)"
        );
        assert_eq!(format_due_with_countdown(monday(), ""), "–");
        assert_eq!(format_due_with_countdown(monday(), "soon"), "soon");
    }
}
