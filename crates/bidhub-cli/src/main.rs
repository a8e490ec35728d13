//! BidHub command-line interface: the view-layer collaborator that drives
//! the document store, query engine, scoring and import/export.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use bidhub_core::{
    format_due_with_countdown, score_qualification, timestamp, Bid, DeliveryStatus, Document,
    Qualification, QualificationAnswers, Stage, DIFFERENTIATOR_OPTIONS, SCOPE_OPTION_GROUPS,
};
use bidhub_query::{filter_rows, kpis, owner_options, BidQuery, SortKey};
use bidhub_store::FileStore;
use chrono::{Local, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::warn;

#[derive(Debug, Parser)]
#[command(name = "bidhub")]
#[command(about = "BidHub local-first bid tracker")]
struct Cli {
    /// Override the data directory (default: BIDHUB_DATA_DIR or ./bidhub-data).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List bids with optional filters and a sort order.
    List {
        #[arg(long)]
        query: Option<String>,
        /// Stage label, or "all".
        #[arg(long)]
        stage: Option<String>,
        /// Exact owner, or "all".
        #[arg(long)]
        owner: Option<String>,
        /// Scope code membership, or "any".
        #[arg(long)]
        scope: Option<String>,
        /// updated_desc | updated_asc | due_asc | value_desc
        #[arg(long)]
        sort: Option<String>,
    },
    /// Show one bid by id or bid number.
    Show { bid: String },
    /// Create a bid with a fresh id and the next bid number.
    New,
    /// Edit fields of a bid by id or bid number.
    Edit(EditArgs),
    /// Delete a bid outright.
    Delete { bid: String },
    /// Score a qualification answers file and attach the result to a bid.
    Qualify {
        bid: String,
        /// JSON file with critical/evaluation/enhanced answer maps.
        #[arg(long)]
        answers: PathBuf,
    },
    /// Merge a bid list from an exported JSON file into the document.
    Import { file: PathBuf },
    /// Write the full document as pretty JSON to a file, or stdout.
    Export { file: Option<PathBuf> },
    /// KPI summary counts.
    Stats,
    /// List the fixed stages, delivery statuses, scope and differentiator options.
    Options,
    /// Drop every bid. Requires --force.
    Clear {
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
struct EditArgs {
    bid: String,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    client: Option<String>,
    #[arg(long)]
    client_ref: Option<String>,
    #[arg(long)]
    owner: Option<String>,
    #[arg(long)]
    stage: Option<String>,
    /// onTrack | atRisk | behind
    #[arg(long)]
    delivery_status: Option<String>,
    #[arg(long)]
    date_received: Option<String>,
    #[arg(long)]
    due_date: Option<String>,
    #[arg(long)]
    submitted_date: Option<String>,
    #[arg(long)]
    decision_date: Option<String>,
    #[arg(long)]
    value_aud: Option<String>,
    #[arg(long)]
    probability: Option<String>,
    /// Comma-separated scope codes.
    #[arg(long)]
    scope: Option<String>,
    /// Comma-separated differentiators.
    #[arg(long)]
    differentiators: Option<String>,
    #[arg(long)]
    scope_summary: Option<String>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    next_steps: Option<String>,
}

#[derive(Debug, Clone)]
struct AppConfig {
    data_dir: PathBuf,
}

impl AppConfig {
    fn from_env() -> Self {
        Self {
            data_dir: std::env::var("BIDHUB_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./bidhub-data")),
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    let store = FileStore::new(config.data_dir);
    let now = Utc::now();
    let today = Local::now().date_naive();
    let mut doc = bidhub_store::load(&store, now, today);

    match cli.command {
        Commands::List {
            query,
            stage,
            owner,
            scope,
            sort,
        } => {
            let query = build_query(query, stage, owner, scope, sort)?;
            list(&doc, &query, today);
        }
        Commands::Show { bid } => {
            let id = resolve(&doc, &bid)?.id.clone();
            doc.select_bid(&id);
            bidhub_store::save(&store, &doc).context("saving document")?;
            show(&doc, &id, today);
        }
        Commands::New => {
            let bid = doc.create_bid(now, today);
            bidhub_store::save(&store, &doc).context("saving document")?;
            println!("created {} ({})", bid.bid_number, bid.id);
        }
        Commands::Edit(args) => {
            let bid = edit_bid(resolve(&doc, &args.bid)?.clone(), &args)?;
            let id = bid.id.clone();
            doc.update_bid(bid, now);
            bidhub_store::save(&store, &doc).context("saving document")?;
            println!("updated {id}");
        }
        Commands::Delete { bid } => {
            let id = resolve(&doc, &bid)?.id.clone();
            doc.delete_bid(&id);
            bidhub_store::save(&store, &doc).context("saving document")?;
            println!("deleted {id}");
        }
        Commands::Qualify { bid, answers } => {
            let target = resolve(&doc, &bid)?.clone();
            let raw = std::fs::read_to_string(&answers)
                .with_context(|| format!("reading {}", answers.display()))?;
            let answers: QualificationAnswers = serde_json::from_str(&raw)
                .with_context(|| "parsing qualification answers".to_string())?;
            let score = score_qualification(&answers);
            let mut updated = target;
            updated.qualification = Some(Qualification {
                score,
                answers,
                updated_at: timestamp(now),
            });
            doc.update_bid(updated, now);
            bidhub_store::save(&store, &doc).context("saving document")?;
            println!(
                "qualification saved: evaluation {}%, enhanced {}%, recommendation: {}",
                score.eval_pct,
                score.enh_pct,
                score.recommendation.label()
            );
        }
        Commands::Import { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let incoming = bidhub_merge::parse_import(&text)?;
            let before = doc.bids.len();
            let merged = bidhub_merge::merge(&doc.bids, &incoming, now);
            let after = merged.len();
            doc.replace_bids(merged);
            bidhub_store::save(&store, &doc).context("saving document")?;
            println!(
                "imported {} bids: {} new, {} merged into existing",
                incoming.len(),
                after - before,
                incoming.len().saturating_sub(after - before)
            );
        }
        Commands::Export { file } => {
            let payload = serde_json::to_string_pretty(&doc).context("serializing document")?;
            match file {
                Some(path) => {
                    std::fs::write(&path, payload)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("exported {} bids to {}", doc.bids.len(), path.display());
                }
                None => println!("{payload}"),
            }
        }
        Commands::Stats => {
            let k = kpis(&doc.bids, today);
            println!("total:       {}", doc.bids.len());
            println!("in progress: {}", k.in_progress);
            println!("closed:      {}", k.closed);
            println!("due soon:    {}", k.due_soon);
        }
        Commands::Options => print_options(&doc),
        Commands::Clear { force } => {
            if !force {
                bail!("clear drops every bid; re-run with --force after exporting a backup");
            }
            doc = Document::seed(now, today);
            doc.bids.clear();
            bidhub_store::save(&store, &doc).context("saving document")?;
            println!("cleared all bids");
        }
    }

    Ok(())
}

fn build_query(
    text: Option<String>,
    stage: Option<String>,
    owner: Option<String>,
    scope: Option<String>,
    sort: Option<String>,
) -> Result<BidQuery> {
    let stage = match stage.as_deref() {
        None | Some("all") => None,
        Some(label) => Some(parse_stage(label)?),
    };
    let owner = owner.filter(|o| o != "all");
    let scope = scope.filter(|s| s != "any");
    let sort = sort.and_then(|key| {
        let parsed = SortKey::parse(&key);
        if parsed.is_none() {
            warn!(sort = %key, "unknown sort key; leaving order unchanged");
        }
        parsed
    });
    Ok(BidQuery {
        text: text.unwrap_or_default(),
        stage,
        owner,
        scope,
        sort,
    })
}

fn parse_stage(label: &str) -> Result<Stage> {
    match Stage::from_label(label) {
        Some(stage) => Ok(stage),
        None => {
            let labels: Vec<_> = Stage::ALL.iter().map(|s| s.label()).collect();
            bail!("unknown stage {label:?}; expected one of: {}", labels.join(", "))
        }
    }
}

fn parse_delivery_status(code: &str) -> Result<DeliveryStatus> {
    match DeliveryStatus::from_code(code) {
        Some(status) => Ok(status),
        None => {
            let codes: Vec<_> = DeliveryStatus::ALL.iter().map(|s| s.code()).collect();
            bail!("unknown delivery status {code:?}; expected one of: {}", codes.join(", "))
        }
    }
}

/// Find a bid by storage id first, then by bid number.
fn resolve<'a>(doc: &'a Document, key: &str) -> Result<&'a Bid> {
    doc.bids
        .iter()
        .find(|b| b.id == key)
        .or_else(|| doc.bids.iter().find(|b| b.bid_number == key))
        .with_context(|| format!("no bid matches {key:?}"))
}

fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Input masking stays at this layer: valueAud keeps digits only and
/// probability is clamped to 0..=100. The core stores what it is given.
fn edit_bid(mut bid: Bid, args: &EditArgs) -> Result<Bid> {
    if let Some(v) = &args.title {
        bid.title = v.clone();
    }
    if let Some(v) = &args.client {
        bid.client = v.clone();
    }
    if let Some(v) = &args.client_ref {
        bid.client_ref = v.clone();
    }
    if let Some(v) = &args.owner {
        bid.owner = v.clone();
    }
    if let Some(v) = &args.stage {
        bid.stage = parse_stage(v)?;
    }
    if let Some(v) = &args.delivery_status {
        bid.delivery_status = parse_delivery_status(v)?;
    }
    if let Some(v) = &args.date_received {
        bid.date_received = v.clone();
    }
    if let Some(v) = &args.due_date {
        bid.due_date = v.clone();
    }
    if let Some(v) = &args.submitted_date {
        bid.submitted_date = v.clone();
    }
    if let Some(v) = &args.decision_date {
        bid.decision_date = v.clone();
    }
    if let Some(v) = &args.value_aud {
        bid.value_aud = digits_only(v);
    }
    if let Some(v) = &args.probability {
        let n: i64 = digits_only(v).parse().unwrap_or(0);
        bid.probability = n.clamp(0, 100).to_string();
    }
    if let Some(v) = &args.scope {
        bid.scope = split_list(v);
    }
    if let Some(v) = &args.differentiators {
        bid.differentiators = split_list(v);
    }
    if let Some(v) = &args.scope_summary {
        bid.scope_summary = v.clone();
    }
    if let Some(v) = &args.notes {
        bid.notes = v.clone();
    }
    if let Some(v) = &args.next_steps {
        bid.next_steps = v.clone();
    }
    Ok(bid)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn list(doc: &Document, query: &BidQuery, today: NaiveDate) {
    let rows = filter_rows(&doc.bids, query);
    for bid in &rows {
        let due = format_due_with_countdown(today, &bid.due_date);
        let value = if bid.value_aud.is_empty() {
            "–".to_string()
        } else {
            format!("${}", bid.value_aud)
        };
        println!(
            "{:<13} {:<30} {:<18} {:<13} {:<16} {:<28} {}",
            bid.bid_number,
            truncate(&bid.title, 30),
            truncate(&bid.client, 18),
            bid.stage.label(),
            bid.delivery_status.label(),
            due,
            value
        );
    }
    println!("showing {} of {} bids", rows.len(), doc.bids.len());
    let owners = owner_options(&doc.bids);
    if !owners.is_empty() {
        println!("owners: {}", owners.join(", "));
    }
}

fn show(doc: &Document, id: &str, today: NaiveDate) {
    let Some(bid) = doc.find_bid(id) else {
        return;
    };
    println!("{} — {}", bid.bid_number, bid.title);
    println!("client:    {} ({})", bid.client, bid.client_ref);
    println!("owner:     {}", bid.owner);
    println!("stage:     {}", bid.stage.label());
    println!("status:    {}", bid.delivery_status.label());
    println!("due:       {}", format_due_with_countdown(today, &bid.due_date));
    println!("value:     {}", bid.value_aud);
    println!("probability: {}%", bid.probability);
    if !bid.scope.is_empty() {
        println!("scope:     {}", bid.scope.join(", "));
    }
    if let Some(q) = &bid.qualification {
        println!(
            "qualification: {} (evaluation {}%, enhanced {}%)",
            q.score.recommendation.label(),
            q.score.eval_pct,
            q.score.enh_pct
        );
    }
    if !bid.notes.is_empty() {
        println!("notes:     {}", bid.notes);
    }
    println!("updated:   {}", bid.updated_at);
}

fn print_options(doc: &Document) {
    println!("stages:");
    for stage in Stage::ALL {
        let marker = if stage.is_closed() { " (closed)" } else { "" };
        println!("  {}{marker}", stage.label());
    }
    println!("delivery statuses:");
    for status in DeliveryStatus::ALL {
        println!("  {} — {} ({})", status.code(), status.label(), status.rag());
    }
    println!("scope options:");
    for (group, items) in SCOPE_OPTION_GROUPS {
        println!("  {group}:");
        for item in *items {
            println!("    {item}");
        }
    }
    println!("differentiators:");
    for item in DIFFERENTIATOR_OPTIONS {
        println!("  {item}");
    }
    println!("owners in this document: {}", owner_options(&doc.bids).join(", "));
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
