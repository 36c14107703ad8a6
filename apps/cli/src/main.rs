//! # SafeMan CLI
//!
//! Operator command line for one SafeMan replica.
//!
//! ## Module Organization
//! ```text
//! safeman-cli/
//! ├── main.rs      ◄─── You are here (argument parsing & dispatch)
//! ├── context.rs   ◄─── Replica session (config, mirror, synchronizer)
//! ├── commands.rs  ◄─── One handler per subcommand
//! └── render.rs    ◄─── Text and JSON output
//! ```
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Initialize Logging   RUST_LOG or "info,safeman=debug,sqlx=warn"    │
//! │  2. Load Config          --config / default path, then SAFEMAN_* env   │
//! │  3. Open Mirror          --db / [store] database_path / data dir       │
//! │  4. Initialize Replica   load mirror, resolve endpoint, pull once      │
//! │  5. Run Subcommand       commit / edit / export / watch ...            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod commands;
mod context;
mod render;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use safeman_core::{Category, ItemGroup, ItemType};
use tracing_subscriber::EnvFilter;

use crate::context::CliContext;

// =============================================================================
// Arguments
// =============================================================================

#[derive(Parser)]
#[command(name = "safeman", about = "Shared safety-supply inventory replica", version)]
struct Cli {
    #[arg(long, global = true, env = "SAFEMAN_CONFIG", help = "Path to config.toml")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Path to the local mirror database")]
    db: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show sync status and stock summary
    Status,
    /// Pull the remote snapshot now
    Pull,
    /// Set or clear the remote snapshot endpoint
    #[command(subcommand)]
    Endpoint(EndpointCommands),
    /// List items
    Items(ItemsArgs),
    /// Show the most recent log entries
    Logs(LogsArgs),
    /// Issue items to a department (OUT)
    Issue(IssueArgs),
    /// Receive stock (IN)
    Restock(RestockArgs),
    /// Create a new item
    AddItem(AddItemArgs),
    /// Change fields of an existing item
    EditItem(EditItemArgs),
    /// Permanently remove an item (its log entries stay)
    DeleteItem(DeleteItemArgs),
    /// Write the current snapshot to a backup file
    Export(ExportArgs),
    /// Replace the replica (and the remote) with a backup file
    Import(ImportArgs),
    /// Issued quantities per department for one year
    Report(ReportArgs),
    /// Keep pulling in the background until Ctrl-C
    Watch,
}

#[derive(Subcommand)]
enum EndpointCommands {
    /// Store an http(s) endpoint and pull from it
    Set { url: String },
    /// Forget the endpoint; the replica becomes local
    Clear,
}

#[derive(Args)]
struct ItemsArgs {
    #[arg(long, value_enum, help = "Only items of this group")]
    group: Option<GroupArg>,

    #[arg(long, action = ArgAction::SetTrue, help = "Only items at or below minimum stock")]
    low: bool,
}

#[derive(Args)]
struct LogsArgs {
    #[arg(long, default_value_t = 20)]
    limit: usize,
}

#[derive(Args)]
struct IssueArgs {
    #[arg(long, help = "Receiving department")]
    dept: String,

    #[arg(long, default_value = "")]
    person: String,

    #[arg(long, default_value = "")]
    reason: String,

    #[arg(
        long = "item",
        value_parser = parse_line,
        required = true,
        help = "Basket line as ITEM_ID=QTY (repeatable)"
    )]
    items: Vec<BasketLine>,
}

#[derive(Args)]
struct RestockArgs {
    #[arg(long, default_value = "")]
    person: String,

    #[arg(long, default_value = "")]
    reason: String,

    #[arg(
        long = "item",
        value_parser = parse_line,
        required = true,
        help = "Basket line as ITEM_ID=QTY (repeatable)"
    )]
    items: Vec<BasketLine>,
}

#[derive(Args)]
struct AddItemArgs {
    #[arg(long)]
    name: String,

    #[arg(long)]
    unit: String,

    #[command(flatten)]
    fields: ItemFields,
}

#[derive(Args)]
struct EditItemArgs {
    id: String,

    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    unit: Option<String>,

    #[command(flatten)]
    fields: ItemFields,
}

/// Optional item fields shared by add-item and edit-item.
#[derive(Args)]
struct ItemFields {
    #[arg(long, value_enum)]
    category: Option<CategoryArg>,

    #[arg(long, value_enum)]
    item_type: Option<ItemTypeArg>,

    #[arg(long, value_enum)]
    group: Option<GroupArg>,

    #[arg(long)]
    spec: Option<String>,

    #[arg(long)]
    quantity: Option<i64>,

    #[arg(long)]
    min_stock: Option<i64>,

    #[arg(long, help = "YYYY-MM-DD")]
    purchase_date: Option<String>,

    #[arg(long, help = "YYYY-MM-DD")]
    expiry_date: Option<String>,

    #[arg(long)]
    description: Option<String>,
}

#[derive(Args)]
struct DeleteItemArgs {
    id: String,
}

#[derive(Args)]
struct ExportArgs {
    #[arg(help = "Output file (default: safeman_backup_YYYY-MM-DD.json)")]
    path: Option<PathBuf>,
}

#[derive(Args)]
struct ImportArgs {
    path: PathBuf,
}

#[derive(Args)]
struct ReportArgs {
    #[arg(long, help = "Calendar year (default: current year)")]
    year: Option<i32>,
}

// =============================================================================
// Value Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct BasketLine {
    item_id: String,
    quantity: i64,
}

fn parse_line(raw: &str) -> Result<BasketLine, String> {
    let (item_id, quantity) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected ITEM_ID=QTY, got '{}'", raw))?;

    let item_id = item_id.trim();
    if item_id.is_empty() {
        return Err("item id is empty".to_string());
    }

    let quantity = quantity
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("'{}' is not a whole number", quantity))?;

    Ok(BasketLine {
        item_id: item_id.to_string(),
        quantity,
    })
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CategoryArg {
    Protection,
    FireSafety,
    FirstAid,
    Signage,
    Tool,
    Other,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Protection => Category::Protection,
            CategoryArg::FireSafety => Category::FireSafety,
            CategoryArg::FirstAid => Category::FirstAid,
            CategoryArg::Signage => Category::Signage,
            CategoryArg::Tool => Category::Tool,
            CategoryArg::Other => Category::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ItemTypeArg {
    Equipment,
    Consumable,
}

impl From<ItemTypeArg> for ItemType {
    fn from(arg: ItemTypeArg) -> Self {
        match arg {
            ItemTypeArg::Equipment => ItemType::Equipment,
            ItemTypeArg::Consumable => ItemType::Consumable,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GroupArg {
    Inventory,
    Medicine,
}

impl From<GroupArg> for ItemGroup {
    fn from(arg: GroupArg) -> Self {
        match arg {
            GroupArg::Inventory => ItemGroup::Inventory,
            GroupArg::Medicine => ItemGroup::Medicine,
        }
    }
}

// =============================================================================
// Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let context = CliContext::initialize(cli.config, cli.db).await?;
    let json = cli.json;

    match cli.command {
        Commands::Status => commands::status(&context, json).await,
        Commands::Pull => commands::pull(&context, json).await,
        Commands::Endpoint(EndpointCommands::Set { url }) => {
            commands::set_endpoint(&context, &url, json).await
        }
        Commands::Endpoint(EndpointCommands::Clear) => {
            commands::set_endpoint(&context, "", json).await
        }
        Commands::Items(args) => commands::items(&context, args, json).await,
        Commands::Logs(args) => commands::logs(&context, args.limit, json).await,
        Commands::Issue(args) => commands::issue(&context, args, json).await,
        Commands::Restock(args) => commands::restock(&context, args, json).await,
        Commands::AddItem(args) => commands::add_item(&context, args, json).await,
        Commands::EditItem(args) => commands::edit_item(&context, args, json).await,
        Commands::DeleteItem(args) => commands::delete_item(&context, &args.id, json).await,
        Commands::Export(args) => commands::export(&context, args.path, json).await,
        Commands::Import(args) => commands::import(&context, &args.path, json).await,
        Commands::Report(args) => commands::report(&context, args.year, json).await,
        Commands::Watch => commands::watch(&context).await,
    }
}

/// Initializes the tracing subscriber for structured logging.
///
/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,safeman=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
