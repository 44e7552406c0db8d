pub mod accounts;
pub mod categories;
pub mod ingest;
pub mod init;
pub mod pending;
pub mod rules;
pub mod subs;
pub mod sweep;
pub mod txns;

use clap::{Parser, Subcommand};

use crate::feed::{ChangeFeed, LedgerEvent};

/// Feed with the CLI's default observer: every committed event goes to the
/// structured log.
pub(crate) fn logging_feed() -> ChangeFeed {
    let mut feed = ChangeFeed::new();
    feed.subscribe(Box::new(|event: &LedgerEvent| {
        tracing::info!(?event, "ledger event");
    }));
    feed
}

#[derive(Parser)]
#[command(name = "passbook", about = "Bank-notification transaction ledger.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up Passbook: choose a data directory and initialize the database.
    Init {
        /// Path for Passbook data (default: ~/.local/share/passbook)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Process a parsed-notification JSON payload into the ledger.
    Ingest {
        /// Path to a JSON file (reads stdin when omitted)
        file: Option<String>,
        /// Queue for confirmation instead of saving directly
        #[arg(long)]
        queue: bool,
    },
    /// Manage queued transactions awaiting confirmation.
    Pending {
        #[command(subcommand)]
        command: PendingCommands,
    },
    /// Auto-save queued transactions past their deadline.
    Sweep,
    /// Manage processing rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Manage subscription patterns.
    Subs {
        #[command(subcommand)]
        command: SubsCommands,
    },
    /// Manage merchant category mappings.
    Categories {
        #[command(subcommand)]
        command: CategoriesCommands,
    },
    /// Manage account balance snapshots.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Browse and amend saved ledger entries.
    Txns {
        #[command(subcommand)]
        command: TxnsCommands,
    },
}

#[derive(Subcommand)]
pub enum PendingCommands {
    /// List queued transactions, newest first.
    List,
    /// Confirm a queued transaction, optionally editing fields first.
    Confirm {
        id: i64,
        #[arg(long)]
        merchant: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        amount: Option<f64>,
        /// Custom cashback percent for this transaction only
        #[arg(long)]
        cashback: Option<f64>,
    },
    /// Reject a queued transaction; nothing is saved.
    Reject { id: i64 },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Add a processing rule.
    Add {
        /// Rule name, e.g. 'ignore-card-payments'
        name: String,
        #[arg(long, default_value_t = 0)]
        priority: i64,
        /// merchant_equals, merchant_contains, amount_above, amount_below,
        /// amount_equals, amount_between, category_equals, raw_pattern
        #[arg(long = "match-type")]
        match_type: String,
        /// Text operand for merchant/category/raw-pattern predicates
        #[arg(long)]
        pattern: Option<String>,
        /// Lower bound for amount_above/amount_equals/amount_between
        #[arg(long = "amount-low")]
        amount_low: Option<f64>,
        /// Upper bound for amount_below/amount_between
        #[arg(long = "amount-high")]
        amount_high: Option<f64>,
        /// block, set_category, set_merchant
        #[arg(long)]
        action: String,
        #[arg(long = "action-value")]
        action_value: Option<String>,
    },
    /// List active rules.
    List,
    /// Deactivate a rule.
    Delete { id: i64 },
    /// Show recently fired rules.
    Hits {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum SubsCommands {
    /// Add a subscription pattern.
    Add {
        /// Subscription name, e.g. 'Netflix'
        name: String,
        /// Merchant pattern to match
        #[arg(long)]
        pattern: String,
        /// Expected charge amount
        #[arg(long)]
        amount: f64,
        /// Allowed deviation from the expected amount, in percent
        #[arg(long, default_value_t = 10.0)]
        tolerance: f64,
        #[arg(long)]
        category: Option<String>,
    },
    /// List active subscriptions.
    List,
}

#[derive(Subcommand)]
pub enum CategoriesCommands {
    /// Add a merchant→category mapping.
    Add {
        /// Merchant pattern, e.g. 'SWIGGY'
        pattern: String,
        #[arg(long)]
        category: String,
    },
    /// List mappings.
    List,
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// Add an account snapshot.
    Add {
        /// Bank name, e.g. 'HDFC'
        bank: String,
        /// Last 4 digits of the account/card number
        #[arg(long = "last-four")]
        last_four: String,
        #[arg(long)]
        balance: Option<f64>,
        #[arg(long = "credit-limit")]
        credit_limit: Option<f64>,
        /// Default cashback percent for expenses on this account
        #[arg(long)]
        cashback: Option<f64>,
        #[arg(long = "credit-card")]
        credit_card: bool,
    },
    /// List accounts.
    List,
    /// Set the default cashback percent and apply it to past expenses.
    SetCashback {
        bank: String,
        #[arg(long = "last-four")]
        last_four: String,
        #[arg(long)]
        percent: f64,
    },
}

#[derive(Subcommand)]
pub enum TxnsCommands {
    /// List recent ledger entries.
    List {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Soft-delete a ledger entry.
    Delete { id: i64 },
}
