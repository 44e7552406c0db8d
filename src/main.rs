mod cashback;
mod categorizer;
mod cli;
mod db;
mod error;
mod feed;
mod models;
mod pending;
mod processor;
mod rules;
mod settings;
mod subscriptions;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{
    AccountsCommands, CategoriesCommands, Cli, Commands, PendingCommands, RulesCommands,
    SubsCommands, TxnsCommands,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Ingest { file, queue } => cli::ingest::run(file.as_deref(), queue),
        Commands::Pending { command } => match command {
            PendingCommands::List => cli::pending::list(),
            PendingCommands::Confirm {
                id,
                merchant,
                category,
                amount,
                cashback,
            } => cli::pending::confirm(id, merchant, category, amount, cashback),
            PendingCommands::Reject { id } => cli::pending::reject(id),
        },
        Commands::Sweep => cli::sweep::run(),
        Commands::Rules { command } => match command {
            RulesCommands::Add {
                name,
                priority,
                match_type,
                pattern,
                amount_low,
                amount_high,
                action,
                action_value,
            } => cli::rules::add(
                &name,
                priority,
                &match_type,
                pattern.as_deref(),
                amount_low,
                amount_high,
                &action,
                action_value.as_deref(),
            ),
            RulesCommands::List => cli::rules::list(),
            RulesCommands::Delete { id } => cli::rules::delete(id),
            RulesCommands::Hits { limit } => cli::rules::hits(limit),
        },
        Commands::Subs { command } => match command {
            SubsCommands::Add {
                name,
                pattern,
                amount,
                tolerance,
                category,
            } => cli::subs::add(&name, &pattern, amount, tolerance, category.as_deref()),
            SubsCommands::List => cli::subs::list(),
        },
        Commands::Categories { command } => match command {
            CategoriesCommands::Add { pattern, category } => cli::categories::add(&pattern, &category),
            CategoriesCommands::List => cli::categories::list(),
        },
        Commands::Accounts { command } => match command {
            AccountsCommands::Add {
                bank,
                last_four,
                balance,
                credit_limit,
                cashback,
                credit_card,
            } => cli::accounts::add(&bank, &last_four, balance, credit_limit, cashback, credit_card),
            AccountsCommands::List => cli::accounts::list(),
            AccountsCommands::SetCashback {
                bank,
                last_four,
                percent,
            } => cli::accounts::set_cashback(&bank, &last_four, percent),
        },
        Commands::Txns { command } => match command {
            TxnsCommands::List { limit } => cli::txns::list(limit),
            TxnsCommands::Delete { id } => cli::txns::delete(id),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
