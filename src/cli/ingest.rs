use std::io::Read;

use colored::Colorize;

use crate::db::get_connection;
use crate::error::Result;
use crate::models::{ParsedTransaction, TransactionRecord};
use crate::pending::{self, QueueOutcome};
use crate::processor::{process_and_save, ProcessConfig, ProcessResult};
use crate::settings::{db_path, load_settings};

pub fn run(file: Option<&str>, queue: bool) -> Result<()> {
    let payload = match file {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let parsed: ParsedTransaction = serde_json::from_str(&payload)?;
    let mut conn = get_connection(&db_path())?;
    let feed = super::logging_feed();

    if queue {
        let settings = load_settings();
        match pending::queue(&conn, &parsed, settings.pending_ttl_hours, chrono::Utc::now(), &feed)? {
            QueueOutcome::Queued { pending_id, expires_at } => {
                println!(
                    "{} pending #{pending_id}, auto-saves after {expires_at}",
                    "Queued".green()
                );
            }
            QueueOutcome::Duplicate { existing_id } => {
                println!("{} matches existing entry #{existing_id}", "Skipped".yellow());
            }
        }
        return Ok(());
    }

    let draft = TransactionRecord::from_parsed(&parsed);
    let result = process_and_save(&mut conn, draft, &parsed.raw_text, None, &ProcessConfig::default())?;
    print_result(&result);
    Ok(())
}

pub(crate) fn print_result(result: &ProcessResult) {
    match result {
        ProcessResult::Saved { transaction_id, cashback_amount, subscription_id } => {
            println!("{} transaction #{transaction_id}", "Saved".green());
            if let Some(cashback) = cashback_amount {
                println!("  cashback: {cashback:.2}");
            }
            if let Some(sub_id) = subscription_id {
                println!("  matched subscription #{sub_id}");
            }
        }
        ProcessResult::Blocked { rule_name, reason } => {
            println!("{} by rule '{rule_name}' ({reason})", "Blocked".red());
        }
        ProcessResult::Duplicate { existing_id, reason } => {
            println!("{} duplicate of #{existing_id} ({reason})", "Skipped".yellow());
        }
    }
}
