use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::db::get_connection;
use crate::error::Result;
use crate::pending::{self, ConfirmEdits, ConfirmOutcome, RejectOutcome};
use crate::settings::db_path;

pub fn list() -> Result<()> {
    let conn = get_connection(&db_path())?;
    let rows = pending::list(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Merchant", "Amount", "Kind", "Status", "Expires"]);
    for row in rows {
        table.add_row(vec![
            Cell::new(row.id),
            Cell::new(&row.merchant),
            Cell::new(format!("{:.2}", row.amount)),
            Cell::new(row.kind.as_str()),
            Cell::new(row.status.as_str()),
            Cell::new(&row.expires_at),
        ]);
    }
    println!("Pending transactions\n{table}");
    Ok(())
}

pub fn confirm(
    id: i64,
    merchant: Option<String>,
    category: Option<String>,
    amount: Option<f64>,
    cashback: Option<f64>,
) -> Result<()> {
    let mut conn = get_connection(&db_path())?;
    let feed = super::logging_feed();
    let edits = ConfirmEdits { merchant, category, amount };
    match pending::confirm(&mut conn, id, &edits, cashback, &feed)? {
        ConfirmOutcome::Confirmed(result) => super::ingest::print_result(&result),
        ConfirmOutcome::Stale { current } => {
            println!("{} entry #{id} already {}", "Unchanged:".yellow(), current.as_str());
        }
    }
    Ok(())
}

pub fn reject(id: i64) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let feed = super::logging_feed();
    match pending::reject(&conn, id, &feed)? {
        RejectOutcome::Rejected => println!("{} pending #{id}", "Rejected".red()),
        RejectOutcome::Stale { current } => {
            println!("{} entry #{id} already {}", "Unchanged:".yellow(), current.as_str());
        }
    }
    Ok(())
}
