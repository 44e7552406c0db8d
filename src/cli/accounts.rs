use comfy_table::{Cell, Table};

use crate::cashback::{self, RetroactiveResult};
use crate::db::get_connection;
use crate::error::{PassbookError, Result};
use crate::models::AccountSnapshot;
use crate::settings::db_path;

pub fn add(
    bank: &str,
    last_four: &str,
    balance: Option<f64>,
    credit_limit: Option<f64>,
    cashback: Option<f64>,
    credit_card: bool,
) -> Result<()> {
    let conn = get_connection(&db_path())?;
    conn.execute(
        "INSERT INTO accounts (bank, last_four, balance, credit_limit, cashback_percent, is_credit_card) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![bank, last_four, balance, credit_limit, cashback, credit_card as i32],
    )?;
    println!("Added account: {bank} ****{last_four}");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = get_connection(&db_path())?;
    let mut stmt = conn.prepare(
        "SELECT id, bank, last_four, balance, credit_limit, cashback_percent, is_credit_card, \
                balance_updated_at, balance_source \
         FROM accounts ORDER BY bank, last_four",
    )?;
    let accounts: Vec<AccountSnapshot> = stmt
        .query_map([], |row| {
            Ok(AccountSnapshot {
                id: row.get(0)?,
                bank: row.get(1)?,
                last_four: row.get(2)?,
                balance: row.get(3)?,
                credit_limit: row.get(4)?,
                cashback_percent: row.get(5)?,
                is_credit_card: row.get::<_, i32>(6)? == 1,
                balance_updated_at: row.get(7)?,
                balance_source: row.get(8)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut table = Table::new();
    table.set_header(vec!["Bank", "Last Four", "Balance", "Credit Limit", "Cashback %", "Card", "Updated", "Source"]);
    for account in accounts {
        table.add_row(vec![
            Cell::new(&account.bank),
            Cell::new(&account.last_four),
            Cell::new(account.balance.map(|b| format!("{b:.2}")).unwrap_or_default()),
            Cell::new(account.credit_limit.map(|l| format!("{l:.2}")).unwrap_or_default()),
            Cell::new(account.cashback_percent.map(|c| format!("{c}%")).unwrap_or_default()),
            Cell::new(if account.is_credit_card { "credit" } else { "" }),
            Cell::new(account.balance_updated_at.unwrap_or_default()),
            Cell::new(account.balance_source.unwrap_or_default()),
        ]);
    }
    println!("Accounts\n{table}");
    Ok(())
}

/// Store the account's default cashback percent and back-fill the rate onto
/// its past uncashbacked expenses. This is the only entry point to
/// retroactive application.
pub fn set_cashback(bank: &str, last_four: &str, percent: f64) -> Result<()> {
    if percent <= 0.0 {
        return Err(PassbookError::InvalidPercent(percent));
    }
    let conn = get_connection(&db_path())?;
    let changed = conn.execute(
        "UPDATE accounts SET cashback_percent = ?1 WHERE bank = ?2 AND last_four = ?3",
        rusqlite::params![percent, bank, last_four],
    )?;
    if changed == 0 {
        return Err(PassbookError::UnknownAccount(format!("{bank} ****{last_four}")));
    }
    match cashback::apply_retroactive(&conn, bank, last_four, percent)? {
        RetroactiveResult::Applied { updated } => {
            println!("Default cashback for {bank} ****{last_four} set to {percent}%; {updated} past transactions updated");
        }
        RetroactiveResult::InvalidPercent => {
            return Err(PassbookError::InvalidPercent(percent));
        }
    }
    Ok(())
}
