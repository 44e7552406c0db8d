use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::db::get_connection;
use crate::error::Result;
use crate::processor::soft_delete;
use crate::settings::db_path;

pub fn list(limit: i64) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let mut stmt = conn.prepare(
        "SELECT id, occurred_at, merchant, amount, kind, category, cashback_amount \
         FROM transactions WHERE is_deleted = 0 ORDER BY id DESC LIMIT ?1",
    )?;
    let rows: Vec<(i64, String, String, f64, String, Option<String>, Option<f64>)> = stmt
        .query_map([limit], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Merchant", "Amount", "Kind", "Category", "Cashback"]);
    for (id, date, merchant, amount, kind, category, cashback) in rows {
        table.add_row(vec![
            Cell::new(id),
            Cell::new(&date),
            Cell::new(&merchant),
            Cell::new(format!("{amount:.2}")),
            Cell::new(&kind),
            Cell::new(category.unwrap_or_default()),
            Cell::new(cashback.map(|c| format!("{c:.2}")).unwrap_or_default()),
        ]);
    }
    println!("Transactions\n{table}");
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let conn = get_connection(&db_path())?;
    if soft_delete(&conn, id)? {
        println!("{} transaction #{id}", "Deleted".red());
    } else {
        println!("{} no live transaction #{id}", "Unchanged:".yellow());
    }
    Ok(())
}
