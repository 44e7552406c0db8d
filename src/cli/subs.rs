use comfy_table::{Cell, Table};

use crate::db::get_connection;
use crate::error::Result;
use crate::settings::db_path;
use crate::subscriptions;

pub fn add(
    name: &str,
    pattern: &str,
    amount: f64,
    tolerance: f64,
    category: Option<&str>,
) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let id = subscriptions::add_subscription(&conn, name, pattern, amount, tolerance, category)?;
    println!("Added subscription #{id}: '{pattern}' at {amount:.2} \u{00b1}{tolerance}%");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = get_connection(&db_path())?;
    let subs = subscriptions::load_active(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Pattern", "Amount", "Tolerance", "Category"]);
    for sub in subs {
        table.add_row(vec![
            Cell::new(sub.id),
            Cell::new(&sub.name),
            Cell::new(&sub.merchant_pattern),
            Cell::new(format!("{:.2}", sub.expected_amount)),
            Cell::new(format!("{}%", sub.tolerance_percent)),
            Cell::new(sub.category.unwrap_or_default()),
        ]);
    }
    println!("Subscriptions\n{table}");
    Ok(())
}
