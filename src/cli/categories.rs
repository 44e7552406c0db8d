use comfy_table::{Cell, Table};

use crate::categorizer;
use crate::db::get_connection;
use crate::error::Result;
use crate::settings::db_path;

pub fn add(pattern: &str, category: &str) -> Result<()> {
    let conn = get_connection(&db_path())?;
    categorizer::add_mapping(&conn, pattern, category)?;
    println!("Added mapping: '{pattern}' \u{2192} {category}");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = get_connection(&db_path())?;
    let mappings = categorizer::list_mappings(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Pattern", "Category"]);
    for (id, pattern, category) in mappings {
        table.add_row(vec![Cell::new(id), Cell::new(&pattern), Cell::new(&category)]);
    }
    println!("Merchant categories\n{table}");
    Ok(())
}
