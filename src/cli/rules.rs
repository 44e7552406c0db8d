use comfy_table::{Cell, Table};

use crate::db::get_connection;
use crate::error::{PassbookError, Result};
use crate::rules::{self, RuleAction, RulePredicate};
use crate::settings::db_path;

#[allow(clippy::too_many_arguments)]
pub fn add(
    name: &str,
    priority: i64,
    match_type: &str,
    pattern: Option<&str>,
    amount_low: Option<f64>,
    amount_high: Option<f64>,
    action: &str,
    action_value: Option<&str>,
) -> Result<()> {
    let predicate = RulePredicate::from_columns(match_type, pattern, amount_low, amount_high)
        .ok_or_else(|| {
            PassbookError::Other(format!(
                "invalid predicate '{match_type}' (check --pattern / --amount-low / --amount-high)"
            ))
        })?;
    let action = RuleAction::from_columns(action, action_value)
        .ok_or_else(|| PassbookError::Other(format!("invalid action '{action}' (check --action-value)")))?;

    let conn = get_connection(&db_path())?;
    let id = rules::add_rule(&conn, name, priority, &predicate, &action)?;
    println!("Added rule #{id} '{name}': {}", predicate.describe());
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = get_connection(&db_path())?;
    let listings = rules::list_rules(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Priority", "Predicate", "Action", "Hits"]);
    for rule in listings {
        table.add_row(vec![
            Cell::new(rule.id),
            Cell::new(&rule.name),
            Cell::new(rule.priority),
            Cell::new(&rule.predicate),
            Cell::new(&rule.action),
            Cell::new(rule.hit_count),
        ]);
    }
    println!("Rules\n{table}");
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let conn = get_connection(&db_path())?;
    rules::deactivate_rule(&conn, id)?;
    println!("Deactivated rule {id}");
    Ok(())
}

pub fn hits(limit: i64) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let rows = rules::recent_hits(&conn, limit)?;

    let mut table = Table::new();
    table.set_header(vec!["Rule", "Transaction", "Outcome", "Fired At"]);
    for hit in rows {
        table.add_row(vec![
            Cell::new(&hit.rule_name),
            Cell::new(
                hit.transaction_id
                    .map(|id| format!("#{id}"))
                    .unwrap_or_default(),
            ),
            Cell::new(&hit.outcome),
            Cell::new(&hit.fired_at),
        ]);
    }
    println!("Recent rule hits\n{table}");
    Ok(())
}
