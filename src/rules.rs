use regex::Regex;
use rusqlite::Connection;

use crate::error::{PassbookError, Result};
use crate::models::TransactionRecord;

// Amount comparisons tolerate sub-paisa float noise.
const AMOUNT_EPSILON: f64 = 0.005;

#[derive(Debug, Clone, PartialEq)]
pub enum RulePredicate {
    MerchantEquals(String),
    MerchantContains(String),
    AmountAbove(f64),
    AmountBelow(f64),
    AmountEquals(f64),
    AmountBetween(f64, f64),
    CategoryEquals(String),
    RawPattern(String),
}

impl RulePredicate {
    pub fn from_columns(
        match_type: &str,
        pattern: Option<&str>,
        amount_low: Option<f64>,
        amount_high: Option<f64>,
    ) -> Option<Self> {
        match match_type {
            "merchant_equals" => Some(Self::MerchantEquals(pattern?.to_string())),
            "merchant_contains" => Some(Self::MerchantContains(pattern?.to_string())),
            "amount_above" => Some(Self::AmountAbove(amount_low?)),
            "amount_below" => Some(Self::AmountBelow(amount_high?)),
            "amount_equals" => Some(Self::AmountEquals(amount_low?)),
            "amount_between" => Some(Self::AmountBetween(amount_low?, amount_high?)),
            "category_equals" => Some(Self::CategoryEquals(pattern?.to_string())),
            "raw_pattern" => Some(Self::RawPattern(pattern?.to_string())),
            _ => None,
        }
    }

    pub fn to_columns(&self) -> (&'static str, Option<&str>, Option<f64>, Option<f64>) {
        match self {
            Self::MerchantEquals(p) => ("merchant_equals", Some(p), None, None),
            Self::MerchantContains(p) => ("merchant_contains", Some(p), None, None),
            Self::AmountAbove(low) => ("amount_above", None, Some(*low), None),
            Self::AmountBelow(high) => ("amount_below", None, None, Some(*high)),
            Self::AmountEquals(v) => ("amount_equals", None, Some(*v), None),
            Self::AmountBetween(low, high) => ("amount_between", None, Some(*low), Some(*high)),
            Self::CategoryEquals(p) => ("category_equals", Some(p), None, None),
            Self::RawPattern(p) => ("raw_pattern", Some(p), None, None),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::MerchantEquals(p) => format!("merchant equals '{p}'"),
            Self::MerchantContains(p) => format!("merchant contains '{p}'"),
            Self::AmountAbove(low) => format!("amount above {low:.2}"),
            Self::AmountBelow(high) => format!("amount below {high:.2}"),
            Self::AmountEquals(v) => format!("amount equals {v:.2}"),
            Self::AmountBetween(low, high) => format!("amount between {low:.2} and {high:.2}"),
            Self::CategoryEquals(p) => format!("category equals '{p}'"),
            Self::RawPattern(p) => format!("raw text matches /{p}/"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleAction {
    Block,
    SetCategory(String),
    SetMerchant(String),
}

impl RuleAction {
    pub fn from_columns(action: &str, action_value: Option<&str>) -> Option<Self> {
        match action {
            "block" => Some(Self::Block),
            "set_category" => Some(Self::SetCategory(action_value?.to_string())),
            "set_merchant" => Some(Self::SetMerchant(action_value?.to_string())),
            _ => None,
        }
    }

    pub fn to_columns(&self) -> (&'static str, Option<&str>) {
        match self {
            Self::Block => ("block", None),
            Self::SetCategory(v) => ("set_category", Some(v)),
            Self::SetMerchant(v) => ("set_merchant", Some(v)),
        }
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Self::Block)
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: i64,
    pub name: String,
    pub priority: i64,
    pub predicate: RulePredicate,
    pub action: RuleAction,
}

impl Rule {
    pub fn matches(&self, record: &TransactionRecord, source_text: &str) -> bool {
        match &self.predicate {
            RulePredicate::MerchantEquals(p) => {
                record.merchant.trim().eq_ignore_ascii_case(p.trim())
            }
            RulePredicate::MerchantContains(p) => record
                .merchant
                .to_uppercase()
                .contains(&p.trim().to_uppercase()),
            RulePredicate::AmountAbove(low) => record.amount > *low,
            RulePredicate::AmountBelow(high) => record.amount < *high,
            RulePredicate::AmountEquals(v) => (record.amount - v).abs() < AMOUNT_EPSILON,
            RulePredicate::AmountBetween(low, high) => {
                record.amount >= *low && record.amount <= *high
            }
            RulePredicate::CategoryEquals(p) => record
                .category
                .as_deref()
                .map(|c| c.eq_ignore_ascii_case(p.trim()))
                .unwrap_or(false),
            RulePredicate::RawPattern(p) => Regex::new(p)
                .map(|re| re.is_match(source_text))
                .unwrap_or(false),
        }
    }

    /// Apply a transform action to the in-flight record. Blocks are handled
    /// by the processor before transforms run.
    pub fn apply(&self, record: &mut TransactionRecord) {
        match &self.action {
            RuleAction::Block => {}
            RuleAction::SetCategory(category) => record.category = Some(category.clone()),
            RuleAction::SetMerchant(merchant) => record.merchant = merchant.clone(),
        }
    }
}

/// Active rules in evaluation order: priority ascending, id as tiebreak.
/// Later rules override earlier ones on conflicting fields, so the highest
/// priority wins.
pub fn load_active_rules(conn: &Connection) -> Result<Vec<Rule>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, name, priority, match_type, pattern, amount_low, amount_high, action, action_value \
         FROM rules WHERE is_active = 1 ORDER BY priority ASC, id ASC",
    )?;
    let rows: Vec<(i64, String, i64, String, Option<String>, Option<f64>, Option<f64>, String, Option<String>)> =
        stmt.query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    // Malformed rows (unknown kinds, missing operands) are skipped, not fatal.
    let rules = rows
        .into_iter()
        .filter_map(|(id, name, priority, match_type, pattern, low, high, action, action_value)| {
            let predicate = RulePredicate::from_columns(&match_type, pattern.as_deref(), low, high)?;
            let action = RuleAction::from_columns(&action, action_value.as_deref())?;
            Some(Rule { id, name, priority, predicate, action })
        })
        .collect();
    Ok(rules)
}

pub fn add_rule(
    conn: &Connection,
    name: &str,
    priority: i64,
    predicate: &RulePredicate,
    action: &RuleAction,
) -> Result<i64> {
    let (match_type, pattern, low, high) = predicate.to_columns();
    let (action_type, action_value) = action.to_columns();
    conn.execute(
        "INSERT INTO rules (name, priority, match_type, pattern, amount_low, amount_high, action, action_value) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![name, priority, match_type, pattern, low, high, action_type, action_value],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn deactivate_rule(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute(
        "UPDATE rules SET is_active = 0 WHERE id = ?1 AND is_active = 1",
        [id],
    )?;
    if changed == 0 {
        return Err(PassbookError::Other(format!(
            "No active rule with ID {id}"
        )));
    }
    Ok(())
}

/// Count a rule firing: bump the rule's hit counter and append to the audit
/// trail. `transaction_id` is None for blocks (nothing was persisted).
pub fn record_hit(
    conn: &Connection,
    rule_id: i64,
    transaction_id: Option<i64>,
    outcome: &str,
) -> Result<()> {
    conn.execute("UPDATE rules SET hit_count = hit_count + 1 WHERE id = ?1", [rule_id])?;
    conn.execute(
        "INSERT INTO rule_hits (rule_id, transaction_id, outcome) VALUES (?1, ?2, ?3)",
        rusqlite::params![rule_id, transaction_id, outcome],
    )?;
    Ok(())
}

pub struct RuleListing {
    pub id: i64,
    pub name: String,
    pub priority: i64,
    pub predicate: String,
    pub action: String,
    pub hit_count: i64,
}

pub fn list_rules(conn: &Connection) -> Result<Vec<RuleListing>> {
    let rules = load_active_rules(conn)?;
    let mut listings = Vec::with_capacity(rules.len());
    for rule in rules {
        let hit_count: i64 = conn.query_row(
            "SELECT hit_count FROM rules WHERE id = ?1",
            [rule.id],
            |r| r.get(0),
        )?;
        let (action_type, action_value) = rule.action.to_columns();
        let action = match action_value {
            Some(v) => format!("{action_type} '{v}'"),
            None => action_type.to_string(),
        };
        listings.push(RuleListing {
            id: rule.id,
            name: rule.name,
            priority: rule.priority,
            predicate: rule.predicate.describe(),
            action,
            hit_count,
        });
    }
    Ok(listings)
}

pub struct RuleHitRow {
    pub rule_name: String,
    pub transaction_id: Option<i64>,
    pub outcome: String,
    pub fired_at: String,
}

pub fn recent_hits(conn: &Connection, limit: i64) -> Result<Vec<RuleHitRow>> {
    let mut stmt = conn.prepare(
        "SELECT r.name, h.transaction_id, h.outcome, h.fired_at \
         FROM rule_hits h JOIN rules r ON h.rule_id = r.id \
         ORDER BY h.id DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit], |row| {
            Ok(RuleHitRow {
                rule_name: row.get(0)?,
                transaction_id: row.get(1)?,
                outcome: row.get(2)?,
                fired_at: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};
    use crate::models::{sample_parsed, TransactionRecord};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn record() -> TransactionRecord {
        TransactionRecord::from_parsed(&sample_parsed())
    }

    fn rule(predicate: RulePredicate, action: RuleAction) -> Rule {
        Rule { id: 1, name: "test".to_string(), priority: 0, predicate, action }
    }

    #[test]
    fn test_merchant_equals_ignores_case() {
        let r = rule(RulePredicate::MerchantEquals("amazon".to_string()), RuleAction::Block);
        assert!(r.matches(&record(), ""));
    }

    #[test]
    fn test_merchant_contains() {
        let r = rule(RulePredicate::MerchantContains("ama".to_string()), RuleAction::Block);
        assert!(r.matches(&record(), ""));
        let r = rule(RulePredicate::MerchantContains("flipkart".to_string()), RuleAction::Block);
        assert!(!r.matches(&record(), ""));
    }

    #[test]
    fn test_amount_comparisons() {
        let rec = record(); // amount 500.0
        assert!(rule(RulePredicate::AmountAbove(499.99), RuleAction::Block).matches(&rec, ""));
        assert!(!rule(RulePredicate::AmountAbove(500.0), RuleAction::Block).matches(&rec, ""));
        assert!(rule(RulePredicate::AmountBelow(500.01), RuleAction::Block).matches(&rec, ""));
        assert!(rule(RulePredicate::AmountEquals(500.0), RuleAction::Block).matches(&rec, ""));
        assert!(rule(RulePredicate::AmountBetween(400.0, 600.0), RuleAction::Block).matches(&rec, ""));
        assert!(!rule(RulePredicate::AmountBetween(501.0, 600.0), RuleAction::Block).matches(&rec, ""));
    }

    #[test]
    fn test_category_equals_only_after_categorization() {
        let mut rec = record();
        let r = rule(RulePredicate::CategoryEquals("Shopping".to_string()), RuleAction::Block);
        assert!(!r.matches(&rec, ""), "no category set yet");
        rec.category = Some("Shopping".to_string());
        assert!(r.matches(&rec, ""));
    }

    #[test]
    fn test_raw_pattern_matches_source_text() {
        let r = rule(RulePredicate::RawPattern(r"card x\d{4}".to_string()), RuleAction::Block);
        assert!(r.matches(&record(), "Rs.500 spent on HDFC card x1234 at Amazon"));
        assert!(!r.matches(&record(), "Rs.500 spent via UPI"));
    }

    #[test]
    fn test_invalid_regex_never_matches() {
        let r = rule(RulePredicate::RawPattern("[unclosed".to_string()), RuleAction::Block);
        assert!(!r.matches(&record(), "anything"));
    }

    #[test]
    fn test_apply_transforms() {
        let mut rec = record();
        rule(
            RulePredicate::MerchantEquals("Amazon".to_string()),
            RuleAction::SetCategory("Online Shopping".to_string()),
        )
        .apply(&mut rec);
        assert_eq!(rec.category.as_deref(), Some("Online Shopping"));

        rule(
            RulePredicate::MerchantEquals("Amazon".to_string()),
            RuleAction::SetMerchant("Amazon India".to_string()),
        )
        .apply(&mut rec);
        assert_eq!(rec.merchant, "Amazon India");
    }

    #[test]
    fn test_load_orders_by_priority_ascending() {
        let (_dir, conn) = test_db();
        add_rule(&conn, "later", 10, &RulePredicate::MerchantContains("A".into()), &RuleAction::Block).unwrap();
        add_rule(&conn, "earlier", 1, &RulePredicate::MerchantContains("B".into()), &RuleAction::Block).unwrap();
        let rules = load_active_rules(&conn).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].name, "earlier");
        assert_eq!(rules[1].name, "later");
    }

    #[test]
    fn test_load_skips_malformed_rows() {
        let (_dir, conn) = test_db();
        conn.execute(
            "INSERT INTO rules (name, match_type, action) VALUES ('bad', 'tarot_card', 'block')",
            [],
        )
        .unwrap();
        add_rule(&conn, "good", 0, &RulePredicate::MerchantContains("A".into()), &RuleAction::Block).unwrap();
        let rules = load_active_rules(&conn).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "good");
    }

    #[test]
    fn test_deactivate_rule() {
        let (_dir, conn) = test_db();
        let id = add_rule(&conn, "r", 0, &RulePredicate::MerchantContains("A".into()), &RuleAction::Block).unwrap();
        deactivate_rule(&conn, id).unwrap();
        assert!(load_active_rules(&conn).unwrap().is_empty());
        assert!(deactivate_rule(&conn, id).is_err(), "already inactive");
    }

    #[test]
    fn test_record_hit_updates_count_and_audit() {
        let (_dir, conn) = test_db();
        let id = add_rule(&conn, "r", 0, &RulePredicate::MerchantContains("A".into()), &RuleAction::Block).unwrap();
        record_hit(&conn, id, None, "blocked").unwrap();
        record_hit(&conn, id, None, "blocked").unwrap();
        let count: i64 = conn
            .query_row("SELECT hit_count FROM rules WHERE id = ?1", [id], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
        let hits = recent_hits(&conn, 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].rule_name, "r");
        assert_eq!(hits[0].outcome, "blocked");
    }

    #[test]
    fn test_predicate_column_roundtrip() {
        let preds = [
            RulePredicate::MerchantEquals("X".into()),
            RulePredicate::AmountBetween(10.0, 20.0),
            RulePredicate::RawPattern("UPI".into()),
        ];
        for p in preds {
            let (mt, pat, low, high) = p.to_columns();
            let back = RulePredicate::from_columns(mt, pat, low, high).unwrap();
            assert_eq!(back, p);
        }
    }
}
