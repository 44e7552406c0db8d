use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{round2, TxnKind};

#[derive(Debug, Clone, PartialEq)]
pub enum CashbackResult {
    Calculated { percent: f64, amount: f64 },
    NoCashbackConfigured,
    NotApplicable(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetroactiveResult {
    Applied { updated: usize },
    InvalidPercent,
}

/// Cashback for a single transaction from the account's configured default.
/// Only expenses qualify; income and transfers never earn cashback.
pub fn calculate(
    conn: &Connection,
    kind: TxnKind,
    amount: f64,
    bank: &str,
    last_four: Option<&str>,
) -> Result<CashbackResult> {
    if kind != TxnKind::Expense {
        return Ok(CashbackResult::NotApplicable("only expenses earn cashback"));
    }
    let Some(last_four) = last_four else {
        return Ok(CashbackResult::NotApplicable("no account on transaction"));
    };

    let percent: Option<Option<f64>> = conn
        .query_row(
            "SELECT cashback_percent FROM accounts WHERE bank = ?1 AND last_four = ?2",
            rusqlite::params![bank, last_four],
            |row| row.get(0),
        )
        .optional()?;

    match percent.flatten() {
        Some(p) if p > 0.0 => Ok(CashbackResult::Calculated {
            percent: p,
            amount: round2(amount * p / 100.0),
        }),
        _ => Ok(CashbackResult::NoCashbackConfigured),
    }
}

/// Cashback at an explicitly supplied rate, for one record only.
pub fn at_rate(amount: f64, percent: f64) -> f64 {
    round2(amount * percent / 100.0)
}

/// Bulk-apply a newly configured default rate to an account's history:
/// only non-deleted expense rows for that exact account which carry no
/// cashback yet. Triggered when the account's default changes, never from
/// the per-transaction path.
pub fn apply_retroactive(
    conn: &Connection,
    bank: &str,
    last_four: &str,
    percent: f64,
) -> Result<RetroactiveResult> {
    if percent <= 0.0 {
        return Ok(RetroactiveResult::InvalidPercent);
    }
    let updated = conn.execute(
        "UPDATE transactions \
         SET cashback_percent = ?1, \
             cashback_amount = ROUND(amount * ?1 / 100.0, 2), \
             updated_at = datetime('now') \
         WHERE bank = ?2 AND last_four = ?3 AND kind = 'expense' \
           AND cashback_amount IS NULL AND is_deleted = 0",
        rusqlite::params![percent, bank, last_four],
    )?;
    Ok(RetroactiveResult::Applied { updated })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn add_account(conn: &Connection, bank: &str, last_four: &str, percent: Option<f64>) {
        conn.execute(
            "INSERT INTO accounts (bank, last_four, cashback_percent) VALUES (?1, ?2, ?3)",
            rusqlite::params![bank, last_four, percent],
        )
        .unwrap();
    }

    fn add_txn(
        conn: &Connection,
        bank: &str,
        last_four: &str,
        kind: &str,
        amount: f64,
        cashback: Option<f64>,
        hash: &str,
    ) -> i64 {
        conn.execute(
            "INSERT INTO transactions (amount, merchant, kind, occurred_at, dedup_hash, bank, last_four, cashback_amount, cashback_percent) \
             VALUES (?1, 'M', ?2, '2025-06-01 10:00:00', ?3, ?4, ?5, ?6, ?6)",
            rusqlite::params![amount, kind, hash, bank, last_four, cashback],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    #[test]
    fn test_calculate_uses_account_default() {
        let (_dir, conn) = test_db();
        add_account(&conn, "HDFC", "1234", Some(2.0));
        let result = calculate(&conn, TxnKind::Expense, 500.0, "HDFC", Some("1234")).unwrap();
        assert_eq!(result, CashbackResult::Calculated { percent: 2.0, amount: 10.0 });
    }

    #[test]
    fn test_calculate_income_not_applicable() {
        let (_dir, conn) = test_db();
        add_account(&conn, "HDFC", "1234", Some(2.0));
        let result = calculate(&conn, TxnKind::Income, 500.0, "HDFC", Some("1234")).unwrap();
        assert!(matches!(result, CashbackResult::NotApplicable(_)));
        let result = calculate(&conn, TxnKind::Transfer, 500.0, "HDFC", Some("1234")).unwrap();
        assert!(matches!(result, CashbackResult::NotApplicable(_)));
    }

    #[test]
    fn test_calculate_unknown_account() {
        let (_dir, conn) = test_db();
        let result = calculate(&conn, TxnKind::Expense, 500.0, "HDFC", Some("1234")).unwrap();
        assert_eq!(result, CashbackResult::NoCashbackConfigured);
    }

    #[test]
    fn test_calculate_zero_percent_means_unconfigured() {
        let (_dir, conn) = test_db();
        add_account(&conn, "HDFC", "1234", Some(0.0));
        let result = calculate(&conn, TxnKind::Expense, 500.0, "HDFC", Some("1234")).unwrap();
        assert_eq!(result, CashbackResult::NoCashbackConfigured);
        add_account(&conn, "ICICI", "5678", None);
        let result = calculate(&conn, TxnKind::Expense, 500.0, "ICICI", Some("5678")).unwrap();
        assert_eq!(result, CashbackResult::NoCashbackConfigured);
    }

    #[test]
    fn test_at_rate_rounds_to_paise() {
        assert_eq!(at_rate(500.0, 2.0), 10.0);
        assert_eq!(at_rate(249.0, 2.0), 4.98);
    }

    #[test]
    fn test_retroactive_rejects_non_positive_percent() {
        let (_dir, conn) = test_db();
        add_txn(&conn, "HDFC", "1234", "expense", 100.0, None, "h1");
        assert_eq!(apply_retroactive(&conn, "HDFC", "1234", 0.0).unwrap(), RetroactiveResult::InvalidPercent);
        assert_eq!(apply_retroactive(&conn, "HDFC", "1234", -5.0).unwrap(), RetroactiveResult::InvalidPercent);
        let cashback: Option<f64> = conn
            .query_row("SELECT cashback_amount FROM transactions LIMIT 1", [], |r| r.get(0))
            .unwrap();
        assert!(cashback.is_none(), "invalid percent must change nothing");
    }

    #[test]
    fn test_retroactive_targets_exact_account_expenses_without_cashback() {
        let (_dir, conn) = test_db();
        let target = add_txn(&conn, "HDFC", "1234", "expense", 500.0, None, "h1");
        add_txn(&conn, "HDFC", "1234", "expense", 200.0, Some(4.0), "h2"); // already has cashback
        add_txn(&conn, "HDFC", "1234", "income", 900.0, None, "h3"); // not an expense
        add_txn(&conn, "HDFC", "9999", "expense", 300.0, None, "h4"); // other account
        add_txn(&conn, "ICICI", "1234", "expense", 300.0, None, "h5"); // other bank

        let result = apply_retroactive(&conn, "HDFC", "1234", 5.0).unwrap();
        assert_eq!(result, RetroactiveResult::Applied { updated: 1 });

        let (pct, amt): (f64, f64) = conn
            .query_row(
                "SELECT cashback_percent, cashback_amount FROM transactions WHERE id = ?1",
                [target],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(pct, 5.0);
        assert_eq!(amt, 25.0);

        let untouched: i64 = conn
            .query_row(
                "SELECT count(*) FROM transactions WHERE cashback_amount IS NULL",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(untouched, 3);
    }

    #[test]
    fn test_retroactive_skips_soft_deleted() {
        let (_dir, conn) = test_db();
        let id = add_txn(&conn, "HDFC", "1234", "expense", 500.0, None, "h1");
        conn.execute("UPDATE transactions SET is_deleted = 1 WHERE id = ?1", [id]).unwrap();
        let result = apply_retroactive(&conn, "HDFC", "1234", 5.0).unwrap();
        assert_eq!(result, RetroactiveResult::Applied { updated: 0 });
    }

    #[test]
    fn test_retroactive_counts_rows_changed() {
        let (_dir, conn) = test_db();
        add_txn(&conn, "HDFC", "1234", "expense", 100.0, None, "h1");
        add_txn(&conn, "HDFC", "1234", "expense", 200.0, None, "h2");
        add_txn(&conn, "HDFC", "1234", "expense", 300.0, None, "h3");
        let result = apply_retroactive(&conn, "HDFC", "1234", 2.0).unwrap();
        assert_eq!(result, RetroactiveResult::Applied { updated: 3 });
        // A second pass finds nothing left to update.
        let result = apply_retroactive(&conn, "HDFC", "1234", 2.0).unwrap();
        assert_eq!(result, RetroactiveResult::Applied { updated: 0 });
    }
}
