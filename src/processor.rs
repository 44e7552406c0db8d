use rusqlite::{Connection, ErrorCode, OptionalExtension, Transaction};
use tracing::debug;

use crate::cashback::{self, CashbackResult};
use crate::categorizer;
use crate::error::{PassbookError, Result};
use crate::models::TransactionRecord;
use crate::rules;
use crate::subscriptions;

#[derive(Debug, Clone, Default)]
pub struct ProcessConfig {
    pub skip_duplicate_check: bool,
    pub preserve_user_category: bool,
    pub custom_cashback_percent: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOrigin {
    Confirm,
    AutoSave,
}

impl SaveOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::AutoSave => "auto_save",
        }
    }
}

/// Carried when a save originates from a pending entry: the balance-after
/// and timestamp captured at notification time, not recomputed at save time.
#[derive(Debug, Clone)]
pub struct PendingOrigin {
    pub pending_id: i64,
    pub balance_after: Option<f64>,
    pub captured_at: String,
    pub source: SaveOrigin,
}

/// Expected outcomes of the pipeline. Storage failures use the `Err` arm of
/// the crate `Result`; duplicates and blocks are values callers branch on.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessResult {
    Saved {
        transaction_id: i64,
        cashback_amount: Option<f64>,
        subscription_id: Option<i64>,
    },
    Blocked {
        rule_name: String,
        reason: String,
    },
    Duplicate {
        existing_id: i64,
        reason: String,
    },
}

/// Run the full pipeline and commit. One SQLite transaction covers every
/// write, so an interrupted call leaves nothing partially visible.
pub fn process_and_save(
    conn: &mut Connection,
    draft: TransactionRecord,
    source_text: &str,
    pending_origin: Option<&PendingOrigin>,
    config: &ProcessConfig,
) -> Result<ProcessResult> {
    let tx = conn.transaction()?;
    let result = run_pipeline(&tx, draft, source_text, pending_origin, config)?;
    tx.commit()?;
    Ok(result)
}

/// The pipeline proper, for callers that already hold a transaction (the
/// pending state machine runs its status CAS and this in one unit).
///
/// Order is load-bearing: dedup, categorize, block rules, transform rules,
/// subscription match, cashback, persist, balance update, audit.
pub fn run_pipeline(
    tx: &Transaction,
    mut draft: TransactionRecord,
    source_text: &str,
    pending_origin: Option<&PendingOrigin>,
    config: &ProcessConfig,
) -> Result<ProcessResult> {
    if let Some(percent) = config.custom_cashback_percent {
        if percent <= 0.0 {
            return Err(PassbookError::InvalidPercent(percent));
        }
    }

    // 1. Duplicate suppression against the ledger and the pending queue.
    if !config.skip_duplicate_check {
        if let Some(existing_id) = ledger_id_for_hash(tx, &draft.dedup_hash)? {
            return Ok(ProcessResult::Duplicate {
                existing_id,
                reason: "already in ledger".to_string(),
            });
        }
        if let Some(existing_id) = pending_id_for_hash(tx, &draft.dedup_hash)? {
            return Ok(ProcessResult::Duplicate {
                existing_id,
                reason: "awaiting confirmation".to_string(),
            });
        }
    }

    // 2. Categorization from the merchant mapping, unless the user chose.
    if !config.preserve_user_category {
        if let Some(category) = categorizer::lookup_category(tx, &draft.merchant)? {
            draft.category = Some(category);
        }
    }

    let active_rules = rules::load_active_rules(tx)?;

    // 3. Blocks win over transforms regardless of relative priority.
    for rule in &active_rules {
        if rule.action.is_block() && rule.matches(&draft, source_text) {
            rules::record_hit(tx, rule.id, None, "blocked")?;
            return Ok(ProcessResult::Blocked {
                rule_name: rule.name.clone(),
                reason: rule.predicate.describe(),
            });
        }
    }

    // 4. Transforms apply cumulatively; the highest priority runs last and
    // wins conflicting fields.
    let mut fired = Vec::new();
    for rule in &active_rules {
        if !rule.action.is_block() && rule.matches(&draft, source_text) {
            rule.apply(&mut draft);
            fired.push(rule.id);
        }
    }

    // 5. Subscription tagging. Never blocks, never alters amount/category.
    let subs = subscriptions::load_active(tx)?;
    if let Some(sub) =
        subscriptions::find_match(&subs, &draft.merchant, draft.amount, draft.category.as_deref())
    {
        draft.subscription_id = Some(sub.id);
    }

    // 6. Cashback. A custom rate applies to this record only; retroactive
    // application is a separate flow triggered from account settings.
    if let Some(percent) = config.custom_cashback_percent {
        draft.cashback_percent = Some(percent);
        draft.cashback_amount = Some(cashback::at_rate(draft.amount, percent));
    } else if let CashbackResult::Calculated { percent, amount } = cashback::calculate(
        tx,
        draft.kind,
        draft.amount,
        &draft.bank,
        draft.last_four.as_deref(),
    )? {
        draft.cashback_percent = Some(percent);
        draft.cashback_amount = Some(amount);
    }

    // 7. Persist. The unique index is the last line of defense against a
    // racing save with the same hash.
    let inserted = tx.execute(
        "INSERT INTO transactions \
         (amount, currency, merchant, category, kind, occurred_at, dedup_hash, \
          cashback_percent, cashback_amount, subscription_id, bank, last_four, raw_text) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        rusqlite::params![
            draft.amount,
            draft.currency,
            draft.merchant,
            draft.category,
            draft.kind.as_str(),
            draft.occurred_at,
            draft.dedup_hash,
            draft.cashback_percent,
            draft.cashback_amount,
            draft.subscription_id,
            draft.bank,
            draft.last_four,
            draft.raw_text,
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, msg)) if e.code == ErrorCode::ConstraintViolation => {
            return match ledger_id_for_hash(tx, &draft.dedup_hash)? {
                Some(existing_id) => Ok(ProcessResult::Duplicate {
                    existing_id,
                    reason: "concurrent save with the same hash".to_string(),
                }),
                None => Err(rusqlite::Error::SqliteFailure(e, msg).into()),
            };
        }
        Err(e) => return Err(e.into()),
    }
    let transaction_id = tx.last_insert_rowid();

    // 8. Balance write-back, only for pending-origin saves and only from the
    // balance the notification itself reported.
    if let Some(origin) = pending_origin {
        if let (Some(balance), Some(last_four)) = (origin.balance_after, draft.last_four.as_deref())
        {
            debug!(
                pending_id = origin.pending_id,
                balance, "balance write-back from pending entry"
            );
            tx.execute(
                "INSERT INTO accounts (bank, last_four, balance, balance_updated_at, balance_source) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(bank, last_four) DO UPDATE SET \
                     balance = excluded.balance, \
                     balance_updated_at = excluded.balance_updated_at, \
                     balance_source = excluded.balance_source",
                rusqlite::params![
                    draft.bank,
                    last_four,
                    balance,
                    origin.captured_at,
                    origin.source.as_str()
                ],
            )?;
        }
    }

    // 9. Audit which transforms fired, now that the row id exists.
    for rule_id in fired {
        rules::record_hit(tx, rule_id, Some(transaction_id), "transformed")?;
    }

    Ok(ProcessResult::Saved {
        transaction_id,
        cashback_amount: draft.cashback_amount,
        subscription_id: draft.subscription_id,
    })
}

/// Ledger entries are never re-processed; after the fact they can only be
/// soft-deleted (or cashback-amended by the retroactive flow).
pub fn soft_delete(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE transactions SET is_deleted = 1, updated_at = datetime('now') \
         WHERE id = ?1 AND is_deleted = 0",
        [id],
    )?;
    Ok(changed == 1)
}

fn ledger_id_for_hash(conn: &Connection, hash: &str) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM transactions WHERE dedup_hash = ?1 AND is_deleted = 0",
            [hash],
            |row| row.get(0),
        )
        .optional()?)
}

fn pending_id_for_hash(conn: &Connection, hash: &str) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM pending_transactions WHERE dedup_hash = ?1 AND status = 'pending'",
            [hash],
            |row| row.get(0),
        )
        .optional()?)
}
