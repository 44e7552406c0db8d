use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension};
use tracing::{info, warn};

use crate::error::{PassbookError, Result};
use crate::feed::{ChangeFeed, LedgerEvent};
use crate::models::{ParsedTransaction, PendingStatus, PendingTransaction, TransactionRecord, TxnKind};
use crate::processor::{self, PendingOrigin, ProcessConfig, ProcessResult, SaveOrigin};

const TIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_ts(t: DateTime<Utc>) -> String {
    t.format(TIME_FMT).to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueueOutcome {
    Queued { pending_id: i64, expires_at: String },
    Duplicate { existing_id: i64 },
}

#[derive(Debug, Clone, Default)]
pub struct ConfirmEdits {
    pub merchant: Option<String>,
    pub category: Option<String>,
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    Confirmed(ProcessResult),
    /// A concurrent actor already moved the entry to a terminal state.
    /// Not an error: logged and reported as a no-op.
    Stale { current: PendingStatus },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RejectOutcome {
    Rejected,
    Stale { current: PendingStatus },
}

#[derive(Debug, Default, PartialEq)]
pub struct SweepSummary {
    pub saved: usize,
    pub blocked: usize,
    pub duplicates: usize,
    pub stale: usize,
}

/// Queue a parsed transaction for user confirmation. The entry expires
/// `ttl_hours` after `now` and is then auto-saved by the sweep.
pub fn queue(
    conn: &Connection,
    parsed: &ParsedTransaction,
    ttl_hours: i64,
    now: DateTime<Utc>,
    feed: &ChangeFeed,
) -> Result<QueueOutcome> {
    let hash = parsed.dedup_hash();

    if let Some(existing_id) = ledger_id_for_hash(conn, &hash)? {
        return Ok(QueueOutcome::Duplicate { existing_id });
    }

    let created_at = format_ts(now);
    let expires_at = format_ts(now + Duration::hours(ttl_hours));
    let inserted = conn.execute(
        "INSERT INTO pending_transactions \
         (amount, currency, merchant, kind, occurred_at, dedup_hash, bank, last_four, raw_text, balance_after, created_at, expires_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        rusqlite::params![
            parsed.amount,
            parsed.currency,
            parsed.merchant.trim(),
            parsed.kind.as_str(),
            parsed.occurred_at,
            hash,
            parsed.bank,
            parsed.last_four,
            parsed.raw_text,
            parsed.balance_after,
            created_at,
            expires_at,
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, msg))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            return match pending_id_for_hash(conn, &hash)? {
                Some(existing_id) => Ok(QueueOutcome::Duplicate { existing_id }),
                None => Err(rusqlite::Error::SqliteFailure(e, msg).into()),
            };
        }
        Err(e) => return Err(e.into()),
    }

    let pending_id = conn.last_insert_rowid();
    feed.publish(&LedgerEvent::PendingQueued {
        pending_id,
        merchant: parsed.merchant.trim().to_string(),
        expires_at: expires_at.clone(),
    });
    Ok(QueueOutcome::Queued { pending_id, expires_at })
}

/// User-confirmed save. The `pending -> confirmed` transition is a
/// conditional update on the current status; losing the race to a sweep
/// (or a second confirm) is a stale no-op, never a second ledger entry.
/// Transition and pipeline commit as one unit.
pub fn confirm(
    conn: &mut Connection,
    pending_id: i64,
    edits: &ConfirmEdits,
    custom_cashback_percent: Option<f64>,
    feed: &ChangeFeed,
) -> Result<ConfirmOutcome> {
    if let Some(percent) = custom_cashback_percent {
        if percent <= 0.0 {
            return Err(PassbookError::InvalidPercent(percent));
        }
    }

    let tx = conn.transaction()?;
    let row = fetch_pending(&tx, pending_id)?
        .ok_or(PassbookError::UnknownPending(pending_id))?;

    let changed = tx.execute(
        "UPDATE pending_transactions SET status = 'confirmed' WHERE id = ?1 AND status = 'pending'",
        [pending_id],
    )?;
    if changed == 0 {
        let current = current_status(&tx, pending_id)?;
        warn!(pending_id, status = current.as_str(), "confirm on settled pending entry ignored");
        return Ok(ConfirmOutcome::Stale { current });
    }

    let mut draft = draft_from_pending(&row);
    if let Some(merchant) = &edits.merchant {
        draft.merchant = merchant.clone();
    }
    let preserve_user_category = edits.category.is_some();
    if let Some(category) = &edits.category {
        draft.category = Some(category.clone());
    }
    if let Some(amount) = edits.amount {
        draft.amount = amount;
    }

    let origin = PendingOrigin {
        pending_id,
        balance_after: row.balance_after,
        captured_at: row.created_at.clone(),
        source: SaveOrigin::Confirm,
    };
    let config = ProcessConfig {
        skip_duplicate_check: true,
        preserve_user_category,
        custom_cashback_percent,
    };
    let source_text = row.raw_text.clone().unwrap_or_default();
    let result = processor::run_pipeline(&tx, draft, &source_text, Some(&origin), &config)?;
    tx.commit()?;

    feed.publish(&LedgerEvent::PendingResolved {
        pending_id,
        status: PendingStatus::Confirmed,
    });
    publish_result(feed, &result, &row.merchant, row.amount);
    Ok(ConfirmOutcome::Confirmed(result))
}

/// Reject a queued entry. No ledger row is ever created for it.
pub fn reject(conn: &Connection, pending_id: i64, feed: &ChangeFeed) -> Result<RejectOutcome> {
    fetch_pending(conn, pending_id)?.ok_or(PassbookError::UnknownPending(pending_id))?;

    let changed = conn.execute(
        "UPDATE pending_transactions SET status = 'rejected' WHERE id = ?1 AND status = 'pending'",
        [pending_id],
    )?;
    if changed == 0 {
        let current = current_status(conn, pending_id)?;
        warn!(pending_id, status = current.as_str(), "reject on settled pending entry ignored");
        return Ok(RejectOutcome::Stale { current });
    }
    feed.publish(&LedgerEvent::PendingResolved {
        pending_id,
        status: PendingStatus::Rejected,
    });
    Ok(RejectOutcome::Rejected)
}

/// Route every expired entry through the processor and settle it as
/// auto-saved. One transaction per entry, each guarded by the same status
/// CAS as confirm, so the sweep can race user actions safely.
pub fn sweep_expired(
    conn: &mut Connection,
    now: DateTime<Utc>,
    feed: &ChangeFeed,
) -> Result<SweepSummary> {
    let cutoff = format_ts(now);
    let expired: Vec<i64> = {
        let mut stmt = conn.prepare(
            "SELECT id FROM pending_transactions WHERE status = 'pending' AND expires_at <= ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([&cutoff], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    };

    let mut summary = SweepSummary::default();
    for pending_id in expired {
        let tx = conn.transaction()?;
        let Some(row) = fetch_pending(&tx, pending_id)? else {
            continue;
        };
        let changed = tx.execute(
            "UPDATE pending_transactions SET status = 'auto_saved' WHERE id = ?1 AND status = 'pending'",
            [pending_id],
        )?;
        if changed == 0 {
            summary.stale += 1;
            info!(pending_id, "pending entry settled elsewhere during sweep");
            continue;
        }

        let draft = draft_from_pending(&row);
        let origin = PendingOrigin {
            pending_id,
            balance_after: row.balance_after,
            captured_at: row.created_at.clone(),
            source: SaveOrigin::AutoSave,
        };
        // Auto-save never carries a custom rate; default account cashback only.
        let config = ProcessConfig {
            skip_duplicate_check: true,
            ..Default::default()
        };
        let source_text = row.raw_text.clone().unwrap_or_default();
        let result = processor::run_pipeline(&tx, draft, &source_text, Some(&origin), &config)?;
        tx.commit()?;

        feed.publish(&LedgerEvent::PendingResolved {
            pending_id,
            status: PendingStatus::AutoSaved,
        });
        publish_result(feed, &result, &row.merchant, row.amount);
        match result {
            ProcessResult::Saved { .. } => summary.saved += 1,
            ProcessResult::Blocked { .. } => summary.blocked += 1,
            ProcessResult::Duplicate { .. } => summary.duplicates += 1,
        }
    }
    Ok(summary)
}

pub fn list(conn: &Connection) -> Result<Vec<PendingTransaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, amount, currency, merchant, category, kind, occurred_at, dedup_hash, \
                bank, last_four, raw_text, balance_after, status, created_at, expires_at \
         FROM pending_transactions ORDER BY id DESC",
    )?;
    let rows = stmt
        .query_map([], map_pending_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn publish_result(feed: &ChangeFeed, result: &ProcessResult, merchant: &str, amount: f64) {
    match result {
        ProcessResult::Saved { transaction_id, .. } => feed.publish(&LedgerEvent::RecordSaved {
            transaction_id: *transaction_id,
            merchant: merchant.to_string(),
            amount,
        }),
        ProcessResult::Blocked { rule_name, .. } => feed.publish(&LedgerEvent::RecordBlocked {
            rule_name: rule_name.clone(),
            merchant: merchant.to_string(),
        }),
        ProcessResult::Duplicate { .. } => {}
    }
}

fn draft_from_pending(row: &PendingTransaction) -> TransactionRecord {
    TransactionRecord {
        id: None,
        amount: row.amount,
        currency: row.currency.clone(),
        merchant: row.merchant.clone(),
        category: row.category.clone(),
        kind: row.kind,
        occurred_at: row.occurred_at.clone(),
        dedup_hash: row.dedup_hash.clone(),
        cashback_percent: None,
        cashback_amount: None,
        subscription_id: None,
        bank: row.bank.clone(),
        last_four: row.last_four.clone(),
        raw_text: row.raw_text.clone(),
        is_deleted: false,
    }
}

fn map_pending_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PendingTransaction> {
    let kind_s: String = row.get(5)?;
    let kind = TxnKind::parse(&kind_s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            format!("unknown transaction kind '{kind_s}'").into(),
        )
    })?;
    let status_s: String = row.get(12)?;
    let status = PendingStatus::parse(&status_s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            12,
            rusqlite::types::Type::Text,
            format!("unknown pending status '{status_s}'").into(),
        )
    })?;
    Ok(PendingTransaction {
        id: row.get(0)?,
        amount: row.get(1)?,
        currency: row.get(2)?,
        merchant: row.get(3)?,
        category: row.get(4)?,
        kind,
        occurred_at: row.get(6)?,
        dedup_hash: row.get(7)?,
        bank: row.get(8)?,
        last_four: row.get(9)?,
        raw_text: row.get(10)?,
        balance_after: row.get(11)?,
        status,
        created_at: row.get(13)?,
        expires_at: row.get(14)?,
    })
}

fn fetch_pending(conn: &Connection, id: i64) -> Result<Option<PendingTransaction>> {
    Ok(conn
        .query_row(
            "SELECT id, amount, currency, merchant, category, kind, occurred_at, dedup_hash, \
                    bank, last_four, raw_text, balance_after, status, created_at, expires_at \
             FROM pending_transactions WHERE id = ?1",
            [id],
            map_pending_row,
        )
        .optional()?)
}

fn current_status(conn: &Connection, id: i64) -> Result<PendingStatus> {
    let status_s: String = conn.query_row(
        "SELECT status FROM pending_transactions WHERE id = ?1",
        [id],
        |row| row.get(0),
    )?;
    PendingStatus::parse(&status_s)
        .ok_or_else(|| PassbookError::Other(format!("unknown pending status '{status_s}'")))
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
            "SELECT id FROM pending_transactions WHERE dedup_hash = ?1",
            [hash],
            |row| row.get(0),
        )
        .optional()?)
}
