use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    bank TEXT NOT NULL,
    last_four TEXT NOT NULL,
    balance REAL,
    credit_limit REAL,
    cashback_percent REAL,
    is_credit_card INTEGER DEFAULT 0,
    balance_updated_at TEXT,
    balance_source TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    UNIQUE (bank, last_four)
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    amount REAL NOT NULL,
    currency TEXT NOT NULL DEFAULT 'INR',
    merchant TEXT NOT NULL,
    category TEXT,
    kind TEXT NOT NULL,
    occurred_at TEXT NOT NULL,
    dedup_hash TEXT NOT NULL,
    cashback_percent REAL,
    cashback_amount REAL,
    subscription_id INTEGER,
    bank TEXT NOT NULL,
    last_four TEXT,
    raw_text TEXT,
    is_deleted INTEGER DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (subscription_id) REFERENCES subscriptions(id)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_dedup
    ON transactions(dedup_hash) WHERE is_deleted = 0;

CREATE TABLE IF NOT EXISTS pending_transactions (
    id INTEGER PRIMARY KEY,
    amount REAL NOT NULL,
    currency TEXT NOT NULL DEFAULT 'INR',
    merchant TEXT NOT NULL,
    category TEXT,
    kind TEXT NOT NULL,
    occurred_at TEXT NOT NULL,
    dedup_hash TEXT NOT NULL UNIQUE,
    bank TEXT NOT NULL,
    last_four TEXT,
    raw_text TEXT,
    balance_after REAL,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rules (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    priority INTEGER DEFAULT 0,
    match_type TEXT NOT NULL,
    pattern TEXT,
    amount_low REAL,
    amount_high REAL,
    action TEXT NOT NULL,
    action_value TEXT,
    hit_count INTEGER DEFAULT 0,
    is_active INTEGER DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS rule_hits (
    id INTEGER PRIMARY KEY,
    rule_id INTEGER NOT NULL,
    transaction_id INTEGER,
    outcome TEXT NOT NULL,
    fired_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (rule_id) REFERENCES rules(id),
    FOREIGN KEY (transaction_id) REFERENCES transactions(id)
);

CREATE TABLE IF NOT EXISTS subscriptions (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    merchant_pattern TEXT NOT NULL,
    expected_amount REAL NOT NULL,
    tolerance_percent REAL DEFAULT 10.0,
    category TEXT,
    is_active INTEGER DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS merchant_categories (
    id INTEGER PRIMARY KEY,
    pattern TEXT NOT NULL,
    category TEXT NOT NULL
);
";

// (pattern, category)
const DEFAULT_MERCHANT_CATEGORIES: &[(&str, &str)] = &[
    ("AMAZON", "Shopping"),
    ("FLIPKART", "Shopping"),
    ("MYNTRA", "Shopping"),
    ("SWIGGY", "Food & Dining"),
    ("ZOMATO", "Food & Dining"),
    ("DOMINO", "Food & Dining"),
    ("STARBUCKS", "Food & Dining"),
    ("BIGBASKET", "Groceries"),
    ("BLINKIT", "Groceries"),
    ("ZEPTO", "Groceries"),
    ("DMART", "Groceries"),
    ("UBER", "Transport"),
    ("OLA", "Transport"),
    ("RAPIDO", "Transport"),
    ("IRCTC", "Travel"),
    ("MAKEMYTRIP", "Travel"),
    ("INDIGO", "Travel"),
    ("NETFLIX", "Entertainment"),
    ("SPOTIFY", "Entertainment"),
    ("HOTSTAR", "Entertainment"),
    ("BOOKMYSHOW", "Entertainment"),
    ("JIO", "Utilities"),
    ("AIRTEL", "Utilities"),
    ("TATA POWER", "Utilities"),
    ("APOLLO", "Health"),
    ("PHARMEASY", "Health"),
    ("SALARY", "Salary"),
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: i64 = conn.query_row("SELECT count(*) FROM merchant_categories", [], |row| row.get(0))?;
    if count == 0 {
        for (pattern, category) in DEFAULT_MERCHANT_CATEGORIES {
            conn.execute(
                "INSERT INTO merchant_categories (pattern, category) VALUES (?1, ?2)",
                rusqlite::params![pattern, category],
            )?;
        }
    }
    Ok(())
}
