use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxnKind {
    Income,
    Expense,
    Transfer,
}

impl TxnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            "transfer" => Some(Self::Transfer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingStatus {
    Pending,
    Confirmed,
    Rejected,
    AutoSaved,
}

impl PendingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
            Self::AutoSaved => "auto_saved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "rejected" => Some(Self::Rejected),
            "auto_saved" => Some(Self::AutoSaved),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

fn default_currency() -> String {
    "INR".to_string()
}

/// Transaction data handed over by the notification parser, consumed once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedTransaction {
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub merchant: String,
    pub kind: TxnKind,
    /// YYYY-MM-DD HH:MM:SS, as stamped by the parser.
    pub occurred_at: String,
    pub bank: String,
    #[serde(default)]
    pub last_four: Option<String>,
    /// Account balance after this transaction, when the notification carried one.
    #[serde(default)]
    pub balance_after: Option<f64>,
    pub raw_text: String,
}

impl ParsedTransaction {
    /// Hash of the semantically distinguishing fields. Two notifications for
    /// the same underlying transaction always produce the same hash.
    pub fn dedup_hash(&self) -> String {
        let canonical = format!(
            "{:.2}|{}|{}|{}|{}|{}|{}",
            self.amount,
            self.currency.trim().to_uppercase(),
            self.merchant.trim().to_uppercase(),
            self.kind.as_str(),
            self.occurred_at.trim(),
            self.bank.trim().to_uppercase(),
            self.last_four.as_deref().unwrap_or("").trim(),
        );
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// A ledger entry as persisted in the `transactions` table. Built by the
/// processor (id None) and written exactly once.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub id: Option<i64>,
    pub amount: f64,
    pub currency: String,
    pub merchant: String,
    pub category: Option<String>,
    pub kind: TxnKind,
    pub occurred_at: String,
    pub dedup_hash: String,
    pub cashback_percent: Option<f64>,
    pub cashback_amount: Option<f64>,
    pub subscription_id: Option<i64>,
    pub bank: String,
    pub last_four: Option<String>,
    pub raw_text: Option<String>,
    pub is_deleted: bool,
}

impl TransactionRecord {
    pub fn from_parsed(parsed: &ParsedTransaction) -> Self {
        Self {
            id: None,
            amount: parsed.amount,
            currency: parsed.currency.clone(),
            merchant: parsed.merchant.trim().to_string(),
            category: None,
            kind: parsed.kind,
            occurred_at: parsed.occurred_at.clone(),
            dedup_hash: parsed.dedup_hash(),
            cashback_percent: None,
            cashback_amount: None,
            subscription_id: None,
            bank: parsed.bank.clone(),
            last_four: parsed.last_four.clone(),
            raw_text: Some(parsed.raw_text.clone()),
            is_deleted: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PendingTransaction {
    pub id: i64,
    pub amount: f64,
    pub currency: String,
    pub merchant: String,
    pub category: Option<String>,
    pub kind: TxnKind,
    pub occurred_at: String,
    pub dedup_hash: String,
    pub bank: String,
    pub last_four: Option<String>,
    pub raw_text: Option<String>,
    pub balance_after: Option<f64>,
    pub status: PendingStatus,
    pub created_at: String,
    pub expires_at: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct AccountSnapshot {
    pub id: i64,
    pub bank: String,
    pub last_four: String,
    pub balance: Option<f64>,
    pub credit_limit: Option<f64>,
    pub cashback_percent: Option<f64>,
    pub is_credit_card: bool,
    pub balance_updated_at: Option<String>,
    pub balance_source: Option<String>,
}

/// Round money to two decimals. All computed amounts pass through here
/// before being persisted or compared.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
pub(crate) fn sample_parsed() -> ParsedTransaction {
    ParsedTransaction {
        amount: 500.0,
        currency: "INR".to_string(),
        merchant: "Amazon".to_string(),
        kind: TxnKind::Expense,
        occurred_at: "2025-06-01 10:15:00".to_string(),
        bank: "HDFC".to_string(),
        last_four: Some("1234".to_string()),
        balance_after: Some(12_500.0),
        raw_text: "Rs.500 spent on HDFC card x1234 at Amazon".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_hash_is_stable() {
        let a = sample_parsed();
        let b = sample_parsed();
        assert_eq!(a.dedup_hash(), b.dedup_hash());
    }

    #[test]
    fn test_dedup_hash_ignores_merchant_case_and_whitespace() {
        let a = sample_parsed();
        let mut b = sample_parsed();
        b.merchant = "  AMAZON ".to_string();
        assert_eq!(a.dedup_hash(), b.dedup_hash());
    }

    #[test]
    fn test_dedup_hash_changes_with_amount() {
        let a = sample_parsed();
        let mut b = sample_parsed();
        b.amount = 500.01;
        assert_ne!(a.dedup_hash(), b.dedup_hash());
    }

    #[test]
    fn test_dedup_hash_changes_with_account() {
        let a = sample_parsed();
        let mut b = sample_parsed();
        b.last_four = Some("9999".to_string());
        assert_ne!(a.dedup_hash(), b.dedup_hash());
    }

    #[test]
    fn test_parsed_json_defaults() {
        let json = r#"{
            "amount": 249.0,
            "merchant": "Netflix",
            "kind": "expense",
            "occurred_at": "2025-06-02 08:00:00",
            "bank": "ICICI",
            "raw_text": "INR 249.00 debited for Netflix"
        }"#;
        let parsed: ParsedTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.currency, "INR");
        assert!(parsed.last_four.is_none());
        assert!(parsed.balance_after.is_none());
    }

    #[test]
    fn test_kind_roundtrip() {
        for kind in [TxnKind::Income, TxnKind::Expense, TxnKind::Transfer] {
            assert_eq!(TxnKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TxnKind::parse("refund"), None);
    }

    #[test]
    fn test_status_terminal() {
        assert!(!PendingStatus::Pending.is_terminal());
        assert!(PendingStatus::Confirmed.is_terminal());
        assert!(PendingStatus::Rejected.is_terminal());
        assert!(PendingStatus::AutoSaved.is_terminal());
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(10.006), 10.01);
        assert_eq!(round2(2.0 * 500.0 / 100.0), 10.0);
        assert_eq!(round2(33.333), 33.33);
    }
}
