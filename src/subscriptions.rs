use rusqlite::Connection;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: i64,
    pub name: String,
    pub merchant_pattern: String,
    pub expected_amount: f64,
    pub tolerance_percent: f64,
    pub category: Option<String>,
}

impl Subscription {
    /// Merchant must contain the pattern (case-insensitive), the amount must
    /// fall within the tolerance window around the expected amount, and when
    /// the subscription declares a category the transaction's must equal it.
    pub fn matches(&self, merchant: &str, amount: f64, category: Option<&str>) -> bool {
        let merchant_ok = merchant
            .to_uppercase()
            .contains(&self.merchant_pattern.trim().to_uppercase());
        if !merchant_ok {
            return false;
        }
        let window = self.expected_amount.abs() * self.tolerance_percent / 100.0;
        if (amount - self.expected_amount).abs() > window {
            return false;
        }
        match (&self.category, category) {
            (Some(want), Some(have)) => want.eq_ignore_ascii_case(have),
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}

pub fn load_active(conn: &Connection) -> Result<Vec<Subscription>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, name, merchant_pattern, expected_amount, tolerance_percent, category \
         FROM subscriptions WHERE is_active = 1 ORDER BY id",
    )?;
    let subs = stmt
        .query_map([], |row| {
            Ok(Subscription {
                id: row.get(0)?,
                name: row.get(1)?,
                merchant_pattern: row.get(2)?,
                expected_amount: row.get(3)?,
                tolerance_percent: row.get(4)?,
                category: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(subs)
}

/// First active subscription matching the transaction, in id order.
pub fn find_match<'a>(
    subs: &'a [Subscription],
    merchant: &str,
    amount: f64,
    category: Option<&str>,
) -> Option<&'a Subscription> {
    subs.iter().find(|s| s.matches(merchant, amount, category))
}

pub fn add_subscription(
    conn: &Connection,
    name: &str,
    merchant_pattern: &str,
    expected_amount: f64,
    tolerance_percent: f64,
    category: Option<&str>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO subscriptions (name, merchant_pattern, expected_amount, tolerance_percent, category) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![name, merchant_pattern, expected_amount, tolerance_percent, category],
    )?;
    Ok(conn.last_insert_rowid())
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

    fn netflix() -> Subscription {
        Subscription {
            id: 1,
            name: "Netflix".to_string(),
            merchant_pattern: "NETFLIX".to_string(),
            expected_amount: 649.0,
            tolerance_percent: 10.0,
            category: Some("Entertainment".to_string()),
        }
    }

    #[test]
    fn test_exact_amount_matches() {
        assert!(netflix().matches("NETFLIX.COM", 649.0, Some("Entertainment")));
    }

    #[test]
    fn test_amount_within_tolerance() {
        // 10% of 649 is 64.9
        assert!(netflix().matches("NETFLIX.COM", 699.0, Some("Entertainment")));
        assert!(netflix().matches("NETFLIX.COM", 599.0, Some("Entertainment")));
    }

    #[test]
    fn test_amount_outside_tolerance() {
        assert!(!netflix().matches("NETFLIX.COM", 999.0, Some("Entertainment")));
    }

    #[test]
    fn test_merchant_mismatch() {
        assert!(!netflix().matches("PRIME VIDEO", 649.0, Some("Entertainment")));
    }

    #[test]
    fn test_category_must_match_when_declared() {
        assert!(!netflix().matches("NETFLIX.COM", 649.0, Some("Shopping")));
        assert!(!netflix().matches("NETFLIX.COM", 649.0, None));
    }

    #[test]
    fn test_no_declared_category_matches_any() {
        let mut sub = netflix();
        sub.category = None;
        assert!(sub.matches("NETFLIX.COM", 649.0, None));
        assert!(sub.matches("NETFLIX.COM", 649.0, Some("Shopping")));
    }

    #[test]
    fn test_find_match_picks_first() {
        let mut other = netflix();
        other.id = 2;
        other.name = "Netflix Premium".to_string();
        let subs = vec![netflix(), other];
        let hit = find_match(&subs, "NETFLIX.COM", 649.0, Some("Entertainment")).unwrap();
        assert_eq!(hit.id, 1);
    }

    #[test]
    fn test_load_active_skips_inactive() {
        let (_dir, conn) = test_db();
        add_subscription(&conn, "Spotify", "SPOTIFY", 119.0, 10.0, None).unwrap();
        let id = add_subscription(&conn, "Gym", "CULT", 999.0, 5.0, Some("Health")).unwrap();
        conn.execute("UPDATE subscriptions SET is_active = 0 WHERE id = ?1", [id]).unwrap();
        let subs = load_active(&conn).unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].name, "Spotify");
    }
}
