use rusqlite::Connection;

use crate::error::Result;

/// Find a category for a merchant via the mapping table. First matching
/// pattern wins; patterns are case-insensitive substrings.
pub fn lookup_category(conn: &Connection, merchant: &str) -> Result<Option<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT pattern, category FROM merchant_categories ORDER BY id",
    )?;
    let mappings: Vec<(String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let merchant_upper = merchant.to_uppercase();
    for (pattern, category) in mappings {
        if merchant_upper.contains(&pattern.to_uppercase()) {
            return Ok(Some(category));
        }
    }
    Ok(None)
}

pub fn add_mapping(conn: &Connection, pattern: &str, category: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO merchant_categories (pattern, category) VALUES (?1, ?2)",
        rusqlite::params![pattern, category],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_mappings(conn: &Connection) -> Result<Vec<(i64, String, String)>> {
    let mut stmt = conn.prepare("SELECT id, pattern, category FROM merchant_categories ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
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

    #[test]
    fn test_lookup_seeded_merchant() {
        let (_dir, conn) = test_db();
        let category = lookup_category(&conn, "AMAZON PAY INDIA").unwrap();
        assert_eq!(category.as_deref(), Some("Shopping"));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let (_dir, conn) = test_db();
        let category = lookup_category(&conn, "swiggy instamart").unwrap();
        assert_eq!(category.as_deref(), Some("Food & Dining"));
    }

    #[test]
    fn test_lookup_unknown_merchant() {
        let (_dir, conn) = test_db();
        let category = lookup_category(&conn, "CORNER TEA STALL").unwrap();
        assert!(category.is_none());
    }

    #[test]
    fn test_user_mapping_applies() {
        let (_dir, conn) = test_db();
        add_mapping(&conn, "TEA STALL", "Food & Dining").unwrap();
        let category = lookup_category(&conn, "CORNER TEA STALL").unwrap();
        assert_eq!(category.as_deref(), Some("Food & Dining"));
    }

    #[test]
    fn test_list_mappings_includes_added() {
        let (_dir, conn) = test_db();
        let before = list_mappings(&conn).unwrap().len();
        add_mapping(&conn, "GYM", "Health").unwrap();
        let after = list_mappings(&conn).unwrap();
        assert_eq!(after.len(), before + 1);
        assert!(after.iter().any(|(_, p, c)| p == "GYM" && c == "Health"));
    }
}
