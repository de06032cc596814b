//! Read-only check for model-generated SQL
//!
//! The generation prompt asks for SELECT statements only, but nothing forces
//! the model to comply. Every generated statement goes through
//! [`check_read_only`] before it reaches the store, and the executor then asks
//! SQLite itself whether the prepared statement can write.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Keywords that may open a read-only statement
const ALLOWED_LEADING: &[&str] = &["SELECT", "WITH"];

fn forbidden_keywords() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(INSERT|UPDATE|DELETE|DROP|ALTER|CREATE|UPSERT|ATTACH|DETACH|PRAGMA|VACUUM|REINDEX|TRUNCATE|GRANT|REVOKE|EXEC|EXECUTE|MERGE)\b",
        )
        .expect("valid regex")
    })
}

/// Strip comments and blank out string literals and quoted identifiers
///
/// Keywords inside literals are data, not statements, so they must not trip the
/// keyword check. Quoted content is replaced by a single placeholder character.
fn mask_literals(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                // Doubled quote is an escaped quote inside the literal
                loop {
                    match chars.next() {
                        Some(q) if q == c => {
                            if chars.peek() == Some(&c) {
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        Some(_) => {}
                        None => break,
                    }
                }
                out.push('?');
            }
            '-' if chars.peek() == Some(&'-') => {
                for n in chars.by_ref() {
                    if n == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for n in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }

    out
}

/// Reject anything that is not a single SELECT/WITH statement
pub fn check_read_only(sql: &str) -> Result<()> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(Error::Rejected("empty statement".to_string()));
    }

    if trimmed.contains('`') {
        return Err(Error::Rejected(
            "backticks or code fences in statement".to_string(),
        ));
    }

    let code = mask_literals(trimmed);
    let code = code.trim().trim_end_matches(';').trim_end();

    if code.contains(';') {
        return Err(Error::Rejected("multiple statements".to_string()));
    }

    let leading = code
        .split(|c: char| c.is_whitespace() || c == '(')
        .find(|w| !w.is_empty())
        .unwrap_or_default()
        .to_uppercase();
    if !ALLOWED_LEADING.contains(&leading.as_str()) {
        return Err(Error::Rejected(format!(
            "only SELECT statements are allowed, got {}",
            if leading.is_empty() {
                "nothing"
            } else {
                leading.as_str()
            }
        )));
    }

    if let Some(m) = forbidden_keywords().find(code) {
        return Err(Error::Rejected(format!(
            "forbidden keyword {}",
            m.as_str().to_uppercase()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(sql: &str) -> bool {
        matches!(check_read_only(sql), Err(Error::Rejected(_)))
    }

    #[test]
    fn test_accepts_plain_selects() {
        assert!(check_read_only("SELECT COUNT(*) FROM accounts").is_ok());
        assert!(check_read_only("  select * from accounts limit 100;  ").is_ok());
        assert!(check_read_only(
            "WITH risky AS (SELECT * FROM accounts WHERE risk_score >= 60) SELECT COUNT(*) AS n FROM risky"
        )
        .is_ok());
    }

    #[test]
    fn test_keywords_inside_literals_are_data() {
        assert!(check_read_only(
            "SELECT * FROM fraud_alerts WHERE alert_message = 'please DELETE; then drop'"
        )
        .is_ok());
        assert!(check_read_only("SELECT 'it''s an update' AS note").is_ok());
        assert!(check_read_only("SELECT created_at, last_update_flag FROM accounts").is_ok());
    }

    #[test]
    fn test_rejects_writes_and_ddl() {
        assert!(rejected("DELETE FROM accounts"));
        assert!(rejected("UPDATE accounts SET account_status = 'ACTIVE'"));
        assert!(rejected("DROP TABLE accounts"));
        assert!(rejected("PRAGMA table_info(accounts)"));
        assert!(rejected(
            "WITH x AS (SELECT 1) INSERT INTO orders (customer_name, order_amount) SELECT 'a', 1 FROM x"
        ));
    }

    #[test]
    fn test_replace_function_is_allowed() {
        assert!(check_read_only(
            "SELECT REPLACE(full_name, ' ', '_') AS slug FROM customers LIMIT 100"
        )
        .is_ok());
        assert!(rejected("REPLACE INTO accounts (account_id) VALUES ('a')"));
        assert!(rejected(
            "WITH x AS (SELECT 1) INSERT OR REPLACE INTO orders (customer_name) SELECT 'a' FROM x"
        ));
    }

    #[test]
    fn test_rejects_multiple_statements() {
        assert!(rejected("SELECT 1; DELETE FROM accounts"));
        assert!(rejected("SELECT 1; SELECT 2"));
        assert!(rejected("SELECT 1 -- harmless\n; DROP TABLE accounts"));
    }

    #[test]
    fn test_rejects_empty_and_fenced() {
        assert!(rejected(""));
        assert!(rejected("   "));
        assert!(rejected("```sql\nSELECT 1\n```"));
    }

    #[test]
    fn test_comments_are_ignored() {
        assert!(check_read_only("/* delete me */ SELECT 1 AS one").is_ok());
        assert!(check_read_only("-- drop table\nSELECT 1 AS one").is_ok());
    }
}
