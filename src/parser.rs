//! Best-effort SQL analysis for span naming and table attribution.
//!
//! This is not a SQL parser. Table names are pulled out with a fixed set of
//! patterns, first match wins, and anything the patterns miss simply goes
//! unattributed -- malformed SQL never produces an error here.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::client::{CallParams, ClientOperation};

// Regex patterns for table extraction (compiled once).
// Identifiers may be dotted and wrapped in backticks or double quotes;
// delimiters are stripped from the capture.
static FROM_TABLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bFROM\s+[`"]?([\w.]+)[`"]?"#).unwrap());

static INSERT_TABLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bINSERT\s+INTO\s+[`"]?([\w.]+)[`"]?"#).unwrap());

static UPDATE_TABLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bUPDATE\s+[`"]?([\w.]+)[`"]?"#).unwrap());

static DELETE_TABLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\bDELETE\s+FROM\s+[`"]?([\w.]+)[`"]?"#).unwrap());

/// Collapse whitespace runs to single spaces and trim the ends.
///
/// Produces stable, compact query text for span attributes.
pub fn normalize_query(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve the table a call targets.
///
/// Insert calls carry the table explicitly; that field is authoritative and
/// never falls back to parsing. Every other operation is matched against its
/// raw query text.
pub fn resolve_table(operation: ClientOperation, params: &CallParams) -> Option<String> {
    if operation == ClientOperation::Insert {
        return params
            .table
            .as_deref()
            .map(str::trim)
            .filter(|table| !table.is_empty())
            .map(str::to_string);
    }

    params.query.as_deref().and_then(extract_table)
}

/// Extract a table name from raw SQL text.
///
/// Priority order: `FROM`, `INSERT INTO`, then `UPDATE` / `DELETE FROM` when
/// the statement starts with the matching keyword. Subqueries, CTEs and
/// multi-table joins resolve to whichever candidate appears first.
pub fn extract_table(sql: &str) -> Option<String> {
    if let Some(caps) = FROM_TABLE_REGEX.captures(sql) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    if let Some(caps) = INSERT_TABLE_REGEX.captures(sql) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }

    let head: String = sql
        .trim_start()
        .chars()
        .take(6)
        .collect::<String>()
        .to_uppercase();

    if head.starts_with("UPDATE") {
        if let Some(caps) = UPDATE_TABLE_REGEX.captures(sql) {
            return caps.get(1).map(|m| m.as_str().to_string());
        }
    }
    if head.starts_with("DELETE") {
        if let Some(caps) = DELETE_TABLE_REGEX.captures(sql) {
            return caps.get(1).map(|m| m.as_str().to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(
            normalize_query("  SELECT\t *\n  FROM users\r\n WHERE id = 1 "),
            "SELECT * FROM users WHERE id = 1"
        );
        assert_eq!(normalize_query(""), "");
        assert_eq!(normalize_query("   \n\t "), "");
    }

    #[test]
    fn test_extract_from_clause() {
        assert_eq!(
            extract_table("SELECT * FROM users WHERE id = 1"),
            Some("users".to_string())
        );
        assert_eq!(
            extract_table("SELECT a FROM `orders` WHERE id=1"),
            Some("orders".to_string())
        );
        assert_eq!(
            extract_table(r#"SELECT * FROM "Events" LIMIT 5"#),
            Some("Events".to_string())
        );
        assert_eq!(
            extract_table("select count() from system.numbers"),
            Some("system.numbers".to_string())
        );
    }

    #[test]
    fn test_extract_insert_into() {
        assert_eq!(
            extract_table("INSERT INTO grades (id, score) VALUES (1, 2)"),
            Some("grades".to_string())
        );
        // FROM has priority when both appear.
        assert_eq!(
            extract_table("INSERT INTO target SELECT * FROM source"),
            Some("source".to_string())
        );
    }

    #[test]
    fn test_extract_update_requires_leading_keyword() {
        assert_eq!(
            extract_table("UPDATE students SET name = 'x' WHERE id = 1"),
            Some("students".to_string())
        );
        // Statement does not start with UPDATE, so the UPDATE pattern is
        // never consulted.
        assert_eq!(extract_table("EXPLAIN UPDATE students SET name = 'x'"), None);
    }

    #[test]
    fn test_extract_delete_requires_leading_keyword() {
        assert_eq!(
            extract_table("DELETE FROM assignments WHERE id = 1"),
            Some("assignments".to_string())
        );
        assert_eq!(extract_table("  delete from logs where ts < now()"), Some("logs".to_string()));
    }

    #[test]
    fn test_extract_no_match() {
        assert_eq!(extract_table("OPTIMIZE TABLE x"), None);
        assert_eq!(extract_table("SHOW TABLES"), None);
        assert_eq!(extract_table(""), None);
        // Malformed SQL returns no match rather than an error.
        assert_eq!(extract_table("SELECT FROM"), None);
    }

    #[test]
    fn test_resolve_insert_uses_explicit_table() {
        let params = CallParams::insert("  events  ");
        assert_eq!(
            resolve_table(ClientOperation::Insert, &params),
            Some("events".to_string())
        );

        // The explicit field is authoritative: insert never parses SQL.
        let params = CallParams {
            query: Some("INSERT INTO parsed VALUES (1)".to_string()),
            ..CallParams::default()
        };
        assert_eq!(resolve_table(ClientOperation::Insert, &params), None);

        let params = CallParams::insert("   ");
        assert_eq!(resolve_table(ClientOperation::Insert, &params), None);
    }

    #[test]
    fn test_resolve_other_operations_parse_query() {
        let params = CallParams::query("SELECT a FROM `orders` WHERE id=1");
        assert_eq!(
            resolve_table(ClientOperation::Query, &params),
            Some("orders".to_string())
        );

        let params = CallParams::query("OPTIMIZE TABLE x");
        assert_eq!(resolve_table(ClientOperation::Command, &params), None);

        let params = CallParams::default();
        assert_eq!(resolve_table(ClientOperation::Exec, &params), None);
    }
}
