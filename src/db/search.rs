//! Prefix full-text search over the exercise catalog.
//!
//! Queries go through the `exercise_names_fts` FTS5 table, which triggers keep
//! in lockstep with `exercise_names`. Input is split on whitespace and on
//! characters that carry meaning in the FTS5 query syntax, and every remaining
//! token becomes a quoted prefix term. All terms must match.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteExecutor;

/// Characters treated as word separators before input reaches the FTS5 parser.
pub const DEFAULT_STRIP_CHARS: &str = "\"*^():{}[]+-'.,;!?`";

/// Tunables for catalog searches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Characters that split query words
    pub strip_chars: String,
    /// Maximum number of names returned; `None` returns every match
    pub limit: Option<u32>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            strip_chars: DEFAULT_STRIP_CHARS.to_string(),
            limit: Some(50),
        }
    }
}

/// Splits `text` into search tokens. Stripped characters separate words the
/// same way the index tokenizer does, so `t-bar` yields `t` and `bar`.
pub fn tokenize(text: &str, strip_chars: &str) -> Vec<String> {
    let spaced: String = text
        .chars()
        .map(|c| if strip_chars.contains(c) { ' ' } else { c })
        .collect();
    spaced
        .split_whitespace()
        // The FTS tokenizer would discard a token with no word characters,
        // leaving an empty phrase behind.
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .map(str::to_string)
        .collect()
}

/// Builds an FTS5 MATCH expression requiring every token as a prefix term.
pub fn match_expression(tokens: &[String]) -> Option<String> {
    if tokens.is_empty() {
        return None;
    }
    let terms: Vec<String> = tokens
        .iter()
        .map(|token| format!("\"{}\"*", token.replace('"', "\"\"")))
        .collect();
    Some(terms.join(" "))
}

/// Runs a search against live (non-tombstoned) rows, best match first.
pub(crate) async fn query<'e, E>(
    executor: E,
    text: &str,
    options: &SearchOptions,
) -> Result<Vec<String>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let tokens = tokenize(text, &options.strip_chars);
    let Some(expression) = match_expression(&tokens) else {
        return Ok(Vec::new());
    };

    let limit = options.limit.map(i64::from).unwrap_or(-1);

    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT e.name
        FROM exercise_names_fts
        JOIN exercise_names e ON e.id = exercise_names_fts.rowid
        WHERE exercise_names_fts MATCH ? AND e.is_deleted = 0
        ORDER BY bm25(exercise_names_fts), e.name
        LIMIT ?
        "#,
    )
    .bind(&expression)
    .bind(limit)
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(|(name,)| name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_splits_on_whitespace() {
        assert_eq!(
            tokenize("  ben   pr ", DEFAULT_STRIP_CHARS),
            vec!["ben", "pr"]
        );
    }

    #[test]
    fn test_tokenize_splits_on_special_characters() {
        assert_eq!(
            tokenize("\"bench\" (press)* -dumbbell", DEFAULT_STRIP_CHARS),
            vec!["bench", "press", "dumbbell"]
        );
        assert_eq!(tokenize("t-bar", DEFAULT_STRIP_CHARS), vec!["t", "bar"]);
        assert_eq!(
            tokenize("farmer's walk", DEFAULT_STRIP_CHARS),
            vec!["farmer", "s", "walk"]
        );
    }

    #[test]
    fn test_tokenize_discards_empty_tokens() {
        assert!(tokenize("", DEFAULT_STRIP_CHARS).is_empty());
        assert!(tokenize("   ", DEFAULT_STRIP_CHARS).is_empty());
        assert!(tokenize("** () \"\"", DEFAULT_STRIP_CHARS).is_empty());
        assert!(tokenize("/ &", DEFAULT_STRIP_CHARS).is_empty());
    }

    #[test]
    fn test_tokenize_respects_configured_class() {
        assert_eq!(tokenize("t-bar", ""), vec!["t-bar"]);
        assert_eq!(tokenize("squat!", "!"), vec!["squat"]);
        assert_eq!(tokenize("a!b", "!"), vec!["a", "b"]);
    }

    #[test]
    fn test_match_expression() {
        assert_eq!(match_expression(&[]), None);
        assert_eq!(
            match_expression(&["ben".to_string(), "pr".to_string()]),
            Some("\"ben\"* \"pr\"*".to_string())
        );
    }

    #[test]
    fn test_match_expression_escapes_quotes() {
        assert_eq!(
            match_expression(&["a\"b".to_string()]),
            Some("\"a\"\"b\"*".to_string())
        );
    }
}
