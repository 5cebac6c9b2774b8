//! SQL Parser wrapper

use phoenix_common::{PhoenixError, Result};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};

/// SQL Parser wrapper
pub struct SqlParser;

impl SqlParser {
    /// Parse SQL into AST
    pub fn parse(sql: &str) -> Result<Vec<sqlparser::ast::Statement>> {
        let dialect = GenericDialect {};
        Parser::parse_sql(&dialect, sql).map_err(|e| PhoenixError::SqlParse(e.to_string()))
    }

    /// Parse exactly one SQL statement
    pub fn parse_statement(sql: &str) -> Result<sqlparser::ast::Statement> {
        let mut statements = Self::parse(sql)?;
        match statements.len() {
            0 => Err(PhoenixError::SqlParse("Empty SQL".to_string())),
            1 => Ok(statements.remove(0)),
            n => Err(PhoenixError::SqlParse(format!(
                "Expected a single statement, found {n}"
            ))),
        }
    }

    /// Whether `sql` holds at most one statement, ignoring a trailing `;`.
    ///
    /// Works on tokens only, so it also answers for text the parser rejects.
    /// Semicolons inside literals and comments do not count.
    pub fn is_single_statement(sql: &str) -> Result<bool> {
        let dialect = GenericDialect {};
        let tokens = Tokenizer::new(&dialect, sql)
            .tokenize()
            .map_err(|e| PhoenixError::SqlParse(e.to_string()))?;
        let mut terminated = false;
        for token in tokens {
            match token {
                Token::Whitespace(_) => {}
                Token::SemiColon => terminated = true,
                _ if terminated => return Ok(false),
                _ => {}
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single() {
        let stmt = SqlParser::parse_statement("CREATE SCHEMA IF NOT EXISTS iceberg.phoenix").unwrap();
        assert!(matches!(stmt, sqlparser::ast::Statement::CreateSchema { .. }));
    }

    #[test]
    fn test_parse_rejects_empty_and_multiple() {
        assert!(SqlParser::parse_statement("").is_err());
        assert!(SqlParser::parse_statement("SELECT 1; SELECT 2").is_err());
    }

    #[test]
    fn test_parse_error() {
        let err = SqlParser::parse_statement("CREATE TABEL x (id bigint)").unwrap_err();
        assert!(matches!(err, PhoenixError::SqlParse(_)));
    }

    #[test]
    fn test_single_statement_by_tokens() {
        assert!(SqlParser::is_single_statement("CREATE SCHEMA IF NOT EXISTS a.b;").unwrap());
        assert!(SqlParser::is_single_statement("CREATE TABLE t (c varchar) COMMENT 'x; y'").unwrap());
        assert!(SqlParser::is_single_statement("CREATE SCHEMA a.b; -- done").unwrap());
        assert!(!SqlParser::is_single_statement("CREATE SCHEMA IF NOT EXISTS a.b; DROP TABLE a.b.t").unwrap());
    }
}
