use super::Literal;

/// A rendered statement with positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Literal>,
}

/// Dialect-specific pieces of SQL rendering
pub trait SqlDialect {
    fn quote_identifier(&self, ident: &str) -> String;

    /// Placeholder for the 1-based parameter `index`
    fn placeholder(&self, index: usize) -> String;

    fn limit_clause(&self, limit: Option<u64>, offset: Option<u64>) -> Option<String> {
        match (limit, offset) {
            (None, None) => None,
            (Some(limit), None) => Some(format!("LIMIT {}", limit)),
            (limit, Some(offset)) => Some(format!(
                "LIMIT {} OFFSET {}",
                limit.map(|l| l.to_string()).unwrap_or_else(|| self.unbounded_limit()),
                offset
            )),
        }
    }

    /// LIMIT value meaning "no limit", needed when only an offset is given
    fn unbounded_limit(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("?{}", index)
    }

    fn unbounded_limit(&self) -> String {
        "-1".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoting_escapes_quote_characters() {
        assert_eq!(SqliteDialect.quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(SqliteDialect.quote_identifier("tt_content"), "\"tt_content\"");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(SqliteDialect.placeholder(3), "?3");
    }

    #[test]
    fn test_offset_without_limit() {
        assert_eq!(
            SqliteDialect.limit_clause(None, Some(2)).unwrap(),
            "LIMIT -1 OFFSET 2"
        );
        assert_eq!(SqliteDialect.limit_clause(None, None), None);
    }
}
