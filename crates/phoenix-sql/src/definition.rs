//! Typed schema and table definitions rendered to idempotent DDL

use phoenix_common::{PhoenixError, Result};

/// Dot-separated object name such as `iceberg.phoenix.event`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub parts: Vec<String>,
}

impl QualifiedName {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        let parts: Vec<String> = name.split('.').map(|p| p.trim().to_string()).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(PhoenixError::SqlParse(format!("invalid object name '{name}'")));
        }
        Ok(Self { parts })
    }

    /// Last component of the name
    pub fn object(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or_default()
    }

    /// Everything but the last component
    pub fn parent(&self) -> Option<QualifiedName> {
        if self.parts.len() < 2 {
            return None;
        }
        Some(QualifiedName {
            parts: self.parts[..self.parts.len() - 1].to_vec(),
        })
    }
}

impl std::fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.parts.join("."))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    /// Type as written in the DDL, lowercased (`varchar`, `bigint`, ...)
    pub data_type: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into().to_ascii_lowercase(),
        }
    }
}

/// A schema inside a catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDef {
    pub catalog: String,
    pub schema: String,
}

impl SchemaDef {
    pub fn new(catalog: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            catalog: catalog.into(),
            schema: schema.into(),
        }
    }

    pub fn qualified_name(&self) -> QualifiedName {
        QualifiedName::new([self.catalog.as_str(), self.schema.as_str()])
    }

    pub fn create_statement(&self) -> String {
        format!("CREATE SCHEMA IF NOT EXISTS {}", self.qualified_name())
    }

    pub fn table(&self, name: impl Into<String>, columns: Vec<ColumnDef>) -> TableDef {
        TableDef {
            schema: self.clone(),
            name: name.into(),
            columns,
        }
    }
}

/// A table inside a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub schema: SchemaDef,
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    pub fn qualified_name(&self) -> QualifiedName {
        QualifiedName::new([
            self.schema.catalog.as_str(),
            self.schema.schema.as_str(),
            self.name.as_str(),
        ])
    }

    pub fn create_statement(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("    {} {}", c.name, c.data_type))
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            self.qualified_name(),
            columns.join(",\n")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_name() {
        let name = QualifiedName::parse("iceberg.phoenix.event").unwrap();
        assert_eq!(name.object(), "event");
        assert_eq!(name.parent().unwrap().to_string(), "iceberg.phoenix");
        assert!(QualifiedName::parse("iceberg..event").is_err());
        assert!(QualifiedName::parse("event").unwrap().parent().is_none());
    }

    #[test]
    fn test_render_ddl() {
        let schema = SchemaDef::new("iceberg", "phoenix");
        assert_eq!(
            schema.create_statement(),
            "CREATE SCHEMA IF NOT EXISTS iceberg.phoenix"
        );

        let table = schema.table(
            "event",
            vec![ColumnDef::new("id", "BIGINT"), ColumnDef::new("name", "varchar")],
        );
        assert_eq!(
            table.create_statement(),
            "CREATE TABLE IF NOT EXISTS iceberg.phoenix.event (\n    id bigint,\n    name varchar\n)"
        );
    }
}
