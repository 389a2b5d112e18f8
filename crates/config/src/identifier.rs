//! Table and database name validation
//!
//! Names are interpolated directly into SQL text, so they must stay within
//! `[A-Za-z0-9_]`.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid identifier `{0}`: only ASCII letters, digits and `_` are allowed")]
pub struct InvalidIdentifier(pub String);

/// True iff `name` matches `^[A-Za-z0-9_]+$`
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// A validated `database.table` reference
///
/// Only constructible from valid identifiers, so anything holding a
/// `TableName` can put it into SQL as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    database: String,
    table: String,
}

impl TableName {
    pub fn new(database: &str, table: &str) -> Result<Self, InvalidIdentifier> {
        for name in [database, table] {
            if !is_valid_identifier(name) {
                return Err(InvalidIdentifier(name.to_string()));
            }
        }
        Ok(Self {
            database: database.to_string(),
            table: table.to_string(),
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}
