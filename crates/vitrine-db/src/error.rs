//! Database-specific error types and conversions.

use vitrine_core::error::{ConflictReason, VitrineError};

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed on {table}: {message}")]
    Query { table: String, message: String },

    #[error("Unique constraint violated on {table}: {message}")]
    Duplicate { table: String, message: String },

    #[error("Transaction conflict on {table}")]
    TransactionConflict { table: String },

    #[error("Malformed row in {table}: {message}")]
    Decode { table: String, message: String },

    #[error("Password hashing failed: {0}")]
    Password(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl DbError {
    /// Classifies a failed statement. SurrealDB reports index and
    /// transaction failures only through the message text.
    pub fn statement(table: &str, err: surrealdb::Error) -> Self {
        let message = err.to_string();
        if message.contains("already contains") || message.contains("already exists") {
            DbError::Duplicate {
                table: table.into(),
                message,
            }
        } else if message.contains("conflict") || message.contains("failed transaction") {
            DbError::TransactionConflict {
                table: table.into(),
            }
        } else {
            DbError::Query {
                table: table.into(),
                message,
            }
        }
    }

    pub fn decode(table: &str, message: impl Into<String>) -> Self {
        DbError::Decode {
            table: table.into(),
            message: message.into(),
        }
    }
}

impl From<DbError> for VitrineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => VitrineError::NotFound { entity, id },
            DbError::Duplicate { table, message } => {
                VitrineError::Conflict(ConflictReason::Duplicate {
                    entity: table,
                    field: "unique key".into(),
                    value: message,
                })
            }
            DbError::TransactionConflict { .. } => {
                VitrineError::Conflict(ConflictReason::ConcurrentModification)
            }
            other => VitrineError::Database(other.to_string()),
        }
    }
}

/// Parses a UUID stored as a string column.
pub(crate) fn parse_uuid(table: &str, column: &str, value: &str) -> Result<uuid::Uuid, DbError> {
    uuid::Uuid::parse_str(value)
        .map_err(|e| DbError::decode(table, format!("invalid {column} UUID: {e}")))
}
