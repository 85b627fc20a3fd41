use crate::entity::EntityId;
use crate::schema::FieldKind;
use serde::Serialize;
use std::sync::PoisonError;
use thiserror::Error;

/// Fatal errors. Any of these aborts the current pass and leaves its transaction uncommitted.
#[derive(Debug, Error)]
pub enum AppError {

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("serde error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl AppError {
    pub fn schema(msg: impl Into<String>) -> Self {
        AppError::Schema(msg.into())
    }

    pub fn undeclared_field(type_name: &str, field: &str) -> Self {
        AppError::Schema(format!("cannot find field \"{}\" in class {}", field, type_name))
    }

    pub fn is_schema_error(&self) -> bool {
        matches!(self, AppError::Schema(_))
    }

    /// Anything raised by the store itself, as opposed to metadata or configuration problems.
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Redb(_)
                | AppError::RedbTransaction(_)
                | AppError::RedbStorage(_)
                | AppError::RedbTable(_)
                | AppError::RedbCommit(_)
                | AppError::Codec(_)
                | AppError::Io(_)
        )
    }
}

impl<T> From<PoisonError<T>> for AppError
{
    fn from(e: PoisonError<T>) -> Self {
        AppError::Custom(format!("Poison error: {:?}", e.to_string()))
    }
}

/// Per-entity condition raised while writing a derived field. It is recorded and the group is
/// skipped, it never aborts a pass.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
pub enum PartialFieldError {
    #[error("Object with ID: {id} of type {type_name} has no {field} field")]
    Undeclared { id: EntityId, type_name: String, field: String },

    #[error("Field {type_name}.{field} of object {id} is {declared:?}, cannot hold {given:?}")]
    KindMismatch { id: EntityId, type_name: String, field: String, declared: FieldKind, given: FieldKind },
}

impl PartialFieldError {
    pub fn entity_id(&self) -> EntityId {
        match self {
            PartialFieldError::Undeclared { id, .. } => *id,
            PartialFieldError::KindMismatch { id, .. } => *id,
        }
    }
}
