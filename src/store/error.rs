//! Persistence error types.

/// Errors from the persistence adapter.
///
/// Any of these is fatal to the search that triggered the operation; the
/// api-cache layer is the one caller that deliberately swallows them and
/// degrades to a miss.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The store could not be opened or queried
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A row decoded into something the domain rejects
    #[error("store corrupted: {0}")]
    Corrupted(String),

    /// A keyed lookup matched nothing
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => {
                PersistenceError::NotFound("query returned no rows".to_string())
            }
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)
            | rusqlite::Error::InvalidColumnType(..) => {
                PersistenceError::Corrupted(err.to_string())
            }
            other => PersistenceError::Unavailable(other.to_string()),
        }
    }
}

impl From<crate::domain::DomainError> for PersistenceError {
    fn from(err: crate::domain::DomainError) -> Self {
        PersistenceError::Corrupted(err.to_string())
    }
}
