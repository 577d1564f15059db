//! Conversions from external infrastructure errors into domain errors.

use relayq_domain::QueueError;
use rusqlite::Error as SqlError;
use tokio::task::JoinError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub QueueError);

impl From<InfraError> for QueueError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<QueueError> for InfraError {
    fn from(value: QueueError) -> Self {
        Self(value)
    }
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → QueueError */
/* -------------------------------------------------------------------------- */

fn sql_to_queue_error(err: SqlError) -> QueueError {
    use rusqlite::ffi::ErrorCode;
    use rusqlite::Error as RE;

    match err {
        RE::SqliteFailure(err, maybe_message) => {
            let message = maybe_message.unwrap_or_default();
            match err.code {
                ErrorCode::DatabaseBusy => QueueError::Storage("database is busy".into()),
                ErrorCode::DatabaseLocked => QueueError::Storage("database is locked".into()),
                ErrorCode::ReadOnly => QueueError::Storage("database is read-only".into()),
                ErrorCode::DiskFull => QueueError::Storage("disk is full".into()),
                ErrorCode::CannotOpen => {
                    QueueError::Storage(format!("unable to open database file: {message}"))
                }
                _ => QueueError::Storage(format!(
                    "sqlite failure {:?} (code {}): {}",
                    err.code, err.extended_code, message
                )),
            }
        }
        RE::FromSqlConversionFailure(_, _, cause) => {
            QueueError::Storage(format!("failed to convert sqlite value: {cause}"))
        }
        RE::InvalidColumnType(_, _, ty) => {
            QueueError::Storage(format!("invalid column type: {ty}"))
        }
        RE::InvalidPath(path) => {
            QueueError::Config(format!("invalid database path: {}", path.to_string_lossy()))
        }
        other => QueueError::Storage(other.to_string()),
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        Self(sql_to_queue_error(value))
    }
}

/* -------------------------------------------------------------------------- */
/* tokio::task::JoinError → QueueError */
/* -------------------------------------------------------------------------- */

/// Map a failed `spawn_blocking` join into a domain error.
pub fn map_join_error(err: JoinError) -> QueueError {
    if err.is_cancelled() {
        QueueError::Internal("blocking storage task was cancelled".into())
    } else {
        QueueError::Internal(format!("blocking storage task panicked: {err}"))
    }
}
