//! Error mapping shared by the Diesel repositories.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

/// Readable message from a Diesel error, with debug context.
pub fn map_diesel_error_message(error: &DieselError, operation: &str) -> String {
    let error_message = error.to_string();
    debug!(%error_message, %operation, "diesel operation failed");
    error_message
}

/// Whether the error is a dropped connection rather than a bad query.
pub fn is_connection_error(error: &DieselError) -> bool {
    matches!(
        error,
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _)
            | DieselError::BrokenTransactionManager
    )
}

/// Whether the error means the spatial extension or its column is missing.
pub fn is_missing_spatial_support(error: &DieselError) -> bool {
    let DieselError::DatabaseError(_, info) = error else {
        return false;
    };
    let message = info.message().to_lowercase();
    message.contains("does not exist")
        && ["st_", "geography", "geom"]
            .iter()
            .any(|needle| message.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn non_database_errors_are_not_spatial() {
        assert!(!is_missing_spatial_support(&DieselError::NotFound));
        assert!(!is_connection_error(&DieselError::NotFound));
    }
}
