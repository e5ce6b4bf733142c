//! Database query modules.

pub mod images;
pub mod users;

/// True when `err` is a SQLite constraint violation (UNIQUE, FOREIGN KEY, ...).
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
