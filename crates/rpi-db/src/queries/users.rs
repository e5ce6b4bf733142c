//! User persistence.
//!
//! Rows are only ever inserted by registration and removed by administrative
//! deletion; nothing here updates an existing user.

use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use rpi_core::{Error, Result, UserId};

use super::is_constraint_violation;
use crate::models::User;

const COLS: &str = "id, username, email, password_hash, created_at";

/// Create a new user and return it.
///
/// Returns [`Error::Conflict`] if the username is already taken.
pub fn create_user(
    conn: &Connection,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<User> {
    let id = UserId::new();
    let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

    conn.execute(
        "INSERT INTO users (id, username, email, password_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![id.to_string(), username, email, password_hash, created_at],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            Error::Conflict(format!("Username '{username}' already exists"))
        } else {
            Error::database(e.to_string())
        }
    })?;

    Ok(User {
        id,
        username: username.to_string(),
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        created_at,
    })
}

/// Get a user by primary key.
pub fn get_user_by_id(conn: &Connection, id: UserId) -> Result<Option<User>> {
    let q = format!("SELECT {COLS} FROM users WHERE id = ?1");
    match conn.query_row(&q, [id.to_string()], User::from_row) {
        Ok(u) => Ok(Some(u)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Get a user by username.
pub fn get_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    let q = format!("SELECT {COLS} FROM users WHERE username = ?1");
    match conn.query_row(&q, [username], User::from_row) {
        Ok(u) => Ok(Some(u)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Total number of registered users.
pub fn count_users(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))
}

/// Delete a user by ID. Their image rows go with them via the foreign key.
/// Returns true if a row was deleted.
pub fn delete_user(conn: &Connection, id: UserId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM users WHERE id = ?1", [id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}
