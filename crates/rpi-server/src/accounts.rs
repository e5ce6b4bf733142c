//! Account registration, credential checks, and administrative removal.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use rpi_core::{Error, FieldErrors, Result, UserId};
use rpi_db::pool::DbPool;
use rpi_db::queries::{images, users};

use crate::context::AppContext;
use crate::storage::BlobStore;
use crate::token::TokenPair;

pub const USERNAME_MAX_LEN: usize = 150;
pub const PASSWORD_MIN_LEN: usize = 8;

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";
const USERNAME_TAKEN: &str = "A user with that username already exists.";
const BAD_CREDENTIALS: &str = "No active account found with the given credentials";

/// The identity a request was authenticated as.
///
/// Produced by the auth middleware and passed explicitly into every
/// service call that acts on behalf of a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    pub username: String,
}

/// Registration payload. Fields are optional so missing ones can be
/// reported individually.
#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Public view of a newly created account. The password is never echoed.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RegisteredUser {
    pub username: String,
    pub email: String,
}

static USERNAME_RE: OnceLock<Regex> = OnceLock::new();
static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn username_regex() -> &'static Regex {
    USERNAME_RE.get_or_init(|| {
        Regex::new(r"^[\w.@+-]+$")
            .unwrap_or_else(|error| panic!("username regex failed to compile: {error}"))
    })
}

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$")
            .unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    })
}

/// Pull a required string out of the request, recording why it is unusable.
fn required<'a>(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&'a str>,
) -> Option<&'a str> {
    match value {
        None => {
            errors.add(field, REQUIRED);
            None
        }
        Some(v) if v.trim().is_empty() => {
            errors.add(field, BLANK);
            None
        }
        Some(v) => Some(v),
    }
}

/// Check a registration payload, returning the trimmed username and email.
/// A missing or blank email becomes an empty string.
fn validate_registration(req: &RegisterRequest) -> Result<(String, String, String)> {
    let mut errors = FieldErrors::new();

    let username = required(&mut errors, "username", req.username.as_deref()).map(str::trim);
    if let Some(name) = username {
        if name.chars().count() > USERNAME_MAX_LEN {
            errors.add(
                "username",
                format!("Ensure this field has no more than {USERNAME_MAX_LEN} characters."),
            );
        } else if !username_regex().is_match(name) {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, \
                 numbers, and @/./+/-/_ characters.",
            );
        }
    }

    // Email is optional; absent or blank is stored as "".
    let email = req.email.as_deref().map(str::trim).unwrap_or_default();
    if !email.is_empty() && !email_regex().is_match(email) {
        errors.add("email", "Enter a valid email address.");
    }

    let password = required(&mut errors, "password", req.password.as_deref());
    if let Some(pw) = password {
        if pw.chars().count() < PASSWORD_MIN_LEN {
            errors.add(
                "password",
                format!(
                    "This password is too short. It must contain at least \
                     {PASSWORD_MIN_LEN} characters."
                ),
            );
        }
    }

    errors.into_result()?;

    match (username, password) {
        (Some(u), Some(p)) => Ok((u.to_string(), email.to_string(), p.to_string())),
        _ => Err(Error::Internal("registration validation incomplete".into())),
    }
}

/// Hash a password with bcrypt at the given cost.
pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    bcrypt::hash(password, cost).map_err(|e| Error::Internal(format!("bcrypt error: {e}")))
}

/// Create a new account.
///
/// Every problem with the payload is reported at once as
/// [`Error::InvalidFields`], including a username that is already taken.
pub fn register(ctx: &AppContext, req: RegisterRequest) -> Result<RegisteredUser> {
    let (username, email, password) = validate_registration(&req)?;

    let conn = rpi_db::pool::get_conn(&ctx.db)?;
    if users::get_user_by_username(&conn, &username)?.is_some() {
        return Err(Error::field("username", USERNAME_TAKEN));
    }

    let hash = hash_password(&password, ctx.config.auth.bcrypt_cost)?;
    let user = users::create_user(&conn, &username, &email, &hash).map_err(|e| match e {
        // Lost a race with a concurrent registration.
        Error::Conflict(_) => Error::field("username", USERNAME_TAKEN),
        other => other,
    })?;

    tracing::info!(user_id = %user.id, username = %user.username, "Registered user");

    Ok(RegisteredUser {
        username: user.username,
        email: user.email,
    })
}

/// Exchange a username and password for a fresh token pair.
///
/// Unknown users and wrong passwords fail with the same message.
pub fn login(ctx: &AppContext, username: &str, password: &str) -> Result<TokenPair> {
    let conn = rpi_db::pool::get_conn(&ctx.db)?;

    let Some(user) = users::get_user_by_username(&conn, username)? else {
        tracing::debug!(username, "Login for unknown user");
        return Err(Error::Unauthorized(BAD_CREDENTIALS.into()));
    };

    if !bcrypt::verify(password, &user.password_hash).unwrap_or(false) {
        tracing::debug!(username, "Login with wrong password");
        return Err(Error::Unauthorized(BAD_CREDENTIALS.into()));
    }

    ctx.tokens.issue_pair(user.id)
}

/// Load the account a verified token belongs to.
///
/// Returns `None` if the user has since been deleted.
pub fn resolve_user(db: &DbPool, user_id: UserId) -> Result<Option<AuthUser>> {
    let conn = rpi_db::pool::get_conn(db)?;
    Ok(users::get_user_by_id(&conn, user_id)?.map(|u| AuthUser {
        id: u.id,
        username: u.username,
    }))
}

/// Delete a user, their image records, and the blobs behind them.
///
/// Returns the number of images that were removed.
pub fn delete_account(db: &DbPool, blobs: &BlobStore, username: &str) -> Result<usize> {
    let conn = rpi_db::pool::get_conn(db)?;
    let user = users::get_user_by_username(&conn, username)?
        .ok_or_else(|| Error::not_found("user", username))?;

    let owned = images::list_images_by_user(&conn, user.id)?;
    users::delete_user(&conn, user.id)?;

    for record in &owned {
        if let Err(e) = blobs.remove(&record.path) {
            tracing::warn!(path = %record.path, "Failed to remove blob: {e}");
        }
    }

    tracing::info!(user_id = %user.id, images = owned.len(), "Deleted user");
    Ok(owned.len())
}
