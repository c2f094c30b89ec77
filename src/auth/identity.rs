//! Resolves a sign-in attempt to exactly one user record.
//!
//! Email is the reconciliation key between the password and Google paths.
//! Concurrent attempts on the same email are settled by the unique indexes,
//! never by a read-then-insert check.

use sqlx::SqlitePool;
use tracing::info;

use crate::{users::{self, Credential, User}, AppError, AppResult};

use super::{password, validate, GoogleProfile};

pub async fn register(db_pool: &SqlitePool, name: &str, email: &str, plaintext: String) -> AppResult<User> {
    let name = validate::name(name)?;
    let email = validate::email(email)?;
    validate::password(&plaintext)?;

    let hash = password::hash(plaintext).await?;
    let user = users::insert_password_user(db_pool, &name, &email, &hash).await?;

    info!(user_id = %user.id, "registered");
    Ok(user)
}

pub async fn login(db_pool: &SqlitePool, email: &str, plaintext: String) -> AppResult<User> {
    let email = users::normalize_email(email);
    let Some(account) = users::find_account_by_email(db_pool, &email).await? else {
        return Err(AppError::InvalidCredentials);
    };

    let Some(hash) = account.credential.password_hash() else {
        return Err(AppError::WrongProvider);
    };

    if !password::verify(plaintext, hash.to_owned()).await? {
        return Err(AppError::InvalidCredentials);
    }

    let user = users::record_login(db_pool, account.user.id)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    info!(user_id = %user.id, "logged in");
    Ok(user)
}

/// 1. known Google id: that user.
/// 2. known email without a Google id: link it, keeping any password.
/// 3. otherwise: a new Google user.
///
/// An insert that loses a race against a concurrent sign-in resolves again,
/// landing on the winner's record.
pub async fn google_login(db_pool: &SqlitePool, profile: &GoogleProfile) -> AppResult<User> {
    for _ in 0..2 {
        if let Some(user) = users::record_google_login(db_pool, profile).await? {
            return Ok(user);
        }

        if let Some(user) = users::link_google(db_pool, profile).await? {
            info!(user_id = %user.id, "linked google account");
            return Ok(user);
        }

        if let Some(account) = users::find_account_by_email(db_pool, &profile.email).await? {
            if let Credential::Google { google_id, .. } = &account.credential {
                if *google_id != profile.google_id {
                    return Err(AppError::Conflict(
                        "This email is linked to a different Google account".to_owned(),
                    ));
                }
            }
            continue;
        }

        if let Some(user) = users::insert_google_user(db_pool, profile).await? {
            info!(user_id = %user.id, "registered with google");
            return Ok(user);
        }
    }

    Err(AppError::Conflict("User already exists with this email".to_owned()))
}

pub async fn change_password(db_pool: &SqlitePool, user: &User, current: String, new: String) -> AppResult<()> {
    let account = users::find_account(db_pool, user.id)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    let Some(hash) = account.credential.password_hash() else {
        return Err(AppError::validation(
            "This account has no password. It is managed by Google.",
        ));
    };

    validate::password(&new)?;
    if !password::verify(current, hash.to_owned()).await? {
        return Err(AppError::InvalidCredentials);
    }

    let hash = password::hash(new).await?;
    users::set_password(db_pool, user.id, &hash).await?;

    info!(user_id = %user.id, "changed password");
    Ok(())
}
