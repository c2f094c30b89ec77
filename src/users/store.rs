use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{auth::GoogleProfile, db::is_unique_violation, AppError, AppResult};

use super::{Account, Credential, User};

// The public projection never selects password_hash.
macro_rules! user_columns {
    () => {
        "id, name, email, role, email_verified, profile_image_url, \
         CASE WHEN google_id IS NULL THEN 'email' ELSE 'google' END AS provider, \
         created_at, last_login_at"
    };
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    role: String,
    email_verified: bool,
    profile_image_url: Option<String>,
    provider: String,
    created_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: Option<String>,
    google_id: Option<String>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> AppResult<User> {
        Ok(User {
            id: Uuid::parse_str(&row.id).map_err(anyhow::Error::from)?,
            name: row.name,
            email: row.email,
            role: row.role.parse()?,
            email_verified: row.email_verified,
            profile_image_url: row.profile_image_url,
            provider: row.provider.parse()?,
            created_at: row.created_at,
            last_login_at: row.last_login_at,
        })
    }
}

impl TryFrom<AccountRow> for Account {
    type Error = AppError;

    fn try_from(row: AccountRow) -> AppResult<Account> {
        let credential = match (row.google_id, row.password_hash) {
            (Some(google_id), password_hash) => Credential::Google { google_id, password_hash },
            (None, Some(hash)) => Credential::Password { hash },
            (None, None) => {
                return Err(anyhow::anyhow!("user {} has no credential", row.user.id).into());
            }
        };

        let mut user = User::try_from(row.user)?;
        user.provider = credential.provider();

        Ok(Account { user, credential })
    }
}

fn to_user(row: Option<UserRow>) -> AppResult<Option<User>> {
    row.map(User::try_from).transpose()
}

pub async fn find_user(db_pool: &SqlitePool, id: Uuid) -> AppResult<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(concat!("SELECT ", user_columns!(), " FROM users WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(db_pool)
        .await?;
    to_user(row)
}

pub async fn find_account(db_pool: &SqlitePool, id: Uuid) -> AppResult<Option<Account>> {
    sqlx::query_as::<_, AccountRow>(concat!(
        "SELECT ", user_columns!(), ", password_hash, google_id FROM users WHERE id = ?"
    ))
        .bind(id.to_string())
        .fetch_optional(db_pool)
        .await?
        .map(Account::try_from)
        .transpose()
}

pub async fn find_account_by_email(db_pool: &SqlitePool, email: &str) -> AppResult<Option<Account>> {
    sqlx::query_as::<_, AccountRow>(concat!(
        "SELECT ", user_columns!(), ", password_hash, google_id FROM users WHERE email = ?"
    ))
        .bind(email)
        .fetch_optional(db_pool)
        .await?
        .map(Account::try_from)
        .transpose()
}

pub async fn list_users(db_pool: &SqlitePool) -> AppResult<Vec<User>> {
    sqlx::query_as::<_, UserRow>(concat!("SELECT ", user_columns!(), " FROM users ORDER BY created_at"))
        .fetch_all(db_pool)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect()
}

/// The unique index on email is what rejects a concurrent duplicate.
pub async fn insert_password_user(
    db_pool: &SqlitePool,
    name: &str,
    email: &str,
    password_hash: &str,
) -> AppResult<User> {
    let now = Utc::now();
    let row = sqlx::query_as::<_, UserRow>(concat!(
        "INSERT INTO users (id, name, email, password_hash, created_at, last_login_at) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING ", user_columns!()
    ))
        .bind(Uuid::now_v7().to_string())
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(now)
        .bind(now)
        .fetch_one(db_pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppError::Conflict("User already exists with this email".to_owned())
            } else {
                err.into()
            }
        })?;

    row.try_into()
}

/// `None` when the email or Google id is already taken, which is how a lost
/// race with a concurrent sign-in shows up.
pub async fn insert_google_user(db_pool: &SqlitePool, profile: &GoogleProfile) -> AppResult<Option<User>> {
    let now = Utc::now();
    let inserted = sqlx::query_as::<_, UserRow>(concat!(
        "INSERT INTO users (id, name, email, google_id, profile_image_url, email_verified, created_at, last_login_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING ", user_columns!()
    ))
        .bind(Uuid::now_v7().to_string())
        .bind(&profile.name)
        .bind(&profile.email)
        .bind(&profile.google_id)
        .bind(&profile.picture)
        .bind(profile.email_verified)
        .bind(now)
        .bind(now)
        .fetch_one(db_pool)
        .await;

    match inserted {
        Ok(row) => Ok(Some(row.try_into()?)),
        Err(err) if is_unique_violation(&err) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

pub async fn record_google_login(db_pool: &SqlitePool, profile: &GoogleProfile) -> AppResult<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(concat!(
        "UPDATE users SET last_login_at = ?, profile_image_url = COALESCE(?, profile_image_url) \
         WHERE google_id = ? RETURNING ", user_columns!()
    ))
        .bind(Utc::now())
        .bind(&profile.picture)
        .bind(&profile.google_id)
        .fetch_optional(db_pool)
        .await?;
    to_user(row)
}

pub async fn link_google(db_pool: &SqlitePool, profile: &GoogleProfile) -> AppResult<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(concat!(
        "UPDATE users SET google_id = ?, profile_image_url = COALESCE(profile_image_url, ?), \
         email_verified = MAX(email_verified, ?), last_login_at = ? \
         WHERE email = ? AND google_id IS NULL RETURNING ", user_columns!()
    ))
        .bind(&profile.google_id)
        .bind(&profile.picture)
        .bind(profile.email_verified)
        .bind(Utc::now())
        .bind(&profile.email)
        .fetch_optional(db_pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppError::Conflict("This Google account is already linked to another user".to_owned())
            } else {
                err.into()
            }
        })?;
    to_user(row)
}

pub async fn record_login(db_pool: &SqlitePool, id: Uuid) -> AppResult<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(concat!(
        "UPDATE users SET last_login_at = ? WHERE id = ? RETURNING ", user_columns!()
    ))
        .bind(Utc::now())
        .bind(id.to_string())
        .fetch_optional(db_pool)
        .await?;
    to_user(row)
}

pub async fn update_profile(
    db_pool: &SqlitePool,
    id: Uuid,
    name: Option<&str>,
    email: Option<&str>,
) -> AppResult<Option<User>> {
    let row = sqlx::query_as::<_, UserRow>(concat!(
        "UPDATE users SET name = COALESCE(?, name), email = COALESCE(?, email) \
         WHERE id = ? RETURNING ", user_columns!()
    ))
        .bind(name)
        .bind(email)
        .bind(id.to_string())
        .fetch_optional(db_pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppError::Conflict("Email is already in use".to_owned())
            } else {
                err.into()
            }
        })?;
    to_user(row)
}

pub async fn set_password(db_pool: &SqlitePool, id: Uuid, password_hash: &str) -> AppResult<bool> {
    let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(password_hash)
        .bind(id.to_string())
        .execute(db_pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn delete_user(db_pool: &SqlitePool, id: Uuid) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id.to_string())
        .execute(db_pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use crate::{db, users::Provider};

    use super::*;

    #[tokio::test]
    async fn account_provider_follows_credential() {
        let db_pool = db::connect_in_memory().await.unwrap();
        let user = insert_password_user(&db_pool, "Ada", "ada@example.com", "hash").await.unwrap();

        let account = find_account(&db_pool, user.id).await.unwrap().unwrap();
        assert_eq!(account.credential, Credential::Password { hash: "hash".to_owned() });
        assert_eq!(account.user.provider, Provider::Email);

        let profile = GoogleProfile::new("g-1".to_owned(), "ada@example.com", None, None, true).unwrap();
        link_google(&db_pool, &profile).await.unwrap().unwrap();

        let account = find_account_by_email(&db_pool, "ada@example.com").await.unwrap().unwrap();
        assert_eq!(account.user.provider, Provider::Google);
        assert_eq!(account.credential.password_hash(), Some("hash"));
    }
}
