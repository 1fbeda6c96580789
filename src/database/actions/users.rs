use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::generate_jwt_session,
    },
    error::{Error, ErrorKind, FieldErrors, QueryError},
    pagination::{PageContext, Pagination},
    schema::{Credentials, Id, NewUser, PasswordChange, Profile, User},
    validation::{check_password, validate_new_user},
};

use sqlx::{Pool, Postgres};

/// Columns of a `Profile`; `$1` is the viewer id, or NULL for anonymous callers.
pub(crate) const PROFILE_COLUMNS: &str = "
    u.id, u.email, u.username, u.first_name, u.last_name, u.avatar,
    EXISTS (SELECT 1 FROM subscriptions s WHERE s.user_id = $1 AND s.author_id = u.id) AS is_subscribed
";

pub async fn get_user_by_email(email: &str, pool: &Pool<Postgres>) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(user_id: Id, pool: &Pool<Postgres>) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// The session's user. A token outliving its account is treated as unauthenticated.
pub async fn get_session_user(user_id: Id, pool: &Pool<Postgres>) -> Result<User, Error> {
    get_user_by_id(user_id, pool)
        .await?
        .ok_or_else(|| ErrorKind::Unauthorized.new("User no longer exists"))
}

pub async fn get_profile(
    user_id: Id,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<Profile, Error> {
    let row: Option<Profile> =
        sqlx::query_as(&format!("SELECT {PROFILE_COLUMNS} FROM users u WHERE u.id = $2"))
            .bind(viewer)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    row.ok_or_else(|| ErrorKind::NotFound.new("No user exists with specified id"))
}

pub async fn fetch_profiles(
    viewer: Option<Id>,
    page: Pagination,
    pool: &Pool<Postgres>,
) -> Result<PageContext<Profile>, Error> {
    let rows: Vec<Profile> = sqlx::query_as(&format!(
        "SELECT {PROFILE_COLUMNS}, COUNT(*) OVER() AS count FROM users u ORDER BY u.username LIMIT $2 OFFSET $3"
    ))
    .bind(viewer)
    .bind(page.limit)
    .bind(page.offset)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = match rows.first() {
        Some(row) => row.count,
        None if page.offset > 0 => {
            let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
                .fetch_one(pool)
                .await
                .map_err(QueryError::from)?;
            count
        }
        None => 0,
    };
    Ok(PageContext::from_rows(rows, total_count, page))
}

/// Creates a user; taken email or username is reported per field.
pub async fn register_user(new_user: &NewUser, pool: &Pool<Postgres>) -> Result<User, Error> {
    validate_new_user(new_user)?;

    let (email_taken, username_taken): (bool, bool) = sqlx::query_as(
        "
        SELECT
            EXISTS (SELECT 1 FROM users WHERE LOWER(email) = LOWER($1)),
            EXISTS (SELECT 1 FROM users WHERE username = $2)
    ",
    )
    .bind(&new_user.email)
    .bind(&new_user.username)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    let mut errors = FieldErrors::new();
    if email_taken {
        errors.push("email", "A user with that email already exists");
    }
    if username_taken {
        errors.push("username", "A user with that username already exists");
    }
    errors.into_result()?;

    let password = hash_password(&new_user.password)?;
    let user: User = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
    ",
    )
    .bind(&new_user.email)
    .bind(&new_user.username)
    .bind(&new_user.first_name)
    .bind(&new_user.last_name)
    .bind(password)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    log::info!("Registered user {} ({})", user.username, user.id);
    Ok(user)
}

pub async fn login_user(
    credentials: &Credentials,
    secret: &str,
    lifetime_hours: i64,
    pool: &Pool<Postgres>,
) -> Result<String, Error> {
    let invalid = || ErrorKind::InvalidRequest.new("Unable to log in with provided credentials");

    let user = get_user_by_email(&credentials.email, pool)
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&credentials.password, &user.password)? {
        return Err(invalid());
    }

    generate_jwt_session(&user, secret, lifetime_hours)
}

pub async fn set_password(
    user_id: Id,
    change: &PasswordChange,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let user = get_session_user(user_id, pool).await?;

    let mut errors = FieldErrors::new();
    check_password("new_password", &change.new_password, &mut errors);
    if !verify_password(&change.current_password, &user.password)? {
        errors.push("current_password", "Wrong password");
    }
    errors.into_result()?;

    let password = hash_password(&change.new_password)?;
    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// Replaces the avatar path and returns the previous one.
pub async fn set_avatar(
    user_id: Id,
    avatar: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Option<String>, Error> {
    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    let previous: Option<(Option<String>,)> =
        sqlx::query_as("SELECT avatar FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(QueryError::from)?;
    let (previous,) = previous.ok_or_else(|| ErrorKind::Unauthorized.new("User no longer exists"))?;

    sqlx::query("UPDATE users SET avatar = $1 WHERE id = $2")
        .bind(avatar)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(QueryError::from)?;

    tx.commit().await.map_err(QueryError::from)?;
    Ok(previous)
}
