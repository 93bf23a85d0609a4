/// User model and database operations
///
/// Users are created on first sign-in by upserting on their email address and
/// are never deleted by this service. The role is changed either by an admin
/// or by the rider lifecycle when a rider application is approved.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_role AS ENUM ('user', 'admin', 'rider');
///
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email TEXT NOT NULL UNIQUE,
///     name TEXT,
///     photo_url TEXT,
///     role user_role NOT NULL DEFAULT 'user',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// Email comparison is case-sensitive everywhere except `search_by_email`.
///
/// # Example
///
/// ```no_run
/// use parcelhub_shared::models::user::{UpsertOutcome, UpsertUser, User};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let outcome = User::upsert_by_email(&pool, UpsertUser {
///     email: "ayesha@example.com".to_string(),
///     name: Some("Ayesha".to_string()),
///     photo_url: None,
/// }).await?;
///
/// if let UpsertOutcome::Inserted(user) = outcome {
///     println!("welcome {}", user.email);
/// }
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Authorization role of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Regular customer sending parcels
    User,

    /// Marketplace operator
    Admin,

    /// Approved courier
    Rider,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
            UserRole::Rider => "rider",
        }
    }

    /// Roles an admin may assign directly; `rider` is only reached through
    /// rider approval.
    pub fn is_admin_assignable(&self) -> bool {
        matches!(self, UserRole::User | UserRole::Admin)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            "rider" => Ok(UserRole::Rider),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// A marketplace user
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,

    /// Unique, stored exactly as first submitted
    pub email: String,

    pub name: Option<String>,

    pub photo_url: Option<String>,

    pub role: UserRole,

    pub created_at: DateTime<Utc>,

    /// Refreshed on every repeated sign-in upsert
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for the sign-in upsert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertUser {
    pub email: String,
    pub name: Option<String>,
    pub photo_url: Option<String>,
}

/// Result of `User::upsert_by_email`
#[derive(Debug, Clone)]
pub enum UpsertOutcome {
    /// No user had this email; a new row was created
    Inserted(User),

    /// The email was already registered; only `last_login_at` changed
    Existing(User),
}

impl UpsertOutcome {
    pub fn user(&self) -> &User {
        match self {
            UpsertOutcome::Inserted(user) | UpsertOutcome::Existing(user) => user,
        }
    }
}

const USER_COLUMNS: &str = "id, email, name, photo_url, role, created_at, last_login_at";

/// Escapes `%`, `_` and `\` so user input is matched literally by LIKE
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl User {
    /// Creates the user on first sign-in, otherwise records the login
    ///
    /// Idempotent per email: concurrent first sign-ins race on the unique
    /// index and exactly one of them inserts.
    pub async fn upsert_by_email(pool: &PgPool, data: UpsertUser) -> Result<UpsertOutcome, sqlx::Error> {
        let inserted = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, name, photo_url, last_login_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&data.email)
        .bind(&data.name)
        .bind(&data.photo_url)
        .fetch_optional(pool)
        .await?;

        if let Some(user) = inserted {
            return Ok(UpsertOutcome::Inserted(user));
        }

        let existing = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET last_login_at = NOW()
            WHERE email = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&data.email)
        .fetch_one(pool)
        .await?;

        Ok(UpsertOutcome::Existing(existing))
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user by exact email
    pub async fn find_by_email<'e, E>(executor: E, email: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(executor)
            .await
    }

    /// Case-insensitive partial match on email, at most `limit` rows
    pub async fn search_by_email(pool: &PgPool, query: &str, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        let pattern = format!("%{}%", escape_like(query));

        sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE email ILIKE $1 ESCAPE '\'
            ORDER BY created_at DESC
            LIMIT $2
            "#
        ))
        .bind(pattern)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Sets the role of a user by ID
    ///
    /// Returns `None` if no user has this ID.
    pub async fn update_role(pool: &PgPool, id: Uuid, role: UserRole) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(pool)
        .await
    }

    /// Promotes the plain user owning `email` to rider, returning rows affected
    ///
    /// Only a `user` is promoted, so an admin who is also a rider keeps their
    /// role. Takes an executor so the rider lifecycle can run it inside the
    /// same transaction as the rider status change.
    pub async fn promote_to_rider<'e, E>(executor: E, email: &str) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query("UPDATE users SET role = $2 WHERE email = $1 AND role = $3")
            .bind(email)
            .bind(UserRole::Rider)
            .bind(UserRole::User)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
