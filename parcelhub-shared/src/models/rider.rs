/// Rider model and database operations
///
/// Riders apply as `pending` and are moved through their lifecycle only by
/// admin actions (see `crate::lifecycle`).
///
/// # State Machine
///
/// ```text
/// pending → active      (user promoted to role `rider`)
/// pending → rejected
/// pending → cancelled
/// active  → inactive
/// active  → cancelled
/// ```
///
/// `rejected`, `inactive` and `cancelled` are terminal.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE rider_status AS ENUM ('pending', 'active', 'rejected', 'inactive', 'cancelled');
///
/// CREATE TABLE riders (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email TEXT NOT NULL,
///     name TEXT NOT NULL,
///     phone TEXT,
///     region TEXT,
///     district TEXT,
///     bike_brand TEXT,
///     bike_registration TEXT,
///     details JSONB NOT NULL DEFAULT '{}',
///     status rider_status NOT NULL DEFAULT 'pending',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgConnection, PgPool};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Approval status of a rider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "rider_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RiderStatus {
    /// Application submitted, awaiting review
    Pending,

    /// Approved and delivering
    Active,

    /// Application turned down
    Rejected,

    /// Deactivated after approval, e.g. for misconduct
    Inactive,

    /// Withdrawn, before or after approval
    Cancelled,
}

/// A status change the state machine does not allow
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal rider transition from {from} to {to}")]
pub struct IllegalTransition {
    pub from: RiderStatus,
    pub to: RiderStatus,
}

impl RiderStatus {
    pub const ALL: [RiderStatus; 5] = [
        RiderStatus::Pending,
        RiderStatus::Active,
        RiderStatus::Rejected,
        RiderStatus::Inactive,
        RiderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiderStatus::Pending => "pending",
            RiderStatus::Active => "active",
            RiderStatus::Rejected => "rejected",
            RiderStatus::Inactive => "inactive",
            RiderStatus::Cancelled => "cancelled",
        }
    }

    /// No transition leaves a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RiderStatus::Rejected | RiderStatus::Inactive | RiderStatus::Cancelled
        )
    }

    /// Applies a requested status change
    ///
    /// Returns the new status, or `IllegalTransition` for any pair outside
    /// the table, including requesting the current status again.
    pub fn transition(self, target: RiderStatus) -> Result<RiderStatus, IllegalTransition> {
        match (self, target) {
            (RiderStatus::Pending, RiderStatus::Active)
            | (RiderStatus::Pending, RiderStatus::Rejected)
            | (RiderStatus::Pending, RiderStatus::Cancelled)
            | (RiderStatus::Active, RiderStatus::Inactive)
            | (RiderStatus::Active, RiderStatus::Cancelled) => Ok(target),
            (from, to) => Err(IllegalTransition { from, to }),
        }
    }

    /// Whether reaching this status promotes the rider's user account
    pub fn promotes_user(&self) -> bool {
        matches!(self, RiderStatus::Active)
    }
}

impl fmt::Display for RiderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RiderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown rider status '{}'", s))
    }
}

/// A courier account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Rider {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub region: Option<String>,
    pub district: Option<String>,
    pub bike_brand: Option<String>,
    pub bike_registration: Option<String>,
    pub details: JsonValue,
    pub status: RiderStatus,
    pub created_at: DateTime<Utc>,
}

/// Input for a rider application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRider {
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub region: Option<String>,
    pub district: Option<String>,
    pub bike_brand: Option<String>,
    pub bike_registration: Option<String>,
    pub details: JsonValue,
}

const RIDER_COLUMNS: &str = "id, email, name, phone, region, district, bike_brand, \
     bike_registration, details, status, created_at";

impl Rider {
    /// Records a new application in `pending`
    pub async fn create(pool: &PgPool, data: CreateRider) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Rider>(&format!(
            r#"
            INSERT INTO riders (email, name, phone, region, district, bike_brand,
                                bike_registration, details)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {RIDER_COLUMNS}
            "#
        ))
        .bind(data.email)
        .bind(data.name)
        .bind(data.phone)
        .bind(data.region)
        .bind(data.district)
        .bind(data.bike_brand)
        .bind(data.bike_registration)
        .bind(data.details)
        .fetch_one(pool)
        .await
    }

    /// Finds a rider by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Rider>(&format!("SELECT {RIDER_COLUMNS} FROM riders WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Riders in `status`, newest first
    pub async fn list_by_status(pool: &PgPool, status: RiderStatus) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Rider>(&format!(
            r#"
            SELECT {RIDER_COLUMNS}
            FROM riders
            WHERE status = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(status)
        .fetch_all(pool)
        .await
    }

    /// Loads a rider and locks its row until the transaction ends
    pub async fn lock_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Rider>(&format!(
            "SELECT {RIDER_COLUMNS} FROM riders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Writes a new status, returning rows modified
    ///
    /// Callers validate the transition first; this only guards against the
    /// row having moved since it was read.
    pub async fn set_status(
        conn: &mut PgConnection,
        id: Uuid,
        from: RiderStatus,
        to: RiderStatus,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE riders SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(from)
            .bind(to)
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }
}
