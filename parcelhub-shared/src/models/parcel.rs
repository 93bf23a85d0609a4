/// Parcel model and database operations
///
/// A parcel is created `unpaid` and becomes `paid` exactly once, through
/// settlement (see `crate::settlement`). Nothing else in the service writes
/// the payment columns.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE payment_status AS ENUM ('unpaid', 'paid');
///
/// CREATE TABLE parcels (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     created_by TEXT NOT NULL,
///     title TEXT NOT NULL,
///     parcel_type TEXT,
///     sender_name TEXT,
///     sender_region TEXT,
///     receiver_name TEXT,
///     receiver_region TEXT,
///     weight DOUBLE PRECISION,
///     cost DOUBLE PRECISION,
///     details JSONB NOT NULL DEFAULT '{}',
///     payment_status payment_status NOT NULL DEFAULT 'unpaid',
///     transaction_id TEXT,
///     payment_date TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Whether a parcel has been settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
        }
    }
}

/// A parcel booked by a customer
///
/// Field names on the wire follow the client application: `created_by` and
/// `payment_status` stay snake_case, the rest are camelCase.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Parcel {
    pub id: Uuid,

    /// Owner email
    #[serde(rename = "created_by")]
    pub created_by: String,

    pub title: String,
    pub parcel_type: Option<String>,
    pub sender_name: Option<String>,
    pub sender_region: Option<String>,
    pub receiver_name: Option<String>,
    pub receiver_region: Option<String>,
    pub weight: Option<f64>,
    pub cost: Option<f64>,

    /// Remaining client-supplied fields, stored as sent
    pub details: JsonValue,

    #[serde(rename = "payment_status")]
    pub payment_status: PaymentStatus,

    /// Transaction that settled the parcel
    pub transaction_id: Option<String>,

    pub payment_date: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Parcel {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

/// Input for booking a parcel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateParcel {
    pub created_by: String,
    pub title: String,
    pub parcel_type: Option<String>,
    pub sender_name: Option<String>,
    pub sender_region: Option<String>,
    pub receiver_name: Option<String>,
    pub receiver_region: Option<String>,
    pub weight: Option<f64>,
    pub cost: Option<f64>,
    pub details: JsonValue,
}

const PARCEL_COLUMNS: &str = "id, created_by, title, parcel_type, sender_name, sender_region, \
     receiver_name, receiver_region, weight, cost, details, payment_status, transaction_id, \
     payment_date, created_at";

impl Parcel {
    /// Books a new, unpaid parcel
    pub async fn create(pool: &PgPool, data: CreateParcel) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Parcel>(&format!(
            r#"
            INSERT INTO parcels (created_by, title, parcel_type, sender_name, sender_region,
                                 receiver_name, receiver_region, weight, cost, details)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PARCEL_COLUMNS}
            "#
        ))
        .bind(data.created_by)
        .bind(data.title)
        .bind(data.parcel_type)
        .bind(data.sender_name)
        .bind(data.sender_region)
        .bind(data.receiver_name)
        .bind(data.receiver_region)
        .bind(data.weight)
        .bind(data.cost)
        .bind(data.details)
        .fetch_one(pool)
        .await
    }

    /// Finds a parcel by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Parcel>(&format!("SELECT {PARCEL_COLUMNS} FROM parcels WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists parcels newest first, optionally only those owned by `owner`
    pub async fn list(pool: &PgPool, owner: Option<&str>) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Parcel>(&format!(
            r#"
            SELECT {PARCEL_COLUMNS}
            FROM parcels
            WHERE ($1::TEXT IS NULL OR created_by = $1)
            ORDER BY created_at DESC
            "#
        ))
        .bind(owner)
        .fetch_all(pool)
        .await
    }

    /// Deletes an unpaid parcel belonging to `owner`
    ///
    /// Paid parcels are referenced by the ledger and are kept.
    pub async fn delete_unpaid(pool: &PgPool, id: Uuid, owner: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM parcels WHERE id = $1 AND created_by = $2 AND payment_status = 'unpaid'",
        )
        .bind(id)
        .bind(owner)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Loads a parcel and locks its row until the transaction ends
    pub async fn lock_for_settlement(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Parcel>(&format!(
            "SELECT {PARCEL_COLUMNS} FROM parcels WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await
    }

    /// Marks an unpaid parcel paid by `transaction_id`
    ///
    /// Conditional on the current state, so it returns `None` when the parcel
    /// is missing or was already settled.
    pub async fn mark_paid(
        conn: &mut PgConnection,
        id: Uuid,
        transaction_id: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Parcel>(&format!(
            r#"
            UPDATE parcels
            SET payment_status = 'paid',
                payment_date = $3,
                transaction_id = $2
            WHERE id = $1 AND payment_status = 'unpaid'
            RETURNING {PARCEL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(transaction_id)
        .bind(paid_at)
        .fetch_optional(conn)
        .await
    }
}
