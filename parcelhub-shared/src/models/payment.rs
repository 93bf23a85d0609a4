/// Payment ledger model
///
/// Every settled parcel has exactly one ledger row. Rows reference their
/// parcel by ID, are written only by `crate::settlement` and are never
/// updated or deleted.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE payment_record_status AS ENUM ('succeeded');
///
/// CREATE TABLE payments (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     parcel_id UUID NOT NULL REFERENCES parcels(id) ON DELETE RESTRICT,
///     email TEXT NOT NULL,
///     transaction_id TEXT NOT NULL,
///     amount DOUBLE PRECISION NOT NULL CHECK (amount > 0),
///     payment_method TEXT,
///     status payment_record_status NOT NULL DEFAULT 'succeeded',
///     paid_at_string TEXT NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (parcel_id, transaction_id),
///     UNIQUE (parcel_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Outcome recorded on a ledger row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_record_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentRecordStatus {
    Succeeded,
}

/// A ledger entry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub parcel_id: Uuid,
    pub email: String,
    pub transaction_id: String,
    pub amount: f64,
    pub payment_method: Option<String>,
    pub status: PaymentRecordStatus,

    /// RFC 3339 rendering of the settlement time, kept for display
    #[serde(rename = "paid_at_string")]
    pub paid_at_string: String,

    pub created_at: DateTime<Utc>,
}

/// Input for appending a ledger row
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub parcel_id: Uuid,
    pub email: String,
    pub transaction_id: String,
    pub amount: f64,
    pub payment_method: Option<String>,
    pub paid_at: DateTime<Utc>,
}

const PAYMENT_COLUMNS: &str =
    "id, parcel_id, email, transaction_id, amount, payment_method, status, paid_at_string, created_at";

/// Name of the constraint allowing one ledger row per parcel
pub const ONE_PAYMENT_PER_PARCEL: &str = "payments_parcel_once_key";

/// Name of the constraint on (parcel, transaction)
pub const PARCEL_TRANSACTION_KEY: &str = "payments_parcel_transaction_key";

impl Payment {
    /// Appends a succeeded ledger row
    ///
    /// Only callable with a connection so it always runs inside the
    /// settlement transaction.
    pub async fn insert(conn: &mut PgConnection, data: NewPayment) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (parcel_id, email, transaction_id, amount, payment_method,
                                  status, paid_at_string, created_at)
            VALUES ($1, $2, $3, $4, $5, 'succeeded', $6, $7)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(data.parcel_id)
        .bind(data.email)
        .bind(data.transaction_id)
        .bind(data.amount)
        .bind(data.payment_method)
        .bind(data.paid_at.to_rfc3339())
        .bind(data.paid_at)
        .fetch_one(conn)
        .await
    }

    /// Ledger rows paid by `email`, newest first
    pub async fn list_by_email(pool: &PgPool, email: &str) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE email = $1
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(email)
        .fetch_all(pool)
        .await
    }

    /// Ledger rows referencing a parcel
    pub async fn list_by_parcel(pool: &PgPool, parcel_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE parcel_id = $1 ORDER BY created_at DESC"
        ))
        .bind(parcel_id)
        .fetch_all(pool)
        .await
    }
}
