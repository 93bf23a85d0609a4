/// Payment reconciliation
///
/// Settlement turns an unpaid parcel into a paid one and appends the matching
/// ledger row. Both writes happen in one transaction with the parcel row
/// locked, so a parcel is settled at most once and a ledger row exists if and
/// only if its parcel is paid.
///
/// # Flow
///
/// ```text
/// PaymentSubmission ──validate()──> ValidatedPayment
///                                        │
///                               record_payment(pool)
///                                        │
///        BEGIN ─ lock parcel ─ unpaid? ─ mark paid ─ insert ledger row ─ COMMIT
///                    │            │
///             ParcelNotFound  AlreadySettled
/// ```
///
/// Resubmitting a settlement for a paid parcel is rejected with
/// `AlreadySettled`, whether or not the transaction ID matches. The write is
/// never retried automatically.
///
/// # Example
///
/// ```no_run
/// use parcelhub_shared::settlement::{record_payment, PaymentSubmission};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let submission = PaymentSubmission {
///     parcel_id: Some("6f1c8e2a-7d4b-4c1e-9a55-2b3f0c8d9e10".to_string()),
///     transaction_id: Some("pi_3Nk2".to_string()),
///     amount: Some(500.0),
///     email: Some("a@x.com".to_string()),
///     payment_method: Some("card".to_string()),
/// };
///
/// let receipt = record_payment(&pool, submission.validate()?).await?;
/// println!("ledger row {}", receipt.inserted_id);
/// # Ok(())
/// # }
/// ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::StoreTimeout;
use crate::models::parcel::Parcel;
use crate::models::payment::{NewPayment, Payment, ONE_PAYMENT_PER_PARCEL, PARCEL_TRANSACTION_KEY};

/// Error type for settlement
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    /// A submitted field is missing or malformed
    #[error("Invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },

    /// No parcel has the submitted ID
    #[error("Parcel {0} not found")]
    ParcelNotFound(Uuid),

    /// The parcel was settled before
    #[error("Parcel {parcel_id} is already paid")]
    AlreadySettled {
        parcel_id: Uuid,
        transaction_id: Option<String>,
    },

    /// The settlement did not finish in time; it was rolled back unless the
    /// commit had already been sent
    #[error(transparent)]
    Timeout(#[from] StoreTimeout),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl SettlementError {
    fn invalid(field: &'static str, message: &str) -> Self {
        SettlementError::Invalid {
            field,
            message: message.to_string(),
        }
    }
}

/// A settlement request as submitted by the client
///
/// Every field is optional here so that missing values are reported by
/// `validate` with a field name instead of a generic decoding failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSubmission {
    pub parcel_id: Option<String>,
    pub transaction_id: Option<String>,
    pub amount: Option<f64>,
    pub email: Option<String>,
    pub payment_method: Option<String>,
}

/// A submission that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPayment {
    pub parcel_id: Uuid,
    pub transaction_id: String,
    pub amount: f64,
    pub email: String,
    pub payment_method: Option<String>,
}

/// What a successful settlement produced
#[derive(Debug, Clone)]
pub struct SettlementReceipt {
    /// ID of the appended ledger row
    pub inserted_id: Uuid,

    /// The appended ledger row
    pub payment: Payment,

    /// The parcel as it is after settlement
    pub parcel: Parcel,
}

impl PaymentSubmission {
    /// Checks every field before anything touches the store
    ///
    /// Fields are checked in a fixed order (parcel ID, transaction ID, amount,
    /// email) and the first failure is returned, so the same bad request
    /// always yields the same message.
    pub fn validate(&self) -> Result<ValidatedPayment, SettlementError> {
        let parcel_id = match self.parcel_id.as_deref().map(str::trim) {
            None | Some("") => return Err(SettlementError::invalid("parcelId", "parcelId is required")),
            Some(raw) => Uuid::parse_str(raw)
                .map_err(|_| SettlementError::invalid("parcelId", "parcelId is not a valid identifier"))?,
        };

        let transaction_id = match self.transaction_id.as_deref() {
            Some(tx) if !tx.trim().is_empty() => tx.to_string(),
            _ => return Err(SettlementError::invalid("transactionId", "transactionId is required")),
        };

        let amount = match self.amount {
            None => return Err(SettlementError::invalid("amount", "amount is required")),
            Some(amount) if !amount.is_finite() => {
                return Err(SettlementError::invalid("amount", "amount must be a finite number"))
            }
            Some(amount) if amount <= 0.0 => {
                return Err(SettlementError::invalid("amount", "amount must be greater than zero"))
            }
            Some(amount) => amount,
        };

        let email = match self.email.as_deref() {
            Some(email) if !email.trim().is_empty() => email.to_string(),
            _ => return Err(SettlementError::invalid("email", "email is required")),
        };

        let payment_method = self
            .payment_method
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        Ok(ValidatedPayment {
            parcel_id,
            transaction_id,
            amount,
            email,
            payment_method,
        })
    }
}

/// Settles a parcel and appends its ledger row atomically
///
/// # Errors
///
/// - `ParcelNotFound`: no parcel has this ID; nothing was written
/// - `AlreadySettled`: the parcel is paid already; nothing was written
/// - `Database`: the transaction failed and was rolled back
pub async fn record_payment(pool: &PgPool, payment: ValidatedPayment) -> Result<SettlementReceipt, SettlementError> {
    let mut tx = pool.begin().await?;

    let parcel = Parcel::lock_for_settlement(&mut *tx, payment.parcel_id)
        .await?
        .ok_or(SettlementError::ParcelNotFound(payment.parcel_id))?;

    if parcel.is_paid() {
        tracing::warn!(
            parcel_id = %parcel.id,
            existing_transaction = ?parcel.transaction_id,
            submitted_transaction = %payment.transaction_id,
            "Rejected settlement of an already paid parcel"
        );
        return Err(SettlementError::AlreadySettled {
            parcel_id: parcel.id,
            transaction_id: parcel.transaction_id,
        });
    }

    let paid_at = Utc::now();

    let parcel = Parcel::mark_paid(&mut *tx, payment.parcel_id, &payment.transaction_id, paid_at)
        .await?
        .ok_or(SettlementError::AlreadySettled {
            parcel_id: payment.parcel_id,
            transaction_id: None,
        })?;

    let ledger_row = Payment::insert(
        &mut *tx,
        NewPayment {
            parcel_id: payment.parcel_id,
            email: payment.email,
            transaction_id: payment.transaction_id,
            amount: payment.amount,
            payment_method: payment.payment_method,
            paid_at,
        },
    )
    .await
    .map_err(|err| duplicate_ledger_row(err, payment.parcel_id))?;

    tx.commit().await?;

    tracing::info!(
        parcel_id = %parcel.id,
        payment_id = %ledger_row.id,
        transaction_id = %ledger_row.transaction_id,
        amount = ledger_row.amount,
        "Parcel settled"
    );

    Ok(SettlementReceipt {
        inserted_id: ledger_row.id,
        payment: ledger_row,
        parcel,
    })
}

/// Maps a ledger uniqueness violation to `AlreadySettled`
fn duplicate_ledger_row(err: sqlx::Error, parcel_id: Uuid) -> SettlementError {
    let is_duplicate = err
        .as_database_error()
        .and_then(|db_err| db_err.constraint())
        .map(|constraint| constraint == ONE_PAYMENT_PER_PARCEL || constraint == PARCEL_TRANSACTION_KEY)
        .unwrap_or(false);

    if is_duplicate {
        SettlementError::AlreadySettled {
            parcel_id,
            transaction_id: None,
        }
    } else {
        SettlementError::Database(err)
    }
}
