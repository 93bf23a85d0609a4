/// Payment gateway client
///
/// The client app charges cards itself; the server only asks the payment
/// processor for a charge intent and hands its client secret back. Settlement
/// happens later through `crate::settlement` once the client reports success.
///
/// `PaymentGateway` is the seam; `StripeGateway` talks to the Stripe REST API.
///
/// # Example
///
/// ```no_run
/// use parcelhub_shared::gateway::{PaymentGateway, StripeGateway};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let gateway = StripeGateway::new("sk_test_123", "https://api.stripe.com")?;
/// let intent = gateway.create_charge_intent(50_000, "usd").await?;
/// println!("secret {}", intent.client_secret);
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Path of the intent endpoint, relative to the base URL
const PAYMENT_INTENTS_PATH: &str = "/v1/payment_intents";

/// A charge the client can confirm with the processor
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChargeIntent {
    /// Processor's intent ID
    pub id: String,

    /// Secret the client uses to confirm the charge
    pub client_secret: String,
}

/// Error type for gateway calls
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Amounts must be positive, in the smallest currency unit
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// The processor answered with an error status
    #[error("Gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The processor could not be reached
    #[error("Gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The processor answered with something we could not read
    #[error("Malformed gateway response: {0}")]
    MalformedResponse(String),
}

/// Creates charge intents with a payment processor
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_charge_intent(&self, amount: i64, currency: &str) -> Result<ChargeIntent, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

/// Stripe PaymentIntents client
#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
    base_url: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(secret_key: &str, base_url: &str) -> Result<Self, GatewayError> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(client, secret_key, base_url))
    }

    pub fn with_client(client: Client, secret_key: &str, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    fn intents_url(&self) -> String {
        format!("{}{}", self.base_url, PAYMENT_INTENTS_PATH)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_charge_intent(&self, amount: i64, currency: &str) -> Result<ChargeIntent, GatewayError> {
        if amount <= 0 {
            return Err(GatewayError::InvalidAmount(amount));
        }

        let amount = amount.to_string();
        let form = [
            ("amount", amount.as_str()),
            ("currency", currency),
            ("payment_method_types[]", "card"),
        ];

        let response = self
            .client
            .post(self.intents_url())
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

            tracing::warn!(status = status.as_u16(), %message, "Payment gateway rejected charge intent");

            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let intent: ChargeIntent =
            serde_json::from_str(&body).map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        tracing::debug!(intent_id = %intent.id, "Charge intent created");

        Ok(intent)
    }
}
