//! Payment intent endpoint wire types

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Request body of the payment intent creation endpoint
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PaymentIntentRequest {
    /// Amount in the currency's minor unit
    pub amount: i64,
    /// ISO 4217 code
    pub currency: String,
}

/// Success body
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub client_secret: String,
    pub payment_intent_id: String,
}

/// Failure body, sent with status 400
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PaymentIntentError {
    pub error: String,
}

impl PaymentIntentError {
    pub const STATUS: u16 = 400;
}

impl From<Error> for PaymentIntentError {
    fn from(e: Error) -> Self {
        PaymentIntentError {
            error: e.to_string(),
        }
    }
}

impl PaymentIntentRequest {
    /// Checks the request and returns it with the currency code lower-cased.
    pub fn validate(self) -> Result<Self, Error> {
        if self.amount <= 0 {
            return Err(Error::PaymentRequestError(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        let currency = self.currency.trim().to_ascii_lowercase();
        if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_lowercase()) {
            return Err(Error::PaymentRequestError(format!(
                "unsupported currency {:?}",
                self.currency
            )));
        }
        Ok(Self { currency, ..self })
    }
}
