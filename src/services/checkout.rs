//! Hosted checkout sessions (Stripe)

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    config::PaymentsConfig,
    error::{AppError, AppResult},
    models::payment::to_cents,
};

/// What the customer is asked to pay
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub amount: Decimal,
    pub description: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// A provider-hosted checkout flow
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> AppResult<CheckoutSession>;

    async fn is_session_paid(&self, session_id: &str) -> AppResult<bool>;
}

#[derive(Debug, Deserialize)]
struct SessionStatus {
    payment_status: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    config: PaymentsConfig,
}

impl StripeClient {
    pub fn new(config: PaymentsConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    /// Form fields of a one-item card checkout
    fn session_form(&self, request: &CheckoutRequest) -> AppResult<Vec<(String, String)>> {
        let cents = to_cents(request.amount)
            .filter(|c| *c > 0)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid amount {}", request.amount)))?;

        Ok(vec![
            ("mode".into(), "payment".into()),
            ("payment_method_types[0]".into(), "card".into()),
            ("success_url".into(), request.success_url.clone()),
            ("cancel_url".into(), request.cancel_url.clone()),
            ("line_items[0][quantity]".into(), "1".into()),
            ("line_items[0][price_data][currency]".into(), self.config.currency.clone()),
            ("line_items[0][price_data][unit_amount]".into(), cents.to_string()),
            (
                "line_items[0][price_data][product_data][name]".into(),
                request.description.clone(),
            ),
        ])
    }

    async fn error_from(response: reqwest::Response) -> AppError {
        let status = response.status();
        let detail = response
            .json::<StripeErrorBody>()
            .await
            .ok()
            .and_then(|b| b.error.message)
            .unwrap_or_else(|| "no details".to_string());
        AppError::ExternalService(format!("Stripe returned {}: {}", status, detail))
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> AppResult<CheckoutSession> {
        if self.config.stripe_secret_key.is_empty() {
            return Err(AppError::ExternalService("Stripe is not configured".to_string()));
        }

        let form = self.session_form(request)?;
        let response = self
            .http
            .post(format!("{}/checkout/sessions", self.config.stripe_api_url))
            .bearer_auth(&self.config.stripe_secret_key)
            .header("Idempotency-Key", uuid::Uuid::new_v4().to_string())
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Stripe request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        response
            .json::<CheckoutSession>()
            .await
            .map_err(|e| AppError::ExternalService(format!("Invalid Stripe response: {}", e)))
    }

    async fn is_session_paid(&self, session_id: &str) -> AppResult<bool> {
        let response = self
            .http
            .get(format!("{}/checkout/sessions/{}", self.config.stripe_api_url, session_id))
            .bearer_auth(&self.config.stripe_secret_key)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Stripe request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let status = response
            .json::<SessionStatus>()
            .await
            .map_err(|e| AppError::ExternalService(format!("Invalid Stripe response: {}", e)))?;
        Ok(status.payment_status == "paid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn request(amount: &str) -> CheckoutRequest {
        CheckoutRequest {
            amount: Decimal::from_str(amount).unwrap(),
            description: "Dune".to_string(),
            success_url: "http://localhost/success".to_string(),
            cancel_url: "http://localhost/cancel".to_string(),
        }
    }

    #[test]
    fn test_session_form_uses_cents() {
        let client = StripeClient::new(PaymentsConfig::default()).unwrap();
        let form = client.session_form(&request("3.50")).unwrap();
        let get = |k: &str| form.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("350"));
        assert_eq!(get("line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(get("line_items[0][price_data][product_data][name]"), Some("Dune"));
        assert_eq!(get("mode"), Some("payment"));
    }

    #[test]
    fn test_zero_amount_is_rejected() {
        let client = StripeClient::new(PaymentsConfig::default()).unwrap();
        assert!(client.session_form(&request("0")).is_err());
    }

    #[tokio::test]
    async fn test_unconfigured_client_fails_without_network() {
        let client = StripeClient::new(PaymentsConfig::default()).unwrap();
        let result = client.create_checkout_session(&request("1.00")).await;
        assert!(matches!(result, Err(AppError::ExternalService(_))));
    }
}
