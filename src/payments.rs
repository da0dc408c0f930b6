use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

const STRIPE_CHECKOUT_URL: &str = "https://api.stripe.com/v1/checkout/sessions";

/// Everything the payment provider needs to show a one-item checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub customer_email: String,
    /// Tour id, echoed back by the provider once the payment completes.
    pub client_reference_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub item_name: String,
    pub item_description: Option<String>,
    pub item_image: Option<String>,
    /// Smallest currency unit.
    pub unit_amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> anyhow::Result<CheckoutSession>;
}

#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
    secret_key: Option<String>,
}

impl StripeGateway {
    pub fn new(secret_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            secret_key,
        }
    }
}

/// Stripe takes nested parameters as bracketed form keys.
fn form_params(req: &CheckoutRequest) -> Vec<(String, String)> {
    let item = "line_items[0]";
    let mut params = vec![
        ("mode".to_string(), "payment".to_string()),
        ("payment_method_types[0]".into(), "card".into()),
        ("success_url".into(), req.success_url.clone()),
        ("cancel_url".into(), req.cancel_url.clone()),
        ("customer_email".into(), req.customer_email.clone()),
        ("client_reference_id".into(), req.client_reference_id.clone()),
        (format!("{item}[quantity]"), "1".into()),
        (format!("{item}[price_data][currency]"), req.currency.clone()),
        (format!("{item}[price_data][unit_amount]"), req.unit_amount.to_string()),
        (format!("{item}[price_data][product_data][name]"), req.item_name.clone()),
    ];
    if let Some(description) = &req.item_description {
        params.push((
            format!("{item}[price_data][product_data][description]"),
            description.clone(),
        ));
    }
    if let Some(image) = &req.item_image {
        params.push((format!("{item}[price_data][product_data][images][0]"), image.clone()));
    }
    params
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> anyhow::Result<CheckoutSession> {
        let Some(key) = &self.secret_key else {
            anyhow::bail!("STRIPE_SECRET_KEY is not configured");
        };
        let res = self
            .client
            .post(STRIPE_CHECKOUT_URL)
            .bearer_auth(key)
            .form(&form_params(&request))
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            error!(%status, body = %body, "stripe checkout session failed");
            anyhow::bail!("stripe returned {status}");
        }
        let session: CheckoutSession = res.json().await?;
        info!(session_id = %session.id, tour = %request.client_reference_id, "checkout session created");
        Ok(session)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::Mutex;

    use super::*;

    /// Returns a fixed session and remembers what it was asked for.
    #[derive(Default)]
    pub struct FakeGateway {
        pub requests: Mutex<Vec<CheckoutRequest>>,
    }

    #[async_trait]
    impl PaymentGateway for FakeGateway {
        async fn create_checkout_session(
            &self,
            request: CheckoutRequest,
        ) -> anyhow::Result<CheckoutSession> {
            self.requests.lock().unwrap().push(request);
            Ok(CheckoutSession {
                id: "cs_test_123".into(),
                url: Some("https://checkout.stripe.test/cs_test_123".into()),
            })
        }
    }
}
