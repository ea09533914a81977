use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{CheckoutRequest, PaymentGateway, Verification};
use crate::config::AppConfig;

pub struct ChapaGateway {
    secret_key: String,
    base_url: String,
    callback_url: String,
    return_url: String,
    client: reqwest::Client,
}

impl ChapaGateway {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_sec))
            .build()
            .context("failed to build Chapa HTTP client")?;

        Ok(Self {
            secret_key: config.chapa_secret_key.clone(),
            base_url: config.chapa_base_url.trim_end_matches('/').to_string(),
            callback_url: config.chapa_callback_url.clone(),
            return_url: config.chapa_return_url.clone(),
            client,
        })
    }

    /// `{base}/v1/transaction/verify/{tx_ref}` with the reference encoded as a
    /// single path segment.
    fn verify_url(&self, tx_ref: &str) -> anyhow::Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url).context("invalid Chapa base URL")?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Chapa base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["v1", "transaction", "verify", tx_ref]);
        Ok(url)
    }
}

/// Chapa reports `status` either as a boolean or as the string "success".
fn status_ok(data: &Value) -> bool {
    match &data["status"] {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("success"),
        _ => false,
    }
}

/// Checkout URL from an initialize response, if the call succeeded.
pub fn parse_checkout_url(data: &Value) -> Option<String> {
    if !status_ok(data) {
        return None;
    }
    data["data"]["checkout_url"]
        .as_str()
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

pub fn is_verified(data: &Value) -> bool {
    status_ok(data)
        && data["data"]["status"]
            .as_str()
            .is_some_and(|s| s.eq_ignore_ascii_case("success"))
}

#[async_trait]
impl PaymentGateway for ChapaGateway {
    async fn initialize(&self, request: &CheckoutRequest) -> anyhow::Result<String> {
        let body = json!({
            "amount": request.amount.to_string(),
            "currency": request.currency,
            "email": request.email,
            "first_name": request.first_name,
            "last_name": request.last_name,
            "tx_ref": request.tx_ref,
            "callback_url": self.callback_url,
            "return_url": self.return_url,
            "customization[title]": request.title,
            "customization[description]": request.description,
        });

        let resp = self
            .client
            .post(format!("{}/v1/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .context("failed to call Chapa initialize")?;

        let status = resp.status();
        let text = resp.text().await.context("failed to read Chapa response")?;
        let data: Value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).context("failed to parse Chapa response")?
        };

        if status.is_client_error() || status.is_server_error() {
            anyhow::bail!("Chapa initialize error ({}): {}", status, data);
        }

        parse_checkout_url(&data).ok_or_else(|| anyhow::anyhow!("Chapa did not return a checkout_url: {data}"))
    }

    async fn verify(&self, tx_ref: &str) -> anyhow::Result<Verification> {
        let resp = self
            .client
            .get(self.verify_url(tx_ref)?)
            .bearer_auth(&self.secret_key)
            .header("Accept", "application/json")
            .send()
            .await
            .context("failed to call Chapa verify")?;

        let text = resp.text().await.context("failed to read Chapa response")?;
        let payload: Value = if text.is_empty() {
            json!({})
        } else {
            serde_json::from_str(&text).context("failed to parse Chapa response")?
        };

        Ok(Verification {
            paid: is_verified(&payload),
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_checkout_url() {
        let ok = json!({"status": "success", "data": {"checkout_url": "https://checkout.chapa.co/abc"}});
        assert_eq!(parse_checkout_url(&ok).as_deref(), Some("https://checkout.chapa.co/abc"));

        let flag = json!({"status": true, "data": {"checkout_url": "https://x"}});
        assert!(parse_checkout_url(&flag).is_some());

        let failed = json!({"status": "failed", "message": "Invalid currency"});
        assert_eq!(parse_checkout_url(&failed), None);

        let blank = json!({"status": "success", "data": {"checkout_url": ""}});
        assert_eq!(parse_checkout_url(&blank), None);
    }

    #[test]
    fn test_is_verified() {
        assert!(is_verified(&json!({"status": "success", "data": {"status": "SUCCESS"}})));
        assert!(!is_verified(&json!({"status": "success", "data": {"status": "pending"}})));
        assert!(!is_verified(&json!({"status": false, "data": {"status": "success"}})));
        assert!(!is_verified(&json!({})));
    }

    #[test]
    fn test_new_trims_base_url() {
        let mut config = AppConfig::from_env();
        config.chapa_base_url = "https://api.chapa.co/".to_string();
        let gateway = ChapaGateway::new(&config).unwrap();
        assert_eq!(gateway.base_url, "https://api.chapa.co");
    }

    #[test]
    fn test_verify_url_encodes_reference() {
        let mut config = AppConfig::from_env();
        config.chapa_base_url = "https://api.chapa.co/".to_string();
        let gateway = ChapaGateway::new(&config).unwrap();

        assert_eq!(
            gateway.verify_url("FIELDBOOK-abc").unwrap().as_str(),
            "https://api.chapa.co/v1/transaction/verify/FIELDBOOK-abc"
        );
        assert_eq!(
            gateway.verify_url("../x?y#z").unwrap().as_str(),
            "https://api.chapa.co/v1/transaction/verify/..%2Fx%3Fy%23z"
        );
    }
}
