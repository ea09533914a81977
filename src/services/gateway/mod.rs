pub mod chapa;

use async_trait::async_trait;
use serde::Serialize;

/// What the gateway needs to open a hosted checkout page.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest {
    pub tx_ref: String,
    pub amount: i64,
    pub currency: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub title: String,
    pub description: String,
}

/// Outcome of asking the gateway about a reference.
#[derive(Debug, Clone)]
pub struct Verification {
    pub paid: bool,
    /// The gateway's raw response, kept for audit.
    pub payload: serde_json::Value,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Returns the checkout URL the payer should be sent to.
    async fn initialize(&self, request: &CheckoutRequest) -> anyhow::Result<String>;

    async fn verify(&self, tx_ref: &str) -> anyhow::Result<Verification>;
}

/// Splits a display name at the first space. A single word fills both parts.
pub fn split_name(name: &str) -> (String, String) {
    let name = name.trim();
    match name.split_once(' ') {
        Some((first, last)) if !first.is_empty() => (first.to_string(), last.trim().to_string()),
        _ => (name.to_string(), name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("Abebe Kebede"), ("Abebe".to_string(), "Kebede".to_string()));
        assert_eq!(split_name("Sara"), ("Sara".to_string(), "Sara".to_string()));
        assert_eq!(
            split_name("  Mulu Ayele Tesfaye "),
            ("Mulu".to_string(), "Ayele Tesfaye".to_string())
        );
    }
}
